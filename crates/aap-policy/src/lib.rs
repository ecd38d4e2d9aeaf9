//! # aap-policy
//!
//! The policy graph model: resolution functions over scopes, publish rules,
//! grants, subscriptions and consents, plus the deny-by-default Judge.
//!
//! ## Overview
//!
//! Every function runs inside a transaction supplied by the caller (usually
//! the bulk executor) and never opens one itself. Reads take
//! `&dyn GraphTransaction`; writes take `&mut dyn GraphTransaction` and fail
//! if the transaction is read-only.
//!
//! ```rust,ignore
//! use aap_policy::{grant, judge};
//!
//! let rule = grant::create_grant(tx, &new_grant)?;
//! let verdict = judge::judge(tx, &SystemClock, &question)?;
//! ```

pub mod consent;
pub mod grant;
pub mod judge;
mod lookup;
pub mod publish;
pub mod requests;
pub mod scope;
pub mod subscription;

pub use judge::{judge, judge_all};

// ── Tests ─────────────────────────────────────────────────────────────────────
