//! # aap-consent
//!
//! Consent orchestration between the policy graph and an external OAuth2
//! consent authority.
//!
//! ## Overview
//!
//! - [`state`] holds the per-challenge state machine.
//! - [`engine::ConsentEngine`] resolves challenges: it gates on the client's
//!   subscriptions, auto-accepts when the owner already consented (or the
//!   authority asks to skip), and otherwise hands back the entries the owner
//!   has to decide on.
//! - [`authority::HttpConsentAuthority`] is the blocking HTTP implementation
//!   of the `ConsentAuthority` and `ScopeSync` seams.

pub mod authority;
pub mod engine;
pub mod state;

pub use authority::{AuthorityConfig, HttpConsentAuthority};
pub use engine::{ConsentEngine, Decision};

// ── Tests ─────────────────────────────────────────────────────────────────────
