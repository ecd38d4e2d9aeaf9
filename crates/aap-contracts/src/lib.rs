//! # aap-contracts
//!
//! Shared types, graph schema, and error contracts for the AAP authorization
//! engine.
//!
//! All crates in the workspace import from here. No business logic lives in
//! this crate, only data definitions, the scope naming rules, and error types.

pub mod bulk;
pub mod consent;
pub mod error;
pub mod graph;
pub mod identity;
pub mod rules;
pub mod scope;
pub mod verdict;
