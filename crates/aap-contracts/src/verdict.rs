//! Judge verdicts.
//!
//! A `Verdict` answers one (publisher, requestor, scope, owners) question. An
//! `Authorization` aggregates per-scope verdicts for a caller that asked about
//! several scopes at once. Neither is ever persisted.

use serde::{Deserialize, Serialize};

use crate::identity::IdentityId;

/// The Judge's answer for a single scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub publisher: IdentityId,
    pub requestor: IdentityId,
    pub scope: String,
    /// Owners of the matching grants when granted; the caller's original
    /// owner filter when denied.
    pub owners: Vec<IdentityId>,
    pub granted: bool,
    /// `[scope]` when denied, empty when granted.
    pub missing: Vec<String>,
}

impl Verdict {
    /// A deny verdict echoing the caller's filter.
    pub fn deny(
        publisher: IdentityId,
        requestor: IdentityId,
        scope: impl Into<String>,
        owner_filter: Vec<IdentityId>,
    ) -> Self {
        let scope = scope.into();
        Self {
            publisher,
            requestor,
            missing: vec![scope.clone()],
            scope,
            owners: owner_filter,
            granted: false,
        }
    }
}

/// Aggregate of several verdicts for the same publisher and requestor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authorization {
    pub publisher: IdentityId,
    pub requestor: IdentityId,
    /// True iff at least one scope was asked about and every one was granted.
    pub granted: bool,
    pub granted_scopes: Vec<String>,
    pub missing_scopes: Vec<String>,
    /// Union of owners resolved by the granted verdicts.
    pub owners: Vec<IdentityId>,
}
