//! Publish, grant, subscription, and consent rules as read back from the graph.
//!
//! Rules are atomic: they are created whole and removed by detach-delete,
//! never partially updated.

use serde::{Deserialize, Serialize};

use crate::{identity::IdentityId, scope::ScopeLevel};

/// Unique identifier for a rule node created by this engine.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleId(pub String);

impl RuleId {
    /// Create a new, unique rule id.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for RuleId {
    fn default() -> Self {
        Self::new()
    }
}

/// A scope node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeRecord {
    /// Full name including any hierarchy prefix.
    pub name: String,
    pub level: ScopeLevel,
}

/// "Publisher exposes Scope, grantable under this rule."
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishRule {
    pub id: RuleId,
    pub publisher: IdentityId,
    pub scope: String,
    pub title: String,
    pub description: String,
}

/// A validity window `[not_before, expire)` in unix seconds.
///
/// `expire == 0` means the window never closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validity {
    pub not_before: i64,
    pub expire: i64,
}

impl Validity {
    /// A window opening at `not_before` that never closes.
    pub fn from(not_before: i64) -> Self {
        Self {
            not_before,
            expire: 0,
        }
    }

    /// True iff `not_before <= t` and (`expire == 0` or `t < expire`).
    pub fn covers(&self, t: i64) -> bool {
        self.not_before <= t && (self.expire == 0 || t < self.expire)
    }

    /// A window that closes before (or as) it opens can never be valid.
    pub fn is_well_formed(&self) -> bool {
        self.not_before >= 0 && self.expire >= 0 && (self.expire == 0 || self.expire > self.not_before)
    }
}

/// "Receiver may exercise Publisher's scope, acting for Owner, during the window."
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantRule {
    pub id: RuleId,
    pub receiver: IdentityId,
    pub publisher: IdentityId,
    pub scope: String,
    pub owner: IdentityId,
    pub not_before: i64,
    pub expire: i64,
    /// Scopes this grant entitles the receiver to hand out (one MAY_GRANT hop down).
    #[serde(default)]
    pub may_grant_scopes: Vec<String>,
}

impl GrantRule {
    pub fn validity(&self) -> Validity {
        Validity {
            not_before: self.not_before,
            expire: self.expire,
        }
    }
}

/// "Subscriber wants to use this publisher scope against resource owners."
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub subscriber: IdentityId,
    pub publisher: IdentityId,
    pub scope: String,
    pub requested_by: IdentityId,
}

/// "Owner approves Subscriber's use of Publisher's scope regarding Owner."
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentRule {
    pub id: RuleId,
    pub owner: IdentityId,
    pub subscriber: IdentityId,
    pub publisher: IdentityId,
    pub scope: String,
}
