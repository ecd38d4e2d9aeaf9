//! Consent authority wire types and consent decision outcomes.
//!
//! The external consent authority speaks in challenges: one challenge id per
//! pending consent decision. These types carry the subset of its protocol the
//! engine consumes.

use serde::{Deserialize, Serialize};

use crate::identity::IdentityId;

/// A pending consent decision as reported by the authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentChallenge {
    pub challenge: String,
    /// The resource owner being asked.
    pub subject: IdentityId,
    /// The client application asking.
    pub client_id: IdentityId,
    #[serde(default)]
    pub requested_scopes: Vec<String>,
    /// Publishers the client wants tokens for. Empty means any publisher.
    #[serde(default)]
    pub requested_audiences: Vec<IdentityId>,
    /// The authority already approved this exact request silently.
    #[serde(default)]
    pub skip: bool,
}

/// Accept call body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptConsent {
    pub grant_scope: Vec<String>,
    pub grant_access_token_audience: Vec<String>,
    pub remember: bool,
    /// Seconds the authority should remember the decision; `0` means forever.
    pub remember_for: i64,
}

/// Reject call body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectConsent {
    pub error: String,
    pub error_description: String,
    pub status_code: u16,
}

impl RejectConsent {
    /// The fixed rejection the engine sends when an owner declines.
    pub fn access_denied() -> Self {
        Self {
            error: "access_denied".to_string(),
            error_description: "The resource owner denied the request".to_string(),
            status_code: 403,
        }
    }
}

/// Where the authority wants the user agent sent next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redirect {
    pub redirect_to: String,
}

/// Token introspection result.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Introspection {
    pub active: bool,
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

/// One (scope, publisher) pair awaiting the owner's decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentEntry {
    pub scope: String,
    pub publisher: IdentityId,
    pub title: String,
    pub description: String,
    pub consented: bool,
}

/// The result of resolving or deciding a consent challenge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ConsentOutcome {
    /// Accepted without asking the owner (skip flag or all consents present).
    AutoAccepted { redirect_to: String },
    /// The owner must decide; nothing was sent to the authority yet.
    NeedsDecision {
        subject: IdentityId,
        client_id: IdentityId,
        entries: Vec<ConsentEntry>,
    },
    /// The owner accepted a subset of the requested scopes.
    UserAccepted {
        redirect_to: String,
        granted_scopes: Vec<String>,
    },
    /// The owner declined.
    UserRejected { redirect_to: String },
}
