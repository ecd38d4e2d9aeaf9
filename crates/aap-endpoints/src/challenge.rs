//! Sub-requests for the consent challenge endpoints.

use serde::{Deserialize, Serialize};

use aap_consent::Decision;
use aap_contracts::error::{AapError, AapResult};
use aap_core::traits::Validate;

fn require_challenge(challenge: &str) -> AapResult<()> {
    if challenge.trim().is_empty() {
        return Err(AapError::invalid("challenge is required"));
    }
    Ok(())
}

/// Fetch-and-resolve, or reject, one challenge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeRef {
    pub challenge: String,
}

impl Validate for ChallengeRef {
    fn validate(&self) -> AapResult<()> {
        require_challenge(&self.challenge)
    }
}

/// An owner's acceptance of some of a challenge's scopes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeAccept {
    pub challenge: String,
    pub grant_scopes: Vec<String>,
}

impl ChallengeAccept {
    pub fn decision(&self) -> Decision {
        Decision::Accept {
            grant_scopes: self.grant_scopes.clone(),
        }
    }
}

impl Validate for ChallengeAccept {
    fn validate(&self) -> AapResult<()> {
        require_challenge(&self.challenge)
    }
}
