//! Inputs accepted by the resolution functions and the Judge.
//!
//! These are the typed sub-requests endpoints deserialize from their JSON
//! arrays. Each implements `Validate`, which the bulk executor runs before
//! any transaction opens.

use serde::{Deserialize, Serialize};

use aap_contracts::{
    error::{AapError, AapResult},
    identity::IdentityId,
    rules::{RuleId, Validity},
    scope::ScopeName,
};
use aap_core::traits::Validate;

fn require_id(field: &str, id: &IdentityId) -> AapResult<()> {
    if id.is_empty() {
        return Err(AapError::invalid(format!("{field} is required")));
    }
    Ok(())
}

fn require_text(field: &str, value: &str) -> AapResult<()> {
    if value.trim().is_empty() {
        return Err(AapError::invalid(format!("{field} must not be empty")));
    }
    Ok(())
}

/// Create a scope hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewScope {
    pub name: String,
    /// Stamped from the authenticated caller when omitted.
    #[serde(default)]
    pub requested_by: IdentityId,
}

impl Validate for NewScope {
    fn validate(&self) -> AapResult<()> {
        ScopeName::base(&self.name)?;
        require_id("requested_by", &self.requested_by)
    }
}

/// Filter for reading scopes. An empty filter matches every scope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeFilter {
    #[serde(default)]
    pub name: Option<String>,
}

impl Validate for ScopeFilter {
    fn validate(&self) -> AapResult<()> {
        Ok(())
    }
}

/// Publish a scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPublish {
    pub publisher: IdentityId,
    pub scope: String,
    pub title: String,
    pub description: String,
    /// The identity that receives the bootstrap root may-grant right.
    #[serde(default)]
    pub requested_by: IdentityId,
}

impl Validate for NewPublish {
    fn validate(&self) -> AapResult<()> {
        require_id("publisher", &self.publisher)?;
        ScopeName::base(&self.scope)?;
        require_text("title", &self.title)?;
        require_text("description", &self.description)?;
        require_id("requested_by", &self.requested_by)
    }
}

/// Filter for reading publish rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishFilter {
    #[serde(default)]
    pub publisher: Option<IdentityId>,
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl Validate for PublishFilter {
    fn validate(&self) -> AapResult<()> {
        Ok(())
    }
}

/// Grant a receiver the use of a published scope on behalf of an owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewGrant {
    pub receiver: IdentityId,
    pub publisher: IdentityId,
    /// Any level of a scope hierarchy (`S`, `mg:S`, `0:mg:S`).
    pub scope: String,
    pub on_behalf_of: IdentityId,
    #[serde(default)]
    pub not_before: i64,
    /// `0` means the grant never expires.
    #[serde(default)]
    pub expire: i64,
}

impl NewGrant {
    pub fn validity(&self) -> Validity {
        Validity {
            not_before: self.not_before,
            expire: self.expire,
        }
    }
}

impl Validate for NewGrant {
    fn validate(&self) -> AapResult<()> {
        require_id("receiver", &self.receiver)?;
        require_id("publisher", &self.publisher)?;
        require_id("on_behalf_of", &self.on_behalf_of)?;
        ScopeName::parse(&self.scope)?;
        if !self.validity().is_well_formed() {
            return Err(AapError::invalid(format!(
                "validity window [{}, {}) is empty or negative",
                self.not_before, self.expire
            )));
        }
        Ok(())
    }
}

/// Filter for reading the grants held by one receiver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantFilter {
    pub receiver: IdentityId,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub publisher: Option<IdentityId>,
    #[serde(default)]
    pub on_behalf_of: Option<IdentityId>,
}

impl Validate for GrantFilter {
    fn validate(&self) -> AapResult<()> {
        require_id("receiver", &self.receiver)
    }
}

/// Delete one grant by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantRef {
    pub id: RuleId,
}

impl Validate for GrantRef {
    fn validate(&self) -> AapResult<()> {
        require_text("id", &self.id.0)
    }
}

/// Subscribe a client to a published scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSubscription {
    pub subscriber: IdentityId,
    pub publisher: IdentityId,
    pub scope: String,
    #[serde(default)]
    pub requested_by: IdentityId,
}

impl Validate for NewSubscription {
    fn validate(&self) -> AapResult<()> {
        require_id("subscriber", &self.subscriber)?;
        require_id("publisher", &self.publisher)?;
        ScopeName::parse(&self.scope)?;
        require_id("requested_by", &self.requested_by)
    }
}

/// Identifies one subscription edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionKey {
    pub subscriber: IdentityId,
    pub publisher: IdentityId,
    pub scope: String,
}

impl Validate for SubscriptionKey {
    fn validate(&self) -> AapResult<()> {
        require_id("subscriber", &self.subscriber)?;
        require_id("publisher", &self.publisher)?;
        require_text("scope", &self.scope)
    }
}

/// Filter for reading subscriptions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionFilter {
    #[serde(default)]
    pub subscriber: Option<IdentityId>,
    #[serde(default)]
    pub publisher: Option<IdentityId>,
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl Validate for SubscriptionFilter {
    fn validate(&self) -> AapResult<()> {
        Ok(())
    }
}

/// Identifies one consent triple (owner, publish rule, subscriber).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentKey {
    pub owner: IdentityId,
    pub subscriber: IdentityId,
    pub publisher: IdentityId,
    pub scope: String,
}

impl Validate for ConsentKey {
    fn validate(&self) -> AapResult<()> {
        require_id("owner", &self.owner)?;
        require_id("subscriber", &self.subscriber)?;
        require_id("publisher", &self.publisher)?;
        require_text("scope", &self.scope)
    }
}

/// Filter for reading consents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentFilter {
    #[serde(default)]
    pub owner: Option<IdentityId>,
    #[serde(default)]
    pub subscriber: Option<IdentityId>,
    /// Empty means any publisher.
    #[serde(default)]
    pub publishers: Vec<IdentityId>,
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl Validate for ConsentFilter {
    fn validate(&self) -> AapResult<()> {
        Ok(())
    }
}

/// One Judge question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JudgeRequest {
    pub publisher: IdentityId,
    pub requestor: IdentityId,
    pub scope: String,
    /// Acceptable owners. Empty means any owner.
    #[serde(default)]
    pub owners: Vec<IdentityId>,
}

impl Validate for JudgeRequest {
    fn validate(&self) -> AapResult<()> {
        require_id("publisher", &self.publisher)?;
        require_id("requestor", &self.requestor)?;
        require_text("scope", &self.scope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn publish(scope: &str, title: &str) -> NewPublish {
        NewPublish {
            publisher: IdentityId::from("p"),
            scope: scope.to_string(),
            title: title.to_string(),
            description: "d".to_string(),
            requested_by: IdentityId::from("p"),
        }
    }

    #[test]
    fn test_publish_rejects_whitespace_and_empty_title() {
        assert!(publish("read:file", "Read").validate().is_ok());
        assert!(publish("read file", "Read").validate().is_err());
        assert!(publish("read:file", "  ").validate().is_err());
        assert!(publish("mg:read:file", "Read").validate().is_err());
    }

    #[test]
    fn test_grant_rejects_inverted_window() {
        let mut grant = NewGrant {
            receiver: IdentityId::from("r"),
            publisher: IdentityId::from("p"),
            scope: "mg:read:file".to_string(),
            on_behalf_of: IdentityId::from("o"),
            not_before: 100,
            expire: 0,
        };
        assert!(grant.validate().is_ok());
        grant.expire = 50;
        assert!(matches!(grant.validate(), Err(AapError::InputValidation { .. })));
    }

    #[test]
    fn test_judge_request_requires_all_parties() {
        let req = JudgeRequest {
            publisher: IdentityId::from(""),
            requestor: IdentityId::from("r"),
            scope: "read".to_string(),
            owners: vec![],
        };
        assert!(req.validate().is_err());
    }
}
