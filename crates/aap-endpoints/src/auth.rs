//! App-level authorization.
//!
//! A caller is identified by introspecting its bearer token at the consent
//! authority, then authorized by asking the Judge whether the token's client
//! holds the endpoint's `aap:*` scopes from the AAP identity. The owner filter
//! is the token's subject, or the client itself for client-credential tokens.
//!
//! Consent rules may only be written for the owner the caller acts for.
//!
//! Grant creation adds a delegation gate on top: the caller must hold the
//! scope one level above the one being granted, from the same publisher, on
//! behalf of the grant's owner.

use tracing::{debug, warn};

use aap_contracts::{
    error::{AapError, AapResult},
    identity::IdentityId,
    scope::ScopeName,
    verdict::Authorization,
};
use aap_core::traits::{Clock, ConsentAuthority, GraphTransaction};
use aap_policy::{judge, judge_all, requests::JudgeRequest, requests::NewGrant};

/// The authenticated caller of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    /// The OAuth2 client that presented the token.
    pub client: IdentityId,
    /// The resource owner the token was issued for, if any.
    pub subject: Option<IdentityId>,
}

impl Principal {
    /// The owner the caller acts for.
    pub fn owner(&self) -> &IdentityId {
        self.subject.as_ref().unwrap_or(&self.client)
    }
}

/// Resolve `token` into a principal.
///
/// `required_scope` is passed along so the authority can also check the
/// token's own scope claim.
pub fn introspect(authority: &dyn ConsentAuthority, token: &str, required_scope: &str) -> AapResult<Principal> {
    if token.trim().is_empty() {
        return Err(AapError::Unauthorized {
            reason: "missing bearer token".to_string(),
        });
    }
    let introspection = authority.introspect(token, required_scope)?;
    if !introspection.active {
        warn!("inactive token presented");
        return Err(AapError::Unauthorized {
            reason: "token is not active".to_string(),
        });
    }
    let client = introspection
        .client_id
        .filter(|c| !c.trim().is_empty())
        .map(IdentityId::new)
        .ok_or_else(|| AapError::Unauthorized {
            reason: "token carries no client id".to_string(),
        })?;
    let subject = introspection
        .sub
        .filter(|s| !s.trim().is_empty())
        .map(IdentityId::new);
    debug!(client = %client, subject = ?subject, "token introspected");
    Ok(Principal { client, subject })
}

/// Require that `principal` holds every scope in `scopes`, published by
/// `aap_identity`.
pub fn authorize(
    tx: &dyn GraphTransaction,
    clock: &dyn Clock,
    aap_identity: &IdentityId,
    principal: &Principal,
    scopes: &[String],
) -> AapResult<Authorization> {
    let authorization = judge_all(
        tx,
        clock,
        aap_identity,
        &principal.client,
        scopes,
        std::slice::from_ref(principal.owner()),
    )?;
    if !authorization.granted {
        warn!(
            client = %principal.client,
            missing = ?authorization.missing_scopes,
            "caller not authorized"
        );
        return Err(AapError::Forbidden {
            reason: format!("missing required scopes: {}", authorization.missing_scopes.join(", ")),
        });
    }
    Ok(authorization)
}

/// Require that `principal` may create `grant`.
pub fn check_delegation(
    tx: &dyn GraphTransaction,
    clock: &dyn Clock,
    principal: &Principal,
    grant: &NewGrant,
) -> AapResult<()> {
    let granting = ScopeName::parse(&grant.scope)?.granting_scope().full();
    let verdict = judge(
        tx,
        clock,
        &JudgeRequest {
            publisher: grant.publisher.clone(),
            requestor: principal.client.clone(),
            scope: granting.clone(),
            owners: vec![grant.on_behalf_of.clone()],
        },
    )?;
    if !verdict.granted {
        return Err(AapError::Forbidden {
            reason: format!(
                "'{}' may not grant '{}' on behalf of '{}' without '{granting}'",
                principal.client, grant.scope, grant.on_behalf_of
            ),
        });
    }
    Ok(())
}

/// Require that `principal` acts for `owner`.
pub fn check_owner(principal: &Principal, owner: &IdentityId) -> AapResult<()> {
    if principal.owner() != owner {
        warn!(client = %principal.client, acting_for = %principal.owner(), owner = %owner, "consent owner mismatch");
        return Err(AapError::Forbidden {
            reason: format!("'{}' may not manage consents of '{owner}'", principal.owner()),
        });
    }
    Ok(())
}
