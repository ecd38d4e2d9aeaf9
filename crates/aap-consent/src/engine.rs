//! Consent challenge resolution and explicit owner decisions.
//!
//! `ConsentEngine` drives a `ConsentFlow` for every call. It reads the
//! policy graph through the caller's transaction and talks to the consent
//! authority through the `ConsentAuthority` seam. Authority calls are never
//! retried; a failure aborts the call with `AapError::Authority`.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{info, warn};

use aap_contracts::{
    consent::{AcceptConsent, ConsentChallenge, ConsentEntry, ConsentOutcome, RejectConsent},
    error::{AapError, AapResult},
    identity::IdentityId,
    rules::Subscription,
};
use aap_core::traits::{ConsentAuthority, GraphTransaction};
use aap_policy::{
    consent::fetch_consents,
    publish::fetch_publishes,
    requests::{ConsentFilter, PublishFilter, SubscriptionFilter},
    subscription::fetch_subscriptions,
};

use crate::state::{ConsentFlow, ConsentState, Resolution};

/// An owner's explicit answer to a challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Accept the listed scopes, which must be a subset of the requested ones.
    Accept { grant_scopes: Vec<String> },
    Reject,
}

/// Resolves consent challenges against the policy graph.
#[derive(Clone)]
pub struct ConsentEngine {
    authority: Arc<dyn ConsentAuthority>,
}

impl ConsentEngine {
    pub fn new(authority: Arc<dyn ConsentAuthority>) -> Self {
        Self { authority }
    }

    pub fn authority(&self) -> &Arc<dyn ConsentAuthority> {
        &self.authority
    }

    /// Resolve a fresh challenge.
    ///
    /// Accepts at the authority when the challenge is flagged `skip` or the
    /// owner already consented to every requested (publisher, scope) pair.
    /// Otherwise returns the entries the owner has to decide on and leaves
    /// the authority untouched.
    ///
    /// # Errors
    ///
    /// - `NoSubscriptions` if some requested publisher has none of the
    ///   requested scopes subscribed by the client.
    /// - `InvalidScopes` naming exactly the requested scopes the client is
    ///   not subscribed to.
    /// - `Authority` if the authority call fails.
    pub fn resolve(&self, tx: &dyn GraphTransaction, challenge_id: &str) -> AapResult<ConsentOutcome> {
        let mut flow = ConsentFlow::new(challenge_id);
        let challenge = self.authority.get_challenge(challenge_id)?;
        let subscriptions = subscription_gate(tx, &challenge)?;

        let consents = fetch_consents(
            tx,
            &ConsentFilter {
                owner: Some(challenge.subject.clone()),
                subscriber: Some(challenge.client_id.clone()),
                publishers: challenge.requested_audiences.clone(),
                scopes: challenge.requested_scopes.clone(),
            },
        )?;
        let consented: BTreeSet<(&IdentityId, &str)> =
            consents.iter().map(|c| (&c.publisher, c.scope.as_str())).collect();
        let all_consented = subscriptions
            .iter()
            .all(|s| consented.contains(&(&s.publisher, s.scope.as_str())));

        if challenge.skip || all_consented {
            flow.advance(ConsentState::Resolved(Resolution::Skip))?;
            let body = AcceptConsent {
                grant_scope: challenge.requested_scopes.clone(),
                grant_access_token_audience: audience_strings(&challenge),
                remember: true,
                remember_for: 0,
            };
            let redirect = self.authority.accept(challenge_id, &body)?;
            flow.advance(ConsentState::AutoAccepted)?;
            flow.advance(ConsentState::Terminal)?;
            info!(
                challenge = %challenge_id,
                subject = %challenge.subject,
                client_id = %challenge.client_id,
                skip = challenge.skip,
                "consent auto-accepted"
            );
            return Ok(ConsentOutcome::AutoAccepted {
                redirect_to: redirect.redirect_to,
            });
        }

        flow.advance(ConsentState::Resolved(Resolution::NeedsDecision))?;
        let mut entries = Vec::with_capacity(subscriptions.len());
        for subscription in &subscriptions {
            let (title, description) = publish_metadata(tx, subscription)?;
            entries.push(ConsentEntry {
                scope: subscription.scope.clone(),
                publisher: subscription.publisher.clone(),
                title,
                description,
                consented: consented.contains(&(&subscription.publisher, subscription.scope.as_str())),
            });
        }
        info!(
            challenge = %challenge_id,
            subject = %challenge.subject,
            client_id = %challenge.client_id,
            entries = entries.len(),
            "consent needs owner decision"
        );
        Ok(ConsentOutcome::NeedsDecision {
            subject: challenge.subject,
            client_id: challenge.client_id,
            entries,
        })
    }

    /// Forward an owner's explicit decision to the authority.
    ///
    /// The policy graph is only read; recording consent rules is the
    /// consents endpoint's job.
    pub fn decide(&self, challenge_id: &str, decision: &Decision) -> AapResult<ConsentOutcome> {
        let mut flow = ConsentFlow::new(challenge_id);
        let challenge = self.authority.get_challenge(challenge_id)?;
        flow.advance(ConsentState::Resolved(Resolution::NeedsDecision))?;

        let outcome = match decision {
            Decision::Accept { grant_scopes } => {
                let unknown: Vec<String> = grant_scopes
                    .iter()
                    .filter(|s| !challenge.requested_scopes.contains(s))
                    .cloned()
                    .collect();
                if !unknown.is_empty() {
                    warn!(challenge = %challenge_id, ?unknown, "accepted scopes were never requested");
                    return Err(AapError::InvalidScopes { scopes: unknown });
                }
                let body = AcceptConsent {
                    grant_scope: grant_scopes.clone(),
                    grant_access_token_audience: audience_strings(&challenge),
                    remember: false,
                    remember_for: 0,
                };
                let redirect = self.authority.accept(challenge_id, &body)?;
                flow.advance(ConsentState::UserAccepted)?;
                ConsentOutcome::UserAccepted {
                    redirect_to: redirect.redirect_to,
                    granted_scopes: grant_scopes.clone(),
                }
            }
            Decision::Reject => {
                let redirect = self.authority.reject(challenge_id, &RejectConsent::access_denied())?;
                flow.advance(ConsentState::UserRejected)?;
                ConsentOutcome::UserRejected {
                    redirect_to: redirect.redirect_to,
                }
            }
        };
        flow.advance(ConsentState::Terminal)?;
        info!(challenge = %challenge_id, subject = %challenge.subject, ?decision, "consent decided");
        Ok(outcome)
    }
}

fn audience_strings(challenge: &ConsentChallenge) -> Vec<String> {
    challenge.requested_audiences.iter().map(|a| a.to_string()).collect()
}

/// Subscriptions of the client covering the requested scopes.
///
/// Every requested audience must contribute at least one subscription,
/// otherwise the challenge fails with `NoSubscriptions`. `InvalidScopes`
/// names the requested scopes no subscription covers.
fn subscription_gate(tx: &dyn GraphTransaction, challenge: &ConsentChallenge) -> AapResult<Vec<Subscription>> {
    let publishers: Vec<Option<IdentityId>> = if challenge.requested_audiences.is_empty() {
        vec![None]
    } else {
        challenge.requested_audiences.iter().cloned().map(Some).collect()
    };

    let mut subscriptions = Vec::new();
    for publisher in publishers {
        let filter = SubscriptionFilter {
            subscriber: Some(challenge.client_id.clone()),
            publisher: publisher.clone(),
            scopes: challenge.requested_scopes.clone(),
        };
        let found = fetch_subscriptions(tx, &filter)?;
        if found.is_empty() {
            warn!(
                client_id = %challenge.client_id,
                audience = ?publisher,
                "consent requested without subscriptions"
            );
            return Err(AapError::NoSubscriptions {
                subscriber: challenge.client_id.to_string(),
            });
        }
        subscriptions.extend(found);
    }

    let subscribed: BTreeSet<&str> = subscriptions.iter().map(|s| s.scope.as_str()).collect();
    let mut missing: Vec<String> = Vec::new();
    for scope in &challenge.requested_scopes {
        if !subscribed.contains(scope.as_str()) && !missing.contains(scope) {
            missing.push(scope.clone());
        }
    }
    if !missing.is_empty() {
        warn!(client_id = %challenge.client_id, ?missing, "consent requested for unsubscribed scopes");
        return Err(AapError::InvalidScopes { scopes: missing });
    }
    Ok(subscriptions)
}

fn publish_metadata(tx: &dyn GraphTransaction, subscription: &Subscription) -> AapResult<(String, String)> {
    let filter = PublishFilter {
        publisher: Some(subscription.publisher.clone()),
        scopes: vec![subscription.scope.clone()],
    };
    fetch_publishes(tx, &filter)?
        .into_iter()
        .next()
        .map(|p| (p.title, p.description))
        .ok_or_else(|| {
            AapError::graph(format!(
                "subscription of '{}' points at no publish rule for '{}' by '{}'",
                subscription.subscriber, subscription.scope, subscription.publisher
            ))
        })
}
