//! The endpoint service.
//!
//! Every endpoint call follows the same pipeline:
//!
//! 1. Introspect the bearer token at the consent authority (no transaction).
//! 2. Decode the JSON array body, verifying each item against the endpoint's
//!    schema and stamping caller-derived fields.
//! 3. Hand the batch to the `BulkExecutor`, which validates every item and
//!    opens one transaction.
//! 4. Inside that transaction, authorize the caller against the endpoint's
//!    `aap:*` scope, then run the endpoint's handler item by item.
//! 5. After a committed subscription change, push scope updates in the
//!    background.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, error, info};

use aap_consent::{ConsentEngine, Decision};
use aap_contracts::{
    bulk::{ApiError, ErrorCode},
    consent::ConsentOutcome,
    error::{AapError, AapResult},
    identity::IdentityId,
    rules::{ConsentRule, GrantRule, PublishRule, ScopeRecord, Subscription},
    verdict::Verdict,
};
use aap_core::{
    bulk::BulkOutcome,
    traits::{Clock, ConsentAuthority, GraphStore, GraphTransaction, ScopeSync, SystemClock, Validate},
    BulkExecutor,
};
use aap_policy::{
    consent::{create_consent, delete_consent, fetch_consents},
    grant::{create_grant, delete_grant, fetch_grants},
    judge,
    publish::{create_publish, fetch_publishes},
    requests::{
        ConsentFilter, ConsentKey, GrantFilter, GrantRef, JudgeRequest, NewGrant, NewPublish, NewScope,
        NewSubscription, PublishFilter, ScopeFilter, SubscriptionFilter, SubscriptionKey,
    },
    scope::{create_scope, fetch_scopes},
    subscription::{create_subscription, delete_subscription, fetch_subscriptions},
};
use aap_verify::RequestVerifier;

use crate::{
    auth::{self, Principal},
    challenge::{ChallengeAccept, ChallengeRef},
    config::AapConfig,
    decode::{decode_batch, Decoded},
    endpoint::Endpoint,
    schemas::{schema_for, verifier},
    sync::spawn_scope_sync,
};

fn ok<O>(output: O) -> (u16, O) {
    (200, output)
}

fn no_stamp<I>(_: &Principal, _: &mut I) {}

fn stamp_requested_by(requested_by: &mut IdentityId, principal: &Principal) {
    if requested_by.is_empty() {
        *requested_by = principal.client.clone();
    }
}

/// All AAP endpoints over one graph store and one consent authority.
pub struct AapService {
    config: AapConfig,
    executor: BulkExecutor,
    consent: ConsentEngine,
    sync: Option<Arc<dyn ScopeSync>>,
    clock: Arc<dyn Clock>,
    verifier: RequestVerifier,
}

impl AapService {
    pub fn new(config: AapConfig, store: Arc<dyn GraphStore>, authority: Arc<dyn ConsentAuthority>) -> Self {
        Self {
            config,
            executor: BulkExecutor::new(store),
            consent: ConsentEngine::new(authority),
            sync: None,
            clock: Arc::new(SystemClock),
            verifier: verifier(),
        }
    }

    /// Push subscribed scopes to `sync` after every committed subscription
    /// change.
    pub fn with_scope_sync(mut self, sync: Arc<dyn ScopeSync>) -> Self {
        self.sync = Some(sync);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &AapConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn GraphStore> {
        self.executor.store()
    }

    // ── Pipeline ─────────────────────────────────────────────────────────────

    fn run<I, O, S, H>(
        &self,
        endpoint: Endpoint,
        token: &str,
        body: &Value,
        stamp: S,
        mut handler: H,
    ) -> AapResult<BulkOutcome<O>>
    where
        I: DeserializeOwned + Validate,
        S: Fn(&Principal, &mut I),
        H: FnMut(&Principal, &mut dyn GraphTransaction, &I) -> AapResult<(u16, O)>,
    {
        let required = endpoint.required_scope();
        let principal = auth::introspect(self.consent.authority().as_ref(), token, required)?;
        let items: Vec<Decoded<I>> =
            decode_batch(&self.verifier, &schema_for(endpoint), body, |input| stamp(&principal, input))?;
        debug!(endpoint = %endpoint, client = %principal.client, items = items.len(), "dispatching batch");

        let clock = self.clock.as_ref();
        let aap_identity = &self.config.aap_identity;
        let scopes = [required.to_string()];
        let mut denied = None;
        let outcome = self.executor.execute(
            endpoint.mode(),
            endpoint.limits(&self.config.limits),
            items,
            |tx, batch| {
                if let Err(err) = auth::authorize(&*tx, clock, aap_identity, &principal, &scopes) {
                    if err.is_internal() {
                        return Err(err);
                    }
                    batch.reject(&err);
                    denied = Some(err);
                    return Ok(());
                }
                batch.process(tx, |tx, item| handler(&principal, tx, item.input()?));
                Ok(())
            },
        )?;

        // An empty batch has no slot to carry the denial.
        match denied {
            Some(err) if outcome.responses.is_empty() => Err(err),
            _ => Ok(outcome),
        }
    }

    /// Push scopes for the subscribers touched by a committed batch.
    fn sync_after(&self, outcome: &BulkOutcome<Subscription>) {
        let Some(sync) = self.sync.as_ref() else {
            return;
        };
        if !outcome.committed {
            return;
        }
        let subscribers: BTreeSet<IdentityId> = outcome
            .responses
            .iter()
            .filter_map(|r| r.ok.as_ref())
            .map(|s| s.subscriber.clone())
            .collect();
        if subscribers.is_empty() {
            return;
        }
        spawn_scope_sync(self.store().clone(), sync.clone(), subscribers.into_iter().collect());
    }

    // ── Scopes ───────────────────────────────────────────────────────────────

    pub fn create_scopes(&self, token: &str, body: &Value) -> AapResult<BulkOutcome<Vec<ScopeRecord>>> {
        self.run(
            Endpoint::CreateScopes,
            token,
            body,
            |p, input: &mut NewScope| stamp_requested_by(&mut input.requested_by, p),
            |_, tx, input| create_scope(tx, input).map(ok),
        )
    }

    pub fn read_scopes(&self, token: &str, body: &Value) -> AapResult<BulkOutcome<Vec<ScopeRecord>>> {
        self.run(Endpoint::ReadScopes, token, body, no_stamp, |_, tx, input: &ScopeFilter| {
            fetch_scopes(&*tx, input).map(ok)
        })
    }

    // ── Publishes ────────────────────────────────────────────────────────────

    pub fn create_publishes(&self, token: &str, body: &Value) -> AapResult<BulkOutcome<PublishRule>> {
        let clock = self.clock.as_ref();
        self.run(
            Endpoint::CreatePublishes,
            token,
            body,
            |p, input: &mut NewPublish| stamp_requested_by(&mut input.requested_by, p),
            |_, tx, input| create_publish(tx, clock, input).map(ok),
        )
    }

    pub fn read_publishes(&self, token: &str, body: &Value) -> AapResult<BulkOutcome<Vec<PublishRule>>> {
        self.run(Endpoint::ReadPublishes, token, body, no_stamp, |_, tx, input: &PublishFilter| {
            fetch_publishes(&*tx, input).map(ok)
        })
    }

    // ── Grants ───────────────────────────────────────────────────────────────

    /// Create grants. Each item must pass the delegation gate first.
    pub fn create_grants(&self, token: &str, body: &Value) -> AapResult<BulkOutcome<GrantRule>> {
        let clock = self.clock.as_ref();
        self.run(Endpoint::CreateGrants, token, body, no_stamp, |principal, tx, input: &NewGrant| {
            auth::check_delegation(&*tx, clock, principal, input)?;
            create_grant(tx, input).map(ok)
        })
    }

    pub fn read_grants(&self, token: &str, body: &Value) -> AapResult<BulkOutcome<Vec<GrantRule>>> {
        self.run(Endpoint::ReadGrants, token, body, no_stamp, |_, tx, input: &GrantFilter| {
            fetch_grants(&*tx, input).map(ok)
        })
    }

    pub fn delete_grants(&self, token: &str, body: &Value) -> AapResult<BulkOutcome<GrantRule>> {
        self.run(Endpoint::DeleteGrants, token, body, no_stamp, |_, tx, input: &GrantRef| {
            delete_grant(tx, input).map(ok)
        })
    }

    // ── Subscriptions ────────────────────────────────────────────────────────

    pub fn create_subscriptions(&self, token: &str, body: &Value) -> AapResult<BulkOutcome<Subscription>> {
        let outcome = self.run(
            Endpoint::CreateSubscriptions,
            token,
            body,
            |p, input: &mut NewSubscription| stamp_requested_by(&mut input.requested_by, p),
            |_, tx, input| create_subscription(tx, input).map(ok),
        )?;
        self.sync_after(&outcome);
        Ok(outcome)
    }

    pub fn read_subscriptions(&self, token: &str, body: &Value) -> AapResult<BulkOutcome<Vec<Subscription>>> {
        self.run(Endpoint::ReadSubscriptions, token, body, no_stamp, |_, tx, input: &SubscriptionFilter| {
            fetch_subscriptions(&*tx, input).map(ok)
        })
    }

    pub fn delete_subscriptions(&self, token: &str, body: &Value) -> AapResult<BulkOutcome<Subscription>> {
        let outcome = self.run(Endpoint::DeleteSubscriptions, token, body, no_stamp, |_, tx, input: &SubscriptionKey| {
            delete_subscription(tx, input).map(ok)
        })?;
        self.sync_after(&outcome);
        Ok(outcome)
    }

    // ── Consents ─────────────────────────────────────────────────────────────

    /// Record consents. Callers may only consent for the owner they act for.
    pub fn create_consents(&self, token: &str, body: &Value) -> AapResult<BulkOutcome<ConsentRule>> {
        self.run(Endpoint::CreateConsents, token, body, no_stamp, |principal, tx, input: &ConsentKey| {
            auth::check_owner(principal, &input.owner)?;
            create_consent(tx, input).map(ok)
        })
    }

    pub fn read_consents(&self, token: &str, body: &Value) -> AapResult<BulkOutcome<Vec<ConsentRule>>> {
        self.run(Endpoint::ReadConsents, token, body, no_stamp, |_, tx, input: &ConsentFilter| {
            fetch_consents(&*tx, input).map(ok)
        })
    }

    pub fn delete_consents(&self, token: &str, body: &Value) -> AapResult<BulkOutcome<ConsentRule>> {
        self.run(Endpoint::DeleteConsents, token, body, no_stamp, |principal, tx, input: &ConsentKey| {
            auth::check_owner(principal, &input.owner)?;
            delete_consent(tx, input).map(ok)
        })
    }

    // ── Judge ────────────────────────────────────────────────────────────────

    pub fn judge(&self, token: &str, body: &Value) -> AapResult<BulkOutcome<Verdict>> {
        let clock = self.clock.as_ref();
        self.run(Endpoint::Judge, token, body, no_stamp, |_, tx, input: &JudgeRequest| {
            judge(&*tx, clock, input).map(ok)
        })
    }

    // ── Consent challenges ───────────────────────────────────────────────────

    /// Resolve a challenge: auto-accept or hand back the entries to decide.
    pub fn get_challenge(&self, token: &str, body: &Value) -> AapResult<BulkOutcome<ConsentOutcome>> {
        self.run(Endpoint::GetChallenge, token, body, no_stamp, |_, tx, input: &ChallengeRef| {
            self.consent.resolve(&*tx, &input.challenge).map(ok)
        })
    }

    pub fn accept_challenge(&self, token: &str, body: &Value) -> AapResult<BulkOutcome<ConsentOutcome>> {
        self.run(Endpoint::AcceptChallenge, token, body, no_stamp, |_, _, input: &ChallengeAccept| {
            self.consent.decide(&input.challenge, &input.decision()).map(ok)
        })
    }

    pub fn reject_challenge(&self, token: &str, body: &Value) -> AapResult<BulkOutcome<ConsentOutcome>> {
        self.run(Endpoint::RejectChallenge, token, body, no_stamp, |_, _, input: &ChallengeRef| {
            self.consent.decide(&input.challenge, &Decision::Reject).map(ok)
        })
    }

    // ── Dispatch ─────────────────────────────────────────────────────────────

    /// Run `endpoint` and render the HTTP-equivalent status and JSON body.
    pub fn dispatch(&self, endpoint: Endpoint, token: &str, body: &Value) -> (u16, Value) {
        let (status, response) = match endpoint {
            Endpoint::CreateScopes => respond(self.create_scopes(token, body)),
            Endpoint::ReadScopes => respond(self.read_scopes(token, body)),
            Endpoint::CreatePublishes => respond(self.create_publishes(token, body)),
            Endpoint::ReadPublishes => respond(self.read_publishes(token, body)),
            Endpoint::CreateGrants => respond(self.create_grants(token, body)),
            Endpoint::ReadGrants => respond(self.read_grants(token, body)),
            Endpoint::DeleteGrants => respond(self.delete_grants(token, body)),
            Endpoint::CreateSubscriptions => respond(self.create_subscriptions(token, body)),
            Endpoint::ReadSubscriptions => respond(self.read_subscriptions(token, body)),
            Endpoint::DeleteSubscriptions => respond(self.delete_subscriptions(token, body)),
            Endpoint::CreateConsents => respond(self.create_consents(token, body)),
            Endpoint::ReadConsents => respond(self.read_consents(token, body)),
            Endpoint::DeleteConsents => respond(self.delete_consents(token, body)),
            Endpoint::Judge => respond(self.judge(token, body)),
            Endpoint::GetChallenge => respond(self.get_challenge(token, body)),
            Endpoint::AcceptChallenge => respond(self.accept_challenge(token, body)),
            Endpoint::RejectChallenge => respond(self.reject_challenge(token, body)),
        };
        info!(endpoint = %endpoint, status, "request complete");
        (status, response)
    }
}

// ── Rendering ─────────────────────────────────────────────────────────────────

/// The status of a whole response: 200 when committed, otherwise the status
/// of the item that caused the abort.
pub fn outcome_status<O>(outcome: &BulkOutcome<O>) -> u16 {
    if outcome.committed {
        return 200;
    }
    outcome
        .responses
        .iter()
        .find(|r| !r.is_ok() && r.code() != Some(ErrorCode::FailedDueToOtherErrors))
        .map_or(500, |r| r.status)
}

fn error_body(err: &AapError) -> Value {
    let api = ApiError::from(err);
    json!({
        "code": api.code.as_str(),
        "error": api.error,
        "error_description": api.error_description,
    })
}

/// Render an endpoint result as (status, body).
///
/// Batch-level rejections become a single error object; batches become the
/// per-item response array.
pub fn respond<O: Serialize>(result: AapResult<BulkOutcome<O>>) -> (u16, Value) {
    match result {
        Ok(outcome) => {
            let status = outcome_status(&outcome);
            match serde_json::to_value(&outcome.responses) {
                Ok(body) => (status, body),
                Err(err) => {
                    error!(error = %err, "failed to render response");
                    (500, error_body(&AapError::graph("response rendering failed")))
                }
            }
        }
        Err(err) => (err.status(), error_body(&err)),
    }
}
