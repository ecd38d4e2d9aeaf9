//! An in-process consent authority.
//!
//! Stands in for the OAuth2 admin API so the demo runs without a network:
//! tokens and challenges are registered up front, decisions and scope
//! pushes are logged and kept for inspection.

use std::collections::BTreeMap;
use std::sync::Mutex;

use tracing::info;

use aap_contracts::{
    consent::{AcceptConsent, ConsentChallenge, Introspection, Redirect, RejectConsent},
    error::{AapError, AapResult},
    identity::IdentityId,
};
use aap_core::traits::{ConsentAuthority, ScopeSync};

#[derive(Default)]
pub struct LocalAuthority {
    tokens: Mutex<BTreeMap<String, Introspection>>,
    challenges: Mutex<BTreeMap<String, ConsentChallenge>>,
    pushed: Mutex<BTreeMap<IdentityId, Vec<String>>>,
}

impl LocalAuthority {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue `token` to `client`, optionally on behalf of `subject`.
    pub fn issue_token(&self, token: &str, client: &IdentityId, subject: Option<&IdentityId>) {
        let introspection = Introspection {
            active: true,
            client_id: Some(client.to_string()),
            sub: subject.map(IdentityId::to_string),
            token_type: Some("access_token".to_string()),
            scope: None,
        };
        lock(&self.tokens).insert(token.to_string(), introspection);
    }

    pub fn open_challenge(&self, challenge: ConsentChallenge) {
        lock(&self.challenges).insert(challenge.challenge.clone(), challenge);
    }

    /// The last scope set pushed for `client`.
    pub fn pushed_scopes(&self, client: &IdentityId) -> Option<Vec<String>> {
        lock(&self.pushed).get(client).cloned()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl ConsentAuthority for LocalAuthority {
    fn get_challenge(&self, challenge: &str) -> AapResult<ConsentChallenge> {
        lock(&self.challenges)
            .get(challenge)
            .cloned()
            .ok_or_else(|| AapError::Authority {
                reason: format!("unknown consent challenge '{challenge}'"),
            })
    }

    fn accept(&self, challenge: &str, body: &AcceptConsent) -> AapResult<Redirect> {
        info!(challenge, scopes = ?body.grant_scope, remember = body.remember, "authority: consent accepted");
        Ok(Redirect {
            redirect_to: format!("https://app.example/callback?consent={challenge}"),
        })
    }

    fn reject(&self, challenge: &str, body: &RejectConsent) -> AapResult<Redirect> {
        info!(challenge, error = %body.error, "authority: consent rejected");
        Ok(Redirect {
            redirect_to: format!("https://app.example/callback?error={}", body.error),
        })
    }

    fn introspect(&self, token: &str, _required_scope: &str) -> AapResult<Introspection> {
        Ok(lock(&self.tokens).get(token).cloned().unwrap_or_default())
    }
}

impl ScopeSync for LocalAuthority {
    fn sync_client_scopes(&self, client: &IdentityId, scopes: &[String]) -> AapResult<()> {
        info!(client = %client, scopes = ?scopes, "authority: client scopes replaced");
        lock(&self.pushed).insert(client.clone(), scopes.to_vec());
        Ok(())
    }
}
