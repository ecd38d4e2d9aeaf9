//! Blocking HTTP client for the external consent authority's admin API.
//!
//! Endpoints used, relative to `base_url`:
//!
//! | Call | Method and path |
//! |---|---|
//! | get challenge | `GET /oauth2/auth/requests/consent?consent_challenge=..` |
//! | accept | `PUT /oauth2/auth/requests/consent/accept?consent_challenge=..` |
//! | reject | `PUT /oauth2/auth/requests/consent/reject?consent_challenge=..` |
//! | introspect | `POST /oauth2/introspect` (form encoded) |
//! | scope sync | `PATCH /clients/{id}` (JSON patch) |
//!
//! Every non-success response becomes `AapError::Authority`.

use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use aap_contracts::{
    consent::{AcceptConsent, ConsentChallenge, Introspection, Redirect, RejectConsent},
    error::{AapError, AapResult},
    identity::IdentityId,
};
use aap_core::traits::{ConsentAuthority, ScopeSync};

const CONSENT_PATH: &str = "/oauth2/auth/requests/consent";
const INTROSPECT_PATH: &str = "/oauth2/introspect";
const CLIENTS_PATH: &str = "/clients";

fn default_timeout_secs() -> u64 {
    10
}

/// Where the consent authority lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorityConfig {
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for AuthorityConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:4445".to_string(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

// ── Wire shapes ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ClientWire {
    client_id: String,
}

/// The authority's consent request as it appears on the wire.
#[derive(Debug, Deserialize)]
pub(crate) struct ChallengeWire {
    challenge: String,
    #[serde(default)]
    subject: String,
    client: ClientWire,
    #[serde(default)]
    requested_scope: Vec<String>,
    #[serde(default)]
    requested_access_token_audience: Vec<String>,
    #[serde(default)]
    skip: bool,
}

impl From<ChallengeWire> for ConsentChallenge {
    fn from(wire: ChallengeWire) -> Self {
        ConsentChallenge {
            challenge: wire.challenge,
            subject: IdentityId::new(wire.subject),
            client_id: IdentityId::new(wire.client.client_id),
            requested_scopes: wire.requested_scope,
            requested_audiences: wire
                .requested_access_token_audience
                .into_iter()
                .map(IdentityId::new)
                .collect(),
            skip: wire.skip,
        }
    }
}

// ── Client ────────────────────────────────────────────────────────────────────

/// `ConsentAuthority` and `ScopeSync` over HTTP.
#[derive(Debug, Clone)]
pub struct HttpConsentAuthority {
    client: Client,
    base_url: String,
}

impl HttpConsentAuthority {
    pub fn new(config: &AuthorityConfig) -> AapResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AapError::Config {
                reason: format!("failed to create consent authority HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send `request` and decode a JSON body, mapping every failure to
    /// `AapError::Authority`.
    fn send<T: DeserializeOwned>(&self, what: &str, request: RequestBuilder) -> AapResult<T> {
        let response = request.send().map_err(|e| authority_error(what, e))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            warn!(call = what, %status, "consent authority returned an error");
            return Err(AapError::Authority {
                reason: format!("{what} returned {status}: {body}"),
            });
        }
        response.json::<T>().map_err(|e| authority_error(what, e))
    }
}

fn authority_error(what: &str, err: reqwest::Error) -> AapError {
    AapError::Authority {
        reason: format!("{what} failed: {err}"),
    }
}

impl ConsentAuthority for HttpConsentAuthority {
    fn get_challenge(&self, challenge: &str) -> AapResult<ConsentChallenge> {
        debug!(challenge, "fetching consent challenge");
        let request = self
            .client
            .get(self.url(CONSENT_PATH))
            .query(&[("consent_challenge", challenge)]);
        let wire: ChallengeWire = self.send("get consent challenge", request)?;
        Ok(wire.into())
    }

    fn accept(&self, challenge: &str, body: &AcceptConsent) -> AapResult<Redirect> {
        debug!(challenge, scopes = ?body.grant_scope, "accepting consent challenge");
        let request = self
            .client
            .put(self.url(&format!("{CONSENT_PATH}/accept")))
            .query(&[("consent_challenge", challenge)])
            .json(body);
        self.send("accept consent challenge", request)
    }

    fn reject(&self, challenge: &str, body: &RejectConsent) -> AapResult<Redirect> {
        debug!(challenge, error = %body.error, "rejecting consent challenge");
        let request = self
            .client
            .put(self.url(&format!("{CONSENT_PATH}/reject")))
            .query(&[("consent_challenge", challenge)])
            .json(body);
        self.send("reject consent challenge", request)
    }

    fn introspect(&self, token: &str, required_scope: &str) -> AapResult<Introspection> {
        let mut form = vec![("token", token)];
        if !required_scope.is_empty() {
            form.push(("scope", required_scope));
        }
        let request = self.client.post(self.url(INTROSPECT_PATH)).form(&form);
        self.send("introspect token", request)
    }
}

impl ScopeSync for HttpConsentAuthority {
    fn sync_client_scopes(&self, client: &IdentityId, scopes: &[String]) -> AapResult<()> {
        let patch = json!([{ "op": "replace", "path": "/scope", "value": scopes.join(" ") }]);
        let request = self
            .client
            .patch(self.url(&format!("{CLIENTS_PATH}/{client}")))
            .json(&patch);
        let _: serde_json::Value = self.send("sync client scopes", request)?;
        debug!(client = %client, scopes = scopes.len(), "client scopes synchronized");
        Ok(())
    }
}
