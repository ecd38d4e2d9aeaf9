//! # aap-endpoints
//!
//! The app-level surface of the AAP engine: one bulk handler per endpoint,
//! configuration, request decoding, caller authorization, and post-commit
//! scope synchronization.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use aap_endpoints::{AapConfig, AapService, Endpoint};
//!
//! let config = AapConfig::from_file(Path::new("aap.toml"))?;
//! let authority = Arc::new(HttpConsentAuthority::new(&config.authority)?);
//! let service = AapService::new(config, store, authority.clone()).with_scope_sync(authority);
//!
//! let (status, body) = service.dispatch(Endpoint::Judge, bearer_token, &request_body);
//! ```

pub mod auth;
pub mod bootstrap;
pub mod challenge;
pub mod config;
pub mod decode;
pub mod endpoint;
pub mod schemas;
pub mod service;
pub mod sync;

pub use bootstrap::{bootstrap, BootstrapReport};
pub use config::AapConfig;
pub use endpoint::Endpoint;
pub use service::AapService;

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::{mpsc, Arc, Mutex};
    use std::time::Duration;

    use serde_json::{json, Value};

    use aap_contracts::{
        consent::{AcceptConsent, ConsentChallenge, Introspection, Redirect, RejectConsent},
        error::{AapError, AapResult},
        identity::{IdentityId, IdentityKind},
    };
    use aap_core::traits::{ConsentAuthority, FixedClock, ScopeSync};
    use aap_graph::MemoryGraphStore;

    use super::*;

    const NOW: i64 = 1_700_000_000;

    // ── Mocks ────────────────────────────────────────────────────────────────

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Get,
        Accept(AcceptConsent),
        Reject,
    }

    struct MockAuthority {
        tokens: BTreeMap<String, Introspection>,
        challenge: ConsentChallenge,
        calls: Arc<Mutex<Vec<Call>>>,
    }

    impl ConsentAuthority for MockAuthority {
        fn get_challenge(&self, _challenge: &str) -> AapResult<ConsentChallenge> {
            self.calls.lock().unwrap().push(Call::Get);
            Ok(self.challenge.clone())
        }

        fn accept(&self, _challenge: &str, body: &AcceptConsent) -> AapResult<Redirect> {
            self.calls.lock().unwrap().push(Call::Accept(body.clone()));
            Ok(Redirect {
                redirect_to: "https://app.example/cb?ok".to_string(),
            })
        }

        fn reject(&self, _challenge: &str, _body: &RejectConsent) -> AapResult<Redirect> {
            self.calls.lock().unwrap().push(Call::Reject);
            Ok(Redirect {
                redirect_to: "https://app.example/cb?denied".to_string(),
            })
        }

        fn introspect(&self, token: &str, _required_scope: &str) -> AapResult<Introspection> {
            Ok(self.tokens.get(token).cloned().unwrap_or_default())
        }
    }

    /// Forwards every push to the test thread.
    struct ChannelSync(Mutex<mpsc::Sender<(IdentityId, Vec<String>)>>);

    impl ScopeSync for ChannelSync {
        fn sync_client_scopes(&self, client: &IdentityId, scopes: &[String]) -> AapResult<()> {
            let _ = self.0.lock().unwrap().send((client.clone(), scopes.to_vec()));
            Ok(())
        }
    }

    // ── Fixture ──────────────────────────────────────────────────────────────

    struct Fixture {
        service: AapService,
        calls: Arc<Mutex<Vec<Call>>>,
        synced: mpsc::Receiver<(IdentityId, Vec<String>)>,
    }

    impl Fixture {
        fn call(&self, endpoint: Endpoint, token: &str, body: Value) -> (u16, Value) {
            self.service.dispatch(endpoint, token, &body)
        }

        fn publish(&self, scope: &str) {
            let (status, body) = self.call(
                Endpoint::CreatePublishes,
                "admin-token",
                json!([{ "publisher": "api", "scope": scope, "title": scope, "description": scope }]),
            );
            assert_eq!(status, 200, "{body}");
        }

        fn subscribe(&self, scope: &str) {
            let (status, body) = self.call(
                Endpoint::CreateSubscriptions,
                "admin-token",
                json!([{ "subscriber": "app", "publisher": "api", "scope": scope }]),
            );
            assert_eq!(status, 200, "{body}");
        }
    }

    fn id(s: &str) -> IdentityId {
        IdentityId::from(s)
    }

    fn client_token(client: &str) -> Introspection {
        Introspection {
            active: true,
            client_id: Some(client.to_string()),
            ..Introspection::default()
        }
    }

    fn fixture() -> Fixture {
        let store = MemoryGraphStore::new();
        let seeds = [
            ("aap", IdentityKind::ResourceServer),
            ("admin", IdentityKind::Client),
            ("ops", IdentityKind::Client),
            ("mallory", IdentityKind::Client),
            ("alice", IdentityKind::Human),
            ("api", IdentityKind::ResourceServer),
            ("app", IdentityKind::Client),
        ];
        for (who, kind) in seeds {
            store.seed_identity(&id(who), &[kind]).unwrap();
        }
        bootstrap(&store, &FixedClock(NOW), &id("aap"), &[id("admin"), id("ops")]).unwrap();

        let mut tokens = BTreeMap::new();
        for client in ["admin", "ops", "mallory"] {
            tokens.insert(format!("{client}-token"), client_token(client));
        }
        for (token, subject) in [("alice-session", "alice"), ("bob-session", "bob")] {
            tokens.insert(
                token.to_string(),
                Introspection {
                    sub: Some(subject.to_string()),
                    ..client_token("admin")
                },
            );
        }
        tokens.insert(
            "expired-token".to_string(),
            Introspection {
                active: false,
                ..client_token("admin")
            },
        );

        let calls = Arc::new(Mutex::new(Vec::new()));
        let authority = MockAuthority {
            tokens,
            challenge: ConsentChallenge {
                challenge: "ch-1".to_string(),
                subject: id("alice"),
                client_id: id("app"),
                requested_scopes: vec!["read:file".to_string(), "write:file".to_string()],
                requested_audiences: vec![id("api")],
                skip: false,
            },
            calls: calls.clone(),
        };
        let (tx, synced) = mpsc::channel();

        let service = AapService::new(AapConfig::default(), Arc::new(store), Arc::new(authority))
            .with_scope_sync(Arc::new(ChannelSync(Mutex::new(tx))))
            .with_clock(Arc::new(FixedClock(NOW)));
        Fixture { service, calls, synced }
    }

    fn code(item: &Value) -> &str {
        item["error"]["code"].as_str().unwrap_or("")
    }

    // ── Configuration ────────────────────────────────────────────────────────

    #[test]
    fn test_config_parses_every_section() {
        let toml = r#"
aap_identity = "aap-prod"
log_filter = "debug"

[authority]
base_url = "http://hydra:4445"
timeout_secs = 3

[limits]
default_max_requests = 50

[limits.max_requests]
"judge" = 500
"#;
        let config = AapConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.aap_identity, id("aap-prod"));
        assert_eq!(config.log_filter, "debug");
        assert_eq!(config.authority.base_url, "http://hydra:4445");
        assert_eq!(config.authority.timeout_secs, 3);
        assert_eq!(config.limits.max_for("judge"), 500);
        assert_eq!(config.limits.max_for("grants.create"), 50);
    }

    #[test]
    fn test_config_defaults() {
        let config = AapConfig::from_toml_str("").unwrap();
        assert_eq!(config, AapConfig::default());
        assert_eq!(config.aap_identity, id("aap"));
        assert_eq!(config.limits.default_max_requests, 100);
        assert_eq!(config.authority.timeout_secs, 10);
    }

    #[test]
    fn test_config_rejects_unknown_endpoint_and_bad_toml() {
        let unknown = AapConfig::from_toml_str("[limits.max_requests]\n\"grants.upsert\" = 5\n");
        assert!(matches!(unknown, Err(AapError::Config { .. })));

        let malformed = AapConfig::from_toml_str("aap_identity = ");
        assert!(matches!(malformed, Err(AapError::Config { .. })));

        let missing = AapConfig::from_file(std::path::Path::new("/nonexistent/aap.toml"));
        assert!(matches!(missing, Err(AapError::Config { .. })));
    }

    // ── Catalogue ────────────────────────────────────────────────────────────

    #[test]
    fn test_endpoint_limits() {
        let limits = config::LimitsConfig::default();
        assert_eq!(Endpoint::AcceptChallenge.limits(&limits).max_requests, 1);
        assert!(!Endpoint::Judge.limits(&limits).allow_empty);
        assert!(Endpoint::ReadScopes.limits(&limits).allow_empty);
        assert_eq!(Endpoint::parse("grants.delete"), Some(Endpoint::DeleteGrants));
        assert_eq!(Endpoint::parse("grants"), None);
    }

    #[test]
    fn test_bootstrap_is_idempotent() {
        let store = MemoryGraphStore::new();
        for who in ["aap", "admin"] {
            store.seed_identity(&id(who), &[IdentityKind::Client]).unwrap();
        }
        let first = bootstrap(&store, &FixedClock(NOW), &id("aap"), &[id("admin")]).unwrap();
        assert_eq!(first.scopes_published, Endpoint::ALL.len());
        assert_eq!(first.grants_created, Endpoint::ALL.len());

        let second = bootstrap(&store, &FixedClock(NOW), &id("aap"), &[id("admin")]).unwrap();
        assert_eq!(second.grants_created, 0);
    }

    // ── Caller authorization ─────────────────────────────────────────────────

    #[test]
    fn test_inactive_or_missing_token_is_unauthorized() {
        let f = fixture();
        for token in ["expired-token", "unknown-token", ""] {
            let (status, body) = f.call(Endpoint::ReadScopes, token, json!([]));
            assert_eq!(status, 401, "token {token:?}");
            assert_eq!(body["code"], "UNAUTHORIZED");
        }
    }

    #[test]
    fn test_caller_without_endpoint_scope_is_forbidden() {
        let f = fixture();
        let (status, body) = f.call(Endpoint::CreateScopes, "mallory-token", json!([{ "name": "x" }, { "name": "y" }]));
        assert_eq!(status, 403);
        assert!(body.as_array().unwrap().iter().all(|item| code(item) == "FORBIDDEN"));

        let (_, scopes) = f.call(Endpoint::ReadScopes, "admin-token", json!([{ "name": "x" }]));
        assert_eq!(scopes[0]["ok"], json!([]), "nothing may be written");

        // An empty batch has no item to carry the denial.
        let (status, body) = f.call(Endpoint::ReadScopes, "mallory-token", json!([]));
        assert_eq!(status, 403);
        assert_eq!(body["code"], "FORBIDDEN");
    }

    // ── Envelope ─────────────────────────────────────────────────────────────

    #[test]
    fn test_body_must_be_an_array() {
        let f = fixture();
        let (status, body) = f.call(Endpoint::CreateScopes, "admin-token", json!({ "name": "x" }));
        assert_eq!(status, 400);
        assert_eq!(body["code"], "INPUT_VALIDATION_FAILED");
    }

    #[test]
    fn test_invalid_item_aborts_batch_before_any_write() {
        let f = fixture();
        let (status, body) = f.call(
            Endpoint::CreatePublishes,
            "admin-token",
            json!([
                { "publisher": "api", "scope": "read:file", "title": "Read", "description": "Read files" },
                { "publisher": "api", "scope": "write file", "title": "Write", "description": "Write files" }
            ]),
        );
        assert_eq!(status, 400);
        assert_eq!(code(&body[0]), "FAILED_DUE_TO_OTHER_ERRORS");
        assert_eq!(code(&body[1]), "INPUT_VALIDATION_FAILED");

        let (_, read) = f.call(Endpoint::ReadPublishes, "admin-token", json!([{ "publisher": "api" }]));
        assert_eq!(read[0]["ok"], json!([]));
    }

    #[test]
    fn test_schema_rejections() {
        let f = fixture();
        let cases = [
            (Endpoint::CreateScopes, json!([{ "name": "mg:read" }])),
            (Endpoint::CreateScopes, json!([{ "name": "read", "bogus": true }])),
            (Endpoint::CreateScopes, json!([{ "name": "  " }])),
            (
                Endpoint::CreateGrants,
                json!([{
                    "receiver": "app", "publisher": "api", "scope": "read:file",
                    "on_behalf_of": "alice", "not_before": 100, "expire": 50
                }]),
            ),
            (Endpoint::Judge, json!([{ "publisher": "api", "requestor": "app" }])),
        ];
        for (endpoint, request) in cases {
            let (status, body) = f.call(endpoint, "admin-token", request.clone());
            assert_eq!(status, 400, "{endpoint} {request}");
            assert_eq!(code(&body[0]), "INPUT_VALIDATION_FAILED", "{endpoint} {request}");
        }
    }

    #[test]
    fn test_batch_size_limits() {
        let f = fixture();
        let (status, body) = f.call(Endpoint::Judge, "admin-token", json!([]));
        assert_eq!(status, 400);
        assert_eq!(body["code"], "EMPTY_REQUEST_NOT_ALLOWED");

        let (status, body) = f.call(
            Endpoint::GetChallenge,
            "admin-token",
            json!([{ "challenge": "a" }, { "challenge": "b" }]),
        );
        assert_eq!(status, 400);
        assert_eq!(body["code"], "MAX_REQUESTS_EXCEEDED");

        let (status, body) = f.call(Endpoint::ReadSubscriptions, "admin-token", json!([]));
        assert_eq!(status, 200);
        assert_eq!(body, json!([]));
    }

    // ── Publishes and delegation ─────────────────────────────────────────────

    #[test]
    fn test_publish_bootstraps_caller_as_root_granter() {
        let f = fixture();
        f.publish("read:file");
        let (status, body) = f.call(
            Endpoint::ReadGrants,
            "admin-token",
            json!([{ "receiver": "admin", "scopes": ["0:mg:read:file"] }]),
        );
        assert_eq!(status, 200);
        let grants = body[0]["ok"].as_array().unwrap();
        assert_eq!(grants.len(), 1);
        assert_eq!(grants[0]["owner"], "api");
        assert_eq!(grants[0]["not_before"], NOW);
    }

    #[test]
    fn test_delegation_chain_within_one_batch() {
        let f = fixture();
        f.publish("read:file");
        let (status, body) = f.call(
            Endpoint::CreateGrants,
            "admin-token",
            json!([
                { "receiver": "admin", "publisher": "api", "scope": "mg:read:file", "on_behalf_of": "alice" },
                { "receiver": "app", "publisher": "api", "scope": "read:file", "on_behalf_of": "alice" }
            ]),
        );
        assert_eq!(status, 200, "{body}");

        let (status, body) = f.call(
            Endpoint::Judge,
            "admin-token",
            json!([
                { "publisher": "api", "requestor": "app", "scope": "read:file", "owners": ["alice"] },
                { "publisher": "api", "requestor": "app", "scope": "write:file", "owners": ["alice"] }
            ]),
        );
        assert_eq!(status, 200);
        assert_eq!(body[0]["ok"]["granted"], true);
        assert_eq!(body[0]["ok"]["owners"], json!(["alice"]));
        assert_eq!(body[1]["ok"]["granted"], false);
        assert_eq!(body[1]["ok"]["missing"], json!(["write:file"]));
    }

    #[test]
    fn test_delegation_gate_forbids_granting_without_the_right() {
        let f = fixture();
        f.publish("read:file");
        // ops may call the endpoint but never received any right on read:file.
        let (status, body) = f.call(
            Endpoint::CreateGrants,
            "ops-token",
            json!([{ "receiver": "app", "publisher": "api", "scope": "read:file", "on_behalf_of": "alice" }]),
        );
        assert_eq!(status, 403);
        assert_eq!(code(&body[0]), "FORBIDDEN");
    }

    #[test]
    fn test_failed_grant_rolls_back_earlier_items() {
        let f = fixture();
        f.publish("read:file");
        let (status, body) = f.call(
            Endpoint::CreateGrants,
            "admin-token",
            json!([
                { "receiver": "admin", "publisher": "api", "scope": "mg:read:file", "on_behalf_of": "alice" },
                { "receiver": "ghost", "publisher": "api", "scope": "mg:read:file", "on_behalf_of": "alice" }
            ]),
        );
        assert_eq!(status, 404);
        assert_eq!(code(&body[0]), "FAILED_DUE_TO_OTHER_ERRORS");
        assert_eq!(code(&body[1]), "NOT_FOUND");

        let (_, read) = f.call(
            Endpoint::ReadGrants,
            "admin-token",
            json!([{ "receiver": "admin", "scopes": ["mg:read:file"] }]),
        );
        assert_eq!(read[0]["ok"], json!([]));
    }

    // ── Subscriptions ────────────────────────────────────────────────────────

    #[test]
    fn test_committed_subscription_pushes_scopes() {
        let f = fixture();
        f.publish("read:file");
        f.subscribe("read:file");
        let (client, scopes) = f.synced.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(client, id("app"));
        assert_eq!(scopes, vec!["read:file".to_string()]);

        let (status, body) = f.call(
            Endpoint::ReadSubscriptions,
            "admin-token",
            json!([{ "subscriber": "app" }]),
        );
        assert_eq!(status, 200);
        assert_eq!(body[0]["ok"][0]["requested_by"], "admin");
    }

    #[test]
    fn test_failed_subscription_pushes_nothing() {
        let f = fixture();
        let (status, _) = f.call(
            Endpoint::CreateSubscriptions,
            "admin-token",
            json!([{ "subscriber": "app", "publisher": "api", "scope": "read:file" }]),
        );
        assert_ne!(status, 200);
        assert!(f.synced.recv_timeout(Duration::from_millis(200)).is_err());
    }

    // ── Consent ──────────────────────────────────────────────────────────────

    #[test]
    fn test_consent_scenario_end_to_end() {
        let f = fixture();
        f.publish("read:file");
        f.publish("write:file");
        f.subscribe("read:file");
        f.subscribe("write:file");

        let (status, body) = f.call(Endpoint::GetChallenge, "admin-token", json!([{ "challenge": "ch-1" }]));
        assert_eq!(status, 200, "{body}");
        assert_eq!(body[0]["ok"]["outcome"], "needs_decision");
        assert_eq!(body[0]["ok"]["entries"].as_array().unwrap().len(), 2);

        let (status, body) = f.call(
            Endpoint::AcceptChallenge,
            "admin-token",
            json!([{ "challenge": "ch-1", "grant_scopes": ["read:file", "write:file"] }]),
        );
        assert_eq!(status, 200, "{body}");
        assert_eq!(body[0]["ok"]["outcome"], "user_accepted");

        let consents: Vec<Value> = ["read:file", "write:file"]
            .iter()
            .map(|scope| json!({ "owner": "alice", "subscriber": "app", "publisher": "api", "scope": scope }))
            .collect();
        let (status, body) = f.call(Endpoint::CreateConsents, "alice-session", Value::Array(consents));
        assert_eq!(status, 200, "{body}");

        let (status, body) = f.call(Endpoint::GetChallenge, "admin-token", json!([{ "challenge": "ch-1" }]));
        assert_eq!(status, 200);
        assert_eq!(body[0]["ok"]["outcome"], "auto_accepted");

        let calls = f.calls.lock().unwrap();
        let Some(Call::Accept(last)) = calls.last() else {
            panic!("expected the auto-accept to reach the authority, got {calls:?}");
        };
        assert!(last.remember);
        assert_eq!(last.remember_for, 0);
        assert_eq!(last.grant_scope, vec!["read:file", "write:file"]);
    }

    #[test]
    fn test_consents_only_for_the_owner_acted_for() {
        let f = fixture();
        for scope in ["read:file", "write:file"] {
            f.publish(scope);
            f.subscribe(scope);
        }
        let item = json!([{ "owner": "alice", "subscriber": "app", "publisher": "api", "scope": "read:file" }]);

        let (status, body) = f.call(Endpoint::CreateConsents, "bob-session", item.clone());
        assert_eq!(status, 403, "{body}");
        assert_eq!(code(&body[0]), "FORBIDDEN");
        let (status, body) = f.call(Endpoint::CreateConsents, "admin-token", item.clone());
        assert_eq!(status, 403, "{body}");

        let (_, body) = f.call(Endpoint::GetChallenge, "admin-token", json!([{ "challenge": "ch-1" }]));
        let entries = body[0]["ok"]["entries"].as_array().unwrap();
        assert!(entries.iter().all(|e| e["consented"] == false));

        let (status, body) = f.call(Endpoint::CreateConsents, "alice-session", item.clone());
        assert_eq!(status, 200, "{body}");
        let (status, body) = f.call(Endpoint::DeleteConsents, "bob-session", item.clone());
        assert_eq!(status, 403, "{body}");
        let (status, body) = f.call(Endpoint::DeleteConsents, "alice-session", item);
        assert_eq!(status, 200, "{body}");
    }

    #[test]
    fn test_challenge_without_subscriptions_fails() {
        let f = fixture();
        f.publish("read:file");
        let (status, body) = f.call(Endpoint::GetChallenge, "admin-token", json!([{ "challenge": "ch-1" }]));
        assert_eq!(status, 400);
        assert_eq!(code(&body[0]), "NO_SUBSCRIPTIONS");
    }

    #[test]
    fn test_reject_challenge() {
        let f = fixture();
        let (status, body) = f.call(Endpoint::RejectChallenge, "admin-token", json!([{ "challenge": "ch-1" }]));
        assert_eq!(status, 200);
        assert_eq!(body[0]["ok"]["outcome"], "user_rejected");
        assert_eq!(f.calls.lock().unwrap().last(), Some(&Call::Reject));
    }
}
