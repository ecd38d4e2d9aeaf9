//! Demo scenarios.
//!
//! Each scenario builds a fresh in-memory graph, seeds the identities the
//! external identity provider would own, bootstraps the `aap:*` scopes for
//! the `admin` client, and then drives the engine only through
//! `AapService::dispatch`, the same way an HTTP front end would.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serde_json::{json, Value};
use thiserror::Error;

use aap_contracts::{
    consent::ConsentChallenge,
    error::AapError,
    identity::{IdentityId, IdentityKind},
};
use aap_core::traits::SystemClock;
use aap_endpoints::{bootstrap, AapConfig, AapService, Endpoint};
use aap_graph::MemoryGraphStore;

use crate::authority::LocalAuthority;

#[derive(Debug, Error)]
pub enum DemoError {
    #[error(transparent)]
    Aap(#[from] AapError),

    #[error("{step}: expected status {expected}, got {got}: {body}")]
    Unexpected {
        step: String,
        expected: u16,
        got: u16,
        body: Value,
    },
}

pub type DemoResult<T> = Result<T, DemoError>;

const ADMIN_TOKEN: &str = "admin-token";
const CONSENT_UI_TOKEN: &str = "consent-ui-token";

// ── World ─────────────────────────────────────────────────────────────────────

struct World {
    service: AapService,
    authority: Arc<LocalAuthority>,
}

impl World {
    fn new(config: &AapConfig) -> DemoResult<Self> {
        let store = MemoryGraphStore::new();
        let aap = config.aap_identity.clone();
        let seeds = [
            (aap.clone(), IdentityKind::ResourceServer),
            (id("admin"), IdentityKind::Client),
            (id("consent-ui"), IdentityKind::Client),
            (id("drive-api"), IdentityKind::ResourceServer),
            (id("photo-app"), IdentityKind::Client),
            (id("alice"), IdentityKind::Human),
            (id("bob"), IdentityKind::Human),
        ];
        for (who, kind) in &seeds {
            store.seed_identity(who, &[*kind])?;
        }

        let clock = SystemClock;
        let report = bootstrap(&store, &clock, &aap, &[id("admin"), id("consent-ui")])?;
        println!(
            "  Bootstrapped {} aap:* scopes, {} grants to admin clients",
            report.scopes_published, report.grants_created
        );

        let authority = Arc::new(LocalAuthority::new());
        authority.issue_token(ADMIN_TOKEN, &id("admin"), None);
        authority.issue_token(CONSENT_UI_TOKEN, &id("consent-ui"), Some(&id("alice")));

        let service = AapService::new(config.clone(), Arc::new(store), authority.clone())
            .with_scope_sync(authority.clone())
            .with_clock(Arc::new(clock));
        Ok(Self { service, authority })
    }

    /// Dispatch and require `expected`.
    fn call(&self, step: &str, endpoint: Endpoint, token: &str, body: Value, expected: u16) -> DemoResult<Value> {
        let (status, response) = self.service.dispatch(endpoint, token, &body);
        println!("  [{status}] {step}");
        if status != expected {
            return Err(DemoError::Unexpected {
                step: step.to_string(),
                expected,
                got: status,
                body: response,
            });
        }
        Ok(response)
    }

    fn publish(&self, scope: &str, title: &str) -> DemoResult<()> {
        self.call(
            &format!("drive-api publishes {scope}"),
            Endpoint::CreatePublishes,
            ADMIN_TOKEN,
            json!([{
                "publisher": "drive-api",
                "scope": scope,
                "title": title,
                "description": format!("{title} in your drive"),
            }]),
            200,
        )?;
        Ok(())
    }
}

fn id(s: &str) -> IdentityId {
    IdentityId::from(s)
}

fn describe_verdict(verdict: &Value) -> String {
    if verdict["granted"].as_bool().unwrap_or(false) {
        format!("GRANTED for owners {}", verdict["owners"])
    } else {
        format!("DENIED, missing {}", verdict["missing"])
    }
}

// ── Scenario 1: delegation ────────────────────────────────────────────────────

/// Publish a scope, delegate the right to grant it, grant it, and judge.
pub fn delegation(config: &AapConfig) -> DemoResult<()> {
    println!("=== Scenario 1: Delegated grants and the Judge ===");
    println!();
    let world = World::new(config)?;

    world.publish("read:photos", "Read photos")?;
    println!("  admin now holds 0:mg:read:photos on behalf of drive-api");

    world.call(
        "admin grants itself mg:read:photos for alice, then read:photos to photo-app",
        Endpoint::CreateGrants,
        ADMIN_TOKEN,
        json!([
            { "receiver": "admin", "publisher": "drive-api", "scope": "mg:read:photos", "on_behalf_of": "alice" },
            { "receiver": "photo-app", "publisher": "drive-api", "scope": "read:photos", "on_behalf_of": "alice" }
        ]),
        200,
    )?;

    let verdicts = world.call(
        "judge photo-app on read:photos for alice and for bob",
        Endpoint::Judge,
        ADMIN_TOKEN,
        json!([
            { "publisher": "drive-api", "requestor": "photo-app", "scope": "read:photos", "owners": ["alice"] },
            { "publisher": "drive-api", "requestor": "photo-app", "scope": "read:photos", "owners": ["bob"] }
        ]),
        200,
    )?;
    println!("    alice: {}", describe_verdict(&verdicts[0]["ok"]));
    println!("    bob:   {}", describe_verdict(&verdicts[1]["ok"]));

    let denied = world.call(
        "consent-ui tries to grant read:photos without holding mg:read:photos",
        Endpoint::CreateGrants,
        CONSENT_UI_TOKEN,
        json!([{ "receiver": "photo-app", "publisher": "drive-api", "scope": "read:photos", "on_behalf_of": "bob" }]),
        403,
    )?;
    println!("    {}", denied[0]["error"]["error_description"]);
    println!();
    Ok(())
}

// ── Scenario 2: consent ───────────────────────────────────────────────────────

/// Walk one consent challenge from first prompt to silent re-approval.
pub fn consent(config: &AapConfig) -> DemoResult<()> {
    println!("=== Scenario 2: Consent orchestration ===");
    println!();
    let world = World::new(config)?;

    world.publish("read:photos", "Read photos")?;
    world.publish("write:photos", "Upload photos")?;
    world.call(
        "photo-app subscribes to read:photos and write:photos",
        Endpoint::CreateSubscriptions,
        ADMIN_TOKEN,
        json!([
            { "subscriber": "photo-app", "publisher": "drive-api", "scope": "read:photos" },
            { "subscriber": "photo-app", "publisher": "drive-api", "scope": "write:photos" }
        ]),
        200,
    )?;

    // The scope push runs on a worker thread after commit.
    thread::sleep(Duration::from_millis(50));
    if let Some(scopes) = world.authority.pushed_scopes(&id("photo-app")) {
        println!("    authority now lists photo-app scopes: {}", scopes.join(" "));
    }

    world.authority.open_challenge(ConsentChallenge {
        challenge: "challenge-1".to_string(),
        subject: id("alice"),
        client_id: id("photo-app"),
        requested_scopes: vec!["read:photos".to_string(), "write:photos".to_string()],
        requested_audiences: vec![id("drive-api")],
        skip: false,
    });

    let first = world.call(
        "consent-ui resolves challenge-1",
        Endpoint::GetChallenge,
        CONSENT_UI_TOKEN,
        json!([{ "challenge": "challenge-1" }]),
        200,
    )?;
    println!("    outcome: {}", first[0]["ok"]["outcome"]);
    for entry in first[0]["ok"]["entries"].as_array().into_iter().flatten() {
        println!("    - {} ({}) consented: {}", entry["title"], entry["scope"], entry["consented"]);
    }

    world.call(
        "alice accepts both scopes",
        Endpoint::AcceptChallenge,
        CONSENT_UI_TOKEN,
        json!([{ "challenge": "challenge-1", "grant_scopes": ["read:photos", "write:photos"] }]),
        200,
    )?;
    world.call(
        "consent-ui records alice's consents",
        Endpoint::CreateConsents,
        CONSENT_UI_TOKEN,
        json!([
            { "owner": "alice", "subscriber": "photo-app", "publisher": "drive-api", "scope": "read:photos" },
            { "owner": "alice", "subscriber": "photo-app", "publisher": "drive-api", "scope": "write:photos" }
        ]),
        200,
    )?;

    let second = world.call(
        "consent-ui resolves challenge-1 again",
        Endpoint::GetChallenge,
        CONSENT_UI_TOKEN,
        json!([{ "challenge": "challenge-1" }]),
        200,
    )?;
    println!("    outcome: {}", second[0]["ok"]["outcome"]);

    world.authority.open_challenge(ConsentChallenge {
        challenge: "challenge-2".to_string(),
        subject: id("alice"),
        client_id: id("photo-app"),
        requested_scopes: vec!["delete:photos".to_string()],
        requested_audiences: vec![id("drive-api")],
        skip: false,
    });
    let invalid = world.call(
        "photo-app asks for a scope it never subscribed to",
        Endpoint::GetChallenge,
        CONSENT_UI_TOKEN,
        json!([{ "challenge": "challenge-2" }]),
        400,
    )?;
    println!("    {}", invalid[0]["error"]["code"]);
    println!();
    Ok(())
}

// ── Scenario 3: atomicity ─────────────────────────────────────────────────────

/// A batch with one bad item changes nothing.
pub fn atomicity(config: &AapConfig) -> DemoResult<()> {
    println!("=== Scenario 3: All-or-nothing batches ===");
    println!();
    let world = World::new(config)?;

    let responses = world.call(
        "publish three scopes, the last for an unknown publisher",
        Endpoint::CreatePublishes,
        ADMIN_TOKEN,
        json!([
            { "publisher": "drive-api", "scope": "read:docs", "title": "Read docs", "description": "Read documents" },
            { "publisher": "drive-api", "scope": "share:docs", "title": "Share docs", "description": "Share documents" },
            { "publisher": "ghost-api", "scope": "read:ghosts", "title": "Ghosts", "description": "Nothing" }
        ]),
        404,
    )?;
    for item in responses.as_array().into_iter().flatten() {
        println!("    #{} -> {} {}", item["index"], item["status"], item["error"]["code"]);
    }

    let read = world.call(
        "read drive-api's publishes",
        Endpoint::ReadPublishes,
        ADMIN_TOKEN,
        json!([{ "publisher": "drive-api" }]),
        200,
    )?;
    let count = read[0]["ok"].as_array().map_or(0, Vec::len);
    println!("    drive-api publishes after the failed batch: {count}");

    world.call(
        "an empty judge batch is refused",
        Endpoint::Judge,
        ADMIN_TOKEN,
        json!([]),
        400,
    )?;
    world.call(
        "an unknown token is refused",
        Endpoint::ReadScopes,
        "stolen-token",
        json!([]),
        401,
    )?;
    println!();
    Ok(())
}
