//! Request schemas for every endpoint.
//!
//! The JSON Schema document covers shape and types. Semantic rules add what
//! the schema cannot say cleanly: identity fields must not be blank, scope
//! names carry no whitespace, and a grant's validity window is ordered.

use serde_json::{json, Value};

use aap_verify::{RequestRule, RequestSchema, RequestVerifier, RuleType};

use crate::endpoint::Endpoint;

/// Name of the custom rule checking `not_before` / `expire` ordering.
pub const VALIDITY_WINDOW: &str = "validity-window";

/// A verifier with every custom rule the endpoint schemas reference.
pub fn verifier() -> RequestVerifier {
    let mut verifier = RequestVerifier::new();
    verifier.register_rule(
        VALIDITY_WINDOW,
        Box::new(|item| {
            let not_before = item.get("not_before").and_then(Value::as_i64).unwrap_or(0);
            let expire = item.get("expire").and_then(Value::as_i64).unwrap_or(0);
            (expire != 0 && expire <= not_before)
                .then(|| format!("expire ({expire}) must be 0 or after not_before ({not_before})"))
        }),
    );
    verifier
}

// ── Builders ──────────────────────────────────────────────────────────────────

fn id_prop() -> Value {
    json!({ "type": "string" })
}

fn id_list_prop() -> Value {
    json!({ "type": "array", "items": { "type": "string" } })
}

/// A base scope name: no `mg:` / `0:mg:` prefix.
fn base_scope_prop() -> Value {
    json!({ "type": "string", "not": { "pattern": "^(0:)?mg:" } })
}

fn instant_prop() -> Value {
    json!({ "type": "integer", "minimum": 0 })
}

fn object(properties: Value, required: &[&str]) -> Value {
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false
    })
}

fn required(fields: &[&str]) -> Vec<RequestRule> {
    fields
        .iter()
        .map(|field| {
            RequestRule::new(
                format!("required-{field}"),
                format!("{field} is required and not blank"),
                RuleType::RequiredField {
                    field_path: field.to_string(),
                },
            )
        })
        .collect()
}

fn no_whitespace(field: &str) -> RequestRule {
    RequestRule::new(
        format!("{field}-no-whitespace"),
        format!("{field} carries no whitespace"),
        RuleType::NoWhitespace {
            field_path: field.to_string(),
        },
    )
}

fn schema(endpoint: Endpoint, json_schema: Value, rules: Vec<RequestRule>) -> RequestSchema {
    RequestSchema {
        schema_id: format!("{}.v1", endpoint.name()),
        json_schema,
        rules,
    }
}

// ── Catalogue ─────────────────────────────────────────────────────────────────

/// The schema one item of `endpoint`'s batch must satisfy.
pub fn schema_for(endpoint: Endpoint) -> RequestSchema {
    match endpoint {
        Endpoint::CreateScopes => schema(
            endpoint,
            object(json!({ "name": base_scope_prop(), "requested_by": id_prop() }), &["name"]),
            [required(&["name"]), vec![no_whitespace("name")]].concat(),
        ),
        Endpoint::ReadScopes => schema(
            endpoint,
            object(json!({ "name": id_prop() }), &[]),
            vec![no_whitespace("name")],
        ),
        Endpoint::CreatePublishes => schema(
            endpoint,
            object(
                json!({
                    "publisher": id_prop(),
                    "scope": base_scope_prop(),
                    "title": { "type": "string" },
                    "description": { "type": "string" },
                    "requested_by": id_prop()
                }),
                &["publisher", "scope", "title", "description"],
            ),
            [
                required(&["publisher", "scope", "title", "description"]),
                vec![no_whitespace("scope")],
            ]
            .concat(),
        ),
        Endpoint::ReadPublishes => schema(
            endpoint,
            object(json!({ "publisher": id_prop(), "scopes": id_list_prop() }), &[]),
            vec![no_whitespace("scopes")],
        ),
        Endpoint::CreateGrants => schema(
            endpoint,
            object(
                json!({
                    "receiver": id_prop(),
                    "publisher": id_prop(),
                    "scope": id_prop(),
                    "on_behalf_of": id_prop(),
                    "not_before": instant_prop(),
                    "expire": instant_prop()
                }),
                &["receiver", "publisher", "scope", "on_behalf_of"],
            ),
            [
                required(&["receiver", "publisher", "scope", "on_behalf_of"]),
                vec![
                    no_whitespace("scope"),
                    RequestRule::new(
                        VALIDITY_WINDOW,
                        "the validity window is not empty",
                        RuleType::Custom {
                            function_name: VALIDITY_WINDOW.to_string(),
                        },
                    ),
                ],
            ]
            .concat(),
        ),
        Endpoint::ReadGrants => schema(
            endpoint,
            object(
                json!({
                    "receiver": id_prop(),
                    "scopes": id_list_prop(),
                    "publisher": id_prop(),
                    "on_behalf_of": id_prop()
                }),
                &["receiver"],
            ),
            [required(&["receiver"]), vec![no_whitespace("scopes")]].concat(),
        ),
        Endpoint::DeleteGrants => schema(endpoint, object(json!({ "id": id_prop() }), &["id"]), required(&["id"])),
        Endpoint::CreateSubscriptions => schema(
            endpoint,
            object(
                json!({
                    "subscriber": id_prop(),
                    "publisher": id_prop(),
                    "scope": id_prop(),
                    "requested_by": id_prop()
                }),
                &["subscriber", "publisher", "scope"],
            ),
            [required(&["subscriber", "publisher", "scope"]), vec![no_whitespace("scope")]].concat(),
        ),
        Endpoint::ReadSubscriptions => schema(
            endpoint,
            object(
                json!({ "subscriber": id_prop(), "publisher": id_prop(), "scopes": id_list_prop() }),
                &[],
            ),
            vec![no_whitespace("scopes")],
        ),
        Endpoint::DeleteSubscriptions => schema(
            endpoint,
            object(
                json!({ "subscriber": id_prop(), "publisher": id_prop(), "scope": id_prop() }),
                &["subscriber", "publisher", "scope"],
            ),
            required(&["subscriber", "publisher", "scope"]),
        ),
        Endpoint::CreateConsents | Endpoint::DeleteConsents => schema(
            endpoint,
            object(
                json!({
                    "owner": id_prop(),
                    "subscriber": id_prop(),
                    "publisher": id_prop(),
                    "scope": id_prop()
                }),
                &["owner", "subscriber", "publisher", "scope"],
            ),
            [required(&["owner", "subscriber", "publisher", "scope"]), vec![no_whitespace("scope")]].concat(),
        ),
        Endpoint::ReadConsents => schema(
            endpoint,
            object(
                json!({
                    "owner": id_prop(),
                    "subscriber": id_prop(),
                    "publishers": id_list_prop(),
                    "scopes": id_list_prop()
                }),
                &[],
            ),
            vec![no_whitespace("scopes")],
        ),
        Endpoint::Judge => schema(
            endpoint,
            object(
                json!({
                    "publisher": id_prop(),
                    "requestor": id_prop(),
                    "scope": id_prop(),
                    "owners": id_list_prop()
                }),
                &["publisher", "requestor", "scope"],
            ),
            [required(&["publisher", "requestor", "scope"]), vec![no_whitespace("scope")]].concat(),
        ),
        Endpoint::GetChallenge | Endpoint::RejectChallenge => schema(
            endpoint,
            object(json!({ "challenge": id_prop() }), &["challenge"]),
            required(&["challenge"]),
        ),
        Endpoint::AcceptChallenge => schema(
            endpoint,
            object(
                json!({ "challenge": id_prop(), "grant_scopes": id_list_prop() }),
                &["challenge", "grant_scopes"],
            ),
            [required(&["challenge"]), vec![no_whitespace("grant_scopes")]].concat(),
        ),
    }
}
