//! # aap-verify
//!
//! The pre-transaction validation gate for inbound sub-requests.
//!
//! Each endpoint owns a [`schema::RequestSchema`]; [`engine::RequestVerifier`]
//! checks every raw JSON item against it before the item is deserialized and
//! long before any graph transaction opens.

pub mod engine;
pub mod schema;

pub use engine::RequestVerifier;
pub use schema::{RequestRule, RequestSchema, RuleType, VerificationReport};

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use aap_contracts::error::AapError;

    use super::*;

    fn schema(json_schema: Value, rules: Vec<RequestRule>) -> RequestSchema {
        RequestSchema {
            schema_id: "test.v1".to_string(),
            json_schema,
            rules,
        }
    }

    fn grant_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "receiver": { "type": "string" },
                "scope": { "type": "string" },
                "expire": { "type": "integer", "minimum": 0 }
            },
            "required": ["receiver", "scope"]
        })
    }

    #[test]
    fn test_structural_pass_and_fail() {
        let verifier = RequestVerifier::new();
        let s = schema(grant_schema(), vec![]);

        assert!(verifier.verify(&json!({ "receiver": "app", "scope": "read" }), &s).passed);

        let report = verifier.verify(&json!({ "receiver": "app", "expire": -1 }), &s);
        assert!(!report.passed);
        assert!(report.failures.iter().all(|f| f.rule_id == "json-schema"));
        assert_eq!(report.failures.len(), 2, "missing scope and negative expire: {:?}", report.failures);
    }

    #[test]
    fn test_required_field_rejects_blank_strings() {
        let verifier = RequestVerifier::new();
        let s = schema(
            Value::Null,
            vec![RequestRule::new(
                "req-receiver",
                "receiver is required",
                RuleType::RequiredField {
                    field_path: "receiver".to_string(),
                },
            )],
        );
        assert!(verifier.verify(&json!({ "receiver": "app" }), &s).passed);
        assert!(!verifier.verify(&json!({ "receiver": "   " }), &s).passed);
        assert!(!verifier.verify(&json!({ "receiver": null }), &s).passed);
    }

    #[test]
    fn test_no_whitespace_checks_strings_and_arrays() {
        let verifier = RequestVerifier::new();
        let s = schema(
            Value::Null,
            vec![RequestRule::new(
                "scope-no-ws",
                "scope names carry no whitespace",
                RuleType::NoWhitespace {
                    field_path: "scopes".to_string(),
                },
            )],
        );
        assert!(verifier.verify(&json!({ "scopes": ["read", "write"] }), &s).passed);

        let report = verifier.verify(&json!({ "scopes": ["read", "write all"] }), &s);
        assert!(!report.passed);
        assert_eq!(report.failures[0].rule_id, "scope-no-ws");
        assert!(report.failures[0].message.contains("write all"));

        // Absent fields are left to RequiredField.
        assert!(verifier.verify(&json!({}), &s).passed);
    }

    #[test]
    fn test_forbidden_pattern_and_allowed_values() {
        let verifier = RequestVerifier::new();
        let s = schema(
            Value::Null,
            vec![
                RequestRule::new(
                    "no-prefix",
                    "base scope names carry no hierarchy prefix",
                    RuleType::ForbiddenPattern {
                        field_path: "scope".to_string(),
                        pattern: "mg:".to_string(),
                    },
                ),
                RequestRule::new(
                    "kind",
                    "kind is known",
                    RuleType::AllowedValues {
                        field_path: "kind".to_string(),
                        allowed: vec![json!("client"), json!("human")],
                    },
                ),
            ],
        );
        let report = verifier.verify(&json!({ "scope": "mg:read", "kind": "robot" }), &s);
        let ids: Vec<&str> = report.failures.iter().map(|f| f.rule_id.as_str()).collect();
        assert_eq!(ids, vec!["no-prefix", "kind"]);
    }

    #[test]
    fn test_custom_rules() {
        let mut verifier = RequestVerifier::new();
        verifier.register_rule(
            "window",
            Box::new(|v| {
                let nbf = v.get("not_before").and_then(Value::as_i64).unwrap_or(0);
                let exp = v.get("expire").and_then(Value::as_i64).unwrap_or(0);
                (exp != 0 && exp <= nbf).then(|| "expire must be after not_before".to_string())
            }),
        );
        let s = schema(
            Value::Null,
            vec![RequestRule::new(
                "window",
                "validity window is ordered",
                RuleType::Custom {
                    function_name: "window".to_string(),
                },
            )],
        );
        assert!(verifier.verify(&json!({ "not_before": 10, "expire": 0 }), &s).passed);
        assert!(!verifier.verify(&json!({ "not_before": 10, "expire": 5 }), &s).passed);

        let unregistered = schema(
            Value::Null,
            vec![RequestRule::new(
                "ghost",
                "missing function",
                RuleType::Custom {
                    function_name: "does-not-exist".to_string(),
                },
            )],
        );
        let report = RequestVerifier::new().verify(&json!({}), &unregistered);
        assert!(report.failures[0].message.contains("does-not-exist"));
    }

    #[test]
    fn test_report_into_result() {
        let verifier = RequestVerifier::new();
        let s = schema(grant_schema(), vec![]);
        assert!(verifier.verify(&json!({ "receiver": "a", "scope": "b" }), &s).into_result().is_ok());
        let err = verifier.verify(&json!({}), &s).into_result().unwrap_err();
        assert!(matches!(err, AapError::InputValidation { .. }));
    }
}
