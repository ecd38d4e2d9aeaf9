//! Schema-based sub-request verifier.
//!
//! An item first has to match the schema's JSON Schema document, then pass
//! each semantic `RequestRule` in order. Failures from both passes are
//! reported together.

use std::collections::HashMap;

use serde_json::Value;
use tracing::{debug, warn};

use crate::schema::{RequestSchema, RuleType, VerificationFailure, VerificationReport};

/// A caller-supplied check. Returns `Some(message)` on failure.
pub type CustomVerifierFn = Box<dyn Fn(&Value) -> Option<String> + Send + Sync>;

pub struct RequestVerifier {
    custom: HashMap<String, CustomVerifierFn>,
}

impl RequestVerifier {
    pub fn new() -> Self {
        Self { custom: HashMap::new() }
    }

    /// Register a custom check under `name`, replacing any previous one.
    pub fn register_rule(&mut self, name: impl Into<String>, f: CustomVerifierFn) {
        self.custom.insert(name.into(), f);
    }

    /// Look up a dot-separated field. Missing and null fields are both `None`.
    fn lookup<'v>(item: &'v Value, path: &str) -> Option<&'v Value> {
        path.split('.')
            .try_fold(item, |node, key| node.get(key))
            .filter(|v| !v.is_null())
    }

    /// The strings held by `value`: itself if it is a string, its string
    /// elements if it is an array.
    fn strings(value: &Value) -> Vec<&str> {
        match value {
            Value::String(s) => vec![s.as_str()],
            Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        }
    }

    fn check(&self, item: &Value, rule_type: &RuleType) -> Option<String> {
        match rule_type {
            RuleType::RequiredField { field_path } => match Self::lookup(item, field_path) {
                None => Some(format!("required field '{field_path}' is missing or null")),
                Some(Value::String(s)) if s.trim().is_empty() => {
                    Some(format!("required field '{field_path}' must not be empty"))
                }
                Some(_) => None,
            },

            RuleType::AllowedValues { field_path, allowed } => match Self::lookup(item, field_path) {
                None => Some(format!("field '{field_path}' is missing; cannot check allowed values")),
                Some(actual) if allowed.contains(actual) => None,
                Some(actual) => Some(format!(
                    "field '{field_path}' has value {actual} which is not in the allowed set"
                )),
            },

            RuleType::ForbiddenPattern { field_path, pattern } => Self::lookup(item, field_path)
                .and_then(|v| Self::strings(v).into_iter().find(|s| s.contains(pattern.as_str())).map(str::to_string))
                .map(|s| format!("field '{field_path}' value '{s}' contains forbidden pattern '{pattern}'")),

            RuleType::NoWhitespace { field_path } => Self::lookup(item, field_path)
                .and_then(|v| {
                    Self::strings(v)
                        .into_iter()
                        .find(|s| s.chars().any(char::is_whitespace))
                        .map(str::to_string)
                })
                .map(|s| format!("field '{field_path}' value '{s}' must not contain whitespace")),

            RuleType::Custom { function_name } => match self.custom.get(function_name.as_str()) {
                Some(f) => f(item),
                None => Some(format!("no custom rule registered for function name '{function_name}'")),
            },
        }
    }

    fn structural(item: &Value, schema: &RequestSchema) -> Vec<VerificationFailure> {
        if schema.json_schema.is_null() {
            return Vec::new();
        }
        let failure = |message: String| VerificationFailure {
            rule_id: "json-schema".to_string(),
            message,
        };
        match jsonschema::validator_for(&schema.json_schema) {
            Ok(validator) => validator
                .iter_errors(item)
                .map(|e| failure(format!("'{}': {}", e.instance_path, e)))
                .collect(),
            Err(e) => {
                warn!(schema_id = %schema.schema_id, error = %e, "schema does not compile");
                vec![failure(format!("invalid JSON Schema document: {e}"))]
            }
        }
    }

    /// Verify one raw sub-request against `schema`, collecting every failure.
    pub fn verify(&self, item: &Value, schema: &RequestSchema) -> VerificationReport {
        let mut failures = Self::structural(item, schema);
        failures.extend(schema.rules.iter().filter_map(|rule| {
            self.check(item, &rule.rule_type).map(|message| VerificationFailure {
                rule_id: rule.rule_id.clone(),
                message,
            })
        }));

        let passed = failures.is_empty();
        if !passed {
            debug!(schema_id = %schema.schema_id, failures = ?failures, "sub-request rejected");
        }
        VerificationReport { passed, failures }
    }
}

impl Default for RequestVerifier {
    fn default() -> Self {
        Self::new()
    }
}
