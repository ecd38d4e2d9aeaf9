//! Request schemas and verification reports.
//!
//! A `RequestSchema` pairs a JSON Schema document describing one endpoint's
//! sub-request with semantic rules JSON Schema cannot express cleanly.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use aap_contracts::error::AapError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestSchema {
    /// e.g. "grants.create.v1".
    pub schema_id: String,
    /// `Value::Null` means no structural constraint.
    pub json_schema: Value,
    pub rules: Vec<RequestRule>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestRule {
    pub rule_id: String,
    pub description: String,
    pub rule_type: RuleType,
}

impl RequestRule {
    pub fn new(rule_id: impl Into<String>, description: impl Into<String>, rule_type: RuleType) -> Self {
        Self {
            rule_id: rule_id.into(),
            description: description.into(),
            rule_type,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RuleType {
    /// The field must be present, non-null, and not a blank string.
    RequiredField { field_path: String },

    /// The field must equal one of `allowed`.
    AllowedValues { field_path: String, allowed: Vec<Value> },

    /// The field (a string, or every string in an array) must not contain
    /// `pattern` as a substring.
    ForbiddenPattern { field_path: String, pattern: String },

    /// The field (a string, or every string in an array) must not contain
    /// whitespace. Scope names are checked this way.
    NoWhitespace { field_path: String },

    /// Delegate to a function registered on the verifier.
    Custom { function_name: String },
}

/// The outcome of verifying one sub-request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub passed: bool,
    pub failures: Vec<VerificationFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationFailure {
    pub rule_id: String,
    pub message: String,
}

impl VerificationReport {
    /// `Ok(())` on pass, otherwise one `InputValidation` error listing
    /// every failure.
    pub fn into_result(self) -> Result<(), AapError> {
        if self.passed {
            return Ok(());
        }
        let reasons: Vec<String> = self.failures.into_iter().map(|f| f.message).collect();
        Err(AapError::invalid(reasons.join("; ")))
    }
}
