//! Runtime error types for the AAP authorization engine.
//!
//! All fallible operations return `AapResult<T>`. Every variant maps to a
//! client-facing [`ErrorCode`] and an HTTP-equivalent status, which is how the
//! bulk executor turns a function-local error into a per-item response.

use thiserror::Error;

use crate::bulk::ErrorCode;

/// The unified error type for the AAP engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AapError {
    /// Malformed input, missing required field, or illegal characters.
    ///
    /// Raised before any transaction opens where possible.
    #[error("input validation failed: {reason}")]
    InputValidation { reason: String },

    /// An empty batch was sent to an endpoint that does not accept one.
    #[error("empty request not allowed")]
    EmptyRequestNotAllowed,

    /// A batch exceeded the endpoint's configured item cap.
    #[error("batch of {got} requests exceeds the maximum of {max}")]
    MaxRequestsExceeded { max: usize, got: usize },

    /// A referenced identity, scope, or rule does not resolve in the graph.
    #[error("{kind} '{id}' not found")]
    NotFound { kind: String, id: String },

    /// No consent rule exists for the given (owner, publisher, scope, subscriber).
    #[error("consent not found for owner '{owner}', subscriber '{subscriber}', scope '{scope}'")]
    ConsentNotFound {
        owner: String,
        subscriber: String,
        scope: String,
    },

    /// The subscriber holds no subscription to any requested publisher.
    #[error("client '{subscriber}' has no subscriptions to the requested publishers")]
    NoSubscriptions { subscriber: String },

    /// Requested scopes the subscriber is not subscribed to.
    #[error("unsupported scopes requested: {}", scopes.join(", "))]
    InvalidScopes { scopes: Vec<String> },

    /// The caller could not be authenticated (inactive or unknown token).
    #[error("unauthorized: {reason}")]
    Unauthorized { reason: String },

    /// The caller is authenticated but not granted the required scopes.
    #[error("forbidden: {reason}")]
    Forbidden { reason: String },

    /// The graph store failed, refused an operation, or a commit conflicted.
    #[error("graph store error: {reason}")]
    Graph { reason: String },

    /// The external consent authority was unreachable or answered non-success.
    #[error("consent authority error: {reason}")]
    Authority { reason: String },

    /// The consent state machine was driven through an illegal transition.
    #[error("state machine error: {reason}")]
    StateMachine { reason: String },

    /// A required configuration value is missing or invalid.
    #[error("configuration error: {reason}")]
    Config { reason: String },
}

impl AapError {
    /// Shorthand for an `InputValidation` error.
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InputValidation {
            reason: reason.into(),
        }
    }

    /// Shorthand for a `NotFound` error.
    pub fn not_found(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            id: id.into(),
        }
    }

    /// Shorthand for a `Graph` error.
    pub fn graph(reason: impl Into<String>) -> Self {
        Self::Graph {
            reason: reason.into(),
        }
    }

    /// The client-facing code reported in a bulk response item.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InputValidation { .. } => ErrorCode::InputValidationFailed,
            Self::EmptyRequestNotAllowed => ErrorCode::EmptyRequestNotAllowed,
            Self::MaxRequestsExceeded { .. } => ErrorCode::MaxRequestsExceeded,
            Self::NotFound { .. } => ErrorCode::NotFound,
            Self::ConsentNotFound { .. } => ErrorCode::ConsentNotFound,
            Self::NoSubscriptions { .. } => ErrorCode::NoSubscriptions,
            Self::InvalidScopes { .. } => ErrorCode::InvalidScopes,
            Self::Unauthorized { .. } => ErrorCode::Unauthorized,
            Self::Forbidden { .. } => ErrorCode::Forbidden,
            Self::Graph { .. }
            | Self::Authority { .. }
            | Self::StateMachine { .. }
            | Self::Config { .. } => ErrorCode::InternalServerError,
        }
    }

    /// HTTP-equivalent status for this error.
    pub fn status(&self) -> u16 {
        match self {
            Self::InputValidation { .. }
            | Self::EmptyRequestNotAllowed
            | Self::MaxRequestsExceeded { .. }
            | Self::NoSubscriptions { .. }
            | Self::InvalidScopes { .. } => 400,
            Self::Unauthorized { .. } => 401,
            Self::Forbidden { .. } => 403,
            Self::NotFound { .. } | Self::ConsentNotFound { .. } => 404,
            Self::Graph { .. }
            | Self::Authority { .. }
            | Self::StateMachine { .. }
            | Self::Config { .. } => 500,
        }
    }

    /// True for infrastructure failures that surface as an internal error.
    pub fn is_internal(&self) -> bool {
        self.status() >= 500
    }
}

/// Convenience alias used throughout the AAP crates.
pub type AapResult<T> = Result<T, AapError>;
