//! Identity types.
//!
//! Identities are created by an external identity provider. The engine only
//! ever references them by id, so these types are deliberately thin.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque principal identifier (typically a UUID issued by the identity provider).
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityId(pub String);

impl IdentityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for IdentityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for IdentityId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Capability tag carried by an identity node.
///
/// An identity may carry several tags; a resource server that is also an
/// OAuth2 client is both `Client` and `ResourceServer`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityKind {
    /// A person with name, email, and password.
    Human,
    /// An OAuth2 client application holding a secret.
    Client,
    /// An API exposing scopes under an audience value.
    ResourceServer,
}
