//! Service configuration.
//!
//! `AapConfig` is loaded from a TOML document. Every key has a default, so an
//! empty document yields a working local configuration:
//!
//! ```toml
//! aap_identity = "aap"
//! log_filter = "info"
//!
//! [authority]
//! base_url = "http://localhost:4445"
//! timeout_secs = 10
//!
//! [limits]
//! default_max_requests = 100
//!
//! [limits.max_requests]
//! "judge" = 500
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use aap_consent::AuthorityConfig;
use aap_contracts::{
    error::{AapError, AapResult},
    identity::IdentityId,
};

fn default_aap_identity() -> IdentityId {
    IdentityId::from("aap")
}

fn default_log_filter() -> String {
    "info".to_string()
}

fn default_max_requests() -> usize {
    100
}

/// Top-level configuration for one AAP service instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AapConfig {
    /// The identity that publishes the engine's own `aap:*` scopes. Every
    /// endpoint is authorized against it.
    #[serde(default = "default_aap_identity")]
    pub aap_identity: IdentityId,

    /// `tracing` filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,

    #[serde(default)]
    pub authority: AuthorityConfig,

    #[serde(default)]
    pub limits: LimitsConfig,
}

impl Default for AapConfig {
    fn default() -> Self {
        Self {
            aap_identity: default_aap_identity(),
            log_filter: default_log_filter(),
            authority: AuthorityConfig::default(),
            limits: LimitsConfig::default(),
        }
    }
}

/// Batch size caps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitsConfig {
    #[serde(default = "default_max_requests")]
    pub default_max_requests: usize,

    /// Per-endpoint overrides keyed by endpoint name (`"grants.create"`).
    #[serde(default)]
    pub max_requests: BTreeMap<String, usize>,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            default_max_requests: default_max_requests(),
            max_requests: BTreeMap::new(),
        }
    }
}

impl LimitsConfig {
    /// The cap for the endpoint called `name`.
    pub fn max_for(&self, name: &str) -> usize {
        self.max_requests
            .get(name)
            .copied()
            .unwrap_or(self.default_max_requests)
    }
}

impl AapConfig {
    /// Parse `s` as TOML.
    ///
    /// Returns `AapError::Config` if the document is malformed, does not
    /// match `AapConfig`, or names an unknown endpoint in `[limits]`.
    pub fn from_toml_str(s: &str) -> AapResult<Self> {
        let config: AapConfig = toml::from_str(s).map_err(|e| AapError::Config {
            reason: format!("failed to parse AAP configuration TOML: {}", e),
        })?;
        config.check()?;
        Ok(config)
    }

    /// Read the file at `path` and parse it as TOML.
    pub fn from_file(path: &Path) -> AapResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| AapError::Config {
            reason: format!("failed to read configuration file '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }

    fn check(&self) -> AapResult<()> {
        if self.aap_identity.is_empty() {
            return Err(AapError::Config {
                reason: "aap_identity must not be empty".to_string(),
            });
        }
        if self.limits.default_max_requests == 0 {
            return Err(AapError::Config {
                reason: "limits.default_max_requests must be at least 1".to_string(),
            });
        }
        for (name, max) in &self.limits.max_requests {
            if crate::endpoint::Endpoint::parse(name).is_none() {
                return Err(AapError::Config {
                    reason: format!("limits.max_requests names unknown endpoint '{name}'"),
                });
            }
            if *max == 0 {
                return Err(AapError::Config {
                    reason: format!("limits.max_requests.\"{name}\" must be at least 1"),
                });
            }
        }
        Ok(())
    }
}
