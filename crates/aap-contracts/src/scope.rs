//! The scope hierarchy.
//!
//! Every base scope `S` has two derived siblings: `mg:S` ("may grant S") and
//! `0:mg:S` ("may grant may-grant S"). The chain `0:mg:S -> mg:S -> S` lets a
//! party hold the right to grant a scope, or the right to grant that right,
//! without a new scope name per delegation depth.
//!
//! Names are derived by [`ScopeName::at`] and decomposed by
//! [`ScopeName::parse`]; nothing else in the workspace concatenates prefixes.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{AapError, AapResult};

const MAY_GRANT_PREFIX: &str = "mg:";
const ROOT_MAY_GRANT_PREFIX: &str = "0:mg:";

/// Delegation depth of a scope within its hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeLevel {
    /// The capability itself, e.g. `read:file`.
    Base,
    /// The right to grant the base scope, `mg:read:file`.
    MayGrant,
    /// The right to grant the may-grant scope, `0:mg:read:file`.
    MayGrantMayGrant,
}

impl ScopeLevel {
    /// All levels, root first.
    pub const ALL: [ScopeLevel; 3] = [
        ScopeLevel::MayGrantMayGrant,
        ScopeLevel::MayGrant,
        ScopeLevel::Base,
    ];

    fn prefix(self) -> &'static str {
        match self {
            Self::Base => "",
            Self::MayGrant => MAY_GRANT_PREFIX,
            Self::MayGrantMayGrant => ROOT_MAY_GRANT_PREFIX,
        }
    }

    /// The level whose grant entitles a party to grant this level.
    ///
    /// The root level grants itself, so delegation depth is bounded.
    pub fn granting_level(self) -> ScopeLevel {
        match self {
            Self::Base => Self::MayGrant,
            Self::MayGrant | Self::MayGrantMayGrant => Self::MayGrantMayGrant,
        }
    }

    /// The level one MAY_GRANT hop below this one, if any.
    pub fn granted_level(self) -> Option<ScopeLevel> {
        match self {
            Self::Base => None,
            Self::MayGrant => Some(Self::Base),
            Self::MayGrantMayGrant => Some(Self::MayGrant),
        }
    }
}

/// A scope name decomposed into its base name and level.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ScopeName {
    base: String,
    level: ScopeLevel,
}

impl ScopeName {
    /// Build a base-level scope name, rejecting illegal names.
    ///
    /// A base name must be non-empty, contain no whitespace, and not start
    /// with a hierarchy prefix (so it can never collide with a derived name).
    pub fn base(name: &str) -> AapResult<Self> {
        validate_base_name(name)?;
        Ok(Self {
            base: name.to_string(),
            level: ScopeLevel::Base,
        })
    }

    /// Decompose any scope name (base or derived) into base and level.
    pub fn parse(name: &str) -> AapResult<Self> {
        let (level, base) = if let Some(rest) = name.strip_prefix(ROOT_MAY_GRANT_PREFIX) {
            (ScopeLevel::MayGrantMayGrant, rest)
        } else if let Some(rest) = name.strip_prefix(MAY_GRANT_PREFIX) {
            (ScopeLevel::MayGrant, rest)
        } else {
            (ScopeLevel::Base, name)
        };
        validate_base_name(base)?;
        Ok(Self {
            base: base.to_string(),
            level,
        })
    }

    /// The sibling of this scope at `level`.
    pub fn at(&self, level: ScopeLevel) -> ScopeName {
        ScopeName {
            base: self.base.clone(),
            level,
        }
    }

    pub fn level(&self) -> ScopeLevel {
        self.level
    }

    pub fn base_name(&self) -> &str {
        &self.base
    }

    /// The full wire name, including any hierarchy prefix.
    pub fn full(&self) -> String {
        format!("{}{}", self.level.prefix(), self.base)
    }

    /// The scope a party must hold to grant this one.
    pub fn granting_scope(&self) -> ScopeName {
        self.at(self.level.granting_level())
    }

    /// All three members of the hierarchy, root first.
    pub fn hierarchy(&self) -> [ScopeName; 3] {
        ScopeLevel::ALL.map(|level| self.at(level))
    }
}

impl fmt::Display for ScopeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.level.prefix(), self.base)
    }
}

fn validate_base_name(name: &str) -> AapResult<()> {
    if name.is_empty() {
        return Err(AapError::invalid("scope name must not be empty"));
    }
    if name.chars().any(char::is_whitespace) {
        return Err(AapError::invalid(format!(
            "scope name '{name}' must not contain whitespace"
        )));
    }
    if name.starts_with(MAY_GRANT_PREFIX) || name.starts_with(ROOT_MAY_GRANT_PREFIX) {
        return Err(AapError::invalid(format!(
            "scope name '{name}' must not start with a reserved hierarchy prefix"
        )));
    }
    Ok(())
}
