//! The endpoint catalogue.
//!
//! Each endpoint has a stable name (used in configuration and logs), the
//! `aap:*` scope a caller must be granted by the AAP identity, a transaction
//! mode, and batch limits.

use std::fmt;

use aap_contracts::graph::TxMode;
use aap_core::bulk::BatchLimits;

use crate::config::LimitsConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Endpoint {
    CreateScopes,
    ReadScopes,
    CreatePublishes,
    ReadPublishes,
    CreateGrants,
    ReadGrants,
    DeleteGrants,
    CreateSubscriptions,
    ReadSubscriptions,
    DeleteSubscriptions,
    CreateConsents,
    ReadConsents,
    DeleteConsents,
    Judge,
    GetChallenge,
    AcceptChallenge,
    RejectChallenge,
}

impl Endpoint {
    pub const ALL: [Endpoint; 17] = [
        Endpoint::CreateScopes,
        Endpoint::ReadScopes,
        Endpoint::CreatePublishes,
        Endpoint::ReadPublishes,
        Endpoint::CreateGrants,
        Endpoint::ReadGrants,
        Endpoint::DeleteGrants,
        Endpoint::CreateSubscriptions,
        Endpoint::ReadSubscriptions,
        Endpoint::DeleteSubscriptions,
        Endpoint::CreateConsents,
        Endpoint::ReadConsents,
        Endpoint::DeleteConsents,
        Endpoint::Judge,
        Endpoint::GetChallenge,
        Endpoint::AcceptChallenge,
        Endpoint::RejectChallenge,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::CreateScopes => "scopes.create",
            Self::ReadScopes => "scopes.read",
            Self::CreatePublishes => "publishes.create",
            Self::ReadPublishes => "publishes.read",
            Self::CreateGrants => "grants.create",
            Self::ReadGrants => "grants.read",
            Self::DeleteGrants => "grants.delete",
            Self::CreateSubscriptions => "subscriptions.create",
            Self::ReadSubscriptions => "subscriptions.read",
            Self::DeleteSubscriptions => "subscriptions.delete",
            Self::CreateConsents => "consents.create",
            Self::ReadConsents => "consents.read",
            Self::DeleteConsents => "consents.delete",
            Self::Judge => "judge",
            Self::GetChallenge => "challenges.get",
            Self::AcceptChallenge => "challenges.accept",
            Self::RejectChallenge => "challenges.reject",
        }
    }

    pub fn parse(name: &str) -> Option<Endpoint> {
        Self::ALL.into_iter().find(|e| e.name() == name)
    }

    /// The scope the caller must hold, published by the AAP identity.
    pub fn required_scope(self) -> &'static str {
        match self {
            Self::CreateScopes => "aap:create:scopes",
            Self::ReadScopes => "aap:read:scopes",
            Self::CreatePublishes => "aap:create:publishes",
            Self::ReadPublishes => "aap:read:publishes",
            Self::CreateGrants => "aap:create:grants",
            Self::ReadGrants => "aap:read:grants",
            Self::DeleteGrants => "aap:delete:grants",
            Self::CreateSubscriptions => "aap:create:subscriptions",
            Self::ReadSubscriptions => "aap:read:subscriptions",
            Self::DeleteSubscriptions => "aap:delete:subscriptions",
            Self::CreateConsents => "aap:create:consents",
            Self::ReadConsents => "aap:read:consents",
            Self::DeleteConsents => "aap:delete:consents",
            Self::Judge => "aap:read:judge",
            Self::GetChallenge => "aap:read:challenges",
            Self::AcceptChallenge => "aap:accept:challenges",
            Self::RejectChallenge => "aap:reject:challenges",
        }
    }

    pub fn mode(self) -> TxMode {
        match self {
            Self::ReadScopes
            | Self::ReadPublishes
            | Self::ReadGrants
            | Self::ReadSubscriptions
            | Self::ReadConsents
            | Self::Judge
            | Self::GetChallenge
            | Self::AcceptChallenge
            | Self::RejectChallenge => TxMode::Read,
            _ => TxMode::Write,
        }
    }

    /// Whether the endpoint talks to the consent authority per item. Those
    /// endpoints take exactly one item, since authority calls cannot be
    /// rolled back with the graph.
    pub fn is_challenge(self) -> bool {
        matches!(self, Self::GetChallenge | Self::AcceptChallenge | Self::RejectChallenge)
    }

    /// Read filters that match everything may be sent as an empty batch.
    pub fn allows_empty(self) -> bool {
        matches!(self, Self::ReadScopes | Self::ReadPublishes | Self::ReadSubscriptions)
    }

    pub fn limits(self, config: &LimitsConfig) -> BatchLimits {
        if self.is_challenge() {
            return BatchLimits::single();
        }
        let limits = BatchLimits::new(config.max_for(self.name()));
        if self.allows_empty() {
            limits.allowing_empty()
        } else {
            limits
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
