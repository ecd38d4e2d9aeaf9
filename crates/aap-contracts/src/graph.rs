//! The property graph schema the engine reads and writes.
//!
//! Nodes carry one or more labels and string properties; relationships are
//! directed, typed, and may carry string properties too. Any graph store
//! adapter only has to round-trip these shapes.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::identity::IdentityKind;

/// String properties of a node or relationship.
pub type Props = BTreeMap<String, String>;

/// Build a `Props` map from `(key, value)` pairs.
pub fn props<K, V, I>(pairs: I) -> Props
where
    K: Into<String>,
    V: Into<String>,
    I: IntoIterator<Item = (K, V)>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Store-assigned node handle. Not the same thing as a domain id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub String);

/// Store-assigned relationship handle.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EdgeId(pub String);

/// Node labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Label {
    Identity,
    Human,
    Client,
    ResourceServer,
    Scope,
    Publish,
    Grant,
    Consent,
}

impl From<IdentityKind> for Label {
    fn from(kind: IdentityKind) -> Self {
        match kind {
            IdentityKind::Human => Label::Human,
            IdentityKind::Client => Label::Client,
            IdentityKind::ResourceServer => Label::ResourceServer,
        }
    }
}

/// Relationship types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Rel {
    /// `(Scope|Publish)-[:MAY_GRANT]->(Scope|Publish)` one level down.
    MayGrant,
    /// `(Identity publisher)-[:IS_PUBLISHING]->(Publish)`
    IsPublishing,
    /// `(Publish)-[:PUBLISH]->(Scope)`
    Publish,
    /// `(Identity receiver)-[:IS_GRANTED]->(Grant)`
    IsGranted,
    /// `(Grant)-[:GRANTED]->(Publish)`
    Granted,
    /// `(Grant)-[:ON_BEHALF_OF]->(Identity owner)`
    OnBehalfOf,
    /// `(Identity subscriber)-[:SUBSCRIBES]->(Publish)`
    Subscribes,
    /// `(Identity owner)-[:IS_CONSENTING]->(Consent)`
    IsConsenting,
    /// `(Consent)-[:CONSENTED]->(Publish)`
    Consented,
    /// `(Consent)-[:CONSENTED_TO]->(Identity subscriber)`
    ConsentedTo,
}

impl fmt::Display for Rel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Which way to walk a relationship from a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Outgoing,
    Incoming,
}

/// Whether a transaction may write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxMode {
    Read,
    Write,
}

/// A node as returned by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub labels: BTreeSet<Label>,
    pub props: Props,
}

impl Node {
    pub fn has_label(&self, label: Label) -> bool {
        self.labels.contains(&label)
    }

    /// A string property, or `""` when absent.
    pub fn prop(&self, key: &str) -> &str {
        self.props.get(key).map(String::as_str).unwrap_or("")
    }

    /// True when every `(key, value)` in `filter` is present on this node.
    pub fn matches(&self, filter: &Props) -> bool {
        filter
            .iter()
            .all(|(k, v)| self.props.get(k).is_some_and(|actual| actual == v))
    }
}

/// A relationship as returned by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub rel: Rel,
    pub from: NodeId,
    pub to: NodeId,
    pub props: Props,
}

impl Edge {
    pub fn prop(&self, key: &str) -> &str {
        self.props.get(key).map(String::as_str).unwrap_or("")
    }
}
