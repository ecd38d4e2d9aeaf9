//! Trait seams for the AAP engine.
//!
//! - `GraphStore` / `GraphTransaction`: the transactional graph boundary
//! - `ConsentAuthority`: the external OAuth2 consent authority
//! - `ScopeSync`: best-effort push of subscribed scopes after commit
//! - `Clock`: the single source of "now"
//! - `Validate`: pre-transaction input validation
//!
//! Everything above these traits is deterministic given a graph snapshot and
//! a clock reading.

use aap_contracts::{
    consent::{AcceptConsent, ConsentChallenge, Introspection, Redirect, RejectConsent},
    error::AapResult,
    graph::{Direction, Edge, Label, Node, NodeId, Props, Rel, TxMode},
    identity::IdentityId,
};

/// A pooled handle to the graph store. Safe for concurrent use.
pub trait GraphStore: Send + Sync {
    /// Open a transaction. Dropping it without `commit` rolls it back.
    fn begin(&self, mode: TxMode) -> AapResult<Box<dyn GraphTransaction>>;
}

/// One ACID transaction against the graph.
///
/// Read primitives take `&self`; write primitives take `&mut self` and must
/// fail with `AapError::Graph` in a `TxMode::Read` transaction.
pub trait GraphTransaction: Send {
    fn mode(&self) -> TxMode;

    /// All nodes carrying `label` whose properties include every pair in `filter`.
    fn find_nodes(&self, label: Label, filter: &Props) -> AapResult<Vec<Node>>;

    /// Walk `rel` relationships from `node` in `direction`, returning each
    /// relationship with the node on its far end.
    fn walk(&self, node: &NodeId, rel: Rel, direction: Direction) -> AapResult<Vec<(Edge, Node)>>;

    /// Create a node unconditionally.
    fn create_node(&mut self, labels: &[Label], props: Props) -> AapResult<Node>;

    /// Find the node with `label` matching `key`, or create it with `key`.
    /// In both cases `set` is applied on top.
    fn merge_node(&mut self, label: Label, key: Props, set: Props) -> AapResult<Node>;

    /// Create a relationship unconditionally.
    fn create_edge(&mut self, from: &NodeId, rel: Rel, to: &NodeId, props: Props) -> AapResult<Edge>;

    /// Return the existing `from -[rel]-> to` relationship, or create it.
    /// `props` is applied in both cases.
    fn merge_edge(&mut self, from: &NodeId, rel: Rel, to: &NodeId, props: Props) -> AapResult<Edge>;

    /// Remove a single relationship.
    fn delete_edge(&mut self, edge: &Edge) -> AapResult<()>;

    /// Remove a node together with every relationship touching it.
    fn detach_delete(&mut self, node: &NodeId) -> AapResult<()>;

    fn commit(self: Box<Self>) -> AapResult<()>;

    fn rollback(self: Box<Self>) -> AapResult<()>;
}

/// The external consent authority (an OAuth2 server's admin API).
///
/// Calls are blocking and never retried by the engine; a failure surfaces as
/// `AapError::Authority`.
pub trait ConsentAuthority: Send + Sync {
    fn get_challenge(&self, challenge: &str) -> AapResult<ConsentChallenge>;

    fn accept(&self, challenge: &str, body: &AcceptConsent) -> AapResult<Redirect>;

    fn reject(&self, challenge: &str, body: &RejectConsent) -> AapResult<Redirect>;

    /// Introspect `token`, asking the authority to also check `required_scope`
    /// (space separated) when non-empty.
    fn introspect(&self, token: &str, required_scope: &str) -> AapResult<Introspection>;
}

/// Post-commit push of a client's subscribed scope set to the authority.
///
/// Failures are logged by the caller and never roll back the graph.
pub trait ScopeSync: Send + Sync {
    fn sync_client_scopes(&self, client: &IdentityId, scopes: &[String]) -> AapResult<()>;
}

/// Source of the current time in unix seconds.
pub trait Clock: Send + Sync {
    fn now(&self) -> i64;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// A clock frozen at one instant, for deterministic evaluation.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub i64);

impl Clock for FixedClock {
    fn now(&self) -> i64 {
        self.0
    }
}

/// Input validation run before any transaction opens.
///
/// Returns `AapError::InputValidation` describing the first problem found.
pub trait Validate {
    fn validate(&self) -> AapResult<()>;
}
