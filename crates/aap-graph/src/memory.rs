//! In-memory implementation of `GraphStore`.
//!
//! `MemoryGraphStore` is the reference graph store adapter. The committed
//! graph lives behind an `Arc<Mutex<_>>` as an immutable snapshot plus a
//! version counter:
//!
//! - A read transaction holds a clone of the snapshot `Arc` and never blocks
//!   writers.
//! - A write transaction works on a private copy of the snapshot and, on
//!   commit, swaps it in only if no other write committed in the meantime.
//!   A stale commit fails with `AapError::Graph` and changes nothing.
//!
//! Dropping a transaction without committing discards its changes.

use std::sync::{Arc, Mutex};

use tracing::{debug, info};

use aap_contracts::{
    error::{AapError, AapResult},
    graph::{props, Direction, Edge, Label, Node, NodeId, Props, Rel, TxMode},
    identity::{IdentityId, IdentityKind},
};
use aap_core::traits::{GraphStore, GraphTransaction};

use crate::data::GraphData;

// ── Internal shared state ─────────────────────────────────────────────────────

pub(crate) struct StoreState {
    /// The last committed graph.
    pub(crate) snapshot: Arc<GraphData>,
    /// Incremented on every successful write commit.
    pub(crate) version: u64,
}

// ── Public store ──────────────────────────────────────────────────────────────

/// An in-memory property graph with snapshot isolation.
///
/// # Thread safety
///
/// The store is `Send + Sync`; clones share the same committed graph.
#[derive(Clone)]
pub struct MemoryGraphStore {
    pub(crate) state: Arc<Mutex<StoreState>>,
}

impl MemoryGraphStore {
    /// Create an empty graph.
    pub fn new() -> Self {
        let state = StoreState {
            snapshot: Arc::new(GraphData::default()),
            version: 0,
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Register an identity the way the external identity provider would.
    ///
    /// The engine itself never creates identities; this hook seeds them for
    /// tests and demos. Idempotent per id; new kinds are added as labels.
    pub fn seed_identity(&self, id: &IdentityId, kinds: &[IdentityKind]) -> AapResult<()> {
        let mut tx = self.begin_tx(TxMode::Write)?;
        let node = tx.merge_node(Label::Identity, props([("id", id.as_str())]), Props::new())?;
        let labels: Vec<Label> = kinds.iter().copied().map(Label::from).collect();
        tx.add_labels(&node.id, &labels)?;
        Box::new(tx).commit()?;
        debug!(identity = %id, ?kinds, "identity seeded");
        Ok(())
    }

    /// Number of nodes in the committed graph.
    pub fn node_count(&self) -> usize {
        self.snapshot().nodes.len()
    }

    /// Number of relationships in the committed graph.
    pub fn edge_count(&self) -> usize {
        self.snapshot().edges.len()
    }

    fn snapshot(&self) -> Arc<GraphData> {
        // A poisoned lock only means another thread panicked mid-commit; the
        // snapshot it guards is still a complete committed graph.
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.snapshot.clone()
    }

    fn begin_tx(&self, mode: TxMode) -> AapResult<MemoryTransaction> {
        let state = self.state.lock().map_err(|e| AapError::graph(format!("graph state lock poisoned: {e}")))?;
        let data = match mode {
            TxMode::Read => Working::Shared(state.snapshot.clone()),
            TxMode::Write => Working::Owned(Box::new(state.snapshot.as_ref().clone())),
        };
        Ok(MemoryTransaction {
            mode,
            base_version: state.version,
            data,
            store: self.state.clone(),
            finished: false,
        })
    }
}

impl Default for MemoryGraphStore {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphStore for MemoryGraphStore {
    fn begin(&self, mode: TxMode) -> AapResult<Box<dyn GraphTransaction>> {
        Ok(Box::new(self.begin_tx(mode)?))
    }
}

// ── Transaction ───────────────────────────────────────────────────────────────

enum Working {
    Shared(Arc<GraphData>),
    Owned(Box<GraphData>),
}

/// A transaction over a private view of the graph.
pub struct MemoryTransaction {
    mode: TxMode,
    base_version: u64,
    data: Working,
    store: Arc<Mutex<StoreState>>,
    finished: bool,
}

impl MemoryTransaction {
    fn data(&self) -> &GraphData {
        match &self.data {
            Working::Shared(d) => d.as_ref(),
            Working::Owned(d) => d.as_ref(),
        }
    }

    fn data_mut(&mut self) -> AapResult<&mut GraphData> {
        match &mut self.data {
            Working::Owned(d) => Ok(d.as_mut()),
            Working::Shared(_) => Err(AapError::graph("write attempted in a read transaction")),
        }
    }

    /// Add labels to an existing node (identity seeding only).
    fn add_labels(&mut self, node: &NodeId, labels: &[Label]) -> AapResult<()> {
        let data = self.data_mut()?;
        let n = data
            .nodes
            .get_mut(node)
            .ok_or_else(|| AapError::graph(format!("node {} does not exist", node.0)))?;
        n.labels.extend(labels.iter().copied());
        Ok(())
    }
}

impl GraphTransaction for MemoryTransaction {
    fn mode(&self) -> TxMode {
        self.mode
    }

    fn find_nodes(&self, label: Label, filter: &Props) -> AapResult<Vec<Node>> {
        Ok(self.data().find(label, filter))
    }

    fn walk(&self, node: &NodeId, rel: Rel, direction: Direction) -> AapResult<Vec<(Edge, Node)>> {
        Ok(self.data().walk(node, rel, direction))
    }

    fn create_node(&mut self, labels: &[Label], props: Props) -> AapResult<Node> {
        Ok(self.data_mut()?.insert_node(labels, props))
    }

    fn merge_node(&mut self, label: Label, key: Props, set: Props) -> AapResult<Node> {
        let data = self.data_mut()?;
        let existing = data.find(label, &key).into_iter().next();
        let id = match existing {
            Some(node) => node.id,
            None => data.insert_node(&[label], key).id,
        };
        data.set_node_props(&id, set)
    }

    fn create_edge(&mut self, from: &NodeId, rel: Rel, to: &NodeId, props: Props) -> AapResult<Edge> {
        self.data_mut()?.insert_edge(from, rel, to, props)
    }

    fn merge_edge(&mut self, from: &NodeId, rel: Rel, to: &NodeId, props: Props) -> AapResult<Edge> {
        let data = self.data_mut()?;
        match data.edge_between(from, rel, to) {
            Some(edge) => data.set_edge_props(&edge.id, props),
            None => data.insert_edge(from, rel, to, props),
        }
    }

    fn delete_edge(&mut self, edge: &Edge) -> AapResult<()> {
        self.data_mut()?.remove_edge(&edge.id);
        Ok(())
    }

    fn detach_delete(&mut self, node: &NodeId) -> AapResult<()> {
        self.data_mut()?.detach_delete(node);
        Ok(())
    }

    fn commit(mut self: Box<Self>) -> AapResult<()> {
        self.finished = true;
        let data = match std::mem::replace(&mut self.data, Working::Shared(Arc::default())) {
            // Nothing to publish for a read transaction.
            Working::Shared(_) => return Ok(()),
            Working::Owned(data) => data,
        };

        let mut state = self
            .store
            .lock()
            .map_err(|e| AapError::graph(format!("graph state lock poisoned: {e}")))?;
        if state.version != self.base_version {
            return Err(AapError::graph(format!(
                "write conflict: transaction began at version {} but graph is at {}",
                self.base_version, state.version
            )));
        }
        state.snapshot = Arc::new(*data);
        state.version += 1;
        info!(version = state.version, "graph transaction committed");
        Ok(())
    }

    fn rollback(mut self: Box<Self>) -> AapResult<()> {
        self.finished = true;
        debug!(mode = ?self.mode, "graph transaction rolled back");
        Ok(())
    }
}

impl Drop for MemoryTransaction {
    fn drop(&mut self) {
        if !self.finished && self.mode == TxMode::Write {
            debug!("write transaction dropped without commit; changes discarded");
        }
    }
}
