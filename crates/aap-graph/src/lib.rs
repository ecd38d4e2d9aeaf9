//! # aap-graph
//!
//! In-memory, snapshot-isolated property graph store for the AAP
//! authorization engine.
//!
//! ## Overview
//!
//! [`MemoryGraphStore`] implements the `GraphStore` adapter trait from
//! `aap-core`. Read transactions see the snapshot committed when they began;
//! write transactions commit optimistically and fail if another write
//! committed first. It is the store used by tests and the demo CLI; a
//! production deployment plugs a real graph database in behind the same
//! trait.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use aap_graph::MemoryGraphStore;
//!
//! let store = MemoryGraphStore::new();
//! store.seed_identity(&IdentityId::from("alice"), &[IdentityKind::Human])?;
//! let tx = store.begin(TxMode::Read)?;
//! ```

mod data;
pub mod memory;

pub use memory::{MemoryGraphStore, MemoryTransaction};

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use aap_contracts::{
        error::AapError,
        graph::{props, Direction, Label, Props, Rel, TxMode},
        identity::{IdentityId, IdentityKind},
    };
    use aap_core::traits::{GraphStore, GraphTransaction};

    use super::MemoryGraphStore;

    fn scope_props(name: &str) -> Props {
        props([("name", name)])
    }

    /// Committed writes are visible to later transactions.
    #[test]
    fn test_commit_publishes_changes() {
        let store = MemoryGraphStore::new();
        let mut tx = store.begin(TxMode::Write).unwrap();
        let a = tx.create_node(&[Label::Scope], scope_props("mg:a")).unwrap();
        let b = tx.create_node(&[Label::Scope], scope_props("a")).unwrap();
        tx.create_edge(&a.id, Rel::MayGrant, &b.id, Props::new()).unwrap();
        tx.commit().unwrap();

        let read = store.begin(TxMode::Read).unwrap();
        let found = read.find_nodes(Label::Scope, &scope_props("mg:a")).unwrap();
        assert_eq!(found.len(), 1);
        let hops = read.walk(&found[0].id, Rel::MayGrant, Direction::Outgoing).unwrap();
        assert_eq!(hops.len(), 1);
        assert_eq!(hops[0].1.prop("name"), "a");
    }

    /// Rolled back and dropped transactions leave no trace.
    #[test]
    fn test_rollback_and_drop_discard_changes() {
        let store = MemoryGraphStore::new();

        let mut tx = store.begin(TxMode::Write).unwrap();
        tx.create_node(&[Label::Scope], scope_props("x")).unwrap();
        tx.rollback().unwrap();

        {
            let mut tx = store.begin(TxMode::Write).unwrap();
            tx.create_node(&[Label::Scope], scope_props("y")).unwrap();
        }

        assert_eq!(store.node_count(), 0);
    }

    /// A read transaction refuses writes.
    #[test]
    fn test_read_transaction_is_read_only() {
        let store = MemoryGraphStore::new();
        let mut tx = store.begin(TxMode::Read).unwrap();
        let result = tx.create_node(&[Label::Scope], scope_props("x"));
        assert!(matches!(result, Err(AapError::Graph { .. })));
    }

    /// Readers keep the snapshot they began with.
    #[test]
    fn test_snapshot_isolation() {
        let store = MemoryGraphStore::new();
        let before = store.begin(TxMode::Read).unwrap();

        let mut tx = store.begin(TxMode::Write).unwrap();
        tx.create_node(&[Label::Scope], scope_props("x")).unwrap();
        tx.commit().unwrap();

        assert!(before.find_nodes(Label::Scope, &Props::new()).unwrap().is_empty());
        assert_eq!(store.node_count(), 1);
    }

    /// Two writers racing from the same snapshot: the second commit fails.
    #[test]
    fn test_conflicting_commit_is_rejected() {
        let store = MemoryGraphStore::new();
        let mut first = store.begin(TxMode::Write).unwrap();
        let mut second = store.begin(TxMode::Write).unwrap();

        first.create_node(&[Label::Scope], scope_props("a")).unwrap();
        second.create_node(&[Label::Scope], scope_props("b")).unwrap();

        first.commit().unwrap();
        assert!(matches!(second.commit(), Err(AapError::Graph { .. })));

        let read = store.begin(TxMode::Read).unwrap();
        let names: Vec<String> = read
            .find_nodes(Label::Scope, &Props::new())
            .unwrap()
            .iter()
            .map(|n| n.prop("name").to_string())
            .collect();
        assert_eq!(names, vec!["a"]);
    }

    /// merge_node and merge_edge are idempotent.
    #[test]
    fn test_merge_is_idempotent() {
        let store = MemoryGraphStore::new();
        let mut tx = store.begin(TxMode::Write).unwrap();
        let a1 = tx.merge_node(Label::Scope, scope_props("a"), Props::new()).unwrap();
        let a2 = tx
            .merge_node(Label::Scope, scope_props("a"), props([("title", "A")]))
            .unwrap();
        assert_eq!(a1.id, a2.id);
        assert_eq!(a2.prop("title"), "A");

        let b = tx.merge_node(Label::Scope, scope_props("b"), Props::new()).unwrap();
        let e1 = tx.merge_edge(&a1.id, Rel::MayGrant, &b.id, Props::new()).unwrap();
        let e2 = tx.merge_edge(&a1.id, Rel::MayGrant, &b.id, Props::new()).unwrap();
        assert_eq!(e1.id, e2.id);
        tx.commit().unwrap();

        assert_eq!(store.node_count(), 2);
        assert_eq!(store.edge_count(), 1);
    }

    /// detach_delete removes the node and every edge touching it.
    #[test]
    fn test_detach_delete() {
        let store = MemoryGraphStore::new();
        let mut tx = store.begin(TxMode::Write).unwrap();
        let a = tx.create_node(&[Label::Consent], Props::new()).unwrap();
        let b = tx.create_node(&[Label::Publish], Props::new()).unwrap();
        let c = tx.create_node(&[Label::Identity], Props::new()).unwrap();
        tx.create_edge(&a.id, Rel::Consented, &b.id, Props::new()).unwrap();
        tx.create_edge(&c.id, Rel::IsConsenting, &a.id, Props::new()).unwrap();
        tx.detach_delete(&a.id).unwrap();
        tx.commit().unwrap();

        assert_eq!(store.node_count(), 2);
        assert_eq!(store.edge_count(), 0);
    }

    #[test]
    fn test_edge_requires_existing_nodes() {
        let store = MemoryGraphStore::new();
        let mut tx = store.begin(TxMode::Write).unwrap();
        let a = tx.create_node(&[Label::Scope], Props::new()).unwrap();
        let ghost = aap_contracts::graph::NodeId("n-ghost".to_string());
        assert!(tx.create_edge(&a.id, Rel::MayGrant, &ghost, Props::new()).is_err());
    }

    /// Seeding an identity twice keeps one node and accumulates kinds.
    #[test]
    fn test_seed_identity_is_idempotent() {
        let store = MemoryGraphStore::new();
        let id = IdentityId::from("svc");
        store.seed_identity(&id, &[IdentityKind::Client]).unwrap();
        store.seed_identity(&id, &[IdentityKind::ResourceServer]).unwrap();

        let read = store.begin(TxMode::Read).unwrap();
        let nodes = read
            .find_nodes(Label::Identity, &props([("id", "svc")]))
            .unwrap();
        assert_eq!(nodes.len(), 1);
        assert!(nodes[0].has_label(Label::Client));
        assert!(nodes[0].has_label(Label::ResourceServer));
    }
}
