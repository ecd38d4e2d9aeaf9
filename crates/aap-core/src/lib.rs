//! # aap-core
//!
//! The transactional backbone of the AAP authorization engine.
//!
//! This crate provides:
//! - The adapter traits (`GraphStore`, `GraphTransaction`, `ConsentAuthority`,
//!   `ScopeSync`, `Clock`, `Validate`)
//! - The `BulkExecutor` that runs every endpoint's batch in one transaction
//!   with fail-fast, commit-all semantics
//!
//! ## Usage
//!
//! ```rust,ignore
//! use aap_core::{BulkExecutor, bulk::BatchLimits};
//!
//! let outcome = executor.execute(TxMode::Write, BatchLimits::new(100), inputs, |tx, batch| {
//!     batch.process(tx, |tx, input| create_thing(tx, input).map(|o| (200, o)));
//!     Ok(())
//! })?;
//! ```

pub mod bulk;
pub mod traits;

pub use bulk::BulkExecutor;

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use aap_contracts::{
        bulk::ErrorCode,
        error::{AapError, AapResult},
        graph::{Direction, Edge, EdgeId, Label, Node, NodeId, Props, Rel, TxMode},
    };

    use crate::bulk::{BatchLimits, BulkExecutor};
    use crate::traits::{GraphStore, GraphTransaction, Validate};

    // ── Mock store ───────────────────────────────────────────────────────────

    /// Records which node "names" were committed and how transactions ended.
    #[derive(Default)]
    struct Journal {
        committed: Vec<String>,
        commits: u32,
        rollbacks: u32,
        begins: u32,
    }

    struct MockStore {
        journal: Arc<Mutex<Journal>>,
        fail_commit: bool,
    }

    impl MockStore {
        fn new() -> Self {
            Self {
                journal: Arc::new(Mutex::new(Journal::default())),
                fail_commit: false,
            }
        }
    }

    impl GraphStore for MockStore {
        fn begin(&self, mode: TxMode) -> AapResult<Box<dyn GraphTransaction>> {
            self.journal.lock().unwrap().begins += 1;
            Ok(Box::new(MockTx {
                mode,
                pending: vec![],
                journal: self.journal.clone(),
                fail_commit: self.fail_commit,
            }))
        }
    }

    struct MockTx {
        mode: TxMode,
        pending: Vec<String>,
        journal: Arc<Mutex<Journal>>,
        fail_commit: bool,
    }

    impl GraphTransaction for MockTx {
        fn mode(&self) -> TxMode {
            self.mode
        }

        fn find_nodes(&self, _label: Label, _filter: &Props) -> AapResult<Vec<Node>> {
            Ok(vec![])
        }

        fn walk(&self, _node: &NodeId, _rel: Rel, _dir: Direction) -> AapResult<Vec<(Edge, Node)>> {
            Ok(vec![])
        }

        fn create_node(&mut self, _labels: &[Label], props: Props) -> AapResult<Node> {
            if self.mode == TxMode::Read {
                return Err(AapError::graph("write in read transaction"));
            }
            let name = props.get("name").cloned().unwrap_or_default();
            self.pending.push(name.clone());
            Ok(Node {
                id: NodeId(name),
                labels: Default::default(),
                props,
            })
        }

        fn merge_node(&mut self, label: Label, key: Props, _set: Props) -> AapResult<Node> {
            self.create_node(&[label], key)
        }

        fn create_edge(&mut self, from: &NodeId, rel: Rel, to: &NodeId, props: Props) -> AapResult<Edge> {
            Ok(Edge {
                id: EdgeId("e".to_string()),
                rel,
                from: from.clone(),
                to: to.clone(),
                props,
            })
        }

        fn merge_edge(&mut self, from: &NodeId, rel: Rel, to: &NodeId, props: Props) -> AapResult<Edge> {
            self.create_edge(from, rel, to, props)
        }

        fn delete_edge(&mut self, _edge: &Edge) -> AapResult<()> {
            Ok(())
        }

        fn detach_delete(&mut self, _node: &NodeId) -> AapResult<()> {
            Ok(())
        }

        fn commit(self: Box<Self>) -> AapResult<()> {
            let MockTx {
                pending,
                journal,
                fail_commit,
                ..
            } = *self;
            if fail_commit {
                return Err(AapError::graph("commit conflict"));
            }
            let mut journal = journal.lock().unwrap();
            journal.commits += 1;
            journal.committed.extend(pending);
            Ok(())
        }

        fn rollback(self: Box<Self>) -> AapResult<()> {
            self.journal.lock().unwrap().rollbacks += 1;
            Ok(())
        }
    }

    // ── Inputs ───────────────────────────────────────────────────────────────

    #[derive(Debug, Clone)]
    struct Item {
        name: String,
        /// Simulates a policy failure inside the transaction.
        policy_fail: bool,
    }

    impl Validate for Item {
        fn validate(&self) -> AapResult<()> {
            if self.name.is_empty() {
                return Err(AapError::invalid("name is required"));
            }
            Ok(())
        }
    }

    fn item(name: &str) -> Item {
        Item {
            name: name.to_string(),
            policy_fail: false,
        }
    }

    fn failing(name: &str) -> Item {
        Item {
            name: name.to_string(),
            policy_fail: true,
        }
    }

    fn write_handler(
        tx: &mut dyn GraphTransaction,
        input: &Item,
    ) -> AapResult<(u16, String)> {
        if input.policy_fail {
            return Err(AapError::NoSubscriptions {
                subscriber: input.name.clone(),
            });
        }
        tx.create_node(&[Label::Scope], aap_contracts::graph::props([("name", input.name.as_str())]))?;
        Ok((200, input.name.clone()))
    }

    // ── Test cases ───────────────────────────────────────────────────────────

    /// All items succeed: one transaction, one commit, ordered responses.
    #[test]
    fn test_successful_batch_commits_once() {
        let store = MockStore::new();
        let journal = store.journal.clone();
        let executor = BulkExecutor::new(Arc::new(store));

        let outcome = executor
            .execute(TxMode::Write, BatchLimits::new(10), vec![item("a"), item("b"), item("c")], |tx, batch| {
                batch.process(tx, write_handler);
                Ok(())
            })
            .unwrap();

        assert!(outcome.committed);
        let indexes: Vec<usize> = outcome.responses.iter().map(|r| r.index).collect();
        assert_eq!(indexes, vec![0, 1, 2]);
        assert_eq!(outcome.responses[1].ok.as_deref(), Some("b"));

        let journal = journal.lock().unwrap();
        assert_eq!(journal.begins, 1);
        assert_eq!(journal.commits, 1);
        assert_eq!(journal.committed, vec!["a", "b", "c"]);
    }

    /// Core atomicity test: a failure at item k rolls back items before it,
    /// never evaluates items after it, and stamps the abort code everywhere
    /// except the failing item.
    #[test]
    fn test_policy_failure_aborts_whole_batch() {
        let store = MockStore::new();
        let journal = store.journal.clone();
        let executor = BulkExecutor::new(Arc::new(store));

        let evaluated = Arc::new(Mutex::new(Vec::new()));
        let seen = evaluated.clone();

        let inputs = vec![item("a"), item("b"), failing("c"), item("d")];
        let outcome = executor
            .execute(TxMode::Write, BatchLimits::new(10), inputs, |tx, batch| {
                batch.process(tx, |tx, input| {
                    seen.lock().unwrap().push(input.name.clone());
                    write_handler(tx, input)
                });
                Ok(())
            })
            .unwrap();

        assert!(!outcome.committed);
        let codes: Vec<_> = outcome.responses.iter().map(|r| r.code()).collect();
        assert_eq!(
            codes,
            vec![
                Some(ErrorCode::FailedDueToOtherErrors),
                Some(ErrorCode::FailedDueToOtherErrors),
                Some(ErrorCode::NoSubscriptions),
                Some(ErrorCode::FailedDueToOtherErrors),
            ]
        );
        assert_eq!(*evaluated.lock().unwrap(), vec!["a", "b", "c"], "item d must never run");

        let journal = journal.lock().unwrap();
        assert_eq!(journal.commits, 0);
        assert_eq!(journal.rollbacks, 1);
        assert!(journal.committed.is_empty(), "no effects may persist");
    }

    /// Invalid input is rejected before any transaction opens.
    #[test]
    fn test_validation_failure_opens_no_transaction() {
        let store = MockStore::new();
        let journal = store.journal.clone();
        let executor = BulkExecutor::new(Arc::new(store));

        let outcome = executor
            .execute(TxMode::Write, BatchLimits::new(10), vec![item("a"), item("")], |tx, batch| {
                batch.process(tx, write_handler);
                Ok(())
            })
            .unwrap();

        assert!(!outcome.committed);
        assert_eq!(outcome.responses[0].code(), Some(ErrorCode::FailedDueToOtherErrors));
        assert_eq!(outcome.responses[1].code(), Some(ErrorCode::InputValidationFailed));
        assert_eq!(outcome.responses[1].status, 400);
        assert_eq!(journal.lock().unwrap().begins, 0);
    }

    #[test]
    fn test_empty_batch_rejected_unless_allowed() {
        let executor = BulkExecutor::new(Arc::new(MockStore::new()));

        let rejected = executor.execute::<Item, String, _>(TxMode::Read, BatchLimits::new(10), vec![], |_, _| Ok(()));
        assert!(matches!(rejected, Err(AapError::EmptyRequestNotAllowed)));

        let accepted = executor
            .execute::<Item, String, _>(TxMode::Read, BatchLimits::new(10).allowing_empty(), vec![], |_, _| Ok(()))
            .unwrap();
        assert!(accepted.committed);
        assert!(accepted.responses.is_empty());
    }

    #[test]
    fn test_max_requests_exceeded() {
        let executor = BulkExecutor::new(Arc::new(MockStore::new()));
        let result = executor.execute(TxMode::Write, BatchLimits::single(), vec![item("a"), item("b")], |tx, batch| {
            batch.process(tx, write_handler);
            Ok(())
        });
        assert!(matches!(result, Err(AapError::MaxRequestsExceeded { max: 1, got: 2 })));
    }

    /// A handler that forgets an item must not commit.
    #[test]
    fn test_unprocessed_item_is_never_committed() {
        let store = MockStore::new();
        let journal = store.journal.clone();
        let executor = BulkExecutor::new(Arc::new(store));

        let outcome = executor
            .execute(TxMode::Write, BatchLimits::new(10), vec![item("a"), item("b")], |tx, batch| {
                let first = batch.requests()[0].input.clone();
                let (status, out) = write_handler(tx, &first)?;
                batch.succeed(0, status, out);
                Ok(())
            })
            .unwrap();

        assert!(!outcome.committed);
        assert!(outcome
            .responses
            .iter()
            .all(|r| r.code() == Some(ErrorCode::InternalServerError)));
        assert_eq!(journal.lock().unwrap().commits, 0);
    }

    /// An infrastructure error from the handler becomes a per-item internal error.
    #[test]
    fn test_handler_error_rolls_back() {
        let store = MockStore::new();
        let journal = store.journal.clone();
        let executor = BulkExecutor::new(Arc::new(store));

        let outcome = executor
            .execute::<Item, String, _>(TxMode::Write, BatchLimits::new(10), vec![item("a")], |_, _| {
                Err(AapError::Authority {
                    reason: "timeout".to_string(),
                })
            })
            .unwrap();

        assert!(!outcome.committed);
        assert_eq!(outcome.responses[0].code(), Some(ErrorCode::InternalServerError));
        assert_eq!(outcome.responses[0].status, 500);
        assert_eq!(journal.lock().unwrap().rollbacks, 1);
    }

    /// A batch-level rejection stamps its own error on every item and rolls back.
    #[test]
    fn test_rejected_batch_reports_the_rejection_everywhere() {
        let store = MockStore::new();
        let journal = store.journal.clone();
        let executor = BulkExecutor::new(Arc::new(store));

        let outcome = executor
            .execute(TxMode::Write, BatchLimits::new(10), vec![item("a"), item("b")], |tx, batch| {
                batch.reject(&AapError::Forbidden {
                    reason: "missing scope".to_string(),
                });
                batch.process(tx, write_handler);
                Ok(())
            })
            .unwrap();

        assert!(!outcome.committed);
        assert!(outcome.responses.iter().all(|r| r.code() == Some(ErrorCode::Forbidden)));
        assert!(outcome.responses.iter().all(|r| r.status == 403));
        let journal = journal.lock().unwrap();
        assert_eq!(journal.rollbacks, 1);
        assert!(journal.committed.is_empty());
    }

    #[test]
    fn test_commit_failure_reports_internal_error() {
        let mut store = MockStore::new();
        store.fail_commit = true;
        let executor = BulkExecutor::new(Arc::new(store));

        let outcome = executor
            .execute(TxMode::Write, BatchLimits::new(10), vec![item("a")], |tx, batch| {
                batch.process(tx, write_handler);
                Ok(())
            })
            .unwrap();

        assert!(!outcome.committed);
        assert_eq!(outcome.responses[0].code(), Some(ErrorCode::InternalServerError));
    }
}
