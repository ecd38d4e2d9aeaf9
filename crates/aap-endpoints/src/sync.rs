//! Post-commit scope synchronization.
//!
//! After a subscription change commits, each affected client's full
//! subscribed scope set is pushed to the consent authority on a detached
//! worker thread. The push reads the committed graph in its own read
//! transaction. Failures are logged and never touch the graph.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, error};

use aap_contracts::{error::AapResult, graph::TxMode, identity::IdentityId};
use aap_core::traits::{GraphStore, ScopeSync};
use aap_policy::subscription::subscribed_scopes;

/// Push the subscribed scopes of every client in `subscribers`.
///
/// The returned handle may be dropped; tests join it.
pub fn spawn_scope_sync(
    store: Arc<dyn GraphStore>,
    sync: Arc<dyn ScopeSync>,
    subscribers: Vec<IdentityId>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        for subscriber in &subscribers {
            match push(store.as_ref(), sync.as_ref(), subscriber) {
                Ok(count) => debug!(subscriber = %subscriber, scopes = count, "client scopes pushed"),
                Err(err) => error!(subscriber = %subscriber, error = %err, "client scope sync failed"),
            }
        }
    })
}

fn push(store: &dyn GraphStore, sync: &dyn ScopeSync, subscriber: &IdentityId) -> AapResult<usize> {
    let tx = store.begin(TxMode::Read)?;
    let scopes = subscribed_scopes(&*tx, subscriber)?;
    tx.rollback()?;
    sync.sync_client_scopes(subscriber, &scopes)?;
    Ok(scopes.len())
}
