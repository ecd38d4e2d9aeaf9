//! First-run setup of the engine's own scopes.
//!
//! Every endpoint is authorized against an `aap:*` scope published by the
//! AAP identity. `bootstrap` publishes all of them and grants each to the
//! given admin clients on behalf of the AAP identity, so those clients can
//! call every endpoint for any owner. Running it again is a no-op.

use tracing::info;

use aap_contracts::{
    error::AapResult,
    graph::TxMode,
    identity::IdentityId,
};
use aap_core::traits::{Clock, GraphStore};
use aap_policy::{
    grant::{create_grant, fetch_grants},
    publish::create_publish,
    requests::{GrantFilter, NewGrant, NewPublish},
};

use crate::endpoint::Endpoint;

/// What one bootstrap run changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BootstrapReport {
    pub scopes_published: usize,
    pub grants_created: usize,
}

/// Publish every endpoint scope and grant it to `admins`, in one write
/// transaction. The AAP identity and every admin must already exist.
pub fn bootstrap(
    store: &dyn GraphStore,
    clock: &dyn Clock,
    aap_identity: &IdentityId,
    admins: &[IdentityId],
) -> AapResult<BootstrapReport> {
    let now = clock.now();
    let mut tx = store.begin(TxMode::Write)?;
    let mut report = BootstrapReport::default();

    for endpoint in Endpoint::ALL {
        let scope = endpoint.required_scope();
        create_publish(
            tx.as_mut(),
            clock,
            &NewPublish {
                publisher: aap_identity.clone(),
                scope: scope.to_string(),
                title: format!("AAP {endpoint}"),
                description: format!("Call the AAP {endpoint} endpoint"),
                requested_by: aap_identity.clone(),
            },
        )?;
        report.scopes_published += 1;

        for admin in admins {
            let existing = fetch_grants(
                &*tx,
                &GrantFilter {
                    receiver: admin.clone(),
                    scopes: vec![scope.to_string()],
                    publisher: Some(aap_identity.clone()),
                    on_behalf_of: Some(aap_identity.clone()),
                },
            )?;
            if !existing.is_empty() {
                continue;
            }
            create_grant(
                tx.as_mut(),
                &NewGrant {
                    receiver: admin.clone(),
                    publisher: aap_identity.clone(),
                    scope: scope.to_string(),
                    on_behalf_of: aap_identity.clone(),
                    not_before: now,
                    expire: 0,
                },
            )?;
            report.grants_created += 1;
        }
    }

    tx.commit()?;
    info!(
        aap = %aap_identity,
        scopes = report.scopes_published,
        grants = report.grants_created,
        "AAP scopes bootstrapped"
    );
    Ok(report)
}
