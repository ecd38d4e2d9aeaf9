//! The Judge: deny-by-default authorization decisions over the policy graph.
//!
//! Decision algorithm for one (publisher, requestor, scope, owners) question:
//!
//! 1. Validate the question. Malformed input is returned as `Err`; nothing is
//!    granted.
//! 2. Sample "now" once.
//! 3. Find the Publish rule for (publisher, scope), then walk the requestor's
//!    grants on that rule whose validity window covers now, resolving each
//!    grant's owner.
//! 4. An owner is accepted when the owner filter is empty, names the owner,
//!    or the owner is the publisher itself.
//! 5. Any accepted owner grants. Anything else, including a graph error,
//!    denies with the scope reported missing.

use std::collections::BTreeSet;

use tracing::{debug, warn};

use aap_contracts::{
    error::AapResult,
    graph::{Direction, Node, Rel},
    identity::IdentityId,
    verdict::{Authorization, Verdict},
};
use aap_core::traits::{Clock, FixedClock, GraphTransaction, Validate};

use crate::{
    lookup::{follow, identity, publish_rule, validity_of, ID},
    requests::JudgeRequest,
};

/// Decide a single scope.
///
/// Returns `Err` only for invalid input. A run-time failure while walking
/// the graph is logged and reported as a denied verdict.
pub fn judge(tx: &dyn GraphTransaction, clock: &dyn Clock, request: &JudgeRequest) -> AapResult<Verdict> {
    request.validate()?;
    let now = clock.now();

    let owners = match matching_owners(tx, now, request) {
        Ok(owners) => owners,
        Err(err) => {
            warn!(
                publisher = %request.publisher,
                requestor = %request.requestor,
                scope = %request.scope,
                error = %err,
                "judge failed while walking the graph, denying"
            );
            Vec::new()
        }
    };

    if owners.is_empty() {
        debug!(
            publisher = %request.publisher,
            requestor = %request.requestor,
            scope = %request.scope,
            "denied"
        );
        return Ok(Verdict::deny(
            request.publisher.clone(),
            request.requestor.clone(),
            request.scope.clone(),
            request.owners.clone(),
        ));
    }

    debug!(
        publisher = %request.publisher,
        requestor = %request.requestor,
        scope = %request.scope,
        owners = owners.len(),
        "granted"
    );
    Ok(Verdict {
        publisher: request.publisher.clone(),
        requestor: request.requestor.clone(),
        scope: request.scope.clone(),
        owners,
        granted: true,
        missing: Vec::new(),
    })
}

/// Owners on whose behalf the requestor currently holds the scope.
fn matching_owners(tx: &dyn GraphTransaction, now: i64, request: &JudgeRequest) -> AapResult<Vec<IdentityId>> {
    let Some(publisher) = identity(tx, &request.publisher)? else {
        return Ok(Vec::new());
    };
    let Some(requestor) = identity(tx, &request.requestor)? else {
        return Ok(Vec::new());
    };
    let Some(publish) = publish_rule(tx, &publisher, &request.scope)? else {
        return Ok(Vec::new());
    };

    let accepted: Option<BTreeSet<&IdentityId>> = if request.owners.is_empty() {
        None
    } else {
        Some(request.owners.iter().chain(std::iter::once(&request.publisher)).collect())
    };

    let mut owners = BTreeSet::new();
    for (_, grant) in tx.walk(&requestor.id, Rel::IsGranted, Direction::Outgoing)? {
        if !grants_rule(tx, &grant, &publish)? {
            continue;
        }
        if !validity_of(&grant)?.covers(now) {
            continue;
        }
        let Some(owner) = follow(tx, &grant, Rel::OnBehalfOf, Direction::Outgoing)? else {
            continue;
        };
        let owner = IdentityId::new(owner.prop(ID));
        if accepted.as_ref().map_or(true, |set| set.contains(&owner)) {
            owners.insert(owner);
        }
    }
    Ok(owners.into_iter().collect())
}

fn grants_rule(tx: &dyn GraphTransaction, grant: &Node, publish: &Node) -> AapResult<bool> {
    Ok(follow(tx, grant, Rel::Granted, Direction::Outgoing)?.is_some_and(|p| p.id == publish.id))
}

/// Decide several scopes for one (publisher, requestor, owners) triple.
///
/// "Now" is sampled once and shared by every scope. Granted only if every
/// requested scope is granted; an empty scope list is never granted.
pub fn judge_all(
    tx: &dyn GraphTransaction,
    clock: &dyn Clock,
    publisher: &IdentityId,
    requestor: &IdentityId,
    scopes: &[String],
    owners: &[IdentityId],
) -> AapResult<Authorization> {
    let frozen = FixedClock(clock.now());
    let mut granted_scopes = Vec::new();
    let mut missing_scopes = Vec::new();
    let mut matched_owners = BTreeSet::new();

    for scope in scopes {
        let request = JudgeRequest {
            publisher: publisher.clone(),
            requestor: requestor.clone(),
            scope: scope.clone(),
            owners: owners.to_vec(),
        };
        let verdict = judge(tx, &frozen, &request)?;
        if verdict.granted {
            granted_scopes.push(verdict.scope);
            matched_owners.extend(verdict.owners);
        } else {
            missing_scopes.extend(verdict.missing);
        }
    }

    let granted = !scopes.is_empty() && missing_scopes.is_empty();
    Ok(Authorization {
        publisher: publisher.clone(),
        requestor: requestor.clone(),
        granted,
        granted_scopes,
        missing_scopes,
        owners: if granted {
            matched_owners.into_iter().collect()
        } else {
            owners.to_vec()
        },
    })
}
