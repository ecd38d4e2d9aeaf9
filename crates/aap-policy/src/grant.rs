//! Grant rules: a receiver may exercise a published scope for an owner.

use tracing::{debug, info};

use aap_contracts::{
    error::{AapError, AapResult},
    graph::{props, Direction, Label, Props, Rel},
    identity::IdentityId,
    rules::{GrantRule, RuleId},
    scope::ScopeName,
};
use aap_core::traits::GraphTransaction;

use crate::{
    lookup::{
        follow, grant_view, identity, may_grant_scopes, publish_rule, require_identity, scope_node, EXPIRE, ID,
        NOT_BEFORE,
    },
    publish::matches_publisher,
    requests::{GrantFilter, GrantRef, NewGrant},
};

/// Create a fresh Grant rule. Grants are never deduplicated.
///
/// # Errors
///
/// `NotFound` if the receiver, publisher, owner, or the Publish rule for
/// (publisher, scope) does not resolve.
pub fn create_grant(tx: &mut dyn GraphTransaction, input: &NewGrant) -> AapResult<GrantRule> {
    let scope = ScopeName::parse(&input.scope)?;
    let receiver = require_identity(&*tx, &input.receiver)?;
    let publisher = require_identity(&*tx, &input.publisher)?;
    let owner = require_identity(&*tx, &input.on_behalf_of)?;
    let publish = publish_rule(&*tx, &publisher, &scope.full())?
        .ok_or_else(|| AapError::not_found("publish rule", format!("{}/{}", input.publisher, scope)))?;

    let id = RuleId::new();
    let grant = tx.create_node(
        &[Label::Grant],
        props([
            (ID, id.0.clone()),
            (NOT_BEFORE, input.not_before.to_string()),
            (EXPIRE, input.expire.to_string()),
        ]),
    )?;
    tx.create_edge(&receiver.id, Rel::IsGranted, &grant.id, Props::new())?;
    tx.create_edge(&grant.id, Rel::Granted, &publish.id, Props::new())?;
    tx.create_edge(&grant.id, Rel::OnBehalfOf, &owner.id, Props::new())?;

    let may_grant = match scope_node(&*tx, &scope.full())? {
        Some(node) => may_grant_scopes(&*tx, &node)?,
        None => Vec::new(),
    };

    info!(
        grant_id = %id.0,
        receiver = %input.receiver,
        publisher = %input.publisher,
        scope = %scope,
        owner = %input.on_behalf_of,
        "grant created"
    );
    Ok(GrantRule {
        id,
        receiver: input.receiver.clone(),
        publisher: input.publisher.clone(),
        scope: scope.full(),
        owner: input.on_behalf_of.clone(),
        not_before: input.not_before,
        expire: input.expire,
        may_grant_scopes: may_grant,
    })
}

/// Read the grants held by `filter.receiver`.
///
/// Every optional filter left empty is unrestricted. An unknown receiver
/// holds no grants.
pub fn fetch_grants(tx: &dyn GraphTransaction, filter: &GrantFilter) -> AapResult<Vec<GrantRule>> {
    let Some(receiver) = identity(tx, &filter.receiver)? else {
        return Ok(Vec::new());
    };
    let mut grants = Vec::new();
    for (_, node) in tx.walk(&receiver.id, Rel::IsGranted, Direction::Outgoing)? {
        let Some(grant) = grant_view(tx, &filter.receiver, &node)? else {
            continue;
        };
        if !filter.scopes.is_empty() && !filter.scopes.contains(&grant.scope) {
            continue;
        }
        if !matches_publisher(filter.publisher.as_ref(), &grant.publisher) {
            continue;
        }
        if filter.on_behalf_of.as_ref().is_some_and(|o| o != &grant.owner) {
            continue;
        }
        grants.push(grant);
    }
    debug!(receiver = %filter.receiver, found = grants.len(), "grants fetched");
    Ok(grants)
}

/// Detach-delete one grant, returning what was removed.
pub fn delete_grant(tx: &mut dyn GraphTransaction, target: &GrantRef) -> AapResult<GrantRule> {
    let node = tx
        .find_nodes(Label::Grant, &props([(ID, target.id.0.as_str())]))?
        .into_iter()
        .next()
        .ok_or_else(|| AapError::not_found("grant", target.id.0.as_str()))?;
    let receiver = follow(&*tx, &node, Rel::IsGranted, Direction::Incoming)?
        .ok_or_else(|| AapError::not_found("grant", target.id.0.as_str()))?;
    let receiver_id = IdentityId::new(receiver.prop(ID));
    let removed = grant_view(&*tx, &receiver_id, &node)?
        .ok_or_else(|| AapError::not_found("grant", target.id.0.as_str()))?;

    tx.detach_delete(&node.id)?;
    info!(grant_id = %target.id.0, receiver = %receiver_id, "grant deleted");
    Ok(removed)
}
