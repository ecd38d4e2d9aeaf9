//! Graph lookups shared by the resolution functions and the Judge.
//!
//! Every helper takes a read view of the transaction and only walks the
//! schema; none of them writes.

use aap_contracts::{
    error::{AapError, AapResult},
    graph::{props, Direction, Label, Node, Props, Rel},
    identity::IdentityId,
    rules::{GrantRule, PublishRule, RuleId, Validity},
};
use aap_core::traits::GraphTransaction;

// ── Property keys ─────────────────────────────────────────────────────────────

pub(crate) const ID: &str = "id";
pub(crate) const NAME: &str = "name";
pub(crate) const TITLE: &str = "title";
pub(crate) const DESCRIPTION: &str = "description";
pub(crate) const NOT_BEFORE: &str = "nbf";
pub(crate) const EXPIRE: &str = "exp";
pub(crate) const REQUESTED_BY: &str = "requested_by";

// ── Node lookups ──────────────────────────────────────────────────────────────

pub(crate) fn identity(tx: &dyn GraphTransaction, id: &IdentityId) -> AapResult<Option<Node>> {
    Ok(tx
        .find_nodes(Label::Identity, &props([(ID, id.as_str())]))?
        .into_iter()
        .next())
}

/// Resolve an identity or fail with `NotFound`.
pub(crate) fn require_identity(tx: &dyn GraphTransaction, id: &IdentityId) -> AapResult<Node> {
    identity(tx, id)?.ok_or_else(|| AapError::not_found("identity", id.as_str()))
}

pub(crate) fn scope_node(tx: &dyn GraphTransaction, name: &str) -> AapResult<Option<Node>> {
    Ok(tx.find_nodes(Label::Scope, &props([(NAME, name)]))?.into_iter().next())
}

pub(crate) fn all_identities(tx: &dyn GraphTransaction) -> AapResult<Vec<Node>> {
    tx.find_nodes(Label::Identity, &Props::new())
}

/// Identities to scan for a read: the named one, or every identity when the
/// filter is unset. An unknown id yields nothing.
pub(crate) fn identities_matching(
    tx: &dyn GraphTransaction,
    filter: Option<&IdentityId>,
) -> AapResult<Vec<Node>> {
    match filter {
        Some(id) => Ok(identity(tx, id)?.into_iter().collect()),
        None => all_identities(tx),
    }
}

/// The single node at the far end of `rel`, if any.
pub(crate) fn follow(tx: &dyn GraphTransaction, node: &Node, rel: Rel, direction: Direction) -> AapResult<Option<Node>> {
    Ok(tx.walk(&node.id, rel, direction)?.into_iter().next().map(|(_, n)| n))
}

/// The Publish rule `publisher` holds for the scope named `scope`.
pub(crate) fn publish_rule(tx: &dyn GraphTransaction, publisher: &Node, scope: &str) -> AapResult<Option<Node>> {
    for (_, publish) in tx.walk(&publisher.id, Rel::IsPublishing, Direction::Outgoing)? {
        let target = follow(tx, &publish, Rel::Publish, Direction::Outgoing)?;
        if target.is_some_and(|s| s.prop(NAME) == scope) {
            return Ok(Some(publish));
        }
    }
    Ok(None)
}

/// Names of the scopes one MAY_GRANT hop below `scope`.
pub(crate) fn may_grant_scopes(tx: &dyn GraphTransaction, scope: &Node) -> AapResult<Vec<String>> {
    Ok(tx
        .walk(&scope.id, Rel::MayGrant, Direction::Outgoing)?
        .into_iter()
        .map(|(_, n)| n.prop(NAME).to_string())
        .collect())
}

// ── Views ─────────────────────────────────────────────────────────────────────

/// Read a Publish node back as a `PublishRule`.
///
/// Returns `None` for a dangling rule with no publisher or no scope.
pub(crate) fn publish_view(tx: &dyn GraphTransaction, publish: &Node) -> AapResult<Option<PublishRule>> {
    let publisher = follow(tx, publish, Rel::IsPublishing, Direction::Incoming)?;
    let scope = follow(tx, publish, Rel::Publish, Direction::Outgoing)?;
    let (Some(publisher), Some(scope)) = (publisher, scope) else {
        return Ok(None);
    };
    Ok(Some(PublishRule {
        id: RuleId(publish.prop(ID).to_string()),
        publisher: IdentityId::new(publisher.prop(ID)),
        scope: scope.prop(NAME).to_string(),
        title: publish.prop(TITLE).to_string(),
        description: publish.prop(DESCRIPTION).to_string(),
    }))
}

pub(crate) fn parse_instant(node: &Node, key: &str) -> AapResult<i64> {
    let raw = node.prop(key);
    if raw.is_empty() {
        return Ok(0);
    }
    raw.parse::<i64>()
        .map_err(|e| AapError::graph(format!("property {key}='{raw}' on node {} is not a timestamp: {e}", node.id.0)))
}

pub(crate) fn validity_of(grant: &Node) -> AapResult<Validity> {
    Ok(Validity {
        not_before: parse_instant(grant, NOT_BEFORE)?,
        expire: parse_instant(grant, EXPIRE)?,
    })
}

/// Read a Grant node held by `receiver` back as a `GrantRule`.
pub(crate) fn grant_view(tx: &dyn GraphTransaction, receiver: &IdentityId, grant: &Node) -> AapResult<Option<GrantRule>> {
    let Some(publish) = follow(tx, grant, Rel::Granted, Direction::Outgoing)? else {
        return Ok(None);
    };
    let Some(rule) = publish_view(tx, &publish)? else {
        return Ok(None);
    };
    let Some(owner) = follow(tx, grant, Rel::OnBehalfOf, Direction::Outgoing)? else {
        return Ok(None);
    };
    let may_grant = match scope_node(tx, &rule.scope)? {
        Some(scope) => may_grant_scopes(tx, &scope)?,
        None => Vec::new(),
    };
    let validity = validity_of(grant)?;
    Ok(Some(GrantRule {
        id: RuleId(grant.prop(ID).to_string()),
        receiver: receiver.clone(),
        publisher: rule.publisher,
        scope: rule.scope,
        owner: IdentityId::new(owner.prop(ID)),
        not_before: validity.not_before,
        expire: validity.expire,
        may_grant_scopes: may_grant,
    }))
}
