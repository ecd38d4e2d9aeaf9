//! Publish rules: a publisher exposing a scope hierarchy.

use tracing::{debug, info};

use aap_contracts::{
    error::AapResult,
    graph::{props, Direction, Label, Node, Props, Rel},
    identity::IdentityId,
    rules::{PublishRule, RuleId},
    scope::{ScopeLevel, ScopeName},
};
use aap_core::traits::{Clock, GraphTransaction};

use crate::{
    lookup::{
        follow, publish_rule, publish_view, require_identity, DESCRIPTION, EXPIRE, ID, NAME, NOT_BEFORE, TITLE,
    },
    requests::{NewPublish, PublishFilter},
    scope::ensure_hierarchy,
};

/// Title and description of the Publish rule at `level`, derived from the
/// base rule's metadata.
fn derived_metadata(level: ScopeLevel, title: &str, description: &str) -> (String, String) {
    match level {
        ScopeLevel::Base => (title.to_string(), description.to_string()),
        ScopeLevel::MayGrant => (format!("Grant {title}"), format!("Grant access to: {description}")),
        ScopeLevel::MayGrantMayGrant => (
            format!("Delegate {title}"),
            format!("Delegate granting of: {description}"),
        ),
    }
}

/// Merge the Publish rule `publisher` holds for `scope`, creating it when
/// missing and refreshing its metadata otherwise.
fn merge_publish(tx: &mut dyn GraphTransaction, publisher: &Node, scope: &Node, input: &NewPublish) -> AapResult<Node> {
    let level = ScopeName::parse(scope.prop(NAME))?.level();
    let (title, description) = derived_metadata(level, &input.title, &input.description);
    let metadata = props([(TITLE, title), (DESCRIPTION, description)]);
    if let Some(existing) = publish_rule(&*tx, publisher, scope.prop(NAME))? {
        let key = props([(ID, existing.prop(ID))]);
        return tx.merge_node(Label::Publish, key, metadata);
    }

    let mut fields = metadata;
    fields.insert(ID.to_string(), RuleId::new().0);
    let publish = tx.create_node(&[Label::Publish], fields)?;
    tx.create_edge(&publisher.id, Rel::IsPublishing, &publish.id, Props::new())?;
    tx.create_edge(&publish.id, Rel::Publish, &scope.id, Props::new())?;
    Ok(publish)
}

/// True if `receiver` already holds any grant on the Publish rule `publish`.
fn holds_grant_on(tx: &dyn GraphTransaction, receiver: &Node, publish: &Node) -> AapResult<bool> {
    for (_, grant) in tx.walk(&receiver.id, Rel::IsGranted, Direction::Outgoing)? {
        if follow(tx, &grant, Rel::Granted, Direction::Outgoing)?.is_some_and(|p| p.id == publish.id) {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Publish a scope on behalf of `input.publisher`.
///
/// Ensures the scope hierarchy exists, merges the three Publish rules with a
/// MAY_GRANT chain between them, and gives `input.requested_by` a root
/// `0:mg:S` grant on behalf of the publisher (valid from `now`, never
/// expiring) unless they already hold one.
///
/// # Errors
///
/// - `InputValidation` for a malformed scope name.
/// - `NotFound` if the publisher or the requester does not resolve.
pub fn create_publish(tx: &mut dyn GraphTransaction, clock: &dyn Clock, input: &NewPublish) -> AapResult<PublishRule> {
    let scope = ScopeName::base(&input.scope)?;
    let publisher = require_identity(&*tx, &input.publisher)?;
    let requester = require_identity(&*tx, &input.requested_by)?;

    let [root_scope, mg_scope, base_scope] = ensure_hierarchy(tx, &scope)?;
    let root = merge_publish(tx, &publisher, &root_scope, input)?;
    let mg = merge_publish(tx, &publisher, &mg_scope, input)?;
    let base = merge_publish(tx, &publisher, &base_scope, input)?;
    tx.merge_edge(&root.id, Rel::MayGrant, &mg.id, Props::new())?;
    tx.merge_edge(&mg.id, Rel::MayGrant, &base.id, Props::new())?;

    if !holds_grant_on(&*tx, &requester, &root)? {
        let now = clock.now();
        let grant = tx.create_node(
            &[Label::Grant],
            props([
                (ID, RuleId::new().0),
                (NOT_BEFORE, now.to_string()),
                (EXPIRE, "0".to_string()),
            ]),
        )?;
        tx.create_edge(&requester.id, Rel::IsGranted, &grant.id, Props::new())?;
        tx.create_edge(&grant.id, Rel::Granted, &root.id, Props::new())?;
        tx.create_edge(&grant.id, Rel::OnBehalfOf, &publisher.id, Props::new())?;
        info!(
            requester = %input.requested_by,
            publisher = %input.publisher,
            scope = %scope.at(ScopeLevel::MayGrantMayGrant),
            "bootstrap delegation grant created"
        );
    }

    debug!(publisher = %input.publisher, scope = %scope, "scope published");
    Ok(PublishRule {
        id: RuleId(base.prop(ID).to_string()),
        publisher: input.publisher.clone(),
        scope: scope.full(),
        title: input.title.clone(),
        description: input.description.clone(),
    })
}

/// Read Publish rules matching the optional publisher and scope filters.
pub fn fetch_publishes(tx: &dyn GraphTransaction, filter: &PublishFilter) -> AapResult<Vec<PublishRule>> {
    let mut rules = Vec::new();
    for node in tx.find_nodes(Label::Publish, &Props::new())? {
        let Some(rule) = publish_view(tx, &node)? else {
            continue;
        };
        if !matches_publisher(filter.publisher.as_ref(), &rule.publisher) {
            continue;
        }
        if !filter.scopes.is_empty() && !filter.scopes.contains(&rule.scope) {
            continue;
        }
        rules.push(rule);
    }
    Ok(rules)
}

pub(crate) fn matches_publisher(filter: Option<&IdentityId>, publisher: &IdentityId) -> bool {
    filter.map_or(true, |p| p == publisher)
}
