//! Consent rules: an owner approving a subscriber's use of a published scope.
//!
//! A consent exists at most once per (owner, publish rule, subscriber)
//! triple. Re-consenting replaces the old rule with a fresh one.

use tracing::{debug, info};

use aap_contracts::{
    error::{AapError, AapResult},
    graph::{props, Direction, Label, Node, Props, Rel},
    identity::IdentityId,
    rules::{ConsentRule, RuleId},
};
use aap_core::traits::GraphTransaction;

use crate::{
    lookup::{follow, identities_matching, identity, publish_rule, publish_view, ID},
    requests::{ConsentFilter, ConsentKey},
};

/// Resolve a consent party, reporting an unresolved one as invalid input.
fn party(tx: &dyn GraphTransaction, role: &str, id: &IdentityId) -> AapResult<Node> {
    identity(tx, id)?.ok_or_else(|| AapError::invalid(format!("{role} '{id}' does not resolve to an identity")))
}

/// A consent node with the parties it links.
struct ConsentView {
    node: Node,
    rule: ConsentRule,
    publish: Node,
    subscriber: Node,
}

fn consents_of(tx: &dyn GraphTransaction, owner: &Node) -> AapResult<Vec<ConsentView>> {
    let mut found = Vec::new();
    for (_, consent) in tx.walk(&owner.id, Rel::IsConsenting, Direction::Outgoing)? {
        let Some(publish) = follow(tx, &consent, Rel::Consented, Direction::Outgoing)? else {
            continue;
        };
        let Some(subscriber) = follow(tx, &consent, Rel::ConsentedTo, Direction::Outgoing)? else {
            continue;
        };
        let Some(published) = publish_view(tx, &publish)? else {
            continue;
        };
        let rule = ConsentRule {
            id: RuleId(consent.prop(ID).to_string()),
            owner: IdentityId::new(owner.prop(ID)),
            subscriber: IdentityId::new(subscriber.prop(ID)),
            publisher: published.publisher,
            scope: published.scope,
        };
        found.push(ConsentView {
            node: consent,
            rule,
            publish,
            subscriber,
        });
    }
    Ok(found)
}

/// Record `key.owner`'s consent for the subscriber to use the publisher's
/// scope.
///
/// # Errors
///
/// - `InputValidation` if any party does not resolve, or the publisher
///   does not publish the scope.
/// - `NoSubscriptions` if the subscriber holds no subscription to the
///   (publisher, scope) rule.
pub fn create_consent(tx: &mut dyn GraphTransaction, key: &ConsentKey) -> AapResult<ConsentRule> {
    let owner = party(&*tx, "owner", &key.owner)?;
    let subscriber = party(&*tx, "subscriber", &key.subscriber)?;
    let publisher = party(&*tx, "publisher", &key.publisher)?;

    let publish = publish_rule(&*tx, &publisher, &key.scope)?.ok_or_else(|| {
        AapError::invalid(format!("scope '{}' is not published by '{}'", key.scope, key.publisher))
    })?;
    let subscribed = tx
        .walk(&subscriber.id, Rel::Subscribes, Direction::Outgoing)?
        .iter()
        .any(|(_, p)| p.id == publish.id);
    if !subscribed {
        return Err(AapError::NoSubscriptions {
            subscriber: key.subscriber.to_string(),
        });
    }

    for old in consents_of(&*tx, &owner)? {
        if old.publish.id == publish.id && old.subscriber.id == subscriber.id {
            debug!(consent_id = %old.rule.id.0, "replacing existing consent");
            tx.detach_delete(&old.node.id)?;
        }
    }

    let id = RuleId::new();
    let consent = tx.create_node(&[Label::Consent], props([(ID, id.0.as_str())]))?;
    tx.create_edge(&owner.id, Rel::IsConsenting, &consent.id, Props::new())?;
    tx.create_edge(&consent.id, Rel::Consented, &publish.id, Props::new())?;
    tx.create_edge(&consent.id, Rel::ConsentedTo, &subscriber.id, Props::new())?;

    info!(
        consent_id = %id.0,
        owner = %key.owner,
        subscriber = %key.subscriber,
        publisher = %key.publisher,
        scope = %key.scope,
        "consent created"
    );
    Ok(ConsentRule {
        id,
        owner: key.owner.clone(),
        subscriber: key.subscriber.clone(),
        publisher: key.publisher.clone(),
        scope: key.scope.clone(),
    })
}

/// Read consents matching the optional filters.
pub fn fetch_consents(tx: &dyn GraphTransaction, filter: &ConsentFilter) -> AapResult<Vec<ConsentRule>> {
    let mut consents = Vec::new();
    for owner in identities_matching(tx, filter.owner.as_ref())? {
        for view in consents_of(tx, &owner)? {
            let rule = view.rule;
            if filter.subscriber.as_ref().is_some_and(|s| s != &rule.subscriber) {
                continue;
            }
            if !filter.publishers.is_empty() && !filter.publishers.contains(&rule.publisher) {
                continue;
            }
            if !filter.scopes.is_empty() && !filter.scopes.contains(&rule.scope) {
                continue;
            }
            consents.push(rule);
        }
    }
    Ok(consents)
}

/// Detach-delete the consent for exactly this triple.
///
/// # Errors
///
/// `ConsentNotFound` if no such consent exists.
pub fn delete_consent(tx: &mut dyn GraphTransaction, key: &ConsentKey) -> AapResult<ConsentRule> {
    let not_found = || AapError::ConsentNotFound {
        owner: key.owner.to_string(),
        subscriber: key.subscriber.to_string(),
        scope: key.scope.clone(),
    };
    let owner = identity(&*tx, &key.owner)?.ok_or_else(not_found)?;
    let view = consents_of(&*tx, &owner)?
        .into_iter()
        .find(|v| v.rule.subscriber == key.subscriber && v.rule.publisher == key.publisher && v.rule.scope == key.scope)
        .ok_or_else(not_found)?;

    tx.detach_delete(&view.node.id)?;
    info!(
        consent_id = %view.rule.id.0,
        owner = %key.owner,
        subscriber = %key.subscriber,
        scope = %key.scope,
        "consent deleted"
    );
    Ok(view.rule)
}
