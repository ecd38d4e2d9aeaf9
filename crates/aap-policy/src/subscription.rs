//! Subscriptions: a client's standing request to use a published scope.

use tracing::info;

use aap_contracts::{
    error::{AapError, AapResult},
    graph::{props, Direction, Edge, Node, Rel},
    identity::IdentityId,
    rules::Subscription,
    scope::ScopeName,
};
use aap_core::traits::GraphTransaction;

use crate::{
    lookup::{identities_matching, publish_rule, publish_view, require_identity, ID, REQUESTED_BY},
    publish::matches_publisher,
    requests::{NewSubscription, SubscriptionFilter, SubscriptionKey},
};

/// Subscribe a client to a Publish rule. Idempotent per (subscriber, rule).
///
/// # Errors
///
/// `NotFound` if the subscriber, the publisher, or the Publish rule for
/// (publisher, scope) does not resolve.
pub fn create_subscription(tx: &mut dyn GraphTransaction, input: &NewSubscription) -> AapResult<Subscription> {
    let scope = ScopeName::parse(&input.scope)?;
    let subscriber = require_identity(&*tx, &input.subscriber)?;
    let publisher = require_identity(&*tx, &input.publisher)?;
    let publish = publish_rule(&*tx, &publisher, &scope.full())?
        .ok_or_else(|| AapError::not_found("publish rule", format!("{}/{}", input.publisher, scope)))?;

    tx.merge_edge(
        &subscriber.id,
        Rel::Subscribes,
        &publish.id,
        props([(REQUESTED_BY, input.requested_by.as_str())]),
    )?;
    info!(
        subscriber = %input.subscriber,
        publisher = %input.publisher,
        scope = %scope,
        requested_by = %input.requested_by,
        "subscription merged"
    );
    Ok(Subscription {
        subscriber: input.subscriber.clone(),
        publisher: input.publisher.clone(),
        scope: scope.full(),
        requested_by: input.requested_by.clone(),
    })
}

/// The subscriptions held by one subscriber node, as (edge, subscription).
fn subscriptions_of(tx: &dyn GraphTransaction, subscriber: &Node) -> AapResult<Vec<(Edge, Subscription)>> {
    let mut found = Vec::new();
    for (edge, publish) in tx.walk(&subscriber.id, Rel::Subscribes, Direction::Outgoing)? {
        let Some(rule) = publish_view(tx, &publish)? else {
            continue;
        };
        let subscription = Subscription {
            subscriber: IdentityId::new(subscriber.prop(ID)),
            publisher: rule.publisher,
            scope: rule.scope,
            requested_by: IdentityId::new(edge.prop(REQUESTED_BY)),
        };
        found.push((edge, subscription));
    }
    Ok(found)
}

/// Read subscriptions matching the optional filters.
pub fn fetch_subscriptions(tx: &dyn GraphTransaction, filter: &SubscriptionFilter) -> AapResult<Vec<Subscription>> {
    let mut subscriptions = Vec::new();
    for subscriber in identities_matching(tx, filter.subscriber.as_ref())? {
        for (_, subscription) in subscriptions_of(tx, &subscriber)? {
            if !matches_publisher(filter.publisher.as_ref(), &subscription.publisher) {
                continue;
            }
            if !filter.scopes.is_empty() && !filter.scopes.contains(&subscription.scope) {
                continue;
            }
            subscriptions.push(subscription);
        }
    }
    Ok(subscriptions)
}

/// Remove one subscription edge, returning what was removed.
pub fn delete_subscription(tx: &mut dyn GraphTransaction, key: &SubscriptionKey) -> AapResult<Subscription> {
    let not_found = || {
        AapError::not_found(
            "subscription",
            format!("{} -> {}/{}", key.subscriber, key.publisher, key.scope),
        )
    };
    let subscriber = require_identity(&*tx, &key.subscriber)?;
    let (edge, removed) = subscriptions_of(&*tx, &subscriber)?
        .into_iter()
        .find(|(_, s)| s.publisher == key.publisher && s.scope == key.scope)
        .ok_or_else(not_found)?;

    tx.delete_edge(&edge)?;
    info!(
        subscriber = %key.subscriber,
        publisher = %key.publisher,
        scope = %key.scope,
        "subscription deleted"
    );
    Ok(removed)
}

/// Every scope `subscriber` is subscribed to, across all publishers, sorted
/// and deduplicated. This is the set pushed to the consent authority.
pub fn subscribed_scopes(tx: &dyn GraphTransaction, subscriber: &IdentityId) -> AapResult<Vec<String>> {
    let filter = SubscriptionFilter {
        subscriber: Some(subscriber.clone()),
        ..SubscriptionFilter::default()
    };
    let mut scopes: Vec<String> = fetch_subscriptions(tx, &filter)?
        .into_iter()
        .map(|s| s.scope)
        .collect();
    scopes.sort();
    scopes.dedup();
    Ok(scopes)
}
