//! Scope hierarchy creation and reads.

use tracing::debug;

use aap_contracts::{
    error::AapResult,
    graph::{props, Label, Node, Props, Rel},
    rules::ScopeRecord,
    scope::ScopeName,
};
use aap_core::traits::GraphTransaction;

use crate::{
    lookup::NAME,
    requests::{NewScope, ScopeFilter},
};

/// Merge `0:mg:S`, `mg:S` and `S` plus the MAY_GRANT chain between them.
///
/// Returns the three nodes root first, matching `ScopeName::hierarchy`.
pub(crate) fn ensure_hierarchy(tx: &mut dyn GraphTransaction, scope: &ScopeName) -> AapResult<[Node; 3]> {
    let [root, mg, base] = scope.hierarchy();
    let root = tx.merge_node(Label::Scope, props([(NAME, root.full())]), Props::new())?;
    let mg = tx.merge_node(Label::Scope, props([(NAME, mg.full())]), Props::new())?;
    let base = tx.merge_node(Label::Scope, props([(NAME, base.full())]), Props::new())?;
    tx.merge_edge(&root.id, Rel::MayGrant, &mg.id, Props::new())?;
    tx.merge_edge(&mg.id, Rel::MayGrant, &base.id, Props::new())?;
    Ok([root, mg, base])
}

/// Create a scope and its derived may-grant scopes. Idempotent.
pub fn create_scope(tx: &mut dyn GraphTransaction, input: &NewScope) -> AapResult<Vec<ScopeRecord>> {
    let scope = ScopeName::base(&input.name)?;
    ensure_hierarchy(tx, &scope)?;
    debug!(scope = %scope, requested_by = %input.requested_by, "scope hierarchy merged");
    Ok(scope
        .hierarchy()
        .iter()
        .map(|s| ScopeRecord {
            name: s.full(),
            level: s.level(),
        })
        .collect())
}

/// Read scopes. A name filter matches every level of that scope's hierarchy.
pub fn fetch_scopes(tx: &dyn GraphTransaction, filter: &ScopeFilter) -> AapResult<Vec<ScopeRecord>> {
    let wanted = filter.name.as_deref().map(ScopeName::parse).transpose()?;
    let mut records = Vec::new();
    for node in tx.find_nodes(Label::Scope, &Props::new())? {
        let name = node.prop(NAME);
        let Ok(parsed) = ScopeName::parse(name) else {
            continue;
        };
        if wanted.as_ref().is_some_and(|w| w.base_name() != parsed.base_name()) {
            continue;
        }
        records.push(ScopeRecord {
            name: name.to_string(),
            level: parsed.level(),
        });
    }
    records.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(records)
}

