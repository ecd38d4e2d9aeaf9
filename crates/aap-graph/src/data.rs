//! The graph value a transaction works on.
//!
//! Handles are assigned from monotonically increasing counters, so iteration
//! order over `nodes` and `edges` is creation order.

use std::collections::BTreeMap;

use aap_contracts::{
    error::{AapError, AapResult},
    graph::{Direction, Edge, EdgeId, Label, Node, NodeId, Props, Rel},
};

#[derive(Debug, Clone, Default)]
pub(crate) struct GraphData {
    pub(crate) nodes: BTreeMap<NodeId, Node>,
    pub(crate) edges: BTreeMap<EdgeId, Edge>,
    next_node: u64,
    next_edge: u64,
}

impl GraphData {
    pub(crate) fn find(&self, label: Label, filter: &Props) -> Vec<Node> {
        self.nodes
            .values()
            .filter(|n| n.has_label(label) && n.matches(filter))
            .cloned()
            .collect()
    }

    pub(crate) fn walk(&self, node: &NodeId, rel: Rel, direction: Direction) -> Vec<(Edge, Node)> {
        self.edges
            .values()
            .filter(|e| e.rel == rel)
            .filter_map(|e| {
                let far = match direction {
                    Direction::Outgoing if &e.from == node => &e.to,
                    Direction::Incoming if &e.to == node => &e.from,
                    _ => return None,
                };
                self.nodes.get(far).map(|n| (e.clone(), n.clone()))
            })
            .collect()
    }

    pub(crate) fn edge_between(&self, from: &NodeId, rel: Rel, to: &NodeId) -> Option<Edge> {
        self.edges
            .values()
            .find(|e| e.rel == rel && &e.from == from && &e.to == to)
            .cloned()
    }

    pub(crate) fn insert_node(&mut self, labels: &[Label], props: Props) -> Node {
        self.next_node += 1;
        let node = Node {
            id: NodeId(format!("n{:010}", self.next_node)),
            labels: labels.iter().copied().collect(),
            props,
        };
        self.nodes.insert(node.id.clone(), node.clone());
        node
    }

    pub(crate) fn set_node_props(&mut self, id: &NodeId, set: Props) -> AapResult<Node> {
        let node = self
            .nodes
            .get_mut(id)
            .ok_or_else(|| AapError::graph(format!("node {} does not exist", id.0)))?;
        node.props.extend(set);
        Ok(node.clone())
    }

    pub(crate) fn insert_edge(&mut self, from: &NodeId, rel: Rel, to: &NodeId, props: Props) -> AapResult<Edge> {
        for end in [from, to] {
            if !self.nodes.contains_key(end) {
                return Err(AapError::graph(format!(
                    "cannot create {rel} relationship: node {} does not exist",
                    end.0
                )));
            }
        }
        self.next_edge += 1;
        let edge = Edge {
            id: EdgeId(format!("e{:010}", self.next_edge)),
            rel,
            from: from.clone(),
            to: to.clone(),
            props,
        };
        self.edges.insert(edge.id.clone(), edge.clone());
        Ok(edge)
    }

    pub(crate) fn set_edge_props(&mut self, id: &EdgeId, set: Props) -> AapResult<Edge> {
        let edge = self
            .edges
            .get_mut(id)
            .ok_or_else(|| AapError::graph(format!("relationship {} does not exist", id.0)))?;
        edge.props.extend(set);
        Ok(edge.clone())
    }

    pub(crate) fn remove_edge(&mut self, id: &EdgeId) {
        self.edges.remove(id);
    }

    pub(crate) fn detach_delete(&mut self, node: &NodeId) {
        self.edges.retain(|_, e| &e.from != node && &e.to != node);
        self.nodes.remove(node);
    }
}
