//! Which nodes and connections are on screen once collapsed branches are hidden.
//!
//! Everything here is a pure function of the current map; callers recompute
//! after every change instead of caching.

use std::collections::HashSet;

use crate::mindmap::{Connection, MindMap, Node, NodeId};

/// Ids hidden by some collapsed ancestor. A collapsed node hides its
/// descendants, never itself.
pub fn hidden_ids(map: &MindMap) -> HashSet<NodeId> {
    let mut hidden = HashSet::new();
    for node in map.nodes.iter().filter(|node| node.is_collapsed) {
        let mut stack: Vec<NodeId> = node.children.clone();
        while let Some(id) = stack.pop() {
            if id == node.id || !hidden.insert(id) {
                continue;
            }
            if let Some(child) = map.find_node(id) {
                stack.extend(child.children.iter().copied());
            }
        }
    }
    hidden
}

/// Visible nodes in their original order.
pub fn visible_nodes(map: &MindMap) -> Vec<&Node> {
    let hidden = hidden_ids(map);
    map.nodes
        .iter()
        .filter(|node| !hidden.contains(&node.id))
        .collect()
}

/// Connections whose endpoints are both visible.
pub fn visible_connections(map: &MindMap) -> Vec<&Connection> {
    let hidden = hidden_ids(map);
    map.connections
        .iter()
        .filter(|conn| {
            !hidden.contains(&conn.source)
                && !hidden.contains(&conn.target)
                && map.contains(conn.source)
                && map.contains(conn.target)
        })
        .collect()
}
