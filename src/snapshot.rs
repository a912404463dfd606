//! Flat, disposable view of one project's tree.
//!
//! The snapshot is the read model shared by the cycle guard, the move
//! planner, and the client reconciler's optimistic copy. It is a plain
//! id-to-node map; children are derived on demand, never stored, so
//! there are no ownership cycles to manage.

use crate::types::{NodeId, PlannedMove, TaskNode};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Default)]
pub struct TreeSnapshot {
    nodes: HashMap<NodeId, TaskNode>,
}

impl TreeSnapshot {
    pub fn from_nodes(nodes: impl IntoIterator<Item = TaskNode>) -> Self {
        Self {
            nodes: nodes.into_iter().map(|n| (n.id.clone(), n)).collect(),
        }
    }

    pub fn get(&self, id: &str) -> Option<&TaskNode> {
        self.nodes.get(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Ordered children of a parent group (`None` = scope roots),
    /// sorted by `(sort_order, id)`.
    pub fn children(&self, parent: Option<&str>) -> Vec<&TaskNode> {
        let mut children: Vec<&TaskNode> = self
            .nodes
            .values()
            .filter(|n| n.parent_id.as_deref() == parent)
            .collect();
        children.sort_by(|a, b| {
            a.sort_order
                .cmp(&b.sort_order)
                .then_with(|| a.id.cmp(&b.id))
        });
        children
    }

    /// True if `candidate` occurs anywhere in the subtree rooted at
    /// `root`. Iterative, with a visited guard against malformed
    /// cyclic input.
    pub fn is_descendant(&self, root: &str, candidate: &str) -> bool {
        let mut visited: HashSet<&str> = HashSet::new();
        let mut stack: Vec<&str> = vec![root];

        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            for node in self.nodes.values() {
                if node.parent_id.as_deref() == Some(current) {
                    if node.id == candidate {
                        return true;
                    }
                    if !visited.contains(node.id.as_str()) {
                        stack.push(&node.id);
                    }
                }
            }
        }

        false
    }

    /// Apply a planned move to this snapshot (optimistic preview).
    pub fn apply_planned(&mut self, planned: &PlannedMove) {
        if let Some(node) = self.nodes.get_mut(&planned.active_id) {
            node.parent_id = planned.new_parent_id.clone();
            node.sort_order = planned.new_order;
        }
    }

    /// Merge server-returned nodes into the snapshot.
    pub fn upsert_all(&mut self, nodes: impl IntoIterator<Item = TaskNode>) {
        for node in nodes {
            self.nodes.insert(node.id.clone(), node);
        }
    }
}
