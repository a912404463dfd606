//! Core types for the task forest engine.

use serde::{Deserialize, Serialize};

/// Stable task identifier (UUIDv7 string).
pub type NodeId = String;

/// Gap left between consecutive sibling ranks so that midpoint inserts
/// usually find a free integer without renumbering.
pub const ORDER_GAP: i64 = 1024;

/// A single task or subtask in the hierarchy.
///
/// The tree is stored flat: each node carries a `parent_id` key
/// reference (never a pointer), and children are derived on read by
/// querying for matching parents ordered by `(sort_order, id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskNode {
    pub id: NodeId,
    pub project_id: String,
    /// `None` means the node is a root of its project scope.
    pub parent_id: Option<NodeId>,
    /// Gap-allocated sibling rank. Not contiguous; ties broken by id.
    pub sort_order: i64,
    pub title: String,
    pub completed: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A task with its children, for nested tree responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskTree {
    #[serde(flatten)]
    pub node: TaskNode,
    pub children: Vec<TaskTree>,
}

/// What the drag ended over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "id")]
pub enum DropTarget {
    /// Dropped onto another node: position next to it among its siblings.
    Node(NodeId),
    /// Dropped into a container (empty space under a parent, or the
    /// scope root when `None`): append to that parent's children.
    Container(Option<NodeId>),
}

/// Classification of a planned move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveKind {
    Reorder,
    Reparent,
}

/// A concrete mutation ready for the applier. `new_order` is the
/// snapshot-computed rank; the applier recomputes it against live
/// state before committing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedMove {
    pub active_id: NodeId,
    pub new_parent_id: Option<NodeId>,
    /// Node to position next to, if the gesture named one.
    pub target_sibling_id: Option<NodeId>,
    pub new_order: i64,
    pub kind: MoveKind,
}

/// Planner output: either a concrete move or nothing to do.
#[derive(Debug, Clone, PartialEq)]
pub enum Plan {
    Move(PlannedMove),
    NoOp,
}

/// Wire request for the move operation.
///
/// `old_parent_id` and `same_parent_reorder` are client hints only: the
/// server re-derives both from live rows and logs disagreements.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveRequest {
    pub active_id: NodeId,
    #[serde(default)]
    pub new_parent_id: Option<NodeId>,
    #[serde(default)]
    pub old_parent_id: Option<NodeId>,
    #[serde(default)]
    pub target_sibling_id: Option<NodeId>,
    #[serde(default)]
    pub same_parent_reorder: bool,
}

impl MoveRequest {
    /// Build the wire request for a planned move.
    pub fn from_plan(planned: &PlannedMove, old_parent_id: Option<NodeId>) -> Self {
        Self {
            active_id: planned.active_id.clone(),
            new_parent_id: planned.new_parent_id.clone(),
            old_parent_id,
            target_sibling_id: planned.target_sibling_id.clone(),
            same_parent_reorder: planned.kind == MoveKind::Reorder,
        }
    }
}

/// Wire response for the move operation. On success `updated_nodes`
/// holds every node whose `parent_id` or `sort_order` may have changed
/// (old parent's remaining children plus new parent's children); a
/// no-op succeeds with an empty set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveResponse {
    pub success: bool,
    #[serde(default)]
    pub updated_nodes: Vec<TaskNode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<crate::error::ErrorBody>,
}

/// What happens to descendants when a node is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletePolicy {
    /// Delete the whole subtree.
    #[default]
    Cascade,
    /// Reparent children to the deleted node's parent, keeping their
    /// relative order.
    Promote,
}
