//! Move planner: turns a drag gesture outcome into a concrete mutation.
//!
//! The planner classifies a (active, drop target) pair as a same-parent
//! reorder or a reparent, computes the rank that places the node where
//! the gesture asked, and collapses non-moves to `Plan::NoOp`. Its
//! output is always run through the cycle guard before it reaches the
//! applier; the planner itself does no structural validation.

use crate::error::{MoveError, MoveResult};
use crate::snapshot::TreeSnapshot;
use crate::types::{DropTarget, MoveKind, Plan, PlannedMove, TaskNode, ORDER_GAP};

/// Plan a move of `active_id` to `target` against a tree snapshot.
pub fn plan_move(
    snapshot: &TreeSnapshot,
    active_id: &str,
    target: &DropTarget,
) -> MoveResult<Plan> {
    let active = snapshot
        .get(active_id)
        .ok_or_else(|| MoveError::NotFound(active_id.to_string()))?;

    let (new_parent, sibling) = match target {
        DropTarget::Node(over_id) => {
            if over_id == active_id {
                return Ok(Plan::NoOp);
            }
            let over = snapshot
                .get(over_id)
                .ok_or_else(|| MoveError::NotFound(over_id.clone()))?;
            (over.parent_id.clone(), Some(over))
        }
        // The container itself is the new parent; position is "append".
        DropTarget::Container(parent) => (parent.clone(), None),
    };

    let kind = if new_parent == active.parent_id {
        MoveKind::Reorder
    } else {
        MoveKind::Reparent
    };

    // Drop candidate moves that change nothing.
    if kind == MoveKind::Reorder {
        let group = snapshot.children(new_parent.as_deref());
        let already_placed = match sibling {
            Some(sib) => group
                .windows(2)
                .any(|w| w[0].id == sib.id && w[1].id == active.id),
            None => group.last().is_some_and(|last| last.id == active.id),
        };
        if already_placed {
            return Ok(Plan::NoOp);
        }
    }

    let new_order = preview_order(snapshot, new_parent.as_deref(), active_id, sibling);

    Ok(Plan::Move(PlannedMove {
        active_id: active.id.clone(),
        new_parent_id: new_parent,
        target_sibling_id: sibling.map(|s| s.id.clone()),
        new_order,
        kind,
    }))
}

/// Rank placing `active` directly after `sibling` (or appended when no
/// sibling was named), computed on the snapshot. When the midpoint is
/// exhausted this falls back to the sibling's own rank; that is
/// preview-fidelity only, since the applier renumbers the live group.
fn preview_order(
    snapshot: &TreeSnapshot,
    parent: Option<&str>,
    active_id: &str,
    sibling: Option<&TaskNode>,
) -> i64 {
    let group: Vec<&TaskNode> = snapshot
        .children(parent)
        .into_iter()
        .filter(|n| n.id != active_id)
        .collect();

    let Some(sibling) = sibling else {
        return group
            .last()
            .map_or(ORDER_GAP, |last| last.sort_order.saturating_add(ORDER_GAP));
    };

    let Some(idx) = group.iter().position(|n| n.id == sibling.id) else {
        return sibling.sort_order;
    };
    let prev = group[idx].sort_order;
    match group.get(idx + 1) {
        Some(next) if next.sort_order - prev >= 2 => prev + (next.sort_order - prev) / 2,
        Some(_) => prev,
        None => prev.saturating_add(ORDER_GAP),
    }
}
