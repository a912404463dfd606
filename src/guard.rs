//! Cycle guard: rejects structurally invalid moves before storage.
//!
//! Runs against the pre-move tree. The mutation applier repeats the
//! same checks against live rows inside its transaction; this pure
//! version exists so the client can fail fast on its own snapshot.

use crate::error::{MoveError, MoveResult};
use crate::snapshot::TreeSnapshot;

/// Validate moving `active_id` under `proposed_parent` (`None` = scope
/// root). Rejects self-parenting, moves under the node's own
/// descendants (at any depth), and cross-project parents.
pub fn validate_move(
    snapshot: &TreeSnapshot,
    active_id: &str,
    proposed_parent: Option<&str>,
) -> MoveResult<()> {
    let active = snapshot
        .get(active_id)
        .ok_or_else(|| MoveError::NotFound(active_id.to_string()))?;

    let Some(pid) = proposed_parent else {
        return Ok(());
    };

    if pid == active_id {
        return Err(MoveError::self_parent(active_id));
    }

    let parent = snapshot
        .get(pid)
        .ok_or_else(|| MoveError::NotFound(pid.to_string()))?;

    if parent.project_id != active.project_id {
        return Err(MoveError::CrossScope {
            node: active.id.clone(),
            node_project: active.project_id.clone(),
            parent: parent.id.clone(),
            parent_project: parent.project_id.clone(),
        });
    }

    // A node may be dropped onto a deeply nested descendant, so the
    // whole subtree is searched, not just direct children.
    if snapshot.is_descendant(active_id, pid) {
        return Err(MoveError::cycle(active_id, pid));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::types::TaskNode;

    fn node(id: &str, project: &str, parent: Option<&str>) -> TaskNode {
        TaskNode {
            id: id.to_string(),
            project_id: project.to_string(),
            parent_id: parent.map(String::from),
            sort_order: 0,
            title: id.to_string(),
            completed: false,
            created_at: 0,
            updated_at: 0,
        }
    }

    fn chain() -> TreeSnapshot {
        TreeSnapshot::from_nodes([
            node("a", "p1", None),
            node("b", "p1", Some("a")),
            node("c", "p1", Some("b")),
            node("x", "p2", None),
        ])
    }

    #[test]
    fn accepts_valid_reparent() {
        let snap = chain();
        assert!(validate_move(&snap, "c", Some("a")).is_ok());
        assert!(validate_move(&snap, "c", None).is_ok());
    }

    #[test]
    fn rejects_self_parent() {
        let snap = chain();
        let err = validate_move(&snap, "a", Some("a")).unwrap_err();
        assert_eq!(err.code(), ErrorCode::CycleRejected);
    }

    #[test]
    fn rejects_move_under_transitive_descendant() {
        let snap = chain();
        let err = validate_move(&snap, "a", Some("c")).unwrap_err();
        assert_eq!(err.code(), ErrorCode::CycleRejected);
    }

    #[test]
    fn rejects_cross_project_parent() {
        let snap = chain();
        let err = validate_move(&snap, "c", Some("x")).unwrap_err();
        assert_eq!(err.code(), ErrorCode::CrossScope);
    }

    #[test]
    fn rejects_unknown_nodes() {
        let snap = chain();
        assert_eq!(
            validate_move(&snap, "ghost", Some("a")).unwrap_err().code(),
            ErrorCode::NodeNotFound
        );
        assert_eq!(
            validate_move(&snap, "a", Some("ghost")).unwrap_err().code(),
            ErrorCode::NodeNotFound
        );
    }
}
