//! Mutation applier: commits validated moves atomically.
//!
//! Every move runs in a single IMMEDIATE transaction. Validation is
//! re-run against the live rows inside that transaction, so a stale
//! client snapshot can never smuggle in a cycle or cross-scope edge.

use super::nodes::{
    children_internal, get_node_internal, is_descendant_internal, max_order_internal,
    renumber_group_internal,
};
use super::{now_ms, Database};
use crate::error::{MoveError, MoveResult};
use crate::types::{MoveRequest, TaskNode, ORDER_GAP};
use rusqlite::{params, Connection, TransactionBehavior};
use tracing::{debug, info, warn};

impl Database {
    /// Validate and commit a move in one atomic step.
    ///
    /// On success returns the refreshed children of the old parent plus
    /// the new parent (the nodes whose `parent_id`/`sort_order` may
    /// have changed). A no-op returns an empty vec and writes nothing.
    pub fn apply_move(&self, req: &MoveRequest) -> MoveResult<Vec<TaskNode>> {
        let result = self.with_conn_mut(|conn| {
            let tx = match conn.transaction_with_behavior(TransactionBehavior::Immediate) {
                Ok(tx) => tx,
                Err(e) => return Ok(Err(MoveError::from(e))),
            };

            let out = apply_move_tx(&tx, req);

            match &out {
                Ok(_) => {
                    if let Err(e) = tx.commit() {
                        return Ok(Err(MoveError::from(e)));
                    }
                }
                Err(_) => {
                    // No partial state escapes a rejected move.
                    let _ = tx.rollback();
                }
            }

            Ok(out)
        });

        match result {
            Ok(out) => out,
            Err(e) => Err(MoveError::Database(e)),
        }
    }
}

fn apply_move_tx(tx: &Connection, req: &MoveRequest) -> MoveResult<Vec<TaskNode>> {
    let active = get_node_internal(tx, &req.active_id)?
        .ok_or_else(|| MoveError::NotFound(req.active_id.clone()))?;

    // Re-validate against live rows; the client ran the same checks on
    // its snapshot, but that snapshot may be stale.
    if let Some(pid) = &req.new_parent_id {
        if *pid == active.id {
            return Err(MoveError::self_parent(&active.id));
        }
        let parent =
            get_node_internal(tx, pid)?.ok_or_else(|| MoveError::NotFound(pid.clone()))?;
        if parent.project_id != active.project_id {
            return Err(MoveError::CrossScope {
                node: active.id.clone(),
                node_project: active.project_id.clone(),
                parent: parent.id.clone(),
                parent_project: parent.project_id.clone(),
            });
        }
        if is_descendant_internal(tx, &active.id, pid)? {
            return Err(MoveError::cycle(&active.id, pid));
        }
    }

    // The request's old parent is a hint only; trust the row.
    if req.old_parent_id != active.parent_id {
        warn!(
            node = %active.id,
            claimed = ?req.old_parent_id,
            actual = ?active.parent_id,
            "stale old_parent_id hint in move request"
        );
    }

    let same_parent = active.parent_id == req.new_parent_id;
    if req.same_parent_reorder != same_parent {
        debug!(node = %active.id, "re-derived move kind disagrees with client hint");
    }

    let project = active.project_id.as_str();
    let new_parent = req.new_parent_id.as_deref();

    // Resolve the target sibling, if any, and confirm it still lives
    // under the requested parent.
    let sibling = match &req.target_sibling_id {
        Some(sid) if *sid == active.id => {
            // Dropped onto itself: re-derived here, not trusted to the
            // client planner.
            debug!(node = %active.id, "move targets itself, dropping");
            return Ok(Vec::new());
        }
        Some(sid) => {
            let sib =
                get_node_internal(tx, sid)?.ok_or_else(|| MoveError::NotFound(sid.clone()))?;
            if sib.parent_id.as_deref() != new_parent {
                return Err(MoveError::ConcurrencyConflict(format!(
                    "target sibling {} moved out of the destination group",
                    sid
                )));
            }
            Some(sib)
        }
        None => None,
    };

    // No-op detection against current positions.
    if same_parent {
        let group = children_internal(tx, project, new_parent)?;
        let already_placed = match &sibling {
            Some(sib) => {
                // Placing directly after a sibling it already follows.
                group
                    .windows(2)
                    .any(|w| w[0].id == sib.id && w[1].id == active.id)
            }
            None => group.last().is_some_and(|last| last.id == active.id),
        };
        if already_placed {
            debug!(node = %active.id, "move is a no-op");
            return Ok(Vec::new());
        }
    }

    let new_order = compute_order(tx, project, new_parent, &active.id, sibling.as_ref())?;

    let now = now_ms();
    tx.execute(
        "UPDATE tasks SET parent_id = ?1, sort_order = ?2, updated_at = ?3 WHERE id = ?4",
        params![new_parent, new_order, now, &active.id],
    )?;

    info!(
        node = %active.id,
        old_parent = ?active.parent_id,
        new_parent = ?req.new_parent_id,
        order = new_order,
        reparent = !same_parent,
        "applied move"
    );

    // Refreshed view of both affected groups.
    let mut updated = children_internal(tx, project, active.parent_id.as_deref())?;
    if !same_parent {
        updated.extend(children_internal(tx, project, new_parent)?);
    }
    Ok(updated)
}

/// Rank for inserting `active` into the target group: directly after
/// `sibling`, or appended when no sibling was named. Renumbers the
/// group (gap-spaced) when no free integer remains between neighbors.
fn compute_order(
    tx: &Connection,
    project: &str,
    parent: Option<&str>,
    active_id: &str,
    sibling: Option<&TaskNode>,
) -> MoveResult<i64> {
    let Some(sibling) = sibling else {
        let max = max_order_internal(tx, project, parent)?;
        return Ok(max.map_or(ORDER_GAP, |m| m.saturating_add(ORDER_GAP)));
    };

    let order_after = |group: &[TaskNode]| -> Option<i64> {
        let idx = group.iter().position(|n| n.id == sibling.id)?;
        let prev = group[idx].sort_order;
        match group.get(idx + 1) {
            Some(next) if next.sort_order - prev >= 2 => Some(prev + (next.sort_order - prev) / 2),
            Some(_) => None, // midpoint exhausted
            None => Some(prev.saturating_add(ORDER_GAP)),
        }
    };

    let group: Vec<TaskNode> = children_internal(tx, project, parent)?
        .into_iter()
        .filter(|n| n.id != active_id)
        .collect();

    if let Some(order) = order_after(&group) {
        return Ok(order);
    }

    // Adjacent ranks left no room; renumber the group and retry.
    debug!(?parent, "sibling ranks exhausted, renumbering group");
    renumber_group_internal(tx, project, parent)?;
    let group: Vec<TaskNode> = children_internal(tx, project, parent)?
        .into_iter()
        .filter(|n| n.id != active_id)
        .collect();
    order_after(&group).ok_or_else(|| {
        MoveError::ConcurrencyConflict(format!(
            "target sibling {} disappeared during renumbering",
            sibling.id
        ))
    })
}
