//! Client-side optimistic state machine for drag gestures.
//!
//! `Idle → Dragging → Committing → (Idle | RollingBack)`. The
//! reconciler owns a transient copy of the tree for display only; the
//! database is the sole authority for `parent_id`/`sort_order`. One
//! mutation is in flight at a time. On any rejection, transport
//! failure, or timeout the visible tree is restored to the pre-drag
//! snapshot and a message is surfaced through the notifier.

use crate::config::ClientConfig;
use crate::error::{MoveError, MoveResult};
use crate::guard::validate_move;
use crate::planner::plan_move;
use crate::snapshot::TreeSnapshot;
use crate::types::{DropTarget, MoveRequest, NodeId, Plan, TaskNode};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info, warn};

/// The request/response boundary the reconciler commits through.
#[async_trait]
pub trait MoveApi: Send + Sync {
    async fn move_node(&self, req: MoveRequest) -> MoveResult<Vec<TaskNode>>;
}

/// Sink for user-visible failure messages (toast-equivalent).
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragPhase {
    Idle,
    Dragging,
    Committing,
    RollingBack,
}

struct DragState {
    active_id: NodeId,
    /// Pre-drag tree, restored verbatim on cancel or failure.
    snapshot: TreeSnapshot,
}

pub struct Reconciler<A, N> {
    api: A,
    notifier: N,
    visible: TreeSnapshot,
    phase: DragPhase,
    drag: Option<DragState>,
    commit_timeout: Duration,
    max_retries: u32,
}

impl<A: MoveApi, N: Notifier> Reconciler<A, N> {
    pub fn new(api: A, notifier: N, initial: TreeSnapshot, config: &ClientConfig) -> Self {
        Self {
            api,
            notifier,
            visible: initial,
            phase: DragPhase::Idle,
            drag: None,
            commit_timeout: Duration::from_millis(config.commit_timeout_ms),
            max_retries: config.max_retries,
        }
    }

    /// The tree the UI renders right now.
    pub fn visible(&self) -> &TreeSnapshot {
        &self.visible
    }

    pub fn phase(&self) -> DragPhase {
        self.phase
    }

    /// Replace the visible tree outside of a drag (e.g. initial load).
    pub fn load(&mut self, tree: TreeSnapshot) {
        if self.phase == DragPhase::Idle {
            self.visible = tree;
        }
    }

    /// Begin a drag: snapshot the visible tree and remember the node.
    /// Returns false if a drag is already in flight or the node is
    /// unknown.
    pub fn drag_start(&mut self, active_id: &str) -> bool {
        if self.phase != DragPhase::Idle || self.visible.get(active_id).is_none() {
            return false;
        }
        self.drag = Some(DragState {
            active_id: active_id.to_string(),
            snapshot: self.visible.clone(),
        });
        self.phase = DragPhase::Dragging;
        debug!(node = active_id, "drag started");
        true
    }

    /// Update the transient preview while hovering. Pre-commit visual
    /// feedback only: no structural validation happens here.
    pub fn drag_over(&mut self, target: &DropTarget) {
        if self.phase != DragPhase::Dragging {
            return;
        }
        let Some(drag) = &self.drag else { return };

        match plan_move(&drag.snapshot, &drag.active_id, target) {
            Ok(Plan::Move(planned)) => {
                let mut preview = drag.snapshot.clone();
                preview.apply_planned(&planned);
                self.visible = preview;
            }
            Ok(Plan::NoOp) | Err(_) => {
                self.visible = drag.snapshot.clone();
            }
        }
    }

    /// Abandon the drag without calling the API.
    pub fn drag_cancel(&mut self) {
        if let Some(drag) = self.drag.take() {
            self.visible = drag.snapshot;
            debug!(node = %drag.active_id, "drag cancelled");
        }
        self.phase = DragPhase::Idle;
    }

    /// Finish the drag: plan, validate, and commit through the API.
    /// Returns `Ok(true)` if a move was committed, `Ok(false)` for a
    /// no-op gesture.
    pub async fn drag_end(&mut self, target: &DropTarget) -> MoveResult<bool> {
        if self.phase != DragPhase::Dragging {
            return Ok(false);
        }
        let Some(drag) = self.drag.take() else {
            self.phase = DragPhase::Idle;
            return Ok(false);
        };

        let planned = match plan_move(&drag.snapshot, &drag.active_id, target) {
            Ok(Plan::Move(planned)) => planned,
            Ok(Plan::NoOp) => {
                // Equivalent to an abandoned drag: no API call.
                self.visible = drag.snapshot;
                self.phase = DragPhase::Idle;
                return Ok(false);
            }
            Err(e) => return Err(self.roll_back(drag.snapshot, e)),
        };

        // Fail fast on the snapshot before going to the server; the
        // applier re-validates against live state regardless.
        if let Err(e) = validate_move(
            &drag.snapshot,
            &planned.active_id,
            planned.new_parent_id.as_deref(),
        ) {
            return Err(self.roll_back(drag.snapshot, e));
        }

        let old_parent = drag
            .snapshot
            .get(&drag.active_id)
            .and_then(|n| n.parent_id.clone());
        let request = MoveRequest::from_plan(&planned, old_parent);

        // Optimistic view while the commit is in flight.
        let mut optimistic = drag.snapshot.clone();
        optimistic.apply_planned(&planned);
        self.visible = optimistic;
        self.phase = DragPhase::Committing;

        // Retries always resend the original gesture outcome, never a
        // tree re-derived from the optimistic view.
        let mut attempt = 0u32;
        loop {
            let outcome = tokio::time::timeout(
                self.commit_timeout,
                self.api.move_node(request.clone()),
            )
            .await
            .unwrap_or_else(|_| {
                Err(MoveError::TransportFailure(format!(
                    "no response within {:?}",
                    self.commit_timeout
                )))
            });

            match outcome {
                Ok(updated) => {
                    // Adopt the canonical subtree from the server.
                    let mut adopted = drag.snapshot;
                    adopted.upsert_all(updated);
                    self.visible = adopted;
                    self.phase = DragPhase::Idle;
                    info!(node = %request.active_id, "move committed");
                    return Ok(true);
                }
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    warn!(node = %request.active_id, attempt, error = %e, "retrying move");
                }
                Err(e) => return Err(self.roll_back(drag.snapshot, e)),
            }
        }
    }

    fn roll_back(&mut self, snapshot: TreeSnapshot, err: MoveError) -> MoveError {
        self.phase = DragPhase::RollingBack;
        self.visible = snapshot;
        self.notifier.notify(&format!("Move failed: {}", err));
        warn!(error = %err, "rolled back to pre-drag snapshot");
        self.phase = DragPhase::Idle;
        self.drag = None;
        err
    }
}
