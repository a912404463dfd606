//! Tests for the client reconciler state machine.
//!
//! The API boundary is mocked with scripted responses so the tests can
//! exercise commit, rollback, and retry paths deterministically.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use task_forest::config::ClientConfig;
use task_forest::error::{ErrorCode, MoveError, MoveResult};
use task_forest::reconciler::{DragPhase, MoveApi, Notifier, Reconciler};
use task_forest::snapshot::TreeSnapshot;
use task_forest::types::{DropTarget, MoveRequest, TaskNode};

fn node(id: &str, parent: Option<&str>, order: i64) -> TaskNode {
    TaskNode {
        id: id.to_string(),
        project_id: "p1".to_string(),
        parent_id: parent.map(String::from),
        sort_order: order,
        title: id.to_string(),
        completed: false,
        created_at: 0,
        updated_at: 0,
    }
}

/// Root -> [a, b, c]; b -> [d].
fn sample_tree() -> TreeSnapshot {
    TreeSnapshot::from_nodes([
        node("a", None, 1024),
        node("b", None, 2048),
        node("c", None, 3072),
        node("d", Some("b"), 1024),
    ])
}

/// Scripted server response.
enum Scripted {
    Ok(Vec<TaskNode>),
    Conflict,
    Transport,
    Cycle,
}

#[derive(Clone, Default)]
struct MockApi {
    responses: Arc<Mutex<VecDeque<Scripted>>>,
    calls: Arc<Mutex<Vec<MoveRequest>>>,
}

impl MockApi {
    fn scripted(responses: Vec<Scripted>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses.into())),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl MoveApi for MockApi {
    async fn move_node(&self, req: MoveRequest) -> MoveResult<Vec<TaskNode>> {
        self.calls.lock().unwrap().push(req.clone());
        match self.responses.lock().unwrap().pop_front() {
            Some(Scripted::Ok(nodes)) => Ok(nodes),
            Some(Scripted::Conflict) => {
                Err(MoveError::ConcurrencyConflict("scope busy".to_string()))
            }
            Some(Scripted::Transport) => {
                Err(MoveError::TransportFailure("connection reset".to_string()))
            }
            Some(Scripted::Cycle) => Err(MoveError::cycle(&req.active_id, "x")),
            None => Err(MoveError::TransportFailure("no scripted response".to_string())),
        }
    }
}

#[derive(Clone, Default)]
struct MockNotifier {
    messages: Arc<Mutex<Vec<String>>>,
}

impl Notifier for MockNotifier {
    fn notify(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}

fn config() -> ClientConfig {
    ClientConfig {
        commit_timeout_ms: 1000,
        max_retries: 2,
    }
}

fn visible_root_ids<A: MoveApi, N: Notifier>(rec: &Reconciler<A, N>) -> Vec<String> {
    rec.visible()
        .children(None)
        .iter()
        .map(|n| n.id.clone())
        .collect()
}

#[tokio::test]
async fn successful_commit_adopts_server_nodes() {
    // Server answers with a canonical reorder: [b, a, c].
    let api = MockApi::scripted(vec![Scripted::Ok(vec![
        node("b", None, 2048),
        node("a", None, 2560),
        node("c", None, 3072),
    ])]);
    let notifier = MockNotifier::default();
    let mut rec = Reconciler::new(api.clone(), notifier, sample_tree(), &config());

    assert!(rec.drag_start("a"));
    let committed = rec.drag_end(&DropTarget::Node("b".to_string())).await.unwrap();

    assert!(committed);
    assert_eq!(rec.phase(), DragPhase::Idle);
    assert_eq!(api.call_count(), 1);
    assert_eq!(visible_root_ids(&rec), vec!["b", "a", "c"]);

    let req = api.calls.lock().unwrap()[0].clone();
    assert_eq!(req.active_id, "a");
    assert_eq!(req.target_sibling_id, Some("b".to_string()));
    assert!(req.same_parent_reorder);
}

#[tokio::test]
async fn drop_onto_itself_never_calls_the_api() {
    let api = MockApi::default();
    let mut rec = Reconciler::new(api.clone(), MockNotifier::default(), sample_tree(), &config());

    assert!(rec.drag_start("a"));
    let committed = rec.drag_end(&DropTarget::Node("a".to_string())).await.unwrap();

    assert!(!committed);
    assert_eq!(api.call_count(), 0);
    assert_eq!(rec.phase(), DragPhase::Idle);
    assert_eq!(visible_root_ids(&rec), vec!["a", "b", "c"]);
}

#[tokio::test]
async fn cancel_restores_the_pre_drag_snapshot() {
    let api = MockApi::default();
    let mut rec = Reconciler::new(api.clone(), MockNotifier::default(), sample_tree(), &config());

    assert!(rec.drag_start("a"));
    // Hovering updates the transient preview.
    rec.drag_over(&DropTarget::Node("c".to_string()));
    assert_ne!(visible_root_ids(&rec), vec!["a", "b", "c"]);

    rec.drag_cancel();

    assert_eq!(rec.phase(), DragPhase::Idle);
    assert_eq!(api.call_count(), 0);
    assert_eq!(visible_root_ids(&rec), vec!["a", "b", "c"]);
}

#[tokio::test]
async fn local_cycle_rejection_rolls_back_without_an_api_call() {
    let api = MockApi::default();
    let notifier = MockNotifier::default();
    let mut rec = Reconciler::new(api.clone(), notifier.clone(), sample_tree(), &config());

    // d is b's child; dropping b into d's container would be a cycle.
    assert!(rec.drag_start("b"));
    let err = rec
        .drag_end(&DropTarget::Container(Some("d".to_string())))
        .await
        .unwrap_err();

    assert_eq!(err.code(), ErrorCode::CycleRejected);
    assert_eq!(api.call_count(), 0);
    assert_eq!(rec.phase(), DragPhase::Idle);
    assert_eq!(visible_root_ids(&rec), vec!["a", "b", "c"]);
    assert_eq!(notifier.messages.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn server_rejection_rolls_back_and_surfaces_a_message() {
    let api = MockApi::scripted(vec![Scripted::Cycle]);
    let notifier = MockNotifier::default();
    let mut rec = Reconciler::new(api.clone(), notifier.clone(), sample_tree(), &config());

    assert!(rec.drag_start("a"));
    let err = rec.drag_end(&DropTarget::Node("b".to_string())).await.unwrap_err();

    assert_eq!(err.code(), ErrorCode::CycleRejected);
    // Deterministic rejections are never retried.
    assert_eq!(api.call_count(), 1);
    assert_eq!(visible_root_ids(&rec), vec!["a", "b", "c"]);
    let messages = notifier.messages.lock().unwrap();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("Move failed"));
}

#[tokio::test]
async fn conflict_is_retried_with_the_original_gesture_then_committed() {
    let api = MockApi::scripted(vec![
        Scripted::Conflict,
        Scripted::Ok(vec![
            node("b", None, 2048),
            node("a", None, 2560),
            node("c", None, 3072),
        ]),
    ]);
    let mut rec = Reconciler::new(api.clone(), MockNotifier::default(), sample_tree(), &config());

    assert!(rec.drag_start("a"));
    let committed = rec.drag_end(&DropTarget::Node("b".to_string())).await.unwrap();

    assert!(committed);
    assert_eq!(api.call_count(), 2);
    // Both attempts carried the identical original request.
    let calls = api.calls.lock().unwrap();
    assert_eq!(calls[0].active_id, calls[1].active_id);
    assert_eq!(calls[0].target_sibling_id, calls[1].target_sibling_id);
}

#[tokio::test]
async fn exhausted_retries_roll_back_to_the_pre_drag_snapshot() {
    let api = MockApi::scripted(vec![
        Scripted::Transport,
        Scripted::Conflict,
        Scripted::Transport,
    ]);
    let notifier = MockNotifier::default();
    let mut rec = Reconciler::new(api.clone(), notifier.clone(), sample_tree(), &config());

    assert!(rec.drag_start("a"));
    let err = rec.drag_end(&DropTarget::Node("b".to_string())).await.unwrap_err();

    assert!(err.is_retryable());
    // Initial attempt plus max_retries.
    assert_eq!(api.call_count(), 3);
    assert_eq!(rec.phase(), DragPhase::Idle);
    assert_eq!(visible_root_ids(&rec), vec!["a", "b", "c"]);
    assert_eq!(notifier.messages.lock().unwrap().len(), 1);
}

/// An API whose responses never arrive.
#[derive(Clone, Default)]
struct StalledApi {
    calls: Arc<Mutex<usize>>,
}

#[async_trait]
impl MoveApi for StalledApi {
    async fn move_node(&self, _req: MoveRequest) -> MoveResult<Vec<TaskNode>> {
        *self.calls.lock().unwrap() += 1;
        std::future::pending().await
    }
}

#[tokio::test(start_paused = true)]
async fn commit_timeout_is_retried_then_rolled_back() {
    let api = StalledApi::default();
    let notifier = MockNotifier::default();
    let mut rec = Reconciler::new(api.clone(), notifier.clone(), sample_tree(), &config());

    assert!(rec.drag_start("a"));
    let err = rec.drag_end(&DropTarget::Node("b".to_string())).await.unwrap_err();

    // A timed-out commit counts as a transport failure: retryable, and
    // after the retry budget the tree rolls back to the pre-drag
    // snapshot.
    assert_eq!(err.code(), ErrorCode::TransportFailure);
    assert!(err.is_retryable());
    assert_eq!(*api.calls.lock().unwrap(), 3);
    assert_eq!(rec.phase(), DragPhase::Idle);
    assert_eq!(visible_root_ids(&rec), vec!["a", "b", "c"]);
    assert_eq!(notifier.messages.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn only_one_drag_may_be_in_flight() {
    let api = MockApi::default();
    let mut rec = Reconciler::new(api, MockNotifier::default(), sample_tree(), &config());

    assert!(rec.drag_start("a"));
    assert!(!rec.drag_start("b"));
    assert!(!rec.drag_start("ghost"));
}

#[tokio::test]
async fn drag_over_previews_without_committing() {
    let api = MockApi::default();
    let mut rec = Reconciler::new(api.clone(), MockNotifier::default(), sample_tree(), &config());

    assert!(rec.drag_start("a"));
    rec.drag_over(&DropTarget::Container(Some("b".to_string())));

    // Preview shows a under b.
    let b_children: Vec<String> = rec
        .visible()
        .children(Some("b"))
        .iter()
        .map(|n| n.id.clone())
        .collect();
    assert_eq!(b_children, vec!["d", "a"]);
    assert_eq!(api.call_count(), 0);
    assert_eq!(rec.phase(), DragPhase::Dragging);

    // Hovering the root container previews an append to the roots.
    rec.drag_over(&DropTarget::Container(None));
    assert_eq!(visible_root_ids(&rec), vec!["b", "c", "a"]);
}
