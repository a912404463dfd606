//! HTTP API boundary.
//!
//! Exposes the move operation plus the minimal task CRUD around it.
//! Identity/authorization for the scope is assumed to be enforced by a
//! fronting proxy; this layer only guards structure.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, patch, post},
    Router,
};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::Config;
use crate::db::Database;
use crate::error::{ErrorBody, MoveError};
use crate::types::{MoveRequest, MoveResponse, NodeId};

/// Shared state across handlers.
#[derive(Clone)]
pub struct AppState {
    db: Database,
    config: Arc<Config>,
}

impl AppState {
    pub fn new(db: Database, config: Arc<Config>) -> Self {
        Self { db, config }
    }
}

/// Build the API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/move", post(move_node))
        .route("/api/tasks", post(create_task))
        .route("/api/tasks/{id}", patch(update_task).delete(delete_task))
        .route("/api/tasks/{id}/children", get(task_children))
        .route("/api/projects/{project}/tree", get(project_tree))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the server until shutdown.
pub async fn serve(state: AppState, port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "task-forest API listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

#[derive(serde::Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

fn error_status(err: &MoveError) -> StatusCode {
    match err {
        MoveError::NotFound(_) => StatusCode::NOT_FOUND,
        MoveError::CrossScope { .. } | MoveError::CycleRejected { .. } => StatusCode::CONFLICT,
        MoveError::ConcurrencyConflict(_) => StatusCode::CONFLICT,
        MoveError::TransportFailure(_) => StatusCode::BAD_GATEWAY,
        MoveError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// `POST /api/move`: the single move operation. A no-op succeeds with
/// an empty `updated_nodes` set.
async fn move_node(
    State(state): State<AppState>,
    Json(req): Json<MoveRequest>,
) -> impl IntoResponse {
    match state.db.apply_move(&req) {
        Ok(updated_nodes) => (
            StatusCode::OK,
            Json(MoveResponse {
                success: true,
                updated_nodes,
                error: None,
            }),
        ),
        Err(err) => (
            error_status(&err),
            Json(MoveResponse {
                success: false,
                updated_nodes: Vec::new(),
                error: Some(ErrorBody::from(&err)),
            }),
        ),
    }
}

#[derive(Debug, Deserialize)]
struct CreateTaskRequest {
    #[serde(default)]
    id: Option<NodeId>,
    project_id: String,
    #[serde(default)]
    parent_id: Option<NodeId>,
    title: String,
}

async fn create_task(
    State(state): State<AppState>,
    Json(req): Json<CreateTaskRequest>,
) -> impl IntoResponse {
    match state.db.create_node(
        req.id,
        &req.project_id,
        req.parent_id.as_deref(),
        &req.title,
    ) {
        Ok(node) => (StatusCode::CREATED, Json(serde_json::json!(node))),
        Err(e) => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": e.to_string() })),
        ),
    }
}

#[derive(Debug, Deserialize)]
struct UpdateTaskRequest {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    completed: Option<bool>,
}

async fn update_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateTaskRequest>,
) -> impl IntoResponse {
    match state.db.get_node(&id) {
        Ok(Some(_)) => {}
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({ "error": format!("Node not found: {}", id) })),
            );
        }
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": e.to_string() })),
            );
        }
    }

    let result = (|| {
        if let Some(title) = &req.title {
            state.db.rename_node(&id, title)?;
        }
        if let Some(completed) = req.completed {
            state.db.set_completed(&id, completed)?;
        }
        state.db.get_node(&id)
    })();

    match result {
        Ok(Some(node)) => (StatusCode::OK, Json(serde_json::json!(node))),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": format!("Node not found: {}", id) })),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": e.to_string() })),
        ),
    }
}

async fn delete_task(State(state): State<AppState>, Path(id): Path<String>) -> impl IntoResponse {
    match state.db.get_node(&id) {
        Ok(Some(_)) => {}
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({ "error": format!("Node not found: {}", id) })),
            );
        }
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": e.to_string() })),
            );
        }
    }

    match state.db.delete_node(&id, state.config.tree.delete_policy) {
        Ok(deleted) => (StatusCode::OK, Json(serde_json::json!({ "deleted": deleted }))),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": e.to_string() })),
        ),
    }
}

async fn task_children(State(state): State<AppState>, Path(id): Path<String>) -> impl IntoResponse {
    let node = match state.db.get_node(&id) {
        Ok(Some(node)) => node,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({ "error": format!("Node not found: {}", id) })),
            );
        }
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": e.to_string() })),
            );
        }
    };

    match state.db.get_children(&node.project_id, Some(&id)) {
        Ok(children) => (StatusCode::OK, Json(serde_json::json!(children))),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": e.to_string() })),
        ),
    }
}

async fn project_tree(
    State(state): State<AppState>,
    Path(project): Path<String>,
) -> impl IntoResponse {
    match state.db.get_project_tree(&project) {
        Ok(tree) => (StatusCode::OK, Json(serde_json::json!(tree))),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": e.to_string() })),
        ),
    }
}
