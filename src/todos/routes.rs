//! REST endpoints for the todo API.

use std::any::Any;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use chrono::Utc;
use serde::Deserialize;
use tokio::sync::{RwLock, broadcast};
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, error, info};

use super::model::{NewTodo, TodoId, TodoPatch, TodoWsMessage};
use super::query::{TodoQuery, TodoQueryParams};
use super::store::TodoStore;
use super::ws::ws_handler;
use crate::error::{FilterError, TodoError};

/// Default broadcast channel capacity.
const DEFAULT_BROADCAST_CAPACITY: usize = 256;

/// Shared state for the todo routes.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<RwLock<TodoStore>>,
    /// Broadcast channel for pushing changes to feed subscribers.
    pub tx: broadcast::Sender<TodoWsMessage>,
}

impl AppState {
    pub fn new(store: TodoStore) -> Self {
        let (tx, _) = broadcast::channel(DEFAULT_BROADCAST_CAPACITY);
        Self {
            store: Arc::new(RwLock::new(store)),
            tx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TodoWsMessage> {
        self.tx.subscribe()
    }

    fn publish(&self, msg: TodoWsMessage) {
        // Ok if nobody is listening.
        let _ = self.tx.send(msg);
    }
}

/// Build the Axum router: REST under `/api`, change feed at `/ws/todos`.
pub fn todo_routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/health", get(health))
        .route("/api/todos", get(list_todos).post(create_todo).delete(clear_todos))
        .route(
            "/api/todos/{id}",
            get(get_todo).put(update_todo).delete(delete_todo),
        )
        .route("/ws/todos", get(ws_handler))
        .fallback(not_found)
        .with_state(state)
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

// ── Errors ──────────────────────────────────────────────────────────────

/// Error response body: `{"error": "..."}`.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    /// Logged; the caller only sees a generic message.
    Internal(String),
}

impl From<TodoError> for ApiError {
    fn from(e: TodoError) -> Self {
        match e {
            TodoError::Validation(v) => Self::BadRequest(v.to_string()),
            TodoError::NotFound { .. } => Self::NotFound(e.to_string()),
            TodoError::IdsExhausted | TodoError::Persistence(_) => {
                Self::Internal(e.to_string())
            }
        }
    }
}

impl From<FilterError> for ApiError {
    fn from(e: FilterError) -> Self {
        Self::BadRequest(e.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::Internal(detail) => {
                error!(error = %detail, "Internal error handling todo request");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    ApiError::Internal(format!("handler panicked: {detail}")).into_response()
}

async fn not_found() -> ApiError {
    ApiError::NotFound("API endpoint not found".to_string())
}

// ── Info ────────────────────────────────────────────────────────────────

async fn index() -> impl IntoResponse {
    Json(serde_json::json!({
        "message": "Todo Backend API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "GET /api/todos": "List todos (filters: status, date, month, year)",
            "POST /api/todos": "Create a todo",
            "GET /api/todos/:id": "Fetch one todo",
            "PUT /api/todos/:id": "Update a todo",
            "DELETE /api/todos/:id": "Delete a todo",
            "DELETE /api/todos": "Delete all todos (?completed=true for completed only)",
            "GET /api/health": "Health check",
            "GET /ws/todos": "Change feed (WebSocket)"
        }
    }))
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let stats = state.store.read().await.stats();
    Json(serde_json::json!({
        "status": "OK",
        "timestamp": Utc::now(),
        "totalTodos": stats.total,
        "completedTodos": stats.completed,
    }))
}

// ── Todos ───────────────────────────────────────────────────────────────

async fn list_todos(
    State(state): State<AppState>,
    params: Result<Query<TodoQueryParams>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(params) = params?;
    let query = TodoQuery::try_from(params)?;
    let store = state.store.read().await;
    let visible = query.apply(store.list(), &chrono::Local::now());
    Ok(Json(serde_json::json!(visible)))
}

async fn get_todo(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = TodoId::parse(&id);
    let store = state.store.read().await;
    let todo = store.get(&id)?;
    Ok(Json(serde_json::json!(todo)))
}

#[derive(Debug, Deserialize)]
struct CreateTodoRequest {
    #[serde(default, alias = "text")]
    title: Option<String>,
    #[serde(default)]
    completed: bool,
}

async fn create_todo(
    State(state): State<AppState>,
    body: Result<Json<CreateTodoRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(body) = body?;
    let new = NewTodo::new(body.title.unwrap_or_default()).with_completed(body.completed);

    // Publish under the write lock so the feed sees changes in store order.
    let mut store = state.store.write().await;
    let todo = store.create(new)?;
    state.publish(TodoWsMessage::TodoCreated { todo: todo.clone() });
    drop(store);
    Ok((StatusCode::CREATED, Json(todo)))
}

async fn update_todo(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<TodoPatch>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let id = TodoId::parse(&id);
    let Json(patch) = body?;

    let mut store = state.store.write().await;
    let todo = store.update(&id, patch)?;
    state.publish(TodoWsMessage::TodoUpdated { todo: todo.clone() });
    drop(store);
    Ok(Json(todo))
}

async fn delete_todo(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = TodoId::parse(&id);

    let mut store = state.store.write().await;
    let todo = store.delete(&id)?;
    state.publish(TodoWsMessage::TodoDeleted { id });
    drop(store);
    Ok(Json(serde_json::json!({
        "message": "Todo deleted",
        "todo": todo,
    })))
}

#[derive(Debug, Default, Deserialize)]
struct ClearParams {
    #[serde(default)]
    completed: bool,
}

async fn clear_todos(
    State(state): State<AppState>,
    params: Result<Query<ClearParams>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(params) = params?;

    let mut store = state.store.write().await;
    let deleted = if params.completed {
        store.clear_completed()?
    } else {
        store.clear_all()?
    };
    if deleted > 0 {
        state.publish(TodoWsMessage::TodosCleared { deleted });
    } else {
        debug!(completed_only = params.completed, "Clear requested with nothing to delete");
    }
    drop(store);
    info!(deleted, completed_only = params.completed, "Todos cleared via API");

    let message = if params.completed {
        format!("{deleted} completed todos deleted")
    } else {
        format!("{deleted} todos deleted")
    };
    Ok(Json(serde_json::json!({
        "message": message,
        "deleted": deleted,
    })))
}
