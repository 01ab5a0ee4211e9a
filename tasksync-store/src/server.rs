//! HTTP surface of the Task Store: shared state, API-key gate, JSON routes.
//!
//! Every `/api/` request must carry the configured key in
//! [`API_KEY_HEADER`]. `POST /api/identify` binds a display name to a
//! session cookie; later writes on that session are authored by it.

use std::sync::Arc;

use axum::extract::{Path, Query, Request, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, put};
use axum::{Json, Router};
use tasksync_proto::api::{self, API_KEY_HEADER, ErrorBody, IdentifyRequest, StatusBody};
use tasksync_proto::message::{EditMessageRequest, MessageId, SendMessageRequest};
use tasksync_proto::task::{CreateTaskRequest, TaskId, TaskListQuery, UpdateTaskRequest};

use crate::store::{SessionRegistry, StoreError, TaskStore};

/// Name of the session cookie set by `POST /api/identify`.
pub const SESSION_COOKIE: &str = "tasksync_session";

/// Shared server state.
pub struct StoreState {
    /// Task and message collections.
    pub store: TaskStore,
    /// Identified sessions.
    pub sessions: SessionRegistry,
    api_key: Option<String>,
}

impl StoreState {
    /// Creates state guarding `store` with `api_key`.
    ///
    /// Without a key every API call is refused with a configuration error.
    #[must_use]
    pub fn new(store: TaskStore, api_key: Option<String>) -> Self {
        Self {
            store,
            sessions: SessionRegistry::new(),
            api_key,
        }
    }
}

/// Error response of a route handler.
#[derive(Debug)]
enum ApiError {
    Store(StoreError),
    BadRequest(String),
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

fn error_body(status: StatusCode, error: &str, message: Option<String>) -> Response {
    let body = ErrorBody {
        error: error.to_string(),
        message,
    };
    (status, Json(body)).into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::Store(e @ (StoreError::TaskNotFound | StoreError::MessageNotFound)) => {
                error_body(StatusCode::NOT_FOUND, &e.to_string(), None)
            }
            Self::Store(e @ StoreError::Invalid { .. }) => {
                error_body(StatusCode::BAD_REQUEST, "Bad Request", Some(e.to_string()))
            }
            Self::BadRequest(detail) => {
                error_body(StatusCode::BAD_REQUEST, "Bad Request", Some(detail))
            }
        }
    }
}

type ApiResult<T> = Result<T, ApiError>;

fn updated(status: &str) -> Json<StatusBody> {
    Json(StatusBody {
        status: status.to_string(),
    })
}

/// Rejects API calls without the configured key.
async fn require_api_key(
    State(state): State<Arc<StoreState>>,
    req: Request,
    next: Next,
) -> Response {
    let Some(expected) = state.api_key.as_deref() else {
        tracing::error!("store API key is not configured");
        return error_body(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Configuration Error",
            Some("Server API Key not configured".to_string()),
        );
    };
    let presented = req
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok());
    if presented != Some(expected) {
        tracing::debug!(path = %req.uri().path(), "rejected request with bad API key");
        return error_body(
            StatusCode::UNAUTHORIZED,
            "Unauthorized",
            Some("Invalid API Key".to_string()),
        );
    }
    next.run(req).await
}

/// Session id carried in the `Cookie` header, if any.
fn session_of(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value)
}

fn author(state: &StoreState, headers: &HeaderMap) -> String {
    state.sessions.author(session_of(headers))
}

async fn config(State(state): State<Arc<StoreState>>) -> impl IntoResponse {
    Json(state.store.config())
}

async fn identify(
    State(state): State<Arc<StoreState>>,
    headers: HeaderMap,
    Json(body): Json<IdentifyRequest>,
) -> ApiResult<Response> {
    let name = body.name.trim();
    if name.is_empty() {
        return Err(ApiError::BadRequest("name is required".to_string()));
    }
    let session = state.sessions.identify(session_of(&headers), name);
    tracing::info!(%name, "session identified");
    let cookie = HeaderValue::from_str(&format!("{SESSION_COOKIE}={session}; Path=/; HttpOnly"))
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let body = serde_json::json!({ "status": "success", "user_name": name });
    Ok(([(header::SET_COOKIE, cookie)], Json(body)).into_response())
}

async fn list_tasks(
    State(state): State<Arc<StoreState>>,
    Query(query): Query<TaskListQuery>,
) -> impl IntoResponse {
    let query = TaskListQuery::new(query.status, query.search.as_deref().unwrap_or_default());
    Json(state.store.list_tasks(&query))
}

async fn create_task(
    State(state): State<Arc<StoreState>>,
    headers: HeaderMap,
    Json(req): Json<CreateTaskRequest>,
) -> ApiResult<impl IntoResponse> {
    let created = state.store.create_task(&req, &author(&state, &headers))?;
    let body = serde_json::json!({
        "id": created.id,
        "status": "created",
        "title": created.title,
        "description": created.description,
    });
    Ok((StatusCode::CREATED, Json(body)))
}

async fn get_task(
    State(state): State<Arc<StoreState>>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.store.get_task(TaskId::new(id))?))
}

async fn update_task(
    State(state): State<Arc<StoreState>>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateTaskRequest>,
) -> ApiResult<impl IntoResponse> {
    state.store.update_task(TaskId::new(id), &req)?;
    Ok(updated("updated"))
}

async fn delete_task(
    State(state): State<Arc<StoreState>>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    state.store.delete_task(TaskId::new(id))?;
    Ok(updated("deleted"))
}

async fn list_messages(
    State(state): State<Arc<StoreState>>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.store.list_messages(TaskId::new(id))?))
}

async fn send_message(
    State(state): State<Arc<StoreState>>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(req): Json<SendMessageRequest>,
) -> ApiResult<impl IntoResponse> {
    let sent = state
        .store
        .send_message(TaskId::new(id), &req, &author(&state, &headers))?;
    Ok((StatusCode::CREATED, Json(sent)))
}

async fn edit_message(
    State(state): State<Arc<StoreState>>,
    Path(id): Path<i64>,
    Json(req): Json<EditMessageRequest>,
) -> ApiResult<impl IntoResponse> {
    state.store.edit_message(MessageId::new(id), &req)?;
    Ok(updated("updated"))
}

async fn delete_message(
    State(state): State<Arc<StoreState>>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    state.store.delete_message(MessageId::new(id))?;
    Ok(updated("deleted"))
}

/// Builds the API router over `state`.
pub fn router(state: Arc<StoreState>) -> Router {
    Router::new()
        .route(api::CONFIG, get(config))
        .route(api::IDENTIFY, axum::routing::post(identify))
        .route(api::TASKS, get(list_tasks).post(create_task))
        .route(
            "/api/tasks/{id}",
            get(get_task).put(update_task).delete(delete_task),
        )
        .route(
            "/api/tasks/{id}/messages",
            get(list_messages).post(send_message),
        )
        .route("/api/messages/{id}", put(edit_message).delete(delete_message))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            require_api_key,
        ))
        .with_state(state)
}

/// Starts the store server on the given address and returns the bound
/// address and a join handle.
///
/// Binding `127.0.0.1:0` picks a free port, which is how tests embed it.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server_with_state(
    addr: &str,
    state: Arc<StoreState>,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "store server error");
        }
    });

    Ok((bound_addr, handle))
}
