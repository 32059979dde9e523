//! HTTP surface: REST routes for tasks and chat, plus the `/ws` upgrade.
//!
//! The error taxonomy maps onto status codes so clients can distinguish the
//! corrective action: 400 for structural problems (the task cannot go
//! there, a required field is missing), 403 for authorization (ask the
//! right person), 404 for missing entities, 409 for a lost race.

use std::sync::Arc;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{FromRequestParts, Path, Query, State};
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router, routing};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use taskhub_core::chat::{ChatMessage, UnreadCount};
use taskhub_core::ids::{ProjectId, TaskId, UserId};
use taskhub_core::principal::Principal;
use taskhub_core::task::{Task, TaskStatus};
use taskhub_core::workflow::TransitionError;

use crate::chat::ChatService;
use crate::notify::AssignmentNotice;
use crate::presence::PresenceRegistry;
use crate::socket;
use crate::store::{ChatStore, ProjectStore, TaskStore};
use crate::workflow::{NewTask, TransitionRequest, WorkflowError, WorkflowService};

/// Shared server state: stores, presence registry, and the two engines.
pub struct AppState {
    /// Project records (seeded by the out-of-scope project CRUD).
    pub projects: Arc<ProjectStore>,
    /// Task records.
    pub tasks: Arc<TaskStore>,
    /// Persisted chat messages.
    pub chats: Arc<ChatStore>,
    /// Live connections.
    pub presence: Arc<PresenceRegistry>,
    /// The workflow engine.
    pub workflow: WorkflowService,
    /// The messaging/delivery engine.
    pub chat: ChatService,
}

impl AppState {
    /// Builds the full state graph over fresh stores, wiring the workflow
    /// engine to the given notification queue.
    #[must_use]
    pub fn new(notices: mpsc::UnboundedSender<AssignmentNotice>) -> Self {
        let projects = Arc::new(ProjectStore::new());
        let tasks = Arc::new(TaskStore::new());
        let chats = Arc::new(ChatStore::new());
        let presence = Arc::new(PresenceRegistry::new());
        Self {
            workflow: WorkflowService::new(Arc::clone(&tasks), Arc::clone(&projects), notices),
            chat: ChatService::new(Arc::clone(&chats), Arc::clone(&presence)),
            projects,
            tasks,
            chats,
            presence,
        }
    }
}

/// JSON error body returned by every failing endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Human-readable rejection reason.
    pub error: String,
}

/// API-level error with its HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Workflow rejection, mapped by its variant.
    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    /// A malformed or incomplete request.
    #[error("{0}")]
    BadRequest(String),

    /// The authentication headers are missing or invalid.
    #[error("missing authentication")]
    Unauthenticated,
}

impl ApiError {
    /// The status code this error maps to.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Workflow(err) => match err {
                WorkflowError::NotFound { .. } => StatusCode::NOT_FOUND,
                WorkflowError::Transition(TransitionError::Invalid { .. })
                | WorkflowError::MissingAssignee { .. } => StatusCode::BAD_REQUEST,
                WorkflowError::Transition(TransitionError::Unauthorized { .. })
                | WorkflowError::OwnerRequired { .. } => StatusCode::FORBIDDEN,
                WorkflowError::Conflict { .. } => StatusCode::CONFLICT,
            },
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.to_string(),
        });
        (self.status(), body).into_response()
    }
}

/// The authenticated caller, resolved by the upstream auth layer and passed
/// down in `x-user-id` / `x-user-email` / `x-user-name` headers.
///
/// Credential handling (tokens, sessions) is outside this service; by the
/// time a request arrives here the identity is already established.
pub struct AuthPrincipal(pub Principal);

impl<S: Send + Sync> FromRequestParts<S> for AuthPrincipal {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| -> Option<String> {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .filter(|v| !v.is_empty())
                .map(ToString::to_string)
        };
        let id = header("x-user-id").ok_or(ApiError::Unauthenticated)?;
        let email = header("x-user-email").ok_or(ApiError::Unauthenticated)?;
        let name = header("x-user-name").unwrap_or_default();
        Ok(Self(Principal {
            id: UserId::new(id),
            email,
            name,
        }))
    }
}

// ---------------------------------------------------------------------------
// Task routes
// ---------------------------------------------------------------------------

async fn create_task(
    State(state): State<Arc<AppState>>,
    AuthPrincipal(principal): AuthPrincipal,
    Json(new): Json<NewTask>,
) -> Result<(StatusCode, Json<Task>), ApiError> {
    let task = state.workflow.create_task(&principal, new).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

/// Filters for the task listing; at least one must be present.
#[derive(Debug, Deserialize)]
struct ListTasksQuery {
    project_id: Option<ProjectId>,
    email: Option<String>,
}

async fn list_tasks(
    State(state): State<Arc<AppState>>,
    AuthPrincipal(_principal): AuthPrincipal,
    Query(query): Query<ListTasksQuery>,
) -> Result<Json<Vec<Task>>, ApiError> {
    let tasks = match (query.project_id, query.email) {
        (Some(project_id), Some(email)) => {
            let mut tasks = state.workflow.list_by_project(project_id).await;
            tasks.retain(|t| t.assignee.as_ref().is_some_and(|a| a.email == email));
            tasks
        }
        (Some(project_id), None) => state.workflow.list_by_project(project_id).await,
        (None, Some(email)) => state.workflow.list_by_assignee_email(&email).await,
        (None, None) => {
            return Err(ApiError::BadRequest(
                "either project_id or email must be provided".into(),
            ));
        }
    };
    Ok(Json(tasks))
}

/// Body of a transition request: the target status plus optional side
/// effects.
#[derive(Debug, Deserialize)]
struct TransitionBody {
    status: TaskStatus,
    #[serde(flatten)]
    request: TransitionRequest,
}

async fn transition_task(
    State(state): State<Arc<AppState>>,
    AuthPrincipal(principal): AuthPrincipal,
    Path(task_id): Path<TaskId>,
    Json(body): Json<TransitionBody>,
) -> Result<Json<Task>, ApiError> {
    let task = state
        .workflow
        .transition(task_id, &principal, body.status, body.request)
        .await?;
    Ok(Json(task))
}

async fn delete_task(
    State(state): State<Arc<AppState>>,
    AuthPrincipal(principal): AuthPrincipal,
    Path(task_id): Path<TaskId>,
) -> Result<StatusCode, ApiError> {
    state.workflow.delete_task(task_id, &principal).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Chat routes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    user_id: UserId,
    peer_id: UserId,
}

async fn chat_history(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HistoryQuery>,
) -> Json<Vec<ChatMessage>> {
    Json(state.chat.history(&query.user_id, &query.peer_id).await)
}

#[derive(Debug, Deserialize)]
struct UnreadQuery {
    user_id: UserId,
}

async fn unread_counts(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UnreadQuery>,
) -> Json<Vec<UnreadCount>> {
    Json(state.chat.unread_counts(&query.user_id).await)
}

#[derive(Debug, Deserialize)]
struct MarkReadBody {
    user_id: UserId,
    sender_id: UserId,
}

/// Response of the mark-read endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct MarkReadResponse {
    /// How many messages were flipped to read.
    pub updated_count: u64,
}

async fn mark_read(
    State(state): State<Arc<AppState>>,
    Json(body): Json<MarkReadBody>,
) -> Json<MarkReadResponse> {
    let updated_count = state.chat.mark_read(&body.user_id, &body.sender_id).await;
    Json(MarkReadResponse { updated_count })
}

// ---------------------------------------------------------------------------
// Router & server
// ---------------------------------------------------------------------------

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| socket::handle_socket(socket, state))
}

/// Builds the full application router over the given state.
#[must_use]
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/tasks", routing::post(create_task).get(list_tasks))
        .route(
            "/api/tasks/{id}",
            routing::put(transition_task).delete(delete_task),
        )
        .route("/api/chats", routing::get(chat_history))
        .route("/api/chats/unread", routing::get(unread_counts))
        .route("/api/chats/mark-read", routing::put(mark_read))
        .route("/ws", routing::get(ws_handler))
        .with_state(state)
}

/// Starts the server on the given address and returns the bound address and
/// a join handle.
///
/// This is the primary entry point used by both `main.rs` and test code;
/// binding to port 0 yields an OS-assigned port.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server(
    addr: &str,
    state: Arc<AppState>,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "server error");
        }
    });

    Ok((bound_addr, handle))
}
