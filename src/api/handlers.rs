//! HTTP request handlers

use super::assets::{get_index_html, serve_static};
use super::sse::sse_stream;
use super::types::{
    ChatRequest, ChatResponse, ConversationInfo, ConversationResponse,
    ConversationWithMessagesResponse, ErrorResponse, SuccessResponse,
};
use super::AppState;
use crate::runtime::{RuntimeError, SseEvent};
use crate::state_machine::TransitionError;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Root serves the page
        .route("/", get(serve_spa))
        // Static assets (embedded or filesystem fallback)
        .route("/assets/*path", get(serve_static))
        // Session creation
        .route("/api/conversations/new", post(create_conversation))
        // Session retrieval
        .route("/api/conversations/:id", get(get_conversation))
        // SSE streaming
        .route("/api/conversations/:id/stream", get(stream_conversation))
        // User actions
        .route("/api/conversations/:id/chat", post(send_chat))
        // Lifecycle
        .route("/api/conversations/:id/delete", post(delete_conversation))
        // Version
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Page
// ============================================================

async fn serve_spa() -> impl IntoResponse {
    match get_index_html() {
        Some(content) => Html(content).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Html("<h1>404 - UI not found</h1>".to_string()),
        )
            .into_response(),
    }
}

// ============================================================
// Sessions
// ============================================================

async fn create_conversation(State(state): State<AppState>) -> Json<ConversationResponse> {
    let id = state.runtime.create().await;

    Json(ConversationResponse {
        conversation: ConversationInfo {
            id,
            model: state.runtime.model_id().to_string(),
        },
    })
}

#[derive(Debug, Deserialize)]
struct GetConversationQuery {
    after_sequence: Option<u64>,
}

async fn get_conversation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<GetConversationQuery>,
) -> Result<Json<ConversationWithMessagesResponse>, AppError> {
    let snapshot = state
        .runtime
        .get(id)
        .await?
        .snapshot(query.after_sequence)
        .await?;

    Ok(Json(ConversationWithMessagesResponse {
        messages: snapshot.messages,
        pending: snapshot.pending,
        last_sequence_id: snapshot.last_sequence_id,
    }))
}

async fn delete_conversation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SuccessResponse>, AppError> {
    state.runtime.remove(id).await?;
    Ok(Json(SuccessResponse { success: true }))
}

// ============================================================
// SSE Streaming
// ============================================================

async fn stream_conversation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let handle = state.runtime.get(id).await?;

    // Subscribe before the snapshot so nothing falls between them.
    // Overlap is possible; clients dedupe on sequence_id.
    let broadcast_rx = handle.subscribe();
    let snapshot = handle.snapshot(None).await?;

    Ok(sse_stream(SseEvent::Init { snapshot }, broadcast_rx))
}

// ============================================================
// User Actions
// ============================================================

async fn send_chat(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    state.runtime.get(id).await?.submit(req.text).await?;
    Ok(Json(ChatResponse { accepted: true }))
}

async fn get_version() -> &'static str {
    concat!("lynx-chat ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    Internal(String),
}

impl From<RuntimeError> for AppError {
    fn from(e: RuntimeError) -> Self {
        let message = e.to_string();
        match e {
            RuntimeError::NotFound(_) => AppError::NotFound(message),
            RuntimeError::Stopped => AppError::Internal(message),
            RuntimeError::Rejected(TransitionError::EmptyMessage) => AppError::BadRequest(message),
            RuntimeError::Rejected(
                TransitionError::Busy | TransitionError::InvalidTransition(_),
            ) => AppError::Conflict(message),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
