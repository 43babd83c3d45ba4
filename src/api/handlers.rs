//! HTTP request handlers

use super::sse::sse_stream;
use super::types::{
    AgentsResponse, CancelResponse, ErrorResponse, FormSubmission, SelectAgentRequest,
    SessionResponse, SuccessResponse, TurnRequestBody, TurnResponse,
};
use super::AppState;
use crate::runtime::{ConversationSnapshot, RuntimeError, TurnAccepted, TurnError};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::collections::BTreeMap;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Agent targets
        .route("/api/agents", get(list_agents))
        // Session lifecycle
        .route("/api/session", post(select_agent).delete(end_session))
        // Conversation state
        .route("/api/conversation", get(get_conversation))
        .route("/api/conversation/stream", get(stream_conversation))
        // User actions
        .route("/api/turns", post(submit_turn))
        .route("/api/forms/:message_id", post(submit_form))
        .route("/api/cancel", post(cancel_turn))
        // Version
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Agents and Session
// ============================================================

async fn list_agents(State(state): State<AppState>) -> Json<AgentsResponse> {
    Json(AgentsResponse {
        agents: state.agents.as_ref().clone(),
    })
}

async fn select_agent(
    State(state): State<AppState>,
    Json(req): Json<SelectAgentRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    let target = state
        .agent(&req.agent)
        .cloned()
        .ok_or_else(|| AppError::NotFound(format!("Unknown agent: {}", req.agent)))?;

    let session = state.runtime.select_target(target).await?;
    Ok(Json(SessionResponse { session }))
}

async fn end_session(State(state): State<AppState>) -> Result<Json<SuccessResponse>, AppError> {
    state.runtime.end_session().await?;
    Ok(Json(SuccessResponse { success: true }))
}

// ============================================================
// Conversation State
// ============================================================

async fn get_conversation(
    State(state): State<AppState>,
) -> Result<Json<ConversationSnapshot>, AppError> {
    Ok(Json(state.runtime.snapshot().await?))
}

async fn stream_conversation(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    // Subscribe first so nothing between the snapshot and the feed is missed
    let broadcast_rx = state.runtime.subscribe();
    let snapshot = state.runtime.snapshot().await?;
    Ok(sse_stream(snapshot, broadcast_rx))
}

// ============================================================
// User Actions
// ============================================================

async fn submit_turn(
    State(state): State<AppState>,
    Json(req): Json<TurnRequestBody>,
) -> Result<Json<TurnResponse>, AppError> {
    let accepted = state.runtime.submit_prompt(req.text).await?;
    Ok(Json(accepted.into()))
}

async fn submit_form(
    State(state): State<AppState>,
    Path(message_id): Path<String>,
    Json(req): Json<FormSubmission>,
) -> Result<Json<TurnResponse>, AppError> {
    let accepted = state.runtime.submit_form(message_id, req.values).await?;
    Ok(Json(accepted.into()))
}

async fn cancel_turn(State(state): State<AppState>) -> Result<Json<CancelResponse>, AppError> {
    let cancelled = state.runtime.cancel().await?;
    Ok(Json(CancelResponse { cancelled }))
}

async fn get_version() -> &'static str {
    concat!("a2a-chat ", env!("CARGO_PKG_VERSION"))
}

impl From<TurnAccepted> for TurnResponse {
    fn from(accepted: TurnAccepted) -> Self {
        Self {
            user_message_id: accepted.user_message_id,
            agent_message_id: accepted.agent_message_id,
        }
    }
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    InvalidForm(BTreeMap<String, String>),
    NotFound(String),
    Conflict(String),
    Internal(String),
}

impl From<RuntimeError> for AppError {
    fn from(error: RuntimeError) -> Self {
        match error {
            RuntimeError::Turn(turn) => turn.into(),
            RuntimeError::Stopped => AppError::Internal(error.to_string()),
        }
    }
}

impl From<TurnError> for AppError {
    fn from(error: TurnError) -> Self {
        match error {
            TurnError::EmptyPrompt | TurnError::NoForm(_) => AppError::BadRequest(error.to_string()),
            TurnError::NoSession | TurnError::TurnInProgress => AppError::Conflict(error.to_string()),
            TurnError::UnknownMessage(_) => AppError::NotFound(error.to_string()),
            TurnError::InvalidForm(invalid) => AppError::InvalidForm(invalid.fields),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, ErrorResponse::new(msg)),
            AppError::InvalidForm(fields) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorResponse::new("Form is incomplete").with_fields(fields),
            ),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, ErrorResponse::new(msg)),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, ErrorResponse::new(msg)),
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, ErrorResponse::new(msg))
            }
        };

        (status, Json(body)).into_response()
    }
}
