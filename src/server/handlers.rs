// HTTP request handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::SafetyServer;
use crate::engine::TurnOutcome;
use crate::errors::SessionError;
use crate::responder::compose_reply;
use crate::session::SessionSummary;

/// Longest accepted session identifier, in bytes
const MAX_SESSION_ID_LEN: usize = 256;

/// Longest accepted message, in bytes
const MAX_MESSAGE_LEN: usize = 16 * 1024;

/// Create the main application router
pub fn create_router(server: Arc<SafetyServer>) -> Router {
    Router::new()
        .route("/v1/assess", post(handle_assess))
        .route("/v1/chat", post(handle_chat))
        .route("/v1/session/:id", get(get_session).delete(delete_session))
        // Health and metrics
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_endpoint))
        .with_state(server)
}

/// Request body for /v1/assess and /v1/chat
#[derive(Debug, Deserialize)]
pub struct AssessRequest {
    /// Caller's session identifier; hashed before use
    pub session_id: String,
    pub message: String,
}

impl AssessRequest {
    fn validate(&self) -> Result<(), AppError> {
        if self.session_id.trim().is_empty() {
            return Err(AppError::bad_request("session_id must not be empty"));
        }
        if self.session_id.len() > MAX_SESSION_ID_LEN {
            return Err(AppError::bad_request("session_id is too long"));
        }
        if self.message.len() > MAX_MESSAGE_LEN {
            return Err(AppError::bad_request("message is too long"));
        }
        Ok(())
    }
}

/// Response body for /v1/chat
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub reply: String,
    pub responder: String,
    pub assessment: TurnOutcome,
}

/// Run the engine off the async runtime and record metrics
async fn assess(server: &Arc<SafetyServer>, request: AssessRequest) -> Result<TurnOutcome, AppError> {
    request.validate()?;

    let engine = Arc::clone(server.engine());
    let outcome = tokio::task::spawn_blocking(move || {
        engine.process(&request.session_id, &request.message)
    })
    .await?;

    server.metrics().observe(&outcome);
    Ok(outcome)
}

/// Handle POST /v1/assess - Assess one turn
async fn handle_assess(
    State(server): State<Arc<SafetyServer>>,
    Json(request): Json<AssessRequest>,
) -> Result<Json<TurnOutcome>, AppError> {
    let outcome = assess(&server, request).await?;
    Ok(Json(outcome))
}

/// Handle POST /v1/chat - Assess one turn and compose a reply
async fn handle_chat(
    State(server): State<Arc<SafetyServer>>,
    Json(request): Json<AssessRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    let message = request.message.clone();
    let outcome = assess(&server, request).await?;

    let responder = server.responder();
    let reply = compose_reply(&**responder, &message, &outcome).await;

    Ok(Json(ChatResponse {
        reply,
        responder: responder.name().to_string(),
        assessment: outcome,
    }))
}

/// Handle GET /v1/session/:id - Session summary, never message content
async fn get_session(
    State(server): State<Arc<SafetyServer>>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionSummary>, AppError> {
    let summary = server.engine().store().snapshot(&session_id)?;
    Ok(Json(summary))
}

/// Handle DELETE /v1/session/:id - Delete session
async fn delete_session(
    State(server): State<Arc<SafetyServer>>,
    Path(session_id): Path<String>,
) -> Result<StatusCode, AppError> {
    if server.engine().store().remove(&session_id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found("Session not found"))
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: String,
    pub uptime_seconds: u64,
    pub active_sessions: usize,
}

/// Handle GET /health - Health check endpoint
pub async fn health_check(State(server): State<Arc<SafetyServer>>) -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "healthy".to_string(),
        uptime_seconds: server.uptime_seconds(),
        active_sessions: server.engine().store().active_count(),
    })
}

/// Handle GET /metrics - Prometheus metrics endpoint
pub async fn metrics_endpoint(
    State(server): State<Arc<SafetyServer>>,
) -> Result<Response, AppError> {
    let metrics = server.metrics();
    metrics.set_active_sessions(server.engine().store().active_count());
    let body = metrics.encode_text()?;

    Ok((StatusCode::OK, body).into_response())
}

/// Application error wrapper for proper HTTP error responses
pub struct AppError {
    status: StatusCode,
    error: anyhow::Error,
}

impl AppError {
    pub fn bad_request(message: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error: anyhow::anyhow!(message.to_string()),
        }
    }

    pub fn not_found(message: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            error: anyhow::anyhow!(message.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(error = %self.error, "Request failed");
        } else {
            tracing::debug!(error = %self.error, status = %self.status, "Request rejected");
        }

        let body = serde_json::json!({
            "error": {
                "message": self.error.to_string(),
                "type": if self.status.is_server_error() { "api_error" } else { "invalid_request_error" }
            }
        });

        (self.status, Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        let error = err.into();
        let status = match error.downcast_ref::<SessionError>() {
            Some(SessionError::UnknownSession(_)) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self { status, error }
    }
}
