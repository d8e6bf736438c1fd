//! Route handler functions for all API endpoints.
//!
//! Each handler extracts path parameters and bodies via axum extractors,
//! calls the chat controller, and returns JSON (or audio) responses.

use axum::body::Bytes;
use axum::extract::rejection::{BytesRejection, JsonRejection};
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use histochat_chat::{ChatSession, RenderedView, SessionSummary, TextExchange};
use histochat_core::config::{MenuConfig, ThemeConfig};
use histochat_core::types::{ChatMessage, View};
use histochat_voice::AudioArtifact;

use crate::error::ApiError;
use crate::state::AppState;

// =============================================================================
// Request and response types
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub active_sessions: usize,
    pub voice_enabled: bool,
}

#[derive(Debug, Serialize)]
pub struct ThemeResponse {
    pub theme: ThemeConfig,
    pub menu: MenuConfig,
}

#[derive(Debug, Serialize)]
pub struct SessionsResponse {
    pub sessions: Vec<SessionSummary>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub session_id: Uuid,
    pub messages: Vec<ChatMessage>,
}

/// Body of POST /sessions/{id}/messages.
#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub question: String,
}

#[derive(Debug, Serialize)]
pub struct VoiceResponse {
    pub question: String,
    pub response: String,
    pub audio: AudioArtifact,
    pub download_name: String,
    /// Path to fetch the synthesized speech from.
    pub audio_url: String,
}

// =============================================================================
// Handler functions
// =============================================================================

/// GET /health - health check.
pub async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    let active_sessions = state.controller.list_sessions()?.len();
    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        active_sessions,
        voice_enabled: state.controller.voice_enabled(),
    }))
}

/// GET /theme - the validated theme and menu record.
pub async fn theme(State(state): State<AppState>) -> Json<ThemeResponse> {
    Json(ThemeResponse {
        theme: state.config.theme.clone(),
        menu: state.config.menu.clone(),
    })
}

/// POST /sessions - start a session.
pub async fn create_session(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<ChatSession>), ApiError> {
    let session = state.controller.create_session()?;
    Ok((StatusCode::CREATED, Json(session)))
}

/// GET /sessions - list live sessions.
pub async fn list_sessions(
    State(state): State<AppState>,
) -> Result<Json<SessionsResponse>, ApiError> {
    Ok(Json(SessionsResponse {
        sessions: state.controller.list_sessions()?,
    }))
}

/// DELETE /sessions/{id} - end a session and drop its history.
pub async fn end_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.controller.end_session(id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /sessions/{id}/views/{view} - select and render `home` or `chat`.
pub async fn select_view(
    State(state): State<AppState>,
    Path((id, view)): Path<(Uuid, String)>,
) -> Result<Json<RenderedView>, ApiError> {
    let view: View = view
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("Unknown view '{}'. Must be one of: home, chat", view)))?;
    Ok(Json(state.controller.select_view(id, view)?))
}

/// GET /sessions/{id}/history
pub async fn history(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<HistoryResponse>, ApiError> {
    Ok(Json(HistoryResponse {
        session_id: id,
        messages: state.controller.history(id)?,
    }))
}

/// POST /sessions/{id}/messages - ask a typed question.
pub async fn ask(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Result<Json<AskRequest>, JsonRejection>,
) -> Result<Json<TextExchange>, ApiError> {
    let Json(body) = body?;
    Ok(Json(
        state
            .controller
            .handle_text_question(id, &body.question)
            .await?,
    ))
}

/// POST /sessions/{id}/voice - push-to-talk upload; the body is raw audio.
pub async fn voice(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<VoiceResponse>, ApiError> {
    let body = body?;
    let mime = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::BadRequest("Content-Type header is required".to_string()))?;

    let exchange = state
        .controller
        .handle_voice_question(id, &body, mime)
        .await?;
    Ok(Json(VoiceResponse {
        audio_url: format!("/audio/{}", exchange.audio.id),
        question: exchange.question,
        response: exchange.response,
        download_name: exchange.download_name,
        audio: exchange.audio,
    }))
}

/// GET /audio/{id} - download synthesized speech as an attachment.
pub async fn audio(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let (artifact, bytes) = state.controller.audio(id).await?;
    let disposition = format!("attachment; filename=\"{}\"", artifact.download_name());
    Ok((
        [
            (header::CONTENT_TYPE, artifact.mime.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}
