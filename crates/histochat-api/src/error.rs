//! API error types and JSON error response formatting.
//!
//! Collaborator failures (graph, model, speech services) reach the client
//! only as a generic "operation failed"; the cause is logged.

use axum::extract::rejection::{BytesRejection, JsonRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use histochat_chat::ChatError;
use histochat_voice::VoiceError;
use serde::{Deserialize, Serialize};

/// User-visible message for any collaborator failure.
pub const OPERATION_FAILED: &str = "operation failed";

/// JSON error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Machine-readable error code (e.g., "bad_request", "not_found").
    pub error: String,
    /// Human-readable error message.
    pub message: String,
}

/// API error type that maps to HTTP status codes and JSON responses.
#[derive(Debug)]
pub enum ApiError {
    /// 400 Bad Request - missing or invalid input.
    BadRequest(String),
    /// 404 Not Found - unknown session or audio artifact.
    NotFound(String),
    /// 413 Payload Too Large - request body over the route's limit.
    PayloadTooLarge(String),
    /// 500 Internal Server Error - unexpected server error.
    Internal(String),
    /// 502 Bad Gateway - a collaborator failed.
    BadGateway,
    /// 503 Service Unavailable - feature switched off.
    ServiceUnavailable(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::PayloadTooLarge(msg) => {
                (StatusCode::PAYLOAD_TOO_LARGE, "payload_too_large", msg)
            }
            ApiError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg)
            }
            ApiError::BadGateway => (
                StatusCode::BAD_GATEWAY,
                "operation_failed",
                OPERATION_FAILED.to_string(),
            ),
            ApiError::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable", msg)
            }
        };

        let body = ErrorBody {
            error: error_code.to_string(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        if err.is_collaborator_failure() {
            tracing::error!(error = %err, "Collaborator failure");
            return ApiError::BadGateway;
        }
        match err {
            ChatError::EmptyMessage | ChatError::MessageTooLong(_) | ChatError::NoSpeech => {
                ApiError::BadRequest(err.to_string())
            }
            ChatError::SessionNotFound(_) => ApiError::NotFound(err.to_string()),
            ChatError::VoiceDisabled => ApiError::ServiceUnavailable(err.to_string()),
            ChatError::Voice(VoiceError::NotFound(_)) => ApiError::NotFound(err.to_string()),
            ChatError::Voice(VoiceError::AudioTooLarge { .. }) => {
                ApiError::PayloadTooLarge(err.to_string())
            }
            ChatError::Voice(VoiceError::EmptyAudio | VoiceError::UnsupportedFormat(_)) => {
                ApiError::BadRequest(err.to_string())
            }
            other => {
                tracing::error!(error = %other, "Unexpected chat error");
                ApiError::Internal("internal error".to_string())
            }
        }
    }
}

impl ApiError {
    /// Map an extractor rejection onto the JSON error body.
    fn from_rejection(status: StatusCode, message: String) -> Self {
        if status == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge(message)
        } else {
            ApiError::BadRequest(message)
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::from_rejection(rejection.status(), rejection.body_text())
    }
}

impl From<BytesRejection> for ApiError {
    fn from(rejection: BytesRejection) -> Self {
        Self::from_rejection(rejection.status(), rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use histochat_chat::ChatError;
    use uuid::Uuid;

    fn status_of(err: ChatError) -> StatusCode {
        ApiError::from(err).into_response().status()
    }

    #[test]
    fn test_chat_error_status_mapping() {
        assert_eq!(status_of(ChatError::EmptyMessage), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(ChatError::MessageTooLong(10)), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(ChatError::NoSpeech), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_of(ChatError::SessionNotFound(Uuid::nil())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(ChatError::Voice(VoiceError::NotFound(Uuid::nil()))),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(ChatError::Voice(VoiceError::AudioTooLarge { size: 2, max: 1 })),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            status_of(ChatError::Voice(VoiceError::UnsupportedFormat("x".to_string()))),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_of(ChatError::VoiceDisabled), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            status_of(ChatError::Internal("poisoned".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_rejection_status_mapping() {
        let too_large = ApiError::from_rejection(StatusCode::PAYLOAD_TOO_LARGE, "big".to_string());
        assert_eq!(too_large.into_response().status(), StatusCode::PAYLOAD_TOO_LARGE);
        let unprocessable =
            ApiError::from_rejection(StatusCode::UNPROCESSABLE_ENTITY, "missing field".to_string());
        assert!(matches!(unprocessable, ApiError::BadRequest(ref m) if m == "missing field"));
    }

    #[test]
    fn test_collaborator_failures_are_bad_gateway() {
        assert_eq!(
            status_of(ChatError::Voice(VoiceError::Transcription("500".to_string()))),
            StatusCode::BAD_GATEWAY
        );
        assert!(matches!(
            ApiError::from(ChatError::Voice(VoiceError::Synthesis("quota".to_string()))),
            ApiError::BadGateway
        ));
    }
}
