use super::state::AppState;
use crate::session::{SessionState, SessionStats};
use crate::stream::EmotionReading;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SetRecordingRequest {
    pub recording: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RecordingResponse {
    pub screen_id: String,
    pub state: SessionState,
    pub is_recording: bool,
    pub permission_granted: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EmotionsResponse {
    pub current: Option<EmotionReading>,
    /// Newest first
    pub history: Vec<EmotionReading>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn not_found(screen_id: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: format!("Screen {} has no session", screen_id),
        }),
    )
        .into_response()
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /screens/:screen_id/recording
/// Turn recording on or off for a screen's session
pub async fn set_recording(
    State(state): State<AppState>,
    Path(screen_id): Path<String>,
    Json(req): Json<SetRecordingRequest>,
) -> impl IntoResponse {
    let session = if req.recording {
        match state.session_or_create(&screen_id).await {
            Ok(session) => session,
            Err(e) => {
                error!("Failed to create session for screen {}: {:#}", screen_id, e);
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse {
                        error: format!("Failed to create session: {:#}", e),
                    }),
                )
                    .into_response();
            }
        }
    } else {
        match state.session(&screen_id).await {
            Some(session) => session,
            None => return not_found(&screen_id),
        }
    };

    info!("Screen {}: recording -> {}", screen_id, req.recording);

    let session_state = session.set_recording(req.recording).await;

    (
        StatusCode::OK,
        Json(RecordingResponse {
            screen_id,
            state: session_state,
            is_recording: session.is_recording(),
            permission_granted: session.permission_granted(),
        }),
    )
        .into_response()
}

/// POST /screens/:screen_id/capture
/// Capture and send one frame now
pub async fn capture_now(
    State(state): State<AppState>,
    Path(screen_id): Path<String>,
) -> impl IntoResponse {
    match state.session(&screen_id).await {
        Some(session) => {
            let outcome = session.capture_now().await;
            (StatusCode::OK, Json(outcome)).into_response()
        }
        None => not_found(&screen_id),
    }
}

/// GET /screens/:screen_id/status
pub async fn get_status(
    State(state): State<AppState>,
    Path(screen_id): Path<String>,
) -> impl IntoResponse {
    match state.session(&screen_id).await {
        Some(session) => {
            let stats: SessionStats = session.stats().await;
            (StatusCode::OK, Json(stats)).into_response()
        }
        None => not_found(&screen_id),
    }
}

/// GET /screens/:screen_id/emotions
/// Current emotion and newest-first history
pub async fn get_emotions(
    State(state): State<AppState>,
    Path(screen_id): Path<String>,
) -> impl IntoResponse {
    match state.session(&screen_id).await {
        Some(session) => {
            let history = session.history().await;
            let response = EmotionsResponse {
                current: history.current().cloned(),
                history: history.entries().cloned().collect(),
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        None => not_found(&screen_id),
    }
}

/// DELETE /screens/:screen_id
/// Tear down a screen's session
pub async fn close_session(
    State(state): State<AppState>,
    Path(screen_id): Path<String>,
) -> impl IntoResponse {
    match state.remove(&screen_id).await {
        Some(session) => {
            info!("Session closed for screen {}", screen_id);
            (StatusCode::OK, Json(session.stats().await)).into_response()
        }
        None => not_found(&screen_id),
    }
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
