use super::state::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Serialize;
use tracing::{error, info};

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ControlResponse {
    pub status: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /voice/start
/// Start the voice session
pub async fn start_session(State(state): State<AppState>) -> impl IntoResponse {
    if let Err(e) = state.session.test_connection() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )
            .into_response();
    }

    // One widget, one session: reject a start while one is live
    if state.session.state().await.is_active() {
        return (
            StatusCode::CONFLICT,
            Json(ErrorResponse {
                error: "a voice session is already active".to_string(),
            }),
        )
            .into_response();
    }

    info!("starting voice session via HTTP");

    if let Err(e) = state.session.start().await {
        error!("failed to start voice session: {:#}", e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: format!("Failed to start session: {}", e),
            }),
        )
            .into_response();
    }

    (
        StatusCode::OK,
        Json(ControlResponse {
            status: "connecting".to_string(),
            message: "Voice session starting".to_string(),
        }),
    )
        .into_response()
}

/// POST /voice/stop
/// Gracefully stop the voice session (idempotent)
pub async fn stop_session(State(state): State<AppState>) -> impl IntoResponse {
    info!("stopping voice session via HTTP");

    match state.session.stop().await {
        Ok(()) => (
            StatusCode::OK,
            Json(ControlResponse {
                status: "idle".to_string(),
                message: "Voice session stopped".to_string(),
            }),
        )
            .into_response(),
        Err(e) => {
            error!("failed to stop voice session: {:#}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: format!("Failed to stop session: {}", e),
                }),
            )
                .into_response()
        }
    }
}

/// POST /voice/force-stop
/// Reset state immediately and race the disconnect against its timeout
pub async fn force_stop_session(State(state): State<AppState>) -> impl IntoResponse {
    info!("force-stopping voice session via HTTP");

    // force_stop never fails; the state is already reset when it returns
    let _ = state.session.force_stop().await;

    (
        StatusCode::OK,
        Json(ControlResponse {
            status: "idle".to_string(),
            message: "Voice session force-stopped".to_string(),
        }),
    )
        .into_response()
}

/// GET /voice/status
/// Current observable session state
pub async fn get_status(State(state): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, Json(state.session.state().await)).into_response()
}

/// GET /voice/transcript
/// Transcript accumulated so far
pub async fn get_transcript(State(state): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, Json(state.session.transcript().await)).into_response()
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
