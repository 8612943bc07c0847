use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;

use super::AppState;
use crate::{
    error::{AppError, Result},
    models::ApiResponse,
    services::realtime::SyncMessage,
};

const MAX_SESSION_ID_LEN: usize = 64;

#[derive(Debug, Serialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub peers: usize,
    pub state: Vec<SyncMessage>,
}

/// Session ids are path segments shared by every peer; keep them boring.
pub fn validate_session_id(session_id: &str) -> Result<()> {
    let valid = !session_id.is_empty()
        && session_id.len() <= MAX_SESSION_ID_LEN
        && session_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid {
        return Err(AppError::BadRequest(format!("Invalid session id: {}", session_id)));
    }
    Ok(())
}

/// GET /api/v1/sessions/{session_id}
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<ApiResponse<SessionSnapshot>>> {
    validate_session_id(&session_id)?;
    let session = state
        .hub
        .find(&session_id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("session {}", session_id)))?;
    Ok(Json(ApiResponse::success(SessionSnapshot {
        session_id,
        peers: session.peer_count(),
        state: session.snapshot().await,
    })))
}
