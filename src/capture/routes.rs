/*!
 * SBI capture HTTP surface
 */

use super::session::{CaptureError, CaptureSession, Modality};
use crate::error::{ApiError, ApiResult, ErrorCode};
use crate::server::AppState;
use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;

const INVALID_SESSION: ErrorCode = ErrorCode {
    code: "MOS-SBI-100",
    message: "Invalid capture session request",
};

const INVALID_SUB_TYPE: ErrorCode = ErrorCode {
    code: "MOS-SBI-101",
    message: "Invalid bio sub type",
};

fn default_score() -> f32 {
    80.0
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitRequest {
    pub modality: Modality,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub profile: Option<String>,
    #[serde(default)]
    pub exceptions: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureRequest {
    /// Sub-samples to capture; all of the modality when empty
    #[serde(default)]
    pub bio_sub_type: Vec<String>,
    #[serde(default = "default_score")]
    pub requested_score: f32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub captured: Option<Vec<String>>,
    #[serde(flatten)]
    pub session: CaptureSession,
}

impl From<CaptureError> for ApiError {
    fn from(e: CaptureError) -> Self {
        match e {
            CaptureError::SessionNotFound(id) => ApiError::NotFound(format!("Capture session {id}")),
            e @ CaptureError::UnknownSample { .. } => ApiError::invalid(INVALID_SUB_TYPE, e.to_string()),
            e @ CaptureError::InvalidProfile(_) => ApiError::invalid(INVALID_SESSION, e.to_string()),
        }
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sbi/sessions", post(init_session))
        .route(
            "/sbi/sessions/:id",
            get(get_session).delete(remove_session),
        )
        .route("/sbi/sessions/:id/capture", post(capture))
}

async fn init_session(
    State(state): State<AppState>,
    payload: Result<Json<InitRequest>, JsonRejection>,
) -> ApiResult<Json<SessionView>> {
    let Json(request) = payload.map_err(|e| ApiError::invalid(INVALID_SESSION, e.body_text()))?;
    let capture = &state.capture;

    let profile = request
        .profile
        .filter(|p| !p.trim().is_empty())
        .unwrap_or_else(|| capture.default_profile.clone());
    capture.profiles.profile(&profile)?;
    let session = CaptureSession::new(request.modality, profile, request.exceptions)?;

    let session_id = request
        .session_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| capture.sessions.next_id());

    info!(%session_id, modality = ?session.modality, profile = %session.profile, "Capture session initialised");
    capture.sessions.init(session_id.clone(), session.clone());

    Ok(Json(SessionView {
        session_id,
        captured: None,
        session,
    }))
}

async fn get_session(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<SessionView>> {
    let session = state
        .capture
        .sessions
        .get(&id)
        .ok_or_else(|| CaptureError::SessionNotFound(id.clone()))?;

    Ok(Json(SessionView {
        session_id: id,
        captured: None,
        session,
    }))
}

/// An empty body captures every sub-sample at the default score.
async fn capture(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<Json<SessionView>> {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        CaptureRequest {
            bio_sub_type: Vec::new(),
            requested_score: default_score(),
        }
    } else {
        serde_json::from_slice(&body).map_err(|e| ApiError::invalid(INVALID_SESSION, e.to_string()))?
    };
    let capture = &state.capture;

    let profile_name = capture
        .sessions
        .get(&id)
        .ok_or_else(|| CaptureError::SessionNotFound(id.clone()))?
        .profile;
    let profile = capture.profiles.profile(&profile_name)?;

    let (captured, session) =
        capture
            .sessions
            .capture(&id, &request.bio_sub_type, request.requested_score, &profile)?;

    info!(session_id = %id, captured = captured.len(), completed = session.completed, "Capture finished");
    Ok(Json(SessionView {
        session_id: id,
        captured: Some(captured),
        session,
    }))
}

async fn remove_session(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<String> {
    if !state.capture.sessions.remove(&id) {
        return Err(CaptureError::SessionNotFound(id).into());
    }
    info!(session_id = %id, "Capture session removed");
    Ok(format!("Successfully removed session {id}"))
}
