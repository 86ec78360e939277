//! Per-session control surface (§6): start/pause/resume/stop, `set_speed`,
//! `go_back`, `get_state`, `delete_session`.

use axum::extract::{Path, State as AxumState};
use axum::http::StatusCode;
use axum::response::Json;
use serde::{Deserialize, Serialize};

use crate::errors::ControlError;
use crate::models::SessionStateView;

use super::state::AppState;

fn control_error_status(err: &ControlError) -> StatusCode {
    match err {
        ControlError::UnknownSession { .. } => StatusCode::NOT_FOUND,
        ControlError::RewindUnsupported => StatusCode::CONFLICT,
        ControlError::InvalidSpeed { .. } => StatusCode::BAD_REQUEST,
    }
}

#[derive(Debug, Serialize)]
pub struct ControlErrorBody {
    pub error: String,
}

fn control_error_response(err: ControlError) -> (StatusCode, Json<ControlErrorBody>) {
    let status = control_error_status(&err);
    (status, Json(ControlErrorBody { error: err.to_string() }))
}

fn session_or_create(state: &AppState, session_id: &str) -> std::sync::Arc<crate::session::SessionHandle> {
    match state.sessions.get_session(session_id) {
        Some(handle) => handle,
        None => state.sessions.create_session(session_id.to_string()),
    }
}

pub async fn start_session(
    AxumState(state): AxumState<AppState>,
    Path(session_id): Path<String>,
) -> Json<SessionStateView> {
    let handle = session_or_create(&state, &session_id);
    handle.start();
    Json(handle.get_state())
}

pub async fn pause_session(
    AxumState(state): AxumState<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionStateView>, (StatusCode, Json<ControlErrorBody>)> {
    let handle = state
        .sessions
        .get_session(&session_id)
        .ok_or_else(|| control_error_response(ControlError::UnknownSession { session_id: session_id.clone() }))?;
    handle.pause();
    Ok(Json(handle.get_state()))
}

pub async fn resume_session(
    AxumState(state): AxumState<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionStateView>, (StatusCode, Json<ControlErrorBody>)> {
    let handle = state
        .sessions
        .get_session(&session_id)
        .ok_or_else(|| control_error_response(ControlError::UnknownSession { session_id: session_id.clone() }))?;
    handle.resume();
    Ok(Json(handle.get_state()))
}

pub async fn stop_session(
    AxumState(state): AxumState<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionStateView>, (StatusCode, Json<ControlErrorBody>)> {
    let handle = state
        .sessions
        .get_session(&session_id)
        .ok_or_else(|| control_error_response(ControlError::UnknownSession { session_id: session_id.clone() }))?;
    handle.stop();
    Ok(Json(handle.get_state()))
}

#[derive(Debug, Deserialize)]
pub struct SetSpeedRequest {
    /// Accepted loosely, matching the WS ingress contract: non-integer or
    /// missing values coerce to speed 1 rather than rejecting the request.
    pub speed: Option<serde_json::Value>,
}

/// Non-integer (or missing/non-numeric) values coerce to speed 1; integers
/// below 1 are clamped up to 1 by [`crate::session::SessionHandle::set_speed`].
pub fn coerce_speed(value: Option<&serde_json::Value>) -> u32 {
    match value.and_then(|v| v.as_f64()) {
        Some(v) if v.is_finite() && v.fract() == 0.0 => v.max(1.0) as u32,
        _ => 1,
    }
}

pub async fn set_speed(
    AxumState(state): AxumState<AppState>,
    Path(session_id): Path<String>,
    Json(req): Json<SetSpeedRequest>,
) -> Result<Json<SessionStateView>, (StatusCode, Json<ControlErrorBody>)> {
    let handle = state
        .sessions
        .get_session(&session_id)
        .ok_or_else(|| control_error_response(ControlError::UnknownSession { session_id: session_id.clone() }))?;
    let speed = coerce_speed(req.speed.as_ref());
    handle.set_speed(speed).map_err(control_error_response)?;
    Ok(Json(handle.get_state()))
}

#[derive(Debug, Deserialize)]
pub struct GoBackRequest {
    pub seconds: i64,
}

pub async fn go_back(
    AxumState(state): AxumState<AppState>,
    Path(session_id): Path<String>,
    Json(req): Json<GoBackRequest>,
) -> Result<Json<SessionStateView>, (StatusCode, Json<ControlErrorBody>)> {
    let handle = state
        .sessions
        .get_session(&session_id)
        .ok_or_else(|| control_error_response(ControlError::UnknownSession { session_id: session_id.clone() }))?;
    handle.go_back(req.seconds).map_err(control_error_response)?;
    Ok(Json(handle.get_state()))
}

pub async fn get_state(
    AxumState(state): AxumState<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionStateView>, (StatusCode, Json<ControlErrorBody>)> {
    let handle = state
        .sessions
        .get_session(&session_id)
        .ok_or_else(|| control_error_response(ControlError::UnknownSession { session_id: session_id.clone() }))?;
    Ok(Json(handle.get_state()))
}

pub async fn delete_session(
    AxumState(state): AxumState<AppState>,
    Path(session_id): Path<String>,
) -> Result<StatusCode, (StatusCode, Json<ControlErrorBody>)> {
    state.sessions.delete_session(&session_id).map_err(control_error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coerces_missing_non_numeric_and_non_integer_speed_to_one() {
        assert_eq!(coerce_speed(None), 1);
        assert_eq!(coerce_speed(Some(&serde_json::json!("fast"))), 1);
        assert_eq!(coerce_speed(Some(&serde_json::json!(4.6))), 1);
    }

    #[test]
    fn passes_through_valid_integer_speed() {
        assert_eq!(coerce_speed(Some(&serde_json::json!(5))), 5);
    }

    #[test]
    fn clamps_non_positive_integer_speed_to_one() {
        assert_eq!(coerce_speed(Some(&serde_json::json!(0))), 1);
        assert_eq!(coerce_speed(Some(&serde_json::json!(-3))), 1);
    }
}
