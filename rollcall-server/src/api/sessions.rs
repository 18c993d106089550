//! Session endpoints
//!
//! - `GET /api/sessions/eligible`: sessions open right now (public)
//! - `POST /api/sessions`: schedule a session (faculty owner or admin)
//! - `DELETE /api/sessions/:session_id`: delete with attendance (admin)
//! - `GET /api/sessions/:session_id/faculty-contact`: owning faculty (public)

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use rollcall_common::db::{EligibleSession, FacultyContact, Session};
use rollcall_common::time::parse_timestamp;
use serde::Deserialize;
use tracing::info;

use super::auth::{require_admin, CurrentPrincipal};
use super::StatusResponse;
use crate::{ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub class_id: i64,
    /// RFC 3339, or naive `YYYY-MM-DDTHH:MM[:SS]` taken as UTC
    pub start_time: String,
    pub end_time: String,
}

/// GET /api/sessions/eligible
pub async fn list_eligible_sessions(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<EligibleSession>>> {
    let now = state.clock.now();
    let sessions = state.registry.list_eligible(now).await?;
    Ok(Json(sessions))
}

/// POST /api/sessions
pub async fn create_session(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Json(request): Json<CreateSessionRequest>,
) -> ApiResult<(StatusCode, Json<Session>)> {
    let start_time = parse_timestamp(&request.start_time)?;
    let end_time = parse_timestamp(&request.end_time)?;

    let session = state
        .scheduler
        .schedule(&principal, request.class_id, start_time, end_time)
        .await?;

    info!(
        session_id = session.id,
        class_id = session.class_id,
        by = principal.id(),
        "Session scheduled"
    );

    Ok((StatusCode::CREATED, Json(session)))
}

/// DELETE /api/sessions/:session_id
pub async fn delete_session(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(session_id): Path<i64>,
) -> ApiResult<Json<StatusResponse>> {
    require_admin(&principal)?;
    state.registry.delete_session(session_id).await?;
    Ok(Json(StatusResponse::ok(format!(
        "Session {} and its attendance deleted",
        session_id
    ))))
}

/// GET /api/sessions/:session_id/faculty-contact
pub async fn faculty_contact(
    State(state): State<AppState>,
    Path(session_id): Path<i64>,
) -> ApiResult<Json<FacultyContact>> {
    Ok(Json(state.roster.faculty_contact(session_id).await?))
}

pub fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/eligible", get(list_eligible_sessions))
        .route("/api/sessions/:session_id", delete(delete_session))
        .route("/api/sessions/:session_id/faculty-contact", get(faculty_contact))
}
