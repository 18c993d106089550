//! Attendance statistics endpoints

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use rollcall_common::auth::Role;
use rollcall_common::db::{Class, StudentAttendanceEntry};
use serde::Serialize;

use super::auth::{require_self_or_admin, CurrentPrincipal};
use crate::services::{authorize_class, ClassStats};
use crate::{ApiResult, AppState};

/// Class listing entry for a faculty dashboard
#[derive(Debug, Serialize)]
pub struct ClassSummary {
    pub id: i64,
    pub title: String,
    pub course_code: Option<String>,
}

impl From<Class> for ClassSummary {
    fn from(class: Class) -> Self {
        Self {
            id: class.id,
            title: class.title,
            course_code: class.course_code,
        }
    }
}

/// GET /api/classes/:class_id/stats
pub async fn class_stats(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(class_id): Path<i64>,
) -> ApiResult<Json<ClassStats>> {
    let class = state.roster.get_class(class_id).await?;
    authorize_class(&principal, &class)?;
    Ok(Json(state.stats.class_stats(class_id).await?))
}

/// GET /api/faculty/:faculty_id/classes
pub async fn faculty_classes(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(faculty_id): Path<String>,
) -> ApiResult<Json<Vec<ClassSummary>>> {
    require_self_or_admin(&principal, Role::Faculty, &faculty_id)?;
    let classes = state.roster.classes_for_faculty(&faculty_id).await?;
    Ok(Json(classes.into_iter().map(ClassSummary::from).collect()))
}

/// GET /api/faculty/:faculty_id/classes/stats
pub async fn faculty_class_stats(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(faculty_id): Path<String>,
) -> ApiResult<Json<Vec<ClassStats>>> {
    require_self_or_admin(&principal, Role::Faculty, &faculty_id)?;
    Ok(Json(state.stats.faculty_class_stats(&faculty_id).await?))
}

/// GET /api/students/:enrollment_no/attendance
pub async fn student_history(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(enrollment_no): Path<String>,
) -> ApiResult<Json<Vec<StudentAttendanceEntry>>> {
    require_self_or_admin(&principal, Role::Student, &enrollment_no)?;
    Ok(Json(state.stats.student_history(&enrollment_no).await?))
}

pub fn stats_routes() -> Router<AppState> {
    Router::new()
        .route("/api/classes/:class_id/stats", get(class_stats))
        .route("/api/faculty/:faculty_id/classes", get(faculty_classes))
        .route("/api/faculty/:faculty_id/classes/stats", get(faculty_class_stats))
        .route("/api/students/:enrollment_no/attendance", get(student_history))
}
