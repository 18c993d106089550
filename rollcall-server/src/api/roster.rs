//! Roster administration endpoints
//!
//! Students, faculty and classes. Writes are admin-only; a student or faculty
//! member may read their own record, and a faculty member their own classes.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Utc};
use rollcall_common::auth::Role;
use rollcall_common::db::{
    Class, ClassUpdate, Faculty, FacultyUpdate, NewClass, NewFaculty, NewStudent, Student,
    StudentUpdate,
};
use rollcall_common::time::canonical;
use serde::{Deserialize, Serialize};

use super::auth::{require_admin, require_self_or_admin, CurrentPrincipal};
use super::StatusResponse;
use crate::services::{authorize_class, Enrollment};
use crate::{ApiError, ApiResult, AppState};

/// Student as exposed over HTTP; the template handle stays server-side
#[derive(Debug, Serialize)]
pub struct StudentView {
    pub enrollment_no: String,
    pub name: String,
    pub semester: String,
    pub face_registered: bool,
    #[serde(with = "canonical")]
    pub created_at: DateTime<Utc>,
}

impl From<Student> for StudentView {
    fn from(student: Student) -> Self {
        Self {
            face_registered: student.face_registered(),
            enrollment_no: student.enrollment_no,
            name: student.name,
            semester: student.semester,
            created_at: student.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct EnrollStudentRequest {
    pub enrollment_no: String,
    pub name: String,
    pub semester: String,
    #[serde(default)]
    pub password: Option<String>,
    /// Face image for registration with the matcher
    #[serde(default)]
    pub image_base64: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateFacultyRequest {
    #[serde(flatten)]
    pub faculty: NewFaculty,
    #[serde(default)]
    pub password: Option<String>,
}

// ============================================================================
// Students
// ============================================================================

/// GET /api/students
pub async fn list_students(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
) -> ApiResult<Json<Vec<StudentView>>> {
    require_admin(&principal)?;
    let students = state.roster.list_students().await?;
    Ok(Json(students.into_iter().map(StudentView::from).collect()))
}

/// POST /api/students
///
/// Upserts the student; a matcher failure during face registration is logged
/// and reported through `face_registered: false`.
pub async fn enroll_student(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Json(request): Json<EnrollStudentRequest>,
) -> ApiResult<(StatusCode, Json<StudentView>)> {
    require_admin(&principal)?;

    let image = match request.image_base64.as_deref().map(str::trim) {
        Some(encoded) if !encoded.is_empty() => {
            let bytes = general_purpose::STANDARD
                .decode(encoded)
                .map_err(|e| ApiError::BadRequest(format!("image_base64 is not valid base64: {}", e)))?;
            if bytes.len() > state.max_image_bytes {
                return Err(ApiError::BadRequest(format!(
                    "Image exceeds {} bytes",
                    state.max_image_bytes
                )));
            }
            Some(bytes)
        }
        _ => None,
    };

    let student = state
        .roster
        .enroll_student(Enrollment {
            student: NewStudent {
                enrollment_no: request.enrollment_no,
                name: request.name,
                semester: request.semester,
                face_template_ref: None,
            },
            password: request.password,
            image,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(student.into())))
}

/// GET /api/students/:enrollment_no
pub async fn get_student(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(enrollment_no): Path<String>,
) -> ApiResult<Json<StudentView>> {
    require_self_or_admin(&principal, Role::Student, &enrollment_no)?;
    Ok(Json(state.roster.get_student(&enrollment_no).await?.into()))
}

/// PUT /api/students/:enrollment_no
pub async fn update_student(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(enrollment_no): Path<String>,
    Json(update): Json<StudentUpdate>,
) -> ApiResult<Json<StudentView>> {
    require_admin(&principal)?;
    Ok(Json(
        state.roster.update_student(&enrollment_no, update).await?.into(),
    ))
}

/// DELETE /api/students/:enrollment_no
pub async fn delete_student(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(enrollment_no): Path<String>,
) -> ApiResult<Json<StatusResponse>> {
    require_admin(&principal)?;
    state.roster.delete_student(&enrollment_no).await?;
    Ok(Json(StatusResponse::ok(format!(
        "Student {} deleted",
        enrollment_no
    ))))
}

// ============================================================================
// Faculty
// ============================================================================

/// GET /api/faculty
pub async fn list_faculty(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
) -> ApiResult<Json<Vec<Faculty>>> {
    require_admin(&principal)?;
    Ok(Json(state.roster.list_faculty().await?))
}

/// POST /api/faculty
pub async fn create_faculty(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Json(request): Json<CreateFacultyRequest>,
) -> ApiResult<(StatusCode, Json<Faculty>)> {
    require_admin(&principal)?;
    let faculty = state
        .roster
        .create_faculty(request.faculty, request.password)
        .await?;
    Ok((StatusCode::CREATED, Json(faculty)))
}

/// GET /api/faculty/:faculty_id
pub async fn get_faculty(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(faculty_id): Path<String>,
) -> ApiResult<Json<Faculty>> {
    require_self_or_admin(&principal, Role::Faculty, &faculty_id)?;
    Ok(Json(state.roster.get_faculty(&faculty_id).await?))
}

/// PUT /api/faculty/:faculty_id
pub async fn update_faculty(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(faculty_id): Path<String>,
    Json(update): Json<FacultyUpdate>,
) -> ApiResult<Json<Faculty>> {
    require_admin(&principal)?;
    Ok(Json(state.roster.update_faculty(&faculty_id, update).await?))
}

/// DELETE /api/faculty/:faculty_id
pub async fn delete_faculty(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(faculty_id): Path<String>,
) -> ApiResult<Json<StatusResponse>> {
    require_admin(&principal)?;
    state.roster.delete_faculty(&faculty_id).await?;
    Ok(Json(StatusResponse::ok(format!(
        "Faculty {} deleted with their classes",
        faculty_id
    ))))
}

// ============================================================================
// Classes
// ============================================================================

/// GET /api/classes
pub async fn list_classes(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
) -> ApiResult<Json<Vec<Class>>> {
    require_admin(&principal)?;
    Ok(Json(state.roster.list_classes().await?))
}

/// POST /api/classes
pub async fn create_class(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Json(request): Json<NewClass>,
) -> ApiResult<(StatusCode, Json<Class>)> {
    require_admin(&principal)?;
    let class = state.roster.create_class(request).await?;
    Ok((StatusCode::CREATED, Json(class)))
}

/// GET /api/classes/:class_id
pub async fn get_class(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(class_id): Path<i64>,
) -> ApiResult<Json<Class>> {
    let class = state.roster.get_class(class_id).await?;
    authorize_class(&principal, &class)?;
    Ok(Json(class))
}

/// PUT /api/classes/:class_id
pub async fn update_class(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(class_id): Path<i64>,
    Json(update): Json<ClassUpdate>,
) -> ApiResult<Json<Class>> {
    require_admin(&principal)?;
    Ok(Json(state.roster.update_class(class_id, update).await?))
}

/// DELETE /api/classes/:class_id
pub async fn delete_class(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(class_id): Path<i64>,
) -> ApiResult<Json<StatusResponse>> {
    require_admin(&principal)?;
    state.roster.delete_class(class_id).await?;
    Ok(Json(StatusResponse::ok(format!(
        "Class {} deleted with its sessions and attendance",
        class_id
    ))))
}

pub fn roster_routes() -> Router<AppState> {
    Router::new()
        .route("/api/students", get(list_students).post(enroll_student))
        .route(
            "/api/students/:enrollment_no",
            get(get_student).put(update_student).delete(delete_student),
        )
        .route("/api/faculty", get(list_faculty).post(create_faculty))
        .route(
            "/api/faculty/:faculty_id",
            get(get_faculty).put(update_faculty).delete(delete_faculty),
        )
        .route("/api/classes", get(list_classes).post(create_class))
        .route(
            "/api/classes/:class_id",
            get(get_class).put(update_class).delete(delete_class),
        )
}
