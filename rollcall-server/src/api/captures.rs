//! Capture submission and prediction log endpoints
//!
//! `POST /api/sessions/:session_id/captures` takes a multipart body with a
//! single `image` field. The session comes from the path only; a
//! `session_id` form field is rejected rather than silently ignored.

use axum::{
    extract::{Multipart, Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use rollcall_common::db::PredictionLogEntry;
use serde::{Deserialize, Serialize};

use super::auth::{require_admin, CurrentPrincipal};
use crate::db;
use crate::services::{CaptureOutcome, RecordOutcome};
use crate::{ApiError, ApiResult, AppState};

const DEFAULT_PREDICTION_LIMIT: i64 = 100;
const MAX_PREDICTION_LIMIT: i64 = 1000;

/// Body of a capture response
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum CaptureResponse {
    Matched {
        #[serde(rename = "match")]
        matched: bool,
        enrollment_no: String,
        score: f64,
        recorded: RecordOutcome,
    },
    NoMatch {
        #[serde(rename = "match")]
        matched: bool,
        best_score: Option<f64>,
    },
}

impl From<CaptureOutcome> for CaptureResponse {
    fn from(outcome: CaptureOutcome) -> Self {
        match outcome {
            CaptureOutcome::Recorded {
                enrollment_no,
                score,
                outcome,
            } => CaptureResponse::Matched {
                matched: true,
                enrollment_no,
                score,
                recorded: outcome,
            },
            CaptureOutcome::NoMatch { best_score } => CaptureResponse::NoMatch {
                matched: false,
                best_score,
            },
        }
    }
}

/// POST /api/sessions/:session_id/captures
pub async fn submit_capture(
    State(state): State<AppState>,
    Path(session_id): Path<i64>,
    mut multipart: Multipart,
) -> ApiResult<Json<CaptureResponse>> {
    let image = read_image_field(&mut multipart, state.max_image_bytes).await?;

    tracing::debug!(session_id, image_bytes = image.len(), "Capture received");

    let outcome = state.capture.submit_capture(session_id, &image).await?;
    Ok(Json(outcome.into()))
}

async fn read_image_field(multipart: &mut Multipart, max_image_bytes: usize) -> ApiResult<Vec<u8>> {
    let mut image = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        match field.name() {
            Some("image") => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Failed to read image: {}", e)))?;
                if bytes.len() > max_image_bytes {
                    return Err(ApiError::BadRequest(format!(
                        "Image exceeds {} bytes",
                        max_image_bytes
                    )));
                }
                image = Some(bytes.to_vec());
            }
            Some("session_id") => {
                return Err(ApiError::BadRequest(
                    "session_id is taken from the URL path only".to_string(),
                ));
            }
            _ => {}
        }
    }

    image.ok_or_else(|| ApiError::BadRequest("Missing multipart field 'image'".to_string()))
}

#[derive(Debug, Deserialize)]
pub struct PredictionQuery {
    pub session_id: Option<i64>,
    pub limit: Option<i64>,
}

/// GET /api/predictions
pub async fn list_predictions(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Query(query): Query<PredictionQuery>,
) -> ApiResult<Json<Vec<PredictionLogEntry>>> {
    require_admin(&principal)?;

    let limit = query
        .limit
        .unwrap_or(DEFAULT_PREDICTION_LIMIT)
        .clamp(1, MAX_PREDICTION_LIMIT);

    let entries = db::predictions::list_recent(&state.db, query.session_id, limit).await?;
    Ok(Json(entries))
}

pub fn capture_routes() -> Router<AppState> {
    Router::new()
        .route("/api/sessions/:session_id/captures", post(submit_capture))
        .route("/api/predictions", get(list_predictions))
}
