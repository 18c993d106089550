//! Capture Workflow
//!
//! One submitted capture: gateway match, roster confirmation, idempotent
//! record. Every attempt that reaches a verdict is written to the prediction
//! log; a log write failure is reported but never fails the capture.

use rollcall_common::db::{NewPrediction, PredictionStatus};
use rollcall_common::Clock;
use serde::Serialize;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{info, warn};

use crate::db;
use crate::error::{CoreError, CoreResult};
use crate::services::attendance_recorder::{AttendanceRecorder, RecordOutcome};
use crate::services::face_gateway::{FaceMatchGateway, MatchResult};

/// Result of one capture
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CaptureOutcome {
    Recorded {
        enrollment_no: String,
        score: f64,
        outcome: RecordOutcome,
    },
    NoMatch {
        best_score: Option<f64>,
    },
}

pub struct CaptureWorkflow {
    db: SqlitePool,
    clock: Arc<dyn Clock>,
    gateway: Arc<FaceMatchGateway>,
    recorder: Arc<AttendanceRecorder>,
}

impl CaptureWorkflow {
    pub fn new(
        db: SqlitePool,
        clock: Arc<dyn Clock>,
        gateway: Arc<FaceMatchGateway>,
        recorder: Arc<AttendanceRecorder>,
    ) -> Self {
        Self {
            db,
            clock,
            gateway,
            recorder,
        }
    }

    pub async fn submit_capture(&self, session_id: i64, image: &[u8]) -> CoreResult<CaptureOutcome> {
        let matched = match self.gateway.match_face(image, session_id).await {
            Ok(result) => result,
            Err(e @ CoreError::NotEligible { .. }) => {
                let (logged_session, note) = self.session_ref(session_id).await;
                self.log_attempt(
                    logged_session,
                    None,
                    None,
                    PredictionStatus::NotEligible,
                    note.as_deref(),
                )
                .await;
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        let (enrollment_no, score) = match matched {
            MatchResult::Matched {
                enrollment_no,
                score,
            } => (enrollment_no, score),
            MatchResult::NoMatch { best_score } => {
                self.log_attempt(
                    Some(session_id),
                    None,
                    best_score,
                    PredictionStatus::NoMatch,
                    None,
                )
                .await;
                return Ok(CaptureOutcome::NoMatch { best_score });
            }
        };

        // Fresh read: the window may have closed while the matcher was working
        let now = self.clock.now();
        match self.recorder.record(session_id, &enrollment_no, score, now).await {
            Ok(outcome) => {
                self.log_attempt(
                    Some(session_id),
                    Some(&enrollment_no),
                    Some(score),
                    PredictionStatus::Match,
                    Some(outcome.as_str()),
                )
                .await;
                Ok(CaptureOutcome::Recorded {
                    enrollment_no,
                    score,
                    outcome,
                })
            }
            Err(CoreError::NotFound(_)) => {
                info!(session_id, candidate = %enrollment_no, "Matcher candidate not on roster");
                self.log_attempt(
                    Some(session_id),
                    None,
                    Some(score),
                    PredictionStatus::UnknownStudent,
                    Some(&format!("candidate {} not on roster", enrollment_no)),
                )
                .await;
                Ok(CaptureOutcome::NoMatch {
                    best_score: Some(score),
                })
            }
            Err(e @ CoreError::NotEligible { .. }) => {
                let (logged_session, note) = self.session_ref(session_id).await;
                self.log_attempt(
                    logged_session,
                    None,
                    Some(score),
                    PredictionStatus::NotEligible,
                    Some(note.as_deref().unwrap_or("window closed before record")),
                )
                .await;
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Session reference for a NotEligible log row
    ///
    /// A session that no longer exists is logged without an id, with the
    /// requested id kept in the note.
    async fn session_ref(&self, session_id: i64) -> (Option<i64>, Option<String>) {
        match db::sessions::get_session(&self.db, session_id).await {
            Ok(None) => (None, Some(format!("session {} does not exist", session_id))),
            _ => (Some(session_id), None),
        }
    }

    async fn log_attempt(
        &self,
        session_id: Option<i64>,
        predicted_enrollment: Option<&str>,
        confidence: Option<f64>,
        status: PredictionStatus,
        note: Option<&str>,
    ) {
        let entry = NewPrediction {
            attempted_at: self.clock.now(),
            session_id,
            predicted_enrollment: predicted_enrollment.map(str::to_string),
            confidence,
            status,
            note: note.map(str::to_string),
        };

        if let Err(e) = db::predictions::insert_prediction(&self.db, &entry).await {
            warn!(?session_id, status = status.as_str(), error = %e, "Failed to write prediction log");
        }
    }
}
