//! Attendance Recorder
//!
//! Sole writer of attendance rows. Each call re-checks eligibility against the
//! instant it is given, then performs one atomic insert-if-absent keyed on
//! (session_id, enrollment_no). Concurrent calls for the same key resolve to
//! exactly one `Created`; the rest observe `AlreadyRecorded`.

use chrono::{DateTime, Utc};
use rollcall_common::db::NewAttendance;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::db;
use crate::db::retry::retry_on_lock;
use crate::error::{CoreError, CoreResult};
use crate::services::session_registry::SessionRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordOutcome {
    Created,
    AlreadyRecorded,
}

impl RecordOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordOutcome::Created => "created",
            RecordOutcome::AlreadyRecorded => "already_recorded",
        }
    }
}

#[derive(Clone)]
pub struct AttendanceRecorder {
    db: SqlitePool,
    registry: SessionRegistry,
    max_lock_wait_ms: u64,
}

impl AttendanceRecorder {
    pub fn new(db: SqlitePool, registry: SessionRegistry, max_lock_wait_ms: u64) -> Self {
        Self {
            db,
            registry,
            max_lock_wait_ms,
        }
    }

    /// Record attendance for a matched student
    pub async fn record(
        &self,
        session_id: i64,
        enrollment_no: &str,
        score: f64,
        now: DateTime<Utc>,
    ) -> CoreResult<RecordOutcome> {
        if !score.is_finite() || !(0.0..=1.0).contains(&score) {
            return Err(CoreError::Validation(format!(
                "Confidence {} outside [0, 1]",
                score
            )));
        }

        if !self.registry.is_eligible(session_id, now).await?.is_eligible() {
            debug!(session_id, enrollment_no, "Record rejected: session not eligible");
            return Err(CoreError::NotEligible { session_id });
        }

        let student = db::roster::get_student(&self.db, enrollment_no)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Student {}", enrollment_no)))?;

        let record = NewAttendance {
            session_id,
            enrollment_no: student.enrollment_no,
            name_at_time: student.name,
            semester_at_time: student.semester,
            captured_at: now,
            confidence: score,
        };

        let inserted = retry_on_lock("attendance insert", self.max_lock_wait_ms, || {
            db::attendance::insert_if_absent(&self.db, &record)
        })
        .await;

        let outcome = match inserted {
            Ok(true) => RecordOutcome::Created,
            Ok(false) => RecordOutcome::AlreadyRecorded,
            // A racing writer can still surface the constraint itself
            Err(e) if e.is_unique_violation() => RecordOutcome::AlreadyRecorded,
            Err(e) => return Err(e.into()),
        };

        match outcome {
            RecordOutcome::Created => info!(
                session_id,
                enrollment_no,
                confidence = score,
                "Attendance recorded"
            ),
            RecordOutcome::AlreadyRecorded => debug!(
                session_id,
                enrollment_no,
                "Attendance already recorded"
            ),
        }

        Ok(outcome)
    }
}
