//! Attendance persistence
//!
//! The only writer of the `attendance` table is [`insert_if_absent`]; the
//! UNIQUE(session_id, enrollment_no) constraint makes it the sole arbiter of
//! "first capture wins".

use chrono::{DateTime, Utc};
use rollcall_common::db::{AttendanceRecord, NewAttendance, StudentAttendanceEntry};
use rollcall_common::time::{canonical, format_timestamp};
use rollcall_common::Result;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

/// Present count for one session of a class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct SessionPresence {
    pub session_id: i64,
    #[serde(with = "canonical")]
    pub start_time: DateTime<Utc>,
    #[serde(with = "canonical")]
    pub end_time: DateTime<Utc>,
    pub present_count: i64,
}

/// Atomically insert an attendance row unless one exists for the same key
///
/// Returns true when this call created the row.
pub async fn insert_if_absent(pool: &SqlitePool, record: &NewAttendance) -> Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO attendance
            (session_id, enrollment_no, name_at_time, semester_at_time, captured_at, confidence)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(session_id, enrollment_no) DO NOTHING
        "#,
    )
    .bind(record.session_id)
    .bind(&record.enrollment_no)
    .bind(&record.name_at_time)
    .bind(&record.semester_at_time)
    .bind(format_timestamp(&record.captured_at))
    .bind(record.confidence)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn get_attendance(
    pool: &SqlitePool,
    session_id: i64,
    enrollment_no: &str,
) -> Result<Option<AttendanceRecord>> {
    let record = sqlx::query_as::<_, AttendanceRecord>(
        r#"
        SELECT id, session_id, enrollment_no, name_at_time, semester_at_time, captured_at, confidence
        FROM attendance
        WHERE session_id = ? AND enrollment_no = ?
        "#,
    )
    .bind(session_id)
    .bind(enrollment_no)
    .fetch_optional(pool)
    .await?;

    Ok(record)
}

pub async fn count_for_session(pool: &SqlitePool, session_id: i64) -> Result<i64> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM attendance WHERE session_id = ?")
        .bind(session_id)
        .fetch_one(pool)
        .await?;

    Ok(count)
}

/// Per-session present counts for a class, sessions without attendance included
pub async fn session_presence_for_class(
    pool: &SqlitePool,
    class_id: i64,
) -> Result<Vec<SessionPresence>> {
    let rows = sqlx::query_as::<_, SessionPresence>(
        r#"
        SELECT s.id AS session_id, s.start_time, s.end_time, COUNT(a.id) AS present_count
        FROM sessions s
        LEFT JOIN attendance a ON a.session_id = s.id
        WHERE s.class_id = ?
        GROUP BY s.id, s.start_time, s.end_time
        ORDER BY s.start_time ASC, s.id ASC
        "#,
    )
    .bind(class_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Every attendance record of a student, oldest first
pub async fn list_for_student(
    pool: &SqlitePool,
    enrollment_no: &str,
) -> Result<Vec<StudentAttendanceEntry>> {
    let rows = sqlx::query_as::<_, StudentAttendanceEntry>(
        r#"
        SELECT a.id AS attendance_id, c.id AS class_id, c.title AS class_title,
               s.id AS session_id, a.captured_at, a.confidence
        FROM attendance a
        JOIN sessions s ON s.id = a.session_id
        JOIN classes c ON c.id = s.class_id
        WHERE a.enrollment_no = ?
        ORDER BY a.captured_at ASC, a.id ASC
        "#,
    )
    .bind(enrollment_no)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
