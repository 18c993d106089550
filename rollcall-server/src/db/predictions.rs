//! Prediction log persistence

use rollcall_common::db::{NewPrediction, PredictionLogEntry};
use rollcall_common::time::format_timestamp;
use rollcall_common::Result;
use sqlx::SqlitePool;

/// Append one capture attempt to `predictions_log`
pub async fn insert_prediction(pool: &SqlitePool, entry: &NewPrediction) -> Result<i64> {
    let id = sqlx::query(
        r#"
        INSERT INTO predictions_log
            (attempted_at, session_id, predicted_enrollment, confidence, status, note)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(format_timestamp(&entry.attempted_at))
    .bind(entry.session_id)
    .bind(&entry.predicted_enrollment)
    .bind(entry.confidence)
    .bind(entry.status.as_str())
    .bind(&entry.note)
    .execute(pool)
    .await?
    .last_insert_rowid();

    Ok(id)
}

/// Most recent attempts first, optionally limited to one session
pub async fn list_recent(
    pool: &SqlitePool,
    session_id: Option<i64>,
    limit: i64,
) -> Result<Vec<PredictionLogEntry>> {
    let rows = sqlx::query_as::<_, PredictionLogEntry>(
        r#"
        SELECT id, attempted_at, session_id, predicted_enrollment, confidence, status, note
        FROM predictions_log
        WHERE (?1 IS NULL OR session_id = ?1)
        ORDER BY attempted_at DESC, id DESC
        LIMIT ?2
        "#,
    )
    .bind(session_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
