//! Session persistence
//!
//! Windows are stored as canonical UTC strings, so the eligibility filter is a
//! plain string comparison in SQL.

use chrono::{DateTime, NaiveDate, Utc};
use rollcall_common::db::{EligibleSession, Session};
use rollcall_common::time::format_timestamp;
use rollcall_common::Result;
use sqlx::SqlitePool;

const SESSION_COLUMNS: &str = "id, class_id, session_date, start_time, end_time, created_at";

/// Insert a session and return the stored row
pub async fn insert_session(
    pool: &SqlitePool,
    class_id: i64,
    session_date: NaiveDate,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    created_at: DateTime<Utc>,
) -> Result<Session> {
    let id = sqlx::query(
        r#"
        INSERT INTO sessions (class_id, session_date, start_time, end_time, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(class_id)
    .bind(session_date.format("%Y-%m-%d").to_string())
    .bind(format_timestamp(&start_time))
    .bind(format_timestamp(&end_time))
    .bind(format_timestamp(&created_at))
    .execute(pool)
    .await?
    .last_insert_rowid();

    Ok(Session {
        id,
        class_id,
        session_date,
        start_time,
        end_time,
        created_at,
    })
}

pub async fn get_session(pool: &SqlitePool, session_id: i64) -> Result<Option<Session>> {
    let session = sqlx::query_as::<_, Session>(&format!(
        "SELECT {} FROM sessions WHERE id = ?",
        SESSION_COLUMNS
    ))
    .bind(session_id)
    .fetch_optional(pool)
    .await?;

    Ok(session)
}

/// Sessions whose window contains `now` (inclusive), with class titles
pub async fn list_sessions_open_at(
    pool: &SqlitePool,
    now: DateTime<Utc>,
) -> Result<Vec<EligibleSession>> {
    let now = format_timestamp(&now);

    let sessions = sqlx::query_as::<_, EligibleSession>(
        r#"
        SELECT s.id, s.class_id, c.title AS class_title, s.session_date AS date,
               s.start_time, s.end_time
        FROM sessions s
        JOIN classes c ON c.id = s.class_id
        WHERE s.start_time <= ? AND s.end_time >= ?
        ORDER BY s.start_time ASC, s.id ASC
        "#,
    )
    .bind(&now)
    .bind(&now)
    .fetch_all(pool)
    .await?;

    Ok(sessions)
}

/// Delete a session and its attendance in one transaction
///
/// Returns false when no such session exists.
pub async fn delete_session(pool: &SqlitePool, session_id: i64) -> Result<bool> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM attendance WHERE session_id = ?")
        .bind(session_id)
        .execute(&mut *tx)
        .await?;

    let deleted = sqlx::query("DELETE FROM sessions WHERE id = ?")
        .bind(session_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    tx.commit().await?;

    Ok(deleted > 0)
}
