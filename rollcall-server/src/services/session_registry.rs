//! Session Registry
//!
//! Derives whether a session currently accepts attendance from its stored
//! window and the server clock. Eligibility is never persisted.

use chrono::{DateTime, Utc};
use rollcall_common::db::{EligibleSession, Session};
use rollcall_common::time::to_millis;
use rollcall_common::Clock;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{debug, info};

use crate::db;
use crate::error::{CoreError, CoreResult};

/// Eligibility of one session at one instant
#[derive(Debug, Clone, PartialEq)]
pub enum Eligibility {
    Eligible(Session),
    /// Window not yet open or already closed
    Closed(Session),
    /// Session does not exist (never created, or deleted with its class)
    Missing,
}

impl Eligibility {
    pub fn is_eligible(&self) -> bool {
        matches!(self, Eligibility::Eligible(_))
    }
}

#[derive(Clone)]
pub struct SessionRegistry {
    db: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl SessionRegistry {
    pub fn new(db: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    /// Current server time
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Sessions open at `now`, ordered by start time
    pub async fn list_eligible(&self, now: DateTime<Utc>) -> CoreResult<Vec<EligibleSession>> {
        let sessions = db::sessions::list_sessions_open_at(&self.db, to_millis(now)).await?;
        debug!(count = sessions.len(), "Listed eligible sessions");
        Ok(sessions)
    }

    pub async fn get(&self, session_id: i64) -> CoreResult<Option<Session>> {
        Ok(db::sessions::get_session(&self.db, session_id).await?)
    }

    pub async fn is_eligible(&self, session_id: i64, now: DateTime<Utc>) -> CoreResult<Eligibility> {
        let now = to_millis(now);
        let eligibility = match self.get(session_id).await? {
            Some(session) if session.is_eligible_at(now) => Eligibility::Eligible(session),
            Some(session) => Eligibility::Closed(session),
            None => Eligibility::Missing,
        };
        Ok(eligibility)
    }

    /// Create a session for an existing class
    ///
    /// The window must be non-empty and must not lie entirely in the past.
    pub async fn create_session(
        &self,
        class_id: i64,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> CoreResult<Session> {
        // Same precision as the stored row
        let start_time = to_millis(start_time);
        let end_time = to_millis(end_time);

        if end_time <= start_time {
            return Err(CoreError::Validation(
                "end_time must be after start_time".to_string(),
            ));
        }

        if db::roster::get_class(&self.db, class_id).await?.is_none() {
            return Err(CoreError::NotFound(format!("Class {}", class_id)));
        }

        let now = self.clock.now();
        if end_time < now {
            return Err(CoreError::Validation(
                "Session window has already ended".to_string(),
            ));
        }

        let session = db::sessions::insert_session(
            &self.db,
            class_id,
            start_time.date_naive(),
            start_time,
            end_time,
            now,
        )
        .await?;

        info!(
            session_id = session.id,
            class_id,
            start_time = %session.start_time,
            end_time = %session.end_time,
            "Session created"
        );

        Ok(session)
    }

    /// Delete a session and its attendance
    pub async fn delete_session(&self, session_id: i64) -> CoreResult<()> {
        if !db::sessions::delete_session(&self.db, session_id).await? {
            return Err(CoreError::NotFound(format!("Session {}", session_id)));
        }
        info!(session_id, "Session deleted");
        Ok(())
    }
}
