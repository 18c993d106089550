//! Session Scheduler
//!
//! Faculty-facing entry point for creating sessions. Checks who is asking
//! before handing the window to the Session Registry.

use chrono::{DateTime, Utc};
use rollcall_common::auth::Principal;
use rollcall_common::db::{Class, Session};
use sqlx::SqlitePool;
use tracing::warn;

use crate::db;
use crate::error::{CoreError, CoreResult};
use crate::services::session_registry::SessionRegistry;

/// Admins manage every class; faculty only the classes assigned to them
pub fn authorize_class(principal: &Principal, class: &Class) -> CoreResult<()> {
    match principal {
        Principal::Admin(_) => Ok(()),
        Principal::Faculty(id) if class.faculty_id.as_deref() == Some(id.as_str()) => Ok(()),
        Principal::Faculty(id) => Err(CoreError::Forbidden(format!(
            "Faculty {} does not own class {}",
            id, class.id
        ))),
        Principal::Student(_) => Err(CoreError::Forbidden(
            "Students cannot manage classes".to_string(),
        )),
    }
}

#[derive(Clone)]
pub struct SessionScheduler {
    db: SqlitePool,
    registry: SessionRegistry,
}

impl SessionScheduler {
    pub fn new(db: SqlitePool, registry: SessionRegistry) -> Self {
        Self { db, registry }
    }

    pub async fn schedule(
        &self,
        principal: &Principal,
        class_id: i64,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> CoreResult<Session> {
        if let Principal::Student(id) = principal {
            warn!(student = %id, class_id, "Student attempted to schedule a session");
            return Err(CoreError::Forbidden(
                "Students cannot schedule sessions".to_string(),
            ));
        }

        let class = db::roster::get_class(&self.db, class_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Class {}", class_id)))?;

        if let Err(e) = authorize_class(principal, &class) {
            warn!(principal = principal.id(), class_id, "Schedule rejected: not class owner");
            return Err(e);
        }

        self.registry.create_session(class_id, start_time, end_time).await
    }
}
