//! Stats Aggregator
//!
//! Read-only attendance summaries for faculty and student dashboards.

use rollcall_common::db::StudentAttendanceEntry;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::db;
use crate::db::attendance::SessionPresence;
use crate::error::{CoreError, CoreResult};

/// Attendance summary for one class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassStats {
    pub class_id: i64,
    pub title: String,
    pub sessions: Vec<SessionPresence>,
    pub present_total: i64,
    /// None when the class has no sessions or the roster has no students
    pub percentage: Option<f64>,
}

/// `present_total / (session_count * student_count) * 100`, two decimals
pub fn attendance_percentage(present_total: i64, session_count: i64, student_count: i64) -> Option<f64> {
    if session_count <= 0 || student_count <= 0 {
        return None;
    }
    let possible = (session_count * student_count) as f64;
    let raw = present_total as f64 / possible * 100.0;
    Some((raw * 100.0).round() / 100.0)
}

#[derive(Clone)]
pub struct StatsAggregator {
    db: SqlitePool,
}

impl StatsAggregator {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn class_stats(&self, class_id: i64) -> CoreResult<ClassStats> {
        let class = db::roster::get_class(&self.db, class_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Class {}", class_id)))?;

        let sessions = db::attendance::session_presence_for_class(&self.db, class_id).await?;
        let student_count = db::roster::count_students(&self.db).await?;

        let present_total: i64 = sessions.iter().map(|s| s.present_count).sum();
        let percentage = attendance_percentage(present_total, sessions.len() as i64, student_count);

        Ok(ClassStats {
            class_id: class.id,
            title: class.title,
            sessions,
            present_total,
            percentage,
        })
    }

    /// `class_stats` for every class a faculty member owns, by class id
    pub async fn faculty_class_stats(&self, faculty_id: &str) -> CoreResult<Vec<ClassStats>> {
        if db::roster::get_faculty(&self.db, faculty_id).await?.is_none() {
            return Err(CoreError::NotFound(format!("Faculty {}", faculty_id)));
        }

        let classes = db::roster::list_classes_for_faculty(&self.db, faculty_id).await?;
        let mut stats = Vec::with_capacity(classes.len());
        for class in classes {
            stats.push(self.class_stats(class.id).await?);
        }
        Ok(stats)
    }

    pub async fn student_history(&self, enrollment_no: &str) -> CoreResult<Vec<StudentAttendanceEntry>> {
        if db::roster::get_student(&self.db, enrollment_no).await?.is_none() {
            return Err(CoreError::NotFound(format!("Student {}", enrollment_no)));
        }
        Ok(db::attendance::list_for_student(&self.db, enrollment_no).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentage_none_without_sessions_or_students() {
        assert_eq!(attendance_percentage(0, 0, 10), None);
        assert_eq!(attendance_percentage(0, 3, 0), None);
    }

    #[test]
    fn test_percentage_rounds_to_two_decimals() {
        // 1 of 3 possible
        assert_eq!(attendance_percentage(1, 1, 3), Some(33.33));
        assert_eq!(attendance_percentage(2, 1, 3), Some(66.67));
        assert_eq!(attendance_percentage(3, 2, 2), Some(75.0));
    }
}
