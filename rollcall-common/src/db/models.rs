//! Database models

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::time::canonical;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Student {
    pub enrollment_no: String,
    pub name: String,
    pub semester: String,
    /// Opaque handle owned by the face matcher
    pub face_template_ref: Option<String>,
    #[serde(with = "canonical")]
    pub created_at: DateTime<Utc>,
}

impl Student {
    pub fn face_registered(&self) -> bool {
        self.face_template_ref.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Faculty {
    pub faculty_id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    #[serde(with = "canonical")]
    pub created_at: DateTime<Utc>,
}

/// Contact card shown to students for a session's owning faculty
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct FacultyContact {
    pub faculty_id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Class {
    pub id: i64,
    pub title: String,
    pub course_code: Option<String>,
    /// NULL for unassigned classes
    pub faculty_id: Option<String>,
    #[serde(with = "canonical")]
    pub created_at: DateTime<Utc>,
}

/// A class session and its attendance window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Session {
    pub id: i64,
    pub class_id: i64,
    pub session_date: NaiveDate,
    #[serde(with = "canonical")]
    pub start_time: DateTime<Utc>,
    #[serde(with = "canonical")]
    pub end_time: DateTime<Utc>,
    #[serde(with = "canonical")]
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// `start_time <= now <= end_time`, inclusive at both ends
    pub fn is_eligible_at(&self, now: DateTime<Utc>) -> bool {
        self.start_time <= now && now <= self.end_time
    }
}

/// Row of the eligible-sessions listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct EligibleSession {
    pub id: i64,
    pub class_id: i64,
    pub class_title: String,
    pub date: NaiveDate,
    #[serde(with = "canonical")]
    pub start_time: DateTime<Utc>,
    #[serde(with = "canonical")]
    pub end_time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct AttendanceRecord {
    pub id: i64,
    pub session_id: i64,
    pub enrollment_no: String,
    pub name_at_time: Option<String>,
    pub semester_at_time: Option<String>,
    #[serde(with = "canonical")]
    pub captured_at: DateTime<Utc>,
    pub confidence: f64,
}

/// Attendance row to be inserted by the recorder
#[derive(Debug, Clone)]
pub struct NewAttendance {
    pub session_id: i64,
    pub enrollment_no: String,
    pub name_at_time: String,
    pub semester_at_time: String,
    pub captured_at: DateTime<Utc>,
    pub confidence: f64,
}

/// One line of a student's attendance history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct StudentAttendanceEntry {
    pub attendance_id: i64,
    pub class_id: i64,
    pub class_title: String,
    pub session_id: i64,
    #[serde(with = "canonical")]
    pub captured_at: DateTime<Utc>,
    pub confidence: f64,
}

/// Outcome category of a capture attempt, as written to `predictions_log`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PredictionStatus {
    Match,
    NoMatch,
    NotEligible,
    UnknownStudent,
}

impl PredictionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PredictionStatus::Match => "MATCH",
            PredictionStatus::NoMatch => "NO_MATCH",
            PredictionStatus::NotEligible => "NOT_ELIGIBLE",
            PredictionStatus::UnknownStudent => "UNKNOWN_STUDENT",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PredictionLogEntry {
    pub id: i64,
    #[serde(with = "canonical")]
    pub attempted_at: DateTime<Utc>,
    pub session_id: Option<i64>,
    pub predicted_enrollment: Option<String>,
    pub confidence: Option<f64>,
    pub status: String,
    pub note: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewPrediction {
    pub attempted_at: DateTime<Utc>,
    pub session_id: Option<i64>,
    pub predicted_enrollment: Option<String>,
    pub confidence: Option<f64>,
    pub status: PredictionStatus,
    pub note: Option<String>,
}

// ============================================================================
// Roster write payloads
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct NewStudent {
    pub enrollment_no: String,
    pub name: String,
    pub semester: String,
    #[serde(default)]
    pub face_template_ref: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StudentUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub semester: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewFaculty {
    pub faculty_id: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FacultyUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewClass {
    pub title: String,
    #[serde(default)]
    pub course_code: Option<String>,
    /// Must reference an existing faculty when present
    #[serde(default)]
    pub faculty_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClassUpdate {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub course_code: Option<String>,
    /// `Some("")` unassigns the class
    #[serde(default)]
    pub faculty_id: Option<String>,
}
