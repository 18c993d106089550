//! Shared fixtures for rollcall-server integration tests
//!
//! Each test gets its own file-backed SQLite database in a TempDir, a
//! ManualClock it can move, and a StubMatcher whose answers, latency and
//! failures are scripted by the test.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rollcall_common::auth::{set_password, Role, SqliteCredentialVerifier};
use rollcall_common::db::{init_database, NewClass, NewFaculty, NewStudent, Session};
use rollcall_common::ManualClock;
use rollcall_server::services::{FaceMatcher, MatchCandidate, MatcherError};
use rollcall_server::{AppState, ServiceSettings};
use sqlx::SqlitePool;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

pub const ADMIN_ID: &str = "admin";
pub const ADMIN_PASSWORD: &str = "admin-secret";

/// 2025-12-08 at the given UTC hour and minute
pub fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 12, 8, hour, minute, 0).unwrap()
}

pub fn at_secs(hour: u32, minute: u32, second: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 12, 8, hour, minute, second).unwrap()
}

/// Scripted matcher answer
#[derive(Debug, Clone)]
pub enum StubBehavior {
    Candidate(Option<MatchCandidate>),
    Unavailable,
    InvalidImage,
}

/// In-process FaceMatcher with scripted behavior
pub struct StubMatcher {
    behavior: Mutex<StubBehavior>,
    delay: Mutex<Duration>,
    match_calls: AtomicUsize,
    enroll_calls: AtomicUsize,
}

impl StubMatcher {
    pub fn new() -> Self {
        Self {
            behavior: Mutex::new(StubBehavior::Candidate(None)),
            delay: Mutex::new(Duration::ZERO),
            match_calls: AtomicUsize::new(0),
            enroll_calls: AtomicUsize::new(0),
        }
    }

    pub fn answer(&self, enrollment_no: &str, score: f64) {
        *self.behavior.lock().unwrap() = StubBehavior::Candidate(Some(MatchCandidate {
            enrollment_no: enrollment_no.to_string(),
            score,
        }));
    }

    pub fn answer_nobody(&self) {
        *self.behavior.lock().unwrap() = StubBehavior::Candidate(None);
    }

    pub fn behave(&self, behavior: StubBehavior) {
        *self.behavior.lock().unwrap() = behavior;
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn match_calls(&self) -> usize {
        self.match_calls.load(Ordering::SeqCst)
    }

    pub fn enroll_calls(&self) -> usize {
        self.enroll_calls.load(Ordering::SeqCst)
    }

    async fn pause(&self) {
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl FaceMatcher for StubMatcher {
    async fn best_match(
        &self,
        _session: &Session,
        _image: &[u8],
    ) -> Result<Option<MatchCandidate>, MatcherError> {
        self.match_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        let behavior = self.behavior.lock().unwrap().clone();
        match behavior {
            StubBehavior::Candidate(candidate) => Ok(candidate),
            StubBehavior::Unavailable => Err(MatcherError::Unavailable("connection refused".into())),
            StubBehavior::InvalidImage => Err(MatcherError::InvalidImage("no face detected".into())),
        }
    }

    async fn enroll(&self, enrollment_no: &str, _image: &[u8]) -> Result<String, MatcherError> {
        self.enroll_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        let behavior = self.behavior.lock().unwrap().clone();
        match behavior {
            StubBehavior::Unavailable => Err(MatcherError::Unavailable("connection refused".into())),
            StubBehavior::InvalidImage => Err(MatcherError::InvalidImage("no face detected".into())),
            StubBehavior::Candidate(_) => Ok(format!("tmpl-{}", enrollment_no)),
        }
    }
}

pub struct TestContext {
    _dir: TempDir,
    pub db: SqlitePool,
    pub clock: ManualClock,
    pub matcher: Arc<StubMatcher>,
    pub state: AppState,
}

pub fn test_settings() -> ServiceSettings {
    ServiceSettings {
        match_threshold: 0.8,
        matcher_timeout: Duration::from_secs(2),
        max_image_bytes: 1024 * 1024,
        db_max_lock_wait_ms: 5000,
    }
}

/// Fresh database, clock at 09:00 on 2025-12-08, threshold 0.8
pub async fn setup() -> TestContext {
    setup_with(test_settings()).await
}

pub async fn setup_with(settings: ServiceSettings) -> TestContext {
    let dir = TempDir::new().unwrap();
    let db = init_database(&dir.path().join("rollcall.db")).await.unwrap();
    set_password(&db, Role::Admin, ADMIN_ID, ADMIN_PASSWORD).await.unwrap();

    let clock = ManualClock::new(at(9, 0));
    let matcher = Arc::new(StubMatcher::new());
    let state = AppState::new(
        db.clone(),
        Arc::new(clock.clone()),
        matcher.clone(),
        Arc::new(SqliteCredentialVerifier::new(db.clone())),
        settings,
    );

    TestContext {
        _dir: dir,
        db,
        clock,
        matcher,
        state,
    }
}

impl TestContext {
    pub async fn add_faculty(&self, faculty_id: &str, password: &str) {
        self.state
            .roster
            .create_faculty(
                NewFaculty {
                    faculty_id: faculty_id.to_string(),
                    name: format!("Prof. {}", faculty_id),
                    email: Some(format!("{}@college.edu", faculty_id.to_lowercase())),
                    phone: None,
                },
                Some(password.to_string()),
            )
            .await
            .unwrap();
    }

    pub async fn add_student(&self, enrollment_no: &str, password: Option<&str>) {
        self.state
            .roster
            .enroll_student(rollcall_server::services::Enrollment {
                student: NewStudent {
                    enrollment_no: enrollment_no.to_string(),
                    name: format!("Student {}", enrollment_no),
                    semester: "5".to_string(),
                    face_template_ref: None,
                },
                password: password.map(str::to_string),
                image: None,
            })
            .await
            .unwrap();
    }

    pub async fn add_class(&self, title: &str, faculty_id: Option<&str>) -> i64 {
        self.state
            .roster
            .create_class(NewClass {
                title: title.to_string(),
                course_code: None,
                faculty_id: faculty_id.map(str::to_string),
            })
            .await
            .unwrap()
            .id
    }

    /// Create a session through the registry (clock must be before `end`)
    pub async fn add_session(&self, class_id: i64, start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
        self.state
            .registry
            .create_session(class_id, start, end)
            .await
            .unwrap()
            .id
    }

    pub async fn attendance_count(&self, session_id: i64) -> i64 {
        rollcall_server::db::attendance::count_for_session(&self.db, session_id)
            .await
            .unwrap()
    }

    pub async fn table_count(&self, table: &str) -> i64 {
        let (n,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(&self.db)
            .await
            .unwrap();
        n
    }

    pub async fn prediction_statuses(&self) -> Vec<String> {
        sqlx::query_scalar("SELECT status FROM predictions_log ORDER BY id")
            .fetch_all(&self.db)
            .await
            .unwrap()
    }
}
