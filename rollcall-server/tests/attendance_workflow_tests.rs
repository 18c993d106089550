//! Attendance workflow tests
//!
//! Exercises the core against a real SQLite database with a scripted matcher:
//! - Eligibility windows and the capture happy path
//! - Idempotent recording, sequential and concurrent
//! - Threshold boundary, matcher timeout and failure mapping
//! - Window closing between match and record
//! - Stats, scheduling authorization and cascading deletes
//! - Prediction log rows for closed and vanished sessions

mod helpers;

use chrono::Duration as ChronoDuration;
use helpers::{at, at_secs, setup, setup_with, test_settings, StubBehavior};
use rollcall_common::auth::{Credentials, Principal, Role};
use rollcall_common::db::{ClassUpdate, NewStudent};
use rollcall_common::time::format_timestamp;
use rollcall_common::Clock;
use rollcall_server::db::attendance::get_attendance;
use rollcall_server::services::{CaptureOutcome, Eligibility, Enrollment, RecordOutcome};
use rollcall_server::CoreError;
use std::time::Duration;
use tokio::task::JoinSet;

const IMAGE: &[u8] = b"\xff\xd8\xff\xe0fake-jpeg";

#[tokio::test]
async fn test_end_to_end_capture_window() {
    let ctx = setup().await;
    ctx.add_faculty("F1", "pw").await;
    ctx.add_student("S1", None).await;
    let class_id = ctx.add_class("Operating Systems", Some("F1")).await;
    let session_id = ctx.add_session(class_id, at(10, 0), at(10, 30)).await;
    ctx.matcher.answer("S1", 0.92);

    // 10:15, first capture is recorded
    ctx.clock.set(at(10, 15));
    let first = ctx.state.capture.submit_capture(session_id, IMAGE).await.unwrap();
    assert_eq!(
        first,
        CaptureOutcome::Recorded {
            enrollment_no: "S1".to_string(),
            score: 0.92,
            outcome: RecordOutcome::Created,
        }
    );

    let record = get_attendance(&ctx.db, session_id, "S1").await.unwrap().unwrap();
    assert_eq!(record.confidence, 0.92);
    assert_eq!(format_timestamp(&record.captured_at), "2025-12-08T10:15:00.000Z");
    assert_eq!(record.name_at_time.as_deref(), Some("Student S1"));

    // 10:20, same student again
    ctx.clock.set(at(10, 20));
    let second = ctx.state.capture.submit_capture(session_id, IMAGE).await.unwrap();
    assert!(matches!(
        second,
        CaptureOutcome::Recorded {
            outcome: RecordOutcome::AlreadyRecorded,
            ..
        }
    ));

    // 10:40, window closed: rejected regardless of score, matcher untouched
    ctx.clock.set(at(10, 40));
    ctx.matcher.answer("S1", 0.99);
    let calls_before = ctx.matcher.match_calls();
    let late = ctx.state.capture.submit_capture(session_id, IMAGE).await;
    assert!(matches!(late, Err(CoreError::NotEligible { session_id: id }) if id == session_id));
    assert_eq!(ctx.matcher.match_calls(), calls_before);

    assert_eq!(ctx.attendance_count(session_id).await, 1);
    assert_eq!(
        ctx.prediction_statuses().await,
        vec!["MATCH", "MATCH", "NOT_ELIGIBLE"]
    );
}

#[tokio::test]
async fn test_eligible_listing_follows_clock() {
    let ctx = setup().await;
    let class_id = ctx.add_class("Algorithms", None).await;
    let session_id = ctx.add_session(class_id, at(10, 0), at(10, 30)).await;

    assert!(ctx.state.registry.list_eligible(at_secs(9, 59, 59)).await.unwrap().is_empty());
    assert_eq!(ctx.state.registry.list_eligible(at(10, 0)).await.unwrap()[0].id, session_id);
    assert_eq!(ctx.state.registry.list_eligible(at(10, 30)).await.unwrap().len(), 1);
    assert!(ctx.state.registry.list_eligible(at_secs(10, 30, 1)).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_threshold_boundary() {
    let ctx = setup().await;
    ctx.add_student("S1", None).await;
    let class_id = ctx.add_class("Graphics", None).await;
    let session_id = ctx.add_session(class_id, at(10, 0), at(10, 30)).await;
    ctx.clock.set(at(10, 5));

    // Just below the 0.8 threshold
    ctx.matcher.answer("S1", 0.79);
    let below = ctx.state.capture.submit_capture(session_id, IMAGE).await.unwrap();
    assert_eq!(below, CaptureOutcome::NoMatch { best_score: Some(0.79) });
    assert_eq!(ctx.attendance_count(session_id).await, 0);

    // Exactly at the threshold
    ctx.matcher.answer("S1", 0.8);
    let equal = ctx.state.capture.submit_capture(session_id, IMAGE).await.unwrap();
    assert!(matches!(
        equal,
        CaptureOutcome::Recorded {
            outcome: RecordOutcome::Created,
            ..
        }
    ));

    // No candidate at all
    ctx.matcher.answer_nobody();
    let nobody = ctx.state.capture.submit_capture(session_id, IMAGE).await.unwrap();
    assert_eq!(nobody, CaptureOutcome::NoMatch { best_score: None });
}

#[tokio::test]
async fn test_record_is_idempotent() {
    let ctx = setup().await;
    ctx.add_student("S1", None).await;
    let class_id = ctx.add_class("Networks", None).await;
    let session_id = ctx.add_session(class_id, at(10, 0), at(10, 30)).await;

    let recorder = &ctx.state.recorder;
    let first = recorder.record(session_id, "S1", 0.9, at(10, 10)).await.unwrap();
    let second = recorder.record(session_id, "S1", 0.95, at(10, 11)).await.unwrap();

    assert_eq!(first, RecordOutcome::Created);
    assert_eq!(second, RecordOutcome::AlreadyRecorded);
    assert_eq!(ctx.attendance_count(session_id).await, 1);

    // First write wins
    let record = get_attendance(&ctx.db, session_id, "S1").await.unwrap().unwrap();
    assert_eq!(record.confidence, 0.9);
}

#[tokio::test]
async fn test_concurrent_records_create_exactly_one_row() {
    const N: usize = 16;

    let ctx = setup().await;
    ctx.add_student("S1", None).await;
    let class_id = ctx.add_class("Distributed Systems", None).await;
    let session_id = ctx.add_session(class_id, at(10, 0), at(10, 30)).await;

    let mut tasks = JoinSet::new();
    for i in 0..N {
        let recorder = ctx.state.recorder.clone();
        tasks.spawn(async move {
            recorder
                .record(session_id, "S1", 0.85, at_secs(10, 10, i as u32))
                .await
        });
    }

    let mut created = 0;
    let mut already = 0;
    while let Some(joined) = tasks.join_next().await {
        match joined.unwrap().unwrap() {
            RecordOutcome::Created => created += 1,
            RecordOutcome::AlreadyRecorded => already += 1,
        }
    }

    assert_eq!(created, 1);
    assert_eq!(already, N - 1);
    assert_eq!(ctx.attendance_count(session_id).await, 1);
}

#[tokio::test]
async fn test_concurrent_captures_for_different_students() {
    let ctx = setup().await;
    for no in ["S1", "S2", "S3", "S4"] {
        ctx.add_student(no, None).await;
    }
    let class_id = ctx.add_class("Security", None).await;
    let session_id = ctx.add_session(class_id, at(10, 0), at(10, 30)).await;

    let mut tasks = JoinSet::new();
    for no in ["S1", "S2", "S3", "S4", "S1", "S2"] {
        let recorder = ctx.state.recorder.clone();
        tasks.spawn(async move { recorder.record(session_id, no, 0.9, at(10, 5)).await });
    }

    let mut created = 0;
    while let Some(joined) = tasks.join_next().await {
        if joined.unwrap().unwrap() == RecordOutcome::Created {
            created += 1;
        }
    }

    assert_eq!(created, 4);
    assert_eq!(ctx.attendance_count(session_id).await, 4);
}

#[tokio::test]
async fn test_window_closing_during_match_is_not_eligible() {
    let ctx = setup().await;
    ctx.add_student("S1", None).await;
    let class_id = ctx.add_class("Theory of Computation", None).await;
    let session_id = ctx.add_session(class_id, at(10, 0), at(10, 30)).await;

    ctx.clock.set(at_secs(10, 29, 59));
    ctx.matcher.answer("S1", 0.95);
    ctx.matcher.set_delay(Duration::from_millis(200));

    let capture = ctx.state.capture.clone();
    let handle = tokio::spawn(async move { capture.submit_capture(session_id, IMAGE).await });

    // Close the window while the matcher is still working
    tokio::time::sleep(Duration::from_millis(50)).await;
    ctx.clock.advance(ChronoDuration::minutes(1));

    let result = handle.await.unwrap();
    assert!(matches!(result, Err(CoreError::NotEligible { .. })));
    assert_eq!(ctx.matcher.match_calls(), 1);
    assert_eq!(ctx.attendance_count(session_id).await, 0);
    assert_eq!(ctx.prediction_statuses().await, vec!["NOT_ELIGIBLE"]);
}

#[tokio::test]
async fn test_matcher_timeout_is_retryable_and_records_nothing() {
    let mut settings = test_settings();
    settings.matcher_timeout = Duration::from_millis(50);
    let ctx = setup_with(settings).await;
    ctx.add_student("S1", None).await;
    let class_id = ctx.add_class("Compilers", None).await;
    let session_id = ctx.add_session(class_id, at(10, 0), at(10, 30)).await;

    ctx.clock.set(at(10, 10));
    ctx.matcher.answer("S1", 0.95);
    ctx.matcher.set_delay(Duration::from_millis(500));

    let err = ctx.state.capture.submit_capture(session_id, IMAGE).await.unwrap_err();
    assert!(matches!(err, CoreError::GatewayTimeout(_)));
    assert!(err.is_retryable());
    assert_eq!(ctx.attendance_count(session_id).await, 0);
}

#[tokio::test]
async fn test_matcher_failures_map_to_gateway_and_validation_errors() {
    let ctx = setup().await;
    let class_id = ctx.add_class("Databases", None).await;
    let session_id = ctx.add_session(class_id, at(10, 0), at(10, 30)).await;
    ctx.clock.set(at(10, 10));

    ctx.matcher.behave(StubBehavior::Unavailable);
    let err = ctx.state.capture.submit_capture(session_id, IMAGE).await.unwrap_err();
    assert!(matches!(err, CoreError::GatewayUnavailable(_)));
    assert!(err.is_retryable());

    ctx.matcher.behave(StubBehavior::InvalidImage);
    let err = ctx.state.capture.submit_capture(session_id, IMAGE).await.unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));
}

#[tokio::test]
async fn test_empty_image_rejected_before_matcher() {
    let ctx = setup().await;
    let class_id = ctx.add_class("Databases", None).await;
    let session_id = ctx.add_session(class_id, at(10, 0), at(10, 30)).await;
    ctx.clock.set(at(10, 10));

    let err = ctx.state.capture.submit_capture(session_id, b"").await.unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));
    assert_eq!(ctx.matcher.match_calls(), 0);
}

#[tokio::test]
async fn test_unknown_candidate_downgrades_to_no_match() {
    let ctx = setup().await;
    let class_id = ctx.add_class("Ethics", None).await;
    let session_id = ctx.add_session(class_id, at(10, 0), at(10, 30)).await;
    ctx.clock.set(at(10, 10));
    ctx.matcher.answer("GHOST", 0.97);

    let outcome = ctx.state.capture.submit_capture(session_id, IMAGE).await.unwrap();

    assert_eq!(outcome, CaptureOutcome::NoMatch { best_score: Some(0.97) });
    assert_eq!(ctx.attendance_count(session_id).await, 0);
    assert_eq!(ctx.prediction_statuses().await, vec!["UNKNOWN_STUDENT"]);
}

#[tokio::test]
async fn test_record_rejects_out_of_range_score_and_unknown_student() {
    let ctx = setup().await;
    ctx.add_student("S1", None).await;
    let class_id = ctx.add_class("Statistics", None).await;
    let session_id = ctx.add_session(class_id, at(10, 0), at(10, 30)).await;

    let recorder = &ctx.state.recorder;
    assert!(matches!(
        recorder.record(session_id, "S1", 1.2, at(10, 5)).await,
        Err(CoreError::Validation(_))
    ));
    assert!(matches!(
        recorder.record(session_id, "NOPE", 0.9, at(10, 5)).await,
        Err(CoreError::NotFound(_))
    ));
    assert!(matches!(
        recorder.record(session_id, "S1", 0.9, at(11, 0)).await,
        Err(CoreError::NotEligible { .. })
    ));
    assert_eq!(ctx.attendance_count(session_id).await, 0);
}

#[tokio::test]
async fn test_class_stats_counts_and_percentage() {
    let ctx = setup().await;
    for no in ["S1", "S2", "S3"] {
        ctx.add_student(no, None).await;
    }
    let class_id = ctx.add_class("Machine Learning", None).await;
    let first = ctx.add_session(class_id, at(10, 0), at(10, 30)).await;
    let second = ctx.add_session(class_id, at(11, 0), at(11, 30)).await;

    let recorder = &ctx.state.recorder;
    recorder.record(first, "S1", 0.9, at(10, 5)).await.unwrap();
    recorder.record(first, "S2", 0.9, at(10, 6)).await.unwrap();
    recorder.record(second, "S1", 0.9, at(11, 5)).await.unwrap();

    let stats = ctx.state.stats.class_stats(class_id).await.unwrap();
    assert_eq!(stats.title, "Machine Learning");
    assert_eq!(stats.present_total, 3);
    assert_eq!(stats.sessions.len(), 2);
    assert_eq!(stats.sessions[0].session_id, first);
    assert_eq!(stats.sessions[0].present_count, 2);
    assert_eq!(stats.sessions[1].present_count, 1);
    // 3 of (2 sessions * 3 students)
    assert_eq!(stats.percentage, Some(50.0));

    let empty_class = ctx.add_class("Empty", None).await;
    let empty = ctx.state.stats.class_stats(empty_class).await.unwrap();
    assert_eq!(empty.present_total, 0);
    assert_eq!(empty.percentage, None);

    assert!(matches!(
        ctx.state.stats.class_stats(9999).await,
        Err(CoreError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_faculty_stats_and_student_history() {
    let ctx = setup().await;
    ctx.add_faculty("F1", "pw").await;
    ctx.add_student("S1", None).await;
    let os = ctx.add_class("Operating Systems", Some("F1")).await;
    let net = ctx.add_class("Networks", Some("F1")).await;
    ctx.add_class("Unassigned", None).await;
    let s_os = ctx.add_session(os, at(10, 0), at(10, 30)).await;
    let s_net = ctx.add_session(net, at(11, 0), at(11, 30)).await;

    ctx.state.recorder.record(s_net, "S1", 0.88, at(11, 1)).await.unwrap();
    ctx.state.recorder.record(s_os, "S1", 0.91, at(10, 1)).await.unwrap();

    let per_class = ctx.state.stats.faculty_class_stats("F1").await.unwrap();
    let ids: Vec<i64> = per_class.iter().map(|s| s.class_id).collect();
    assert_eq!(ids, vec![os, net]);

    let history = ctx.state.stats.student_history("S1").await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].class_title, "Operating Systems");
    assert_eq!(history[1].session_id, s_net);
}

#[tokio::test]
async fn test_scheduler_enforces_class_ownership() {
    let ctx = setup().await;
    ctx.add_faculty("F1", "pw").await;
    ctx.add_faculty("F2", "pw").await;
    let class_id = ctx.add_class("Robotics", Some("F1")).await;
    let scheduler = &ctx.state.scheduler;

    let foreign = scheduler
        .schedule(&Principal::Faculty("F2".into()), class_id, at(10, 0), at(10, 30))
        .await;
    assert!(matches!(foreign, Err(CoreError::Forbidden(_))));

    let student = scheduler
        .schedule(&Principal::Student("S1".into()), class_id, at(10, 0), at(10, 30))
        .await;
    assert!(matches!(student, Err(CoreError::Forbidden(_))));

    let missing = scheduler
        .schedule(&Principal::Faculty("F1".into()), 404, at(10, 0), at(10, 30))
        .await;
    assert!(matches!(missing, Err(CoreError::NotFound(_))));

    let owned = scheduler
        .schedule(&Principal::Faculty("F1".into()), class_id, at(10, 0), at(10, 30))
        .await
        .unwrap();
    assert_eq!(owned.class_id, class_id);

    let admin = scheduler
        .schedule(&Principal::Admin("root".into()), class_id, at(12, 0), at(12, 30))
        .await;
    assert!(admin.is_ok());
}

#[tokio::test]
async fn test_deleting_class_removes_sessions_and_attendance() {
    let ctx = setup().await;
    ctx.add_student("S1", None).await;
    let class_id = ctx.add_class("Archaeology", None).await;
    let session_id = ctx.add_session(class_id, at(10, 0), at(10, 30)).await;
    ctx.state.recorder.record(session_id, "S1", 0.9, at(10, 5)).await.unwrap();

    ctx.state.roster.delete_class(class_id).await.unwrap();

    assert_eq!(ctx.table_count("sessions").await, 0);
    assert_eq!(ctx.table_count("attendance").await, 0);
    assert_eq!(ctx.table_count("students").await, 1);
    assert_eq!(
        ctx.state.registry.is_eligible(session_id, at(10, 10)).await.unwrap(),
        Eligibility::Missing
    );

    // A capture for the vanished session is simply not eligible
    ctx.clock.set(at(10, 10));
    ctx.matcher.answer("S1", 0.99);
    assert!(matches!(
        ctx.state.capture.submit_capture(session_id, IMAGE).await,
        Err(CoreError::NotEligible { .. })
    ));

    // The log row does not point at the vanished session
    let logged: Vec<(Option<i64>, String, Option<String>)> =
        sqlx::query_as("SELECT session_id, status, note FROM predictions_log")
            .fetch_all(&ctx.db)
            .await
            .unwrap();
    assert_eq!(
        logged,
        vec![(
            None,
            "NOT_ELIGIBLE".to_string(),
            Some(format!("session {} does not exist", session_id))
        )]
    );
}

#[tokio::test]
async fn test_closed_session_is_logged_with_its_id() {
    let ctx = setup().await;
    let class_id = ctx.add_class("Acoustics", None).await;
    let session_id = ctx.add_session(class_id, at(10, 0), at(10, 30)).await;
    ctx.clock.set(at(11, 0));

    let result = ctx.state.capture.submit_capture(session_id, IMAGE).await;
    assert!(matches!(result, Err(CoreError::NotEligible { .. })));

    let logged: Vec<Option<i64>> = sqlx::query_scalar("SELECT session_id FROM predictions_log")
        .fetch_all(&ctx.db)
        .await
        .unwrap();
    assert_eq!(logged, vec![Some(session_id)]);
}

#[tokio::test]
async fn test_capture_in_last_microseconds_of_window_is_recorded() {
    let ctx = setup().await;
    ctx.add_student("S1", None).await;
    let class_id = ctx.add_class("Signals", None).await;
    let session_id = ctx.add_session(class_id, at(10, 0), at(10, 30)).await;
    ctx.matcher.answer("S1", 0.9);

    // Listed and accepted agree at sub-millisecond offsets past the end
    ctx.clock.set(at(10, 30) + ChronoDuration::microseconds(500));
    let listed = ctx.state.registry.list_eligible(ctx.clock.now()).await.unwrap();
    assert_eq!(listed.len(), 1);
    let outcome = ctx.state.capture.submit_capture(session_id, IMAGE).await.unwrap();
    assert!(matches!(outcome, CaptureOutcome::Recorded { .. }));

    ctx.clock.set(at(10, 30) + ChronoDuration::microseconds(1_500));
    assert!(ctx.state.registry.list_eligible(ctx.clock.now()).await.unwrap().is_empty());
    assert!(matches!(
        ctx.state.capture.submit_capture(session_id, IMAGE).await,
        Err(CoreError::NotEligible { .. })
    ));
}

#[tokio::test]
async fn test_deleting_student_revokes_login() {
    let ctx = setup().await;
    ctx.add_student("S1", Some("pw")).await;
    let credentials = Credentials {
        role: Role::Student,
        id: "S1".to_string(),
        password: "pw".to_string(),
    };
    assert!(ctx.state.verifier.verify(&credentials).await.unwrap().is_some());

    ctx.state.roster.delete_student("S1").await.unwrap();

    assert_eq!(ctx.state.verifier.verify(&credentials).await.unwrap(), None);
    // Only the admin credential remains
    assert_eq!(ctx.table_count("credentials").await, 1);
}

#[tokio::test]
async fn test_deleting_faculty_cascades_through_classes() {
    let ctx = setup().await;
    ctx.add_faculty("F1", "pw").await;
    ctx.add_student("S1", None).await;
    let class_id = ctx.add_class("Optics", Some("F1")).await;
    let session_id = ctx.add_session(class_id, at(10, 0), at(10, 30)).await;
    ctx.state.recorder.record(session_id, "S1", 0.9, at(10, 5)).await.unwrap();

    ctx.state.roster.delete_faculty("F1").await.unwrap();

    assert_eq!(ctx.table_count("faculty").await, 0);
    assert_eq!(ctx.table_count("credentials").await, 1);
    assert_eq!(ctx.table_count("classes").await, 0);
    assert_eq!(ctx.table_count("sessions").await, 0);
    assert_eq!(ctx.table_count("attendance").await, 0);
}

#[tokio::test]
async fn test_enrollment_registers_face_and_tolerates_matcher_failure() {
    let ctx = setup().await;

    let enrolled = ctx
        .state
        .roster
        .enroll_student(Enrollment {
            student: NewStudent {
                enrollment_no: "S7".to_string(),
                name: "Meera".to_string(),
                semester: "3".to_string(),
                face_template_ref: None,
            },
            password: Some("pw".to_string()),
            image: Some(IMAGE.to_vec()),
        })
        .await
        .unwrap();
    assert!(enrolled.face_registered());
    assert_eq!(enrolled.face_template_ref.as_deref(), Some("tmpl-S7"));

    ctx.matcher.behave(StubBehavior::Unavailable);
    let degraded = ctx
        .state
        .roster
        .enroll_student(Enrollment {
            student: NewStudent {
                enrollment_no: "S8".to_string(),
                name: "Arjun".to_string(),
                semester: "3".to_string(),
                face_template_ref: None,
            },
            password: None,
            image: Some(IMAGE.to_vec()),
        })
        .await
        .unwrap();
    assert!(!degraded.face_registered());
    assert_eq!(ctx.matcher.enroll_calls(), 2);
}

#[tokio::test]
async fn test_class_unassign_and_faculty_contact() {
    let ctx = setup().await;
    ctx.add_faculty("F1", "pw").await;
    let class_id = ctx.add_class("Chemistry", Some("F1")).await;
    let session_id = ctx.add_session(class_id, at(10, 0), at(10, 30)).await;

    let contact = ctx.state.roster.faculty_contact(session_id).await.unwrap();
    assert_eq!(contact.faculty_id, "F1");
    assert_eq!(contact.email.as_deref(), Some("f1@college.edu"));

    let updated = ctx
        .state
        .roster
        .update_class(
            class_id,
            ClassUpdate {
                faculty_id: Some(String::new()),
                ..ClassUpdate::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.faculty_id, None);

    assert!(matches!(
        ctx.state.roster.faculty_contact(session_id).await,
        Err(CoreError::NotFound(_))
    ));
}
