//! Attendance core services

pub mod attendance_recorder;
pub mod capture_workflow;
pub mod face_gateway;
pub mod matcher_client;
pub mod roster_store;
pub mod session_registry;
pub mod session_scheduler;
pub mod stats_aggregator;

pub use attendance_recorder::{AttendanceRecorder, RecordOutcome};
pub use capture_workflow::{CaptureOutcome, CaptureWorkflow};
pub use face_gateway::{FaceMatchGateway, FaceMatcher, MatchCandidate, MatchResult, MatcherError};
pub use matcher_client::HttpFaceMatcher;
pub use roster_store::{Enrollment, RosterStore};
pub use session_registry::{Eligibility, SessionRegistry};
pub use session_scheduler::{authorize_class, SessionScheduler};
pub use stats_aggregator::{attendance_percentage, ClassStats, StatsAggregator};
