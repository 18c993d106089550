//! rollcall-server library interface
//!
//! Exposes the application state, router and services for the binary and
//! for integration tests.

pub mod api;
pub mod db;
pub mod error;
pub mod services;

pub use crate::error::{ApiError, ApiResult, CoreError, CoreResult};

use axum::extract::DefaultBodyLimit;
use axum::Router;
use chrono::{DateTime, Utc};
use rollcall_common::auth::CredentialVerifier;
use rollcall_common::config::TomlConfig;
use rollcall_common::Clock;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use services::{
    AttendanceRecorder, CaptureWorkflow, FaceMatchGateway, FaceMatcher, RosterStore,
    SessionRegistry, SessionScheduler, StatsAggregator,
};

/// Multipart/JSON framing allowance on top of the raw image size
const BODY_OVERHEAD_BYTES: usize = 64 * 1024;

/// Tunables taken from configuration
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub match_threshold: f64,
    pub matcher_timeout: Duration,
    pub max_image_bytes: usize,
    pub db_max_lock_wait_ms: u64,
}

impl ServiceSettings {
    pub fn from_config(config: &TomlConfig) -> Self {
        Self {
            match_threshold: config.match_threshold,
            matcher_timeout: Duration::from_millis(config.matcher.timeout_ms),
            max_image_bytes: config.max_image_bytes,
            db_max_lock_wait_ms: config.db_max_lock_wait_ms,
        }
    }
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self::from_config(&TomlConfig::default())
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub clock: Arc<dyn Clock>,
    pub registry: Arc<SessionRegistry>,
    pub gateway: Arc<FaceMatchGateway>,
    pub recorder: Arc<AttendanceRecorder>,
    pub stats: Arc<StatsAggregator>,
    pub scheduler: Arc<SessionScheduler>,
    pub roster: Arc<RosterStore>,
    pub capture: Arc<CaptureWorkflow>,
    pub verifier: Arc<dyn CredentialVerifier>,
    pub max_image_bytes: usize,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        clock: Arc<dyn Clock>,
        matcher: Arc<dyn FaceMatcher>,
        verifier: Arc<dyn CredentialVerifier>,
        settings: ServiceSettings,
    ) -> Self {
        let registry = SessionRegistry::new(db.clone(), clock.clone());
        let gateway = Arc::new(FaceMatchGateway::new(
            registry.clone(),
            matcher,
            settings.match_threshold,
            settings.matcher_timeout,
        ));
        let recorder = Arc::new(AttendanceRecorder::new(
            db.clone(),
            registry.clone(),
            settings.db_max_lock_wait_ms,
        ));
        let capture = Arc::new(CaptureWorkflow::new(
            db.clone(),
            clock.clone(),
            gateway.clone(),
            recorder.clone(),
        ));

        Self {
            stats: Arc::new(StatsAggregator::new(db.clone())),
            scheduler: Arc::new(SessionScheduler::new(db.clone(), registry.clone())),
            roster: Arc::new(RosterStore::new(db.clone(), gateway.clone(), clock.clone())),
            registry: Arc::new(registry),
            startup_time: clock.now(),
            db,
            clock,
            gateway,
            recorder,
            capture,
            verifier,
            max_image_bytes: settings.max_image_bytes,
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    // Enrollment images travel base64-encoded inside JSON
    let body_limit = state.max_image_bytes.saturating_mul(2) + BODY_OVERHEAD_BYTES;

    Router::new()
        .merge(api::health_routes())
        .merge(api::session_routes())
        .merge(api::capture_routes())
        .merge(api::stats_routes())
        .merge(api::roster_routes())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
