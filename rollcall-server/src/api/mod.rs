//! HTTP API handlers for rollcall-server

pub mod auth;
pub mod captures;
pub mod health;
pub mod roster;
pub mod sessions;
pub mod stats;

pub use captures::capture_routes;
pub use health::health_routes;
pub use roster::roster_routes;
pub use sessions::session_routes;
pub use stats::stats_routes;

use serde::Serialize;

/// Acknowledgement body for operations without a resource to return
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: String,
    pub message: String,
}

impl StatusResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            status: "ok".to_string(),
            message: message.into(),
        }
    }
}
