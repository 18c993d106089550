//! Face Match Gateway
//!
//! Wraps the external face matcher behind [`FaceMatcher`]. The gateway owns
//! the pieces of matching that are policy rather than recognition:
//! - eligibility is checked before the matcher is ever called
//! - one configured threshold decides match vs. no match (`score >= threshold`)
//! - the matcher call is bounded by a timeout
//!
//! The best raw score is surfaced on both outcomes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::{CoreError, CoreResult};
use crate::services::session_registry::{Eligibility, SessionRegistry};
use rollcall_common::db::Session;

/// Best candidate reported by the matcher
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchCandidate {
    pub enrollment_no: String,
    pub score: f64,
}

/// Thresholded outcome of one match
#[derive(Debug, Clone, PartialEq)]
pub enum MatchResult {
    Matched { enrollment_no: String, score: f64 },
    /// `best_score` is None when the matcher had no candidate at all
    NoMatch { best_score: Option<f64> },
}

/// Failures reported by a matcher implementation
#[derive(Debug, Error)]
pub enum MatcherError {
    /// Undecodable image or no face found
    #[error("Image rejected by matcher: {0}")]
    InvalidImage(String),

    #[error("Matcher unreachable: {0}")]
    Unavailable(String),

    /// Response did not follow the matcher contract
    #[error("Matcher protocol error: {0}")]
    Protocol(String),
}

/// External face recognition service
#[async_trait]
pub trait FaceMatcher: Send + Sync {
    /// Best candidate for `image` among students, if any
    async fn best_match(
        &self,
        session: &Session,
        image: &[u8],
    ) -> Result<Option<MatchCandidate>, MatcherError>;

    /// Register a face for a student; returns the matcher's template reference
    async fn enroll(&self, enrollment_no: &str, image: &[u8]) -> Result<String, MatcherError>;
}

/// Apply the acceptance threshold to a matcher answer
pub fn classify(candidate: Option<MatchCandidate>, threshold: f64) -> MatchResult {
    match candidate {
        Some(c) if c.score >= threshold => MatchResult::Matched {
            enrollment_no: c.enrollment_no,
            score: c.score,
        },
        Some(c) => MatchResult::NoMatch {
            best_score: Some(c.score),
        },
        None => MatchResult::NoMatch { best_score: None },
    }
}

pub struct FaceMatchGateway {
    registry: SessionRegistry,
    matcher: Arc<dyn FaceMatcher>,
    threshold: f64,
    timeout: Duration,
}

impl FaceMatchGateway {
    pub fn new(
        registry: SessionRegistry,
        matcher: Arc<dyn FaceMatcher>,
        threshold: f64,
        timeout: Duration,
    ) -> Self {
        Self {
            registry,
            matcher,
            threshold,
            timeout,
        }
    }

    /// Match a captured image for a session
    ///
    /// NotEligible when the session is closed or missing; the matcher is not
    /// called in that case.
    pub async fn match_face(&self, image: &[u8], session_id: i64) -> CoreResult<MatchResult> {
        if image.is_empty() {
            return Err(CoreError::Validation("Image is empty".to_string()));
        }

        let now = self.registry.now();
        let session = match self.registry.is_eligible(session_id, now).await? {
            Eligibility::Eligible(session) => session,
            Eligibility::Closed(_) | Eligibility::Missing => {
                debug!(session_id, "Capture rejected: session not eligible");
                return Err(CoreError::NotEligible { session_id });
            }
        };

        let candidate = self
            .bounded(self.matcher.best_match(&session, image))
            .await?;

        if let Some(c) = &candidate {
            if !c.score.is_finite() || !(0.0..=1.0).contains(&c.score) {
                return Err(CoreError::GatewayUnavailable(format!(
                    "Matcher returned out-of-range score {}",
                    c.score
                )));
            }
        }

        let result = classify(candidate, self.threshold);
        debug!(session_id, ?result, threshold = self.threshold, "Match classified");
        Ok(result)
    }

    /// Register a face with the matcher
    pub async fn enroll(&self, enrollment_no: &str, image: &[u8]) -> CoreResult<String> {
        if image.is_empty() {
            return Err(CoreError::Validation("Image is empty".to_string()));
        }
        self.bounded(self.matcher.enroll(enrollment_no, image)).await
    }

    async fn bounded<T>(
        &self,
        call: impl std::future::Future<Output = Result<T, MatcherError>>,
    ) -> CoreResult<T> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(MatcherError::InvalidImage(msg))) => Err(CoreError::Validation(msg)),
            Ok(Err(e)) => {
                warn!(error = %e, "Face matcher call failed");
                Err(CoreError::GatewayUnavailable(e.to_string()))
            }
            Err(_) => {
                warn!(timeout_ms = self.timeout.as_millis() as u64, "Face matcher timed out");
                Err(CoreError::GatewayTimeout(self.timeout))
            }
        }
    }
}
