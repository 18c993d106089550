//! HTTP face matcher client
//!
//! Contract:
//! - `POST {base}/match`  `{session_id, class_id, image_base64}` → `{candidate: {enrollment_no, score} | null}`
//! - `POST {base}/enroll` `{enrollment_no, image_base64}` → `{template_ref}`
//!
//! HTTP 422 means the image was rejected; any other non-2xx is treated as the
//! matcher being unavailable.

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use reqwest::StatusCode;
use rollcall_common::db::Session;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::face_gateway::{FaceMatcher, MatchCandidate, MatcherError};

const USER_AGENT: &str = concat!("rollcall-server/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Serialize)]
struct MatchRequest<'a> {
    session_id: i64,
    class_id: i64,
    image_base64: &'a str,
}

#[derive(Debug, Deserialize)]
struct MatchResponse {
    candidate: Option<MatchCandidate>,
}

#[derive(Debug, Serialize)]
struct EnrollRequest<'a> {
    enrollment_no: &'a str,
    image_base64: &'a str,
}

#[derive(Debug, Deserialize)]
struct EnrollResponse {
    template_ref: String,
}

pub struct HttpFaceMatcher {
    http_client: reqwest::Client,
    base_url: String,
}

impl HttpFaceMatcher {
    /// `timeout` is a transport-level backstop; the gateway applies its own bound
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, MatcherError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| MatcherError::Unavailable(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post<B, R>(&self, path: &str, body: &B) -> Result<R, MatcherError>
    where
        B: Serialize + ?Sized,
        R: for<'de> Deserialize<'de>,
    {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(url = %url, "Calling face matcher");

        let response = self
            .http_client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| MatcherError::Unavailable(e.to_string()))?;

        let status = response.status();

        if status == StatusCode::UNPROCESSABLE_ENTITY {
            let detail = response.text().await.unwrap_or_default();
            return Err(MatcherError::InvalidImage(detail));
        }

        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(MatcherError::Unavailable(format!(
                "HTTP {}: {}",
                status.as_u16(),
                detail
            )));
        }

        response
            .json::<R>()
            .await
            .map_err(|e| MatcherError::Protocol(e.to_string()))
    }
}

#[async_trait]
impl FaceMatcher for HttpFaceMatcher {
    async fn best_match(
        &self,
        session: &Session,
        image: &[u8],
    ) -> Result<Option<MatchCandidate>, MatcherError> {
        let encoded = general_purpose::STANDARD.encode(image);
        let request = MatchRequest {
            session_id: session.id,
            class_id: session.class_id,
            image_base64: &encoded,
        };

        let response: MatchResponse = self.post("/match", &request).await?;
        Ok(response.candidate)
    }

    async fn enroll(&self, enrollment_no: &str, image: &[u8]) -> Result<String, MatcherError> {
        let encoded = general_purpose::STANDARD.encode(image);
        let request = EnrollRequest {
            enrollment_no,
            image_base64: &encoded,
        };

        let response: EnrollResponse = self.post("/enroll", &request).await?;
        if response.template_ref.trim().is_empty() {
            return Err(MatcherError::Protocol("Empty template_ref".to_string()));
        }
        Ok(response.template_ref)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation_trims_trailing_slash() {
        let client = HttpFaceMatcher::new("http://127.0.0.1:8500/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.base_url(), "http://127.0.0.1:8500");
    }

    #[test]
    fn test_match_response_accepts_null_candidate() {
        let parsed: MatchResponse = serde_json::from_str(r#"{"candidate": null}"#).unwrap();
        assert!(parsed.candidate.is_none());

        let parsed: MatchResponse =
            serde_json::from_str(r#"{"candidate": {"enrollment_no": "S9", "score": 0.81}}"#)
                .unwrap();
        assert_eq!(parsed.candidate.unwrap().enrollment_no, "S9");
    }

    #[tokio::test]
    async fn test_unreachable_matcher_is_unavailable() {
        // Port 9 (discard) is not expected to serve HTTP
        let client = HttpFaceMatcher::new("http://127.0.0.1:9", Duration::from_millis(500)).unwrap();
        let result = client.enroll("S1", b"jpeg").await;
        assert!(matches!(result, Err(MatcherError::Unavailable(_))));
    }
}
