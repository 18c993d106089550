//! Request authentication
//!
//! Callers authenticate with HTTP Basic auth where the username carries the
//! role: `Authorization: Basic base64("<role>/<id>:<password>")`, role being
//! one of `student`, `faculty` or `admin`.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use base64::{engine::general_purpose, Engine as _};
use rollcall_common::auth::{Credentials, Principal, Role};

use crate::{ApiError, ApiResult, AppState};

/// Authenticated caller, resolved through the configured credential verifier
#[derive(Debug, Clone)]
pub struct CurrentPrincipal(pub Principal);

#[async_trait]
impl FromRequestParts<AppState> for CurrentPrincipal {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or_else(|| ApiError::Unauthorized("Missing Authorization header".to_string()))?
            .to_str()
            .map_err(|_| ApiError::Unauthorized("Malformed Authorization header".to_string()))?;

        let credentials = parse_basic_credentials(header)?;

        match state.verifier.verify(&credentials).await? {
            Some(principal) => {
                tracing::debug!(role = %principal.role(), id = principal.id(), "Authenticated");
                Ok(CurrentPrincipal(principal))
            }
            None => {
                tracing::warn!(role = %credentials.role, id = %credentials.id, "Rejected credentials");
                Err(ApiError::Unauthorized("Invalid credentials".to_string()))
            }
        }
    }
}

/// Decode a `Basic` Authorization header value into credentials
pub fn parse_basic_credentials(header: &str) -> ApiResult<Credentials> {
    let malformed = || ApiError::Unauthorized("Malformed Basic credentials".to_string());

    let (scheme, encoded) = header.trim().split_once(' ').ok_or_else(malformed)?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return Err(ApiError::Unauthorized(format!(
            "Unsupported authorization scheme: {}",
            scheme
        )));
    }

    let decoded = general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|_| malformed())?;
    let decoded = String::from_utf8(decoded).map_err(|_| malformed())?;

    let (username, password) = decoded.split_once(':').ok_or_else(malformed)?;
    let (role, id) = username.split_once('/').ok_or_else(|| {
        ApiError::Unauthorized("Username must be <role>/<id>".to_string())
    })?;

    let role: Role = role
        .parse()
        .map_err(|_| ApiError::Unauthorized(format!("Unknown role: {}", role)))?;

    if id.is_empty() {
        return Err(malformed());
    }

    Ok(Credentials {
        role,
        id: id.to_string(),
        password: password.to_string(),
    })
}

pub fn require_admin(principal: &Principal) -> ApiResult<()> {
    if principal.is_admin() {
        Ok(())
    } else {
        Err(ApiError::Forbidden("Administrator access required".to_string()))
    }
}

/// The principal `(role, id)` itself, or any admin
pub fn require_self_or_admin(principal: &Principal, role: Role, id: &str) -> ApiResult<()> {
    if principal.is_admin() || (principal.role() == role && principal.id() == id) {
        Ok(())
    } else {
        Err(ApiError::Forbidden(format!(
            "{} {} may not access {} {}",
            principal.role(),
            principal.id(),
            role,
            id
        )))
    }
}
