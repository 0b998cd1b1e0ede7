//! Bearer-token gate for the node, vendor and watchdog admin routes.
//!
//! `/launcher/select-node` authenticates vendors by the key in the request
//! body and never goes through this extractor.

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{header, StatusCode};
use axum::response::Response;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::api::api_error;
use crate::state::AppState;

/// Present in a handler's arguments means the caller holds the operator
/// token resolved at startup from `server.admin_token` or the
/// `server.admin_token_env` variable.
///
/// With no token resolved the registry is open, which bootstrap logs as a
/// warning.
pub struct AdminGuard;

/// Token after `Bearer ` in the `Authorization` header, or `""`.
fn bearer_token(parts: &Parts) -> &str {
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or("")
}

/// Compares digests so both sides are 32 bytes whatever the token length.
fn token_matches(provided: &str, expected_hash: &[u8]) -> bool {
    let provided_hash = Sha256::digest(provided.as_bytes());
    bool::from(provided_hash.ct_eq(expected_hash))
}

#[async_trait]
impl FromRequestParts<AppState> for AdminGuard {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(expected_hash) = state.admin_token_hash.as_deref() else {
            return Ok(AdminGuard);
        };

        if token_matches(bearer_token(parts), expected_hash) {
            return Ok(AdminGuard);
        }

        tracing::warn!(
            method = %parts.method,
            path = %parts.uri.path(),
            "registry admin request rejected"
        );
        Err(api_error(StatusCode::UNAUTHORIZED, "invalid admin token"))
    }
}
