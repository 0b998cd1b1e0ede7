//! `POST /launcher/select-node`: vendor authentication plus best-node pick.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};

use pm_domain::error::Error;
use pm_domain::Protocol;

use super::api_error;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SelectNodeRequest {
    pub vendor_id: String,
    pub api_key: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SelectNodeResponse {
    pub node_ip: String,
    pub node_port: u16,
    pub protocol: Protocol,
    pub session_token: String,
}

/// Request-path failures.  Each maps to exactly one status code.
#[derive(Debug, thiserror::Error)]
pub enum SelectError {
    #[error("invalid request: {0}")]
    Validation(String),
    /// Unknown vendor and key mismatch are deliberately indistinguishable.
    #[error("Unauthorized")]
    Unauthorized,
    #[error("No active nodes available")]
    NoActiveNode,
    #[error("store failure: {0}")]
    Store(Error),
    #[error("token issuer failure: {0}")]
    TokenIssuer(Error),
}

impl IntoResponse for SelectError {
    fn into_response(self) -> Response {
        match self {
            Self::Validation(msg) => api_error(StatusCode::BAD_REQUEST, msg),
            Self::Unauthorized => api_error(StatusCode::UNAUTHORIZED, "Unauthorized"),
            Self::NoActiveNode => {
                api_error(StatusCode::SERVICE_UNAVAILABLE, "No active nodes available")
            }
            Self::Store(e) => {
                tracing::error!(error = %e, "select-node store failure");
                api_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
            }
            Self::TokenIssuer(e) => {
                tracing::error!(error = %e, "select-node token issuance failed");
                api_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
            }
        }
    }
}

pub async fn select_node(
    State(state): State<AppState>,
    body: Result<Json<SelectNodeRequest>, JsonRejection>,
) -> Result<Json<SelectNodeResponse>, SelectError> {
    let Json(req) = body.map_err(|e| SelectError::Validation(e.body_text()))?;

    let vendor = state
        .vendors
        .get(&req.vendor_id)
        .await
        .map_err(SelectError::Store)?;
    let vendor = match vendor {
        Some(v) if v.key_matches(&req.api_key) => v,
        Some(_) => {
            tracing::warn!(vendor_id = %req.vendor_id, "select-node rejected: api key mismatch");
            return Err(SelectError::Unauthorized);
        }
        None => {
            tracing::warn!(vendor_id = %req.vendor_id, "select-node rejected: unknown vendor");
            return Err(SelectError::Unauthorized);
        }
    };

    let node = state
        .selector
        .pick(&vendor)
        .await
        .map_err(SelectError::Store)?
        .ok_or(SelectError::NoActiveNode)?;

    let session_token = state
        .tokens
        .issue(&vendor, &node)
        .await
        .map_err(SelectError::TokenIssuer)?;

    tracing::info!(
        vendor_id = %vendor.vendor_id,
        node_id = %node.id,
        latency_ms = node.latency,
        "node selected"
    );

    Ok(Json(SelectNodeResponse {
        node_ip: node.ip,
        node_port: node.port,
        protocol: node.protocol,
        session_token,
    }))
}
