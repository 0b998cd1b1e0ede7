//! Node and vendor management endpoints (admin).

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};

use pm_domain::{NodeRegistration, VendorPolicy};

use super::guard::AdminGuard;
use crate::api::api_error;
use crate::state::AppState;

/// GET /v1/nodes: every node with its current health.
pub async fn list_nodes(_guard: AdminGuard, State(state): State<AppState>) -> Response {
    match state.nodes.list_all().await {
        Ok(nodes) => Json(serde_json::json!({
            "count": nodes.len(),
            "nodes": nodes,
        }))
        .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "listing nodes failed");
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "failed to list nodes")
        }
    }
}

/// POST /v1/nodes: register a node, or move an existing one.
///
/// Health fields of an existing node are kept; new nodes start dead until
/// the next watchdog cycle.
pub async fn register_node(
    _guard: AdminGuard,
    State(state): State<AppState>,
    body: Result<Json<NodeRegistration>, JsonRejection>,
) -> Response {
    let Json(registration) = match body {
        Ok(b) => b,
        Err(e) => return api_error(StatusCode::BAD_REQUEST, e.body_text()),
    };
    if registration.id.trim().is_empty() || registration.ip.trim().is_empty() {
        return api_error(StatusCode::BAD_REQUEST, "id and ip must not be empty");
    }
    if registration.port == 0 {
        return api_error(StatusCode::BAD_REQUEST, "port must be greater than 0");
    }

    match state.nodes.register(registration).await {
        Ok(node) => Json(node).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "node registration failed");
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "failed to register node")
        }
    }
}

/// POST /v1/vendors: create or replace a vendor policy.
pub async fn register_vendor(
    _guard: AdminGuard,
    State(state): State<AppState>,
    body: Result<Json<VendorPolicy>, JsonRejection>,
) -> Response {
    let Json(vendor) = match body {
        Ok(b) => b,
        Err(e) => return api_error(StatusCode::BAD_REQUEST, e.body_text()),
    };
    if vendor.vendor_id.trim().is_empty() || vendor.api_key.is_empty() {
        return api_error(StatusCode::BAD_REQUEST, "vendor_id and api_key must not be empty");
    }

    let vendor_id = vendor.vendor_id.clone();
    match state.vendors.register(vendor).await {
        Ok(()) => Json(serde_json::json!({ "vendor_id": vendor_id })).into_response(),
        Err(e) => {
            tracing::error!(error = %e, vendor_id = %vendor_id, "vendor registration failed");
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "failed to register vendor")
        }
    }
}
