pub mod admin;
pub mod select;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// Build the full API router.
///
/// Public routes need no credentials beyond the vendor key in the request
/// body.  Admin routes are gated per handler by the
/// [`admin::AdminGuard`] extractor.
pub fn router() -> Router<AppState> {
    let public = Router::new()
        .route("/health", get(admin::health))
        .route("/launcher/select-node", post(select::select_node));

    let admin = Router::new()
        .route("/v1/nodes", get(admin::list_nodes).post(admin::register_node))
        .route("/v1/vendors", post(admin::register_vendor))
        .route("/v1/watchdog", get(admin::watchdog_status));

    public.merge(admin)
}

/// `{"error": message}` with the given status.
pub(crate) fn api_error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}
