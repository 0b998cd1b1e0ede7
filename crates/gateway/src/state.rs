use std::sync::Arc;

use pm_domain::config::Config;
use pm_store::{NodeRegistry, VendorDirectory};
use pm_watchdog::Watchdog;

use crate::selector::Selector;
use crate::tokens::TokenIssuer;

/// Shared application state passed to all API handlers.
///
/// Every store-backed component shares the one store handle built at
/// startup.
#[derive(Clone)]
pub struct AppState {
    // ── Core services ─────────────────────────────────────────────────
    pub config: Arc<Config>,
    pub nodes: NodeRegistry,
    pub vendors: VendorDirectory,

    // ── Selection ─────────────────────────────────────────────────────
    pub selector: Selector,
    /// Mints the session token returned with a selected node.
    pub tokens: Arc<dyn TokenIssuer>,

    // ── Health checks ─────────────────────────────────────────────────
    pub watchdog: Arc<Watchdog>,

    // ── Security (startup-computed) ───────────────────────────────────
    /// SHA-256 hash of the admin bearer token (read once at startup).
    /// `None` = dev mode (admin endpoints accessible without auth).
    pub admin_token_hash: Option<Vec<u8>>,
}
