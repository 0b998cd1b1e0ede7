//! Admin endpoints: node and vendor registration, watchdog status.
//!
//! All admin-guarded endpoints use the `AdminGuard` extractor (see `guard.rs`),
//! which enforces the admin bearer token.  With no token configured the
//! endpoints are accessible without auth (dev mode).

mod guard;
mod health;
mod registry;

pub use guard::AdminGuard;

pub use health::{health, watchdog_status};
pub use registry::{list_nodes, register_node, register_vendor};
