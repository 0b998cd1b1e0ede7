//! `pm-domain`: shared model, configuration and error types for the
//! ProxyManager control plane.

pub mod config;
pub mod error;
pub mod node;
pub mod vendor;

pub use node::{HealthUpdate, Node, NodeRegistration, NodeStatus, Protocol};
pub use vendor::{GeoPolicy, VendorPolicy};
