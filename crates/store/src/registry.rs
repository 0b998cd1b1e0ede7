//! Typed facades over the store traits.
//!
//! [`NodeRegistry`] is the only path the watchdog, selector and admin API
//! use to reach node documents; [`VendorDirectory`] does the same for
//! vendor policies.  Neither adds logic beyond shaping reads and writes.

use std::sync::Arc;

use pm_domain::error::Result;
use pm_domain::{GeoPolicy, HealthUpdate, Node, NodeRegistration, NodeStatus, VendorPolicy};

use crate::store::{NodeQuery, NodeStore, VendorStore};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// NodeRegistry
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Clone)]
pub struct NodeRegistry {
    store: Arc<dyn NodeStore>,
}

impl NodeRegistry {
    pub fn new(store: Arc<dyn NodeStore>) -> Self {
        Self { store }
    }

    /// Unknown ids are `Ok(None)`, never an error.
    pub async fn get(&self, id: &str) -> Result<Option<Node>> {
        self.store.get_node(id).await
    }

    /// Every registered node, ordered by id.
    pub async fn list_all(&self) -> Result<Vec<Node>> {
        self.store.query_nodes(&NodeQuery::all()).await
    }

    /// Full replace.  Registration only.
    pub async fn upsert(&self, node: Node) -> Result<()> {
        self.store.upsert_node(node).await
    }

    /// Register a node.  A new id starts dead and unchecked; an existing id
    /// gets its address fields replaced and keeps its health fields.
    pub async fn register(&self, registration: NodeRegistration) -> Result<Node> {
        let node = self.store.register_node(registration).await?;
        tracing::info!(node_id = %node.id, addr = %node.authority(), "node registered");
        Ok(node)
    }

    /// Write the watchdog-owned fields.  `Ok(false)` if the node vanished.
    pub async fn update_health(&self, id: &str, update: HealthUpdate) -> Result<bool> {
        let updated = self.store.update_health(id, update).await?;
        if updated {
            tracing::debug!(
                node_id = %id,
                status = %update.status(),
                latency_ms = update.latency(),
                "node health updated"
            );
        }
        Ok(updated)
    }

    /// Active nodes admitted by `geo`.  Ordering is left to the caller.
    pub async fn query_active(&self, geo: &GeoPolicy) -> Result<Vec<Node>> {
        let mut query = NodeQuery::all().with_status(NodeStatus::Active);
        if !geo.is_unrestricted() {
            query = query.with_geo(geo.clone());
        }
        self.store.query_nodes(&query).await
    }

    /// Persist buffered health writes.
    pub async fn flush(&self) -> Result<()> {
        self.store.flush().await
    }

    /// Raw query access for callers that need a specific order or limit.
    pub async fn query(&self, query: &NodeQuery) -> Result<Vec<Node>> {
        self.store.query_nodes(query).await
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// VendorDirectory
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Clone)]
pub struct VendorDirectory {
    store: Arc<dyn VendorStore>,
}

impl VendorDirectory {
    pub fn new(store: Arc<dyn VendorStore>) -> Self {
        Self { store }
    }

    pub async fn get(&self, vendor_id: &str) -> Result<Option<VendorPolicy>> {
        self.store.get_vendor(vendor_id).await
    }

    pub async fn register(&self, vendor: VendorPolicy) -> Result<()> {
        let vendor_id = vendor.vendor_id.clone();
        self.store.upsert_vendor(vendor).await?;
        tracing::info!(vendor_id = %vendor_id, "vendor registered");
        Ok(())
    }
}
