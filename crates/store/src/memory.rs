//! In-memory store.  Same contract as [`crate::FileStore`], nothing is
//! persisted.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use pm_domain::error::Result;
use pm_domain::{HealthUpdate, Node, NodeRegistration, VendorPolicy};

use crate::store::{NodeQuery, NodeStore, VendorStore};

pub struct MemoryStore {
    nodes: RwLock<HashMap<String, Node>>,
    vendors: RwLock<HashMap<String, VendorPolicy>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            nodes: RwLock::new(HashMap::new()),
            vendors: RwLock::new(HashMap::new()),
        }
    }

    /// Build a store pre-populated with `nodes` and `vendors`.
    pub fn with_data(nodes: Vec<Node>, vendors: Vec<VendorPolicy>) -> Self {
        let store = Self::new();
        {
            let mut map = store.nodes.write();
            for node in nodes {
                map.insert(node.id.clone(), node);
            }
        }
        {
            let mut map = store.vendors.write();
            for vendor in vendors {
                map.insert(vendor.vendor_id.clone(), vendor);
            }
        }
        store
    }
}

#[async_trait]
impl NodeStore for MemoryStore {
    async fn get_node(&self, id: &str) -> Result<Option<Node>> {
        Ok(self.nodes.read().get(id).cloned())
    }

    async fn upsert_node(&self, node: Node) -> Result<()> {
        self.nodes.write().insert(node.id.clone(), node);
        Ok(())
    }

    async fn register_node(&self, registration: NodeRegistration) -> Result<Node> {
        Ok(register_locked(&mut self.nodes.write(), registration))
    }

    async fn update_health(&self, id: &str, update: HealthUpdate) -> Result<bool> {
        match self.nodes.write().get_mut(id) {
            Some(node) => {
                update.apply(node);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn query_nodes(&self, query: &NodeQuery) -> Result<Vec<Node>> {
        Ok(query.run(self.nodes.read().values()))
    }
}

/// Merge-or-insert against an already locked node map.
pub(crate) fn register_locked(
    nodes: &mut HashMap<String, Node>,
    registration: NodeRegistration,
) -> Node {
    let node = match nodes.get(&registration.id) {
        Some(existing) => registration.merge_into(existing),
        None => registration.into_node(),
    };
    nodes.insert(node.id.clone(), node.clone());
    node
}

#[async_trait]
impl VendorStore for MemoryStore {
    async fn get_vendor(&self, vendor_id: &str) -> Result<Option<VendorPolicy>> {
        Ok(self.vendors.read().get(vendor_id).cloned())
    }

    async fn upsert_vendor(&self, vendor: VendorPolicy) -> Result<()> {
        self.vendors.write().insert(vendor.vendor_id.clone(), vendor);
        Ok(())
    }
}
