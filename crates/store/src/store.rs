//! The store contract: get-by-id, upsert, partial health update, and a
//! filter + sort + limit query.

use async_trait::async_trait;
use pm_domain::error::Result;
use pm_domain::{GeoPolicy, HealthUpdate, Node, NodeRegistration, NodeStatus, VendorPolicy};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Query primitive
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Sort order for [`NodeQuery`] results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NodeOrder {
    /// Ascending id.
    #[default]
    Id,
    /// Ascending latency, ties broken by ascending id.
    LatencyThenId,
}

/// Filter + sort + limit over the node collection.
#[derive(Debug, Clone, Default)]
pub struct NodeQuery {
    pub status: Option<NodeStatus>,
    pub geo: Option<GeoPolicy>,
    pub order: NodeOrder,
    pub limit: Option<usize>,
}

impl NodeQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, status: NodeStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_geo(mut self, geo: GeoPolicy) -> Self {
        self.geo = Some(geo);
        self
    }

    pub fn ordered_by(mut self, order: NodeOrder) -> Self {
        self.order = order;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, node: &Node) -> bool {
        if let Some(status) = self.status {
            if node.status != status {
                return false;
            }
        }
        match &self.geo {
            Some(geo) => geo.admits(node.country.as_deref()),
            None => true,
        }
    }

    /// Evaluate the query over an already-loaded set of nodes.  Backends
    /// without a native query engine use this directly.
    pub fn run<'a>(&self, nodes: impl IntoIterator<Item = &'a Node>) -> Vec<Node> {
        let mut out: Vec<Node> = nodes
            .into_iter()
            .filter(|n| self.matches(n))
            .cloned()
            .collect();
        match self.order {
            NodeOrder::Id => out.sort_by(|a, b| a.id.cmp(&b.id)),
            NodeOrder::LatencyThenId => {
                out.sort_by(|a, b| a.latency.cmp(&b.latency).then_with(|| a.id.cmp(&b.id)))
            }
        }
        if let Some(limit) = self.limit {
            out.truncate(limit);
        }
        out
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Traits
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Node document store.
///
/// Implementations must allow concurrent `update_health` calls for
/// different ids without external locking.  Same-id writes resolve
/// last-write-wins.
#[async_trait]
pub trait NodeStore: Send + Sync {
    /// `Ok(None)` for an unknown id.
    async fn get_node(&self, id: &str) -> Result<Option<Node>>;

    /// Full replace.
    async fn upsert_node(&self, node: Node) -> Result<()>;

    /// Create the node, or replace the address fields of the existing one
    /// in a single step under the store's own lock.  Health fields of an
    /// existing node are never written here.
    async fn register_node(&self, registration: NodeRegistration) -> Result<Node>;

    /// Partial update of `status`, `latency` and `last_checked` only.
    /// Returns `Ok(false)` when no node with `id` exists.
    async fn update_health(&self, id: &str, update: HealthUpdate) -> Result<bool>;

    async fn query_nodes(&self, query: &NodeQuery) -> Result<Vec<Node>>;

    /// Make buffered health writes durable.  No-op for backends that
    /// persist on every write.
    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// Vendor document store.
#[async_trait]
pub trait VendorStore: Send + Sync {
    async fn get_vendor(&self, vendor_id: &str) -> Result<Option<VendorPolicy>>;

    async fn upsert_vendor(&self, vendor: VendorPolicy) -> Result<()>;
}
