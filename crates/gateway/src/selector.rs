//! Best-node selection.
//!
//! Candidates are active nodes admitted by the vendor's country policy.
//! The winner is the lowest latency; equal latencies fall back to the
//! lexicographically smallest id so the choice is deterministic.

use pm_domain::error::Result;
use pm_domain::{GeoPolicy, Node, VendorPolicy};
use pm_store::NodeRegistry;

#[derive(Clone)]
pub struct Selector {
    registry: NodeRegistry,
}

impl Selector {
    pub fn new(registry: NodeRegistry) -> Self {
        Self { registry }
    }

    /// `Ok(None)` when no node is eligible.  Store errors propagate.
    pub async fn pick(&self, vendor: &VendorPolicy) -> Result<Option<Node>> {
        let geo = vendor.geo();
        let candidates = self.registry.query_active(&geo).await?;
        Ok(best(candidates, &geo))
    }
}

/// Pure ranking over an already-fetched candidate list.
pub fn best(candidates: impl IntoIterator<Item = Node>, geo: &GeoPolicy) -> Option<Node> {
    candidates
        .into_iter()
        .filter(|n| n.is_active() && geo.admits(n.country.as_deref()))
        .min_by(|a, b| a.latency.cmp(&b.latency).then_with(|| a.id.cmp(&b.id)))
}
