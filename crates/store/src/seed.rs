//! Seed files: bulk registration of nodes and vendors from TOML.
//!
//! ```toml
//! [[nodes]]
//! id = "fra-1"
//! ip = "203.0.113.10"
//! port = 3128
//! protocol = "http"
//! country = "DE"
//!
//! [[vendors]]
//! vendor_id = "acme"
//! api_key = "change-me"
//! allowed_countries = ["DE", "US"]
//! ```

use std::path::Path;

use pm_domain::error::{Error, Result};
use pm_domain::{NodeRegistration, VendorPolicy};
use serde::Deserialize;

use crate::registry::{NodeRegistry, VendorDirectory};

#[derive(Debug, Default, Deserialize)]
pub struct SeedFile {
    #[serde(default)]
    pub nodes: Vec<NodeRegistration>,
    #[serde(default)]
    pub vendors: Vec<VendorPolicy>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedReport {
    pub nodes: usize,
    pub vendors: usize,
}

impl SeedFile {
    pub fn parse(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("reading seed file {}: {e}", path.display())))?;
        Self::parse(&raw)
    }

    /// Register every entry.  Existing nodes keep their health fields.
    pub async fn apply(self, nodes: &NodeRegistry, vendors: &VendorDirectory) -> Result<SeedReport> {
        let mut report = SeedReport::default();
        for registration in self.nodes {
            nodes.register(registration).await?;
            report.nodes += 1;
        }
        for vendor in self.vendors {
            vendors.register(vendor).await?;
            report.vendors += 1;
        }
        Ok(report)
    }
}
