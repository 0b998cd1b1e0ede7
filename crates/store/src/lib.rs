//! `pm-store`: node and vendor persistence for the ProxyManager control
//! plane.
//!
//! The [`NodeStore`] / [`VendorStore`] traits are the only contract the rest
//! of the system depends on.  Two implementations satisfy it:
//!
//! | Backend  | Implementation | Use                                   |
//! |----------|----------------|---------------------------------------|
//! | `file`   | [`FileStore`]  | Production: JSON documents on disk    |
//! | `memory` | [`MemoryStore`]| Tests and throwaway local runs        |
//!
//! [`NodeRegistry`] and [`VendorDirectory`] are the typed facades the
//! watchdog, selector and API layer talk to.  Use [`open`] to build both
//! from config; the handle is created once at startup and injected.

pub mod file;
pub mod memory;
pub mod registry;
pub mod seed;
pub mod store;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use registry::{NodeRegistry, VendorDirectory};
pub use seed::{SeedFile, SeedReport};
pub use store::{NodeOrder, NodeQuery, NodeStore, VendorStore};

use std::sync::Arc;

use pm_domain::config::{StoreBackend, StoreConfig};
use pm_domain::error::Result;

/// The two facades backed by one shared store instance.
#[derive(Clone)]
pub struct StoreHandles {
    pub nodes: NodeRegistry,
    pub vendors: VendorDirectory,
}

impl StoreHandles {
    /// Share one concrete store between both facades.
    pub fn from_shared<S>(store: Arc<S>) -> Self
    where
        S: NodeStore + VendorStore + 'static,
    {
        Self {
            nodes: NodeRegistry::new(store.clone()),
            vendors: VendorDirectory::new(store),
        }
    }
}

/// Build the configured backend.
pub fn open(config: &StoreConfig) -> Result<StoreHandles> {
    match config.backend {
        StoreBackend::Memory => {
            tracing::info!("using in-memory node store");
            Ok(StoreHandles::from_shared(Arc::new(MemoryStore::new())))
        }
        StoreBackend::File => {
            let store = FileStore::open(&config.path)?;
            Ok(StoreHandles::from_shared(Arc::new(store)))
        }
    }
}
