//! File-backed document store.
//!
//! Keeps both collections in memory and writes them to `nodes.json` /
//! `vendors.json` under the configured directory.  Each write goes to a
//! temp file in the same directory and is renamed into place, so a crash
//! never leaves a half-written document set.
//!
//! Registration and vendor writes are persisted before they return.
//! Health updates only mark the node collection dirty; the watchdog calls
//! [`NodeStore::flush`] once per cycle, so a cycle costs one snapshot write
//! instead of one per node.
//!
//! The directory is held under an exclusive `fs2` lock for the lifetime of
//! the store.  A second process opening the same path fails instead of
//! silently overwriting the first one's documents.

use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use fs2::FileExt;
use parking_lot::RwLock;
use pm_domain::error::{Error, Result};
use pm_domain::{HealthUpdate, Node, NodeRegistration, VendorPolicy};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::memory::register_locked;
use crate::store::{NodeQuery, NodeStore, VendorStore};

const NODES_FILE: &str = "nodes.json";
const VENDORS_FILE: &str = "vendors.json";
const LOCK_FILE: &str = ".lock";

pub struct FileStore {
    dir: PathBuf,
    nodes: RwLock<HashMap<String, Node>>,
    vendors: RwLock<HashMap<String, VendorPolicy>>,
    /// Health changes not yet on disk.
    nodes_dirty: AtomicBool,
    /// Serializes disk writes so a later snapshot is never overwritten by
    /// an earlier one.
    node_writes: tokio::sync::Mutex<()>,
    vendor_writes: tokio::sync::Mutex<()>,
    /// Released when the store is dropped.
    _lock: File,
}

impl FileStore {
    /// Open (or create) the store rooted at `dir`.
    ///
    /// Fails with [`Error::Store`] when another handle holds the directory.
    pub fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;

        let lock_path = dir.join(LOCK_FILE);
        let lock = std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)?;
        lock.try_lock_exclusive().map_err(|e| {
            Error::Store(format!(
                "store at {} is in use by another process ({e}); stop it or point store.path elsewhere",
                dir.display()
            ))
        })?;

        let nodes: Vec<Node> = load_collection(&dir.join(NODES_FILE))?;
        let vendors: Vec<VendorPolicy> = load_collection(&dir.join(VENDORS_FILE))?;

        tracing::info!(
            path = %dir.display(),
            nodes = nodes.len(),
            vendors = vendors.len(),
            "file store loaded"
        );

        Ok(Self {
            dir: dir.to_path_buf(),
            nodes: RwLock::new(nodes.into_iter().map(|n| (n.id.clone(), n)).collect()),
            vendors: RwLock::new(
                vendors
                    .into_iter()
                    .map(|v| (v.vendor_id.clone(), v))
                    .collect(),
            ),
            nodes_dirty: AtomicBool::new(false),
            node_writes: tokio::sync::Mutex::new(()),
            vendor_writes: tokio::sync::Mutex::new(()),
            _lock: lock,
        })
    }

    /// True while health updates are waiting for [`NodeStore::flush`].
    pub fn has_pending_writes(&self) -> bool {
        self.nodes_dirty.load(Ordering::Acquire)
    }

    /// On failure the dirty flag is set again so the next flush retries.
    /// Memory stays authoritative in the meantime.
    async fn persist_nodes(&self) -> Result<()> {
        let _guard = self.node_writes.lock().await;
        self.nodes_dirty.store(false, Ordering::Release);
        let mut snapshot: Vec<Node> = self.nodes.read().values().cloned().collect();
        snapshot.sort_by(|a, b| a.id.cmp(&b.id));
        let written = write_collection(self.dir.join(NODES_FILE), snapshot).await;
        if written.is_err() {
            self.nodes_dirty.store(true, Ordering::Release);
        }
        written
    }

    async fn persist_vendors(&self) -> Result<()> {
        let _guard = self.vendor_writes.lock().await;
        let mut snapshot: Vec<VendorPolicy> = self.vendors.read().values().cloned().collect();
        snapshot.sort_by(|a, b| a.vendor_id.cmp(&b.vendor_id));
        write_collection(self.dir.join(VENDORS_FILE), snapshot).await
    }
}

fn load_collection<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    match std::fs::read_to_string(path) {
        Ok(raw) if raw.trim().is_empty() => Ok(Vec::new()),
        Ok(raw) => serde_json::from_str(&raw)
            .map_err(|e| Error::Store(format!("parsing {}: {e}", path.display()))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(Error::Io(e)),
    }
}

async fn write_collection<T>(path: PathBuf, items: Vec<T>) -> Result<()>
where
    T: Serialize + Send + 'static,
{
    let json = serde_json::to_vec_pretty(&items)?;
    tokio::task::spawn_blocking(move || -> Result<()> {
        let dir = path
            .parent()
            .ok_or_else(|| Error::Store(format!("{} has no parent", path.display())))?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&json)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| Error::Io(e.error))?;
        Ok(())
    })
    .await
    .map_err(|e| Error::Store(format!("persist task failed: {e}")))?
}

#[async_trait]
impl NodeStore for FileStore {
    async fn get_node(&self, id: &str) -> Result<Option<Node>> {
        Ok(self.nodes.read().get(id).cloned())
    }

    async fn upsert_node(&self, node: Node) -> Result<()> {
        self.nodes.write().insert(node.id.clone(), node);
        self.persist_nodes().await
    }

    async fn register_node(&self, registration: NodeRegistration) -> Result<Node> {
        let node = register_locked(&mut self.nodes.write(), registration);
        self.persist_nodes().await?;
        Ok(node)
    }

    /// Applied in memory only; durable after the next [`flush`](Self::flush).
    async fn update_health(&self, id: &str, update: HealthUpdate) -> Result<bool> {
        let found = match self.nodes.write().get_mut(id) {
            Some(node) => {
                update.apply(node);
                true
            }
            None => false,
        };
        if found {
            self.nodes_dirty.store(true, Ordering::Release);
        }
        Ok(found)
    }

    async fn query_nodes(&self, query: &NodeQuery) -> Result<Vec<Node>> {
        Ok(query.run(self.nodes.read().values()))
    }

    async fn flush(&self) -> Result<()> {
        if !self.has_pending_writes() {
            return Ok(());
        }
        self.persist_nodes().await
    }
}

#[async_trait]
impl VendorStore for FileStore {
    async fn get_vendor(&self, vendor_id: &str) -> Result<Option<VendorPolicy>> {
        Ok(self.vendors.read().get(vendor_id).cloned())
    }

    async fn upsert_vendor(&self, vendor: VendorPolicy) -> Result<()> {
        self.vendors.write().insert(vendor.vendor_id.clone(), vendor);
        self.persist_vendors().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pm_domain::{NodeRegistration, NodeStatus, Protocol};

    fn registration(id: &str) -> Node {
        NodeRegistration {
            id: id.into(),
            ip: "10.1.1.1".into(),
            port: 3128,
            protocol: Protocol::Http,
            country: Some("FR".into()),
        }
        .into_node()
    }

    #[tokio::test]
    async fn documents_survive_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        {
            let store = FileStore::open(tmp.path()).unwrap();
            store.upsert_node(registration("n1")).await.unwrap();
            store
                .update_health("n1", HealthUpdate::active(77, Utc::now()))
                .await
                .unwrap();
            store.flush().await.unwrap();
            store
                .upsert_vendor(VendorPolicy {
                    vendor_id: "v1".into(),
                    name: "One".into(),
                    api_key: "k".into(),
                    allowed_countries: vec!["FR".into()],
                    blocked_countries: vec![],
                })
                .await
                .unwrap();
        }

        let reopened = FileStore::open(tmp.path()).unwrap();
        let node = reopened.get_node("n1").await.unwrap().unwrap();
        assert_eq!(node.status, NodeStatus::Active);
        assert_eq!(node.latency, 77);
        assert!(node.last_checked.is_some());
        let vendor = reopened.get_vendor("v1").await.unwrap().unwrap();
        assert_eq!(vendor.allowed_countries, vec!["FR".to_string()]);
    }

    #[tokio::test]
    async fn missing_node_update_does_not_write() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStore::open(tmp.path()).unwrap();
        let updated = store
            .update_health("ghost", HealthUpdate::dead(Utc::now()))
            .await
            .unwrap();
        assert!(!updated);
        assert!(!tmp.path().join(NODES_FILE).exists());
    }

    #[tokio::test]
    async fn health_updates_wait_for_flush() {
        let tmp = tempfile::tempdir().unwrap();
        {
            let store = FileStore::open(tmp.path()).unwrap();
            for i in 0..50 {
                store.upsert_node(registration(&format!("n{i:02}"))).await.unwrap();
            }
            let on_disk = std::fs::read(tmp.path().join(NODES_FILE)).unwrap();

            for i in 0..50 {
                store
                    .update_health(&format!("n{i:02}"), HealthUpdate::active(i + 1, Utc::now()))
                    .await
                    .unwrap();
            }
            assert!(store.has_pending_writes());
            assert_eq!(std::fs::read(tmp.path().join(NODES_FILE)).unwrap(), on_disk);

            store.flush().await.unwrap();
            assert!(!store.has_pending_writes());
        }

        let reopened = FileStore::open(tmp.path()).unwrap();
        let nodes = reopened.query_nodes(&NodeQuery::all()).await.unwrap();
        assert_eq!(nodes.len(), 50);
        assert!(nodes.iter().all(|n| n.status == NodeStatus::Active));
        assert_eq!(nodes[49].latency, 50);
    }

    #[tokio::test]
    async fn failed_flush_stays_pending_and_retries() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("store");
        let store = FileStore::open(&dir).unwrap();
        store.upsert_node(registration("n1")).await.unwrap();

        std::fs::remove_dir_all(&dir).unwrap();
        store
            .update_health("n1", HealthUpdate::active(9, Utc::now()))
            .await
            .unwrap();
        assert!(store.flush().await.is_err());
        assert!(store.has_pending_writes());
        let nodes = store.query_nodes(&NodeQuery::all()).await.unwrap();
        assert_eq!(nodes[0].latency, 9);

        std::fs::create_dir_all(&dir).unwrap();
        store.flush().await.unwrap();
        assert!(!store.has_pending_writes());
        let raw = std::fs::read_to_string(dir.join(NODES_FILE)).unwrap();
        let saved: Vec<Node> = serde_json::from_str(&raw).unwrap();
        assert_eq!(saved[0].status, NodeStatus::Active);
        assert_eq!(saved[0].latency, 9);
    }

    #[tokio::test]
    async fn flush_without_changes_does_not_write() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStore::open(tmp.path()).unwrap();
        store.flush().await.unwrap();
        assert!(!tmp.path().join(NODES_FILE).exists());
    }

    #[tokio::test]
    async fn registration_keeps_health_and_persists() {
        let tmp = tempfile::tempdir().unwrap();
        {
            let store = FileStore::open(tmp.path()).unwrap();
            store.upsert_node(registration("n1")).await.unwrap();
            store
                .update_health("n1", HealthUpdate::active(9, Utc::now()))
                .await
                .unwrap();
            let node = store
                .register_node(NodeRegistration {
                    id: "n1".into(),
                    ip: "10.9.9.9".into(),
                    port: 8000,
                    protocol: Protocol::Https,
                    country: None,
                })
                .await
                .unwrap();
            assert_eq!(node.status, NodeStatus::Active);
            assert_eq!(node.latency, 9);
        }

        let reopened = FileStore::open(tmp.path()).unwrap();
        let node = reopened.get_node("n1").await.unwrap().unwrap();
        assert_eq!(node.ip, "10.9.9.9");
        assert_eq!(node.latency, 9);
    }

    #[test]
    fn second_open_of_same_directory_is_refused() {
        let tmp = tempfile::tempdir().unwrap();
        let first = FileStore::open(tmp.path()).unwrap();

        let err = FileStore::open(tmp.path()).err().expect("second open should fail");
        match err {
            Error::Store(msg) => assert!(msg.contains("in use"), "unexpected message: {msg}"),
            other => panic!("expected store error, got {other:?}"),
        }

        drop(first);
        assert!(FileStore::open(tmp.path()).is_ok());
    }

    #[test]
    fn corrupt_document_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join(NODES_FILE), "{ not json").unwrap();
        let err = FileStore::open(tmp.path()).err().expect("open should fail");
        assert!(matches!(err, Error::Store(_)));
    }

    #[test]
    fn empty_document_loads_as_empty() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join(NODES_FILE), "").unwrap();
        assert!(FileStore::open(tmp.path()).is_ok());
    }
}
