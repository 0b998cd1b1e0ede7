//! Watchdog scheduler: periodic, single-flight, bounded fan-out.
//!
//! ```text
//!  tick ──► run_cycle ──► CAS Idle→Running ──fail──► Skipped
//!                              │
//!                              ▼
//!                         list_all()
//!                              │
//!              ┌───────────────┼───────────────┐
//!              ▼               ▼               ▼
//!          probe(n1)       probe(n2)  ...  probe(nk)     (≤ pool_size)
//!              │               │               │
//!        update_health   update_health   update_health
//!              └───────────────┴───────────────┘
//!                              ▼
//!                     Running→Idle, report
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use pm_domain::config::WatchdogConfig;
use pm_domain::Node;
use pm_store::NodeRegistry;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::prober::{ProbeResult, Prober};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Settings & reports
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy)]
pub struct WatchdogSettings {
    pub interval: Duration,
    pub probe_timeout: Duration,
    pub pool_size: usize,
}

impl WatchdogSettings {
    pub fn from_config(cfg: &WatchdogConfig) -> Self {
        Self {
            interval: cfg.interval(),
            probe_timeout: cfg.probe_timeout(),
            pool_size: cfg.effective_pool_size(),
        }
    }
}

impl Default for WatchdogSettings {
    fn default() -> Self {
        Self::from_config(&WatchdogConfig::default())
    }
}

/// Summary of one completed cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    /// Nodes listed at cycle start.
    pub checked: usize,
    pub active: usize,
    pub dead: usize,
    /// Nodes that disappeared between listing and the health write.
    pub missing: usize,
    /// Health writes that failed, plus probe tasks that panicked.
    pub failures: usize,
    /// The end-of-cycle flush failed.  Results stay in the store's memory
    /// and the next cycle's flush retries.
    pub flush_failed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Another cycle was already running; nothing was done.
    Skipped,
    /// Listing nodes failed; no probes were sent.
    ListFailed(String),
    Completed(CycleReport),
}

enum NodeOutcome {
    Written(ProbeResult),
    Missing,
    WriteFailed,
}

/// Resets the running flag when the cycle ends, including on panic.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Watchdog
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct Watchdog {
    registry: NodeRegistry,
    prober: Arc<dyn Prober>,
    settings: WatchdogSettings,
    running: AtomicBool,
    last_report: RwLock<Option<CycleReport>>,
}

impl Watchdog {
    pub fn new(registry: NodeRegistry, prober: Arc<dyn Prober>, settings: WatchdogSettings) -> Self {
        Self {
            registry,
            prober,
            settings,
            running: AtomicBool::new(false),
            last_report: RwLock::new(None),
        }
    }

    pub fn settings(&self) -> WatchdogSettings {
        self.settings
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn last_report(&self) -> Option<CycleReport> {
        self.last_report.read().clone()
    }

    /// Run one health-check cycle unless one is already in flight.
    pub async fn run_cycle(&self) -> CycleOutcome {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("watchdog cycle already running, skipping");
            return CycleOutcome::Skipped;
        }
        let _guard = RunningGuard(&self.running);

        let started_at = Utc::now();
        let clock = Instant::now();

        let nodes = match self.registry.list_all().await {
            Ok(nodes) => nodes,
            Err(e) => {
                tracing::error!(error = %e, "watchdog failed to list nodes");
                return CycleOutcome::ListFailed(e.to_string());
            }
        };
        tracing::info!(nodes = nodes.len(), "watchdog cycle started");

        let mut report = CycleReport {
            started_at,
            elapsed_ms: 0,
            checked: nodes.len(),
            active: 0,
            dead: 0,
            missing: 0,
            failures: 0,
            flush_failed: false,
        };

        let permits = Arc::new(Semaphore::new(self.settings.pool_size));
        let mut tasks = JoinSet::new();
        for node in nodes {
            let permits = permits.clone();
            let prober = self.prober.clone();
            let registry = self.registry.clone();
            let timeout = self.settings.probe_timeout;
            tasks.spawn(async move {
                let Ok(_permit) = permits.acquire_owned().await else {
                    return NodeOutcome::WriteFailed;
                };
                check_node(&registry, prober.as_ref(), &node, timeout).await
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(NodeOutcome::Written(ProbeResult::Active { .. })) => report.active += 1,
                Ok(NodeOutcome::Written(ProbeResult::Dead { .. })) => report.dead += 1,
                Ok(NodeOutcome::Missing) => report.missing += 1,
                Ok(NodeOutcome::WriteFailed) => report.failures += 1,
                Err(e) => {
                    tracing::error!(error = %e, "watchdog probe task failed");
                    report.failures += 1;
                }
            }
        }

        if let Err(e) = self.registry.flush().await {
            tracing::error!(error = %e, "flushing health writes failed");
            report.flush_failed = true;
        }

        report.elapsed_ms = clock.elapsed().as_millis() as u64;
        tracing::info!(
            checked = report.checked,
            active = report.active,
            dead = report.dead,
            missing = report.missing,
            failures = report.failures,
            flush_failed = report.flush_failed,
            elapsed_ms = report.elapsed_ms,
            "watchdog cycle finished"
        );
        *self.last_report.write() = Some(report.clone());
        CycleOutcome::Completed(report)
    }

    /// Drive cycles on a fixed period until `cancel` fires.
    ///
    /// Each tick launches a cycle in its own task so the timer keeps
    /// running; a tick landing on a busy cycle is dropped.
    pub fn spawn(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.settings.interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            tracing::info!(
                interval_ms = self.settings.interval.as_millis() as u64,
                probe_timeout_ms = self.settings.probe_timeout.as_millis() as u64,
                pool_size = self.settings.pool_size,
                "watchdog started"
            );

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::info!("watchdog stopped");
                        break;
                    }
                    _ = interval.tick() => {
                        if self.is_running() {
                            tracing::debug!("watchdog tick dropped, previous cycle still running");
                            continue;
                        }
                        let this = self.clone();
                        tokio::spawn(async move {
                            this.run_cycle().await;
                        });
                    }
                }
            }
        })
    }
}

async fn check_node(
    registry: &NodeRegistry,
    prober: &dyn Prober,
    node: &Node,
    timeout: Duration,
) -> NodeOutcome {
    let result = prober.probe(node, timeout).await;
    if let ProbeResult::Dead { reason } = &result {
        tracing::warn!(node_id = %node.id, addr = %node.authority(), reason = %reason, "node failed check");
    }

    match registry
        .update_health(&node.id, result.to_health_update(Utc::now()))
        .await
    {
        Ok(true) => NodeOutcome::Written(result),
        Ok(false) => {
            tracing::warn!(node_id = %node.id, "node vanished before its health write");
            NodeOutcome::Missing
        }
        Err(e) => {
            tracing::error!(node_id = %node.id, error = %e, "node health write failed");
            NodeOutcome::WriteFailed
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::AtomicUsize;

    use async_trait::async_trait;
    use pm_domain::error::{Error, Result};
    use pm_domain::{HealthUpdate, NodeRegistration, NodeStatus, Protocol};
    use pm_store::{MemoryStore, NodeQuery, NodeStore};
    use tokio::sync::Notify;

    use crate::prober::ProbeFailure;

    fn node(id: &str) -> Node {
        Node {
            id: id.into(),
            ip: "10.0.0.1".into(),
            port: 8080,
            protocol: Protocol::Http,
            status: NodeStatus::Dead,
            latency: 0,
            last_checked: None,
            country: None,
        }
    }

    fn settings(pool_size: usize) -> WatchdogSettings {
        WatchdogSettings {
            interval: Duration::from_millis(50),
            probe_timeout: Duration::from_millis(100),
            pool_size,
        }
    }

    fn dead() -> ProbeResult {
        ProbeResult::Dead {
            reason: ProbeFailure::Timeout,
        }
    }

    /// Fixed answers per node id; unknown ids are dead.
    struct ScriptedProber(HashMap<String, ProbeResult>);

    #[async_trait]
    impl Prober for ScriptedProber {
        async fn probe(&self, node: &Node, _timeout: Duration) -> ProbeResult {
            self.0.get(&node.id).cloned().unwrap_or_else(dead)
        }
    }

    /// Blocks every probe until released.
    struct GatedProber {
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl Prober for GatedProber {
        async fn probe(&self, _node: &Node, _timeout: Duration) -> ProbeResult {
            self.entered.notify_one();
            self.release.notified().await;
            ProbeResult::Active { latency_ms: 1 }
        }
    }

    /// Records the peak number of concurrent probes.
    #[derive(Default)]
    struct CountingProber {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl Prober for CountingProber {
        async fn probe(&self, _node: &Node, _timeout: Duration) -> ProbeResult {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            ProbeResult::Active { latency_ms: 20 }
        }
    }

    /// Memory store that counts health writes and can fail them per id.
    struct InstrumentedStore {
        inner: MemoryStore,
        writes: AtomicUsize,
        flushes: AtomicUsize,
        fail_for: Option<String>,
    }

    impl InstrumentedStore {
        fn new(nodes: Vec<Node>, fail_for: Option<&str>) -> Self {
            Self {
                inner: MemoryStore::with_data(nodes, vec![]),
                writes: AtomicUsize::new(0),
                flushes: AtomicUsize::new(0),
                fail_for: fail_for.map(String::from),
            }
        }
    }

    #[async_trait]
    impl NodeStore for InstrumentedStore {
        async fn get_node(&self, id: &str) -> Result<Option<Node>> {
            self.inner.get_node(id).await
        }

        async fn upsert_node(&self, node: Node) -> Result<()> {
            self.inner.upsert_node(node).await
        }

        async fn register_node(&self, registration: NodeRegistration) -> Result<Node> {
            self.inner.register_node(registration).await
        }

        async fn update_health(&self, id: &str, update: HealthUpdate) -> Result<bool> {
            if self.fail_for.as_deref() == Some(id) {
                return Err(Error::Store("disk full".into()));
            }
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.inner.update_health(id, update).await
        }

        async fn query_nodes(&self, query: &NodeQuery) -> Result<Vec<Node>> {
            self.inner.query_nodes(query).await
        }

        async fn flush(&self) -> Result<()> {
            self.flushes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn completed(outcome: CycleOutcome) -> CycleReport {
        match outcome {
            CycleOutcome::Completed(report) => report,
            other => panic!("expected completed cycle, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn cycle_classifies_and_writes_every_node() {
        let store = Arc::new(MemoryStore::with_data(vec![node("a"), node("b")], vec![]));
        let registry = NodeRegistry::new(store);
        let prober = ScriptedProber(HashMap::from([(
            "a".to_string(),
            ProbeResult::Active { latency_ms: 42 },
        )]));
        let watchdog = Watchdog::new(registry.clone(), Arc::new(prober), settings(4));

        let report = completed(watchdog.run_cycle().await);
        assert_eq!(report.checked, 2);
        assert_eq!(report.active, 1);
        assert_eq!(report.dead, 1);
        assert_eq!(report.failures, 0);

        let a = registry.get("a").await.unwrap().unwrap();
        assert_eq!(a.status, NodeStatus::Active);
        assert_eq!(a.latency, 42);
        assert!(a.last_checked.is_some());

        let b = registry.get("b").await.unwrap().unwrap();
        assert_eq!(b.status, NodeStatus::Dead);
        assert_eq!(b.latency, 0);
        assert!(b.last_checked.is_some());

        assert!(!watchdog.is_running());
        assert_eq!(watchdog.last_report(), Some(report));
    }

    #[tokio::test]
    async fn empty_registry_completes_with_zero_counts() {
        let registry = NodeRegistry::new(Arc::new(MemoryStore::new()));
        let watchdog = Watchdog::new(registry, Arc::new(ScriptedProber(HashMap::new())), settings(4));
        let report = completed(watchdog.run_cycle().await);
        assert_eq!(report.checked, 0);
        assert_eq!(report.active + report.dead, 0);
    }

    #[tokio::test]
    async fn second_trigger_while_running_is_dropped() {
        let store = Arc::new(InstrumentedStore::new(vec![node("a"), node("b")], None));
        let registry = NodeRegistry::new(store.clone());
        let prober = Arc::new(GatedProber {
            entered: Notify::new(),
            release: Notify::new(),
        });
        let watchdog = Arc::new(Watchdog::new(registry, prober.clone(), settings(1)));

        let first = {
            let watchdog = watchdog.clone();
            tokio::spawn(async move { watchdog.run_cycle().await })
        };
        prober.entered.notified().await;
        assert!(watchdog.is_running());

        assert_eq!(watchdog.run_cycle().await, CycleOutcome::Skipped);

        // Pool size 1: release the probes one at a time.
        prober.release.notify_one();
        prober.entered.notified().await;
        prober.release.notify_one();

        let report = completed(first.await.unwrap());
        assert_eq!(report.active, 2);
        assert_eq!(store.writes.load(Ordering::SeqCst), 2);
        assert_eq!(store.flushes.load(Ordering::SeqCst), 1);
        assert!(!watchdog.is_running());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn fan_out_respects_pool_size() {
        let nodes: Vec<Node> = (0..12).map(|i| node(&format!("n{i}"))).collect();
        let registry = NodeRegistry::new(Arc::new(MemoryStore::with_data(nodes, vec![])));
        let prober = Arc::new(CountingProber::default());
        let watchdog = Watchdog::new(registry, prober.clone(), settings(3));

        let report = completed(watchdog.run_cycle().await);
        assert_eq!(report.active, 12);
        let peak = prober.peak.load(Ordering::SeqCst);
        assert!(peak <= 3, "peak in-flight probes was {peak}");
        assert!(peak >= 1);
    }

    #[tokio::test]
    async fn store_failure_does_not_abort_cycle() {
        let store = Arc::new(InstrumentedStore::new(
            vec![node("a"), node("b"), node("c")],
            Some("b"),
        ));
        let registry = NodeRegistry::new(store.clone());
        let prober = ScriptedProber(HashMap::from([
            ("a".to_string(), ProbeResult::Active { latency_ms: 5 }),
            ("b".to_string(), ProbeResult::Active { latency_ms: 5 }),
            ("c".to_string(), ProbeResult::Active { latency_ms: 5 }),
        ]));
        let watchdog = Watchdog::new(registry.clone(), Arc::new(prober), settings(2));

        let report = completed(watchdog.run_cycle().await);
        assert_eq!(report.active, 2);
        assert_eq!(report.failures, 1);

        let b = registry.get("b").await.unwrap().unwrap();
        assert_eq!(b.status, NodeStatus::Dead);
        assert!(b.last_checked.is_none());
        assert_eq!(
            registry.get("c").await.unwrap().unwrap().status,
            NodeStatus::Active
        );
    }

    #[tokio::test]
    async fn file_store_cycle_is_durable_after_flush() {
        let tmp = tempfile::tempdir().unwrap();
        {
            let store = Arc::new(pm_store::FileStore::open(tmp.path()).unwrap());
            for i in 0..20 {
                store.upsert_node(node(&format!("n{i:02}"))).await.unwrap();
            }
            let prober = ScriptedProber(
                (0..20)
                    .map(|i| (format!("n{i:02}"), ProbeResult::Active { latency_ms: 11 }))
                    .collect(),
            );
            let watchdog = Watchdog::new(NodeRegistry::new(store.clone()), Arc::new(prober), settings(8));
            let report = completed(watchdog.run_cycle().await);
            assert_eq!(report.active, 20);
            assert!(!report.flush_failed);
            assert!(!store.has_pending_writes());
        }

        let reopened = pm_store::FileStore::open(tmp.path()).unwrap();
        let nodes = reopened.query_nodes(&NodeQuery::all()).await.unwrap();
        assert!(nodes.iter().all(|n| n.status == NodeStatus::Active && n.latency == 11));
    }

    #[tokio::test(start_paused = true)]
    async fn spawned_loop_runs_until_cancelled() {
        let registry = NodeRegistry::new(Arc::new(MemoryStore::with_data(vec![node("a")], vec![])));
        let prober = ScriptedProber(HashMap::from([(
            "a".to_string(),
            ProbeResult::Active { latency_ms: 3 },
        )]));
        let watchdog = Arc::new(Watchdog::new(registry.clone(), Arc::new(prober), settings(1)));
        let cancel = CancellationToken::new();
        let handle = watchdog.clone().spawn(cancel.clone());

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(watchdog.last_report().is_some());
        assert_eq!(
            registry.get("a").await.unwrap().unwrap().status,
            NodeStatus::Active
        );

        cancel.cancel();
        handle.await.unwrap();
    }
}
