//! One timed liveness check against one node.

use std::fmt;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pm_domain::error::{Error, Result};
use pm_domain::{HealthUpdate, Node};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Result types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Why a probe classified a node as dead.  Logged, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeFailure {
    Timeout,
    Connect(String),
    Transport(String),
}

impl fmt::Display for ProbeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => f.write_str("timed out"),
            Self::Connect(e) => write!(f, "connect failed: {e}"),
            Self::Transport(e) => write!(f, "transport error: {e}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeResult {
    Active { latency_ms: u64 },
    Dead { reason: ProbeFailure },
}

impl ProbeResult {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active { .. })
    }

    /// The health write this result turns into.
    pub fn to_health_update(&self, checked_at: DateTime<Utc>) -> HealthUpdate {
        match self {
            Self::Active { latency_ms } => HealthUpdate::active(*latency_ms, checked_at),
            Self::Dead { .. } => HealthUpdate::dead(checked_at),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Prober trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Implementations must not mutate shared state; the scheduler calls
/// `probe` concurrently.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, node: &Node, timeout: Duration) -> ProbeResult;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// HTTP prober
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// `GET {scheme}://{ip}:{port}/`.  Any HTTP response inside the timeout
/// counts as alive, whatever its status code.  Latency runs from dispatch
/// until response headers arrive.
pub struct HttpProber {
    client: reqwest::Client,
}

impl HttpProber {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .pool_max_idle_per_host(0)
            .build()
            .map_err(|e| Error::Http(format!("building probe client: {e}")))?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn url(node: &Node) -> String {
        format!("{}://{}/", node.protocol.scheme(), node.authority())
    }
}

#[async_trait]
impl Prober for HttpProber {
    async fn probe(&self, node: &Node, timeout: Duration) -> ProbeResult {
        let started = Instant::now();
        let request = self.client.get(Self::url(node)).timeout(timeout).send();

        // The outer timeout also covers DNS and connect, which the
        // per-request timeout does not always bound.
        match tokio::time::timeout(timeout, request).await {
            Err(_) => ProbeResult::Dead {
                reason: ProbeFailure::Timeout,
            },
            Ok(Ok(_response)) => ProbeResult::Active {
                latency_ms: started.elapsed().as_millis() as u64,
            },
            Ok(Err(e)) => ProbeResult::Dead {
                reason: classify(&e),
            },
        }
    }
}

fn classify(e: &reqwest::Error) -> ProbeFailure {
    if e.is_timeout() {
        ProbeFailure::Timeout
    } else if e.is_connect() {
        ProbeFailure::Connect(e.to_string())
    } else {
        ProbeFailure::Transport(e.to_string())
    }
}
