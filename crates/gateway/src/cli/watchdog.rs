//! `proxymanager watchdog`: the scheduler without the API server.
//!
//! The file store locks its directory, so this refuses to start against
//! the same `store.path` as a live `serve`.

use std::sync::Arc;

use pm_domain::config::Config;
use pm_watchdog::CycleOutcome;
use tokio_util::sync::CancellationToken;

use crate::bootstrap;

/// Run one cycle and print the report as JSON.
pub async fn run_once(config: Arc<Config>) -> anyhow::Result<()> {
    let state = bootstrap::build_app_state(config).await?;
    match state.watchdog.run_cycle().await {
        CycleOutcome::Completed(report) => {
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        CycleOutcome::ListFailed(e) => anyhow::bail!("watchdog cycle failed: {e}"),
        CycleOutcome::Skipped => anyhow::bail!("watchdog cycle skipped"),
    }
}

/// Run cycles until `shutdown` fires.
pub async fn run_loop(config: Arc<Config>, shutdown: CancellationToken) -> anyhow::Result<()> {
    let state = bootstrap::build_app_state(config).await?;
    let handle = state.watchdog.clone().spawn(shutdown);
    handle.await?;
    state.nodes.flush().await?;
    Ok(())
}
