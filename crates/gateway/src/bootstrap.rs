//! AppState construction and background-task spawning extracted from `main.rs`.
//!
//! `serve`, `watchdog` and `seed` share the same boot path so the store,
//! seed and prober are wired identically everywhere.

use std::sync::Arc;

use anyhow::Context;
use sha2::{Digest, Sha256};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use pm_domain::config::{Config, ConfigSeverity};
use pm_store::{SeedFile, StoreHandles};
use pm_watchdog::{HttpProber, Prober, Watchdog, WatchdogSettings};

use crate::selector::Selector;
use crate::state::AppState;
use crate::tokens::{HttpTokenIssuer, StaticTokenIssuer, TokenIssuer};

/// Validate config, open the store, apply the seed and return a
/// fully-wired [`AppState`].
pub async fn build_app_state(config: Arc<Config>) -> anyhow::Result<AppState> {
    // ── Config validation ────────────────────────────────────────────
    check_config(&config)?;

    // ── Store ────────────────────────────────────────────────────────
    let handles = open_store(&config).await?;

    // ── Prober ───────────────────────────────────────────────────────
    let prober: Arc<dyn Prober> =
        Arc::new(HttpProber::new().context("creating HTTP prober")?);

    // ── Token issuer ─────────────────────────────────────────────────
    let tokens: Arc<dyn TokenIssuer> = match &config.tokens.issuer_url {
        Some(url) => {
            tracing::info!(url = %url, "session tokens issued by external service");
            Arc::new(
                HttpTokenIssuer::new(url.clone(), config.tokens.timeout())
                    .context("creating token issuer client")?,
            )
        }
        None => {
            tracing::warn!(
                fallback = %config.tokens.fallback_token,
                "no token issuer configured; using fallback session token"
            );
            Arc::new(StaticTokenIssuer::new(config.tokens.fallback_token.clone()))
        }
    };

    // ── Admin token (read once, hash for constant-time comparison) ──
    // Priority: config.server.admin_token > env var (server.admin_token_env)
    let admin_token_hash = {
        let env_var = &config.server.admin_token_env;
        let token = config
            .server
            .admin_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .map(|t| ("config".to_string(), t.to_string()))
            .or_else(|| {
                std::env::var(env_var)
                    .ok()
                    .filter(|t| !t.is_empty())
                    .map(|t| (format!("env:{env_var}"), t))
            });
        match token {
            Some((source, t)) => {
                tracing::info!(source = %source, "admin bearer-token auth enabled");
                Some(Sha256::digest(t.as_bytes()).to_vec())
            }
            None => {
                tracing::warn!(
                    "admin bearer-token auth DISABLED; set server.admin_token in config.toml or {env_var} env var"
                );
                None
            }
        }
    };

    Ok(assemble(config, handles, prober, tokens, admin_token_hash))
}

/// Wire an [`AppState`] from already-built parts.
pub fn assemble(
    config: Arc<Config>,
    handles: StoreHandles,
    prober: Arc<dyn Prober>,
    tokens: Arc<dyn TokenIssuer>,
    admin_token_hash: Option<Vec<u8>>,
) -> AppState {
    let watchdog = Arc::new(Watchdog::new(
        handles.nodes.clone(),
        prober,
        WatchdogSettings::from_config(&config.watchdog),
    ));

    AppState {
        selector: Selector::new(handles.nodes.clone()),
        nodes: handles.nodes,
        vendors: handles.vendors,
        tokens,
        watchdog,
        admin_token_hash,
        config,
    }
}

/// Log every config issue; fail on errors.
pub fn check_config(config: &Config) -> anyhow::Result<()> {
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues
                .iter()
                .filter(|i| i.severity == ConfigSeverity::Error)
                .count()
        );
    }
    Ok(())
}

/// Open the configured backend and apply `store.seed` if set.
pub async fn open_store(config: &Config) -> anyhow::Result<StoreHandles> {
    let handles = pm_store::open(&config.store).context("opening node store")?;

    if let Some(path) = &config.store.seed {
        let seed = SeedFile::load(path)
            .with_context(|| format!("loading seed file {}", path.display()))?;
        let report = seed
            .apply(&handles.nodes, &handles.vendors)
            .await
            .context("applying seed file")?;
        tracing::info!(
            path = %path.display(),
            nodes = report.nodes,
            vendors = report.vendors,
            "seed applied"
        );
    }

    Ok(handles)
}

/// Spawn the watchdog loop when enabled.  Cancelled via `shutdown`.
pub fn spawn_background_tasks(
    state: &AppState,
    shutdown: CancellationToken,
) -> Option<JoinHandle<()>> {
    if !state.config.watchdog.enabled {
        tracing::warn!("watchdog disabled by config; node health will not be refreshed");
        return None;
    }
    Some(state.watchdog.clone().spawn(shutdown))
}
