//! `proxymanager config validate|show`.

use pm_domain::config::{Config, ConfigSeverity, StoreBackend};

/// Placeholder printed instead of the operator token.
const MASK: &str = "********";

/// One line describing where nodes live and how often they are checked.
fn summary(config: &Config) -> String {
    let store = match config.store.backend {
        StoreBackend::Memory => "memory store".to_string(),
        StoreBackend::File => format!("file store at {}", config.store.path.display()),
    };
    let watchdog = if config.watchdog.enabled {
        format!(
            "watchdog every {} ms, {} ms probe timeout, {} concurrent probes",
            config.watchdog.interval_ms, config.watchdog.probe_timeout_ms, config.watchdog.pool_size,
        )
    } else {
        "watchdog disabled".to_string()
    };
    let tokens = match &config.tokens.issuer_url {
        Some(url) => format!("tokens from {url}"),
        None => "fallback session token".to_string(),
    };
    format!("{store}; {watchdog}; {tokens}")
}

/// Print validation issues followed by the deployment summary.
///
/// Returns `false` when any issue is an error, so `main` can exit non-zero.
pub fn validate(config: &Config, config_path: &str) -> bool {
    let issues = config.validate();
    for issue in &issues {
        println!("{issue}");
    }

    let errors = issues
        .iter()
        .filter(|e| e.severity == ConfigSeverity::Error)
        .count();
    if issues.is_empty() {
        println!("{config_path}: OK");
    } else {
        println!(
            "\n{config_path}: {errors} error(s), {} warning(s)",
            issues.len() - errors
        );
    }
    println!("{}", summary(config));

    errors == 0
}

/// Resolved config as TOML, defaults filled in and the admin token masked.
fn render(config: &Config) -> anyhow::Result<String> {
    let mut shown = config.clone();
    if shown.server.admin_token.is_some() {
        shown.server.admin_token = Some(MASK.into());
    }
    toml::to_string_pretty(&shown).map_err(|e| anyhow::anyhow!("serializing config: {e}"))
}

pub fn show(config: &Config) -> anyhow::Result<()> {
    print!("{}", render(config)?);
    Ok(())
}
