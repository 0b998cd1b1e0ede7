mod observability;
mod server;
mod store;
mod tokens;
mod watchdog;

pub use observability::*;
pub use server::*;
pub use store::*;
pub use tokens::*;
pub use watchdog::*;

use serde::{Deserialize, Serialize};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub watchdog: WatchdogConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub tokens: TokensConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl ConfigError {
    fn error(field: &str, message: impl Into<String>) -> Self {
        Self {
            severity: ConfigSeverity::Error,
            field: field.into(),
            message: message.into(),
        }
    }

    fn warning(field: &str, message: impl Into<String>) -> Self {
        Self {
            severity: ConfigSeverity::Warning,
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.server.port == 0 {
            errors.push(ConfigError::error("server.port", "port must be greater than 0"));
        }
        if self.server.host.is_empty() {
            errors.push(ConfigError::error("server.host", "host must not be empty"));
        }
        if self.server.max_concurrent_requests == 0 {
            errors.push(ConfigError::error(
                "server.max_concurrent_requests",
                "must be greater than 0",
            ));
        }

        // Watchdog timing.
        if self.watchdog.interval_ms == 0 {
            errors.push(ConfigError::error(
                "watchdog.interval_ms",
                "interval must be greater than 0",
            ));
        }
        if self.watchdog.probe_timeout_ms == 0 {
            errors.push(ConfigError::error(
                "watchdog.probe_timeout_ms",
                "probe timeout must be greater than 0",
            ));
        }
        if self.watchdog.interval_ms > 0 && self.watchdog.probe_timeout_ms >= self.watchdog.interval_ms {
            errors.push(ConfigError::warning(
                "watchdog.probe_timeout_ms",
                "probe timeout is not shorter than the cycle interval; ticks will be dropped while cycles overlap",
            ));
        }
        if !(MIN_POOL_SIZE..=MAX_POOL_SIZE).contains(&self.watchdog.pool_size) {
            errors.push(ConfigError::warning(
                "watchdog.pool_size",
                format!(
                    "pool_size {} is outside {MIN_POOL_SIZE}..={MAX_POOL_SIZE} and will be clamped",
                    self.watchdog.pool_size
                ),
            ));
        }
        if !self.watchdog.enabled {
            errors.push(ConfigError::warning(
                "watchdog.enabled",
                "watchdog disabled; node health will never change",
            ));
        }

        // Store.
        if self.store.backend == StoreBackend::File && self.store.path.as_os_str().is_empty() {
            errors.push(ConfigError::error(
                "store.path",
                "file backend requires a non-empty path",
            ));
        }
        if self.store.backend == StoreBackend::Memory && self.store.seed.is_none() {
            errors.push(ConfigError::warning(
                "store.seed",
                "memory backend without a seed file starts empty",
            ));
        }

        // Token issuer.
        match self.tokens.issuer_url.as_deref() {
            Some(url) if !(url.starts_with("http://") || url.starts_with("https://")) => {
                errors.push(ConfigError::error(
                    "tokens.issuer_url",
                    "issuer_url must start with http:// or https://",
                ));
            }
            Some(_) => {}
            None => {
                errors.push(ConfigError::warning(
                    "tokens.issuer_url",
                    "no token issuer configured; select-node returns the fallback token",
                ));
            }
        }

        // Observability.
        if !(0.0..=1.0).contains(&self.observability.sample_rate) {
            errors.push(ConfigError::error(
                "observability.sample_rate",
                "sample_rate must be between 0.0 and 1.0",
            ));
        }

        errors
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
