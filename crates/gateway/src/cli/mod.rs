pub mod config;
pub mod seed;
pub mod watchdog;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// ProxyManager: relay node health checks and best-node selection.
#[derive(Debug, Parser)]
#[command(name = "proxymanager", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the API server and the embedded watchdog (default when no
    /// subcommand is given).
    Serve,
    /// Run the watchdog without the API server.
    Watchdog {
        /// Run a single cycle, print its report and exit.
        #[arg(long)]
        once: bool,
    },
    /// Register the nodes and vendors listed in a TOML seed file.
    Seed {
        /// Path to the seed file.
        file: PathBuf,
    },
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print version information.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
}

// ── Config loading helper ─────────────────────────────────────────────

/// Load the configuration from the path specified by `PM_CONFIG` (or
/// `config.toml` by default).  A missing file yields the defaults.
/// Returns the parsed [`Config`](pm_domain::config::Config) and the path
/// that was used.
pub fn load_config() -> anyhow::Result<(pm_domain::config::Config, String)> {
    let config_path =
        std::env::var("PM_CONFIG").unwrap_or_else(|_| "config.toml".into());

    let config = if std::path::Path::new(&config_path).exists() {
        let raw = std::fs::read_to_string(&config_path)
            .map_err(|e| anyhow::anyhow!("reading {config_path}: {e}"))?;
        toml::from_str(&raw)
            .map_err(|e| anyhow::anyhow!("parsing {config_path}: {e}"))?
    } else {
        pm_domain::config::Config::default()
    };

    Ok((config, config_path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_parses() {
        let cli = Cli::try_parse_from(["proxymanager"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn watchdog_once_flag() {
        let cli = Cli::try_parse_from(["proxymanager", "watchdog", "--once"]).unwrap();
        assert!(matches!(cli.command, Some(Command::Watchdog { once: true })));
    }

    #[test]
    fn seed_requires_a_file() {
        assert!(Cli::try_parse_from(["proxymanager", "seed"]).is_err());
        let cli = Cli::try_parse_from(["proxymanager", "seed", "nodes.toml"]).unwrap();
        match cli.command {
            Some(Command::Seed { file }) => assert_eq!(file, PathBuf::from("nodes.toml")),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn config_subcommands_parse() {
        let cli = Cli::try_parse_from(["proxymanager", "config", "validate"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Command::Config(ConfigCommand::Validate))
        ));
    }
}
