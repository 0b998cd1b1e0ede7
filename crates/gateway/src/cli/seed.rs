//! `proxymanager seed <file>`: bulk registration from a TOML seed file.

use std::path::Path;

use anyhow::Context;

use pm_domain::config::Config;
use pm_store::SeedFile;

pub async fn run(config: &Config, file: &Path) -> anyhow::Result<()> {
    let seed = SeedFile::load(file).with_context(|| format!("loading {}", file.display()))?;
    let handles = pm_store::open(&config.store).context("opening node store")?;
    let report = seed
        .apply(&handles.nodes, &handles.vendors)
        .await
        .context("applying seed")?;

    println!(
        "Seeded {} node(s) and {} vendor(s) from {}",
        report.nodes,
        report.vendors,
        file.display(),
    );
    Ok(())
}
