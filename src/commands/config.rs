use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

use trackline::EngineConfig;

/// Write the default configuration to `write`, or print the effective one
#[tracing::instrument(skip_all)]
pub async fn handle_config(effective: &EngineConfig, write: Option<&Path>) -> Result<()> {
    match write {
        Some(path) => {
            if path.exists() {
                anyhow::bail!("Refusing to overwrite existing config file {:?}", path);
            }
            EngineConfig::default().save(path)?;
            info!("Wrote default configuration to {:?}", path);
        }
        None => {
            let contents = toml::to_string_pretty(effective)
                .context("Failed to serialize config to TOML")?;
            print!("{}", contents);
        }
    }
    Ok(())
}
