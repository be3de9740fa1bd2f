use std::path::Path;

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File, FileFormat};
use resources::config::DiscovererConfig;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/gke-discoverer.yml";
const ENV_PREFIX: &str = "GKE_DISCOVERER";

/// Load the discoverer config from `path` (optional on disk), overridden by
/// `GKE_DISCOVERER_*` environment variables.
pub fn load(path: &Path) -> Result<DiscovererConfig> {
    let config = Config::builder()
        .add_source(
            File::new(&path.to_string_lossy(), FileFormat::Yaml).required(false),
        )
        .add_source(Environment::with_prefix(ENV_PREFIX))
        .build()
        .with_context(|| format!("Failed to read config {}", path.display()))?
        .try_deserialize::<DiscovererConfig>()
        .with_context(|| "Failed to parse config".to_string())?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &DiscovererConfig) -> Result<()> {
    if config.gcp_project.trim().is_empty() {
        bail!("Please supply a GCP project (gcp_project)");
    }
    if config.poll_time == 0 {
        bail!("poll_time must be at least one second");
    }
    Ok(())
}
