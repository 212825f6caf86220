pub mod env;
pub mod schema;
pub mod validation;

pub use schema::{Config, TransportKind};

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

/// Load the effective config: defaults, then the optional JSON file, then
/// `VIGIL_*` environment overrides, then validation.
pub fn load(path: Option<&Path>) -> Result<Config> {
    let mut config = match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading config file {}", path.display()))?;
            let config: Config = serde_json::from_str(&raw)
                .with_context(|| format!("parsing config file {}", path.display()))?;
            info!(path = %path.display(), "Loaded config file");
            config
        }
        None => Config::default(),
    };

    let vars: std::collections::HashMap<String, String> = std::env::vars().collect();
    env::apply_env_overrides(&mut config, &vars)?;
    validation::validate(&config)?;
    Ok(config)
}
