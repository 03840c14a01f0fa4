//! CLI subcommands.

pub mod config;
pub mod ingest;
pub mod records;
pub mod send;

use std::path::{Path, PathBuf};

use ocrledger_core::LedgerConfig;

/// Default config location: `{config_dir}/ocrledger/config.json`.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ocrledger")
        .join("config.json")
}

/// Load the config from an explicit path, the default location, or
/// defaults, then overlay environment secrets.
pub fn load_config(config_path: Option<&str>) -> anyhow::Result<LedgerConfig> {
    let config = if let Some(path) = config_path {
        LedgerConfig::from_file(Path::new(path))?
    } else {
        let default = default_config_path();
        if default.exists() {
            LedgerConfig::from_file(&default)?
        } else {
            LedgerConfig::default()
        }
    };
    Ok(config.apply_env())
}
