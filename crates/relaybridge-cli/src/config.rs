use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use relaybridge_core::config::RelaybridgeConfig;

pub fn home_dir() -> PathBuf {
    PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".to_string()))
}

pub fn relaybridge_dir() -> PathBuf {
    home_dir().join(".relaybridge")
}

pub fn profiles_dir() -> PathBuf {
    relaybridge_dir().join("profiles")
}

pub fn default_config_path() -> PathBuf {
    relaybridge_dir().join("relaybridge.toml")
}

pub fn profile_path(name: &str) -> PathBuf {
    profiles_dir().join(format!("{name}.toml"))
}

/// Resolves the config path from an explicit `--config`, else a named
/// `--profile`, else the default location, then loads and validates it.
pub fn resolve_config(config: Option<&str>, profile: Option<&str>) -> Result<RelaybridgeConfig> {
    let path = if let Some(p) = config {
        PathBuf::from(p)
    } else if let Some(name) = profile {
        let p = profile_path(name);
        if !p.exists() {
            bail!("profile '{name}' not found at {}", p.display());
        }
        p
    } else {
        default_config_path()
    };

    RelaybridgeConfig::load(path.to_str())
        .with_context(|| format!("loading config from {}", path.display()))
}
