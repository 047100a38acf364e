use anyhow::Context;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

/// Env var with path to the YAML config
pub const CONFIG_ENV: &str = "LIFECYCLE_CONFIG";

pub fn find_config_path() -> Option<PathBuf> {
    std::env::var_os(CONFIG_ENV).map(PathBuf::from)
}

/// Parses YAML config at `path`.
pub fn load_yaml<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    serde_yaml::from_str(&data).with_context(|| format!("invalid config {}", path.display()))
}

/// Loads config from the file named by `LIFECYCLE_CONFIG`.
/// If variable is not set, returns `T::default()`.
pub fn load_cfg<T: DeserializeOwned + Default>() -> anyhow::Result<T> {
    match find_config_path() {
        Some(path) => load_yaml(&path),
        None => Ok(T::default()),
    }
}
