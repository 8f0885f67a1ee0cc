pub mod build;
pub mod doctor;
pub mod onboard;
pub mod run;

use std::path::{Path, PathBuf};

use anyhow::Context;
use glyphsmith_config::AppConfig;

/// The config file in effect: `--config` if given, else the default location.
pub fn config_path(explicit: Option<&Path>) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"))
}

/// Load and validate configuration, applying environment overrides.
pub fn load_config(explicit: Option<&Path>) -> anyhow::Result<AppConfig> {
    let path = config_path(explicit);
    AppConfig::load_with_env(&path).with_context(|| format!("loading {}", path.display()))
}
