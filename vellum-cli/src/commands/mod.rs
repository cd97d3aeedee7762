//! CLI subcommand implementations.

pub mod clean;
pub mod render;
pub mod status;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use vellum_core::SettingsPatch;

/// Locate the settings file: an explicit `--config` path wins, then
/// `vellum.yaml` in the working directory, then the per-user config dir.
fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let local = PathBuf::from("vellum.yaml");
    if local.exists() {
        return Some(local);
    }
    let user = dirs::config_dir()?.join("vellum").join("vellum.yaml");
    if user.exists() {
        return Some(user);
    }
    None
}

/// Load the YAML settings file as a [`SettingsPatch`]. A missing file is
/// only an error when it was named explicitly.
fn load_config(explicit: Option<&Path>) -> Result<SettingsPatch> {
    let Some(path) = resolve_config_path(explicit) else {
        return Ok(SettingsPatch::default());
    };
    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    serde_yaml::from_str(&raw)
        .with_context(|| format!("invalid settings in {}", path.display()))
}
