//! Command handler modules for essen-cli.
//!
//! Shared utilities used by multiple command paths live here.
//! Command-specific logic lives in the submodules.

pub mod lock;

use anyhow::{Context, Result};
use essen_config::{AppConfig, LoadedConfig};
use essen_kv::MirroredKv;
use std::path::PathBuf;

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Load layered config; no paths means all defaults.
pub fn load_config(config_paths: &[String]) -> Result<(LoadedConfig, AppConfig)> {
    let path_refs: Vec<&str> = config_paths.iter().map(|s| s.as_str()).collect();
    let loaded = essen_config::load_layered_yaml(&path_refs)?;
    let app = loaded.app().context("config has an unexpected shape")?;
    Ok((loaded, app))
}

/// Open the mirrored store under `--store-dir`, or `storage.dir` from config.
pub fn open_store(cfg: &AppConfig, store_dir: Option<PathBuf>) -> (PathBuf, MirroredKv) {
    let dir = store_dir.unwrap_or_else(|| cfg.storage.dir.clone());
    let kv = MirroredKv::open_local(&dir);
    (dir, kv)
}
