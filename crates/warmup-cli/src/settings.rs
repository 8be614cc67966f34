use anyhow::Context;
use std::path::{Path, PathBuf};
use warmup_core::WarmupConfig;

/// Config file picked up from the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "warmup.yaml";

/// Resolve the effective configuration.
///
/// Priority (later wins):
/// 1. Built-in defaults
/// 2. `--config` flag / `WARMUP_CONFIG`, else `./warmup.yaml` if present
/// 3. `WARMUP_API_URL`
/// 4. `--api-url`
pub fn resolve_config(explicit: Option<&Path>, api_url: Option<&str>) -> anyhow::Result<WarmupConfig> {
    let mut config = match config_path(explicit) {
        Some(path) => WarmupConfig::load(&path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => WarmupConfig::default(),
    };

    config.apply_env();
    if let Some(url) = api_url {
        config.base_url = url.to_string();
    }
    Ok(config)
}

fn config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(p) = explicit {
        return Some(p.to_path_buf());
    }
    let candidate = std::env::current_dir().ok()?.join(DEFAULT_CONFIG_FILE);
    candidate.is_file().then_some(candidate)
}
