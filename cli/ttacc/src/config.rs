//! Locating and loading `ttacc.toml`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tta_backend::BackendConfig;

pub const CONFIG_FILE: &str = "ttacc.toml";

/// Search `start_dir` and its parents for `ttacc.toml`.
pub fn find_config(start_dir: &Path) -> Option<PathBuf> {
    let mut dir = start_dir.to_path_buf();
    loop {
        let candidate = dir.join(CONFIG_FILE);
        if candidate.is_file() {
            return Some(candidate);
        }
        if !dir.pop() {
            return None;
        }
    }
}

/// Load the configuration: an explicit `--config` file, else the nearest
/// `ttacc.toml`, else defaults. Environment overrides apply in every case.
pub fn load_config(explicit: Option<&Path>, cwd: &Path) -> Result<(BackendConfig, Option<PathBuf>)> {
    let path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => find_config(cwd),
    };
    match path {
        Some(path) => {
            let config = BackendConfig::load(&path)
                .with_context(|| format!("loading {}", path.display()))?;
            Ok((config, Some(path)))
        }
        None => Ok((BackendConfig::from_env(), None)),
    }
}
