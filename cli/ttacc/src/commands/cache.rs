//! `ttacc cache` — inspect and clear the plugin cache.

use anyhow::Result;
use tta_backend::{BackendConfig, PluginCache};

pub fn list(config: BackendConfig) -> Result<()> {
    let cache = PluginCache::new(config);
    let entries = cache.list_entries()?;
    println!("Cache: {}", cache.config().cache_dir.display());
    if entries.is_empty() {
        println!("  (empty)");
    }
    for entry in &entries {
        println!("  {}  {} bytes", entry.file_name, entry.size_bytes);
    }
    Ok(())
}

pub fn clear(config: BackendConfig) -> Result<()> {
    let cache = PluginCache::new(config);
    let removed = cache.clear()?;
    println!(
        "Removed {removed} plugin(s) from {}",
        cache.config().cache_dir.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tta_backend::plugin_extension;

    #[test]
    fn clear_removes_plugins() {
        let dir = tempfile::tempdir().unwrap();
        let config = BackendConfig {
            cache_dir: dir.path().to_path_buf(),
            ..BackendConfig::default()
        };
        let plugin = dir.path().join(format!("10_ab-0.1.0{}", plugin_extension()));
        std::fs::write(&plugin, b"data").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"keep").unwrap();

        list(config.clone()).unwrap();
        clear(config).unwrap();
        assert!(!plugin.exists());
        assert!(dir.path().join("notes.txt").exists());
    }

    #[test]
    fn missing_cache_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let config = BackendConfig {
            cache_dir: dir.path().join("none"),
            ..BackendConfig::default()
        };
        list(config).unwrap();
    }
}
