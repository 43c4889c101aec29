//! `ttacc fingerprint` — print a machine's plugin cache key.

use std::path::Path;

use anyhow::{Context, Result};
use tta_backend::{BackendConfig, PluginFingerprint};
use tta_machine::load_machine_toml;

pub fn run(config: &BackendConfig, machine: &Path) -> Result<()> {
    let description = load_machine_toml(machine)
        .with_context(|| format!("loading machine {}", machine.display()))?;
    let fingerprint = PluginFingerprint::compute(&description, &config.toolchain_version)?;
    println!("{fingerprint}");
    let artifact = config.cache_dir.join(fingerprint.as_str());
    if config.cache_enabled && artifact.is_file() {
        println!("cached at {}", artifact.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tta_machine::{write_machine_toml, MachineDescription};

    #[test]
    fn prints_fingerprint() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.machine.toml");
        write_machine_toml(&MachineDescription::minimal(), &path).unwrap();
        let config = BackendConfig {
            cache_dir: dir.path().join("cache"),
            ..BackendConfig::default()
        };
        run(&config, &path).unwrap();
    }
}
