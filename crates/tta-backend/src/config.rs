//! Backend configuration.
//!
//! Everything the plugin cache and the scheduling hand-off need to know
//! about the host: where the cache lives, whether to use it, and where the
//! toolchain is. Values are threaded explicitly into every operation.
//!
//! ```toml
//! cache-dir = "/var/cache/ttacc"
//! cache-enabled = true
//! toolchain-mode = "installed"
//!
//! [toolchain]
//! install-root = "/opt/tta"
//! native-compiler = "c++"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{BackendError, Result};

/// Environment variable overriding [`BackendConfig::cache_dir`].
pub const CACHE_DIR_ENV: &str = "TTA_CACHE_DIR";
/// Environment variable overriding [`ToolchainPaths::install_root`].
pub const INSTALL_ROOT_ENV: &str = "TTA_INSTALL_ROOT";

/// Fixed plugin sources compiled together with the generated tables.
pub const PLUGIN_SOURCES: &[&str] = &[
    "TTARegisterInfo.cc",
    "TTAInstrInfo.cc",
    "TTATargetLowering.cc",
    "TTADAGToDAGISel.cc",
    "TTATargetMachinePlugin.cc",
];

/// Where the table generator, plugin sources and scheduler come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolchainMode {
    /// An installed toolchain under `install-root`.
    #[default]
    Installed,
    /// A development checkout under `source-root`.
    SourceTree,
}

/// Toolchain locations and native compiler settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ToolchainPaths {
    #[serde(default = "default_install_root")]
    pub install_root: PathBuf,
    #[serde(default)]
    pub source_root: Option<PathBuf>,
    /// Explicit table generator binary, overriding the mode's default.
    #[serde(default)]
    pub table_generator: Option<PathBuf>,
    #[serde(default = "default_native_compiler")]
    pub native_compiler: PathBuf,
    #[serde(default = "default_compiler_flags")]
    pub compiler_flags: Vec<String>,
    /// Additional include directories for table generation and compilation.
    #[serde(default)]
    pub include_dirs: Vec<PathBuf>,
    /// External scheduler binary.
    #[serde(default = "default_scheduler")]
    pub scheduler: PathBuf,
}

impl Default for ToolchainPaths {
    fn default() -> Self {
        Self {
            install_root: default_install_root(),
            source_root: None,
            table_generator: None,
            native_compiler: default_native_compiler(),
            compiler_flags: default_compiler_flags(),
            include_dirs: Vec::new(),
            scheduler: default_scheduler(),
        }
    }
}

fn default_install_root() -> PathBuf {
    PathBuf::from("/usr/local")
}

fn default_native_compiler() -> PathBuf {
    PathBuf::from("c++")
}

fn default_compiler_flags() -> Vec<String> {
    vec!["-shared".into(), "-fPIC".into(), "-O2".into()]
}

fn default_scheduler() -> PathBuf {
    PathBuf::from("schedule")
}

fn default_cache_dir() -> PathBuf {
    home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".tta")
        .join("ttacc")
        .join("cache")
}

fn default_true() -> bool {
    true
}

fn default_toolchain_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}

/// Backend configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BackendConfig {
    /// Shared plugin cache directory. Created on demand.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    /// When false, every request regenerates its plugin into a scratch
    /// directory and nothing is written to `cache-dir`.
    #[serde(default = "default_true")]
    pub cache_enabled: bool,
    #[serde(default)]
    pub toolchain_mode: ToolchainMode,
    #[serde(default)]
    pub toolchain: ToolchainPaths,
    /// Version string mixed into plugin fingerprints.
    #[serde(default = "default_toolchain_version")]
    pub toolchain_version: String,
    /// Scheduling plan used when a caller supplies none.
    #[serde(default)]
    pub default_scheduler_plan: Option<PathBuf>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            cache_enabled: true,
            toolchain_mode: ToolchainMode::default(),
            toolchain: ToolchainPaths::default(),
            toolchain_version: default_toolchain_version(),
            default_scheduler_plan: None,
        }
    }
}

impl BackendConfig {
    /// Parse a configuration from TOML text and validate it.
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: BackendConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file, then apply environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| BackendError::Config {
            detail: format!("cannot read {}: {e}", path.display()),
        })?;
        let mut config = Self::from_toml(&text)?;
        config.apply_env();
        Ok(config)
    }

    /// Defaults plus environment overrides.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Apply `TTA_CACHE_DIR` and `TTA_INSTALL_ROOT` when set.
    pub fn apply_env(&mut self) {
        self.apply_overrides(
            std::env::var_os(CACHE_DIR_ENV).map(PathBuf::from),
            std::env::var_os(INSTALL_ROOT_ENV).map(PathBuf::from),
        );
    }

    fn apply_overrides(&mut self, cache_dir: Option<PathBuf>, install_root: Option<PathBuf>) {
        if let Some(dir) = cache_dir {
            self.cache_dir = dir;
        }
        if let Some(root) = install_root {
            self.toolchain.install_root = root;
        }
    }

    /// Check values serde cannot: the version must be semver and a source
    /// tree toolchain needs a source root.
    pub fn validate(&self) -> Result<()> {
        semver::Version::parse(&self.toolchain_version).map_err(|e| BackendError::Config {
            detail: format!("toolchain-version '{}': {e}", self.toolchain_version),
        })?;
        if self.toolchain_mode == ToolchainMode::SourceTree && self.toolchain.source_root.is_none()
        {
            return Err(BackendError::Config {
                detail: "toolchain-mode = \"source-tree\" requires toolchain.source-root".into(),
            });
        }
        Ok(())
    }

    fn source_root(&self) -> PathBuf {
        self.toolchain
            .source_root
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Directory holding the fixed plugin sources and headers.
    pub fn plugin_sources_dir(&self) -> PathBuf {
        match self.toolchain_mode {
            ToolchainMode::Installed => self.toolchain.install_root.join("include").join("ttacc"),
            ToolchainMode::SourceTree => self.source_root().join("src").join("plugin"),
        }
    }

    pub fn plugin_sources(&self) -> Vec<PathBuf> {
        let dir = self.plugin_sources_dir();
        PLUGIN_SOURCES.iter().map(|s| dir.join(s)).collect()
    }

    pub fn table_generator(&self) -> PathBuf {
        if let Some(explicit) = &self.toolchain.table_generator {
            return explicit.clone();
        }
        match self.toolchain_mode {
            ToolchainMode::Installed => self.toolchain.install_root.join("bin").join("tblgen"),
            ToolchainMode::SourceTree => self
                .source_root()
                .join("ext")
                .join("tablegen")
                .join("tblgen"),
        }
    }

    /// Include directories for both table generation and compilation,
    /// after the working directory.
    pub fn include_dirs(&self) -> Vec<PathBuf> {
        let mut dirs = vec![self.plugin_sources_dir()];
        dirs.extend(self.toolchain.include_dirs.iter().cloned());
        dirs
    }
}
