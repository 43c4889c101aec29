//! Content-addressed backend plugin cache.
//!
//! Plugins are stored flat in the cache directory, named by their
//! fingerprint:
//! ```text
//! <cache_dir>/
//!   1a3f_<sha256>-0.1.0.so     — compiled plugin
//!   .partial-XXXXXX.so         — in-flight build, renamed on success
//! ```
//!
//! A cached artifact is only a hint. If it fails to load it is rebuilt and
//! replaced. New artifacts are compiled to a private file in the cache
//! directory and renamed over the final name, so readers never observe a
//! partially written plugin.

use std::cell::Cell;
use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use tta_machine::MachineDescription;

use crate::config::BackendConfig;
use crate::error::{BackendError, Result};
use crate::fingerprint::{plugin_extension, PluginFingerprint};
use crate::generator::{BackendGenerator, TableGenKind, TdGenerator};
use crate::loader::{DylibLoader, PluginLoader};
use crate::plugin::TargetPlugin;
use crate::tool::{CommandLine, ProcessInvoker, ToolInvoker};

/// Counters for one cache instance.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Requests served from an existing artifact.
    pub hits: u64,
    /// Requests that built a new artifact.
    pub regenerations: u64,
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} hit(s), {} regeneration(s)",
            self.hits, self.regenerations
        )
    }
}

/// A plugin file found in the cache directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub file_name: String,
    pub path: PathBuf,
    pub size_bytes: u64,
}

/// Produces and caches target plugins.
pub struct PluginCache {
    config: BackendConfig,
    invoker: Box<dyn ToolInvoker>,
    loader: Box<dyn PluginLoader>,
    generator: Box<dyn BackendGenerator>,
    hits: Cell<u64>,
    regenerations: Cell<u64>,
}

impl fmt::Debug for PluginCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginCache")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl PluginCache {
    /// A cache that runs real tools and loads shared objects.
    pub fn new(config: BackendConfig) -> Self {
        Self::with_capabilities(config, Box::new(ProcessInvoker), Box::new(DylibLoader))
    }

    pub fn with_capabilities(
        config: BackendConfig,
        invoker: Box<dyn ToolInvoker>,
        loader: Box<dyn PluginLoader>,
    ) -> Self {
        Self {
            config,
            invoker,
            loader,
            generator: Box::new(TdGenerator),
            hits: Cell::new(0),
            regenerations: Cell::new(0),
        }
    }

    /// Replace the target description generator.
    pub fn with_generator(mut self, generator: Box<dyn BackendGenerator>) -> Self {
        self.generator = generator;
        self
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.get(),
            regenerations: self.regenerations.get(),
        }
    }

    pub fn fingerprint(&self, machine: &MachineDescription) -> Result<PluginFingerprint> {
        PluginFingerprint::compute(machine, &self.config.toolchain_version)
    }

    /// Where the cached artifact for `fingerprint` lives.
    pub fn artifact_path(&self, fingerprint: &PluginFingerprint) -> PathBuf {
        self.config.cache_dir.join(fingerprint.as_str())
    }

    /// Return a plugin for `machine`, building it if no usable cached
    /// artifact exists.
    pub fn get_plugin(&self, machine: &MachineDescription) -> Result<Box<dyn TargetPlugin>> {
        let fingerprint = self.fingerprint(machine)?;
        let workdir = tempfile::Builder::new()
            .prefix("ttacc-plugin-")
            .tempdir()
            .map_err(|e| BackendError::Cache {
                path: std::env::temp_dir(),
                detail: format!("creating working directory: {e}"),
            })?;

        let artifact = if self.config.cache_enabled {
            let dir = &self.config.cache_dir;
            std::fs::create_dir_all(dir).map_err(|e| BackendError::Cache {
                path: dir.clone(),
                detail: format!("creating cache dir: {e}"),
            })?;
            self.artifact_path(&fingerprint)
        } else {
            workdir.path().join(fingerprint.as_str())
        };

        if self.config.cache_enabled && artifact.is_file() {
            match self.load(&artifact) {
                Ok(plugin) => {
                    self.hits.set(self.hits.get() + 1);
                    info!(%fingerprint, "using cached backend plugin");
                    return Ok(plugin);
                }
                Err(e) => {
                    warn!(%fingerprint, error = %e, "cached plugin unusable, regenerating");
                }
            }
        }

        info!(%fingerprint, machine = %machine.name, "building backend plugin");
        self.regenerate(machine, workdir.path(), &artifact)?;
        self.regenerations.set(self.regenerations.get() + 1);
        self.load(&artifact)
    }

    fn load(&self, path: &Path) -> Result<Box<dyn TargetPlugin>> {
        let module = self.loader.load(path)?;
        self.loader.resolve_entry_point(&module)
    }

    fn regenerate(
        &self,
        machine: &MachineDescription,
        workdir: &Path,
        artifact: &Path,
    ) -> Result<()> {
        let td = self.generator.generate_backend(machine, workdir)?;

        let mut includes = vec![workdir.to_path_buf()];
        includes.extend(self.config.include_dirs());

        let tblgen = self.config.table_generator();
        for kind in TableGenKind::ALL {
            let mut cmd = CommandLine::new(&tblgen);
            for dir in &includes {
                cmd = cmd.arg("-I").arg(dir);
            }
            let cmd = cmd
                .arg(&td)
                .arg(kind.flag())
                .arg("-o")
                .arg(workdir.join(kind.output_file()));
            self.run(&cmd, workdir)
                .map_err(|detail| BackendError::Generation {
                    invocation: cmd.render(),
                    detail,
                })?;
        }

        // Cached builds go to a private file first; dropping it on failure
        // removes the partial output.
        let partial = if self.config.cache_enabled {
            let dir = &self.config.cache_dir;
            let temp = tempfile::Builder::new()
                .prefix(".partial-")
                .suffix(&plugin_extension())
                .tempfile_in(dir)
                .map_err(|e| BackendError::Cache {
                    path: dir.clone(),
                    detail: format!("creating build output: {e}"),
                })?
                .into_temp_path();
            Some(temp)
        } else {
            None
        };
        let output = partial.as_deref().unwrap_or(artifact);

        let mut cmd = CommandLine::new(&self.config.toolchain.native_compiler);
        for dir in &includes {
            cmd = cmd.arg("-I").arg(dir);
        }
        let cmd = cmd
            .args(&self.config.toolchain.compiler_flags)
            .args(self.config.plugin_sources())
            .arg("-o")
            .arg(output);
        self.run(&cmd, workdir)
            .map_err(|output| BackendError::Compilation {
                command: cmd.render(),
                output,
            })?;

        if let Some(partial) = partial {
            partial
                .persist(artifact)
                .map_err(|e| BackendError::Cache {
                    path: artifact.to_path_buf(),
                    detail: format!("installing plugin: {}", e.error),
                })?;
            debug!(path = %artifact.display(), "installed plugin");
        }
        Ok(())
    }

    /// Run a tool; on failure return its captured output.
    fn run(&self, cmd: &CommandLine, workdir: &Path) -> std::result::Result<(), String> {
        debug!(command = %cmd, "running");
        match self.invoker.invoke(cmd, workdir) {
            Ok(out) if out.success() => Ok(()),
            Ok(out) => Err(match out.status {
                Some(code) => format!("exit status {code}\n{}", out.output),
                None => format!("terminated by signal\n{}", out.output),
            }),
            Err(e) => Err(format!("cannot run {}: {e}", cmd.program.display())),
        }
    }

    /// Plugin files currently in the cache directory, sorted by name.
    pub fn list_entries(&self) -> Result<Vec<CacheEntry>> {
        let dir = &self.config.cache_dir;
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let cache_err = |e: std::io::Error| BackendError::Cache {
            path: dir.clone(),
            detail: format!("listing cache: {e}"),
        };
        let ext = plugin_extension();
        let mut entries = Vec::new();
        for entry in std::fs::read_dir(dir).map_err(cache_err)? {
            let entry = entry.map_err(cache_err)?;
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if name.starts_with('.') || !name.ends_with(&ext) {
                continue;
            }
            let meta = entry.metadata().map_err(cache_err)?;
            if !meta.is_file() {
                continue;
            }
            entries.push(CacheEntry {
                file_name: name,
                path: entry.path(),
                size_bytes: meta.len(),
            });
        }
        entries.sort_by(|a, b| a.file_name.cmp(&b.file_name));
        Ok(entries)
    }

    /// Delete every cached plugin. Returns the number removed.
    pub fn clear(&self) -> Result<usize> {
        let entries = self.list_entries()?;
        for entry in &entries {
            std::fs::remove_file(&entry.path).map_err(|e| BackendError::Cache {
                path: entry.path.clone(),
                detail: format!("removing cache entry: {e}"),
            })?;
        }
        info!(count = entries.len(), "cleared plugin cache");
        Ok(entries.len())
    }
}
