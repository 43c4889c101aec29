//! Dynamic loading of plugin artifacts.

use std::path::{Path, PathBuf};

use crate::abi::{self, EntryPoint, ENTRY_SYMBOL};
use crate::error::{BackendError, Result};
use crate::plugin::TargetPlugin;

/// A plugin artifact opened by a [`PluginLoader`].
#[derive(Debug)]
pub struct LoadedModule {
    pub path: PathBuf,
    library: Option<libloading::Library>,
}

impl LoadedModule {
    /// A module with no native library behind it.
    pub fn detached(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            library: None,
        }
    }

    pub fn is_native(&self) -> bool {
        self.library.is_some()
    }
}

/// Opens plugin artifacts and resolves their entry point.
pub trait PluginLoader {
    fn load(&self, path: &Path) -> Result<LoadedModule>;

    /// Construct the plugin through the module's entry point.
    fn resolve_entry_point(&self, module: &LoadedModule) -> Result<Box<dyn TargetPlugin>>;
}

/// Loads shared objects from disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct DylibLoader;

impl PluginLoader for DylibLoader {
    fn load(&self, path: &Path) -> Result<LoadedModule> {
        // SAFETY: plugins are produced by our own build step; their
        // initializers only set up static tables.
        let library = unsafe { libloading::Library::new(path) }.map_err(|e| {
            BackendError::PluginLoad {
                path: path.to_path_buf(),
                detail: e.to_string(),
            }
        })?;
        Ok(LoadedModule {
            path: path.to_path_buf(),
            library: Some(library),
        })
    }

    fn resolve_entry_point(&self, module: &LoadedModule) -> Result<Box<dyn TargetPlugin>> {
        let fail = |detail: String| BackendError::PluginLoad {
            path: module.path.clone(),
            detail,
        };
        let library = module
            .library
            .as_ref()
            .ok_or_else(|| fail("module has no native library".into()))?;
        // SAFETY: the entry point has the `EntryPoint` signature by contract
        // and the descriptor is copied before the library can be dropped.
        let plugin = unsafe {
            let entry: libloading::Symbol<EntryPoint> =
                library.get(ENTRY_SYMBOL).map_err(|e| fail(e.to_string()))?;
            abi::read_descriptor(entry())
        }
        .map_err(fail)?;
        Ok(Box::new(plugin))
    }
}
