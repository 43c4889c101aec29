//! Backend plugin generation, caching, and loading.
//!
//! Turns a declarative machine description into a loadable, machine-specific
//! code-generation plugin:
//!
//! 1. **Fingerprint** the machine's canonical form plus the toolchain version.
//! 2. **Look up** the fingerprint in the shared plugin cache; a hit is only
//!    advisory and falls back to regeneration if the artifact will not load.
//! 3. **Generate** target tables (registers, instructions, selection
//!    patterns) with the external table generator.
//! 4. **Compile** the fixed plugin sources plus the tables into one shared
//!    object, installed atomically into the cache.
//! 5. **Load** it through its single C entry point.
//!
//! External tools and dynamic loading sit behind the [`ToolInvoker`] and
//! [`PluginLoader`] capabilities so every step can be exercised without a
//! native toolchain.

pub mod abi;
pub mod cache;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod generator;
pub mod loader;
pub mod mir;
pub mod plugin;
pub mod table;
pub mod tool;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use cache::{CacheEntry, CacheStats, PluginCache};
pub use config::{BackendConfig, ToolchainMode, ToolchainPaths};
pub use error::{BackendError, Result};
pub use fingerprint::{plugin_extension, PluginFingerprint};
pub use generator::{BackendGenerator, TableGenKind, TdGenerator};
pub use loader::{DylibLoader, LoadedModule, PluginLoader};
pub use mir::{InstRole, MachineInst, MachineOperand, PhysReg, SelectionContext};
pub use plugin::{RegisterInfo, SelectionError, TargetPlugin};
pub use table::{CallingConvention, TableDrivenPlugin};
pub use tool::{CommandLine, ProcessInvoker, ToolInvoker, ToolOutput};
