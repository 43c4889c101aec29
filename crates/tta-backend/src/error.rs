//! Backend error types.

use std::path::PathBuf;

use tta_machine::MachineError;

/// Errors raised while producing or loading a backend plugin.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The machine could not be serialized to its canonical form.
    #[error("cannot serialize target machine: {0}")]
    Machine(#[from] MachineError),

    /// Backend table generation failed.
    #[error(
        "Failed to build compiler plugin for target architecture.\n\
         Failed command was: {invocation}\n{detail}"
    )]
    Generation { invocation: String, detail: String },

    /// Native compilation of the plugin failed.
    #[error(
        "Failed to build compiler plugin for target architecture.\n\
         Failed command was: {command}\n{output}"
    )]
    Compilation { command: String, output: String },

    /// A built or cached artifact could not be loaded or had no usable
    /// entry point.
    #[error("Unable to load plugin file '{}': {detail}", path.display())]
    PluginLoad { path: PathBuf, detail: String },

    /// Plugin cache I/O error.
    #[error("cache error at {}: {detail}", path.display())]
    Cache { path: PathBuf, detail: String },

    /// Invalid backend configuration.
    #[error("invalid backend configuration: {detail}")]
    Config { detail: String },

    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for backend operations.
pub type Result<T> = std::result::Result<T, BackendError>;
