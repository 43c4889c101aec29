//! Error types for machine description operations.

use std::path::PathBuf;

/// Errors that can occur while reading or writing machine descriptions.
#[derive(Debug, thiserror::Error)]
pub enum MachineError {
    /// TOML deserialization error.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    /// I/O error reading/writing machine files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Machine file not found.
    #[error("machine file not found: {}", path.display())]
    NotFound {
        /// The path that was not found.
        path: PathBuf,
    },
}

/// Result type for machine description operations.
pub type Result<T> = std::result::Result<T, MachineError>;
