//! Errors raised while loading program modules.

use std::path::PathBuf;

/// An input module could not be read or could not be understood.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The file itself could not be read.
    #[error("cannot read {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file was read but its content is not a valid module encoding.
    #[error("malformed module in {}: {source}", path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The module decoded but is structurally inconsistent.
    #[error("invalid module '{module}': {detail}")]
    Invalid { module: String, detail: String },
}
