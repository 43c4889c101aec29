//! Content-derived cache keys for backend plugins.
//!
//! A fingerprint identifies a machine description together with the
//! toolchain version that would build its plugin. Two machines with the
//! same canonical serialization always share a fingerprint; any change to
//! the machine or a toolchain upgrade produces a new one.

use std::fmt;

use sha2::{Digest, Sha256};
use tta_machine::{machine_to_canonical, MachineDescription};

use crate::error::Result;

/// File extension of loadable plugins on this platform, including the dot.
pub fn plugin_extension() -> String {
    format!(".{}", std::env::consts::DLL_EXTENSION)
}

/// Cache key of a backend plugin; doubles as its file name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PluginFingerprint(String);

impl PluginFingerprint {
    /// Fingerprint a machine for the given toolchain version.
    ///
    /// Format: `<canonical length in hex>_<sha256 hex>-<version><ext>`.
    pub fn compute(machine: &MachineDescription, toolchain_version: &str) -> Result<Self> {
        let canonical = machine_to_canonical(machine)?;
        Ok(Self::from_canonical(canonical.as_bytes(), toolchain_version))
    }

    fn from_canonical(bytes: &[u8], toolchain_version: &str) -> Self {
        let digest: [u8; 32] = Sha256::digest(bytes).into();
        PluginFingerprint(format!(
            "{:x}_{}-{}{}",
            bytes.len(),
            hex_encode(&digest),
            toolchain_version,
            plugin_extension()
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether a file name has the shape of a plugin fingerprint.
    pub fn looks_like(file_name: &str) -> bool {
        let Some(stem) = file_name.strip_suffix(&plugin_extension()) else {
            return false;
        };
        let Some((len, rest)) = stem.split_once('_') else {
            return false;
        };
        let hash = rest.split('-').next().unwrap_or("");
        !len.is_empty()
            && len.chars().all(|c| c.is_ascii_hexdigit())
            && hash.len() == 64
            && hash.chars().all(|c| c.is_ascii_hexdigit())
    }
}

impl fmt::Display for PluginFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
