//! TOML parsing and serialization for machine descriptions.
//!
//! Machine descriptions are stored as `.machine.toml` files. The canonical
//! form produced by [`machine_to_canonical`] is the byte string the plugin
//! fingerprint is computed over, so it must stay deterministic: the model
//! only uses ordered collections.

use std::path::Path;

use crate::error::{MachineError, Result};
use crate::machine::MachineDescription;

/// Load a machine description from a `.machine.toml` file.
pub fn load_machine_toml(path: &Path) -> Result<MachineDescription> {
    if !path.exists() {
        return Err(MachineError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let content = std::fs::read_to_string(path)?;
    parse_machine_toml(&content)
}

/// Parse a machine description from a TOML string.
pub fn parse_machine_toml(toml_str: &str) -> Result<MachineDescription> {
    let machine: MachineDescription = toml::from_str(toml_str)?;
    Ok(machine)
}

/// Serialize a machine to its canonical (compact) textual form.
pub fn machine_to_canonical(machine: &MachineDescription) -> Result<String> {
    Ok(toml::to_string(machine)?)
}

/// Serialize a machine to pretty TOML for humans.
pub fn machine_to_toml(machine: &MachineDescription) -> Result<String> {
    Ok(toml::to_string_pretty(machine)?)
}

/// Write a machine description to a file in canonical form.
pub fn write_machine_toml(machine: &MachineDescription, path: &Path) -> Result<()> {
    std::fs::write(path, machine_to_canonical(machine)?)?;
    Ok(())
}
