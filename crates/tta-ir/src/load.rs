//! Loading program modules from disk.
//!
//! Modules are stored as JSON (`.tir.json`). Reading failures and decoding
//! failures are reported as distinct [`LoadError`] variants.

use std::path::Path;

use crate::emulation::EmulationModule;
use crate::error::LoadError;
use crate::module::ProgramModule;

/// Read, decode, and verify a program module.
pub fn load_module(path: &Path) -> Result<ProgramModule, LoadError> {
    let bytes = std::fs::read(path).map_err(|source| LoadError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;
    let module: ProgramModule =
        serde_json::from_slice(&bytes).map_err(|source| LoadError::Malformed {
            path: path.to_path_buf(),
            source,
        })?;
    verified(module)
}

/// Load a module of emulation routines.
pub fn load_emulation_module(path: &Path) -> Result<EmulationModule, LoadError> {
    load_module(path).map(EmulationModule::new)
}

/// Decode and verify a module from an in-memory JSON string.
pub fn parse_module(json: &str) -> Result<ProgramModule, LoadError> {
    let module: ProgramModule =
        serde_json::from_str(json).map_err(|source| LoadError::Malformed {
            path: "<memory>".into(),
            source,
        })?;
    verified(module)
}

/// Write a module as pretty JSON.
pub fn write_module(module: &ProgramModule, path: &Path) -> std::io::Result<()> {
    let json = serde_json::to_string_pretty(module).map_err(std::io::Error::other)?;
    std::fs::write(path, json)
}

fn verified(module: ProgramModule) -> Result<ProgramModule, LoadError> {
    module.verify().map_err(|detail| LoadError::Invalid {
        module: module.name.clone(),
        detail,
    })?;
    Ok(module)
}
