//! `ttacc validate` — run structural checks on a machine description.

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{bail, Context, Result};
use tta_machine::{load_machine_toml, validate, ErrorCode};

pub fn run(machine: &Path, all: bool) -> Result<()> {
    let description = load_machine_toml(machine)
        .with_context(|| format!("loading machine {}", machine.display()))?;
    let checks: BTreeSet<ErrorCode> = if all {
        ErrorCode::ALL.into_iter().collect()
    } else {
        ErrorCode::required()
    };
    let result = validate(&description, &checks);
    if result.is_empty() {
        println!("{}: {} checks passed", description.name, checks.len());
        return Ok(());
    }
    for (code, message) in result.errors() {
        println!("  [{code}] {message}");
    }
    bail!(
        "machine '{}' failed {} check(s)",
        description.name,
        result.error_count()
    )
}
