//! Give every definition except the entry point internal linkage.

use tta_ir::{Linkage, ProgramModule};

use crate::error::PassError;

pub const NAME: &str = "internalize";

/// Returns the number of definitions whose linkage changed.
pub fn run(module: &mut ProgramModule) -> Result<usize, PassError> {
    let entry_defined = module
        .function(&module.entry)
        .is_some_and(|f| !f.is_declaration());
    if !entry_defined {
        return Err(PassError::MissingEntry {
            entry: module.entry.clone(),
        });
    }
    let entry = module.entry.clone();
    let mut changed = 0;
    for func in module.functions.iter_mut().filter(|f| !f.is_declaration()) {
        if func.name != entry && func.linkage != Linkage::Internal {
            func.linkage = Linkage::Internal;
            changed += 1;
        }
    }
    Ok(changed)
}
