//! Remove functions and declarations nothing live refers to.
//!
//! Roots are the entry function and every externally visible definition.

use std::collections::BTreeSet;

use tta_ir::{Linkage, ProgramModule};

pub const NAME: &str = "global-dce";

/// Returns the number of functions removed.
pub fn run(module: &mut ProgramModule) -> usize {
    let mut live: BTreeSet<String> = BTreeSet::new();
    let mut work: Vec<String> = module
        .functions
        .iter()
        .filter(|f| f.name == module.entry || (!f.is_declaration() && f.linkage == Linkage::External))
        .map(|f| f.name.clone())
        .collect();
    while let Some(name) = work.pop() {
        if !live.insert(name.clone()) {
            continue;
        }
        if let Some(func) = module.function(&name) {
            work.extend(func.callees().into_iter().map(str::to_string));
        }
    }
    let before = module.functions.len();
    module.functions.retain(|f| live.contains(&f.name));
    before - module.functions.len()
}
