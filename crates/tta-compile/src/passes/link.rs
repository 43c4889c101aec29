//! Link emulation routines into the program.
//!
//! Only symbols the program declares but does not define are taken from
//! the emulation module, together with whatever those definitions call in
//! turn. The emulation module is consumed.

use tracing::debug;
use tta_ir::{EmulationModule, ProgramModule};

pub const NAME: &str = "link-emulation";

/// Returns the number of definitions linked in.
pub fn run(module: &mut ProgramModule, mut emulation: EmulationModule) -> usize {
    let mut linked = 0;
    let mut work: Vec<String> = module.undefined_symbols().into_iter().collect();
    while let Some(symbol) = work.pop() {
        let undefined = module
            .function(&symbol)
            .map_or(true, |f| f.is_declaration());
        if !undefined {
            continue;
        }
        let Some(definition) = emulation.take_definition(&symbol) else {
            continue;
        };
        debug!(symbol = %symbol, from = %emulation.name(), "linking emulation routine");
        for callee in definition.callees() {
            let params = emulation.params_of(callee).unwrap_or(0);
            module.declare(callee, params);
            work.push(callee.to_string());
        }
        match module.function_mut(&symbol) {
            Some(slot) => *slot = definition,
            None => module.functions.push(definition),
        }
        linked += 1;
    }
    linked
}
