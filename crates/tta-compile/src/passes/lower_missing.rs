//! Replace operations the machine lacks with calls to emulation routines.

use std::collections::BTreeMap;

use tta_ir::{InstKind, ProgramModule};
use tta_machine::MachineDescription;

pub const NAME: &str = "lower-missing-instructions";

/// Emulation routine implementing `opcode`. Integer arithmetic follows
/// the usual runtime-library names.
pub fn emulation_symbol(opcode: &str) -> String {
    match opcode {
        "mul" => "__mulsi3".into(),
        "div" => "__divsi3".into(),
        "divu" | "udiv" => "__udivsi3".into(),
        "mod" | "rem" => "__modsi3".into(),
        "modu" | "urem" => "__umodsi3".into(),
        "shl" => "__ashlsi3".into(),
        "shr" => "__ashrsi3".into(),
        "shru" => "__lshrsi3".into(),
        other => format!("__emulate_{other}"),
    }
}

/// Rewrite every unsupported operation into a call and declare the
/// routines it needs. Returns the number of rewritten operations.
pub fn run(module: &mut ProgramModule, machine: &MachineDescription) -> usize {
    let mut needed: BTreeMap<String, u32> = BTreeMap::new();
    let mut rewritten = 0;
    for func in &mut module.functions {
        for inst in func.blocks.iter_mut().flat_map(|b| b.instructions.iter_mut()) {
            let InstKind::Op { opcode, args } = &inst.kind else {
                continue;
            };
            let opcode = opcode.to_lowercase();
            if machine.supports_operation(&opcode) {
                continue;
            }
            let callee = emulation_symbol(&opcode);
            needed.insert(callee.clone(), args.len() as u32);
            inst.kind = InstKind::Call {
                callee,
                args: args.clone(),
            };
            rewritten += 1;
        }
    }
    for (symbol, params) in needed {
        module.declare(&symbol, params);
    }
    rewritten
}

#[cfg(test)]
mod tests {
    use super::*;
    use tta_ir::builder::FunctionBuilder;

    #[test]
    fn unsupported_ops_become_calls() {
        let mut module = ProgramModule::new("m");
        let mut main = FunctionBuilder::new("main", 2);
        let mut entry = main.block("entry");
        let (a, b) = (main.param(0), main.param(1));
        let sum = entry.op("add", &[a, b]);
        let quot = entry.op("div", &[sum, b]);
        entry.ret(Some(quot));
        main.finish_block(entry);
        module.functions.push(main.build());

        let machine = MachineDescription::minimal();
        assert_eq!(run(&mut module, &machine), 1);

        let main = module.function("main").unwrap();
        assert!(matches!(
            &main.blocks[0].instructions[1].kind,
            InstKind::Call { callee, .. } if callee == "__divsi3"
        ));
        assert!(module.function("__divsi3").unwrap().is_declaration());
        assert_eq!(module.verify(), Ok(()));
    }

    #[test]
    fn supported_module_is_untouched() {
        let mut module = ProgramModule::new("m");
        let mut main = FunctionBuilder::new("main", 0);
        let mut entry = main.block("entry");
        let c = entry.constant(1);
        let d = entry.op("ADD", &[c, c]);
        entry.ret(Some(d));
        main.finish_block(entry);
        module.functions.push(main.build());
        let before = module.clone();

        assert_eq!(run(&mut module, &MachineDescription::minimal()), 0);
        assert_eq!(module, before);
    }

    #[test]
    fn symbol_names() {
        assert_eq!(emulation_symbol("mul"), "__mulsi3");
        assert_eq!(emulation_symbol("fadd"), "__emulate_fadd");
    }
}
