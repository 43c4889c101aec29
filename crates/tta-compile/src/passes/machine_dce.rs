//! Machine-level dead code elimination.
//!
//! Per function, drops side-effect-free instructions whose virtual register
//! results are never read. On finalization, drops internal functions that
//! are no longer reachable from the entry point.

use std::collections::BTreeSet;

use tta_backend::{MachineOperand, TargetPlugin};
use tta_ir::Linkage;

use crate::error::PassError;
use crate::mfunc::{MachineFunction, MachineModule};
use crate::pass::MachineFunctionPass;

#[derive(Debug, Default)]
pub struct MachineDce;

impl MachineDce {
    pub const NAME: &'static str = "machine-dce";
}

fn used_vregs(func: &MachineFunction) -> BTreeSet<u32> {
    func.instructions()
        .flat_map(|i| i.uses.iter())
        .filter_map(MachineOperand::as_vreg)
        .collect()
}

impl MachineFunctionPass for MachineDce {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn run_on_function(
        &mut self,
        func: &mut MachineFunction,
        _plugin: &dyn TargetPlugin,
    ) -> Result<usize, PassError> {
        let mut removed = 0;
        loop {
            let used = used_vregs(func);
            let before = removed;
            for block in &mut func.blocks {
                let len = block.insts.len();
                block.insts.retain(|inst| {
                    let dead = !inst.role.has_side_effects()
                        && !inst.defs.is_empty()
                        && inst
                            .defs
                            .iter()
                            .all(|d| d.as_vreg().is_some_and(|v| !used.contains(&v)));
                    !dead
                });
                removed += len - block.insts.len();
            }
            if removed == before {
                return Ok(removed);
            }
        }
    }

    fn finalize(&mut self, module: &mut MachineModule) -> Result<usize, PassError> {
        let mut live: BTreeSet<String> = BTreeSet::new();
        let mut work = vec![module.entry.clone()];
        work.extend(
            module
                .functions
                .iter()
                .filter(|f| f.linkage == Linkage::External)
                .map(|f| f.name.clone()),
        );
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
        module.externals.retain(|s| live.contains(s));
        Ok(before - module.functions.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tta_backend::{InstRole, MachineInst, TableDrivenPlugin};
    use tta_machine::MachineDescription;

    use crate::mfunc::MachineBlock;

    fn v(n: u32) -> MachineOperand {
        MachineOperand::VReg(n)
    }

    #[test]
    fn removes_dead_chains() {
        let plugin = TableDrivenPlugin::from_machine(&MachineDescription::minimal()).unwrap();
        let mut f = MachineFunction::new("f", Linkage::External);
        let mut b = MachineBlock::new("entry");
        b.insts.push(MachineInst::new("mov", vec![v(0)], vec![MachineOperand::Imm(1)]));
        b.insts.push(MachineInst::new("add", vec![v(1)], vec![v(0), v(0)]));
        b.insts.push(MachineInst::new("mov", vec![v(2)], vec![MachineOperand::Imm(7)]));
        b.insts.push(
            MachineInst::new("stw", vec![], vec![v(2), v(2)]).with_role(InstRole::Store),
        );
        b.insts.push(MachineInst::new("ret", vec![], vec![]).with_role(InstRole::Return));
        f.blocks.push(b);

        assert_eq!(MachineDce.run_on_function(&mut f, &plugin).unwrap(), 2);
        let opcodes: Vec<_> = f.instructions().map(|i| i.opcode.as_str()).collect();
        assert_eq!(opcodes, vec!["mov", "stw", "ret"]);
    }

    #[test]
    fn finalize_drops_unreachable_internal_functions() {
        let call = |callee: &str| {
            let mut b = MachineBlock::new("entry");
            b.insts.push(
                MachineInst::new("call", vec![], vec![MachineOperand::Symbol(callee.into())])
                    .with_role(InstRole::Call),
            );
            b
        };
        let mut main = MachineFunction::new("main", Linkage::External);
        main.blocks.push(call("used"));
        let used = MachineFunction::new("used", Linkage::Internal);
        let mut dead = MachineFunction::new("dead", Linkage::Internal);
        dead.blocks.push(call("puts"));
        let mut module = MachineModule {
            name: "m".into(),
            entry: "main".into(),
            functions: vec![main, used, dead],
            externals: ["puts".to_string()].into(),
        };

        assert_eq!(MachineDce.finalize(&mut module).unwrap(), 1);
        assert!(module.function("dead").is_none());
        assert!(module.externals.is_empty());
    }
}
