//! Prolog and epilog insertion.
//!
//! Frame layout, growing down from the caller's stack pointer:
//! ```text
//! SP + 0                     saved return address (if the function calls)
//! SP + w, SP + 2w, ...       saved callee-saved registers
//! SP + k*w ...               stack objects, each rounded up to a word
//! ```

use tta_backend::{InstRole, MachineInst, MachineOperand, TargetPlugin};

use crate::error::PassError;
use crate::mfunc::MachineFunction;
use crate::pass::MachineFunctionPass;

#[derive(Debug, Default)]
pub struct PrologEpilogInserter;

impl PrologEpilogInserter {
    pub const NAME: &'static str = "prolog-epilog-insertion";
}

impl MachineFunctionPass for PrologEpilogInserter {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn run_on_function(
        &mut self,
        func: &mut MachineFunction,
        plugin: &dyn TargetPlugin,
    ) -> Result<usize, PassError> {
        let word = (plugin.word_bits() / 8).max(1);
        let mut saved: Vec<MachineOperand> = Vec::new();
        if func.has_calls() {
            saved.push(MachineOperand::ReturnAddress);
        }
        saved.extend(func.used_registers.iter().map(|r| MachineOperand::Phys(*r)));

        let mut offset = saved.len() as u32 * word;
        let mut object_offsets = Vec::with_capacity(func.frame_objects.len());
        for size in &func.frame_objects {
            object_offsets.push(offset);
            offset += (*size).max(1).div_ceil(word) * word;
        }
        func.frame_size = offset;

        let mut changes = 0;
        for block in &mut func.blocks {
            for inst in &mut block.insts {
                for op in inst.operands_mut() {
                    if let MachineOperand::Frame(index) = *op {
                        let resolved = object_offsets.get(index as usize).ok_or_else(|| {
                            PassError::Unresolved {
                                function: func.name.clone(),
                                operand: op.to_string(),
                            }
                        })?;
                        *op = MachineOperand::Imm(i64::from(*resolved));
                        changes += 1;
                    }
                }
            }
        }

        if func.frame_size == 0 {
            return Ok(changes);
        }

        let sp = MachineOperand::Phys(plugin.stack_pointer());
        let frame = MachineOperand::Imm(i64::from(func.frame_size));
        let slot = |k: usize| MachineOperand::Imm(i64::from(k as u32 * word));

        let mut prolog = vec![MachineInst::new("sub", vec![sp.clone()], vec![sp.clone(), frame.clone()])];
        for (k, reg) in saved.iter().enumerate() {
            prolog.push(
                MachineInst::new("stw", vec![], vec![sp.clone(), slot(k), reg.clone()])
                    .with_role(InstRole::Store),
            );
        }
        let mut epilog: Vec<MachineInst> = saved
            .iter()
            .enumerate()
            .rev()
            .map(|(k, reg)| MachineInst::new("ldw", vec![reg.clone()], vec![sp.clone(), slot(k)]))
            .collect();
        epilog.push(MachineInst::new("add", vec![sp.clone()], vec![sp, frame]));

        for block in &mut func.blocks {
            let returns: Vec<usize> = block
                .insts
                .iter()
                .enumerate()
                .filter(|(_, i)| i.role == InstRole::Return)
                .map(|(pos, _)| pos)
                .collect();
            for pos in returns.into_iter().rev() {
                block.insts.splice(pos..pos, epilog.iter().cloned());
                changes += epilog.len();
            }
        }
        if let Some(entry) = func.blocks.first_mut() {
            changes += prolog.len();
            entry.insts.splice(0..0, prolog);
        }
        Ok(changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tta_backend::{PhysReg, TableDrivenPlugin};
    use tta_ir::Linkage;
    use tta_machine::MachineDescription;

    use crate::mfunc::MachineBlock;

    fn plugin() -> TableDrivenPlugin {
        TableDrivenPlugin::from_machine(&MachineDescription::minimal()).unwrap()
    }

    fn ret() -> MachineInst {
        MachineInst::new("ret", vec![], vec![]).with_role(InstRole::Return)
    }

    #[test]
    fn leaf_without_frame_is_untouched() {
        let mut f = MachineFunction::new("main", Linkage::External);
        let mut b = MachineBlock::new("entry");
        b.insts.push(ret());
        f.blocks.push(b);
        let before = f.clone();
        assert_eq!(PrologEpilogInserter.run_on_function(&mut f, &plugin()).unwrap(), 0);
        assert_eq!(f, before);
    }

    #[test]
    fn saves_return_address_and_registers() {
        let p = plugin();
        let mut f = MachineFunction::new("f", Linkage::Internal);
        f.used_registers.insert(PhysReg(4));
        let mut b = MachineBlock::new("entry");
        b.insts.push(
            MachineInst::new("call", vec![], vec![MachineOperand::Symbol("g".into())])
                .with_role(InstRole::Call),
        );
        b.insts.push(ret());
        f.blocks.push(b);

        PrologEpilogInserter.run_on_function(&mut f, &p).unwrap();
        assert_eq!(f.frame_size, 8);
        let opcodes: Vec<_> = f.instructions().map(|i| i.opcode.as_str()).collect();
        assert_eq!(
            opcodes,
            vec!["sub", "stw", "stw", "call", "ldw", "ldw", "add", "ret"]
        );
        let insts = &f.blocks[0].insts;
        assert_eq!(insts[1].uses[2], MachineOperand::ReturnAddress);
        assert_eq!(insts[5].defs[0], MachineOperand::ReturnAddress);
    }

    #[test]
    fn frame_objects_get_offsets() {
        let p = plugin();
        let mut f = MachineFunction::new("f", Linkage::Internal);
        f.frame_objects = vec![6, 4];
        let sp = MachineOperand::Phys(p.stack_pointer());
        let mut b = MachineBlock::new("entry");
        b.insts.push(MachineInst::new(
            "add",
            vec![MachineOperand::Phys(PhysReg(4))],
            vec![sp.clone(), MachineOperand::Frame(1)],
        ));
        b.insts.push(ret());
        f.blocks.push(b);

        PrologEpilogInserter.run_on_function(&mut f, &p).unwrap();
        assert_eq!(f.frame_size, 12);
        assert_eq!(f.blocks[0].insts[1].uses[1], MachineOperand::Imm(8));
    }

    #[test]
    fn unknown_frame_index_is_an_error() {
        let mut f = MachineFunction::new("f", Linkage::Internal);
        let mut b = MachineBlock::new("entry");
        b.insts.push(MachineInst::new("add", vec![], vec![MachineOperand::Frame(3)]));
        f.blocks.push(b);
        assert!(PrologEpilogInserter.run_on_function(&mut f, &plugin()).is_err());
    }
}
