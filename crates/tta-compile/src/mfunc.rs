//! Machine-level functions between instruction selection and program
//! building.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use tta_backend::{InstRole, MachineInst, MachineOperand, PhysReg};
use tta_ir::Linkage;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineBlock {
    pub label: String,
    pub insts: Vec<MachineInst>,
}

impl MachineBlock {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            insts: Vec::new(),
        }
    }

    /// Whether control can continue into the next block in layout order.
    pub fn falls_through(&self) -> bool {
        !matches!(
            self.insts.last().map(|i| i.role),
            Some(InstRole::Jump | InstRole::Return)
        )
    }

    /// Labels this block may transfer control to explicitly.
    pub fn branch_targets(&self) -> Vec<&str> {
        self.insts
            .iter()
            .filter(|i| matches!(i.role, InstRole::Jump | InstRole::Branch))
            .flat_map(|i| i.uses.iter())
            .filter_map(|op| match op {
                MachineOperand::Label(l) => Some(l.as_str()),
                _ => None,
            })
            .collect()
    }
}

/// A function after instruction selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineFunction {
    pub name: String,
    pub linkage: Linkage,
    pub blocks: Vec<MachineBlock>,
    /// Number of virtual registers handed out during selection.
    pub vreg_count: u32,
    /// Sizes in bytes of the stack objects, by frame index.
    pub frame_objects: Vec<u32>,
    /// Callee-saved registers the allocator assigned.
    pub used_registers: BTreeSet<PhysReg>,
    /// Bytes reserved below the caller's stack pointer.
    pub frame_size: u32,
}

impl MachineFunction {
    pub fn new(name: impl Into<String>, linkage: Linkage) -> Self {
        Self {
            name: name.into(),
            linkage,
            blocks: Vec::new(),
            vreg_count: 0,
            frame_objects: Vec::new(),
            used_registers: BTreeSet::new(),
            frame_size: 0,
        }
    }

    pub fn instructions(&self) -> impl Iterator<Item = &MachineInst> {
        self.blocks.iter().flat_map(|b| b.insts.iter())
    }

    pub fn instruction_count(&self) -> usize {
        self.blocks.iter().map(|b| b.insts.len()).sum()
    }

    pub fn has_calls(&self) -> bool {
        self.instructions().any(|i| i.role == InstRole::Call)
    }

    /// Symbols called from this function.
    pub fn callees(&self) -> BTreeSet<&str> {
        self.instructions()
            .filter(|i| i.role == InstRole::Call)
            .flat_map(|i| i.uses.iter())
            .filter_map(|op| match op {
                MachineOperand::Symbol(s) => Some(s.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Successor block indices for every block, by layout position.
    pub fn successors(&self) -> Vec<Vec<usize>> {
        let index: BTreeMap<&str, usize> = self
            .blocks
            .iter()
            .enumerate()
            .map(|(i, b)| (b.label.as_str(), i))
            .collect();
        self.blocks
            .iter()
            .enumerate()
            .map(|(i, block)| {
                let mut succ: Vec<usize> = block
                    .branch_targets()
                    .into_iter()
                    .filter_map(|l| index.get(l).copied())
                    .collect();
                if block.falls_through() && i + 1 < self.blocks.len() {
                    succ.push(i + 1);
                }
                succ.sort_unstable();
                succ.dedup();
                succ
            })
            .collect()
    }
}

impl fmt::Display for MachineFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}:", self.name)?;
        for block in &self.blocks {
            writeln!(f, "  .{}:", block.label)?;
            for inst in &block.insts {
                writeln!(f, "    {inst}")?;
            }
        }
        Ok(())
    }
}

/// All machine functions of a program, plus the symbols it leaves
/// undefined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineModule {
    pub name: String,
    pub entry: String,
    pub functions: Vec<MachineFunction>,
    pub externals: BTreeSet<String>,
}

impl MachineModule {
    pub fn function(&self, name: &str) -> Option<&MachineFunction> {
        self.functions.iter().find(|f| f.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jump(target: &str) -> MachineInst {
        MachineInst::new("jump", vec![], vec![MachineOperand::Label(target.into())])
            .with_role(InstRole::Jump)
    }

    #[test]
    fn successors_follow_jumps_and_fallthrough() {
        let mut f = MachineFunction::new("f", Linkage::External);
        let mut a = MachineBlock::new("a");
        a.insts.push(
            MachineInst::new(
                "bnz",
                vec![],
                vec![MachineOperand::VReg(0), MachineOperand::Label("c".into())],
            )
            .with_role(InstRole::Branch),
        );
        let mut b = MachineBlock::new("b");
        b.insts.push(jump("a"));
        let c = MachineBlock::new("c");
        f.blocks = vec![a, b, c];

        assert_eq!(f.successors(), vec![vec![1, 2], vec![0], vec![]]);
    }

    #[test]
    fn callees_from_call_symbols() {
        let mut f = MachineFunction::new("f", Linkage::External);
        let mut a = MachineBlock::new("entry");
        a.insts.push(
            MachineInst::new("call", vec![], vec![MachineOperand::Symbol("g".into())])
                .with_role(InstRole::Call),
        );
        f.blocks.push(a);
        assert!(f.has_calls());
        assert_eq!(f.callees().into_iter().collect::<Vec<_>>(), vec!["g"]);
    }
}
