//! Branch and label folding.
//!
//! Drops jumps to the block that follows in layout order, and folds empty
//! blocks into their successor by retargeting every reference to them.

use tta_backend::{InstRole, MachineInst, MachineOperand, TargetPlugin};

use crate::error::PassError;
use crate::mfunc::MachineFunction;
use crate::pass::MachineFunctionPass;

#[derive(Debug, Default)]
pub struct LabelFolding;

impl LabelFolding {
    pub const NAME: &'static str = "label-folding";
}

fn is_jump_to(inst: &MachineInst, label: &str) -> bool {
    inst.role == InstRole::Jump
        && matches!(inst.uses.as_slice(), [MachineOperand::Label(l)] if l == label)
}

fn drop_fallthrough_jumps(func: &mut MachineFunction) -> usize {
    let mut removed = 0;
    for i in 0..func.blocks.len().saturating_sub(1) {
        let next = func.blocks[i + 1].label.clone();
        let block = &mut func.blocks[i];
        if block.insts.last().is_some_and(|inst| is_jump_to(inst, &next)) {
            block.insts.pop();
            removed += 1;
        }
    }
    removed
}

/// Fold one empty block (never the entry, never the last) into the block
/// after it.
fn fold_empty_block(func: &mut MachineFunction) -> bool {
    let n = func.blocks.len();
    let Some(i) = (1..n.saturating_sub(1)).find(|&i| func.blocks[i].insts.is_empty()) else {
        return false;
    };
    let removed = func.blocks.remove(i);
    let target = func.blocks[i].label.clone();
    for block in &mut func.blocks {
        for inst in &mut block.insts {
            for op in inst.uses.iter_mut() {
                match op {
                    MachineOperand::Label(l) if *l == removed.label => *l = target.clone(),
                    _ => {}
                }
            }
        }
    }
    true
}

impl MachineFunctionPass for LabelFolding {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn run_on_function(
        &mut self,
        func: &mut MachineFunction,
        _plugin: &dyn TargetPlugin,
    ) -> Result<usize, PassError> {
        let mut changes = 0;
        loop {
            let mut round = drop_fallthrough_jumps(func);
            while fold_empty_block(func) {
                round += 1;
            }
            if round == 0 {
                return Ok(changes);
            }
            changes += round;
        }
    }
}
