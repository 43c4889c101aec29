//! Linear-scan register allocation.
//!
//! Each virtual register gets one live interval spanning every instruction
//! position where it is defined, read, or live across a block boundary.
//! Intervals are assigned registers from the plugin's allocatable set in
//! order of their start. There is no spilling: running out of registers is
//! an error.

use std::collections::{BTreeMap, BTreeSet};

use tta_backend::{MachineOperand, PhysReg, TargetPlugin};

use crate::error::PassError;
use crate::mfunc::MachineFunction;
use crate::pass::MachineFunctionPass;

#[derive(Debug, Default)]
pub struct LinearScan;

impl LinearScan {
    pub const NAME: &'static str = "register-allocation";
}

/// Live interval of a virtual register, as inclusive instruction positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub vreg: u32,
    pub start: usize,
    pub end: usize,
}

/// Per-block live-in sets, by dataflow to a fixed point.
fn live_in_sets(func: &MachineFunction) -> (Vec<BTreeSet<u32>>, Vec<BTreeSet<u32>>) {
    let n = func.blocks.len();
    let mut gen = vec![BTreeSet::new(); n];
    let mut kill = vec![BTreeSet::new(); n];
    for (b, block) in func.blocks.iter().enumerate() {
        for inst in &block.insts {
            for v in inst.uses.iter().filter_map(MachineOperand::as_vreg) {
                if !kill[b].contains(&v) {
                    gen[b].insert(v);
                }
            }
            kill[b].extend(inst.defs.iter().filter_map(MachineOperand::as_vreg));
        }
    }

    let succ = func.successors();
    let mut live_in: Vec<BTreeSet<u32>> = gen.clone();
    let mut live_out: Vec<BTreeSet<u32>> = vec![BTreeSet::new(); n];
    let mut changed = true;
    while changed {
        changed = false;
        for b in (0..n).rev() {
            let out: BTreeSet<u32> = succ[b]
                .iter()
                .flat_map(|s| live_in[*s].iter().copied())
                .collect();
            let mut inn = gen[b].clone();
            inn.extend(out.difference(&kill[b]).copied());
            if inn != live_in[b] || out != live_out[b] {
                live_in[b] = inn;
                live_out[b] = out;
                changed = true;
            }
        }
    }
    (live_in, live_out)
}

/// Live intervals ordered by start position.
pub fn live_intervals(func: &MachineFunction) -> Vec<Interval> {
    let (live_in, live_out) = live_in_sets(func);
    let mut ranges: BTreeMap<u32, (usize, usize)> = BTreeMap::new();
    let mut extend = |v: u32, pos: usize| {
        let r = ranges.entry(v).or_insert((pos, pos));
        r.0 = r.0.min(pos);
        r.1 = r.1.max(pos);
    };

    let mut pos = 0;
    for (b, block) in func.blocks.iter().enumerate() {
        let start = pos;
        for inst in &block.insts {
            for v in inst.operands().filter_map(MachineOperand::as_vreg) {
                extend(v, pos);
            }
            pos += 1;
        }
        for &v in &live_in[b] {
            extend(v, start);
        }
        for &v in &live_out[b] {
            extend(v, pos);
        }
    }

    let mut intervals: Vec<Interval> = ranges
        .into_iter()
        .map(|(vreg, (start, end))| Interval { vreg, start, end })
        .collect();
    intervals.sort_by_key(|i| (i.start, i.vreg));
    intervals
}

impl MachineFunctionPass for LinearScan {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn run_on_function(
        &mut self,
        func: &mut MachineFunction,
        plugin: &dyn TargetPlugin,
    ) -> Result<usize, PassError> {
        let available = plugin.allocatable_registers();
        let mut free: Vec<PhysReg> = available.iter().rev().copied().collect();
        let mut active: Vec<(usize, PhysReg)> = Vec::new();
        let mut assignment: BTreeMap<u32, PhysReg> = BTreeMap::new();

        for interval in live_intervals(func) {
            // An interval ending where another starts may share its
            // register: reads happen before writes.
            active.retain(|&(end, reg)| {
                if end <= interval.start {
                    free.push(reg);
                    false
                } else {
                    true
                }
            });
            let Some(reg) = free.pop() else {
                return Err(PassError::OutOfRegisters {
                    function: func.name.clone(),
                    live: active.len() + 1,
                    available: available.len(),
                });
            };
            active.push((interval.end, reg));
            assignment.insert(interval.vreg, reg);
        }

        for block in &mut func.blocks {
            for inst in &mut block.insts {
                for op in inst.operands_mut() {
                    if let MachineOperand::VReg(v) = *op {
                        if let Some(reg) = assignment.get(&v) {
                            *op = MachineOperand::Phys(*reg);
                        }
                    }
                }
            }
            // Moves that became self-copies.
            block.insts.retain(|inst| {
                !(inst.opcode == "mov" && inst.defs.len() == 1 && inst.uses.len() == 1
                    && inst.defs[0] == inst.uses[0])
            });
        }
        func.used_registers = assignment.values().copied().collect();
        Ok(assignment.len())
    }
}
