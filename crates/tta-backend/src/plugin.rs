//! The target plugin capability consumed by the compilation pipeline.

use std::fmt;

use tta_ir::{Instruction, Terminator};

use crate::mir::{MachineInst, PhysReg, SelectionContext};

/// Name and index of a physical register within its register file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterInfo {
    pub register_file: String,
    pub index: u32,
}

/// Instruction selection could not cover an IR construct.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot select {construct}: {reason}")]
pub struct SelectionError {
    pub construct: String,
    pub reason: String,
}

impl SelectionError {
    pub fn new(construct: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            construct: construct.into(),
            reason: reason.into(),
        }
    }
}

/// Machine-specific facts and the instruction-selection hook.
///
/// Object-safe so plugins can be loaded at runtime and passed around as
/// `Box<dyn TargetPlugin>`.
pub trait TargetPlugin: fmt::Debug {
    /// Name of the machine this plugin was generated for.
    fn machine_name(&self) -> &str;

    /// Native word size in bits.
    fn word_bits(&self) -> u32;

    /// Register table; a [`PhysReg`] indexes into it.
    fn registers(&self) -> &[RegisterInfo];

    /// Register holding the stack pointer.
    fn stack_pointer(&self) -> PhysReg;

    /// Register carrying function return values.
    fn return_value_register(&self) -> PhysReg;

    /// Registers carrying the leading call arguments, in order.
    fn argument_registers(&self) -> &[PhysReg];

    /// Registers the allocator may assign. All of them are callee-saved.
    fn allocatable_registers(&self) -> &[PhysReg];

    /// Whether an IR opcode has a selection pattern on this target.
    fn has_pattern(&self, opcode: &str) -> bool;

    /// Copy incoming arguments into the virtual registers of the
    /// function's parameters.
    fn lower_arguments(
        &self,
        params: u32,
        ctx: &mut SelectionContext,
    ) -> Result<Vec<MachineInst>, SelectionError>;

    /// Select machine instructions for one IR instruction.
    fn select(
        &self,
        inst: &Instruction,
        ctx: &mut SelectionContext,
    ) -> Result<Vec<MachineInst>, SelectionError>;

    /// Select machine instructions for a block terminator.
    fn select_terminator(
        &self,
        term: &Terminator,
        ctx: &mut SelectionContext,
    ) -> Result<Vec<MachineInst>, SelectionError>;

    /// Register file name of a physical register.
    fn rf_name(&self, reg: PhysReg) -> &str {
        self.registers()
            .get(reg.0 as usize)
            .map(|r| r.register_file.as_str())
            .unwrap_or("?")
    }

    /// Index of a physical register within its register file.
    fn register_index(&self, reg: PhysReg) -> u32 {
        self.registers()
            .get(reg.0 as usize)
            .map(|r| r.index)
            .unwrap_or(u32::MAX)
    }

    /// Assembly-style name, e.g. `RF.1`.
    fn register_name(&self, reg: PhysReg) -> String {
        format!("{}.{}", self.rf_name(reg), self.register_index(reg))
    }
}
