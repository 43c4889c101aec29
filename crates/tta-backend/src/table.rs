//! Table-driven target plugin.
//!
//! Generated plugins export their register and pattern tables through the
//! C descriptor in [`crate::abi`]; this type owns a copy of those tables
//! and performs instruction selection from them. The same tables can be
//! derived in-process from a machine description.

use std::collections::BTreeMap;

use tta_ir::{InstKind, Instruction, Terminator};
use tta_machine::MachineDescription;

use crate::error::{BackendError, Result};
use crate::mir::{InstRole, MachineInst, MachineOperand, PhysReg, SelectionContext};
use crate::plugin::{RegisterInfo, SelectionError, TargetPlugin};

/// Control unit operations that are never selected from IR opcodes.
const CONTROL_OPERATIONS: &[&str] = &["jump", "call"];

/// Register roles agreed between caller and callee.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallingConvention {
    pub stack_pointer: PhysReg,
    pub return_value: PhysReg,
    pub arguments: Vec<PhysReg>,
    /// Registers handed out by the allocator. Callee-saved.
    pub allocatable: Vec<PhysReg>,
}

#[derive(Debug, Clone)]
pub struct TableDrivenPlugin {
    machine_name: String,
    word_bits: u32,
    registers: Vec<RegisterInfo>,
    convention: CallingConvention,
    /// IR opcode -> machine opcode.
    patterns: BTreeMap<String, String>,
}

impl TableDrivenPlugin {
    pub fn from_tables(
        machine_name: String,
        word_bits: u32,
        registers: Vec<RegisterInfo>,
        patterns: BTreeMap<String, String>,
        convention: CallingConvention,
    ) -> Result<Self> {
        let count = registers.len() as u32;
        let all = [convention.stack_pointer, convention.return_value]
            .into_iter()
            .chain(convention.arguments.iter().copied())
            .chain(convention.allocatable.iter().copied());
        for reg in all {
            if reg.0 >= count {
                return Err(BackendError::Config {
                    detail: format!("register {} outside table of {count}", reg.0),
                });
            }
        }
        Ok(Self {
            machine_name,
            word_bits,
            registers,
            convention,
            patterns,
        })
    }

    /// Derive the plugin tables from a machine description.
    ///
    /// The widest register file is the integer file: register 0 returns
    /// values, register 1 is the stack pointer, the next registers carry
    /// arguments, and the rest of that file plus every other file of the
    /// same width is allocatable.
    pub fn from_machine(machine: &MachineDescription) -> Result<Self> {
        let word_bits = machine.word_bits();
        let primary = machine
            .register_files
            .iter()
            .find(|rf| rf.width_bits == word_bits)
            .ok_or_else(|| BackendError::Config {
                detail: format!("machine '{}' has no register files", machine.name),
            })?;
        if primary.size < 4 {
            return Err(BackendError::Config {
                detail: format!(
                    "register file '{}' has {} registers, at least 4 are required",
                    primary.name, primary.size
                ),
            });
        }

        let mut registers: Vec<RegisterInfo> = (0..primary.size)
            .map(|index| RegisterInfo {
                register_file: primary.name.clone(),
                index,
            })
            .collect();
        for rf in machine
            .register_files
            .iter()
            .filter(|rf| rf.width_bits == word_bits && rf.name != primary.name)
        {
            registers.extend((0..rf.size).map(|index| RegisterInfo {
                register_file: rf.name.clone(),
                index,
            }));
        }

        let arg_count = 2.min(primary.size - 3);
        let arguments: Vec<PhysReg> = (2..2 + arg_count).map(PhysReg).collect();
        let allocatable: Vec<PhysReg> = (2 + arg_count..registers.len() as u32)
            .map(PhysReg)
            .collect();

        let patterns = machine
            .operation_names()
            .into_iter()
            .filter(|op| !CONTROL_OPERATIONS.contains(&op.as_str()))
            .map(|op| (op.clone(), op))
            .collect();

        Self::from_tables(
            machine.name.clone(),
            word_bits,
            registers,
            patterns,
            CallingConvention {
                stack_pointer: PhysReg(1),
                return_value: PhysReg(0),
                arguments,
                allocatable,
            },
        )
    }

    pub fn patterns(&self) -> &BTreeMap<String, String> {
        &self.patterns
    }

    fn argument(&self, index: usize, construct: &str) -> std::result::Result<PhysReg, SelectionError> {
        self.convention.arguments.get(index).copied().ok_or_else(|| {
            SelectionError::new(
                construct,
                format!(
                    "only {} register arguments are supported",
                    self.convention.arguments.len()
                ),
            )
        })
    }
}

impl TargetPlugin for TableDrivenPlugin {
    fn machine_name(&self) -> &str {
        &self.machine_name
    }

    fn word_bits(&self) -> u32 {
        self.word_bits
    }

    fn registers(&self) -> &[RegisterInfo] {
        &self.registers
    }

    fn stack_pointer(&self) -> PhysReg {
        self.convention.stack_pointer
    }

    fn return_value_register(&self) -> PhysReg {
        self.convention.return_value
    }

    fn argument_registers(&self) -> &[PhysReg] {
        &self.convention.arguments
    }

    fn allocatable_registers(&self) -> &[PhysReg] {
        &self.convention.allocatable
    }

    fn has_pattern(&self, opcode: &str) -> bool {
        self.patterns.contains_key(&opcode.to_lowercase())
    }

    fn lower_arguments(
        &self,
        params: u32,
        ctx: &mut SelectionContext,
    ) -> std::result::Result<Vec<MachineInst>, SelectionError> {
        (0..params)
            .map(|i| {
                let reg = self.argument(i as usize, "function parameters")?;
                Ok(MachineInst::mov(
                    ctx.vreg_for(tta_ir::Value(i)),
                    MachineOperand::Phys(reg),
                ))
            })
            .collect()
    }

    fn select(
        &self,
        inst: &Instruction,
        ctx: &mut SelectionContext,
    ) -> std::result::Result<Vec<MachineInst>, SelectionError> {
        let defs: Vec<MachineOperand> = inst.result.iter().map(|v| ctx.vreg_for(*v)).collect();
        match &inst.kind {
            InstKind::Const { value } => {
                Ok(vec![MachineInst::new("mov", defs, vec![MachineOperand::Imm(*value)])])
            }
            InstKind::Op { opcode, args } => {
                let machine_op = self.patterns.get(&opcode.to_lowercase()).ok_or_else(|| {
                    SelectionError::new(format!("'{opcode}'"), "no selection pattern")
                })?;
                let uses = args.iter().map(|a| ctx.vreg_for(*a)).collect();
                let role = if machine_op.starts_with("st") {
                    InstRole::Store
                } else {
                    InstRole::Plain
                };
                Ok(vec![MachineInst::new(machine_op, defs, uses).with_role(role)])
            }
            InstKind::Call { callee, args } => {
                let construct = format!("call to '{callee}'");
                let mut out = Vec::with_capacity(args.len() + 2);
                let mut arg_regs = Vec::with_capacity(args.len());
                for (i, arg) in args.iter().enumerate() {
                    let reg = self.argument(i, &construct)?;
                    out.push(MachineInst::mov(MachineOperand::Phys(reg), ctx.vreg_for(*arg)));
                    arg_regs.push(MachineOperand::Phys(reg));
                }
                let mut uses = vec![MachineOperand::Symbol(callee.clone())];
                uses.extend(arg_regs);
                let ret = MachineOperand::Phys(self.convention.return_value);
                out.push(MachineInst::new("call", vec![ret.clone()], uses).with_role(InstRole::Call));
                if let Some(def) = defs.into_iter().next() {
                    out.push(MachineInst::mov(def, ret));
                }
                Ok(out)
            }
            InstKind::Alloca { size } => {
                let slot = ctx.frame_object(*size);
                let sp = MachineOperand::Phys(self.convention.stack_pointer);
                Ok(vec![MachineInst::new("add", defs, vec![sp, slot])])
            }
        }
    }

    fn select_terminator(
        &self,
        term: &Terminator,
        ctx: &mut SelectionContext,
    ) -> std::result::Result<Vec<MachineInst>, SelectionError> {
        Ok(match term {
            Terminator::Ret { value } => {
                let mut out = Vec::new();
                let mut uses = Vec::new();
                if let Some(v) = value {
                    let ret = MachineOperand::Phys(self.convention.return_value);
                    out.push(MachineInst::mov(ret.clone(), ctx.vreg_for(*v)));
                    uses.push(ret);
                }
                out.push(MachineInst::new("ret", Vec::new(), uses).with_role(InstRole::Return));
                out
            }
            Terminator::Jump { target } => vec![jump(target)],
            Terminator::Branch {
                cond,
                then_block,
                else_block,
            } => vec![
                MachineInst::new(
                    "bnz",
                    Vec::new(),
                    vec![ctx.vreg_for(*cond), MachineOperand::Label(then_block.clone())],
                )
                .with_role(InstRole::Branch),
                jump(else_block),
            ],
            Terminator::Unreachable => Vec::new(),
        })
    }
}

fn jump(target: &str) -> MachineInst {
    MachineInst::new("jump", Vec::new(), vec![MachineOperand::Label(target.to_string())])
        .with_role(InstRole::Jump)
}
