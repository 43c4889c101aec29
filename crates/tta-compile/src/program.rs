//! Program object construction.
//!
//! [`ProgramBuilder`] runs as the last machine function pass. It sees each
//! function after allocation and frame lowering and turns it into a
//! [`Procedure`] whose operands are plain strings: registers as `RF.index`,
//! labels as `.function.block`, symbols as `@name`, immediates in decimal.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tta_backend::{MachineOperand, TargetPlugin};
use tta_machine::MachineDescription;

use crate::error::PassError;
use crate::mfunc::{MachineFunction, MachineModule};
use crate::pass::MachineFunctionPass;

/// One instruction of a compiled procedure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub opcode: String,
    #[serde(default)]
    pub operands: Vec<String>,
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(label) = &self.label {
            writeln!(f, "{label}:")?;
        }
        write!(f, "    {}", self.opcode)?;
        if !self.operands.is_empty() {
            write!(f, " {}", self.operands.join(", "))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Procedure {
    pub name: String,
    /// Bytes of stack the procedure reserves.
    #[serde(default)]
    pub frame_size: u32,
    pub instructions: Vec<Instruction>,
}

/// The pipeline's output: every procedure of the program, entry first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CompiledProgram {
    pub machine: String,
    pub entry: String,
    pub procedures: Vec<Procedure>,
    /// Symbols called but defined outside the program.
    #[serde(default)]
    pub externals: Vec<String>,
}

impl CompiledProgram {
    pub fn procedure(&self, name: &str) -> Option<&Procedure> {
        self.procedures.iter().find(|p| p.name == name)
    }

    pub fn instruction_count(&self) -> usize {
        self.procedures.iter().map(|p| p.instructions.len()).sum()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn write(&self, path: &Path) -> std::io::Result<()> {
        let json = self.to_json().map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }
}

impl fmt::Display for CompiledProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "; program for {}", self.machine)?;
        for proc in &self.procedures {
            writeln!(f)?;
            writeln!(f, "{}:  ; frame {} bytes", proc.name, proc.frame_size)?;
            for inst in &proc.instructions {
                writeln!(f, "{inst}")?;
            }
        }
        if !self.externals.is_empty() {
            writeln!(f)?;
            writeln!(f, "; externals: {}", self.externals.join(", "))?;
        }
        Ok(())
    }
}

/// Builds a [`CompiledProgram`] from finalized machine functions.
#[derive(Debug)]
pub struct ProgramBuilder {
    machine: String,
    return_address: Option<String>,
    entry: String,
    procedures: Vec<Procedure>,
    externals: Vec<String>,
}

impl ProgramBuilder {
    pub const NAME: &'static str = "program-builder";

    pub fn new(machine: &MachineDescription) -> Self {
        let return_address = machine.control_unit.as_ref().and_then(|cu| {
            cu.return_address_port
                .as_ref()
                .map(|port| format!("{}.{}", cu.name, port))
        });
        Self {
            machine: machine.name.clone(),
            return_address,
            entry: String::new(),
            procedures: Vec::new(),
            externals: Vec::new(),
        }
    }

    fn operand(
        &self,
        func: &MachineFunction,
        op: &MachineOperand,
        plugin: &dyn TargetPlugin,
    ) -> Result<String, PassError> {
        let unresolved = || PassError::Unresolved {
            function: func.name.clone(),
            operand: op.to_string(),
        };
        match op {
            MachineOperand::Phys(reg) => Ok(plugin.register_name(*reg)),
            MachineOperand::Imm(value) => Ok(value.to_string()),
            MachineOperand::Label(label) => Ok(format!(".{}.{}", func.name, label)),
            MachineOperand::Symbol(symbol) => Ok(format!("@{symbol}")),
            MachineOperand::ReturnAddress => self.return_address.clone().ok_or_else(unresolved),
            MachineOperand::VReg(_) | MachineOperand::Frame(_) => Err(unresolved()),
        }
    }

    /// Take the finished program.
    pub fn finish(mut self) -> CompiledProgram {
        let entry = self.entry.clone();
        self.procedures.sort_by_key(|p| p.name != entry);
        CompiledProgram {
            machine: self.machine,
            entry: self.entry,
            procedures: self.procedures,
            externals: self.externals,
        }
    }
}

impl MachineFunctionPass for ProgramBuilder {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn initialize(&mut self, module: &MachineModule) {
        self.entry = module.entry.clone();
        self.externals = module.externals.iter().cloned().collect();
    }

    fn run_on_function(
        &mut self,
        func: &mut MachineFunction,
        plugin: &dyn TargetPlugin,
    ) -> Result<usize, PassError> {
        let mut instructions = Vec::with_capacity(func.instruction_count());
        for block in &func.blocks {
            let label = Some(format!("{}.{}", func.name, block.label));
            if block.insts.is_empty() {
                instructions.push(Instruction {
                    label,
                    opcode: "nop".into(),
                    operands: Vec::new(),
                });
                continue;
            }
            for (i, inst) in block.insts.iter().enumerate() {
                let operands = inst
                    .operands()
                    .map(|op| self.operand(func, op, plugin))
                    .collect::<Result<Vec<_>, _>>()?;
                instructions.push(Instruction {
                    label: if i == 0 { label.clone() } else { None },
                    opcode: inst.opcode.clone(),
                    operands,
                });
            }
        }
        let count = instructions.len();
        self.procedures.push(Procedure {
            name: func.name.clone(),
            frame_size: func.frame_size,
            instructions,
        });
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tta_backend::{InstRole, MachineInst, PhysReg, TableDrivenPlugin};
    use tta_ir::Linkage;

    use crate::mfunc::MachineBlock;
    use crate::pass::run_pass;

    fn module(functions: Vec<MachineFunction>) -> MachineModule {
        MachineModule {
            name: "m".into(),
            entry: "main".into(),
            functions,
            externals: ["putchar".to_string()].into(),
        }
    }

    #[test]
    fn builds_entry_first_with_rendered_operands() {
        let machine = MachineDescription::minimal();
        let plugin = TableDrivenPlugin::from_machine(&machine).unwrap();

        let mut helper = MachineFunction::new("helper", Linkage::Internal);
        let mut b = MachineBlock::new("entry");
        b.insts.push(
            MachineInst::new("stw", vec![], vec![
                MachineOperand::Phys(PhysReg(1)),
                MachineOperand::Imm(0),
                MachineOperand::ReturnAddress,
            ])
            .with_role(InstRole::Store),
        );
        b.insts.push(
            MachineInst::new("jump", vec![], vec![MachineOperand::Label("entry".into())])
                .with_role(InstRole::Jump),
        );
        helper.blocks.push(b);

        let mut main = MachineFunction::new("main", Linkage::External);
        main.blocks.push(MachineBlock::new("entry"));

        let mut m = module(vec![helper, main]);
        let mut builder = ProgramBuilder::new(&machine);
        let stats = run_pass(&mut builder, &mut m, &plugin).unwrap();
        assert_eq!(stats.changes, 3);

        let program = builder.finish();
        assert_eq!(program.procedures[0].name, "main");
        assert_eq!(program.procedures[0].instructions[0].opcode, "nop");
        let helper = program.procedure("helper").unwrap();
        assert_eq!(helper.instructions[0].label.as_deref(), Some("helper.entry"));
        assert_eq!(helper.instructions[0].operands, vec!["RF.1", "0", "gcu.ra"]);
        assert_eq!(helper.instructions[1].operands, vec![".helper.entry"]);
        assert_eq!(program.externals, vec!["putchar"]);
        assert!(program.to_string().contains("stw RF.1, 0, gcu.ra"));
    }

    #[test]
    fn virtual_registers_are_rejected() {
        let machine = MachineDescription::minimal();
        let plugin = TableDrivenPlugin::from_machine(&machine).unwrap();
        let mut main = MachineFunction::new("main", Linkage::External);
        let mut b = MachineBlock::new("entry");
        b.insts.push(MachineInst::mov(MachineOperand::VReg(0), MachineOperand::Imm(1)));
        main.blocks.push(b);
        let mut m = module(vec![main]);
        let err = run_pass(&mut ProgramBuilder::new(&machine), &mut m, &plugin).unwrap_err();
        assert!(matches!(err, PassError::Unresolved { .. }));
    }

    #[test]
    fn json_round_trip() {
        let program = CompiledProgram {
            machine: "minimal".into(),
            entry: "main".into(),
            procedures: vec![Procedure {
                name: "main".into(),
                frame_size: 0,
                instructions: vec![Instruction {
                    label: Some("main.entry".into()),
                    opcode: "ret".into(),
                    operands: vec![],
                }],
            }],
            externals: vec![],
        };
        let json = program.to_json().unwrap();
        assert!(json.contains("\"frame-size\""));
        assert_eq!(CompiledProgram::from_json(&json).unwrap(), program);
    }
}
