//! Target description generation.
//!
//! The [`BackendGenerator`] writes the machine-specific table-generator
//! input into a working directory; [`TableGenKind`] enumerates the tables
//! the external table generator then derives from it.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use tta_machine::MachineDescription;

use crate::error::{BackendError, Result};

/// Name of the top-level description file.
pub const TD_FILE: &str = "TTA.td";

/// Writes the table-generator input for a machine.
pub trait BackendGenerator {
    /// Generate the description into `workdir` and return the path of the
    /// top-level file.
    fn generate_backend(&self, machine: &MachineDescription, workdir: &Path) -> Result<PathBuf>;
}

/// One table produced by the external table generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TableGenKind {
    RegisterEnums,
    RegisterDescriptors,
    RegisterDescriptorHeader,
    InstructionEnums,
    InstructionDescriptors,
    DagInstructionSelection,
}

impl TableGenKind {
    /// Every kind, in generation order.
    pub const ALL: [TableGenKind; 6] = [
        TableGenKind::RegisterEnums,
        TableGenKind::RegisterDescriptors,
        TableGenKind::RegisterDescriptorHeader,
        TableGenKind::InstructionEnums,
        TableGenKind::InstructionDescriptors,
        TableGenKind::DagInstructionSelection,
    ];

    /// Table generator flag selecting this table.
    pub fn flag(self) -> &'static str {
        match self {
            TableGenKind::RegisterEnums => "-gen-register-enums",
            TableGenKind::RegisterDescriptors => "-gen-register-desc",
            TableGenKind::RegisterDescriptorHeader => "-gen-register-desc-header",
            TableGenKind::InstructionEnums => "-gen-instr-enums",
            TableGenKind::InstructionDescriptors => "-gen-instr-desc",
            TableGenKind::DagInstructionSelection => "-gen-dag-isel",
        }
    }

    /// File the table is written to, relative to the working directory.
    pub fn output_file(self) -> &'static str {
        match self {
            TableGenKind::RegisterEnums => "TTAGenRegisterNames.inc",
            TableGenKind::RegisterDescriptors => "TTAGenRegisterInfo.inc",
            TableGenKind::RegisterDescriptorHeader => "TTAGenRegisterInfo.h.inc",
            TableGenKind::InstructionEnums => "TTAGenInstrNames.inc",
            TableGenKind::InstructionDescriptors => "TTAGenInstrInfo.inc",
            TableGenKind::DagInstructionSelection => "TTAGenDAGISel.inc",
        }
    }
}

/// Writes `TTA.td` plus register and instruction descriptions.
#[derive(Debug, Default, Clone, Copy)]
pub struct TdGenerator;

impl TdGenerator {
    fn registers_td(machine: &MachineDescription) -> String {
        let mut out = String::from("// Register definitions.\n\n");
        for rf in &machine.register_files {
            let mut members = Vec::new();
            for index in 0..rf.size {
                let def = format!("{}_{}", td_ident(&rf.name), index);
                let _ = writeln!(out, "def {def} : TTAReg<\"{}.{index}\", {index}>;", rf.name);
                members.push(def);
            }
            let _ = writeln!(
                out,
                "def {}Regs : RegisterClass<\"TTA\", [i{}], {}, [{}]>;\n",
                td_ident(&rf.name),
                rf.width_bits,
                rf.width_bits,
                members.join(", ")
            );
        }
        out
    }

    fn instructions_td(machine: &MachineDescription) -> String {
        let mut out = String::from("// Instruction definitions.\n\n");
        let units = machine
            .function_units
            .iter()
            .map(|fu| (&fu.name, &fu.operations))
            .chain(machine.control_unit.iter().map(|cu| (&cu.name, &cu.operations)));
        for (unit, operations) in units {
            for op in operations {
                let _ = writeln!(
                    out,
                    "def {}_{} : TTAInst<\"{}\", {}, {}>;",
                    td_ident(unit).to_uppercase(),
                    td_ident(&op.name).to_uppercase(),
                    op.name.to_lowercase(),
                    op.inputs,
                    op.outputs
                );
            }
        }
        out
    }
}

impl BackendGenerator for TdGenerator {
    fn generate_backend(&self, machine: &MachineDescription, workdir: &Path) -> Result<PathBuf> {
        if machine.register_files.is_empty() {
            return Err(BackendError::Generation {
                invocation: format!("generate {TD_FILE} for '{}'", machine.name),
                detail: "machine has no register files".into(),
            });
        }
        std::fs::write(workdir.join("TTARegisterInfo.td"), Self::registers_td(machine))?;
        std::fs::write(workdir.join("TTAInstrInfo.td"), Self::instructions_td(machine))?;

        let top = format!(
            "// Target description for machine '{}'.\n\
             include \"TTABase.td\"\n\
             include \"TTARegisterInfo.td\"\n\
             include \"TTAInstrInfo.td\"\n\n\
             def TTA : Target {{ let WordBits = {}; }}\n",
            machine.name,
            machine.word_bits()
        );
        let td = workdir.join(TD_FILE);
        std::fs::write(&td, top)?;
        Ok(td)
    }
}

fn td_ident(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}
