//! Machine description model.
//!
//! Describes the function units, register files, interconnect, and
//! operation set of a target processor. The backend only ever reads a
//! description; nothing in the toolchain mutates one in place.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// An addressable memory space (instruction or data memory).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AddressSpace {
    /// Address space name (e.g., "instructions", "data").
    pub name: String,
    /// Width of a minimally addressable unit in bits.
    pub width_bits: u32,
    /// Lowest valid address.
    pub min_address: u64,
    /// Highest valid address.
    pub max_address: u64,
}

/// A register file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RegisterFile {
    /// Register file name (e.g., "RF", "BOOL").
    pub name: String,
    /// Number of registers.
    pub size: u32,
    /// Width of each register in bits.
    pub width_bits: u32,
    /// Number of read ports.
    pub read_ports: u32,
    /// Number of write ports.
    pub write_ports: u32,
}

/// A transport bus of the interconnect network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Bus {
    pub name: String,
    pub width_bits: u32,
}

/// A port of a function unit or control unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Port {
    pub name: String,
    pub width_bits: u32,
    /// Whether writing this port triggers the operation.
    #[serde(default)]
    pub triggering: bool,
}

/// Binding of one operation operand to a unit port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct IoBinding {
    /// Operand index, starting at 1 (inputs first, then outputs).
    pub io: u32,
    /// Name of the port the operand is transported through.
    pub port: String,
}

/// An operation implemented by a unit, with its operand bindings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OperationBinding {
    /// Operation name (e.g., "add", "ldw", "jump").
    pub name: String,
    /// Number of input operands.
    pub inputs: u32,
    /// Number of output operands.
    pub outputs: u32,
    #[serde(default)]
    pub bindings: Vec<IoBinding>,
}

impl OperationBinding {
    /// Create an operation with every operand bound in order to `ports`.
    pub fn bound(name: &str, inputs: u32, outputs: u32, ports: &[&str]) -> Self {
        let bindings = ports
            .iter()
            .enumerate()
            .map(|(i, port)| IoBinding {
                io: i as u32 + 1,
                port: (*port).to_string(),
            })
            .collect();
        Self {
            name: name.into(),
            inputs,
            outputs,
            bindings,
        }
    }

    /// Total operand count (inputs + outputs), saturating at `u32::MAX`.
    pub fn operand_count(&self) -> u32 {
        self.inputs.saturating_add(self.outputs)
    }

    /// Port bound to the given operand, if any.
    pub fn port_for(&self, io: u32) -> Option<&str> {
        self.bindings
            .iter()
            .find(|b| b.io == io)
            .map(|b| b.port.as_str())
    }
}

/// A function unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FunctionUnit {
    pub name: String,
    /// Data address space accessed by this unit (load/store units).
    #[serde(default)]
    pub address_space: Option<String>,
    #[serde(default)]
    pub ports: Vec<Port>,
    #[serde(default)]
    pub operations: Vec<OperationBinding>,
}

impl FunctionUnit {
    /// Look up a port by name.
    pub fn port(&self, name: &str) -> Option<&Port> {
        self.ports.iter().find(|p| p.name == name)
    }
}

/// The global control unit (program sequencing, jumps and calls).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ControlUnit {
    pub name: String,
    /// Instruction address space.
    #[serde(default)]
    pub address_space: Option<String>,
    /// Port holding the program counter.
    #[serde(default)]
    pub program_counter_port: Option<String>,
    /// Special register port holding the return address.
    #[serde(default)]
    pub return_address_port: Option<String>,
    /// Number of delay slots after a control transfer.
    #[serde(default = "default_delay_slots")]
    pub delay_slots: u32,
    #[serde(default)]
    pub ports: Vec<Port>,
    #[serde(default)]
    pub operations: Vec<OperationBinding>,
}

fn default_delay_slots() -> u32 {
    3
}

impl ControlUnit {
    /// Look up a port by name.
    pub fn port(&self, name: &str) -> Option<&Port> {
        self.ports.iter().find(|p| p.name == name)
    }

    /// Look up an operation by (case-insensitive) name.
    pub fn operation(&self, name: &str) -> Option<&OperationBinding> {
        self.operations
            .iter()
            .find(|op| op.name.eq_ignore_ascii_case(name))
    }
}

/// A complete description of a TTA processor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MachineDescription {
    /// Machine name.
    pub name: String,
    #[serde(default)]
    pub address_spaces: Vec<AddressSpace>,
    #[serde(default)]
    pub register_files: Vec<RegisterFile>,
    #[serde(default)]
    pub buses: Vec<Bus>,
    #[serde(default)]
    pub function_units: Vec<FunctionUnit>,
    #[serde(default)]
    pub control_unit: Option<ControlUnit>,
}

impl MachineDescription {
    /// Look up an address space by name.
    pub fn address_space(&self, name: &str) -> Option<&AddressSpace> {
        self.address_spaces.iter().find(|a| a.name == name)
    }

    /// Look up a register file by name.
    pub fn register_file(&self, name: &str) -> Option<&RegisterFile> {
        self.register_files.iter().find(|rf| rf.name == name)
    }

    /// Look up a function unit by name.
    pub fn function_unit(&self, name: &str) -> Option<&FunctionUnit> {
        self.function_units.iter().find(|fu| fu.name == name)
    }

    /// Lowercased names of every operation the machine implements,
    /// across function units and the control unit.
    pub fn operation_names(&self) -> BTreeSet<String> {
        let fu_ops = self.function_units.iter().flat_map(|fu| &fu.operations);
        let gcu_ops = self.control_unit.iter().flat_map(|cu| &cu.operations);
        fu_ops
            .chain(gcu_ops)
            .map(|op| op.name.to_ascii_lowercase())
            .collect()
    }

    /// Whether any unit implements the named operation.
    pub fn supports_operation(&self, name: &str) -> bool {
        let fu_ops = self.function_units.iter().flat_map(|fu| &fu.operations);
        let gcu_ops = self.control_unit.iter().flat_map(|cu| &cu.operations);
        fu_ops
            .chain(gcu_ops)
            .any(|op| op.name.eq_ignore_ascii_case(name))
    }

    /// Widest register width in bits; the machine word size.
    pub fn word_bits(&self) -> u32 {
        self.register_files
            .iter()
            .map(|rf| rf.width_bits)
            .max()
            .unwrap_or(32)
    }

    /// A small but complete machine: one control unit with program counter
    /// and return-address ports, one ALU, one load-store unit, one 32-bit
    /// register file, and three buses.
    pub fn minimal() -> Self {
        let alu_ops = [
            "add", "sub", "and", "ior", "xor", "shl", "shr", "shru", "eq", "gt", "gtu",
        ]
        .iter()
        .map(|name| OperationBinding::bound(name, 2, 1, &["in1t", "in2", "out1"]))
        .collect();

        Self {
            name: "minimal".into(),
            address_spaces: vec![
                AddressSpace {
                    name: "instructions".into(),
                    width_bits: 8,
                    min_address: 0,
                    max_address: 0xFFFF,
                },
                AddressSpace {
                    name: "data".into(),
                    width_bits: 8,
                    min_address: 0,
                    max_address: 0x7FFF,
                },
            ],
            register_files: vec![
                RegisterFile {
                    name: "RF".into(),
                    size: 8,
                    width_bits: 32,
                    read_ports: 1,
                    write_ports: 1,
                },
                RegisterFile {
                    name: "BOOL".into(),
                    size: 1,
                    width_bits: 1,
                    read_ports: 1,
                    write_ports: 1,
                },
            ],
            buses: (1..=3)
                .map(|i| Bus {
                    name: format!("B{i}"),
                    width_bits: 32,
                })
                .collect(),
            function_units: vec![
                FunctionUnit {
                    name: "ALU".into(),
                    address_space: None,
                    ports: vec![
                        port("in1t", 32, true),
                        port("in2", 32, false),
                        port("out1", 32, false),
                    ],
                    operations: alu_ops,
                },
                FunctionUnit {
                    name: "LSU".into(),
                    address_space: Some("data".into()),
                    ports: vec![
                        port("in1t", 32, true),
                        port("in2", 32, false),
                        port("out1", 32, false),
                    ],
                    operations: vec![
                        OperationBinding::bound("ldw", 1, 1, &["in1t", "out1"]),
                        OperationBinding::bound("stw", 2, 0, &["in1t", "in2"]),
                    ],
                },
            ],
            control_unit: Some(ControlUnit {
                name: "gcu".into(),
                address_space: Some("instructions".into()),
                program_counter_port: Some("pc".into()),
                return_address_port: Some("ra".into()),
                delay_slots: 3,
                ports: vec![port("pc", 16, true), port("ra", 16, false)],
                operations: vec![
                    OperationBinding::bound("jump", 1, 0, &["pc"]),
                    OperationBinding::bound("call", 1, 0, &["pc"]),
                ],
            }),
        }
    }
}

fn port(name: &str, width_bits: u32, triggering: bool) -> Port {
    Port {
        name: name.into(),
        width_bits,
        triggering,
    }
}
