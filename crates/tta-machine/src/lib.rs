//! Machine description model for transport-triggered architectures.
//!
//! A target processor is not fixed: it is described declaratively by its
//! register files, function units, interconnect, and the operations those
//! units support. This crate holds that description, its canonical TOML
//! form, and the structural checks run before any code generation.

pub mod error;
pub mod machine;
pub mod parse;
pub mod validator;

pub use error::{MachineError, Result};
pub use machine::{
    AddressSpace, Bus, ControlUnit, FunctionUnit, IoBinding, MachineDescription,
    OperationBinding, Port, RegisterFile,
};
pub use parse::{
    load_machine_toml, machine_to_canonical, machine_to_toml, parse_machine_toml, write_machine_toml,
};
pub use validator::{validate, ErrorCode, ValidationError, ValidationResult};
