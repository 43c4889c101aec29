//! Intermediate representation for the TTA compiler backend.
//!
//! A [`ProgramModule`] is the unit handed to the compilation pipeline:
//! functions made of labelled blocks of instructions, plus declarations of
//! functions defined elsewhere. An [`EmulationModule`] supplies software
//! implementations of operations the target lacks; the pipeline consumes it.

pub mod builder;
pub mod emulation;
pub mod error;
pub mod load;
pub mod module;

pub use builder::{BlockBuilder, FunctionBuilder};
pub use emulation::EmulationModule;
pub use error::LoadError;
pub use load::{load_emulation_module, load_module, parse_module, write_module};
pub use module::{
    Block, Function, InstKind, Instruction, Linkage, ProgramModule, Terminator, Value,
};
