//! Compilation and scheduling errors.

use std::path::PathBuf;

use thiserror::Error;
use tta_backend::{BackendError, SelectionError};
use tta_ir::LoadError;
use tta_machine::{MachineError, ValidationError};

/// Failure inside one pipeline stage.
#[derive(Debug, Error)]
pub enum PassError {
    #[error("malformed input module: {detail}")]
    Invalid { detail: String },

    #[error("entry function '{entry}' is not defined")]
    MissingEntry { entry: String },

    #[error("in function '{function}': {source}")]
    Selection {
        function: String,
        #[source]
        source: SelectionError,
    },

    #[error(
        "in function '{function}': {live} values live at once, only {available} registers available"
    )]
    OutOfRegisters {
        function: String,
        live: usize,
        available: usize,
    },

    #[error("in function '{function}': operand {operand} left unresolved")]
    Unresolved { function: String, operand: String },
}

/// Errors that can occur while compiling a program for a target machine.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("{stage} failed: {source}")]
    Stage {
        stage: &'static str,
        #[source]
        source: PassError,
    },
}

impl CompileError {
    /// Name of the failing pipeline stage, if the failure came from one.
    pub fn stage(&self) -> Option<&'static str> {
        match self {
            CompileError::Stage { stage, .. } => Some(stage),
            _ => None,
        }
    }
}

/// Errors from the scheduling hand-off.
#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Machine(#[from] MachineError),

    #[error("no scheduling plan given and no default plan configured")]
    NoDefaultPlan,

    #[error("Unable to load default scheduler config '{}': {source}", path.display())]
    DefaultPlanIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid scheduling plan '{name}': {detail}")]
    InvalidPlan { name: String, detail: String },

    #[error("scheduler failed.\nFailed command was: {command}\n{output}")]
    SchedulerFailed { command: String, output: String },

    #[error("scheduler produced no program (command: {command})")]
    NoOutput { command: String },

    #[error("cannot read scheduled program: {0}")]
    Output(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
