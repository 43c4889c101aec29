//! Compilation pipeline for TTA targets.
//!
//! Takes an IR [`tta_ir::ProgramModule`] through a fixed sequence of
//! stages, using a machine-specific [`tta_backend::TargetPlugin`] for
//! instruction selection and register facts, and produces a
//! [`CompiledProgram`]. The [`Backend`] facade adds machine validation,
//! plugin acquisition through the cache, and the scheduler hand-off.

pub mod driver;
pub mod error;
pub mod interpass;
pub mod mfunc;
pub mod pass;
pub mod passes;
pub mod pipeline;
pub mod program;
pub mod report;
pub mod schedule;

pub use driver::{check_machine, init_subscriber, init_test_subscriber, subscriber, Backend};
pub use error::{CompileError, PassError, ScheduleError};
pub use interpass::{InterPassData, InterPassDatum, STACK_POINTER};
pub use mfunc::{MachineBlock, MachineFunction, MachineModule};
pub use pass::{run_pass, MachineFunctionPass, PassGroup, PassStats};
pub use pipeline::{compile, compile_with_report, CompileOptions, PipelineOutput};
pub use program::{CompiledProgram, Instruction, Procedure, ProgramBuilder};
pub use report::PipelineReport;
pub use schedule::{ExternalScheduler, PlanPass, Scheduler, SchedulingGateway, SchedulingPlan};
