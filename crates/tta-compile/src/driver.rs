//! Backend facade: validate the machine, obtain its plugin, compile, and
//! optionally schedule.

use std::path::Path;

use tracing::subscriber::SetGlobalDefaultError;
use tracing::{info, Level, Subscriber};
use tracing_subscriber::fmt::{MakeWriter, TestWriter};
use tta_backend::{BackendConfig, PluginCache, TargetPlugin};
use tta_ir::{load_emulation_module, load_module, EmulationModule, ProgramModule};
use tta_machine::{validate, ErrorCode, MachineDescription};

use crate::error::{CompileError, ScheduleError};
use crate::interpass::InterPassData;
use crate::pipeline::{compile_with_report, CompileOptions, PipelineOutput};
use crate::program::CompiledProgram;
use crate::schedule::{SchedulingGateway, SchedulingPlan};

/// A `tracing` subscriber printing events up to `level` to `writer`.
pub fn subscriber<W>(level: Level, writer: W) -> impl Subscriber + Send + Sync
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    tracing_subscriber::FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(writer)
        .without_time()
        .with_target(false)
        .finish()
}

/// Install a global subscriber logging to stderr. Stdout stays reserved for
/// program listings.
pub fn init_subscriber(level: Level) -> Result<(), SetGlobalDefaultError> {
    tracing::subscriber::set_global_default(subscriber(level, std::io::stderr))
}

/// Install a global subscriber whose output the test harness captures.
pub fn init_test_subscriber(level: Level) -> Result<(), SetGlobalDefaultError> {
    tracing::subscriber::set_global_default(subscriber(level, TestWriter::new))
}

/// Run the required structural checks. Any violation stops compilation
/// before a plugin is requested.
pub fn check_machine(machine: &MachineDescription) -> Result<(), CompileError> {
    validate(machine, &ErrorCode::required()).into_result()?;
    Ok(())
}

pub struct Backend {
    cache: PluginCache,
    gateway: SchedulingGateway,
}

impl Backend {
    pub fn new(config: BackendConfig) -> Self {
        let gateway = SchedulingGateway::from_config(&config);
        Self {
            cache: PluginCache::new(config),
            gateway,
        }
    }

    /// Replace the plugin cache, e.g. with one using mocked tools.
    pub fn with_cache(mut self, cache: PluginCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_gateway(mut self, gateway: SchedulingGateway) -> Self {
        self.gateway = gateway;
        self
    }

    pub fn cache(&self) -> &PluginCache {
        &self.cache
    }

    pub fn gateway(&self) -> &SchedulingGateway {
        &self.gateway
    }

    /// Validate `machine` and return its plugin.
    pub fn plugin_for(&self, machine: &MachineDescription) -> Result<Box<dyn TargetPlugin>, CompileError> {
        check_machine(machine)?;
        Ok(self.cache.get_plugin(machine)?)
    }

    /// Compile an in-memory module.
    pub fn compile_module(
        &self,
        module: ProgramModule,
        emulation: Option<EmulationModule>,
        machine: &MachineDescription,
        options: &CompileOptions,
        inter_pass: Option<&mut InterPassData>,
    ) -> Result<PipelineOutput, CompileError> {
        let plugin = self.plugin_for(machine)?;
        compile_with_report(module, emulation, plugin.as_ref(), machine, options, inter_pass)
    }

    /// Compile a program file, linking emulation routines from
    /// `emulation` when given.
    pub fn compile_files(
        &self,
        program: &Path,
        emulation: Option<&Path>,
        machine: &MachineDescription,
        options: &CompileOptions,
        inter_pass: Option<&mut InterPassData>,
    ) -> Result<PipelineOutput, CompileError> {
        check_machine(machine)?;
        let module = load_module(program)?;
        let emulation = emulation.map(load_emulation_module).transpose()?;
        info!(program = %program.display(), "loaded program");
        let plugin = self.cache.get_plugin(machine)?;
        compile_with_report(module, emulation, plugin.as_ref(), machine, options, inter_pass)
    }

    /// Compile a program file and hand the result to the scheduler.
    #[allow(clippy::too_many_arguments)]
    pub fn schedule(
        &self,
        program: &Path,
        emulation: Option<&Path>,
        machine: &MachineDescription,
        opt_level: u32,
        debug_level: u32,
        plan: Option<SchedulingPlan>,
        inter_pass: Option<&mut InterPassData>,
    ) -> Result<CompiledProgram, ScheduleError> {
        let options = CompileOptions {
            opt_level,
            debug: debug_level > 0,
        };
        let output = self.compile_files(program, emulation, machine, &options, inter_pass)?;
        self.gateway
            .schedule(&output.program, machine, opt_level, debug_level, plan)
    }
}
