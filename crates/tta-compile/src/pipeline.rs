//! Compilation pipeline orchestrator.
//!
//! Stage order is fixed:
//! lower missing operations -> unreachable blocks + global DCE -> link
//! emulation -> internalize -> instruction selection -> machine DCE +
//! register allocation + prolog/epilog + label folding -> program builder.

use std::time::Instant;

use tracing::{debug, info, warn};
use tta_backend::TargetPlugin;
use tta_ir::{EmulationModule, ProgramModule};
use tta_machine::MachineDescription;

use crate::error::{CompileError, PassError};
use crate::interpass::{InterPassData, InterPassDatum, STACK_POINTER};
use crate::pass::{run_pass, PassGroup, PassStats};
use crate::passes::{
    global_dce, internalize, isel, link, lower_missing, unreachable, LabelFolding, LinearScan,
    MachineDce, PrologEpilogInserter,
};
use crate::program::{CompiledProgram, ProgramBuilder};
use crate::report::PipelineReport;

/// Name under which input verification failures are reported.
pub const VERIFY_STAGE: &str = "verify-input";

/// Options of one compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileOptions {
    pub opt_level: u32,
    /// Dump machine functions between stages.
    pub debug: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            opt_level: 2,
            debug: false,
        }
    }
}

/// Output of a successful pipeline run.
#[derive(Debug)]
pub struct PipelineOutput {
    pub program: CompiledProgram,
    pub report: PipelineReport,
}

fn stage_error(stage: &'static str) -> impl FnOnce(PassError) -> CompileError {
    move |source| CompileError::Stage { stage, source }
}

/// Compile `module` for `machine` through `plugin`.
///
/// The emulation module is consumed. On success the stack pointer register
/// is recorded in `inter_pass` under [`STACK_POINTER`]; on failure nothing
/// is recorded and no partial program is returned.
pub fn compile(
    module: ProgramModule,
    emulation: Option<EmulationModule>,
    plugin: &dyn TargetPlugin,
    machine: &MachineDescription,
    options: &CompileOptions,
    inter_pass: Option<&mut InterPassData>,
) -> Result<CompiledProgram, CompileError> {
    compile_with_report(module, emulation, plugin, machine, options, inter_pass)
        .map(|output| output.program)
}

/// [`compile`], also returning per-stage statistics.
pub fn compile_with_report(
    mut module: ProgramModule,
    emulation: Option<EmulationModule>,
    plugin: &dyn TargetPlugin,
    machine: &MachineDescription,
    options: &CompileOptions,
    inter_pass: Option<&mut InterPassData>,
) -> Result<PipelineOutput, CompileError> {
    let start = Instant::now();
    info!(module = %module.name, machine = %machine.name, "compiling");
    if plugin.machine_name() != machine.name {
        warn!(
            plugin = %plugin.machine_name(),
            machine = %machine.name,
            "plugin was generated for a different machine name"
        );
    }

    module
        .verify()
        .map_err(|detail| PassError::Invalid { detail })
        .map_err(stage_error(VERIFY_STAGE))?;

    let mut stages = Vec::new();

    // Stage 1: lower operations the machine cannot execute
    let lowered = lower_missing::run(&mut module, machine);
    stages.push(PassStats::new(lower_missing::NAME, lowered));

    // Stage 2: shrink the module before linking
    stages.push(PassStats::new(unreachable::NAME, unreachable::run(&mut module)));
    stages.push(PassStats::new(global_dce::NAME, global_dce::run(&mut module)));

    // Stage 3: emulation linking
    let mut emulation_linked = 0;
    if let Some(emulation) = emulation {
        emulation_linked = link::run(&mut module, emulation);
        stages.push(PassStats::new(link::NAME, emulation_linked));
    }

    // Stage 4: internalize
    let internalized = internalize::run(&mut module).map_err(stage_error(internalize::NAME))?;
    stages.push(PassStats::new(internalize::NAME, internalized));

    // Stage 5: instruction selection
    let mut mmodule = isel::run(&module, plugin).map_err(stage_error(isel::NAME))?;
    let selected = mmodule.functions.iter().map(|f| f.instruction_count()).sum();
    stages.push(PassStats::new(isel::NAME, selected));
    drop(module);
    if options.debug {
        for func in &mmodule.functions {
            debug!("after {}:\n{func}", isel::NAME);
        }
    }

    // Stage 6: machine function passes
    let mut group = PassGroup::new();
    group.add(Box::new(MachineDce));
    group.add(Box::new(LinearScan));
    group.add(Box::new(PrologEpilogInserter));
    group.add(Box::new(LabelFolding));
    let group_stats = group
        .run(&mut mmodule, plugin)
        .map_err(|(stage, source)| CompileError::Stage { stage, source })?;
    stages.extend(group_stats);
    if options.debug {
        for func in &mmodule.functions {
            debug!("after machine passes:\n{func}");
        }
    }

    // Stage 7: program object, after group finalization
    let mut builder = ProgramBuilder::new(machine);
    let built = run_pass(&mut builder, &mut mmodule, plugin)
        .map_err(stage_error(ProgramBuilder::NAME))?;
    stages.push(built);
    let program = builder.finish();

    if let Some(data) = inter_pass {
        let sp = plugin.stack_pointer();
        data.set_datum(
            STACK_POINTER,
            InterPassDatum::register(plugin.rf_name(sp), plugin.register_index(sp)),
        );
    }

    let duration_ms = start.elapsed().as_millis() as u64;
    let report = PipelineReport {
        machine: machine.name.clone(),
        plugin_machine: plugin.machine_name().to_string(),
        opt_level: options.opt_level,
        duration_ms,
        stages,
        emulation_linked,
        procedures: program.procedures.len(),
        instructions: program.instruction_count(),
    };
    info!(
        procedures = report.procedures,
        instructions = report.instructions,
        duration_ms,
        "compiled"
    );
    Ok(PipelineOutput { program, report })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tta_backend::TableDrivenPlugin;
    use tta_ir::builder::FunctionBuilder;

    fn plugin(machine: &MachineDescription) -> TableDrivenPlugin {
        TableDrivenPlugin::from_machine(machine).unwrap()
    }

    fn empty_main() -> ProgramModule {
        let mut module = ProgramModule::new("empty");
        let mut f = FunctionBuilder::new("main", 0);
        let mut entry = f.block("entry");
        entry.ret(None);
        f.finish_block(entry);
        module.functions.push(f.build());
        module
    }

    #[test]
    fn empty_main_compiles_to_single_return() {
        let machine = MachineDescription::minimal();
        let mut data = InterPassData::new();
        let program = compile(
            empty_main(),
            None,
            &plugin(&machine),
            &machine,
            &CompileOptions::default(),
            Some(&mut data),
        )
        .unwrap();
        assert_eq!(program.procedures.len(), 1);
        let main = &program.procedures[0];
        assert_eq!(main.instructions.len(), 1);
        assert_eq!(main.instructions[0].opcode, "ret");
        assert_eq!(data.stack_pointer(), Some(("RF", 1)));
    }

    #[test]
    fn stages_run_in_order() {
        let machine = MachineDescription::minimal();
        let output = compile_with_report(
            empty_main(),
            None,
            &plugin(&machine),
            &machine,
            &CompileOptions::default(),
            None,
        )
        .unwrap();
        let names: Vec<_> = output.report.stages.iter().map(|s| s.name).collect();
        assert_eq!(
            names,
            vec![
                lower_missing::NAME,
                unreachable::NAME,
                global_dce::NAME,
                internalize::NAME,
                isel::NAME,
                MachineDce::NAME,
                LinearScan::NAME,
                PrologEpilogInserter::NAME,
                LabelFolding::NAME,
                ProgramBuilder::NAME,
            ]
        );
    }

    #[test]
    fn missing_entry_is_a_stage_failure() {
        let machine = MachineDescription::minimal();
        let mut module = empty_main();
        module.entry = "start".into();
        let mut data = InterPassData::new();
        let err = compile(
            module,
            None,
            &plugin(&machine),
            &machine,
            &CompileOptions::default(),
            Some(&mut data),
        )
        .unwrap_err();
        assert_eq!(err.stage(), Some(internalize::NAME));
        assert!(data.is_empty());
    }

    #[test]
    fn values_live_across_calls_survive() {
        let machine = MachineDescription::minimal();
        let mut module = ProgramModule::new("calls");
        let mut f = FunctionBuilder::new("main", 0);
        let mut entry = f.block("entry");
        let a = entry.constant(6);
        let b = entry.constant(7);
        let r = entry.call("helper", &[a, b]);
        let s = entry.op("add", &[r, a]);
        entry.ret(Some(s));
        f.finish_block(entry);
        module.functions.push(f.build());

        let mut h = FunctionBuilder::new("helper", 2);
        let mut entry = h.block("entry");
        let (x, y) = (h.param(0), h.param(1));
        let z = entry.op("sub", &[x, y]);
        entry.ret(Some(z));
        h.finish_block(entry);
        module.functions.push(h.build());

        let program = compile(
            module,
            None,
            &plugin(&machine),
            &machine,
            &CompileOptions::default(),
            None,
        )
        .unwrap();
        assert_eq!(program.procedures[0].name, "main");
        let main = program.procedure("main").unwrap();
        let opcodes: Vec<_> = main.instructions.iter().map(|i| i.opcode.as_str()).collect();
        // main calls, so it saves the return address.
        assert_eq!(opcodes.first(), Some(&"sub"));
        assert!(main.instructions[1].operands.contains(&"gcu.ra".to_string()));
        assert!(program.procedure("helper").is_some());
    }
}
