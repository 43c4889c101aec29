//! `ttacc schedule` — compile, then hand the program to the scheduler.

use std::path::Path;

use anyhow::{Context, Result};
use tta_backend::BackendConfig;
use tta_compile::{Backend, InterPassData, SchedulingPlan};
use tta_machine::load_machine_toml;

#[allow(clippy::too_many_arguments)]
pub fn run(
    config: BackendConfig,
    program: &Path,
    machine: &Path,
    emulation: Option<&Path>,
    opt_level: u32,
    debug_level: u32,
    plan: Option<&Path>,
    output: &Path,
) -> Result<()> {
    let machine = load_machine_toml(machine)
        .with_context(|| format!("loading machine {}", machine.display()))?;
    let plan = plan.map(SchedulingPlan::load).transpose()?;
    let mut data = InterPassData::new();

    let scheduled = Backend::new(config).schedule(
        program,
        emulation,
        &machine,
        opt_level,
        debug_level,
        plan,
        Some(&mut data),
    )?;
    scheduled
        .write(output)
        .with_context(|| format!("writing {}", output.display()))?;
    println!(
        "Scheduled {} procedures ({} instructions) to {}",
        scheduled.procedures.len(),
        scheduled.instruction_count(),
        output.display()
    );
    if let Some((rf, index)) = data.stack_pointer() {
        println!("Stack pointer: {rf}.{index}");
    }
    Ok(())
}
