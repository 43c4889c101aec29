//! Instruction selection through the target plugin.

use tta_backend::{SelectionContext, TargetPlugin};
use tta_ir::{Function, ProgramModule};

use crate::error::PassError;
use crate::mfunc::{MachineBlock, MachineFunction, MachineModule};

pub const NAME: &str = "instruction-selection";

fn select_function(func: &Function, plugin: &dyn TargetPlugin) -> Result<MachineFunction, PassError> {
    let fail = |source| PassError::Selection {
        function: func.name.clone(),
        source,
    };
    let mut ctx = SelectionContext::new();
    let mut mf = MachineFunction::new(&func.name, func.linkage);
    for (i, block) in func.blocks.iter().enumerate() {
        let mut mb = MachineBlock::new(&block.label);
        if i == 0 {
            mb.insts = plugin.lower_arguments(func.params, &mut ctx).map_err(fail)?;
        }
        for inst in &block.instructions {
            mb.insts.extend(plugin.select(inst, &mut ctx).map_err(fail)?);
        }
        mb.insts
            .extend(plugin.select_terminator(&block.terminator, &mut ctx).map_err(fail)?);
        mf.blocks.push(mb);
    }
    mf.vreg_count = ctx.vreg_count();
    mf.frame_objects = ctx.into_frame_objects();
    Ok(mf)
}

/// Select every defined function. Declarations become the module's
/// external symbols.
pub fn run(module: &ProgramModule, plugin: &dyn TargetPlugin) -> Result<MachineModule, PassError> {
    let functions = module
        .defined_functions()
        .map(|f| select_function(f, plugin))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(MachineModule {
        name: module.name.clone(),
        entry: module.entry.clone(),
        functions,
        externals: module.undefined_symbols(),
    })
}
