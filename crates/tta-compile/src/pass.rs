//! Machine function pass traits and pass groups.
//!
//! A [`PassGroup`] runs its passes the way a function pass manager does:
//! every pass is initialized, then all passes run over each function in
//! module order, then every pass is finalized with the whole module.

use std::fmt;

use tta_backend::TargetPlugin;

use crate::error::PassError;
use crate::mfunc::{MachineFunction, MachineModule};

/// Statistics from one pass over the module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassStats {
    pub name: &'static str,
    /// Number of rewrites the pass made (instructions, blocks, or
    /// functions, depending on the pass).
    pub changes: usize,
}

impl PassStats {
    pub fn new(name: &'static str, changes: usize) -> Self {
        Self { name, changes }
    }
}

/// Trait for passes over machine functions.
///
/// Object-safe so groups can hold `Box<dyn MachineFunctionPass>`.
pub trait MachineFunctionPass: fmt::Debug {
    fn name(&self) -> &'static str;

    fn initialize(&mut self, _module: &MachineModule) {}

    /// Transform one function, returning the number of changes made.
    fn run_on_function(
        &mut self,
        func: &mut MachineFunction,
        plugin: &dyn TargetPlugin,
    ) -> Result<usize, PassError>;

    /// Module-wide cleanup after every function has been visited.
    fn finalize(&mut self, _module: &mut MachineModule) -> Result<usize, PassError> {
        Ok(0)
    }
}

/// Run a single pass as its own group, keeping ownership of the pass so
/// its results can be taken afterwards.
pub fn run_pass(
    pass: &mut dyn MachineFunctionPass,
    module: &mut MachineModule,
    plugin: &dyn TargetPlugin,
) -> Result<PassStats, PassError> {
    pass.initialize(module);
    let mut changes = 0;
    for func in &mut module.functions {
        changes += pass.run_on_function(func, plugin)?;
    }
    changes += pass.finalize(module)?;
    Ok(PassStats::new(pass.name(), changes))
}

/// An ordered group of machine function passes.
#[derive(Debug, Default)]
pub struct PassGroup {
    passes: Vec<Box<dyn MachineFunctionPass>>,
}

impl PassGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, pass: Box<dyn MachineFunctionPass>) {
        self.passes.push(pass);
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.passes.iter().map(|p| p.name()).collect()
    }

    /// Run the group. A failure reports the name of the pass that failed.
    pub fn run(
        &mut self,
        module: &mut MachineModule,
        plugin: &dyn TargetPlugin,
    ) -> Result<Vec<PassStats>, (&'static str, PassError)> {
        let mut changes = vec![0usize; self.passes.len()];
        for pass in &mut self.passes {
            pass.initialize(module);
        }
        for func in &mut module.functions {
            for (i, pass) in self.passes.iter_mut().enumerate() {
                changes[i] += pass
                    .run_on_function(func, plugin)
                    .map_err(|e| (pass.name(), e))?;
            }
        }
        for (i, pass) in self.passes.iter_mut().enumerate() {
            changes[i] += pass.finalize(module).map_err(|e| (pass.name(), e))?;
        }
        Ok(self
            .passes
            .iter()
            .zip(changes)
            .map(|(p, c)| PassStats::new(p.name(), c))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tta_backend::TableDrivenPlugin;
    use tta_ir::Linkage;
    use tta_machine::MachineDescription;

    #[derive(Debug, Default)]
    struct Counter {
        initialized: bool,
        seen: Vec<String>,
    }

    impl MachineFunctionPass for Counter {
        fn name(&self) -> &'static str {
            "counter"
        }

        fn initialize(&mut self, _module: &MachineModule) {
            self.initialized = true;
        }

        fn run_on_function(
            &mut self,
            func: &mut MachineFunction,
            _plugin: &dyn TargetPlugin,
        ) -> Result<usize, PassError> {
            assert!(self.initialized);
            self.seen.push(func.name.clone());
            Ok(1)
        }

        fn finalize(&mut self, module: &mut MachineModule) -> Result<usize, PassError> {
            module.functions.pop();
            Ok(10)
        }
    }

    #[test]
    fn group_runs_every_function_then_finalizes() {
        let plugin = TableDrivenPlugin::from_machine(&MachineDescription::minimal()).unwrap();
        let mut module = MachineModule {
            name: "m".into(),
            entry: "main".into(),
            functions: vec![
                MachineFunction::new("main", Linkage::External),
                MachineFunction::new("helper", Linkage::Internal),
            ],
            externals: Default::default(),
        };
        let mut group = PassGroup::new();
        group.add(Box::new(Counter::default()));
        let stats = group.run(&mut module, &plugin).unwrap();
        assert_eq!(stats, vec![PassStats::new("counter", 12)]);
        assert_eq!(module.functions.len(), 1);
        assert_eq!(group.names(), vec!["counter"]);
    }
}
