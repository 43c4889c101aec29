//! Emulation modules: software implementations of missing operations.

use crate::module::{Function, ProgramModule};

/// A module of emulation routines linked into a program on demand.
///
/// Linking takes the module by value: once functions have been moved out
/// of it, the remainder is dropped and cannot be reused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmulationModule {
    module: ProgramModule,
}

impl EmulationModule {
    pub fn new(module: ProgramModule) -> Self {
        Self { module }
    }

    /// Name of the underlying module.
    pub fn name(&self) -> &str {
        &self.module.name
    }

    /// Whether the module provides a body for `name`.
    pub fn defines(&self, name: &str) -> bool {
        self.module
            .function(name)
            .is_some_and(|f| !f.is_declaration())
    }

    /// Parameter count of `name`, if the module mentions it.
    pub fn params_of(&self, name: &str) -> Option<u32> {
        self.module.function(name).map(|f| f.params)
    }

    /// Move the definition of `name` out of the module.
    pub fn take_definition(&mut self, name: &str) -> Option<Function> {
        let index = self
            .module
            .functions
            .iter()
            .position(|f| f.name == name && !f.is_declaration())?;
        Some(self.module.functions.remove(index))
    }

    pub fn into_inner(self) -> ProgramModule {
        self.module
    }
}

impl From<ProgramModule> for EmulationModule {
    fn from(module: ProgramModule) -> Self {
        Self::new(module)
    }
}
