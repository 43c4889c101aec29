//! Test doubles for the tool and loader capabilities.
//!
//! Enabled for this crate's tests and, through the `test-utils` feature,
//! for downstream crates.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tta_machine::MachineDescription;

use crate::error::{BackendError, Result};
use crate::loader::{LoadedModule, PluginLoader};
use crate::plugin::TargetPlugin;
use crate::table::TableDrivenPlugin;
use crate::tool::{CommandLine, ToolInvoker, ToolOutput};

/// Contents the mock compiler writes and the mock loader accepts.
pub const MOCK_PLUGIN: &[u8] = b"valid-plugin";

/// Shared record of the invocations made through a [`MockInvoker`].
#[derive(Debug, Clone, Default)]
pub struct InvocationLog {
    calls: Arc<Mutex<Vec<(CommandLine, PathBuf)>>>,
}

impl InvocationLog {
    pub fn count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }

    pub fn commands(&self) -> Vec<CommandLine> {
        self.calls
            .lock()
            .map(|c| c.iter().map(|(cmd, _)| cmd.clone()).collect())
            .unwrap_or_default()
    }

    pub fn working_dirs(&self) -> Vec<PathBuf> {
        self.calls
            .lock()
            .map(|c| c.iter().map(|(_, dir)| dir.clone()).collect())
            .unwrap_or_default()
    }
}

/// Records invocations and fakes their outputs.
///
/// A successful invocation writes to the path following `-o`: table stubs
/// for `.inc` outputs and [`MOCK_PLUGIN`] for anything else.
#[derive(Debug, Default)]
pub struct MockInvoker {
    log: InvocationLog,
    fail_on: Option<String>,
    output: Option<String>,
}

impl MockInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every command whose rendering contains `pattern`.
    pub fn failing_on(mut self, pattern: &str) -> Self {
        self.fail_on = Some(pattern.to_string());
        self
    }

    /// Text echoed as the captured output of every command.
    pub fn with_output(mut self, output: &str) -> Self {
        self.output = Some(output.to_string());
        self
    }

    pub fn log(&self) -> InvocationLog {
        self.log.clone()
    }
}

impl ToolInvoker for MockInvoker {
    fn invoke(&self, command: &CommandLine, working_dir: &Path) -> std::io::Result<ToolOutput> {
        if let Ok(mut calls) = self.log.calls.lock() {
            calls.push((command.clone(), working_dir.to_path_buf()));
        }
        let output = self.output.clone().unwrap_or_default();
        if let Some(pattern) = &self.fail_on {
            if command.render().contains(pattern.as_str()) {
                return Ok(ToolOutput {
                    status: Some(1),
                    output: format!("{output}mock failure"),
                });
            }
        }
        if let Some(out) = command.value_of("-o") {
            let out = working_dir.join(out);
            let is_table = out.extension().is_some_and(|e| e == "inc");
            let contents: &[u8] = if is_table { b"// table\n" } else { MOCK_PLUGIN };
            std::fs::write(out, contents)?;
        }
        Ok(ToolOutput {
            status: Some(0),
            output,
        })
    }
}

/// Accepts files containing [`MOCK_PLUGIN`] and resolves them to a
/// table-driven plugin for a fixed machine.
#[derive(Debug)]
pub struct MockLoader {
    machine: MachineDescription,
    fail_all: bool,
    loads: Arc<AtomicUsize>,
}

impl Default for MockLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLoader {
    pub fn new() -> Self {
        Self::for_machine(MachineDescription::minimal())
    }

    pub fn for_machine(machine: MachineDescription) -> Self {
        Self {
            machine,
            fail_all: false,
            loads: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Reject every artifact.
    pub fn fail_all(mut self) -> Self {
        self.fail_all = true;
        self
    }

    /// Counter of load attempts, shared with clones of the handle.
    pub fn loads(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.loads)
    }
}

impl PluginLoader for MockLoader {
    fn load(&self, path: &Path) -> Result<LoadedModule> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let fail = |detail: &str| BackendError::PluginLoad {
            path: path.to_path_buf(),
            detail: detail.to_string(),
        };
        if self.fail_all {
            return Err(fail("mock loader rejects everything"));
        }
        let contents = std::fs::read(path).map_err(|e| fail(&e.to_string()))?;
        if contents != MOCK_PLUGIN {
            return Err(fail("not a plugin"));
        }
        Ok(LoadedModule::detached(path))
    }

    fn resolve_entry_point(&self, _module: &LoadedModule) -> Result<Box<dyn TargetPlugin>> {
        Ok(Box::new(TableDrivenPlugin::from_machine(&self.machine)?))
    }
}
