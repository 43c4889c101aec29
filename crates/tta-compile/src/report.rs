//! Compilation report aggregating all pipeline stages.

use std::fmt;

use crate::pass::PassStats;

/// Summary of one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    /// Target machine name.
    pub machine: String,
    /// Machine name the plugin was generated for.
    pub plugin_machine: String,
    pub opt_level: u32,
    /// Total pipeline duration in milliseconds.
    pub duration_ms: u64,
    /// Statistics of every stage, in execution order.
    pub stages: Vec<PassStats>,
    /// Emulation routines linked in.
    pub emulation_linked: usize,
    pub procedures: usize,
    pub instructions: usize,
}

impl PipelineReport {
    pub fn stage(&self, name: &str) -> Option<&PassStats> {
        self.stages.iter().find(|s| s.name == name)
    }
}

impl fmt::Display for PipelineReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Compilation Report ===")?;
        writeln!(f, "Machine: {}", self.machine)?;
        if self.plugin_machine != self.machine {
            writeln!(f, "Plugin machine: {}", self.plugin_machine)?;
        }
        writeln!(f, "Optimization level: {}", self.opt_level)?;
        writeln!(f, "Duration: {} ms", self.duration_ms)?;

        writeln!(f)?;
        writeln!(f, "--- Stages ({}) ---", self.stages.len())?;
        for stats in &self.stages {
            writeln!(f, "  {:<32} {} changes", stats.name, stats.changes)?;
        }

        writeln!(f)?;
        writeln!(f, "--- Program ---")?;
        writeln!(f, "  Procedures: {}", self.procedures)?;
        writeln!(f, "  Instructions: {}", self.instructions)?;
        if self.emulation_linked > 0 {
            writeln!(f, "  Emulation routines linked: {}", self.emulation_linked)?;
        }
        Ok(())
    }
}
