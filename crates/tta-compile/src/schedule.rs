//! Hand-off of compiled programs to an external scheduler.
//!
//! The gateway only fixes the contract: a compiled program, the machine,
//! and a scheduling plan go in, a rescheduled program comes out. How the
//! program is reordered is the scheduler's business.
//!
//! ```toml
//! name = "default"
//!
//! [[passes]]
//! name = "bb-scheduler"
//!
//! [[passes]]
//! name = "delay-slot-filler"
//! options = { slots = "3" }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use tta_backend::{BackendConfig, CommandLine, ProcessInvoker, ToolInvoker};
use tta_machine::{write_machine_toml, MachineDescription};

use crate::error::ScheduleError;
use crate::program::CompiledProgram;

/// One scheduler pass and its options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanPass {
    pub name: String,
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

/// An ordered list of scheduler passes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulingPlan {
    pub name: String,
    #[serde(default)]
    pub passes: Vec<PlanPass>,
}

impl SchedulingPlan {
    /// Parse and validate a plan. Content errors are reported under
    /// `origin`.
    pub fn from_toml(text: &str, origin: &str) -> Result<Self, ScheduleError> {
        let plan: SchedulingPlan =
            toml::from_str(text).map_err(|e| ScheduleError::InvalidPlan {
                name: origin.to_string(),
                detail: e.to_string(),
            })?;
        plan.validate()?;
        Ok(plan)
    }

    /// Load a caller-supplied plan file.
    pub fn load(path: &Path) -> Result<Self, ScheduleError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text, &path.display().to_string())
    }

    pub fn validate(&self) -> Result<(), ScheduleError> {
        let invalid = |detail: &str| ScheduleError::InvalidPlan {
            name: self.name.clone(),
            detail: detail.to_string(),
        };
        if self.name.trim().is_empty() {
            return Err(invalid("plan has no name"));
        }
        if self.passes.is_empty() {
            return Err(invalid("plan has no passes"));
        }
        if self.passes.iter().any(|p| p.name.trim().is_empty()) {
            return Err(invalid("pass without a name"));
        }
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String, ScheduleError> {
        toml::to_string(self).map_err(|e| ScheduleError::InvalidPlan {
            name: self.name.clone(),
            detail: e.to_string(),
        })
    }
}

/// Scheduler boundary.
pub trait Scheduler {
    fn schedule(
        &self,
        program: &CompiledProgram,
        machine: &MachineDescription,
        plan: &SchedulingPlan,
        opt_level: u32,
        debug_level: u32,
    ) -> Result<CompiledProgram, ScheduleError>;
}

/// Runs a scheduler executable on files in a private working directory.
///
/// Invocation: `<tool> -O <n> -a machine.toml -p plan.toml -o scheduled.json
/// [-v] [--debug] program.json`.
pub struct ExternalScheduler {
    tool: PathBuf,
    invoker: Box<dyn ToolInvoker>,
}

impl std::fmt::Debug for ExternalScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExternalScheduler")
            .field("tool", &self.tool)
            .finish_non_exhaustive()
    }
}

impl ExternalScheduler {
    pub fn new(tool: impl Into<PathBuf>, invoker: Box<dyn ToolInvoker>) -> Self {
        Self {
            tool: tool.into(),
            invoker,
        }
    }

    /// The scheduler configured in `config`, run as a child process.
    pub fn from_config(config: &BackendConfig) -> Self {
        Self::new(config.toolchain.scheduler.clone(), Box::new(ProcessInvoker))
    }
}

impl Scheduler for ExternalScheduler {
    fn schedule(
        &self,
        program: &CompiledProgram,
        machine: &MachineDescription,
        plan: &SchedulingPlan,
        opt_level: u32,
        debug_level: u32,
    ) -> Result<CompiledProgram, ScheduleError> {
        let workdir = tempfile::Builder::new().prefix("ttacc-schedule-").tempdir()?;
        let dir = workdir.path();
        let machine_file = dir.join("machine.toml");
        let plan_file = dir.join("plan.toml");
        let program_file = dir.join("program.json");
        let output_file = dir.join("scheduled.json");

        write_machine_toml(machine, &machine_file)?;
        std::fs::write(&plan_file, plan.to_toml()?)?;
        program.write(&program_file)?;

        let mut cmd = CommandLine::new(&self.tool)
            .arg("-O")
            .arg(opt_level.to_string())
            .arg("-a")
            .arg(&machine_file)
            .arg("-p")
            .arg(&plan_file)
            .arg("-o")
            .arg(&output_file);
        if debug_level > 3 {
            cmd = cmd.arg("-v");
        }
        if debug_level > 4 {
            cmd = cmd.arg("--debug");
        }
        cmd = cmd.arg(&program_file);

        let out = self.invoker.invoke(&cmd, dir)?;
        if debug_level > 3 && !out.output.is_empty() {
            info!("scheduler output:\n{}", out.output);
        }
        if !out.success() {
            return Err(ScheduleError::SchedulerFailed {
                command: cmd.render(),
                output: out.output,
            });
        }
        if !output_file.exists() {
            return Err(ScheduleError::NoOutput {
                command: cmd.render(),
            });
        }
        let json = std::fs::read_to_string(&output_file)?;
        Ok(CompiledProgram::from_json(&json)?)
    }
}

/// Resolves the scheduling plan and delegates to a [`Scheduler`].
pub struct SchedulingGateway {
    default_plan: Option<PathBuf>,
    scheduler: Box<dyn Scheduler>,
}

impl SchedulingGateway {
    pub fn new(default_plan: Option<PathBuf>, scheduler: Box<dyn Scheduler>) -> Self {
        Self {
            default_plan,
            scheduler,
        }
    }

    /// Gateway with the configured default plan and external scheduler.
    pub fn from_config(config: &BackendConfig) -> Self {
        Self::new(
            config.default_scheduler_plan.clone(),
            Box::new(ExternalScheduler::from_config(config)),
        )
    }

    /// Load the default plan. An unreadable file is an I/O failure kept
    /// apart from bad plan content.
    pub fn default_plan(&self) -> Result<SchedulingPlan, ScheduleError> {
        let path = self
            .default_plan
            .as_ref()
            .ok_or(ScheduleError::NoDefaultPlan)?;
        let text = std::fs::read_to_string(path).map_err(|source| ScheduleError::DefaultPlanIo {
            path: path.clone(),
            source,
        })?;
        SchedulingPlan::from_toml(&text, &path.display().to_string())
    }

    pub fn schedule(
        &self,
        program: &CompiledProgram,
        machine: &MachineDescription,
        opt_level: u32,
        debug_level: u32,
        plan: Option<SchedulingPlan>,
    ) -> Result<CompiledProgram, ScheduleError> {
        let plan = match plan {
            Some(plan) => {
                plan.validate()?;
                plan
            }
            None => self.default_plan()?,
        };
        debug!(plan = %plan.name, passes = plan.passes.len(), "scheduling");
        self.scheduler
            .schedule(program, machine, &plan, opt_level, debug_level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;
    use tta_backend::ToolOutput;

    use crate::program::{Instruction, Procedure};

    const PLAN: &str = r#"
name = "basic"

[[passes]]
name = "bb-scheduler"

[[passes]]
name = "delay-slot-filler"
options = { slots = "3" }
"#;

    fn program() -> CompiledProgram {
        CompiledProgram {
            machine: "minimal".into(),
            entry: "main".into(),
            procedures: vec![Procedure {
                name: "main".into(),
                frame_size: 0,
                instructions: vec![Instruction {
                    label: Some("main.entry".into()),
                    opcode: "ret".into(),
                    operands: vec![],
                }],
            }],
            externals: vec![],
        }
    }

    /// Copies the program argument to the `-o` path, or fails.
    #[derive(Clone, Default)]
    struct CopyTool {
        commands: Rc<RefCell<Vec<CommandLine>>>,
        status: Option<i32>,
        skip_output: bool,
    }

    impl ToolInvoker for CopyTool {
        fn invoke(&self, command: &CommandLine, _dir: &Path) -> std::io::Result<ToolOutput> {
            self.commands.borrow_mut().push(command.clone());
            let status = self.status.unwrap_or(0);
            if status == 0 && !self.skip_output {
                let out = command.value_of("-o").map(PathBuf::from);
                let input = command.args.last().map(PathBuf::from);
                if let (Some(out), Some(input)) = (out, input) {
                    std::fs::copy(input, out)?;
                }
            }
            Ok(ToolOutput {
                status: Some(status),
                output: "scheduled".into(),
            })
        }
    }

    struct Recorder(Rc<RefCell<Vec<String>>>);

    impl Scheduler for Recorder {
        fn schedule(
            &self,
            program: &CompiledProgram,
            _machine: &MachineDescription,
            plan: &SchedulingPlan,
            _opt_level: u32,
            _debug_level: u32,
        ) -> Result<CompiledProgram, ScheduleError> {
            self.0.borrow_mut().push(plan.name.clone());
            Ok(program.clone())
        }
    }

    #[test]
    fn plan_parsing_and_validation() {
        let plan = SchedulingPlan::from_toml(PLAN, "inline").unwrap();
        assert_eq!(plan.passes.len(), 2);
        assert_eq!(plan.passes[1].options["slots"], "3");

        let err = SchedulingPlan::from_toml("name = \"empty\"", "inline").unwrap_err();
        assert!(matches!(err, ScheduleError::InvalidPlan { .. }));
        let err = SchedulingPlan::from_toml("passes = 3", "inline").unwrap_err();
        assert!(matches!(err, ScheduleError::InvalidPlan { .. }));
    }

    #[test]
    fn external_scheduler_command_line() {
        let tool = CopyTool::default();
        let scheduler = ExternalScheduler::new("schedule", Box::new(tool.clone()));
        let plan = SchedulingPlan::from_toml(PLAN, "inline").unwrap();
        let machine = MachineDescription::minimal();

        let result = scheduler.schedule(&program(), &machine, &plan, 3, 5).unwrap();
        assert_eq!(result, program());

        let commands = tool.commands.borrow();
        let rendered = commands[0].render();
        assert!(rendered.starts_with("schedule -O 3 -a "));
        assert!(rendered.contains(" -v --debug "));
        assert!(rendered.ends_with("program.json"));
    }

    #[test]
    fn scheduler_failure_and_missing_output() {
        let plan = SchedulingPlan::from_toml(PLAN, "inline").unwrap();
        let machine = MachineDescription::minimal();

        let failing = CopyTool {
            status: Some(1),
            ..CopyTool::default()
        };
        let err = ExternalScheduler::new("schedule", Box::new(failing))
            .schedule(&program(), &machine, &plan, 2, 0)
            .unwrap_err();
        assert!(matches!(err, ScheduleError::SchedulerFailed { .. }));

        let silent = CopyTool {
            skip_output: true,
            ..CopyTool::default()
        };
        let err = ExternalScheduler::new("schedule", Box::new(silent))
            .schedule(&program(), &machine, &plan, 2, 0)
            .unwrap_err();
        assert!(matches!(err, ScheduleError::NoOutput { .. }));
    }

    #[test]
    fn gateway_uses_default_plan() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("default.toml");
        std::fs::write(&path, PLAN).unwrap();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let gateway = SchedulingGateway::new(Some(path), Box::new(Recorder(seen.clone())));

        let machine = MachineDescription::minimal();
        gateway.schedule(&program(), &machine, 2, 0, None).unwrap();
        let explicit = SchedulingPlan {
            name: "explicit".into(),
            passes: vec![PlanPass {
                name: "bb-scheduler".into(),
                options: BTreeMap::new(),
            }],
        };
        gateway
            .schedule(&program(), &machine, 2, 0, Some(explicit))
            .unwrap();
        assert_eq!(*seen.borrow(), vec!["basic", "explicit"]);
    }

    #[test]
    fn default_plan_errors_are_distinct() {
        let dir = tempfile::tempdir().unwrap();
        let machine = MachineDescription::minimal();
        let recorder = || Box::new(Recorder(Rc::new(RefCell::new(Vec::new()))));

        let none = SchedulingGateway::new(None, recorder());
        assert!(matches!(
            none.schedule(&program(), &machine, 2, 0, None),
            Err(ScheduleError::NoDefaultPlan)
        ));

        let missing = SchedulingGateway::new(Some(dir.path().join("nope.toml")), recorder());
        let err = missing
            .schedule(&program(), &machine, 2, 0, None)
            .unwrap_err();
        assert!(matches!(err, ScheduleError::DefaultPlanIo { .. }));
        assert!(err.to_string().starts_with("Unable to load default scheduler config"));

        let bad = dir.path().join("bad.toml");
        std::fs::write(&bad, "name = \"bad\"\npasses = []\n").unwrap();
        let invalid = SchedulingGateway::new(Some(bad), recorder());
        assert!(matches!(
            invalid.schedule(&program(), &machine, 2, 0, None),
            Err(ScheduleError::InvalidPlan { .. })
        ));
    }
}
