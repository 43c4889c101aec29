//! External tool invocation.
//!
//! Commands are built as structured argument lists and never pass through
//! a shell, so machine-derived paths need no quoting.

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

/// A program and its ordered arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: PathBuf,
    pub args: Vec<OsString>,
}

impl CommandLine {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Value following `flag`, if present.
    pub fn value_of(&self, flag: &str) -> Option<&OsString> {
        let pos = self.args.iter().position(|a| a == flag)?;
        self.args.get(pos + 1)
    }

    /// Human-readable rendering for diagnostics. Not meant for re-execution.
    pub fn render(&self) -> String {
        let mut out = self.program.display().to_string();
        for arg in &self.args {
            out.push(' ');
            out.push_str(&arg.to_string_lossy());
        }
        out
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Exit status and combined stdout/stderr of a finished tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    /// `None` when the process was terminated by a signal.
    pub status: Option<i32>,
    pub output: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

/// Runs external tools to completion.
pub trait ToolInvoker {
    /// Run `command` in `working_dir`, blocking until it exits.
    fn invoke(&self, command: &CommandLine, working_dir: &Path) -> std::io::Result<ToolOutput>;
}

/// Runs tools as child processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessInvoker;

impl ToolInvoker for ProcessInvoker {
    fn invoke(&self, command: &CommandLine, working_dir: &Path) -> std::io::Result<ToolOutput> {
        debug!(command = %command, dir = %working_dir.display(), "invoking tool");
        let out = Command::new(&command.program)
            .args(&command.args)
            .current_dir(working_dir)
            .output()?;
        let mut output = String::from_utf8_lossy(&out.stdout).into_owned();
        output.push_str(&String::from_utf8_lossy(&out.stderr));
        Ok(ToolOutput {
            status: out.status.code(),
            output,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_and_lookup() {
        let cmd = CommandLine::new("tblgen")
            .arg("-I")
            .arg("/opt/include")
            .args(["TTA.td", "-gen-dag-isel", "-o", "out.inc"]);
        assert_eq!(
            cmd.render(),
            "tblgen -I /opt/include TTA.td -gen-dag-isel -o out.inc"
        );
        assert_eq!(cmd.value_of("-o").unwrap(), "out.inc");
        assert!(cmd.value_of("-x").is_none());
    }

    #[test]
    fn missing_program_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let cmd = CommandLine::new("/nonexistent/ttacc-tool");
        assert!(ProcessInvoker.invoke(&cmd, dir.path()).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn captures_status_and_output() {
        let dir = tempfile::tempdir().unwrap();
        let cmd = CommandLine::new("sh").args(["-c", "echo hello; exit 3"]);
        let out = ProcessInvoker.invoke(&cmd, dir.path()).unwrap();
        assert_eq!(out.status, Some(3));
        assert!(!out.success());
        assert!(out.output.contains("hello"));
    }
}
