//! `ttacc compile` — compile a program for a machine.

use std::path::Path;

use anyhow::{Context, Result};
use tta_backend::{BackendConfig, TableDrivenPlugin};
use tta_compile::{
    check_machine, compile_with_report, Backend, CompileOptions, InterPassData, PipelineOutput,
};
use tta_ir::{load_emulation_module, load_module};
use tta_machine::load_machine_toml;

pub struct CompileRequest<'a> {
    pub program: &'a Path,
    pub machine: &'a Path,
    pub emulation: Option<&'a Path>,
    pub opt_level: u32,
    pub debug: bool,
    pub output: Option<&'a Path>,
    pub report: bool,
    /// Use the in-process table-driven plugin; no tools are run.
    pub no_plugin_build: bool,
    pub inter_pass: Option<&'a Path>,
}

pub fn run(config: BackendConfig, req: &CompileRequest<'_>) -> Result<()> {
    let machine = load_machine_toml(req.machine)
        .with_context(|| format!("loading machine {}", req.machine.display()))?;
    let options = CompileOptions {
        opt_level: req.opt_level,
        debug: req.debug,
    };
    let mut data = InterPassData::new();

    let PipelineOutput { program, report } = if req.no_plugin_build {
        check_machine(&machine)?;
        let module = load_module(req.program)?;
        let emulation = req.emulation.map(load_emulation_module).transpose()?;
        let plugin = TableDrivenPlugin::from_machine(&machine)?;
        compile_with_report(module, emulation, &plugin, &machine, &options, Some(&mut data))?
    } else {
        Backend::new(config).compile_files(
            req.program,
            req.emulation,
            &machine,
            &options,
            Some(&mut data),
        )?
    };

    match req.output {
        Some(path) => {
            program
                .write(path)
                .with_context(|| format!("writing {}", path.display()))?;
            println!(
                "Compiled {} procedures ({} instructions) to {}",
                program.procedures.len(),
                program.instruction_count(),
                path.display()
            );
        }
        None => print!("{program}"),
    }

    if let Some(path) = req.inter_pass {
        std::fs::write(path, data.to_json()?)
            .with_context(|| format!("writing {}", path.display()))?;
    }

    if req.report {
        println!();
        print!("{report}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tta_compile::CompiledProgram;
    use tta_ir::{write_module, FunctionBuilder, ProgramModule};
    use tta_machine::{write_machine_toml, MachineDescription};

    fn fixture(dir: &Path) {
        let mut module = ProgramModule::new("add");
        let mut f = FunctionBuilder::new("main", 2);
        let mut entry = f.block("entry");
        let (a, b) = (f.param(0), f.param(1));
        let sum = entry.op("add", &[a, b]);
        entry.ret(Some(sum));
        f.finish_block(entry);
        module.functions.push(f.build());
        write_module(&module, &dir.join("add.tir.json")).unwrap();
        write_machine_toml(&MachineDescription::minimal(), &dir.join("minimal.machine.toml"))
            .unwrap();
    }

    #[test]
    fn compile_without_plugin_build() {
        let dir = tempfile::tempdir().unwrap();
        fixture(dir.path());
        let out = dir.path().join("add.tpo.json");
        let ipd = dir.path().join("ipd.json");
        let req = CompileRequest {
            program: &dir.path().join("add.tir.json"),
            machine: &dir.path().join("minimal.machine.toml"),
            emulation: None,
            opt_level: 2,
            debug: false,
            output: Some(&out),
            report: true,
            no_plugin_build: true,
            inter_pass: Some(&ipd),
        };
        run(BackendConfig::default(), &req).unwrap();

        let program = CompiledProgram::from_json(&std::fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(program.procedures[0].name, "main");
        assert!(std::fs::read_to_string(&ipd).unwrap().contains("STACK_POINTER"));
    }

    #[test]
    fn missing_machine_file() {
        let dir = tempfile::tempdir().unwrap();
        fixture(dir.path());
        let req = CompileRequest {
            program: &dir.path().join("add.tir.json"),
            machine: &dir.path().join("nope.machine.toml"),
            emulation: None,
            opt_level: 2,
            debug: false,
            output: None,
            report: false,
            no_plugin_build: true,
            inter_pass: None,
        };
        let err = run(BackendConfig::default(), &req).unwrap_err();
        assert!(format!("{err:#}").contains("loading machine"));
    }
}
