//! End-to-end tests: machine validation, plugin acquisition through a
//! mocked cache, compilation, and emulation linking.

use std::path::Path;

use tta_backend::testing::{InvocationLog, MockInvoker, MockLoader, MOCK_PLUGIN};
use tta_backend::{BackendConfig, PluginCache};
use tta_compile::passes::{internalize, link};
use tta_compile::{
    init_test_subscriber, Backend, CompileError, CompileOptions, InterPassData, PassError,
};
use tta_ir::{write_module, FunctionBuilder, LoadError, ProgramModule};
use tta_machine::{validate, ErrorCode, MachineDescription};

fn init_tracing() {
    // Only the first test to get here installs the subscriber.
    let _ = init_test_subscriber(tracing::Level::DEBUG);
}

fn backend(dir: &Path) -> (Backend, InvocationLog) {
    init_tracing();
    let config = BackendConfig {
        cache_dir: dir.join("cache"),
        ..BackendConfig::default()
    };
    let invoker = MockInvoker::new();
    let log = invoker.log();
    let cache = PluginCache::with_capabilities(
        config.clone(),
        Box::new(invoker),
        Box::new(MockLoader::new()),
    );
    (Backend::new(config).with_cache(cache), log)
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

/// `main(a, b) = a / b`; the minimal machine has no divider.
fn divide_main() -> ProgramModule {
    let mut module = ProgramModule::new("divide");
    let mut f = FunctionBuilder::new("main", 2);
    let mut entry = f.block("entry");
    let (a, b) = (f.param(0), f.param(1));
    let q = entry.op("div", &[a, b]);
    entry.ret(Some(q));
    f.finish_block(entry);
    module.functions.push(f.build());
    module
}

/// Routines for `div` and `mul`; only `div` is needed by [`divide_main`].
fn emulation() -> ProgramModule {
    let mut module = ProgramModule::new("libemu");
    for name in ["__divsi3", "__mulsi3"] {
        let mut f = FunctionBuilder::new(name, 2);
        let mut entry = f.block("entry");
        let (a, b) = (f.param(0), f.param(1));
        let r = entry.op("sub", &[a, b]);
        entry.ret(Some(r));
        f.finish_block(entry);
        module.functions.push(f.build());
    }
    module
}

#[test]
fn scenario_a_empty_function() {
    let dir = tempfile::tempdir().unwrap();
    let (backend, _log) = backend(dir.path());
    let program_path = dir.path().join("empty.tir.json");
    write_module(&empty_main(), &program_path).unwrap();

    let mut data = InterPassData::new();
    let output = backend
        .compile_files(
            &program_path,
            None,
            &MachineDescription::minimal(),
            &CompileOptions::default(),
            Some(&mut data),
        )
        .unwrap();

    let program = output.program;
    assert_eq!(program.procedures.len(), 1, "expected exactly one procedure");
    let main = &program.procedures[0];
    assert_eq!(main.name, "main");
    let opcodes: Vec<_> = main.instructions.iter().map(|i| i.opcode.as_str()).collect();
    assert_eq!(opcodes, vec!["ret"]);
    assert_eq!(data.stack_pointer(), Some(("RF", 1)));
    assert!(output.report.to_string().contains("Procedures: 1"));
}

#[test]
fn scenario_b_missing_gcu_stops_before_plugin() {
    let dir = tempfile::tempdir().unwrap();
    let (backend, log) = backend(dir.path());
    let mut machine = MachineDescription::minimal();
    machine.control_unit = None;

    let result = validate(&machine, &ErrorCode::required());
    assert_eq!(
        result.codes().into_iter().collect::<Vec<_>>(),
        vec![ErrorCode::GcuMissing]
    );

    let program_path = dir.path().join("empty.tir.json");
    write_module(&empty_main(), &program_path).unwrap();
    let err = backend
        .compile_files(&program_path, None, &machine, &CompileOptions::default(), None)
        .unwrap_err();
    assert!(matches!(err, CompileError::Validation(_)));
    assert_eq!(log.count(), 0, "no tool may run for an invalid machine");
    assert_eq!(backend.cache().stats().regenerations, 0);
}

#[test]
fn scenario_c_corrupt_artifact_is_regenerated() {
    let dir = tempfile::tempdir().unwrap();
    let (backend, log) = backend(dir.path());
    let machine = MachineDescription::minimal();
    let fingerprint = backend.cache().fingerprint(&machine).unwrap();
    let artifact = backend.cache().artifact_path(&fingerprint);
    std::fs::create_dir_all(artifact.parent().unwrap()).unwrap();
    std::fs::write(&artifact, b"torn write").unwrap();

    let output = backend
        .compile_module(empty_main(), None, &machine, &CompileOptions::default(), None)
        .unwrap();
    assert_eq!(output.program.procedures.len(), 1);
    assert_eq!(log.count(), 7);
    assert_eq!(std::fs::read(&artifact).unwrap(), MOCK_PLUGIN);
}

#[test]
fn scenario_d_emulation_routine_is_linked() {
    let dir = tempfile::tempdir().unwrap();
    let (backend, _log) = backend(dir.path());
    let program_path = dir.path().join("divide.tir.json");
    let emulation_path = dir.path().join("libemu.tir.json");
    write_module(&divide_main(), &program_path).unwrap();
    write_module(&emulation(), &emulation_path).unwrap();

    let output = backend
        .compile_files(
            &program_path,
            Some(&emulation_path),
            &MachineDescription::minimal(),
            &CompileOptions::default(),
            None,
        )
        .unwrap();

    let program = &output.program;
    assert_eq!(program.procedures[0].name, "main");
    let divide = program.procedure("__divsi3").expect("emulation routine linked");
    assert!(divide.instructions.iter().any(|i| i.opcode == "sub"));
    assert!(program.procedure("__mulsi3").is_none());
    assert!(program.externals.is_empty());
    assert_eq!(output.report.stage(link::NAME).map(|s| s.changes), Some(1));
    assert_eq!(output.report.emulation_linked, 1);
}

#[test]
fn missing_emulation_leaves_external_call() {
    let dir = tempfile::tempdir().unwrap();
    let (backend, _log) = backend(dir.path());
    let output = backend
        .compile_module(
            divide_main(),
            None,
            &MachineDescription::minimal(),
            &CompileOptions::default(),
            None,
        )
        .unwrap();
    assert_eq!(output.program.externals, vec!["__divsi3"]);
    let main = output.program.procedure("main").unwrap();
    assert!(main
        .instructions
        .iter()
        .any(|i| i.opcode == "call" && i.operands.contains(&"@__divsi3".to_string())));
}

#[test]
fn compilation_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let (backend, log) = backend(dir.path());
    let machine = MachineDescription::minimal();
    let options = CompileOptions::default();

    let first = backend
        .compile_module(divide_main(), Some(emulation().into()), &machine, &options, None)
        .unwrap();
    let second = backend
        .compile_module(divide_main(), Some(emulation().into()), &machine, &options, None)
        .unwrap();

    assert_eq!(first.program, second.program);
    assert_eq!(log.count(), 7, "second compilation must hit the cache");
    assert_eq!(backend.cache().stats().hits, 1);
}

#[test]
fn stage_failure_names_the_stage() {
    let dir = tempfile::tempdir().unwrap();
    let (backend, _log) = backend(dir.path());
    let mut module = empty_main();
    module.entry = "start".into();
    let mut data = InterPassData::new();

    let err = backend
        .compile_module(
            module,
            None,
            &MachineDescription::minimal(),
            &CompileOptions::default(),
            Some(&mut data),
        )
        .unwrap_err();
    assert_eq!(err.stage(), Some(internalize::NAME));
    assert!(matches!(
        err,
        CompileError::Stage {
            source: PassError::MissingEntry { .. },
            ..
        }
    ));
    assert!(data.is_empty(), "nothing is recorded for a failed compilation");
}

#[test]
fn unreadable_and_malformed_inputs_differ() {
    let dir = tempfile::tempdir().unwrap();
    let (backend, _log) = backend(dir.path());
    let machine = MachineDescription::minimal();
    let options = CompileOptions::default();

    let missing = dir.path().join("missing.tir.json");
    let err = backend
        .compile_files(&missing, None, &machine, &options, None)
        .unwrap_err();
    assert!(matches!(err, CompileError::Load(LoadError::Unreadable { .. })));

    let garbage = dir.path().join("garbage.tir.json");
    std::fs::write(&garbage, "{ not json").unwrap();
    let err = backend
        .compile_files(&garbage, None, &machine, &options, None)
        .unwrap_err();
    assert!(matches!(err, CompileError::Load(LoadError::Malformed { .. })));
}
