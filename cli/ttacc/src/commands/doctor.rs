//! `ttacc doctor` — toolchain diagnostics.

use std::path::Path;
use std::process::Command;

use anyhow::Result;
use tta_backend::{BackendConfig, PluginCache};

/// Print toolchain diagnostic information.
pub fn run(config: &BackendConfig, config_path: Option<&Path>) -> Result<()> {
    println!("=== ttacc Doctor ===");
    println!();

    println!("ttacc version: {}", env!("CARGO_PKG_VERSION"));
    println!("Toolchain version: {}", config.toolchain_version);
    println!();

    println!("--- Configuration ---");
    match config_path {
        Some(path) => println!("  Config file: {}", path.display()),
        None => println!("  Config file: not found (using defaults)"),
    }
    println!("  Toolchain mode: {:?}", config.toolchain_mode);
    println!(
        "  Cache: {} ({})",
        config.cache_dir.display(),
        if config.cache_enabled { "enabled" } else { "disabled" }
    );
    match &config.default_scheduler_plan {
        Some(plan) => println!(
            "  Default scheduling plan: {} ({})",
            plan.display(),
            if plan.is_file() { "found" } else { "missing" }
        ),
        None => println!("  Default scheduling plan: none"),
    }
    println!();

    println!("--- Tools ---");
    print_tool_status("Table generator", &config.table_generator(), &["--version"]);
    print_tool_status("Native compiler", &config.toolchain.native_compiler, &["--version"]);
    print_tool_status("Scheduler", &config.toolchain.scheduler, &["--version"]);
    println!();

    println!("--- Plugin Sources ---");
    for source in config.plugin_sources() {
        let state = if source.is_file() { "ok" } else { "missing" };
        println!("  {}: {state}", source.display());
    }
    println!();

    println!("--- Cache ---");
    match PluginCache::new(config.clone()).list_entries() {
        Ok(entries) => {
            let bytes: u64 = entries.iter().map(|e| e.size_bytes).sum();
            println!("  {} plugin(s), {bytes} bytes", entries.len());
        }
        Err(e) => println!("  error: {e}"),
    }

    Ok(())
}

fn print_tool_status(label: &str, program: &Path, args: &[&str]) {
    match Command::new(program).args(args).output() {
        Ok(output) => {
            let version = String::from_utf8_lossy(&output.stdout);
            let first_line = version.lines().next().unwrap_or("(unknown version)");
            println!("  {label} ({}): {first_line}", program.display());
        }
        Err(_) => {
            println!("  {label} ({}): not found", program.display());
        }
    }
}
