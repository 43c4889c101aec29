//! ttacc: compile IR programs for user-described TTA processors.

mod commands;
mod config;

use std::path::PathBuf;
use std::process;

use clap::{ArgAction, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "ttacc", version, about = "Retargetable TTA compiler backend")]
struct Cli {
    /// Configuration file (default: nearest ttacc.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a program for a machine
    Compile {
        /// Input program (.tir.json)
        program: PathBuf,
        /// Machine description (.machine.toml)
        #[arg(long, short = 'a')]
        machine: PathBuf,
        /// Emulation library linked on demand
        #[arg(long, short = 'e')]
        emulation: Option<PathBuf>,
        /// Optimization level
        #[arg(short = 'O', default_value_t = 2)]
        opt_level: u32,
        /// Output file for the compiled program (JSON); prints a listing if omitted
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
        /// Dump machine functions between stages
        #[arg(long)]
        debug: bool,
        /// Print the compilation report
        #[arg(long)]
        report: bool,
        /// Derive the plugin in-process instead of building a native one
        #[arg(long)]
        no_plugin_build: bool,
        /// Write inter-pass data (JSON) to this file
        #[arg(long)]
        inter_pass: Option<PathBuf>,
    },
    /// Compile a program and run the external scheduler on it
    Schedule {
        /// Input program (.tir.json)
        program: PathBuf,
        /// Machine description (.machine.toml)
        #[arg(long, short = 'a')]
        machine: PathBuf,
        /// Emulation library linked on demand
        #[arg(long, short = 'e')]
        emulation: Option<PathBuf>,
        /// Optimization level
        #[arg(short = 'O', default_value_t = 2)]
        opt_level: u32,
        /// Scheduler debug level (>3 echoes scheduler output)
        #[arg(long, default_value_t = 0)]
        debug_level: u32,
        /// Scheduling plan (default: configured default plan)
        #[arg(long, short = 'p')]
        plan: Option<PathBuf>,
        /// Output file for the scheduled program (JSON)
        #[arg(long, short = 'o')]
        output: PathBuf,
    },
    /// Print the plugin fingerprint of a machine
    Fingerprint {
        /// Machine description (.machine.toml)
        machine: PathBuf,
    },
    /// Check a machine description
    Validate {
        /// Machine description (.machine.toml)
        machine: PathBuf,
        /// Run every check, not only the ones compilation requires
        #[arg(long)]
        all: bool,
    },
    /// Inspect or clear the plugin cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
    /// Check toolchain and configuration status
    Doctor,
}

#[derive(Subcommand)]
enum CacheAction {
    /// List cached plugins
    List,
    /// Remove every cached plugin
    Clear,
    /// Print the cache directory
    Path,
}

fn main() {
    let cli = Cli::parse();

    let result = run(cli);
    if let Err(e) = result {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

fn log_level(verbose: u8) -> tracing::Level {
    match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    // A subscriber may already be installed when embedded; that is fine.
    let _ = tta_compile::init_subscriber(log_level(cli.verbose));

    let cwd = std::env::current_dir()?;
    let (config, config_path) = config::load_config(cli.config.as_deref(), &cwd)?;

    match cli.command {
        Commands::Compile {
            program,
            machine,
            emulation,
            opt_level,
            output,
            debug,
            report,
            no_plugin_build,
            inter_pass,
        } => commands::compile::run(
            config,
            &commands::compile::CompileRequest {
                program: &program,
                machine: &machine,
                emulation: emulation.as_deref(),
                opt_level,
                debug,
                output: output.as_deref(),
                report,
                no_plugin_build,
                inter_pass: inter_pass.as_deref(),
            },
        ),

        Commands::Schedule {
            program,
            machine,
            emulation,
            opt_level,
            debug_level,
            plan,
            output,
        } => commands::schedule::run(
            config,
            &program,
            &machine,
            emulation.as_deref(),
            opt_level,
            debug_level,
            plan.as_deref(),
            &output,
        ),

        Commands::Fingerprint { machine } => commands::fingerprint::run(&config, &machine),

        Commands::Validate { machine, all } => commands::validate::run(&machine, all),

        Commands::Cache { action } => match action {
            CacheAction::List => commands::cache::list(config),
            CacheAction::Clear => commands::cache::clear(config),
            CacheAction::Path => {
                println!("{}", config.cache_dir.display());
                Ok(())
            }
        },

        Commands::Doctor => commands::doctor::run(&config, config_path.as_deref()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_compile_flags() {
        let cli = Cli::try_parse_from([
            "ttacc", "-vv", "compile", "prog.tir.json", "-a", "m.machine.toml", "-O", "3",
            "--no-plugin-build",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Compile {
                opt_level,
                no_plugin_build,
                ..
            } => {
                assert_eq!(opt_level, 3);
                assert!(no_plugin_build);
            }
            _ => panic!("expected compile"),
        }
    }

    #[test]
    fn verbosity_levels() {
        assert_eq!(log_level(0), tracing::Level::WARN);
        assert_eq!(log_level(5), tracing::Level::TRACE);
    }
}
