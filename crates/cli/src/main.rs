//! Cache hierarchy simulator CLI.
//!
//! This binary provides a single entry point for trace-driven runs:
//! 1. **Run:** simulate a trace file (or stdin) through a configured
//!    hierarchy and print a report (`cachesim run ...`, or bare
//!    `cachesim <trace>` as shorthand).
//! 2. **Presets:** list or describe the built-in hardware presets.

mod build_config;
mod cli;
mod flamegraph;
mod report;
mod run;
mod trace_source;

use std::process;

use cachesim_core::presets::{self, PRESET_NAMES};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands, RunArgs};

fn main() {
    match Cli::parse().command {
        Some(Commands::Run(args)) => cmd_run(&args),
        Some(Commands::Presets { name }) => cmd_presets(name.as_deref()),
        None => run_bare_invocation(),
    }
}

/// No subcommand word was given: treat the whole invocation as if `run` had
/// been typed first, so `cachesim trace.txt --json` works without the
/// explicit subcommand.
fn run_bare_invocation() {
    let argv = std::env::args().skip(1);
    let reparsed = Cli::try_parse_from(std::iter::once("cachesim".to_string()).chain(std::iter::once("run".to_string())).chain(argv));
    match reparsed {
        Ok(Cli {
            command: Some(Commands::Run(args)),
            ..
        }) => cmd_run(&args),
        _ => {
            eprintln!("cachesim — pass a subcommand or a trace file");
            eprintln!();
            eprintln!("  cachesim <trace>                 Simulate a trace file");
            eprintln!("  cachesim run <trace> --json      Simulate, print JSON");
            eprintln!("  cachesim run --cores 4 < trace   Multi-core run from stdin");
            eprintln!("  cachesim presets                 List built-in hardware presets");
            eprintln!();
            eprintln!("  cachesim --help  for full options");
            process::exit(1);
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn cmd_run(args: &RunArgs) {
    init_tracing(args.verbose);

    let config = match build_config::resolve(args) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("cachesim: invalid configuration: {err}");
            process::exit(2);
        }
    };

    let result = if config.num_cores > 1 {
        run::run_multi_core(&config, args.trace.as_deref(), args)
    } else {
        run::run_single_core(&config, args.trace.as_deref(), args)
    };

    let result = match result {
        Ok(result) => result,
        Err(run::RunError::Config(err)) => {
            eprintln!("cachesim: invalid configuration: {err}");
            process::exit(2);
        }
        Err(run::RunError::Io(err)) => {
            eprintln!("cachesim: {err}");
            process::exit(1);
        }
    };

    if let Some(path) = &args.flamegraph {
        if let Err(err) = flamegraph::write_folded(path, &result.hot_lines) {
            eprintln!("cachesim: failed to write flamegraph profile: {err}");
            process::exit(1);
        }
    }

    if args.json {
        match serde_json::to_string_pretty(&result) {
            Ok(json) => println!("{json}"),
            Err(err) => {
                eprintln!("cachesim: failed to serialize result: {err}");
                process::exit(1);
            }
        }
    } else {
        report::print(&result);
    }
}

fn cmd_presets(name: Option<&str>) {
    match name {
        None => {
            println!("Built-in hardware presets:");
            for name in PRESET_NAMES {
                println!("  {name}");
            }
        }
        Some(name) => match presets::by_name(name) {
            Ok(config) => match serde_json::to_string_pretty(&config) {
                Ok(json) => println!("{json}"),
                Err(err) => {
                    eprintln!("cachesim: failed to serialize preset: {err}");
                    process::exit(1);
                }
            },
            Err(err) => {
                eprintln!("cachesim: {err}");
                process::exit(2);
            }
        },
    }
}
