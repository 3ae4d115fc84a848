mod cli;
mod commands;
mod driver_shell;
mod output;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Commands};
use commands::{CommandOutput, Context};
use output::{completion_code, error_object, Envelope, EventSink, FATAL_CODE};
use std::io;
use std::path::PathBuf;

fn main() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    if let Commands::Completions { shell } = cli.command {
        generate(shell, &mut Cli::command(), "forja", &mut io::stdout());
        return;
    }

    std::process::exit(run(cli));
}

fn run(cli: Cli) -> i32 {
    let command = command_name(&cli.command);
    let host = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok());
    let run_id = state::new_run_id(chrono::Utc::now(), host.as_deref());

    match dispatch(&cli, &run_id) {
        Ok(out) => {
            if cli.json {
                Envelope::ok(command, &run_id, out.success, out.data).print();
            }
            completion_code(out.success)
        }
        Err(err) => {
            let error = error_object(&err);
            if cli.json {
                Envelope::fatal(command, &run_id, error).print();
            } else {
                log::error!("{err:#}");
            }
            FATAL_CODE
        }
    }
}

fn dispatch(cli: &Cli, run_id: &str) -> Result<CommandOutput> {
    let mut ctx = Context {
        quiet: cli.quiet || cli.json,
        run_id: run_id.to_string(),
        store: state::StateStore::new(state_dir(cli.state_dir.clone())),
        registry: driver_shell::default_registry(),
        events: EventSink::open(cli.events.as_deref())?,
    };

    match &cli.command {
        Commands::Plan(args) => commands::plan::run(&mut ctx, args),
        Commands::Apply(args) => commands::apply::run(&mut ctx, args),
        Commands::Verify(args) => commands::verify::run(&mut ctx, args),
        Commands::Drift(args) => commands::drift::run(&mut ctx, args),
        Commands::Restore(args) => commands::restore::run(&mut ctx, args),
        Commands::Revert(args) => commands::revert::run(&mut ctx, args),
        Commands::Completions { .. } => unreachable!("handled before dispatch"),
    }
}

const fn command_name(command: &Commands) -> &'static str {
    match command {
        Commands::Plan(_) => "plan",
        Commands::Apply(_) => "apply",
        Commands::Verify(_) => "verify",
        Commands::Drift(_) => "drift",
        Commands::Restore(_) => "restore",
        Commands::Revert(_) => "revert",
        Commands::Completions { .. } => "completions",
    }
}

/// State directory: explicit flag, else the platform data dir
fn state_dir(flag: Option<PathBuf>) -> PathBuf {
    flag.unwrap_or_else(|| {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("forja")
    })
}
