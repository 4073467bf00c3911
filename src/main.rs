//! scriptrt - CLI

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::rc::Rc;

use scriptrt::runtime::program::parse_program;
use scriptrt::util::logger::{self, LogLevel};
use scriptrt::{
    run_executor_to_completion, run_files, HostOptions, ManualClock, ProgramStore, RuntimeConfig,
    ScriptDescriptor, ScriptEnv, Value, NAME, VERSION,
};

/// Cooperative runtime for small assembly scripts
#[derive(Parser, Debug)]
#[command(name = "scriptrt")]
#[command(version = VERSION)]
#[command(about = NAME, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (defaults to ~/.config/scriptrt/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Schedule scripts and tick until they are done
    Run {
        /// Script files to start
        #[arg(value_name = "FILES", required = true)]
        files: Vec<PathBuf>,

        /// Stop after this many ticks
        #[arg(long)]
        max_ticks: Option<u64>,

        /// Simulate the clock instead of sleeping
        #[arg(long)]
        manual_clock: bool,

        /// Print every task when the run ends
        #[arg(long)]
        list: bool,

        /// Print the listing as JSON
        #[arg(long, requires = "list")]
        json: bool,
    },

    /// Run one script to completion and print its result
    Call {
        /// Script file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Arguments; integers are passed as Int, anything else as String
        #[arg(value_name = "ARGS")]
        args: Vec<String>,
    },

    /// Check a script file for load errors
    Check {
        /// Script file
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

fn parse_arg(text: &str) -> Value {
    match text.parse::<i64>() {
        Ok(n) => Value::Int(n),
        Err(_) => Value::str(text),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = RuntimeConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    let level = if args.verbose {
        LogLevel::Debug
    } else {
        config.log.level.parse().unwrap_or(LogLevel::Info)
    };
    logger::init_with_level(level);

    match args.command {
        Commands::Run {
            files,
            max_ticks,
            manual_clock,
            list,
            json,
        } => {
            let options = HostOptions {
                config,
                max_ticks,
                manual_clock,
            };
            let summary = run_files(&files, &options)?;
            if list {
                if json {
                    let out = serde_json::to_string_pretty(&summary.tasks)
                        .context("Failed to serialize listing")?;
                    println!("{}", out);
                } else {
                    for task in &summary.tasks {
                        println!("{:>5} {:?} {}", task.pid.inner(), task.status, task);
                    }
                }
            }
            if args.verbose {
                eprintln!("{} ticks, {:?}", summary.ticks, summary.stats);
            }
        }
        Commands::Call { file, args: script_args } => {
            let clock = Rc::new(ManualClock::new());
            let mut env = ScriptEnv::new(ProgramStore::new(), config, clock);
            let value = run_executor_to_completion(
                &mut env,
                &ScriptDescriptor::exact(&file),
                script_args.iter().map(|a| parse_arg(a)),
            );
            println!("{}", value);
            if value.is_error() {
                std::process::exit(1);
            }
        }
        Commands::Check { file } => {
            let source = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read file: {}", file.display()))?;
            let program = parse_program(&file.display().to_string(), &source)
                .with_context(|| format!("Failed to check: {}", file.display()))?;
            eprintln!("Check passed! {} instructions", program.len());
        }
    }

    Ok(())
}
