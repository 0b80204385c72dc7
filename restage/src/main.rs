//! Fixpoint text-transformation stage runner CLI.
//!
//! Reads all of stdin, applies a regex substitution stage to it, and writes
//! results to stdout. Looping and emission behavior come from an optional
//! `stage.toml` plus command-line flags (flags win).

use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use restage::config::{StageConfig, load_config, write_config};
use restage::exit_codes;
use restage::logging;
use restage::sink::stdout_sink;
use restage::stage::{IterationLimitExceeded, StageRunner};
use restage::transform::RegexTransform;

#[derive(Parser)]
#[command(
    name = "restage",
    version,
    about = "Fixpoint text-transformation stage runner"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Apply a regex substitution stage to stdin, writing to stdout.
    Run(RunArgs),
    /// Check a stage config file for validity.
    Validate {
        /// Path to the stage config.
        #[arg(long, default_value = "stage.toml")]
        config: PathBuf,
    },
    /// Create a default `stage.toml`.
    Init {
        /// Path to write.
        #[arg(long, default_value = "stage.toml")]
        config: PathBuf,
        /// Overwrite an existing file.
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Regex pattern whose matches are replaced on every application.
    pattern: String,

    /// Replacement text (`$1` / `${name}` capture references supported).
    #[arg(default_value = "")]
    replacement: String,

    /// Load stage options from this TOML file (flags below override it).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Repeat the substitution until the output stops changing.
    #[arg(long = "loop")]
    loop_until_fixpoint: bool,

    /// Suppress per-iteration output while looping.
    #[arg(long)]
    iteration_silent: bool,

    /// Omit the trailing newline on per-iteration output.
    #[arg(long)]
    no_iteration_newline: bool,

    /// Print the final result. Off unless given: the stage's historical
    /// default is to stay silent about the final result.
    #[arg(long, conflicts_with = "silent")]
    print: bool,

    /// Explicitly suppress the final result.
    #[arg(long)]
    silent: bool,

    /// Omit the trailing newline on the final result.
    #[arg(long)]
    no_trailing_newline: bool,

    /// Fail once this many loop iterations have run without a fixpoint.
    #[arg(long)]
    max_iterations: Option<u64>,

    /// Write a JSON run report to stderr.
    #[arg(long)]
    report: bool,
}

/// Machine-readable summary of a `run` invocation (one line of JSON).
#[derive(Debug, Serialize)]
struct RunReport {
    looping: bool,
    applications: u32,
    bytes_out: usize,
}

fn main() {
    logging::init();
    if let Err(err) = run() {
        eprintln!("{:#}", err);
        if err.downcast_ref::<IterationLimitExceeded>().is_some() {
            std::process::exit(exit_codes::LIMIT);
        }
        std::process::exit(exit_codes::INVALID);
    }
    std::process::exit(exit_codes::OK);
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Run(args) => cmd_run(&args),
        Command::Validate { config } => cmd_validate(&config),
        Command::Init { config, force } => cmd_init(&config, force),
    }
}

fn cmd_run(args: &RunArgs) -> Result<()> {
    let cfg = effective_config(args)?;
    let transform = RegexTransform::new(&args.pattern, &args.replacement)?;

    let mut input = String::new();
    io::stdin()
        .read_to_string(&mut input)
        .context("read stdin")?;

    let runner = StageRunner::new(cfg, transform);
    let mut sink = stdout_sink();
    let outcome = runner.run(&input, &mut sink)?;

    if args.report {
        let report = RunReport {
            looping: runner.config().loop_until_fixpoint,
            applications: outcome.applications,
            bytes_out: outcome.output.len(),
        };
        eprintln!(
            "{}",
            serde_json::to_string(&report).context("serialize run report")?
        );
    }
    Ok(())
}

fn cmd_validate(path: &Path) -> Result<()> {
    load_config(path).with_context(|| format!("validate {}", path.display()))?;
    Ok(())
}

fn cmd_init(path: &Path, force: bool) -> Result<()> {
    if !force && path.exists() {
        return Ok(());
    }
    write_config(path, &StageConfig::default())
}

/// Config file values with command-line flags layered on top.
///
/// Boolean flags only override when given; `--print` / `--silent` map onto
/// the tri-state `silent` field and leave it untouched when neither is given.
fn effective_config(args: &RunArgs) -> Result<StageConfig> {
    let mut cfg = match &args.config {
        Some(path) => load_config(path)?,
        None => StageConfig::default(),
    };
    if args.loop_until_fixpoint {
        cfg.loop_until_fixpoint = true;
    }
    if args.iteration_silent {
        cfg.iteration_silent = true;
    }
    if args.no_iteration_newline {
        cfg.iteration_trailing_newline = false;
    }
    if args.print {
        cfg.silent = Some(false);
    }
    if args.silent {
        cfg.silent = Some(true);
    }
    if args.no_trailing_newline {
        cfg.trailing_newline = false;
    }
    if args.max_iterations.is_some() {
        cfg.max_iterations = args.max_iterations;
    }
    cfg.validate()?;
    Ok(cfg)
}
