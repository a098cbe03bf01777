use anyhow::{Context, Result};
use clap::Parser;
use ferrovm::{describe_halt, hex_dump, logger, run_program, RunOptions};
use ferrovm_runtime::{StdoutConsole, DEFAULT_BACKING_PATH};
use std::fs;
use std::path::PathBuf;

/// Run a bytecode program against a persistent memory image.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Program binary, loaded at address 0
    program: PathBuf,

    /// Backing file that mirrors the memory image
    #[arg(long, short, default_value = DEFAULT_BACKING_PATH)]
    image: PathBuf,

    /// Write the memory image back to the backing file after the run
    #[arg(long)]
    persist: bool,

    /// Stop after this many instructions
    #[arg(long)]
    max_steps: Option<u64>,

    /// Print the loaded program as hex before running
    #[arg(long)]
    dump: bool,

    /// Trace every executed instruction
    #[arg(long, short)]
    verbose: bool,

    /// Only report errors
    #[arg(long, short)]
    quiet: bool,
}

/// `SetLoggerError` is not a `std::error::Error` without `log/std`, so it
/// is converted by message.
fn install_logger(verbose: bool, quiet: bool) -> Result<()> {
    logger::init(logger::level_for(verbose, quiet))
        .map_err(|err| anyhow::anyhow!("failed to install logger: {err}"))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    install_logger(cli.verbose, cli.quiet)?;

    let program = fs::read(&cli.program)
        .with_context(|| format!("failed to read {}", cli.program.display()))?;

    if cli.dump {
        println!("Loaded program:");
        print!("{}", hex_dump(&program));
    }

    let options = RunOptions {
        image: cli.image,
        persist: cli.persist,
        max_steps: cli.max_steps,
    };

    eprintln!("ferrovm: running {}", cli.program.display());
    let report = run_program(&program, &options, StdoutConsole).context("run failed")?;

    eprintln!(
        "ferrovm: {} after {} instructions ({} bytes loaded)",
        describe_halt(report.halt_reason),
        report.steps,
        report.loaded
    );
    if options.persist {
        eprintln!("ferrovm: wrote {}", options.image.display());
    }
    Ok(())
}
