//! `stepvm`: the command-line driver for the fraud-proof MIPS32 emulator.

mod subcommands;

use anyhow::{anyhow, Result};
use clap::{ArgAction, Parser, Subcommand};
use subcommands::{load_elf::LoadElfArgs, run::RunArgs, Dispatch};
use tracing::Level;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Verbosity level (0-4)
    #[arg(long, short, action = ArgAction::Count, default_value = "2")]
    v: u8,

    #[command(subcommand)]
    subcommand: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Run(RunArgs),
    LoadElf(LoadElfArgs),
}

fn main() -> Result<()> {
    let Args { v, subcommand } = Args::parse();
    init_tracing_subscriber(v)?;

    match subcommand {
        Command::Run(args) => args.dispatch(),
        Command::LoadElf(args) => args.dispatch(),
    }
}

/// Initializes the tracing subscriber.
///
/// # Arguments
/// * `verbosity_level` - The verbosity level (0-4)
fn init_tracing_subscriber(verbosity_level: u8) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(match verbosity_level {
            0 => Level::ERROR,
            1 => Level::WARN,
            2 => Level::INFO,
            3 => Level::DEBUG,
            _ => Level::TRACE,
        })
        .finish();
    tracing::subscriber::set_global_default(subscriber).map_err(|e| anyhow!(e))
}
