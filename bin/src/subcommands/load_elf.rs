//! The `load-elf` subcommand (spec.md §6.4): builds an initial [State] from a MIPS32 ELF binary.

use super::Dispatch;
use alloy_primitives::B256;
use anyhow::Result;
use clap::Args;
use elf::{endian::AnyEndian, ElfBytes};
use std::{fmt::Display, fs, path::PathBuf, str::FromStr};
use stepvm_core::{load_elf, patch_go, patch_stack, StateWitnessHasher};
use stepvm_runner::compress_bytes;

/// Command line arguments for `stepvm load-elf`.
#[derive(Args, Debug)]
#[command(author, version, about)]
pub(crate) struct LoadElfArgs {
    /// The path to the input 32-bit big-endian MIPS ELF file.
    #[arg(long)]
    path: PathBuf,

    /// The type of patch to perform on the ELF file.
    #[arg(long, default_values = ["go", "stack"])]
    patch_kind: Vec<PatchKind>,

    /// The output path to write the JSON state to. State is dumped to stdout if set to `-`. Not
    /// written if not provided.
    #[arg(long)]
    output: Option<String>,
}

#[derive(Clone, Debug)]
enum PatchKind {
    Go,
    Stack,
}

impl FromStr for PatchKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "go" => Ok(PatchKind::Go),
            "stack" => Ok(PatchKind::Stack),
            _ => Err(anyhow::anyhow!("invalid patch kind: {s}")),
        }
    }
}

impl Display for PatchKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PatchKind::Go => write!(f, "Go"),
            PatchKind::Stack => write!(f, "Stack"),
        }
    }
}

impl Dispatch for LoadElfArgs {
    fn dispatch(self) -> Result<()> {
        tracing::info!(target: "stepvm-cli::load-elf", "loading ELF file @ {}", self.path.display());
        let elf_raw = fs::read(&self.path)?;
        let mut state = load_elf(&elf_raw)?;
        tracing::info!(target: "stepvm-cli::load-elf", "loaded ELF file and constructed the state");

        let elf = ElfBytes::<AnyEndian>::minimal_parse(&elf_raw)?;
        for p in self.patch_kind {
            tracing::info!(target: "stepvm-cli::load-elf", "patching with patch kind = {p}...");
            match p {
                PatchKind::Go => patch_go(&elf, &mut state),
                PatchKind::Stack => patch_stack(&mut state),
            }?;
        }

        if let Some(ref path_str) = self.output {
            if path_str == "-" {
                println!("{}", serde_json::to_string(&state)?);
            } else {
                fs::write(path_str, compress_bytes(&serde_json::to_vec(&state)?)?)?;
            }
        }

        tracing::info!(
            target: "stepvm-cli::load-elf",
            "patched the ELF file and dumped the state successfully. state hash: {} mem size: {} pages: {}",
            B256::from(state.encode_witness()?.state_hash()),
            state.memory.usage(),
            state.memory.page_count(),
        );

        Ok(())
    }
}
