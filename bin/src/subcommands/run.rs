//! The `run` subcommand (spec.md §6.4): drives a state through the emulator to completion.

use super::Dispatch;
use anyhow::Result;
use clap::Args;
use stepvm_runner::KernelBuilder;

/// Command line arguments for `stepvm run`.
#[derive(Args, Debug)]
#[command(author, version, about)]
pub(crate) struct RunArgs {
    /// The path to the input JSON state.
    #[arg(long)]
    input: String,

    /// The path to the output JSON state.
    #[arg(long)]
    output: Option<String>,

    /// The step pattern to generate proofs at.
    #[arg(long = "proof-at")]
    proof_at: Option<String>,

    /// Format for proof data output file names (`%d` substitutes the step number). Proofs are
    /// written to stdout if this is not specified.
    #[arg(long = "proof-fmt")]
    proof_fmt: Option<String>,

    /// The step pattern to generate state snapshots at.
    #[arg(long = "snapshot-at")]
    snapshot_at: Option<String>,

    /// Format for snapshot output file names (`%d` substitutes the step number).
    #[arg(long = "snapshot-fmt")]
    snapshot_fmt: Option<String>,

    /// The step pattern to stop running at.
    #[arg(long = "stop-at")]
    stop_at: Option<String>,

    /// The step pattern to print diagnostic information at.
    #[arg(long = "info-at")]
    info_at: Option<String>,

    /// The step pattern to print disassembly at.
    #[arg(long = "opc-at")]
    opc_at: Option<String>,

    /// Path to a JSON symbol table used to resolve PCs in `--info-at` logging and the sleep guard.
    #[arg(long)]
    meta: Option<String>,

    /// A symbol name; if the PC resolves to it, the run is treated as stuck in an idle loop and
    /// aborted rather than spun forever.
    #[arg(long = "sleep-symbol")]
    sleep_symbol: Option<String>,

    /// Write a CPU profile to this path. Accepted for compatibility; currently a no-op (see
    /// DESIGN.md's Open Questions).
    #[arg(long = "pprof.cpu")]
    pprof_cpu: Option<String>,

    /// The pre-image oracle sub-process and its arguments, after `--`. If omitted, no oracle is
    /// launched.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    server_cmd: Vec<String>,
}

impl Dispatch for RunArgs {
    fn dispatch(self) -> Result<()> {
        if self.pprof_cpu.is_some() {
            tracing::warn!(target: "stepvm-cli::run", "--pprof.cpu is accepted but not implemented");
        }

        let mut kernel = KernelBuilder::default()
            .with_input(self.input)
            .with_output(self.output)
            .with_proof_at(self.proof_at)
            .with_proof_format(self.proof_fmt)
            .with_snapshot_at(self.snapshot_at)
            .with_snapshot_format(self.snapshot_fmt)
            .with_stop_at(self.stop_at)
            .with_info_at(self.info_at)
            .with_opc_at(self.opc_at)
            .with_meta(self.meta)
            .with_sleep_symbol(self.sleep_symbol)
            .with_preimage_server(self.server_cmd)
            .build()?;

        kernel.run()
    }
}
