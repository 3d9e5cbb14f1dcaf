//! The run loop (spec.md §4.8): drives one [InstrumentedState] to completion, emitting proofs,
//! snapshots, and diagnostic logging along the way.

use crate::{
    matcher::StepPattern, metadata::Metadata, proc_oracle::ProcessPreimageOracle,
    types::ChildWithFds, types::Proof,
};
use anyhow::{Context, Result};
use std::{
    io::Write,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Instant,
};
use stepvm_core::{disassemble, Address, InstrumentedState, StateWitnessHasher, StepWitness};

/// Every `CANCEL_CHECK_INTERVAL` steps, the loop polls the cancellation flag (spec.md §5: coarse
/// to avoid atomic cost per instruction).
const CANCEL_CHECK_INTERVAL: u64 = 100;

/// A process-level cancellation signal, polled every [CANCEL_CHECK_INTERVAL] steps.
pub type Cancellation = Arc<AtomicBool>;

/// Owns the [InstrumentedState], the optional oracle sub-process, and every run-loop matcher
/// configured for this invocation.
pub struct Kernel<O: Write, E: Write> {
    pub(crate) instrumented: InstrumentedState<O, E, ProcessPreimageOracle>,
    pub(crate) server_proc: Option<ChildWithFds>,
    pub(crate) output: Option<String>,
    pub(crate) proof_at: StepPattern,
    pub(crate) proof_format: Option<String>,
    pub(crate) snapshot_at: StepPattern,
    pub(crate) snapshot_format: Option<String>,
    pub(crate) stop_at: StepPattern,
    pub(crate) info_at: StepPattern,
    pub(crate) opc_at: StepPattern,
    pub(crate) metadata: Metadata,
    pub(crate) sleep_symbol: Option<String>,
    pub(crate) cancel: Option<Cancellation>,
}

impl<O: Write, E: Write> Kernel<O, E> {
    /// Drive the guest to completion (or until `stopAt`/cancellation/error) following spec.md
    /// §4.8's fixed algorithm. The oracle sub-process, if any, is always interrupted and reaped
    /// before returning — on every exit path, success or error (spec.md §5).
    pub fn run(&mut self) -> Result<()> {
        let result = self.run_inner();

        if let Some(mut child_fds) = self.server_proc.take() {
            let shutdown_result = self
                .instrumented
                .preimage_oracle_mut()
                .shutdown(&mut child_fds.inner);
            if result.is_ok() {
                return shutdown_result;
            }
        }

        result
    }

    fn run_inner(&mut self) -> Result<()> {
        let start = Instant::now();

        while !self.instrumented.state().exited {
            let step = self.instrumented.state().step;
            let pc = self.instrumented.state().pc;

            if step % CANCEL_CHECK_INTERVAL == 0 {
                if let Some(cancel) = &self.cancel {
                    if cancel.load(Ordering::Relaxed) {
                        anyhow::bail!("run cancelled at step {step}");
                    }
                }
            }

            if self.opc_at.matches(step) {
                let inst = self.instrumented.state().memory.read32(pc as Address)?;
                println!("{}", disassemble(self.instrumented.state(), inst));
            }

            if self.info_at.matches(step) {
                let elapsed = start.elapsed().as_secs_f64();
                let ips = if elapsed > 0.0 { step as f64 / elapsed } else { 0.0 };
                let inst = self.instrumented.state().memory.read32(pc as Address)?;
                let symbol = self.metadata.resolve(pc).unwrap_or("?");
                crate::info!(
                    "step={step} pc=0x{pc:08x} inst=0x{inst:08x} ips={ips:.1} pages={} mem={} sym={symbol}",
                    self.instrumented.state().memory.page_count(),
                    self.instrumented.state().memory.usage(),
                );
            }

            if let Some(sleep_symbol) = &self.sleep_symbol {
                if self.metadata.resolve(pc) == Some(sleep_symbol.as_str()) {
                    anyhow::bail!(
                        "stuck in sleep at step {step} (pc 0x{pc:08x}, symbol {sleep_symbol})"
                    );
                }
            }

            if self.snapshot_at.matches(step) {
                self.write_snapshot(step)?;
            }

            self.run_one_step(step, pc)?;

            // stopAt is checked against the step just completed, not the one about to run: a
            // pattern matching step 0 (e.g. `%1`) must not prevent the first step from executing
            // at all (spec.md §8 scenario 1).
            if self.stop_at.matches(self.instrumented.state().step) {
                break;
            }
        }

        if let Some(output) = &self.output {
            let bytes = serde_json::to_vec(self.instrumented.state())?;
            std::fs::write(output, crate::compressor::compress_bytes(&bytes)?)?;
        }

        Ok(())
    }

    fn run_one_step(&mut self, step: u64, pc: u32) -> Result<()> {
        let want_proof = self.proof_at.matches(step);

        let step_result = self.instrumented.step(want_proof);
        let witness = self
            .guard_step(step_result)
            .with_context(|| format!("failed at step {step} (PC: 0x{pc:08x})"))?;

        if want_proof {
            let witness = witness.expect("proof was requested");
            self.write_proof(step, witness)?;
        }

        Ok(())
    }

    /// Annotate a step error with the oracle server's exit status if it has already exited,
    /// distinguishing guest errors from oracle crashes (spec.md §4.5). This is the only place
    /// that performs this check: [ProcessPreimageOracle] never sees the `Child` handle (it lives
    /// here, in `server_proc`), so it cannot observe a mid-run exit on its own.
    fn guard_step(&mut self, result: Result<Option<StepWitness>>) -> Result<Option<StepWitness>> {
        result.map_err(|err| {
            let exit_status = self
                .server_proc
                .as_mut()
                .and_then(|c| c.inner.try_wait().ok().flatten());
            match exit_status {
                Some(status) => {
                    err.context(format!("pre-image server exited with code {}", status.code().unwrap_or(-1)))
                }
                None => err,
            }
        })
    }

    fn write_proof(&mut self, step: u64, witness: StepWitness) -> Result<()> {
        let pre = witness.state.state_hash();
        let post = self.instrumented.state_hash()?;

        let proof = Proof {
            step,
            pre: *pre,
            post: *post,
            step_input: witness.encode_step_input(),
            oracle_input: witness.encode_preimage_oracle_input(),
        };

        match &self.proof_format {
            Some(fmt) => std::fs::write(format_step_path(fmt, step), serde_json::to_vec(&proof)?)?,
            None => println!("{}", serde_json::to_string(&proof)?),
        }

        Ok(())
    }

    fn write_snapshot(&mut self, step: u64) -> Result<()> {
        let Some(fmt) = &self.snapshot_format else {
            return Ok(());
        };
        let bytes = serde_json::to_vec(self.instrumented.state())?;
        std::fs::write(
            format_step_path(fmt, step),
            crate::compressor::compress_bytes(&bytes)?,
        )
        .with_context(|| format!("writing snapshot at step {step}"))
    }
}

/// Substitute the literal token `%d` in `fmt` with `step`.
fn format_step_path(fmt: &str, step: u64) -> String {
    fmt.replace("%d", &step.to_string())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn format_step_path_substitutes_step_number() {
        assert_eq!(format_step_path("proof-%d.json", 42), "proof-42.json");
    }

    #[test]
    fn format_step_path_is_unchanged_without_the_token() {
        assert_eq!(format_step_path("proof.json", 42), "proof.json");
    }
}
