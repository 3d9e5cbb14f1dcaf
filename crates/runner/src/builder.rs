//! Assembles a [Kernel] from CLI-shaped configuration (spec.md §6.4), surfacing malformed step
//! patterns or preimage server commands as configuration errors before the run loop starts
//! (spec.md §7).

use crate::{
    compressor, kernel::Kernel, matcher::StepPattern, metadata::Metadata,
    proc_oracle::ProcessPreimageOracle, types::ChildWithFds,
};
use anyhow::{anyhow, Result};
use std::{
    fs,
    io::{self, Stderr, Stdout},
    path::PathBuf,
};
use stepvm_core::{InstrumentedState, State};
use stepvm_preimage::create_bidirectional_channel;

/// Builds a [Kernel] wired to read/write real files and drive a real oracle sub-process.
#[derive(Default, Debug)]
pub struct KernelBuilder {
    preimage_server: Vec<String>,
    input: String,
    output: Option<String>,
    proof_at: Option<String>,
    proof_format: Option<String>,
    snapshot_at: Option<String>,
    snapshot_format: Option<String>,
    stop_at: Option<String>,
    info_at: Option<String>,
    opc_at: Option<String>,
    meta: Option<String>,
    sleep_symbol: Option<String>,
}

impl KernelBuilder {
    /// Parse every configured step pattern, load the input state, spin up the oracle
    /// sub-process (or its stub), and assemble the [Kernel]. Any malformed pattern or missing
    /// file is surfaced here, before the run loop starts.
    pub fn build(self) -> Result<Kernel<Stdout, Stderr>> {
        let raw_state = fs::read(&self.input)?;
        let state: State = serde_json::from_slice(&compressor::decompress_bytes(&raw_state)?)?;

        let metadata = match &self.meta {
            Some(path) => serde_json::from_slice(&fs::read(path)?)?,
            None => Metadata::default(),
        };

        let (hint_client_io, hint_server_io) = create_bidirectional_channel()?;
        let (preimage_client_io, preimage_server_io) = create_bidirectional_channel()?;
        let mut server_io = [hint_server_io, preimage_server_io];

        let (oracle, server_proc) = ProcessPreimageOracle::start(
            self.preimage_server.first().map(PathBuf::from).unwrap_or_default(),
            self.preimage_server.get(1..).unwrap_or_default(),
            (hint_client_io, preimage_client_io),
            &mut server_io,
        )?;

        let server_proc = server_proc.map(|p| ChildWithFds { inner: p, fds: server_io });

        let instrumented = InstrumentedState::new(state, oracle, io::stdout(), io::stderr());

        Ok(Kernel {
            instrumented,
            server_proc,
            output: self.output,
            proof_at: parse_pattern(self.proof_at.as_deref())?,
            proof_format: self.proof_format,
            snapshot_at: parse_pattern(self.snapshot_at.as_deref())?,
            snapshot_format: self.snapshot_format,
            stop_at: parse_pattern(self.stop_at.as_deref())?,
            info_at: parse_pattern(self.info_at.as_deref())?,
            opc_at: parse_pattern(self.opc_at.as_deref())?,
            metadata,
            sleep_symbol: self.sleep_symbol,
            cancel: None,
        })
    }

    /// The oracle sub-process argv: `preimage_server[0]` is the executable, the rest are its
    /// arguments. Empty means no oracle is launched (spec.md §4.5's stub).
    pub fn with_preimage_server(mut self, preimage_server: Vec<String>) -> Self {
        self.preimage_server = preimage_server;
        self
    }

    pub fn with_input(mut self, input: String) -> Self {
        self.input = input;
        self
    }

    pub fn with_output(mut self, output: Option<String>) -> Self {
        self.output = output;
        self
    }

    pub fn with_proof_at(mut self, proof_at: Option<String>) -> Self {
        self.proof_at = proof_at;
        self
    }

    pub fn with_proof_format(mut self, proof_format: Option<String>) -> Self {
        self.proof_format = proof_format;
        self
    }

    pub fn with_snapshot_at(mut self, snapshot_at: Option<String>) -> Self {
        self.snapshot_at = snapshot_at;
        self
    }

    pub fn with_snapshot_format(mut self, snapshot_format: Option<String>) -> Self {
        self.snapshot_format = snapshot_format;
        self
    }

    pub fn with_stop_at(mut self, stop_at: Option<String>) -> Self {
        self.stop_at = stop_at;
        self
    }

    pub fn with_info_at(mut self, info_at: Option<String>) -> Self {
        self.info_at = info_at;
        self
    }

    pub fn with_opc_at(mut self, opc_at: Option<String>) -> Self {
        self.opc_at = opc_at;
        self
    }

    pub fn with_meta(mut self, meta: Option<String>) -> Self {
        self.meta = meta;
        self
    }

    pub fn with_sleep_symbol(mut self, sleep_symbol: Option<String>) -> Self {
        self.sleep_symbol = sleep_symbol;
        self
    }
}

/// `None` parses as [StepPattern::Never] — an unconfigured matcher never fires.
fn parse_pattern(s: Option<&str>) -> Result<StepPattern> {
    match s {
        Some(s) => s.parse().map_err(|e| anyhow!("{e}")),
        None => Ok(StepPattern::Never),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn missing_pattern_defaults_to_never() {
        assert_eq!(parse_pattern(None).unwrap(), StepPattern::Never);
    }

    #[test]
    fn malformed_pattern_is_a_configuration_error() {
        assert!(parse_pattern(Some("whenever")).is_err());
    }
}
