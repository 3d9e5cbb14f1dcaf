//! The trait seams `stepvm-core` exposes to its collaborators.

use alloy_primitives::B256;
use anyhow::Result;

/// Computes the Keccak-256 witness hash of an encoded [crate::state::StateWitness].
pub trait StateWitnessHasher {
    /// Compute the state hash, with the [crate::VmStatus] byte overlaid onto byte 0.
    fn state_hash(&self) -> B256;
}

/// The pre-image oracle client contract consumed by [crate::mips::InstrumentedState] when the
/// guest executes the pre-image read syscall (spec.md §4.4).
///
/// Implementations are free to be backed by a sub-process, a static fixture, or anything else;
/// the step executor only depends on this interface, never on a concrete transport.
pub trait PreimageOracle {
    /// Enqueue a hint; never blocks on server processing, silently no-ops if unconfigured.
    fn hint(&mut self, value: &[u8]);

    /// Fetch the full pre-image for `key`, blocking until the reply is received. Takes `&mut
    /// self` because stream-backed implementations (the sub-process supervisor) must write the
    /// request and read the reply through shared I/O state.
    fn get(&mut self, key: B256) -> Result<Vec<u8>>;
}
