//! Types for the `stepvm-runner` interface (spec.md §6.2's proof record, §4.5's process handle).

use serde::{Deserialize, Serialize};
use std::process::Child;
use stepvm_core::ser;
use stepvm_preimage::ReadWritePair;

/// A single-step proof record (spec.md §6.2): `pre`/`post` state hashes plus the exact bytes a
/// verifier needs to reproduce the transition. `step-input` already carries the full encoded
/// pre-state plus memory proof (see `StepWitness::encode_step_input`), so no separate state field
/// is needed.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Proof {
    pub step: u64,
    #[serde(with = "ser::fixed_32_hex")]
    pub pre: [u8; 32],
    #[serde(with = "ser::fixed_32_hex")]
    pub post: [u8; 32],
    #[serde(with = "ser::vec_u8_hex")]
    pub step_input: Vec<u8>,
    #[serde(with = "ser::vec_u8_hex")]
    pub oracle_input: Vec<u8>,
}

/// A [Child] process coupled with the channel endpoints it was given, so dropping one drops the
/// other and no file descriptor is leaked (spec.md §5: the supervisor exclusively owns the
/// sub-process handle and its channel endpoints).
pub struct ChildWithFds {
    pub inner: Child,
    pub fds: [ReadWritePair; 2],
}
