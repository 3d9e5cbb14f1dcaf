//! The canonical MIPS32 machine state: the single source of truth for one guest thread context.

use crate::{traits::StateWitnessHasher, Memory, VmStatus};
use alloy_primitives::{keccak256, B256};
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// The size, in bytes, of the canonical [State] encoding used for hashing and as the witness
/// `stateInput`.
pub const STATE_WITNESS_SIZE: usize = 226;

/// A canonically encoded [State], ready to hash or embed in a [crate::witness::StepWitness].
pub type StateWitness = [u8; STATE_WITNESS_SIZE];

/// The full machine state of one guest MIPS32 thread context.
///
/// Invariants: `registers[0] == 0` always; `pc`/`next_pc` are word-aligned; once `exited` is set
/// no field changes again; `step` strictly increases on each successful step.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct State {
    /// The paged address space.
    pub memory: Memory,
    /// The pre-image key in flight for the current step, if any.
    #[serde(with = "crate::ser::fixed_32_hex")]
    pub preimage_key: [u8; 32],
    /// The byte offset into the in-flight pre-image.
    pub preimage_offset: u32,
    /// The address of the instruction about to execute.
    pub pc: u32,
    /// The address the branch-delay slot will jump to.
    pub next_pc: u32,
    /// Multiplier/divider low result register.
    pub lo: u32,
    /// Multiplier/divider high result register.
    pub hi: u32,
    /// Bump pointer for the guest's `mmap`-style allocator.
    pub heap: u32,
    /// Valid only when `exited` is true.
    pub exit_code: u8,
    /// Terminal flag; once true the state is frozen.
    pub exited: bool,
    /// Monotonically increasing count of completed instructions.
    pub step: u64,
    /// The 32 general-purpose registers; `registers[0]` is always zero.
    pub registers: [u32; 32],
}

impl State {
    /// Encode the canonical byte representation fixed by the witness format: field order and
    /// widths are load-bearing for cross-implementation determinism, never reorder them.
    pub fn encode_witness(&mut self) -> Result<StateWitness> {
        let mut witness: StateWitness = [0u8; STATE_WITNESS_SIZE];
        witness[..32].copy_from_slice(self.memory.merkle_root()?.as_slice());
        witness[32..64].copy_from_slice(&self.preimage_key);
        witness[64..68].copy_from_slice(&self.preimage_offset.to_be_bytes());
        witness[68..72].copy_from_slice(&self.pc.to_be_bytes());
        witness[72..76].copy_from_slice(&self.next_pc.to_be_bytes());
        witness[76..80].copy_from_slice(&self.lo.to_be_bytes());
        witness[80..84].copy_from_slice(&self.hi.to_be_bytes());
        witness[84..88].copy_from_slice(&self.heap.to_be_bytes());
        witness[88] = self.exit_code;
        witness[89] = self.exited as u8;
        witness[90..98].copy_from_slice(&self.step.to_be_bytes());
        for (i, r) in self.registers.iter().enumerate() {
            let start = 98 + i * 4;
            witness[start..start + 4].copy_from_slice(&r.to_be_bytes());
        }
        Ok(witness)
    }

    /// Classify the state's exit condition into the status byte overlaid onto its hash.
    pub fn vm_status(exited: bool, exit_code: u8) -> VmStatus {
        if !exited {
            return VmStatus::Unfinished;
        }
        match exit_code {
            0 => VmStatus::Valid,
            1 => VmStatus::Invalid,
            _ => VmStatus::Panic,
        }
    }
}

impl StateWitnessHasher for StateWitness {
    /// Keccak-256 over the canonical encoding, with the first byte overwritten by the state's
    /// [VmStatus] so a verifier can classify a claimed root without decoding the full witness.
    fn state_hash(&self) -> B256 {
        let mut hash = keccak256(self);
        // offset of exit_code within the encoding: 2 x 32-byte fields + 6 x 4-byte fields.
        let offset = 32 * 2 + 4 * 6;
        let exit_code = self[offset];
        let exited = self[offset + 1] == 1;
        hash[0] = State::vm_status(exited, exit_code) as u8;
        hash
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn sample_state() -> State {
        let mut state = State {
            pc: 0x1000,
            next_pc: 0x1004,
            ..Default::default()
        };
        state.memory.write32(0x1000, 0x24080001).unwrap(); // addiu $t0, $zero, 1
        state
    }

    #[test]
    fn encode_decode_round_trip_is_stable() {
        let mut state = sample_state();
        let first = state.encode_witness().unwrap();
        let second = state.encode_witness().unwrap();
        assert_eq!(first, second, "re-encoding an unchanged state is byte-identical");
    }

    #[test]
    fn register_zero_is_always_zero() {
        let state = State::default();
        assert_eq!(state.registers[0], 0);
    }

    #[test]
    fn unfinished_status_byte_is_three() {
        let mut state = sample_state();
        let witness = state.encode_witness().unwrap();
        assert_eq!(witness.state_hash()[0], VmStatus::Unfinished as u8);
    }

    #[test]
    fn valid_exit_status_byte_is_zero() {
        let mut state = sample_state();
        state.exited = true;
        state.exit_code = 0;
        let witness = state.encode_witness().unwrap();
        assert_eq!(witness.state_hash()[0], VmStatus::Valid as u8);
    }

    #[test]
    fn panic_exit_status_byte_is_two() {
        let mut state = sample_state();
        state.exited = true;
        state.exit_code = 42;
        let witness = state.encode_witness().unwrap();
        assert_eq!(witness.state_hash()[0], VmStatus::Panic as u8);
    }

    #[test]
    fn hash_changes_when_state_changes() {
        let mut state = sample_state();
        let before = state.encode_witness().unwrap().state_hash();
        state.step += 1;
        let after = state.encode_witness().unwrap().state_hash();
        assert_ne!(before, after);
    }
}
