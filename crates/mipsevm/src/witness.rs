//! The per-step witness emitted by the step executor (spec.md §3/§6.2).

use crate::state::StateWitness;
use alloy_primitives::B256;
use serde::{Deserialize, Serialize};

/// The exact byte input required to reproduce one step on an independent verifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepWitness {
    /// Canonical encoding of the pre-state (spec.md §4.1).
    #[serde(with = "crate::ser::state_witness_hex")]
    pub state: StateWitness,
    /// Merkle proofs for every memory word touched by this step: the instruction word at `pc`,
    /// followed by any loaded/stored word.
    #[serde(with = "crate::ser::vec_u8_hex")]
    pub mem_proof: Vec<u8>,
    /// Content-address of a pre-image requested during this step, if any.
    pub preimage_key: B256,
    /// Bytes returned by the oracle for `preimage_key`, if any.
    #[serde(with = "crate::ser::vec_u8_hex")]
    pub preimage_value: Vec<u8>,
    /// Byte offset within the pre-image addressed by this step.
    pub preimage_offset: u32,
}

impl Default for StepWitness {
    fn default() -> Self {
        Self {
            state: [0u8; crate::state::STATE_WITNESS_SIZE],
            mem_proof: Vec::new(),
            preimage_key: B256::default(),
            preimage_value: Vec::new(),
            preimage_offset: 0,
        }
    }
}

impl StepWitness {
    /// Whether this step consulted the pre-image oracle.
    pub fn has_preimage(&self) -> bool {
        self.preimage_key != B256::ZERO
    }

    /// Serialize `stateInput ∥ memProof`, the proof-record `stepInput` field (spec.md §3).
    pub fn encode_step_input(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.state.len() + self.mem_proof.len());
        out.extend_from_slice(&self.state);
        out.extend_from_slice(&self.mem_proof);
        out
    }

    /// Serialize the pre-image triple for the proof-record `oracleInput` field, or an empty
    /// vector when this step did not consult the oracle.
    pub fn encode_preimage_oracle_input(&self) -> Vec<u8> {
        if !self.has_preimage() {
            return Vec::new();
        }

        let mut out = Vec::with_capacity(32 + 4 + self.preimage_value.len());
        out.extend_from_slice(self.preimage_key.as_slice());
        out.extend_from_slice(&self.preimage_offset.to_be_bytes());
        out.extend_from_slice(&self.preimage_value);
        out
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn no_preimage_encodes_empty_oracle_input() {
        let witness = StepWitness::default();
        assert!(witness.encode_preimage_oracle_input().is_empty());
    }

    #[test]
    fn preimage_oracle_input_carries_key_offset_value() {
        let witness = StepWitness {
            preimage_key: B256::repeat_byte(0xab),
            preimage_value: vec![1, 2, 3],
            preimage_offset: 7,
            ..Default::default()
        };
        let encoded = witness.encode_preimage_oracle_input();
        assert_eq!(&encoded[..32], witness.preimage_key.as_slice());
        assert_eq!(&encoded[32..36], &7u32.to_be_bytes());
        assert_eq!(&encoded[36..], &[1, 2, 3]);
    }

    #[test]
    fn step_input_concatenates_state_and_mem_proof() {
        let mut witness = StepWitness {
            mem_proof: vec![9; 28 << 5],
            ..Default::default()
        };
        witness.state[0] = 0x42;
        let encoded = witness.encode_step_input();
        assert_eq!(encoded.len(), witness.state.len() + witness.mem_proof.len());
        assert_eq!(encoded[0], 0x42);
    }
}
