//! Fixtures shared by `stepvm-core`'s own test modules.

use crate::PreimageOracle;
use alloy_primitives::{keccak256, B256};
use stepvm_preimage::{Key, Keccak256Key};

/// Scratch address tests write their "done"/"result" words to.
pub const BASE_ADDR_END: u32 = 0xBF_FF_FF_F0;

/// Return address tests jump to on completion.
pub const END_ADDR: u32 = 0xA7_EF_00_D0;

/// A [PreimageOracle] that always answers with one fixed pre-image, keyed by its own
/// Keccak-256 digest. Sufficient for tests that exercise the pre-image read syscall without a
/// real oracle sub-process.
pub struct StaticOracle {
    preimage_data: Vec<u8>,
}

impl StaticOracle {
    pub fn new(preimage_data: Vec<u8>) -> Self {
        Self { preimage_data }
    }

    fn key(&self) -> B256 {
        (keccak256(&self.preimage_data) as Keccak256Key).preimage_key()
    }
}

impl PreimageOracle for StaticOracle {
    fn hint(&mut self, _value: &[u8]) {
        // noop
    }

    fn get(&mut self, key: B256) -> anyhow::Result<Vec<u8>> {
        if key != self.key() {
            anyhow::bail!("StaticOracle has no pre-image for key {key:?}");
        }
        Ok(self.preimage_data.clone())
    }
}
