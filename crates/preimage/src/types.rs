//! Content-addressed key types and the fixed inherited-fd layout (spec.md §4.4/§6.5).

use crate::Key;
use alloy_primitives::B256;
use anyhow::Result;

/// A function that fetches the full pre-image bytes for a given key.
pub type PreimageGetter = Box<dyn Fn(B256) -> Result<Vec<u8>> + Send + Sync>;

/// A [Keccak256Key] wraps a Keccak-256 digest to use it as a typed pre-image key.
pub type Keccak256Key = B256;

/// A [LocalIndexKey] indexes a program input local to this program instance, rather than a
/// globally content-addressed value.
pub type LocalIndexKey = u64;

/// The type tag written into byte 0 of a [Key::preimage_key] output.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    /// Illegal; a key must never use this tag.
    Illegal = 0,
    /// Indexes a local, program-instance-specific variable.
    Local = 1,
    /// Indexes a global Keccak-256 pre-image.
    GlobalKeccak = 2,
}

impl Key for LocalIndexKey {
    fn preimage_key(self) -> B256 {
        let mut out = B256::ZERO;
        out[0] = KeyType::Local as u8;
        out[24..].copy_from_slice(&self.to_be_bytes());
        out
    }
}

impl Key for Keccak256Key {
    fn preimage_key(mut self) -> B256 {
        self[0] = KeyType::GlobalKeccak as u8;
        self
    }
}

/// The fixed order in which the oracle sub-process supervisor (spec.md §4.5) exposes its
/// server-side channel endpoints to the child as inherited file descriptors, starting at the
/// first descriptor index beyond stdio (spec.md §6.5).
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreimageFds {
    HintClientRead = 3,
    HintClientWrite = 4,
    PreimageClientRead = 5,
    PreimageClientWrite = 6,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn local_key_carries_type_tag_and_index() {
        let key: LocalIndexKey = 0x2a;
        let out = key.preimage_key();
        assert_eq!(out[0], KeyType::Local as u8);
        assert_eq!(u64::from_be_bytes(out[24..].try_into().unwrap()), 0x2a);
    }

    #[test]
    fn keccak_key_overwrites_only_the_type_byte() {
        let digest = B256::repeat_byte(0xab);
        let out = digest.preimage_key();
        assert_eq!(out[0], KeyType::GlobalKeccak as u8);
        assert_eq!(&out[1..], &[0xab; 31]);
    }
}
