//! Small helpers shared by the memory/page Merkleization code.

/// Concatenate two 32-byte hashes into a 64-byte buffer for hashing the parent node.
#[inline(always)]
pub(crate) fn concat_fixed(a: [u8; 32], b: [u8; 32]) -> [u8; 64] {
    let mut out = [0u8; 64];
    out[..32].copy_from_slice(&a);
    out[32..].copy_from_slice(&b);
    out
}
