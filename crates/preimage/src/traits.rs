//! Trait seams for key encoding, the oracle client, the hint channel, and its channel transport.

use alloy_primitives::B256;
use anyhow::Result;
use std::fs::File;

/// A pre-image key that can be folded into a 32-byte type-prefixed commitment.
pub trait Key {
    /// Convert this key into its 32-byte type-prefixed pre-image key.
    fn preimage_key(self) -> B256;
}

/// A read-only pre-image oracle client (spec.md §4.4).
pub trait Oracle {
    /// Fetch the full pre-image for `key`, blocking until the server replies.
    fn get(&mut self, key: impl Key) -> Result<Vec<u8>>;
}

/// Data the guest can advise the host to prepare pre-images for.
pub trait Hint {
    /// The bytes sent over the hint stream.
    fn hint(&self) -> Vec<u8>;
}

/// Writes hints to the host; may be a no-op if the program runs in a read-only environment where
/// the host is expected to have every pre-image ready already.
pub trait Hinter {
    /// Send a hint, fire-and-forget (spec.md §4.4: no reply is read).
    fn hint(&mut self, value: &impl Hint) -> Result<()>;
}

/// A bidirectional byte channel backed by two OS file descriptors (spec.md §9: "pipes,
/// socketpairs, or equivalent").
pub trait FileChannel: std::io::Read + std::io::Write {
    /// The read half.
    fn reader(&mut self) -> &mut File;
    /// The write half.
    fn writer(&mut self) -> &mut File;
    /// Close both halves, dropping the underlying file descriptors.
    fn close(self) -> Result<()>;
}
