//! Gzip compression for persisted state/proof/snapshot files (spec.md §6.1 supplement: state
//! files on disk are gzip-compressed JSON; the hashed encoding of spec.md §4.1 is authoritative
//! regardless of this on-disk wrapper).

use anyhow::Result;
use flate2::{bufread::GzDecoder, write::GzEncoder, Compression};
use std::io::{Cursor, Read, Write};

/// Compress a byte slice using gzip.
pub fn compress_bytes(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(bytes)?;
    Ok(encoder.finish()?)
}

/// Decompress a gzip byte slice.
pub fn decompress_bytes(compressed_bytes: &[u8]) -> Result<Vec<u8>> {
    let cursor = Cursor::new(compressed_bytes);
    let mut decoder = GzDecoder::new(cursor);

    let mut decompressed_bytes = Vec::with_capacity(compressed_bytes.len());
    decoder.read_to_end(&mut decompressed_bytes)?;

    Ok(decompressed_bytes)
}

#[cfg(test)]
mod test {
    use proptest::proptest;

    proptest! {
        #[test]
        fn compress_decompress_round_trips(bytes: Vec<u8>) {
            let compressed = super::compress_bytes(&bytes).unwrap();
            let decompressed = super::decompress_bytes(&compressed).unwrap();
            assert_eq!(bytes, decompressed);
        }
    }
}
