//! The hint stream: guest -> host, fire-and-forget (spec.md §4.4). Unlike the pre-image stream,
//! no reply is ever read back; a hint that is dropped on the floor is not an error.

use crate::{Hint, Hinter, ReadWritePair};
use anyhow::Result;
use std::io::{Read, Write};

/// A callback invoked with a hint's payload bytes as they're received.
pub type HintHandler<'a> = Box<dyn FnMut(&[u8]) -> Result<()> + 'a>;

/// Sends hints to a [HintReader] so a pre-image oracle service can prepare specific pre-images
/// ahead of when the guest actually requests them.
pub struct HintWriter {
    io: ReadWritePair,
}

impl HintWriter {
    pub fn new(io: ReadWritePair) -> Self {
        Self { io }
    }
}

impl Hinter for HintWriter {
    fn hint(&mut self, value: &impl Hint) -> Result<()> {
        let hint = value.hint();
        let mut hint_bytes = vec![0u8; 4 + hint.len()];
        hint_bytes[..4].copy_from_slice(&(hint.len() as u32).to_be_bytes());
        hint_bytes[4..].copy_from_slice(&hint);

        crate::debug!("Sending hint ({} bytes)", hint.len());
        self.io.write_all(&hint_bytes)?;
        Ok(())
    }
}

/// Reads hints written by a [HintWriter] and routes each one to a handler.
pub struct HintReader {
    io: ReadWritePair,
}

impl HintReader {
    pub fn new(io: ReadWritePair) -> Self {
        Self { io }
    }

    /// Read and route the next hint.
    ///
    /// ### Returns
    /// - `Ok(true)` on a clean EOF (the writer's side closed).
    /// - `Ok(false)` after successfully routing one hint.
    /// - `Err(_)` if the handler rejected the hint or the channel failed.
    pub fn next_hint(&mut self, mut router: HintHandler) -> Result<bool> {
        let mut length = [0u8; 4];
        let n = self.io.read(&mut length)?;
        if n == 0 {
            return Ok(true);
        }
        if n < 4 {
            anyhow::bail!("hint stream closed mid-length-prefix");
        }

        let length = u32::from_be_bytes(length) as usize;
        let payload = if length == 0 {
            Vec::default()
        } else {
            let mut raw = vec![0u8; length];
            self.io.read_exact(&mut raw)?;
            raw
        };

        router(&payload)?;
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BytesHint(Vec<u8>);
    impl Hint for BytesHint {
        fn hint(&self) -> Vec<u8> {
            self.0.clone()
        }
    }

    fn roundtrip(hints: Vec<Vec<u8>>) {
        let (a, b) = crate::create_bidirectional_channel().unwrap();
        let mut writer = HintWriter::new(a);
        let mut reader = HintReader::new(b);

        for h in &hints {
            writer.hint(&BytesHint(h.clone())).unwrap();
        }

        for expected in &hints {
            let received = std::cell::RefCell::new(Vec::new());
            let eof = reader
                .next_hint(Box::new(|payload| {
                    *received.borrow_mut() = payload.to_vec();
                    Ok(())
                }))
                .unwrap();
            assert!(!eof);
            assert_eq!(&*received.borrow(), expected);
        }
    }

    #[test]
    fn empty_hint_round_trips() {
        roundtrip(vec![vec![]]);
    }

    #[test]
    fn hello_world_hint_round_trips() {
        roundtrip(vec![b"hello world".to_vec()]);
    }

    #[test]
    fn multiple_hints_round_trip_in_order() {
        roundtrip(vec![
            b"hello world".to_vec(),
            b"stepvm stepvm stepvm".to_vec(),
            b"".to_vec(),
            b"another".to_vec(),
        ]);
    }

    #[test]
    fn hint_writer_does_not_block_on_a_reply() {
        // A bug regression: the old protocol blocked the writer on a 1-byte ack. Writing two
        // hints back-to-back with no reader draining the pipe must not deadlock.
        let (a, _b) = crate::create_bidirectional_channel().unwrap();
        let mut writer = HintWriter::new(a);
        writer.hint(&BytesHint(b"one".to_vec())).unwrap();
        writer.hint(&BytesHint(b"two".to_vec())).unwrap();
    }
}
