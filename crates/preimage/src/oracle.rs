//! The pre-image request/reply stream (spec.md §4.4/§6.3): guest writes a 32-byte key, server
//! replies with an 8-byte big-endian length followed by that many bytes.

use crate::{Key, Oracle, PreimageGetter};
use alloy_primitives::B256;
use anyhow::Result;
use std::io::{Read, Write};

/// The guest-side pre-image oracle client.
pub struct OracleClient<RW: Read + Write> {
    rw: RW,
}

impl<RW: Read + Write> OracleClient<RW> {
    pub fn new(rw: RW) -> Self {
        Self { rw }
    }
}

impl<RW: Read + Write> Oracle for OracleClient<RW> {
    fn get(&mut self, key: impl Key) -> Result<Vec<u8>> {
        let hash = key.preimage_key();
        self.rw.write_all(hash.as_slice())?;

        let mut length = [0u8; 8];
        self.rw.read_exact(&mut length)?;
        let length = u64::from_be_bytes(length) as usize;

        let mut payload = vec![0u8; length];
        self.rw.read_exact(&mut payload)?;

        Ok(payload)
    }
}

/// The host-side pre-image oracle server, serving one request per call.
pub struct OracleServer<RW: Read + Write> {
    rw: RW,
}

impl<RW: Read + Write> OracleServer<RW> {
    pub fn new(rw: RW) -> Self {
        Self { rw }
    }

    /// Block for the next 32-byte key, fetch its pre-image via `getter`, and write the
    /// length-prefixed reply.
    pub fn serve_request(&mut self, getter: &PreimageGetter) -> Result<()> {
        let mut key = B256::ZERO;
        self.rw.read_exact(key.as_mut_slice())?;

        let value = getter(key)?;

        self.rw.write_all(&(value.len() as u64).to_be_bytes())?;
        if !value.is_empty() {
            self.rw.write_all(&value)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::Keccak256Key;

    #[test]
    fn client_server_round_trip() {
        let (client_io, server_io) = crate::create_bidirectional_channel().unwrap();
        let mut client = OracleClient::new(client_io);
        let mut server = OracleServer::new(server_io);

        let key: Keccak256Key = B256::repeat_byte(0x11);
        let getter: PreimageGetter = Box::new(move |k| {
            assert_eq!(k, key.preimage_key());
            Ok(b"the preimage bytes".to_vec())
        });

        let handle = std::thread::spawn(move || server.serve_request(&getter));
        let got = client.get(key).unwrap();
        handle.join().unwrap().unwrap();

        assert_eq!(got, b"the preimage bytes");
    }

    #[test]
    fn empty_preimage_round_trips() {
        let (client_io, server_io) = crate::create_bidirectional_channel().unwrap();
        let mut client = OracleClient::new(client_io);
        let mut server = OracleServer::new(server_io);

        let key: Keccak256Key = B256::repeat_byte(0x22);
        let getter: PreimageGetter = Box::new(|_| Ok(Vec::new()));

        let handle = std::thread::spawn(move || server.serve_request(&getter));
        let got = client.get(key).unwrap();
        handle.join().unwrap().unwrap();

        assert!(got.is_empty());
    }
}
