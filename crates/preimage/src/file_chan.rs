//! [ReadWritePair]: the default [crate::traits::FileChannel] implementation, backed by OS pipes.

use crate::{traits::FileChannel, types::PreimageFds};
use anyhow::Result;
use std::{
    fs::File,
    io::{self, Read, Write},
    os::fd::{FromRawFd, IntoRawFd},
};

/// A pair of file descriptors used together as one bidirectional byte stream.
pub struct ReadWritePair {
    r: File,
    w: File,
}

impl ReadWritePair {
    pub fn new(r: File, w: File) -> Self {
        Self { r, w }
    }

    /// The hint channel endpoints inherited by the oracle sub-process (spec.md §6.5).
    ///
    /// # Safety
    /// The caller must ensure the process was spawned with these descriptors mapped by the
    /// supervisor, per spec.md §4.5.
    pub unsafe fn client_hinter_channel() -> ReadWritePair {
        let r = File::from_raw_fd(PreimageFds::HintClientRead as i32);
        let w = File::from_raw_fd(PreimageFds::HintClientWrite as i32);
        ReadWritePair::new(r, w)
    }

    /// The pre-image channel endpoints inherited by the oracle sub-process (spec.md §6.5).
    ///
    /// # Safety
    /// Same precondition as [Self::client_hinter_channel].
    pub unsafe fn client_preimage_channel() -> ReadWritePair {
        let r = File::from_raw_fd(PreimageFds::PreimageClientRead as i32);
        let w = File::from_raw_fd(PreimageFds::PreimageClientWrite as i32);
        ReadWritePair::new(r, w)
    }
}

impl Read for ReadWritePair {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.r.read(buf)
    }
}

impl Write for ReadWritePair {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.w.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.w.flush()
    }
}

impl FileChannel for ReadWritePair {
    fn reader(&mut self) -> &mut File {
        &mut self.r
    }

    fn writer(&mut self) -> &mut File {
        &mut self.w
    }

    fn close(self) -> Result<()> {
        // `self` is dropped here, closing both file descriptors.
        Ok(())
    }
}

/// Create two independent bidirectional channels out of process-local OS pipes: one endpoint of
/// each pair is meant for this process, the other for a child that inherits it.
pub fn create_bidirectional_channel() -> Result<(ReadWritePair, ReadWritePair)> {
    let (ar, bw) = os_pipe::pipe()?;
    let (br, aw) = os_pipe::pipe()?;
    Ok((
        ReadWritePair::new(unsafe { File::from_raw_fd(ar.into_raw_fd()) }, unsafe {
            File::from_raw_fd(aw.into_raw_fd())
        }),
        ReadWritePair::new(unsafe { File::from_raw_fd(br.into_raw_fd()) }, unsafe {
            File::from_raw_fd(bw.into_raw_fd())
        }),
    ))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn bidirectional_channel_round_trips_bytes() {
        let (mut a, mut b) = create_bidirectional_channel().unwrap();
        a.write_all(b"ping").unwrap();
        let mut buf = [0u8; 4];
        b.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"ping");

        b.write_all(b"pong").unwrap();
        a.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"pong");
    }
}
