//! Type aliases and small enums shared across the crate.

/// A [Page] is a portion of memory of size [crate::page::PAGE_SIZE].
pub type Page = [u8; crate::page::PAGE_SIZE];

/// A [PageIndex] is the index of a [Page] within [crate::Memory]'s mappings.
pub type PageIndex = u64;

/// A [Gindex] is a generalized index, defined as $2^{\text{depth}} + \text{index}$.
pub type Gindex = u64;

/// An [Address] is a 32-bit MIPS address, widened to 64 bits for generalized-index math.
pub type Address = u64;

/// The [VmStatus] is encoded into the top byte of a state hash (see [crate::state]) so an
/// on-chain verifier can classify a claimed state without decoding the full witness.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmStatus {
    /// The program exited with code 0.
    Valid = 0,
    /// The program exited with a non-zero, non-panic code.
    Invalid = 1,
    /// The program exited via a panic path (exit code outside 0/1).
    Panic = 2,
    /// The program has not yet exited.
    Unfinished = 3,
}

/// File descriptors recognized by the guest's `read`/`write`/`fcntl` syscalls.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fd {
    StdIn = 0,
    Stdout = 1,
    StdErr = 2,
    HintRead = 3,
    HintWrite = 4,
    PreimageRead = 5,
    PreimageWrite = 6,
}

impl TryFrom<u8> for Fd {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => Fd::StdIn,
            1 => Fd::Stdout,
            2 => Fd::StdErr,
            3 => Fd::HintRead,
            4 => Fd::HintWrite,
            5 => Fd::PreimageRead,
            6 => Fd::PreimageWrite,
            _ => return Err(()),
        })
    }
}

/// Syscall numbers recognized by [crate::mips::InstrumentedState::handle_syscall].
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Syscall {
    Mmap = 4090,
    Brk = 4045,
    Clone = 4120,
    ExitGroup = 4246,
    Read = 4003,
    Write = 4004,
    Fcntl = 4055,
}

impl TryFrom<u32> for Syscall {
    type Error = ();

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Ok(match value {
            4090 => Syscall::Mmap,
            4045 => Syscall::Brk,
            4120 => Syscall::Clone,
            4246 => Syscall::ExitGroup,
            4003 => Syscall::Read,
            4004 => Syscall::Write,
            4055 => Syscall::Fcntl,
            _ => return Err(()),
        })
    }
}
