//! A deterministic, single-step MIPS32 emulator: the fraud-proof execution engine driven by
//! `stepvm-runner`. See spec.md §4 for the full instruction set and witness format.

pub(crate) mod traces;

mod memory;
pub use self::memory::Memory;

mod page;
pub use self::page::CachedPage;

pub mod state;
pub use self::state::{State, StateWitness, STATE_WITNESS_SIZE};

mod traits;
pub use self::traits::{PreimageOracle, StateWitnessHasher};

mod witness;
pub use witness::StepWitness;

mod utils;

mod types;
pub use types::{Address, Fd, Gindex, Page, PageIndex, Syscall, VmStatus};

mod disasm;
pub use disasm::disassemble;

mod mips;
pub use mips::InstrumentedState;

mod patch;
pub use patch::{load_elf, patch_go, patch_stack, MultiReader, GO_SYMBOLS};

pub mod ser;

pub mod test_utils;
