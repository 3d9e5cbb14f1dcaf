//! Run-loop orchestration (spec.md §4.8): step matchers, snapshot/proof scheduling, and the
//! pre-image oracle sub-process supervisor, built on top of [stepvm_core]'s step executor.

mod builder;
mod compressor;
mod kernel;
mod matcher;
mod metadata;
mod proc_oracle;
pub(crate) mod traces;
mod types;

pub use builder::KernelBuilder;
pub use compressor::{compress_bytes, decompress_bytes};
pub use kernel::{Cancellation, Kernel};
pub use matcher::StepPattern;
pub use metadata::Metadata;
pub use proc_oracle::ProcessPreimageOracle;
pub use types::{ChildWithFds, Proof};
