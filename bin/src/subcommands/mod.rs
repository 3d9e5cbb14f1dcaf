//! Subcommands for the `stepvm` binary.

use anyhow::Result;

pub(crate) mod load_elf;
pub(crate) mod run;

/// Runs a subcommand to completion. Synchronous throughout: the run loop and the oracle
/// sub-process supervisor are both blocking (spec.md §5), so there is no event loop to hand off
/// to.
pub(crate) trait Dispatch {
    fn dispatch(self) -> Result<()>;
}
