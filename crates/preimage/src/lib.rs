//! Client/server bindings for the pre-image oracle wire protocol (spec.md §4.4/§6.3): a hint
//! stream (fire-and-forget) and a pre-image stream (blocking request/reply), each a pair of
//! independent byte channels.

pub(crate) mod traces;

mod oracle;
pub use oracle::{OracleClient, OracleServer};

mod traits;
pub use traits::{FileChannel, Hint, Hinter, Key, Oracle};

mod types;
pub use types::{Keccak256Key, KeyType, LocalIndexKey, PreimageFds, PreimageGetter};

mod hints;
pub use hints::{HintHandler, HintReader, HintWriter};

mod file_chan;
pub use file_chan::{create_bidirectional_channel, ReadWritePair};
