//! Streaming record carving: fill fixed-size buffers from an unbounded
//! byte source, then locate `<pattern>…</pattern>` spans without ever
//! holding the whole input in memory.
//!
//! Two layers:
//! * `reader::BlockReader` yields text blocks that always end at a `>`
//!   (HTML-aware when asked), carrying a remainder between calls.
//! * `partition::Partitioner` concatenates blocks and emits one record
//!   string per pattern instance, tagged with its 1-based index, absolute
//!   byte offset, and byte length.

pub mod partition;
pub mod reader;

pub use partition::{PartitionMode, Partitioner};
pub use reader::{BlockReader, ReaderOptions};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SplitError {
    #[error("read failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("empty pattern name")]
    EmptyPattern,
    #[error("pattern name '{0}' contains illegal characters")]
    BadPattern(String),
}
