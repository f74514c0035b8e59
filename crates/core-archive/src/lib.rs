//! Content-addressed record archive.
//!
//! Each record is stored as an individual file under a directory trie
//! derived purely from its identifier, with an at-most-one-writer-per-
//! identifier discipline enforced by a mutex-guarded in-use map. Payloads
//! are normalized before hitting disk so fetch-after-store is
//! deterministic regardless of the upstream formatting.

pub mod posting;
pub mod stash;
pub mod trie;

pub use posting::post_uid;
pub use stash::{Stasher, StashOptions};
pub use trie::trie_path;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("identifier '{0}' is empty or longer than 64 characters")]
    BadIdentifier(String),
    #[error("could not lock identifier '{0}' after {1} attempts")]
    Contended(String, u32),
    #[error("archive I/O failure: {0}")]
    Io(#[from] std::io::Error),
}

/// Outcome of comparing an incoming record against the stored copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeStatus {
    /// No stored file yet.
    New,
    /// Stored file differs.
    Updated,
    /// Stored file is byte-identical.
    Unchanged,
}

impl ChangeStatus {
    /// Two-letter report code.
    pub fn code(self) -> &'static str {
        match self {
            ChangeStatus::New => "NW",
            ChangeStatus::Updated => "UP",
            ChangeStatus::Unchanged => "NO",
        }
    }
}
