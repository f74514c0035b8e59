//! Posting layout: one directory level per character of the lowercased
//! term (non-alphanumerics folded to `_`), with a `uids.txt` file that
//! accumulates one UID per line, append-on-write.

use crate::ArchiveError;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Relative posting directory for a term.
pub fn posting_path(term: &str) -> PathBuf {
    let mut path = PathBuf::new();
    for c in term.to_lowercase().chars() {
        let level = if c.is_ascii_alphanumeric() { c } else { '_' };
        path.push(level.to_string());
    }
    path
}

/// Append `uid` to the term's posting list.
pub fn post_uid(root: &Path, term: &str, uid: &str) -> Result<(), ArchiveError> {
    let dir = root.join(posting_path(term));
    fs::create_dir_all(&dir)?;
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join("uids.txt"))?;
    writeln!(file, "{uid}")?;
    Ok(())
}
