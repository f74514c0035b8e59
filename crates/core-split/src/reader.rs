//! Resumable block reader.
//!
//! Contract:
//! - Each call returns the longest prefix of buffered input that ends at an
//!   acceptable `>` character; the suffix is carried into the next call.
//! - In HTML-aware mode a `>` that closes an inline tag (`i b u sub sup`,
//!   open, close, or empty form) is not an acceptable cut, because such tags
//!   must stay embedded in their surrounding content run.
//! - A full buffer with no acceptable `>` is handed back whole (minus any
//!   trailing partial UTF-8 sequence) so callers can concatenate blocks for
//!   arbitrarily long records.
//! - At EOF any tail without a terminal `>` is malformed and is discarded
//!   with a warning.

use crate::SplitError;
use memchr::memrchr;
use std::io::Read;
use tracing::warn;

/// Target read size per call.
pub const BLOCK_SIZE: usize = 65536;
/// Reserved headroom for the carried-over remainder.
pub const CARRY_RESERVE: usize = 16384;

const INLINE_TAGS: &[&[u8]] = &[b"i", b"b", b"u", b"sub", b"sup"];

/// Per-stream reader options.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReaderOptions {
    /// Collapse whitespace runs on each returned block.
    pub compress_spaces: bool,
    /// Map any whitespace codepoint to an ASCII space.
    pub cleanup_spaces: bool,
    /// Refuse to cut blocks inside inline HTML tags.
    pub html_aware: bool,
}

pub struct BlockReader<R: Read> {
    source: R,
    remainder: Vec<u8>,
    options: ReaderOptions,
    closed: bool,
}

impl<R: Read> BlockReader<R> {
    pub fn new(source: R, options: ReaderOptions) -> Self {
        Self {
            source,
            remainder: Vec::with_capacity(CARRY_RESERVE),
            options,
            closed: false,
        }
    }

    /// True once the source hit EOF and the remainder is exhausted.
    pub fn is_closed(&self) -> bool {
        self.closed && self.remainder.is_empty()
    }

    /// Pull the next block. `Ok(None)` signals end of input.
    pub fn next_block(&mut self) -> Result<Option<String>, SplitError> {
        if self.is_closed() {
            return Ok(None);
        }

        let mut buf = Vec::with_capacity(CARRY_RESERVE + BLOCK_SIZE);
        buf.append(&mut self.remainder);

        if !self.closed {
            let carried = buf.len();
            buf.resize(carried + BLOCK_SIZE, 0);
            let mut filled = carried;
            // Read until the source produces data or reports EOF.
            while filled == carried {
                let n = self.source.read(&mut buf[filled..])?;
                if n == 0 {
                    self.closed = true;
                    break;
                }
                filled += n;
            }
            buf.truncate(filled);
        }

        if buf.is_empty() {
            return Ok(None);
        }

        match self.find_cut(&buf) {
            Some(cut) => {
                self.remainder = buf.split_off(cut + 1);
                Ok(Some(self.finish(buf)))
            }
            None if self.closed => {
                warn!(
                    target: "split",
                    bytes = buf.len(),
                    "discarding tail without terminal '>' at end of input"
                );
                Ok(None)
            }
            None => {
                // No cut in a full buffer: emit everything on a UTF-8
                // boundary and let the caller concatenate.
                let boundary = last_utf8_boundary(&buf);
                self.remainder = buf.split_off(boundary);
                if buf.is_empty() {
                    return self.next_block();
                }
                Ok(Some(self.finish(buf)))
            }
        }
    }

    fn finish(&self, bytes: Vec<u8>) -> String {
        let text = String::from_utf8_lossy(&bytes).into_owned();
        let text = if self.options.cleanup_spaces {
            core_text::cleanup_bad_spaces(&text).into_owned()
        } else {
            text
        };
        if self.options.compress_spaces {
            core_text::compress_runs_of_spaces(&text).into_owned()
        } else {
            text
        }
    }

    /// Scan backwards for the last acceptable `>`.
    fn find_cut(&self, buf: &[u8]) -> Option<usize> {
        let mut end = buf.len();
        while let Some(pos) = memrchr(b'>', &buf[..end]) {
            if !self.options.html_aware || !closes_inline_tag(buf, pos) {
                return Some(pos);
            }
            end = pos;
        }
        None
    }
}

/// Does `buf[pos] == b'>'` terminate one of the inline HTML tags?
fn closes_inline_tag(buf: &[u8], pos: usize) -> bool {
    // Longest candidate is "</sub" (5 bytes between '<' and '>').
    let window_start = pos.saturating_sub(6);
    let lt = match memrchr(b'<', &buf[window_start..pos]) {
        Some(rel) => window_start + rel,
        None => return false,
    };
    let mut name = &buf[lt + 1..pos];
    if let [b'/', rest @ ..] = name {
        name = rest;
    }
    if let [rest @ .., b'/'] = name {
        name = rest;
    }
    INLINE_TAGS.iter().any(|tag| name.eq_ignore_ascii_case(tag))
}

fn last_utf8_boundary(buf: &[u8]) -> usize {
    let mut i = buf.len();
    while i > 0 && (buf[i - 1] & 0b1100_0000) == 0b1000_0000 {
        i -= 1;
    }
    // Keep a trailing lead byte with its continuation bytes for next time.
    if i > 0 && (buf[i - 1] & 0b1100_0000) == 0b1100_0000 {
        i -= 1;
    }
    i
}
