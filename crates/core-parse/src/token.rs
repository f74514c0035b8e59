//! Single-pass XML lexer.
//!
//! Three 256-entry lookup tables (whitespace, legal first-of-name, legal
//! rest-of-name) drive the scan; they are built once behind a one-shot
//! guard and read-only afterwards. Processing instructions are skipped
//! silently. In HTML-aware mode a `<` whose lookahead matches an inline
//! `i|b|u|sub|sup` form stays inside the current content run.

use core_split::{BlockReader, SplitError};
use memchr::memchr;
use std::io::Read;
use std::sync::OnceLock;
use tracing::warn;

/// One lexer event over a borrowed record string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token<'a> {
    StartTag { name: &'a str, attrs: &'a str },
    SelfTag { name: &'a str, attrs: &'a str },
    StopTag { name: &'a str },
    Content(&'a str),
    CData(&'a str),
    Comment(&'a str),
    Doctype(&'a str),
    Closed,
}

struct ScanTables {
    space: [bool; 256],
    first: [bool; 256],
    rest: [bool; 256],
}

fn tables() -> &'static ScanTables {
    static TABLES: OnceLock<ScanTables> = OnceLock::new();
    TABLES.get_or_init(|| {
        let mut t = ScanTables {
            space: [false; 256],
            first: [false; 256],
            rest: [false; 256],
        };
        for b in [b' ', b'\t', b'\n', b'\r', 0x0B, 0x0C] {
            t.space[b as usize] = true;
        }
        for b in 0u8..=255 {
            let c = b as char;
            if c.is_ascii_alphabetic() || c == '_' || c == ':' || b >= 0x80 {
                t.first[b as usize] = true;
            }
            if c.is_ascii_alphanumeric() || matches!(c, '_' | ':' | '.' | '-') || b >= 0x80 {
                t.rest[b as usize] = true;
            }
        }
        t
    })
}

pub(crate) fn is_space_byte(b: u8) -> bool {
    tables().space[b as usize]
}

fn name_end(bytes: &[u8], start: usize) -> usize {
    let t = tables();
    let mut i = start;
    if i < bytes.len() && t.first[bytes[i] as usize] {
        i += 1;
        while i < bytes.len() && t.rest[bytes[i] as usize] {
            i += 1;
        }
    }
    i
}

const INLINE_TAGS: &[&str] = &["i", "b", "u", "sub", "sup"];

/// Does the text at `lt` (pointing at `<`) spell an inline HTML tag?
/// Returns the index one past its `>` when it does.
fn html_ahead(bytes: &[u8], lt: usize) -> Option<usize> {
    let mut i = lt + 1;
    if i < bytes.len() && bytes[i] == b'/' {
        i += 1;
    }
    let end = name_end(bytes, i);
    if end == i {
        return None;
    }
    let name = std::str::from_utf8(&bytes[i..end]).ok()?;
    if !INLINE_TAGS.iter().any(|t| name.eq_ignore_ascii_case(t)) {
        return None;
    }
    let mut j = end;
    if j < bytes.len() && bytes[j] == b'/' {
        j += 1;
    }
    (j < bytes.len() && bytes[j] == b'>').then_some(j + 1)
}

/// Borrowing tokenizer over one complete record string.
pub struct Tokenizer<'a> {
    text: &'a str,
    pos: usize,
    html_aware: bool,
}

impl<'a> Tokenizer<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            text,
            pos: 0,
            html_aware: false,
        }
    }

    pub fn html_aware(text: &'a str) -> Self {
        Self {
            text,
            pos: 0,
            html_aware: true,
        }
    }

    pub fn next_token(&mut self) -> Token<'a> {
        let bytes = self.text.as_bytes();
        loop {
            if self.pos >= bytes.len() {
                return Token::Closed;
            }
            if bytes[self.pos] == b'<' {
                match self.scan_markup() {
                    Some(tok) => return tok,
                    None => continue,
                }
            }
            if let Some(tok) = self.scan_content() {
                return tok;
            }
        }
    }

    /// Content run from `pos` to the next structural `<`. Returns `None`
    /// when the run is entirely whitespace.
    fn scan_content(&mut self) -> Option<Token<'a>> {
        let bytes = self.text.as_bytes();
        let start = self.pos;
        let mut cursor = start;
        let end = loop {
            match memchr(b'<', &bytes[cursor..]) {
                Some(rel) => {
                    let lt = cursor + rel;
                    if self.html_aware {
                        if let Some(past) = html_ahead(bytes, lt) {
                            cursor = past;
                            continue;
                        }
                    }
                    break lt;
                }
                None => break bytes.len(),
            }
        };
        self.pos = end;
        let run = self.text[start..end].trim_end();
        (!run.is_empty()).then(|| Token::Content(run.trim_start_matches(['\n', '\r'])))
    }

    /// Markup at `pos` (which points at `<`). Returns `None` for constructs
    /// that produce no event (processing instructions, malformed stubs).
    fn scan_markup(&mut self) -> Option<Token<'a>> {
        let bytes = self.text.as_bytes();
        let lt = self.pos;
        let after = &self.text[lt..];

        if let Some(body) = after.strip_prefix("<!--") {
            return match body.find("-->") {
                Some(end) => {
                    self.pos = lt + 4 + end + 3;
                    Some(Token::Comment(&self.text[lt + 4..lt + 4 + end]))
                }
                None => {
                    self.pos = bytes.len();
                    Some(Token::Comment(&self.text[lt + 4..]))
                }
            };
        }
        if let Some(body) = after.strip_prefix("<![CDATA[") {
            return match body.find("]]>") {
                Some(end) => {
                    self.pos = lt + 9 + end + 3;
                    Some(Token::CData(self.text[lt + 9..lt + 9 + end].trim_end()))
                }
                None => {
                    self.pos = bytes.len();
                    Some(Token::CData(&self.text[lt + 9..]))
                }
            };
        }
        if after.starts_with("<!") {
            let end = memchr(b'>', &bytes[lt..]).map_or(bytes.len(), |rel| lt + rel);
            self.pos = (end + 1).min(bytes.len());
            return Some(Token::Doctype(self.text[lt + 2..end].trim()));
        }
        if after.starts_with("<?") {
            // Processing instruction: skipped silently.
            self.pos = match after.find("?>") {
                Some(end) => lt + end + 2,
                None => bytes.len(),
            };
            return None;
        }

        if after.starts_with("</") {
            let nstart = lt + 2;
            let nend = name_end(bytes, nstart);
            let gt = memchr(b'>', &bytes[nend..]).map_or(bytes.len(), |rel| nend + rel);
            self.pos = (gt + 1).min(bytes.len());
            return Some(Token::StopTag {
                name: &self.text[nstart..nend],
            });
        }

        let nstart = lt + 1;
        let nend = name_end(bytes, nstart);
        if nend == nstart {
            // Bare '<' in content position; treat it as content text.
            self.pos = lt + 1;
            return Some(Token::Content("<"));
        }
        let gt = match find_tag_end(bytes, nend) {
            Some(gt) => gt,
            None => {
                warn!(target: "parse", "start tag without terminal '>'");
                self.pos = bytes.len();
                return None;
            }
        };
        self.pos = gt + 1;
        let name = &self.text[nstart..nend];
        let self_closing = bytes[gt - 1] == b'/';
        let attrs_end = if self_closing { gt - 1 } else { gt };
        let attrs = self.text[nend..attrs_end].trim();
        Some(if self_closing {
            Token::SelfTag { name, attrs }
        } else {
            Token::StartTag { name, attrs }
        })
    }
}

/// Find the `>` closing a start tag, honoring quoted attribute values.
fn find_tag_end(bytes: &[u8], from: usize) -> Option<usize> {
    let mut i = from;
    let mut quote = 0u8;
    while i < bytes.len() {
        let b = bytes[i];
        if quote != 0 {
            if b == quote {
                quote = 0;
            }
        } else if b == b'"' || b == b'\'' {
            quote = b;
        } else if b == b'>' {
            return Some(i);
        }
        i += 1;
    }
    None
}

/// Owned lexer event from the streaming variant, tagged with the 1-based
/// line number where the construct started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    StartTag { name: String, attrs: String, line: u64 },
    SelfTag { name: String, attrs: String, line: u64 },
    StopTag { name: String, line: u64 },
    Content { text: String, line: u64 },
    CData { text: String, line: u64 },
    Comment { text: String, line: u64 },
    Doctype { text: String, line: u64 },
    Closed,
}

/// Streaming tokenizer over a `BlockReader`, used by the format/verify/
/// filter passes. CDATA sections and comments may span refills; the scan
/// resumes at their stop marker after pulling more input.
pub struct StreamTokenizer<R: Read> {
    reader: BlockReader<R>,
    buf: String,
    pos: usize,
    line: u64,
    html_aware: bool,
    exhausted: bool,
}

impl<R: Read> StreamTokenizer<R> {
    pub fn new(reader: BlockReader<R>) -> Self {
        Self {
            reader,
            buf: String::new(),
            pos: 0,
            line: 1,
            html_aware: false,
            exhausted: false,
        }
    }

    pub fn with_html_aware(mut self, html_aware: bool) -> Self {
        self.html_aware = html_aware;
        self
    }

    fn refill(&mut self) -> Result<bool, SplitError> {
        // Drop consumed text first, counting the lines that scroll away.
        if self.pos > 0 {
            let mut cut = self.pos;
            while cut > 0 && !self.buf.is_char_boundary(cut) {
                cut -= 1;
            }
            self.line += self.buf[..cut].matches('\n').count() as u64;
            self.buf.drain(..cut);
            self.pos -= cut;
        }
        match self.reader.next_block()? {
            Some(block) => {
                self.buf.push_str(&block);
                Ok(true)
            }
            None => {
                self.exhausted = true;
                Ok(false)
            }
        }
    }

    fn line_at(&self, offset: usize) -> u64 {
        self.line + self.buf[..offset].matches('\n').count() as u64
    }

    /// Next event, pulling blocks as needed.
    pub fn next_event(&mut self) -> Result<StreamEvent, SplitError> {
        loop {
            // Leading whitespace carries no event; consume it up front so
            // line numbers attach to the construct itself.
            while self.pos < self.buf.len() && is_space_byte(self.buf.as_bytes()[self.pos]) {
                self.pos += 1;
            }

            // A construct is complete when the borrowing tokenizer can make
            // progress without running off the end of the buffer; pull more
            // input whenever the scan would stop exactly at the boundary.
            let needs_refill = {
                let remaining = &self.buf[self.pos..];
                remaining.is_empty() || construct_may_be_incomplete(remaining)
            };
            if needs_refill && !self.exhausted {
                self.refill()?;
                continue;
            }
            if self.pos >= self.buf.len() {
                return Ok(StreamEvent::Closed);
            }

            let start_line = self.line_at(self.pos);
            let (event, consumed) = {
                let remaining = &self.buf[self.pos..];
                let mut inner = if self.html_aware {
                    Tokenizer::html_aware(remaining)
                } else {
                    Tokenizer::new(remaining)
                };
                let tok = inner.next_token();
                (owned_event(tok, start_line), inner.pos.max(1))
            };
            self.pos += consumed;
            match event {
                Some(ev) => return Ok(ev),
                None => {
                    if self.exhausted && self.pos >= self.buf.len() {
                        return Ok(StreamEvent::Closed);
                    }
                }
            }
        }
    }
}

fn owned_event(tok: Token<'_>, line: u64) -> Option<StreamEvent> {
    match tok {
        Token::StartTag { name, attrs } => Some(StreamEvent::StartTag {
            name: name.to_string(),
            attrs: attrs.to_string(),
            line,
        }),
        Token::SelfTag { name, attrs } => Some(StreamEvent::SelfTag {
            name: name.to_string(),
            attrs: attrs.to_string(),
            line,
        }),
        Token::StopTag { name } => Some(StreamEvent::StopTag {
            name: name.to_string(),
            line,
        }),
        Token::Content(text) => Some(StreamEvent::Content {
            text: text.to_string(),
            line,
        }),
        Token::CData(text) => Some(StreamEvent::CData {
            text: text.to_string(),
            line,
        }),
        Token::Comment(text) => Some(StreamEvent::Comment {
            text: text.to_string(),
            line,
        }),
        Token::Doctype(text) => Some(StreamEvent::Doctype {
            text: text.to_string(),
            line,
        }),
        Token::Closed => None,
    }
}

/// Heuristic: the tail of the buffer may hold an unterminated construct
/// whose stop marker is still in flight (open CDATA/comment, a tag without
/// `>`, or a content run that might continue in the next block).
fn construct_may_be_incomplete(tail: &str) -> bool {
    match tail.rfind('<') {
        Some(lt) => {
            let after = &tail[lt..];
            if after.starts_with("<!--") {
                !after.contains("-->")
            } else if after.starts_with("<![CDATA[") {
                !after.contains("]]>")
            } else {
                !after.contains('>')
            }
        }
        // Pure content tail: the run could continue in the next block.
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_split::ReaderOptions;
    use std::io::Cursor;

    fn all_tokens(text: &str) -> Vec<Token<'_>> {
        let mut tk = Tokenizer::new(text);
        let mut out = Vec::new();
        loop {
            let t = tk.next_token();
            if t == Token::Closed {
                return out;
            }
            out.push(t);
        }
    }

    #[test]
    fn lexes_basic_record() {
        let toks = all_tokens("<A x=\"1\"><B>hi</B><C/></A>");
        assert_eq!(
            toks,
            vec![
                Token::StartTag { name: "A", attrs: "x=\"1\"" },
                Token::StartTag { name: "B", attrs: "" },
                Token::Content("hi"),
                Token::StopTag { name: "B" },
                Token::SelfTag { name: "C", attrs: "" },
                Token::StopTag { name: "A" },
            ]
        );
    }

    #[test]
    fn content_trailing_whitespace_is_trimmed() {
        let toks = all_tokens("<A>padded   \n</A>");
        assert_eq!(toks[1], Token::Content("padded"));
    }

    #[test]
    fn processing_instructions_are_silent() {
        let toks = all_tokens("<?xml version=\"1.0\"?><A>x</A>");
        assert_eq!(
            toks[0],
            Token::StartTag { name: "A", attrs: "" }
        );
    }

    #[test]
    fn cdata_comment_doctype_events() {
        let toks = all_tokens("<!DOCTYPE set><A><!-- note --><![CDATA[raw <>]]></A>");
        assert_eq!(toks[0], Token::Doctype("DOCTYPE set"));
        assert_eq!(toks[2], Token::Comment(" note "));
        assert_eq!(toks[3], Token::CData("raw <>"));
    }

    #[test]
    fn quoted_attribute_values_may_hold_gt() {
        let toks = all_tokens("<A note=\"5 > 3\">x</A>");
        assert_eq!(
            toks[0],
            Token::StartTag { name: "A", attrs: "note=\"5 > 3\"" }
        );
    }

    #[test]
    fn html_aware_keeps_inline_tags_in_content() {
        let mut tk = Tokenizer::html_aware("<T>the <i>gene</i> name</T>");
        assert_eq!(tk.next_token(), Token::StartTag { name: "T", attrs: "" });
        assert_eq!(tk.next_token(), Token::Content("the <i>gene</i> name"));
        assert_eq!(tk.next_token(), Token::StopTag { name: "T" });
    }

    #[test]
    fn streaming_variant_tracks_lines() {
        let xml = "<A>\n<B>one</B>\n<B>two</B>\n</A>";
        let reader = BlockReader::new(Cursor::new(xml), ReaderOptions::default());
        let mut st = StreamTokenizer::new(reader);
        let mut stops = Vec::new();
        loop {
            match st.next_event().unwrap() {
                StreamEvent::Closed => break,
                StreamEvent::StopTag { name, line } => stops.push((name, line)),
                _ => {}
            }
        }
        assert_eq!(
            stops,
            vec![
                ("B".to_string(), 2),
                ("B".to_string(), 3),
                ("A".to_string(), 4)
            ]
        );
    }
}
