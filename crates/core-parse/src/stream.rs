//! Streaming passes over token events: reformatting, structure reports,
//! and in-flight edits. None of these build a record tree; they run off
//! the `StreamTokenizer` so arbitrarily large inputs stay flat in memory.

use crate::token::{StreamEvent, StreamTokenizer};
use crate::ParseError;
use core_split::BlockReader;
use std::collections::BTreeSet;
use std::io::{Read, Write};

/// `-format` rendering styles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatMode {
    /// Verbatim block passthrough.
    Copy,
    /// No inter-tag whitespace; newline per top-level element.
    Compact,
    /// One construct per line, flush left.
    Flush,
    /// Two-space indentation; childless elements print on one line.
    Indent,
    /// Indentation with content always on its own line.
    Expand,
}

impl FormatMode {
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "copy" => Self::Copy,
            "compact" => Self::Compact,
            "flush" => Self::Flush,
            "indent" => Self::Indent,
            "expand" => Self::Expand,
            _ => return None,
        })
    }
}

fn open_tag(name: &str, attrs: &str) -> String {
    if attrs.is_empty() {
        format!("<{name}>")
    } else {
        format!("<{name} {attrs}>")
    }
}

fn self_tag(name: &str, attrs: &str) -> String {
    if attrs.is_empty() {
        format!("<{name}/>")
    } else {
        format!("<{name} {attrs}/>")
    }
}

/// Reformat a stream.
pub fn format<R: Read, W: Write>(
    mut reader: BlockReader<R>,
    mode: FormatMode,
    w: &mut W,
) -> Result<(), ParseError> {
    if mode == FormatMode::Copy {
        while let Some(block) = reader.next_block()? {
            w.write_all(block.as_bytes())?;
        }
        writeln!(w)?;
        return Ok(());
    }

    let mut tok = StreamTokenizer::new(reader);
    let mut depth = 0usize;
    // Held-back start tag so childless elements can print on one line.
    let mut pending: Option<(String, String)> = None;
    let mut pending_text: Option<String> = None;

    let indent = |w: &mut W, depth: usize| -> std::io::Result<()> {
        if mode == FormatMode::Indent || mode == FormatMode::Expand {
            for _ in 0..depth {
                w.write_all(b"  ")?;
            }
        }
        Ok(())
    };
    let eol = |w: &mut W, depth: usize| -> std::io::Result<()> {
        match mode {
            FormatMode::Compact => {
                if depth <= 1 {
                    writeln!(w)?;
                }
            }
            _ => writeln!(w)?,
        }
        Ok(())
    };

    loop {
        let event = tok.next_event()?;

        // A held start tag stays held for its first content run and its
        // matching stop tag (the one-line case); anything else flushes it
        // onto its own line first.
        let flush_pending = match &event {
            StreamEvent::StopTag { .. } => false,
            StreamEvent::Content { .. } => pending_text.is_some(),
            _ => true,
        };
        if flush_pending {
            if let Some((name, attrs)) = pending.take() {
                indent(w, depth)?;
                w.write_all(open_tag(&name, &attrs).as_bytes())?;
                eol(w, depth + 1)?;
                depth += 1;
                if let Some(text) = pending_text.take() {
                    indent(w, depth)?;
                    w.write_all(text.as_bytes())?;
                    eol(w, depth)?;
                }
            }
        }

        match event {
            StreamEvent::StartTag { name, attrs, .. } => {
                if mode == FormatMode::Indent {
                    pending = Some((name, attrs));
                } else {
                    indent(w, depth)?;
                    w.write_all(open_tag(&name, &attrs).as_bytes())?;
                    depth += 1;
                    eol(w, depth)?;
                }
            }
            StreamEvent::SelfTag { name, attrs, .. } => {
                indent(w, depth)?;
                w.write_all(self_tag(&name, &attrs).as_bytes())?;
                eol(w, depth)?;
            }
            StreamEvent::StopTag { name, .. } => {
                if let Some((open_name, attrs)) = pending.take() {
                    // Childless element: one line covers open, text, close.
                    indent(w, depth)?;
                    w.write_all(open_tag(&open_name, &attrs).as_bytes())?;
                    if let Some(text) = pending_text.take() {
                        w.write_all(text.as_bytes())?;
                    }
                    w.write_all(format!("</{name}>").as_bytes())?;
                    eol(w, depth)?;
                } else {
                    depth = depth.saturating_sub(1);
                    indent(w, depth)?;
                    w.write_all(format!("</{name}>").as_bytes())?;
                    eol(w, depth)?;
                }
            }
            StreamEvent::Content { text, .. } => {
                if mode == FormatMode::Indent && pending.is_some() {
                    pending_text = Some(text);
                } else {
                    indent(w, depth)?;
                    w.write_all(text.as_bytes())?;
                    eol(w, depth)?;
                }
            }
            StreamEvent::CData { text, .. } => {
                indent(w, depth)?;
                w.write_all(format!("<![CDATA[{text}]]>").as_bytes())?;
                eol(w, depth)?;
            }
            StreamEvent::Comment { text, .. } => {
                indent(w, depth)?;
                w.write_all(format!("<!--{text}-->").as_bytes())?;
                eol(w, depth)?;
            }
            StreamEvent::Doctype { text, .. } => {
                w.write_all(format!("<!{text}>").as_bytes())?;
                eol(w, depth)?;
            }
            StreamEvent::Closed => break,
        }
    }
    Ok(())
}

/// `-outline`: element nesting, names only.
pub fn outline<R: Read, W: Write>(reader: BlockReader<R>, w: &mut W) -> Result<(), ParseError> {
    let mut tok = StreamTokenizer::new(reader);
    let mut depth = 0usize;
    loop {
        match tok.next_event()? {
            StreamEvent::StartTag { name, .. } => {
                writeln!(w, "{}{}", "  ".repeat(depth), name)?;
                depth += 1;
            }
            StreamEvent::SelfTag { name, .. } => {
                writeln!(w, "{}{}", "  ".repeat(depth), name)?;
            }
            StreamEvent::StopTag { .. } => depth = depth.saturating_sub(1),
            StreamEvent::Closed => break,
            _ => {}
        }
    }
    Ok(())
}

/// `-synopsis`: unique element paths, sorted.
pub fn synopsis<R: Read, W: Write>(reader: BlockReader<R>, w: &mut W) -> Result<(), ParseError> {
    let mut tok = StreamTokenizer::new(reader);
    let mut stack: Vec<String> = Vec::new();
    let mut paths = BTreeSet::new();
    loop {
        match tok.next_event()? {
            StreamEvent::StartTag { name, .. } => {
                stack.push(name);
                paths.insert(stack.join("/"));
            }
            StreamEvent::SelfTag { name, .. } => {
                stack.push(name);
                paths.insert(stack.join("/"));
                stack.pop();
            }
            StreamEvent::StopTag { .. } => {
                stack.pop();
            }
            StreamEvent::Closed => break,
            _ => {}
        }
    }
    for path in paths {
        writeln!(w, "{path}")?;
    }
    Ok(())
}

/// `-verify` report: structural issues, one per line; with a pattern the
/// deepest nesting and longest record are reported as a trailer.
pub fn verify<R: Read, W: Write>(
    reader: BlockReader<R>,
    pattern: Option<&str>,
    w: &mut W,
) -> Result<usize, ParseError> {
    let mut tok = StreamTokenizer::new(reader);
    let mut stack: Vec<(String, u64)> = Vec::new();
    let mut issues = 0usize;

    let mut max_depth = 0usize;
    let mut max_depth_line = 0u64;
    let mut rec_start: Option<u64> = None;
    let mut longest_span = 0u64;
    let mut longest_line = 0u64;

    loop {
        match tok.next_event()? {
            StreamEvent::StartTag { name, line, .. } => {
                if let Some(p) = pattern {
                    if name == p && rec_start.is_none() {
                        rec_start = Some(line);
                    }
                }
                stack.push((name, line));
                if stack.len() > max_depth {
                    max_depth = stack.len();
                    max_depth_line = line;
                }
            }
            StreamEvent::StopTag { name, line } => match stack.pop() {
                Some((open, _)) if open == name => {
                    if let (Some(p), Some(start)) = (pattern, rec_start) {
                        if name == p {
                            let span = line.saturating_sub(start) + 1;
                            if span > longest_span {
                                longest_span = span;
                                longest_line = start;
                            }
                            rec_start = None;
                        }
                    }
                }
                Some((open, open_line)) => {
                    issues += 1;
                    writeln!(
                        w,
                        "line {line}: mismatched </{name}>, open <{open}> from line {open_line}"
                    )?;
                }
                None => {
                    issues += 1;
                    writeln!(w, "line {line}: unexpected </{name}>")?;
                }
            },
            StreamEvent::Content { text, line } => {
                for tag in ["i", "b", "u", "sub", "sup"] {
                    let opens = text.matches(&format!("<{tag}>")).count();
                    let closes = text.matches(&format!("</{tag}>")).count();
                    if opens != closes {
                        issues += 1;
                        writeln!(w, "line {line}: unbalanced inline <{tag}> markup")?;
                    }
                }
            }
            StreamEvent::Closed => break,
            _ => {}
        }
    }
    for (open, line) in &stack {
        issues += 1;
        writeln!(w, "line {line}: <{open}> never closed")?;
    }
    if pattern.is_some() {
        writeln!(w, "deepest nesting {max_depth} at line {max_depth_line}")?;
        writeln!(w, "longest record {longest_span} lines at line {longest_line}")?;
    }
    Ok(issues)
}

/// `-filter` edit actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterAction {
    Retain,
    Remove,
    Encode,
    Decode,
    Shrink,
    Expand,
    Accent,
}

impl FilterAction {
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "retain" => Self::Retain,
            "remove" => Self::Remove,
            "encode" => Self::Encode,
            "decode" => Self::Decode,
            "shrink" => Self::Shrink,
            "expand" => Self::Expand,
            "accent" => Self::Accent,
            _ => return None,
        })
    }
}

/// `-filter` target classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterObject {
    Object,
    CData,
    Comment,
    Content,
    Attributes,
    Container,
}

impl FilterObject {
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "object" => Self::Object,
            "cdata" => Self::CData,
            "comment" => Self::Comment,
            "content" => Self::Content,
            "attributes" => Self::Attributes,
            "container" => Self::Container,
            _ => return None,
        })
    }
}

fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

fn expand_content(text: &str) -> String {
    // Split precedence: '|', then ',', then whitespace.
    let pieces: Vec<&str> = if text.contains('|') {
        text.split('|').collect()
    } else if text.contains(',') {
        text.split(',').collect()
    } else {
        text.split_whitespace().collect()
    };
    pieces
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Streaming XML edit scoped to `pattern` subtrees.
pub fn filter<R: Read, W: Write>(
    reader: BlockReader<R>,
    pattern: &str,
    action: FilterAction,
    object: FilterObject,
    w: &mut W,
) -> Result<(), ParseError> {
    let mut tok = StreamTokenizer::new(reader);
    let mut inside = 0usize;

    let transform = |text: &str| -> String {
        match action {
            FilterAction::Encode => core_text::encode_markup(text).into_owned(),
            FilterAction::Decode => decode_entities(text),
            FilterAction::Shrink => core_text::compress_runs_of_spaces(text).into_owned(),
            FilterAction::Expand => expand_content(text),
            FilterAction::Accent => core_text::fold_accents(text).into_owned(),
            FilterAction::Retain | FilterAction::Remove => text.to_string(),
        }
    };

    loop {
        let event = tok.next_event()?;
        match event {
            StreamEvent::StartTag { name, attrs, .. } => {
                let entering = name == pattern && inside == 0;
                if entering || inside > 0 {
                    inside += 1;
                }
                let in_subtree = inside > 0;
                let is_container = entering;
                let drop_tag = in_subtree
                    && match (action, object) {
                        (FilterAction::Remove, FilterObject::Object) => true,
                        (FilterAction::Remove, FilterObject::Container) => is_container,
                        _ => false,
                    };
                let keep_outside =
                    !(action == FilterAction::Retain && object == FilterObject::Object);
                if drop_tag || (!in_subtree && !keep_outside) {
                    continue;
                }
                let attrs_out = if in_subtree
                    && action == FilterAction::Remove
                    && object == FilterObject::Attributes
                {
                    String::new()
                } else {
                    attrs
                };
                writeln!(w, "{}", open_tag(&name, &attrs_out))?;
            }
            StreamEvent::StopTag { name, .. } => {
                let in_subtree = inside > 0;
                let is_container = in_subtree && inside == 1;
                let drop_tag = in_subtree
                    && match (action, object) {
                        (FilterAction::Remove, FilterObject::Object) => true,
                        (FilterAction::Remove, FilterObject::Container) => is_container,
                        _ => false,
                    };
                let keep_outside =
                    !(action == FilterAction::Retain && object == FilterObject::Object);
                if inside > 0 {
                    inside -= 1;
                }
                if drop_tag || (!in_subtree && !keep_outside) {
                    continue;
                }
                writeln!(w, "</{name}>")?;
            }
            StreamEvent::SelfTag { name, attrs, .. } => {
                let in_subtree = inside > 0;
                if in_subtree && action == FilterAction::Remove && object == FilterObject::Object {
                    continue;
                }
                if !in_subtree && action == FilterAction::Retain && object == FilterObject::Object {
                    continue;
                }
                let attrs_out = if in_subtree
                    && action == FilterAction::Remove
                    && object == FilterObject::Attributes
                {
                    String::new()
                } else {
                    attrs
                };
                writeln!(w, "{}", self_tag(&name, &attrs_out))?;
            }
            StreamEvent::Content { text, .. } => {
                let in_subtree = inside > 0;
                if !in_subtree {
                    if !(action == FilterAction::Retain && object == FilterObject::Object) {
                        writeln!(w, "{text}")?;
                    }
                    continue;
                }
                match (action, object) {
                    (FilterAction::Remove, FilterObject::Content | FilterObject::Object) => {}
                    (FilterAction::Retain, FilterObject::Comment | FilterObject::CData) => {}
                    (_, FilterObject::Content | FilterObject::Object) => {
                        writeln!(w, "{}", transform(&text))?;
                    }
                    _ => writeln!(w, "{text}")?,
                }
            }
            StreamEvent::CData { text, .. } => {
                let in_subtree = inside > 0;
                if in_subtree {
                    match (action, object) {
                        (FilterAction::Remove, FilterObject::CData | FilterObject::Object) => {}
                        (_, FilterObject::CData) => {
                            writeln!(w, "<![CDATA[{}]]>", transform(&text))?;
                        }
                        _ => writeln!(w, "<![CDATA[{text}]]>")?,
                    }
                } else if !(action == FilterAction::Retain && object == FilterObject::Object) {
                    writeln!(w, "<![CDATA[{text}]]>")?;
                }
            }
            StreamEvent::Comment { text, .. } => {
                let in_subtree = inside > 0;
                let drop = in_subtree
                    && action == FilterAction::Remove
                    && matches!(object, FilterObject::Comment | FilterObject::Object);
                let drop_outside =
                    !in_subtree && action == FilterAction::Retain && object == FilterObject::Object;
                if !drop && !drop_outside {
                    writeln!(w, "<!--{text}-->")?;
                }
            }
            StreamEvent::Doctype { text, .. } => writeln!(w, "<!{text}>")?,
            StreamEvent::Closed => break,
        }
    }
    Ok(())
}
