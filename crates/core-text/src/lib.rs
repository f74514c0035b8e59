//! Text normalization passes applied to record content.
//!
//! Contract:
//! - Every pass is a pure `&str -> Cow<str>` (or `&str`) function with no
//!   shared state; callers compose them in whatever order a mode requires.
//! - Every pass is idempotent: `f(f(x)) == f(x)`. Tests pin this for the
//!   passes that run more than once along some paths (accent fold, markup
//!   repair, punctuation trim).
//! - Passes never log content; diagnostics stay with the callers.

use std::borrow::Cow;

pub mod accent;
pub mod markup;
pub mod scripts;

pub use accent::fold_accents;
pub use markup::{MarkupPolicy, repair_markup};
pub use scripts::{ScriptShift, map_scripts};

/// Collapse every run of ASCII/Unicode whitespace to a single space.
///
/// Leading and trailing runs collapse to one space as well; record-level
/// callers trim afterwards when the context calls for it.
pub fn compress_runs_of_spaces(text: &str) -> Cow<'_, str> {
    if !text.chars().any(|c| c.is_whitespace() && c != ' ') && !text.contains("  ") {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len());
    let mut in_run = false;
    for c in text.chars() {
        if c.is_whitespace() {
            if !in_run {
                out.push(' ');
                in_run = true;
            }
        } else {
            out.push(c);
            in_run = false;
        }
    }
    Cow::Owned(out)
}

/// Map any whitespace codepoint (NBSP, ideographic space, tabs, …) to an
/// ASCII space without collapsing runs.
pub fn cleanup_bad_spaces(text: &str) -> Cow<'_, str> {
    if !text.chars().any(|c| c.is_whitespace() && c != ' ') {
        return Cow::Borrowed(text);
    }
    Cow::Owned(
        text.chars()
            .map(|c| if c.is_whitespace() { ' ' } else { c })
            .collect(),
    )
}

/// Replace every codepoint above 127 with its `&#xHHHH;` numeric reference.
pub fn ascii_escape(text: &str) -> Cow<'_, str> {
    if text.is_ascii() {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        if (c as u32) < 128 {
            out.push(c);
        } else {
            out.push_str(&format!("&#x{:04X};", c as u32));
        }
    }
    Cow::Owned(out)
}

/// HTML-escape the five reserved characters.
pub fn encode_markup(text: &str) -> Cow<'_, str> {
    if !text.contains(['<', '>', '&', '"', '\'']) {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    Cow::Owned(out)
}

fn unbalanced_flanks(text: &str, open: char, close: char) -> (bool, bool) {
    let opens = text.matches(open).count();
    let closes = text.matches(close).count();
    // (strip a leading open?, strip a trailing close?)
    (
        text.starts_with(open) && opens > closes,
        text.ends_with(close) && closes > opens,
    )
}

/// Iteratively strip leading/trailing `.,:;='"` and unmatched flanking
/// parentheses or brackets until the string stops changing.
pub fn trim_punctuation(text: &str) -> &str {
    const FLANK: &[char] = &['.', ',', ':', ';', '=', '\'', '"'];
    let mut cur = text;
    loop {
        let mut next = cur.trim_matches(FLANK);
        let (lead_paren, trail_paren) = unbalanced_flanks(next, '(', ')');
        if lead_paren {
            next = &next[1..];
        }
        if trail_paren {
            next = &next[..next.len() - 1];
        }
        let (lead_brack, trail_brack) = unbalanced_flanks(next, '[', ']');
        if lead_brack {
            next = &next[1..];
        }
        if trail_brack {
            next = &next[..next.len() - 1];
        }
        if next == cur {
            return cur;
        }
        cur = next;
    }
}
