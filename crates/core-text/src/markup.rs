//! Inline HTML repair and removal for mixed-content fields.
//!
//! PubMed-style content embeds the inline set `i b u sub sup`, sometimes
//! literal, sometimes once- or twice-escaped by upstream tooling. `Strict`
//! deletes every form; `Mixed` repairs escaped forms back to literal tags.
//! Replacement tables are built once behind a one-shot guard and are
//! read-only afterwards.

use std::borrow::Cow;
use std::sync::OnceLock;

const INLINE_TAGS: &[&str] = &["i", "b", "u", "sub", "sup"];

/// What to do with inline markup found inside content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MarkupPolicy {
    /// Delete literal and escaped inline tags.
    Strict,
    /// Repair escaped inline tags back to literal form.
    Mixed,
    /// Leave content untouched.
    #[default]
    None,
}

fn forms(tag: &str) -> [(String, String, String); 3] {
    // (real, once-escaped, twice-escaped) for open / close / empty forms.
    [
        (
            format!("<{tag}>"),
            format!("&lt;{tag}&gt;"),
            format!("&amp;lt;{tag}&amp;gt;"),
        ),
        (
            format!("</{tag}>"),
            format!("&lt;/{tag}&gt;"),
            format!("&amp;lt;/{tag}&amp;gt;"),
        ),
        (
            format!("<{tag}/>"),
            format!("&lt;{tag}/&gt;"),
            format!("&amp;lt;{tag}/&amp;gt;"),
        ),
    ]
}

fn strip_table() -> &'static Vec<(String, String)> {
    static TABLE: OnceLock<Vec<(String, String)>> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut t = Vec::new();
        for tag in INLINE_TAGS {
            for (real, once, twice) in forms(tag) {
                // Deeper escapes first so their residue never re-forms a match.
                t.push((twice, String::new()));
                t.push((once, String::new()));
                t.push((real, String::new()));
            }
        }
        t.push(("&amp;amp;".to_string(), "&amp;".to_string()));
        t
    })
}

fn repair_table() -> &'static Vec<(String, String)> {
    static TABLE: OnceLock<Vec<(String, String)>> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut t = Vec::new();
        for tag in INLINE_TAGS {
            for (real, once, twice) in forms(tag) {
                t.push((twice, real.clone()));
                t.push((once, real));
            }
        }
        t.push(("&amp;amp;".to_string(), "&amp;".to_string()));
        t
    })
}

fn empty_pairs() -> &'static Vec<String> {
    static PAIRS: OnceLock<Vec<String>> = OnceLock::new();
    PAIRS.get_or_init(|| {
        INLINE_TAGS
            .iter()
            .map(|tag| format!("<{tag}></{tag}>"))
            .collect()
    })
}

fn apply(table: &[(String, String)], text: &str) -> Option<String> {
    if !table.iter().any(|(from, _)| text.contains(from.as_str())) {
        return None;
    }
    let mut out = text.to_string();
    for (from, to) in table {
        if out.contains(from.as_str()) {
            out = out.replace(from.as_str(), to);
        }
    }
    Some(out)
}

fn trim_trailing_empty_pairs(mut text: String) -> String {
    loop {
        let before = text.len();
        for pair in empty_pairs() {
            if let Some(stripped) = text.strip_suffix(pair.as_str()) {
                text = stripped.trim_end().to_string();
            }
        }
        if text.len() == before {
            return text;
        }
    }
}

/// Apply the markup policy to one content string.
pub fn repair_markup(text: &str, policy: MarkupPolicy) -> Cow<'_, str> {
    let table = match policy {
        MarkupPolicy::Strict => strip_table(),
        MarkupPolicy::Mixed => repair_table(),
        MarkupPolicy::None => return Cow::Borrowed(text),
    };
    match apply(table, text) {
        Some(replaced) => Cow::Owned(trim_trailing_empty_pairs(replaced)),
        None => {
            // Nothing to replace; a trailing empty pair may still need trimming.
            if empty_pairs().iter().any(|p| text.ends_with(p.as_str())) {
                Cow::Owned(trim_trailing_empty_pairs(text.to_string()))
            } else {
                Cow::Borrowed(text)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_deletes_all_forms() {
        let s = "x <i>alpha</i> &lt;b&gt;beta&lt;/b&gt; &amp;lt;sup&amp;gt;2&amp;lt;/sup&amp;gt;";
        assert_eq!(
            repair_markup(s, MarkupPolicy::Strict),
            "x alpha beta 2"
        );
    }

    #[test]
    fn mixed_repairs_escaped_forms() {
        assert_eq!(
            repair_markup("H&lt;sub&gt;2&lt;/sub&gt;O", MarkupPolicy::Mixed),
            "H<sub>2</sub>O"
        );
        assert_eq!(
            repair_markup("E = mc&amp;lt;sup&amp;gt;2&amp;lt;/sup&amp;gt;", MarkupPolicy::Mixed),
            "E = mc<sup>2</sup>"
        );
    }

    #[test]
    fn double_escaped_ampersand_collapses() {
        assert_eq!(
            repair_markup("AT&amp;amp;T", MarkupPolicy::Strict),
            "AT&amp;T"
        );
    }

    #[test]
    fn trailing_empty_pairs_trimmed() {
        assert_eq!(
            repair_markup("title <i></i>", MarkupPolicy::Mixed),
            "title"
        );
    }

    #[test]
    fn none_policy_is_a_no_op() {
        let s = "<i>kept</i>";
        assert!(matches!(
            repair_markup(s, MarkupPolicy::None),
            Cow::Borrowed(_)
        ));
    }

    #[test]
    fn repair_is_idempotent() {
        let once = repair_markup("a &lt;i&gt;b&lt;/i&gt; c", MarkupPolicy::Mixed).into_owned();
        assert_eq!(repair_markup(&once, MarkupPolicy::Mixed), once);
        let stripped = repair_markup("a <b>b</b> c", MarkupPolicy::Strict).into_owned();
        assert_eq!(repair_markup(&stripped, MarkupPolicy::Strict), stripped);
    }
}
