//! Unicode superscript/subscript handling.
//!
//! Two renderings: `Plain` maps each script codepoint to its ASCII
//! equivalent in place; `Mixed` wraps consecutive runs in `<sup>`/`<sub>`
//! spans so downstream markup-aware consumers keep the vertical offset.

use std::borrow::Cow;

/// Output rendering for mapped scripts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptShift {
    Plain,
    Mixed,
}

fn superscript_ascii(c: char) -> Option<char> {
    match c {
        '\u{00B9}' => Some('1'),
        '\u{00B2}' => Some('2'),
        '\u{00B3}' => Some('3'),
        '\u{2070}' => Some('0'),
        '\u{2071}' => Some('i'),
        '\u{2074}' => Some('4'),
        '\u{2075}' => Some('5'),
        '\u{2076}' => Some('6'),
        '\u{2077}' => Some('7'),
        '\u{2078}' => Some('8'),
        '\u{2079}' => Some('9'),
        '\u{207A}' => Some('+'),
        '\u{207B}' => Some('-'),
        '\u{207C}' => Some('='),
        '\u{207D}' => Some('('),
        '\u{207E}' => Some(')'),
        '\u{207F}' => Some('n'),
        _ => None,
    }
}

fn subscript_ascii(c: char) -> Option<char> {
    match c {
        '\u{2080}' => Some('0'),
        '\u{2081}' => Some('1'),
        '\u{2082}' => Some('2'),
        '\u{2083}' => Some('3'),
        '\u{2084}' => Some('4'),
        '\u{2085}' => Some('5'),
        '\u{2086}' => Some('6'),
        '\u{2087}' => Some('7'),
        '\u{2088}' => Some('8'),
        '\u{2089}' => Some('9'),
        '\u{208A}' => Some('+'),
        '\u{208B}' => Some('-'),
        '\u{208C}' => Some('='),
        '\u{208D}' => Some('('),
        '\u{208E}' => Some(')'),
        _ => None,
    }
}

#[derive(PartialEq, Clone, Copy)]
enum Run {
    None,
    Sup,
    Sub,
}

/// Map Unicode superscripts and subscripts per the requested rendering.
pub fn map_scripts(text: &str, shift: ScriptShift) -> Cow<'_, str> {
    if !text
        .chars()
        .any(|c| superscript_ascii(c).is_some() || subscript_ascii(c).is_some())
    {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len() + 16);
    let mut run = Run::None;
    for c in text.chars() {
        let (next, ascii) = if let Some(a) = superscript_ascii(c) {
            (Run::Sup, a)
        } else if let Some(a) = subscript_ascii(c) {
            (Run::Sub, a)
        } else {
            (Run::None, c)
        };
        if shift == ScriptShift::Mixed && next != run {
            match run {
                Run::Sup => out.push_str("</sup>"),
                Run::Sub => out.push_str("</sub>"),
                Run::None => {}
            }
            match next {
                Run::Sup => out.push_str("<sup>"),
                Run::Sub => out.push_str("<sub>"),
                Run::None => {}
            }
        }
        run = next;
        out.push(ascii);
    }
    if shift == ScriptShift::Mixed {
        match run {
            Run::Sup => out.push_str("</sup>"),
            Run::Sub => out.push_str("</sub>"),
            Run::None => {}
        }
    }
    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_maps_in_place() {
        assert_eq!(map_scripts("H₂O", ScriptShift::Plain), "H2O");
        assert_eq!(map_scripts("x²⁺", ScriptShift::Plain), "x2+");
    }

    #[test]
    fn mixed_wraps_runs() {
        assert_eq!(map_scripts("H₂O", ScriptShift::Mixed), "H<sub>2</sub>O");
        assert_eq!(
            map_scripts("Ca²⁺ and CO₃²⁻", ScriptShift::Mixed),
            "Ca<sup>2+</sup> and CO<sub>3</sub><sup>2-</sup>"
        );
    }

    #[test]
    fn untouched_text_borrows() {
        assert!(matches!(
            map_scripts("no scripts", ScriptShift::Mixed),
            Cow::Borrowed(_)
        ));
    }
}
