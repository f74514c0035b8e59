//! Identifier → directory path mapping.
//!
//! The identifier splits into an optional short alphabetic prefix (letters
//! only, at most 4; at most 6 when terminated by `_`, which is kept with
//! the prefix) and a remainder grouped into two-character directory
//! segments. Grouping stops at the first `.` (the version separator), and
//! a trailing odd character joins no segment. Everything is uppercased.
//!
//! `NP_060051.2` → `NP_/06/00/51`; `6301692` → `63/01/69`.

use crate::ArchiveError;
use std::path::PathBuf;

pub const MAX_IDENTIFIER: usize = 64;

fn split_prefix(ident: &str) -> (&str, &str) {
    let letters = ident
        .bytes()
        .take_while(|b| b.is_ascii_alphabetic())
        .count();
    if letters == 0 {
        return ("", ident);
    }
    let underscore = ident.as_bytes().get(letters) == Some(&b'_');
    if underscore && letters <= 6 {
        return ident.split_at(letters + 1);
    }
    if !underscore && letters <= 4 && letters < ident.len() {
        return ident.split_at(letters);
    }
    ("", ident)
}

/// Pure mapping from identifier to its relative trie directory.
pub fn trie_path(ident: &str) -> Result<PathBuf, ArchiveError> {
    if ident.is_empty() || ident.len() > MAX_IDENTIFIER {
        return Err(ArchiveError::BadIdentifier(ident.to_string()));
    }
    let upper = ident.to_ascii_uppercase();
    let (prefix, remainder) = split_prefix(&upper);
    let body = remainder.split('.').next().unwrap_or(remainder);

    let mut path = PathBuf::new();
    if !prefix.is_empty() {
        path.push(prefix);
    }
    let bytes = body.as_bytes();
    let mut i = 0;
    while i + 2 <= bytes.len() {
        path.push(&body[i..i + 2]);
        i += 2;
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn p(ident: &str) -> String {
        trie_path(ident).unwrap().to_string_lossy().into_owned()
    }

    #[test]
    fn versioned_accession_splits_prefix_and_pairs() {
        assert_eq!(p("NP_060051.2"), "NP_/06/00/51");
    }

    #[test]
    fn numeric_identifiers_pair_up() {
        assert_eq!(p("6301692"), "63/01/69");
        assert_eq!(p("12"), "12");
        assert_eq!(p("1"), "");
    }

    #[test]
    fn case_folds_upward() {
        assert_eq!(p("np_060051.2"), "NP_/06/00/51");
    }

    #[test]
    fn long_alphabetic_prefixes_stay_in_the_body() {
        // Five letters without an underscore exceed the prefix budget.
        assert_eq!(p("ABCDE12"), "AB/CD/E1");
        // Four letters split off.
        assert_eq!(p("ABCD12"), "ABCD/12");
        // Six letters with an underscore still split off; seven do not.
        assert_eq!(p("ABCDEF_12"), "ABCDEF_/12");
        assert_eq!(p("ABCDEFG_12"), "AB/CD/EF/G_/12");
    }

    #[test]
    fn oversized_identifiers_are_rejected() {
        assert!(trie_path(&"x".repeat(65)).is_err());
        assert!(trie_path("").is_err());
    }

    proptest! {
        #[test]
        fn path_is_pure_and_stable(id in "[A-Za-z0-9_.]{1,20}") {
            let a = trie_path(&id).unwrap();
            let b = trie_path(&id).unwrap();
            prop_assert_eq!(a, b);
        }

        #[test]
        fn distinct_same_shape_numeric_ids_map_to_distinct_files(a in 100000u64..999999, b in 100000u64..999999) {
            prop_assume!(a != b);
            let pa = trie_path(&a.to_string()).unwrap().join(a.to_string());
            let pb = trie_path(&b.to_string()).unwrap().join(b.to_string());
            prop_assert_ne!(pa, pb);
        }
    }
}
