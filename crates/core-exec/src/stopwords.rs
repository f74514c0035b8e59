//! Fixed English stop-word set used by the PAIRS and INDICES operations.
//! Single-letter and single-punctuation tokens, common function words,
//! measurement units, and the literal "pmid" all break bigram chains and
//! stay out of the indexed term lists.

use std::collections::HashSet;
use std::sync::OnceLock;

const WORDS: &[&str] = &[
    "about", "again", "all", "almost", "also", "although", "always", "among", "an", "and",
    "another", "any", "are", "as", "at", "be", "because", "been", "before", "being", "between",
    "both", "but", "by", "can", "could", "did", "do", "does", "done", "due", "during", "each",
    "either", "enough", "especially", "etc", "for", "found", "from", "further", "had", "has",
    "have", "having", "here", "how", "however", "if", "in", "into", "is", "it", "its", "itself",
    "just", "kg", "km", "made", "mainly", "make", "may", "mg", "might", "ml", "mm", "most",
    "mostly", "must", "nearly", "neither", "no", "nor", "not", "obtained", "of", "often", "on",
    "our", "overall", "perhaps", "pmid", "quite", "rather", "really", "regarding", "seem",
    "seen", "several", "should", "show", "showed", "shown", "shows", "significantly", "since",
    "so", "some", "such", "than", "that", "the", "their", "theirs", "them", "then", "there",
    "therefore", "these", "they", "this", "those", "through", "thus", "to", "upon", "use",
    "used", "using", "various", "very", "was", "we", "were", "what", "when", "which", "while",
    "with", "within", "without", "would",
];

fn set() -> &'static HashSet<&'static str> {
    static SET: OnceLock<HashSet<&'static str>> = OnceLock::new();
    SET.get_or_init(|| WORDS.iter().copied().collect())
}

/// Is `word` (already lowercased) a stop word?
pub fn is_stop_word(word: &str) -> bool {
    if word.chars().count() <= 1 {
        return true;
    }
    set().contains(word)
}
