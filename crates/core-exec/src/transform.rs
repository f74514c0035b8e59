//! Per-operation value transforms: selection, numeric aggregates, case
//! folds, and the tokenizing ops (TERMS / WORDS / PAIRS / LETTERS /
//! INDICES).

use crate::stopwords::is_stop_word;
use core_query::OpKind;
use unicode_segmentation::UnicodeSegmentation;

/// Apply `kind` to the raw values of one clause argument.
pub(crate) fn apply(kind: OpKind, values: Vec<String>, ordinal: u64) -> Vec<String> {
    match kind {
        OpKind::Element => values,
        OpKind::First => values.into_iter().take(1).collect(),
        OpKind::Last => {
            let len = values.len();
            values.into_iter().skip(len.saturating_sub(1)).collect()
        }
        OpKind::Num => vec![values.len().to_string()],
        OpKind::Len => vec![
            values
                .iter()
                .map(|v| v.chars().count())
                .sum::<usize>()
                .to_string(),
        ],
        // DEPTH values arrive pre-resolved as depths by the caller.
        OpKind::Depth => values,
        OpKind::Index => vec![ordinal.to_string()],
        OpKind::Inc => shift(values, 1),
        OpKind::Dec => shift(values, -1),
        OpKind::Sum => aggregate(values, |nums| Some(nums.iter().sum::<i64>())),
        OpKind::Min => aggregate(values, |nums| nums.iter().min().copied()),
        OpKind::Max => aggregate(values, |nums| nums.iter().max().copied()),
        OpKind::Avg => aggregate(values, |nums| {
            Some(nums.iter().sum::<i64>() / nums.len() as i64)
        }),
        OpKind::Sub => {
            let nums = numeric(&values);
            if nums.len() == 2 {
                vec![(nums[0] - nums[1]).to_string()]
            } else {
                Vec::new()
            }
        }
        OpKind::Dev => deviation(&values),
        OpKind::Encode => values
            .iter()
            .map(|v| core_text::encode_markup(v).into_owned())
            .collect(),
        OpKind::Upper => values.iter().map(|v| v.to_uppercase()).collect(),
        OpKind::Lower => values.iter().map(|v| v.to_lowercase()).collect(),
        OpKind::Title => values.iter().map(|v| title_case(v)).collect(),
        OpKind::Terms => values.iter().flat_map(|v| terms(v)).collect(),
        OpKind::Words => values.iter().flat_map(|v| words(v)).collect(),
        OpKind::Pairs => values.iter().flat_map(|v| pairs(v)).collect(),
        OpKind::Letters => values
            .iter()
            .flat_map(|v| v.chars().map(|c| c.to_string()))
            .collect(),
        OpKind::Indices => indices(&values),
        // Customization and variable kinds never reach the transform.
        _ => values,
    }
}

fn numeric(values: &[String]) -> Vec<i64> {
    values
        .iter()
        .filter_map(|v| v.trim().parse::<i64>().ok())
        .collect()
}

fn shift(values: Vec<String>, delta: i64) -> Vec<String> {
    values
        .iter()
        .filter_map(|v| v.trim().parse::<i64>().ok())
        .map(|n| (n + delta).to_string())
        .collect()
}

fn aggregate(values: Vec<String>, f: impl Fn(&[i64]) -> Option<i64>) -> Vec<String> {
    let nums = numeric(&values);
    if nums.is_empty() {
        return Vec::new();
    }
    f(&nums).map(|n| vec![n.to_string()]).unwrap_or_default()
}

/// One-pass Welford standard deviation over the numeric values; needs at
/// least two samples.
fn deviation(values: &[String]) -> Vec<String> {
    let nums = numeric(values);
    if nums.len() < 2 {
        return Vec::new();
    }
    let mut mean = 0.0f64;
    let mut m2 = 0.0f64;
    for (i, n) in nums.iter().enumerate() {
        let x = *n as f64;
        let delta = x - mean;
        mean += delta / (i as f64 + 1.0);
        m2 += delta * (x - mean);
    }
    let dev = (m2 / (nums.len() as f64 - 1.0)).sqrt();
    vec![format!("{}", dev.round() as i64)]
}

fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Whitespace tokens with trailing sentence punctuation trimmed.
fn terms(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|t| t.trim_end_matches(['.', ',', ':', ';']))
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
        .collect()
}

/// Lowercased alphanumeric word tokens.
fn words(text: &str) -> Vec<String> {
    text.unicode_words()
        .map(|w| w.to_lowercase())
        .filter(|w| !w.is_empty())
        .collect()
}

/// Adjacent non-stopword bigrams; a stop word breaks the chain.
fn pairs(text: &str) -> Vec<String> {
    let words = words(text);
    let mut out = Vec::new();
    for pair in words.windows(2) {
        if is_stop_word(&pair[0]) || is_stop_word(&pair[1]) {
            continue;
        }
        out.push(format!("{} {}", pair[0], pair[1]));
    }
    out
}

/// Sorted, de-duplicated single terms and bigrams, each wrapped in its
/// index tag. Callers wrap the whole run in a container via `-lbl`.
fn indices(values: &[String]) -> Vec<String> {
    let mut singles: Vec<String> = values
        .iter()
        .flat_map(|v| words(v))
        .filter(|w| !is_stop_word(w))
        .collect();
    singles.sort();
    singles.dedup();
    let mut bigrams: Vec<String> = values.iter().flat_map(|v| pairs(v)).collect();
    bigrams.sort();
    bigrams.dedup();

    let mut out = Vec::with_capacity(singles.len() + bigrams.len());
    out.extend(singles.into_iter().map(|t| format!("<NORM>{t}</NORM>")));
    out.extend(bigrams.into_iter().map(|p| format!("<PAIR>{p}</PAIR>")));
    out
}
