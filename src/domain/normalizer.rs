//! Title canonicalization for duplicate detection.
//!
//! Two stories about the same event from different outlets should collide on
//! the same key: outlet tags, trailing source names, punctuation, case and
//! spacing differences are all removed. [`normalize`] is pure and idempotent.

use std::collections::HashSet;

/// Tokens that carry no story identity ("breaking", wire-service markers).
const BOILERPLATE_TOKENS: &[&str] = &[
    "breaking",
    "exclusive",
    "update",
    "updated",
    "updates",
    "live",
    "속보",
    "단독",
    "종합",
    "1보",
    "2보",
    "3보",
    "특징주",
    "포토",
    "영상",
];

const SUFFIX_SEPARATORS: &[&str] = &[" - ", " | ", " – ", " — "];
const MAX_SUFFIX_WORDS: usize = 3;
const MAX_SUFFIX_CHARS: usize = 30;

/// Canonical dedup key for a raw news title.
pub fn normalize(raw_title: &str) -> String {
    let untagged = strip_bracket_tags(raw_title);
    let trimmed = strip_source_suffix(&untagged);
    let lowered = trimmed.to_lowercase();

    let spaced: String = lowered
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();

    spaced
        .split_whitespace()
        .filter(|token| !BOILERPLATE_TOKENS.contains(token))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Word-set Jaccard similarity of two already-normalized strings.
pub fn jaccard_similarity(a: &str, b: &str) -> f64 {
    let left: HashSet<&str> = a.split_whitespace().collect();
    let right: HashSet<&str> = b.split_whitespace().collect();
    if left.is_empty() || right.is_empty() {
        return 0.0;
    }
    let intersection = left.intersection(&right).count();
    let union = left.union(&right).count();
    intersection as f64 / union as f64
}

fn strip_bracket_tags(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut open: Option<(char, String)> = None;
    for c in input.chars() {
        match open.as_mut() {
            Some((end, _)) if c == *end => {
                open = None;
                out.push(' ');
            }
            Some((_, pending)) => pending.push(c),
            None => match c {
                '[' => open = Some((']', String::new())),
                '【' => open = Some(('】', String::new())),
                '<' => open = Some(('>', String::new())),
                '〈' => open = Some(('〉', String::new())),
                _ => out.push(c),
            },
        }
    }
    // An opener that never closes is punctuation, not a tag.
    if let Some((_, pending)) = open {
        out.push(' ');
        out.push_str(&strip_bracket_tags(&pending));
    }
    out
}

fn strip_source_suffix(input: &str) -> String {
    let cut = SUFFIX_SEPARATORS
        .iter()
        .filter_map(|sep| input.rfind(sep).map(|idx| (idx, sep.len())))
        .max_by_key(|(idx, _)| *idx);

    if let Some((idx, sep_len)) = cut {
        let head = input[..idx].trim();
        let tail = input[idx + sep_len..].trim();
        let words = tail.split_whitespace().count();
        if !head.is_empty()
            && words > 0
            && words <= MAX_SUFFIX_WORDS
            && tail.chars().count() <= MAX_SUFFIX_CHARS
        {
            return head.to_string();
        }
    }
    input.to_string()
}
