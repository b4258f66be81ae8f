//! Text helpers shared by the matcher, writer and quality checker.

use std::collections::HashSet;

use once_cell::sync::Lazy;

static STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "about", "after", "also", "been", "both", "from", "have", "into", "more", "most", "over",
        "such", "than", "that", "their", "them", "then", "there", "these", "they", "this", "those",
        "through", "very", "were", "what", "when", "where", "which", "while", "with", "within",
        "would", "your", "company", "team", "teams", "work", "years",
    ]
    .into_iter()
    .collect()
});

/// Case-insensitive phrase search that only matches on word boundaries.
///
/// Boundaries are non-alphanumeric characters, so `"c++"` and `"node.js"`
/// work as needles while `"hey"` does not match inside `"they"`.
pub fn contains_phrase(haystack: &str, needle: &str) -> bool {
    let needle = needle.trim().to_lowercase();
    if needle.is_empty() {
        return false;
    }
    let haystack = haystack.to_lowercase();

    let mut from = 0;
    while let Some(pos) = haystack[from..].find(&needle) {
        let start = from + pos;
        let end = start + needle.len();
        let before_ok = haystack[..start]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphanumeric());
        let after_ok = haystack[end..]
            .chars()
            .next()
            .map_or(true, |c| !c.is_alphanumeric());
        if before_ok && after_ok {
            return true;
        }
        from = start + needle.chars().next().map_or(1, char::len_utf8);
    }
    false
}

/// Lowercased content words of at least four letters, minus stop words.
pub fn keywords(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= 4)
        .map(str::to_lowercase)
        .filter(|w| !STOP_WORDS.contains(w.as_str()))
        .collect()
}

/// Whitespace-separated word count.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}
