//! Word frequencies over aggregated lyrics.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Tokens shorter than this are dropped.
pub const MIN_TOKEN_LEN: usize = 3;

/// Filler and interjection words left out of the counts.
pub const STOPWORDS: &[&str] = &[
    "the", "and", "to", "of", "a", "i", "you", "it", "in", "me", "my", "that", "is", "be", "with",
    "for", "on", "not", "this", "are", "your", "at", "but", "have", "he", "she", "we", "they",
    "was", "all", "so", "do", "don", "what", "when", "why", "how", "just", "can", "like", "oh",
    "yeah", "uh", "gonna", "wanna", "gotta", "na", "cause", "em", "yo", "ll",
];

static STOPWORD_SET: Lazy<HashSet<&'static str>> = Lazy::new(|| STOPWORDS.iter().copied().collect());

static TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[a-z']+").unwrap());

/// Token counts for one batch. Iterates in token order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WordFrequencyMap {
    counts: BTreeMap<String, u64>,
}

impl WordFrequencyMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, token: &str) {
        *self.counts.entry(token.to_string()).or_insert(0) += 1;
    }

    pub fn get(&self, token: &str) -> u64 {
        self.counts.get(token).copied().unwrap_or(0)
    }

    /// Distinct tokens.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Sum of all counts.
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.counts.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// The `n` most frequent tokens, ties broken alphabetically.
    pub fn top(&self, n: usize) -> Vec<(&str, u64)> {
        let mut words: Vec<_> = self.iter().collect();
        words.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        words.truncate(n);
        words
    }
}

impl FromIterator<(String, u64)> for WordFrequencyMap {
    fn from_iter<T: IntoIterator<Item = (String, u64)>>(iter: T) -> Self {
        Self {
            counts: iter.into_iter().collect(),
        }
    }
}

/// Count words in `text`.
///
/// The text is lowercased and split into maximal runs of `[a-z']`; any other
/// character ends a token. Stopwords and tokens under three characters are
/// skipped.
pub fn analyze(text: &str) -> WordFrequencyMap {
    let lowered = text.to_lowercase();
    let mut freq = WordFrequencyMap::new();
    for token in TOKEN.find_iter(&lowered).map(|m| m.as_str()) {
        if token.chars().count() < MIN_TOKEN_LEN || STOPWORD_SET.contains(token) {
            continue;
        }
        freq.add(token);
    }
    freq
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, u64)]) -> WordFrequencyMap {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_basic_counts() {
        let freq = analyze("the cat sat on THE mat, the cat ran");
        assert_eq!(freq, map(&[("cat", 2), ("sat", 1), ("mat", 1), ("ran", 1)]));
    }

    #[test]
    fn test_digits_and_punctuation_split_tokens() {
        let freq = analyze("love2love;hate-hate don't");
        assert_eq!(freq.get("love"), 2);
        assert_eq!(freq.get("hate"), 2);
        assert_eq!(freq.get("don't"), 1);
        assert_eq!(freq.len(), 3);
    }

    #[test]
    fn test_apostrophe_only_tokens() {
        // Three apostrophes form a token of length 3; two do not.
        let freq = analyze("''' and ''");
        assert_eq!(freq.get("'''"), 1);
        assert_eq!(freq.get("''"), 0);
        assert_eq!(freq.len(), 1);
    }

    #[test]
    fn test_stopwords_and_fillers_removed() {
        let freq = analyze("Yeah yeah gonna wanna GOTTA cause baby");
        assert_eq!(freq, map(&[("baby", 1)]));
    }

    #[test]
    fn test_deterministic_and_top() {
        let text = "night night night light light fight sight";
        assert_eq!(analyze(text), analyze(text));

        let freq = analyze(text);
        assert_eq!(freq.total(), 7);
        assert_eq!(freq.top(3), vec![("night", 3), ("light", 2), ("fight", 1)]);
    }

    #[test]
    fn test_empty_text() {
        let freq = analyze("");
        assert!(freq.is_empty());
        assert_eq!(freq.total(), 0);
    }

    #[test]
    fn test_serializes_as_object() {
        let freq = analyze("cat cat dog");
        assert_eq!(serde_json::to_string(&freq).unwrap(), r#"{"cat":2,"dog":1}"#);
    }
}
