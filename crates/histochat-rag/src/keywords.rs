//! Question tokenization and keyword extraction for graph lookups.

use std::collections::HashSet;
use std::sync::LazyLock;

static STOPWORDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "a", "about", "after", "all", "also", "an", "and", "any", "are", "as", "at", "be",
        "been", "before", "but", "by", "can", "could", "did", "do", "does", "during", "for",
        "from", "had", "has", "have", "he", "her", "him", "his", "how", "i", "in", "into", "is",
        "it", "its", "me", "more", "most", "my", "of", "on", "or", "our", "she", "so", "some",
        "tell", "than", "that", "the", "their", "them", "then", "there", "these", "they", "this",
        "those", "to", "was", "were", "what", "when", "where", "which", "who", "whom", "whose",
        "why", "will", "with", "would", "you", "your", "please", "know", "explain", "describe",
    ]
    .into_iter()
    .collect()
});

/// Split text into lowercase alphanumeric words.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect()
}

/// Whether a token carries meaning for retrieval.
pub fn is_content_word(token: &str) -> bool {
    token.chars().count() >= 3 && !STOPWORDS.contains(token)
}

/// Extract distinct content words in order of first appearance.
pub fn extract_keywords(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    tokenize(text)
        .into_iter()
        .filter(|t| is_content_word(t))
        .filter(|t| seen.insert(t.clone()))
        .collect()
}
