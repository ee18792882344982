use std::collections::HashSet;

/// Function words ignored on both sides of a keyword comparison.
pub const STOPWORDS: &[&str] = &[
    "a", "an", "the", "and", "or", "but", "of", "in", "on", "at", "to", "for", "with", "by", "from",
    "up", "down", "into", "onto", "over", "under", "near", "next", "off", "out", "as", "is", "are",
    "was", "were", "be", "been", "being", "it", "its", "this", "that", "these", "those", "there",
    "here", "some", "very", "his", "her", "their", "he", "she", "they", "them", "while", "has",
    "have", "had", "which", "who",
];

fn is_stopword(word: &str) -> bool { STOPWORDS.contains(&word) }

/// Lowercased alphanumeric word tokens with stopwords removed.
pub fn clean_words(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .filter(|w| !is_stopword(w))
        .collect()
}
