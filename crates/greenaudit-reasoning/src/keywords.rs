//! Keyword pre-filter for cross-page verification.

/// Significant keywords of a claim: whitespace tokens stripped of surrounding
/// punctuation, at least `min_len` characters long, lower-cased and
/// deduplicated in order of first occurrence.
pub fn significant_keywords(text: &str, min_len: usize) -> Vec<String> {
    let mut keywords: Vec<String> = Vec::new();
    for token in text.split_whitespace() {
        let word = token.trim_matches(|c: char| !c.is_alphanumeric());
        if word.chars().count() < min_len {
            continue;
        }
        let word = word.to_lowercase();
        if !keywords.contains(&word) {
            keywords.push(word);
        }
    }
    keywords
}

/// Fraction of `keywords` that occur in `chunk_text` (case-insensitive
/// substring match). `0.0` for an empty keyword list.
pub fn keyword_overlap(keywords: &[String], chunk_text: &str) -> f64 {
    if keywords.is_empty() {
        return 0.0;
    }
    let haystack = chunk_text.to_lowercase();
    let hits = keywords
        .iter()
        .filter(|k| haystack.contains(k.as_str()))
        .count();
    hits as f64 / keywords.len() as f64
}
