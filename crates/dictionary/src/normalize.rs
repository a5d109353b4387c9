/// Uppercases and strips punctuation the way the Python indexer's
/// `_normalize` helper does, so lookups are insensitive to case and minor
/// formatting differences in the source CSV.
pub fn normalize(value: &str) -> String {
    value
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .to_uppercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Splits a normalized name into tokens for the by-name-token index.
pub fn tokenize(value: &str) -> Vec<String> {
    normalize(value).split(' ').filter(|s| !s.is_empty()).map(String::from).collect()
}
