use std::sync::LazyLock;

use regex::Regex;

/// Canonical value substituted for any recognized way of saying "the note
/// doesn't mention this field", mirroring `STANDARD_ABSENCE_INDICATOR`.
pub const STANDARD_ABSENCE_INDICATOR: &str = "Not applicable";

static ABSENCE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)^not applicable$",
        r"(?i)^n/?a$",
        r"(?i)^not (mentioned|stated|specified|reported|documented|available|found)$",
        r"(?i)^no (information|data|mention) (available|found)$",
        r"(?i)^none( (mentioned|stated|reported))?$",
        r"(?i)^unknown$",
        r"(?i)^absent$",
        r"(?i)^--+$",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// Rewrites any of the absence-indicating phrasings a model might produce
/// into [`STANDARD_ABSENCE_INDICATOR`], mirroring
/// `normalize_absence_indicator`.
pub fn normalize_absence_indicator(value: &str) -> String {
    let trimmed = value.trim();
    if ABSENCE_PATTERNS.iter().any(|pattern| pattern.is_match(trimmed)) {
        STANDARD_ABSENCE_INDICATOR.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Splits a `"Label: value"` style line into its label and value, the way
/// `_extract_label` does. Only treats the prefix as a label when it's short
/// and contains no sentence-ending punctuation, so an ordinary sentence
/// with a colon in it (e.g. a ratio "3:1") isn't misread as a label.
pub fn extract_label(raw: &str) -> (Option<&str>, &str) {
    match raw.split_once(':') {
        Some((label, rest)) => {
            let label = label.trim();
            let looks_like_label = !label.is_empty()
                && label.len() <= 40
                && label.chars().all(|c| c.is_alphabetic() || c.is_whitespace() || c == '-')
                && !rest.trim().is_empty();
            if looks_like_label { (Some(label), rest.trim()) } else { (None, raw.trim()) }
        }
        None => (None, raw.trim()),
    }
}

/// Full post-processing pass on a raw model value: strips a leading label
/// if present, then normalizes absence phrasing, mirroring
/// `normalize_annotation_output`.
pub fn normalize_annotation_output(raw: &str) -> String {
    let (_, value) = extract_label(raw);
    normalize_absence_indicator(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_known_absence_phrasings() {
        assert_eq!(normalize_absence_indicator("not mentioned"), STANDARD_ABSENCE_INDICATOR);
        assert_eq!(normalize_absence_indicator("N/A"), STANDARD_ABSENCE_INDICATOR);
        assert_eq!(normalize_absence_indicator("unknown"), STANDARD_ABSENCE_INDICATOR);
    }

    #[test]
    fn leaves_real_values_alone() {
        assert_eq!(normalize_absence_indicator("ductal carcinoma"), "ductal carcinoma");
    }

    #[test]
    fn extracts_label_prefix() {
        assert_eq!(extract_label("Histology: ductal carcinoma"), (Some("Histology"), "ductal carcinoma"));
    }

    #[test]
    fn does_not_mistake_ratio_for_label() {
        assert_eq!(extract_label("Gleason score 3:1 reported."), (None, "Gleason score 3:1 reported."));
    }

    #[test]
    fn full_pipeline_strips_label_and_normalizes_absence() {
        assert_eq!(normalize_annotation_output("Histology: not stated"), STANDARD_ABSENCE_INDICATOR);
    }
}
