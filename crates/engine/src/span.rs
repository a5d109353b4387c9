use annot_core::EvidenceSpan;

/// Locates a quoted piece of evidence inside the source note text.
///
/// Tries an exact substring match first (byte offsets into `note_text`);
/// if the quote doesn't appear verbatim — the model paraphrased it, or
/// normalized whitespace differently — falls back to scanning
/// fixed-width windows of the note and keeping the one most similar to the
/// quote by normalized Levenshtein distance, returning `None` only when
/// nothing clears a minimal similarity floor. This is the single span
/// lookup every step of the engine that needs evidence grounding calls,
/// rather than each step reimplementing its own search.
pub fn find_evidence(note_text: &str, quote: &str) -> Option<EvidenceSpan> {
    let quote = quote.trim();
    if quote.is_empty() {
        return None;
    }

    if let Some(start) = note_text.find(quote) {
        return Some(EvidenceSpan { start, end: start + quote.len(), quote: quote.to_string() });
    }

    fuzzy_find(note_text, quote)
}

const MIN_SIMILARITY: f64 = 0.6;

fn fuzzy_find(note_text: &str, quote: &str) -> Option<EvidenceSpan> {
    let window = quote.chars().count().max(8);
    let chars: Vec<char> = note_text.chars().collect();
    if chars.len() < window {
        return None;
    }

    let mut best: Option<(f64, usize, usize)> = None;
    let step = (window / 4).max(1);
    let mut i = 0;
    while i + window <= chars.len() {
        let candidate: String = chars[i..i + window].iter().collect();
        let score = strsim::normalized_levenshtein(&candidate, quote);
        if best.is_none_or(|(best_score, _, _)| score > best_score) {
            best = Some((score, i, i + window));
        }
        i += step;
    }

    best.filter(|(score, _, _)| *score >= MIN_SIMILARITY).map(|(_, start_chars, end_chars)| {
        let start = chars[..start_chars].iter().collect::<String>().len();
        let end = chars[..end_chars].iter().collect::<String>().len();
        EvidenceSpan { start, end, quote: note_text[start..end].to_string() }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_exact_quote() {
        let note = "Patient has invasive ductal carcinoma of the left breast.";
        let span = find_evidence(note, "invasive ductal carcinoma").unwrap();
        assert_eq!(&note[span.start..span.end], "invasive ductal carcinoma");
    }

    #[test]
    fn finds_approximate_quote() {
        let note = "Biopsy shows invasive  ductal   carcinoma present.";
        let span = find_evidence(note, "invasive ductal carcinoma").unwrap();
        assert!(span.quote.to_lowercase().contains("ductal"));
    }

    #[test]
    fn returns_none_for_unrelated_quote() {
        let note = "No abnormalities detected in this specimen.";
        assert!(find_evidence(note, "metastatic carcinoma of the lung").is_none());
    }
}
