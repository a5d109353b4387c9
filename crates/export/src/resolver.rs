use std::collections::HashMap;

/// Maps a core variable name to the coded category it draws values from.
/// A representative slice of the production table, covering one variable
/// per axis named in the data model; the full table is operational data
/// (a config file), not code, per `DESIGN.md`.
pub fn core_variable_to_category(core_variable: &str) -> Option<&'static str> {
    match core_variable {
        "Patient.sex" => Some("sex"),
        "Diagnosis.histologySubgroup" => Some("histology"),
        "Diagnosis.subsite" => Some("topography"),
        "Diagnosis.grading" => Some("grade"),
        "Surgery.surgeryType" => Some("surgery_type"),
        "SystemicTreatment.regimen" => Some("regimen"),
        "Radiotherapy.setting" => Some("radiotherapy_setting"),
        _ => None,
    }
}

fn normalize(value: &str) -> String {
    value.trim().to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ")
}

/// A resolved code's outcome: an id when something matched well enough,
/// the confidence that produced it, and which tier of the ladder fired.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub code_id: String,
    pub confidence: f64,
    pub method: &'static str,
}

/// One entry in a coded category's reverse index: a code id and its
/// human-readable label.
#[derive(Debug, Clone)]
pub struct CodeEntry {
    pub category: String,
    pub code_id: String,
    pub label: String,
}

/// Resolves free-text annotation values to coded ids within a category,
/// mirroring `CodeResolver` in the Python original: exact normalized match
/// (1.0), substring containment favoring the longest label (0.9), then
/// fuzzy string similarity (>= 0.75), falling back to an
/// `UNRESOLVED::<value>` sentinel.
pub struct CodeResolver {
    by_category: HashMap<String, Vec<(String, String)>>,
}

const FUZZY_THRESHOLD: f64 = 0.75;

impl CodeResolver {
    pub fn new(catalog: Vec<CodeEntry>) -> Self {
        let mut by_category: HashMap<String, Vec<(String, String)>> = HashMap::new();
        for entry in catalog {
            by_category.entry(entry.category).or_default().push((entry.code_id, normalize(&entry.label)));
        }
        Self { by_category }
    }

    pub fn resolve(&self, value: &str, core_variable: &str) -> Resolved {
        let Some(category) = core_variable_to_category(core_variable) else {
            return unresolved(value);
        };
        let Some(entries) = self.by_category.get(category) else {
            return unresolved(value);
        };

        let needle = normalize(value);

        if let Some((id, _)) = entries.iter().find(|(_, label)| *label == needle) {
            return Resolved { code_id: id.clone(), confidence: 1.0, method: "exact" };
        }

        let mut containment: Vec<&(String, String)> = entries.iter().filter(|(_, label)| needle.contains(label.as_str()) || label.contains(needle.as_str())).collect();
        containment.sort_by(|a, b| b.1.len().cmp(&a.1.len()));
        if let Some((id, _)) = containment.first() {
            return Resolved { code_id: id.clone(), confidence: 0.9, method: "contains" };
        }

        let mut best: Option<(&str, f64)> = None;
        for (id, label) in entries {
            let score = strsim::normalized_levenshtein(&needle, label);
            if best.is_none_or(|(_, best_score)| score > best_score) {
                best = Some((id, score));
            }
        }

        match best {
            Some((id, score)) if score >= FUZZY_THRESHOLD => Resolved { code_id: id.to_string(), confidence: score, method: "fuzzy" },
            _ => unresolved(value),
        }
    }
}

fn unresolved(value: &str) -> Resolved {
    Resolved { code_id: format!("UNRESOLVED::{value}"), confidence: 0.0, method: "unresolved" }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> CodeResolver {
        CodeResolver::new(vec![
            CodeEntry { category: "sex".into(), code_id: "M".into(), label: "Male".into() },
            CodeEntry { category: "sex".into(), code_id: "F".into(), label: "Female".into() },
            CodeEntry { category: "grade".into(), code_id: "G2".into(), label: "Moderately differentiated".into() },
        ])
    }

    #[test]
    fn exact_match() {
        let r = resolver().resolve("male", "Patient.sex");
        assert_eq!(r, Resolved { code_id: "M".into(), confidence: 1.0, method: "exact" });
    }

    #[test]
    fn containment_prefers_longest_label() {
        let r = resolver().resolve("moderately differentiated adenocarcinoma", "Diagnosis.grading");
        assert_eq!(r.code_id, "G2");
        assert_eq!(r.method, "contains");
    }

    #[test]
    fn fuzzy_match_above_threshold() {
        let r = resolver().resolve("femal", "Patient.sex");
        assert_eq!(r.code_id, "F");
        assert_eq!(r.method, "fuzzy");
    }

    #[test]
    fn unresolved_for_unknown_category() {
        let r = resolver().resolve("something", "Unmapped.variable");
        assert!(r.code_id.starts_with("UNRESOLVED::"));
    }
}
