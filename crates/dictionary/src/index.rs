use std::collections::HashMap;
use std::path::Path;

use annot_core::{ICDO3CodeInfo, UnifiedICDO3Code};

use crate::error::Error;
use crate::normalize::{normalize, tokenize};

#[derive(Debug, serde::Deserialize)]
struct Row {
    #[serde(rename = "Query")]
    query: String,
    #[serde(rename = "Morphology")]
    morphology: String,
    #[serde(rename = "Topography")]
    topography: String,
    #[serde(rename = "NAME")]
    name: String,
    #[serde(rename = "BEHAVIOR", default)]
    behavior: Option<String>,
    #[serde(rename = "GRADE", default)]
    grade: Option<String>,
}

/// In-memory ICD-O-3 code index, built once from a CSV export and then
/// queried read-only for the lifetime of the process, following
/// `ICDO3CSVIndexer` in the Python original.
#[derive(Debug, Default)]
pub struct DictionaryIndex {
    codes: Vec<ICDO3CodeInfo>,
    by_query: HashMap<String, usize>,
    by_morphology: HashMap<String, Vec<usize>>,
    by_topography: HashMap<String, Vec<usize>>,
    by_name_token: HashMap<String, Vec<usize>>,
}

impl DictionaryIndex {
    /// Loads the dictionary from a CSV file with at least `Query,Morphology,
    /// Topography,NAME` columns (`BEHAVIOR`/`GRADE` are read when present)
    /// and builds all four indexes.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let mut reader = csv::Reader::from_path(path)?;
        let mut index = DictionaryIndex::default();

        for (row_num, record) in reader.deserialize().enumerate() {
            let row: Row = record?;
            let info = ICDO3CodeInfo {
                query: row.query,
                morphology: row.morphology,
                topography: row.topography,
                name: row.name,
                behavior: row.behavior.filter(|b| !b.is_empty()),
                grade: row.grade.filter(|g| !g.is_empty()),
            };
            if info.query.is_empty() {
                return Err(Error::MissingColumn { row: row_num, column: "Query" });
            }
            index.insert(info);
        }

        Ok(index)
    }

    fn insert(&mut self, info: ICDO3CodeInfo) {
        let idx = self.codes.len();

        self.by_query.insert(normalize(&info.query), idx);
        if !info.morphology.is_empty() {
            self.by_morphology.entry(normalize(&info.morphology)).or_default().push(idx);
        }
        if !info.topography.is_empty() {
            self.by_topography.entry(normalize(&info.topography)).or_default().push(idx);
        }
        for token in tokenize(&info.name) {
            self.by_name_token.entry(token).or_default().push(idx);
        }

        self.codes.push(info);
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Exact lookup by the dictionary's primary `QUERY` key, the fast path
    /// `find_matching_code` takes before falling back to ranked search.
    pub fn find_exact(&self, query: &str) -> Option<&ICDO3CodeInfo> {
        self.by_query.get(&normalize(query)).map(|&idx| &self.codes[idx])
    }

    /// Free-text search over code names, scored by normalized edit
    /// distance, mirroring `search_by_text`.
    pub fn search_by_text(&self, text: &str, limit: usize) -> Vec<UnifiedICDO3Code> {
        let needle = normalize(text);
        let mut scored: Vec<(f64, usize)> = self
            .codes
            .iter()
            .enumerate()
            .map(|(idx, info)| (strsim::normalized_levenshtein(&needle, &normalize(&info.name)), idx))
            .filter(|(score, _)| *score > 0.0)
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap());
        scored
            .into_iter()
            .take(limit)
            .map(|(score, idx)| UnifiedICDO3Code {
                info: self.codes[idx].clone(),
                confidence: score * 0.6,
                method: "text_fuzzy".to_string(),
            })
            .collect()
    }

    /// Ranks candidates for a `(morphology, topography, free_text)` triple
    /// using the same five-tier cascade as `find_top_candidates`:
    /// exact QUERY match (1.0), morphology+topography combined (0.9),
    /// morphology-or-topography with a text boost (<=0.75), text-only fuzzy
    /// match (<=0.6), or nothing.
    pub fn resolve(&self, morphology: Option<&str>, topography: Option<&str>, free_text: Option<&str>) -> Vec<UnifiedICDO3Code> {
        if let (Some(m), Some(t)) = (morphology, topography)
            && let Some(query) = self.find_exact(&format!("{m}-{t}"))
        {
            return vec![UnifiedICDO3Code { info: query.clone(), confidence: 1.0, method: "exact".to_string() }];
        }

        let morph_matches = morphology.and_then(|m| self.by_morphology.get(&normalize(m))).cloned().unwrap_or_default();
        let topo_matches = topography.and_then(|t| self.by_topography.get(&normalize(t))).cloned().unwrap_or_default();

        let combined: Vec<usize> = morph_matches.iter().filter(|idx| topo_matches.contains(idx)).copied().collect();
        if !combined.is_empty() {
            return combined
                .into_iter()
                .map(|idx| UnifiedICDO3Code { info: self.codes[idx].clone(), confidence: 0.9, method: "combined".to_string() })
                .collect();
        }

        let mut single: Vec<UnifiedICDO3Code> = morph_matches
            .iter()
            .chain(topo_matches.iter())
            .map(|&idx| {
                let boost = free_text
                    .map(|text| strsim::normalized_levenshtein(&normalize(text), &normalize(&self.codes[idx].name)))
                    .unwrap_or(0.0);
                let confidence = (0.5 + boost * 0.25).min(0.75);
                UnifiedICDO3Code { info: self.codes[idx].clone(), confidence, method: "partial".to_string() }
            })
            .collect();

        if !single.is_empty() {
            single.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap());
            let mut seen = std::collections::HashSet::new();
            single.retain(|c| seen.insert(c.info.query.clone()));
            return single;
        }

        free_text.map(|text| self.search_by_text(text, 10)).unwrap_or_default()
    }

    /// Whether a morphology/topography pair co-occurs anywhere in the
    /// dictionary, mirroring `validate_combination`.
    pub fn validate_combination(&self, morphology: &str, topography: &str) -> bool {
        let m = normalize(morphology);
        let t = normalize(topography);
        self.by_morphology
            .get(&m)
            .map(|indices| indices.iter().any(|idx| self.by_topography.get(&t).is_some_and(|ts| ts.contains(idx))))
            .unwrap_or(false)
    }

    /// All topography values paired with a given morphology anywhere in the
    /// dictionary, mirroring `get_valid_topographies_for_morphology`.
    pub fn valid_topographies_for_morphology(&self, morphology: &str) -> Vec<String> {
        let indices = self.by_morphology.get(&normalize(morphology));
        let Some(indices) = indices else { return Vec::new() };
        let mut values: Vec<String> = indices.iter().map(|&idx| self.codes[idx].topography.clone()).collect();
        values.sort();
        values.dedup();
        values
    }

    /// All morphology values paired with a given topography anywhere in the
    /// dictionary, mirroring `get_valid_morphologies_for_topography`.
    pub fn valid_morphologies_for_topography(&self, topography: &str) -> Vec<String> {
        let indices = self.by_topography.get(&normalize(topography));
        let Some(indices) = indices else { return Vec::new() };
        let mut values: Vec<String> = indices.iter().map(|&idx| self.codes[idx].morphology.clone()).collect();
        values.sort();
        values.dedup();
        values
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample_csv() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "Query,Morphology,Topography,NAME,BEHAVIOR,GRADE").unwrap();
        writeln!(file, "8000/3-C50.9,8000/3,C50.9,Neoplasm malignant breast,3,").unwrap();
        writeln!(file, "8500/3-C50.9,8500/3,C50.9,Infiltrating duct carcinoma,3,2").unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn exact_match_scores_one() {
        let file = sample_csv();
        let index = DictionaryIndex::load(file.path()).unwrap();
        let results = index.resolve(Some("8000/3"), Some("C50.9"), None);
        assert_eq!(results[0].confidence, 1.0);
        assert_eq!(results[0].method, "exact");
    }

    #[test]
    fn unknown_combination_falls_back_to_text() {
        let file = sample_csv();
        let index = DictionaryIndex::load(file.path()).unwrap();
        let results = index.resolve(None, None, Some("infiltrating duct carcinoma"));
        assert!(!results.is_empty());
        assert!(results[0].confidence <= 0.6);
    }

    #[test]
    fn validates_known_combination() {
        let file = sample_csv();
        let index = DictionaryIndex::load(file.path()).unwrap();
        assert!(index.validate_combination("8000/3", "C50.9"));
        assert!(!index.validate_combination("8000/3", "C18.0"));
    }
}
