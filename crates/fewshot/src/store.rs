use std::path::PathBuf;

use annot_core::{FewShotExample, write_json_atomic};
use uuid::Uuid;

use crate::error::Error;

/// A single JSON file holding every few-shot example, loaded into memory
/// and rewritten atomically on each mutation.
pub struct FewShotStore {
    path: PathBuf,
    examples: Vec<FewShotExample>,
}

impl FewShotStore {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, Error> {
        let path = path.into();
        let examples = if path.exists() {
            let contents = std::fs::read_to_string(&path).map_err(Error::Read)?;
            serde_json::from_str(&contents)?
        } else {
            Vec::new()
        };
        Ok(Self { path, examples })
    }

    pub fn all(&self) -> &[FewShotExample] {
        &self.examples
    }

    /// Examples matching a report type/field pair, optionally narrowed by
    /// tag.
    pub fn matching(&self, report_type: &str, field: &str, tag: Option<&str>) -> Vec<&FewShotExample> {
        self.examples
            .iter()
            .filter(|e| e.report_type == report_type && e.field == field)
            .filter(|e| tag.is_none_or(|t| e.tags.iter().any(|tag| tag == t)))
            .collect()
    }

    pub fn insert(&mut self, example: FewShotExample) -> Result<(), Error> {
        self.examples.push(example);
        self.persist()
    }

    pub fn update(&mut self, example: FewShotExample) -> Result<(), Error> {
        let slot = self.examples.iter_mut().find(|e| e.id == example.id).ok_or(Error::NotFound(example.id))?;
        *slot = example;
        self.persist()
    }

    pub fn delete(&mut self, id: Uuid) -> Result<(), Error> {
        let before = self.examples.len();
        self.examples.retain(|e| e.id != id);
        if self.examples.len() == before {
            return Err(Error::NotFound(id));
        }
        self.persist()
    }

    fn persist(&self) -> Result<(), Error> {
        write_json_atomic(&self.path, &self.examples)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn example(report_type: &str, field: &str, tags: &[&str]) -> FewShotExample {
        FewShotExample {
            id: Uuid::new_v4(),
            report_type: report_type.to_string(),
            field: field.to_string(),
            note_excerpt: "excerpt".to_string(),
            expected_output: "output".to_string(),
            tags: tags.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn insert_persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fewshot.json");

        let mut store = FewShotStore::load(&path).unwrap();
        store.insert(example("pathology", "histology", &["breast"])).unwrap();

        let reloaded = FewShotStore::load(&path).unwrap();
        assert_eq!(reloaded.all().len(), 1);
    }

    #[test]
    fn matching_filters_by_tag() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FewShotStore::load(dir.path().join("fewshot.json")).unwrap();
        store.insert(example("pathology", "histology", &["breast"])).unwrap();
        store.insert(example("pathology", "histology", &["lung"])).unwrap();

        assert_eq!(store.matching("pathology", "histology", Some("breast")).len(), 1);
        assert_eq!(store.matching("pathology", "histology", None).len(), 2);
    }

    #[test]
    fn delete_missing_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FewShotStore::load(dir.path().join("fewshot.json")).unwrap();
        assert!(store.delete(Uuid::new_v4()).is_err());
    }
}
