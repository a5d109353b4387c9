use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::time::SystemTime;

use annot_core::{EvaluationMode, Note, Session, UnifiedICDO3Code, write_json_atomic};
use uuid::Uuid;

use crate::error::Error;

struct Cached {
    mtime: SystemTime,
    session: Session,
}

/// Per-session JSON file store under `<root>/<id>.json`, with an in-memory
/// cache invalidated by comparing the cached entry's mtime against the
/// file's current mtime, the same pattern as the prompt library's cache.
pub struct SessionStore {
    root: PathBuf,
    cache: HashMap<Uuid, Cached>,
}

impl SessionStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), cache: HashMap::new() }
    }

    fn path(&self, id: Uuid) -> PathBuf {
        self.root.join(format!("{id}.json"))
    }

    /// Creates a session from an uploaded list of notes. `evaluation_mode`
    /// is not a caller choice: it's `Evaluation` the moment any note
    /// carries a gold-annotation column, `Validation` otherwise. When a
    /// `report_type_mapping` is supplied, `prompt_types` is recomputed as
    /// the union of its values rather than trusted verbatim.
    pub fn create(
        &mut self,
        name: String,
        description: Option<String>,
        notes: Vec<Note>,
        prompt_types: Vec<String>,
        report_type_mapping: Option<HashMap<String, Vec<String>>>,
    ) -> Result<Session, Error> {
        let evaluation_mode = if notes.iter().any(|note| note.gold_annotations.is_some()) { EvaluationMode::Evaluation } else { EvaluationMode::Validation };
        let prompt_types = report_type_mapping.as_ref().map(union_of_mapping).unwrap_or(prompt_types);
        if prompt_types.is_empty() {
            return Err(Error::EmptyPromptTypes(Uuid::nil()));
        }

        let now = jiff::Timestamp::now();
        let session = Session {
            id: Uuid::new_v4(),
            name,
            description,
            evaluation_mode,
            notes,
            prompt_types,
            report_type_mapping,
            results: Vec::new(),
            unified_icdo3_codes: HashMap::new(),
            corrections: HashMap::new(),
            created_at: now,
            updated_at: now,
        };
        self.save(&session)?;
        Ok(session)
    }

    /// Renames the session and/or replaces its report-type mapping. A new
    /// mapping recomputes `prompt_types` as the union of its values and
    /// prunes every annotation whose prompt is no longer allowed for its
    /// note's report type, per the session invariant.
    pub fn patch(&mut self, id: Uuid, name: Option<String>, report_type_mapping: Option<HashMap<String, Vec<String>>>) -> Result<Session, Error> {
        let mut session = self.get(id)?;
        if let Some(name) = name {
            session.name = name;
        }
        if let Some(mapping) = report_type_mapping {
            let report_type_of: HashMap<String, String> = session.notes.iter().map(|n| (n.note_id.clone(), n.report_type.clone())).collect();
            session.results.retain(|result| {
                report_type_of.get(&result.note_id).and_then(|report_type| mapping.get(report_type)).is_some_and(|allowed| allowed.contains(&result.prompt_type()))
            });
            session.prompt_types = union_of_mapping(&mapping);
            session.report_type_mapping = Some(mapping);
        }
        session.updated_at = jiff::Timestamp::now();
        self.save(&session)?;
        Ok(session)
    }

    /// Adds `add` and removes `remove` from the session's active prompt
    /// types, cascading the removal to every annotation produced under a
    /// removed prompt type and rejecting the change if it would leave the
    /// session with none.
    pub fn update_prompt_types(&mut self, id: Uuid, add: &[String], remove: &[String]) -> Result<Session, Error> {
        let mut session = self.get(id)?;
        session.prompt_types.retain(|pt| !remove.contains(pt));
        for pt in add {
            if !session.prompt_types.contains(pt) {
                session.prompt_types.push(pt.clone());
            }
        }
        if session.prompt_types.is_empty() {
            return Err(Error::EmptyPromptTypes(id));
        }
        session.results.retain(|result| !remove.contains(&result.prompt_type()));
        session.updated_at = jiff::Timestamp::now();
        self.save(&session)?;
        Ok(session)
    }

    pub fn delete(&mut self, id: Uuid) -> Result<(), Error> {
        std::fs::remove_file(self.path(id)).map_err(Error::Read)?;
        self.cache.remove(&id);
        Ok(())
    }

    /// Every session under the store root, most recently updated first.
    pub fn list(&mut self) -> Result<Vec<Session>, Error> {
        let mut ids = Vec::new();
        if self.root.exists() {
            for entry in std::fs::read_dir(&self.root).map_err(Error::Read)? {
                let entry = entry.map_err(Error::Read)?;
                if let Some(id) = entry.path().file_stem().and_then(|s| s.to_str()).and_then(|s| s.parse::<Uuid>().ok()) {
                    ids.push(id);
                }
            }
        }
        let mut sessions: Vec<Session> = ids.into_iter().map(|id| self.get(id)).collect::<Result<_, _>>()?;
        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(sessions)
    }

    /// Loads a session, migrating pre-evaluation-mode files in place: a
    /// session saved before `evaluation_mode` existed defaults the field to
    /// `Validation` on parse, so any such file whose notes carry gold
    /// annotations is flipped to `Evaluation` and rewritten here.
    pub fn get(&mut self, id: Uuid) -> Result<Session, Error> {
        let path = self.path(id);
        let mtime = std::fs::metadata(&path).map_err(Error::Read)?.modified().unwrap_or(SystemTime::UNIX_EPOCH);

        let stale = self.cache.get(&id).is_none_or(|cached| cached.mtime < mtime);
        if stale {
            let contents = std::fs::read_to_string(&path).map_err(Error::Read)?;
            let mut session: Session = serde_json::from_str(&contents)?;
            if session.evaluation_mode == EvaluationMode::Validation && session.notes.iter().any(|note| note.gold_annotations.is_some()) {
                session.evaluation_mode = EvaluationMode::Evaluation;
                self.save(&session)?;
                return Ok(session);
            }
            self.cache.insert(id, Cached { mtime, session: session.clone() });
            return Ok(session);
        }

        Ok(self.cache.get(&id).expect("checked above").session.clone())
    }

    pub fn save(&mut self, session: &Session) -> Result<(), Error> {
        std::fs::create_dir_all(&self.root).map_err(Error::Read)?;
        write_json_atomic(&self.path(session.id), session)?;
        let mtime = std::fs::metadata(self.path(session.id)).map_err(Error::Read)?.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        self.cache.insert(session.id, Cached { mtime, session: session.clone() });
        Ok(())
    }

    /// Records a human correction for `field_key` (conventionally
    /// `"<note_id>/<report_type>/<field>"`).
    pub fn record_correction(&mut self, id: Uuid, field_key: &str, value: String) -> Result<Session, Error> {
        let mut session = self.get(id)?;
        session.corrections.insert(field_key.to_string(), value);
        session.updated_at = jiff::Timestamp::now();
        self.save(&session)?;
        Ok(session)
    }

    /// Records a user-selected ICD-O-3 candidate on the annotation for
    /// `(note_id, report_type, field)`.
    pub fn record_candidate(&mut self, id: Uuid, note_id: &str, report_type: &str, field: &str, candidate: UnifiedICDO3Code) -> Result<Session, Error> {
        let mut session = self.get(id)?;
        let result = session
            .results
            .iter_mut()
            .find(|r| r.note_id == note_id && r.report_type == report_type && r.field == field)
            .ok_or(Error::NotFound(id))?;
        result.code = Some(candidate);
        session.updated_at = jiff::Timestamp::now();
        self.save(&session)?;
        Ok(session)
    }

    /// Saves a unified histology+topography diagnosis code for one note,
    /// owned by the session per the ownership rule in the data model.
    pub fn save_unified_code(&mut self, id: Uuid, note_id: &str, code: UnifiedICDO3Code) -> Result<Session, Error> {
        let mut session = self.get(id)?;
        session.unified_icdo3_codes.insert(note_id.to_string(), code);
        session.updated_at = jiff::Timestamp::now();
        self.save(&session)?;
        Ok(session)
    }
}

fn union_of_mapping(mapping: &HashMap<String, Vec<String>>) -> Vec<String> {
    let set: HashSet<&String> = mapping.values().flatten().collect();
    let mut union: Vec<String> = set.into_iter().cloned().collect();
    union.sort();
    union
}

#[cfg(test)]
mod tests {
    use super::*;
    use annot_core::{AnnotationResult, AnnotationStatus};

    fn note(note_id: &str, report_type: &str, gold: Option<&str>) -> Note {
        Note {
            note_id: note_id.to_string(),
            patient_id: "p1".to_string(),
            report_type: report_type.to_string(),
            text: "text".to_string(),
            date: None,
            center: "centerA".to_string(),
            gold_annotations: gold.map(str::to_string),
        }
    }

    fn result(note_id: &str, report_type: &str, field: &str) -> AnnotationResult {
        AnnotationResult {
            note_id: note_id.to_string(),
            patient_id: "p1".to_string(),
            report_type: report_type.to_string(),
            field: field.to_string(),
            value: "ductal carcinoma".to_string(),
            reasoning: "because".to_string(),
            evidence: None,
            status: AnnotationStatus::Success,
            code: None,
            evaluation_result: None,
        }
    }

    #[test]
    fn create_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SessionStore::new(dir.path());
        let session = store.create("s1".to_string(), None, vec![note("n1", "pathology", None)], vec!["pathology/histology".to_string()], None).unwrap();

        let loaded = store.get(session.id).unwrap();
        assert_eq!(loaded.notes.len(), 1);
        assert_eq!(loaded.evaluation_mode, EvaluationMode::Validation);
    }

    #[test]
    fn gold_annotation_upgrades_to_evaluation_mode() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SessionStore::new(dir.path());
        let session = store
            .create("s1".to_string(), None, vec![note("n1", "pathology", Some("pathology/histology: ductal carcinoma"))], vec!["pathology/histology".to_string()], None)
            .unwrap();

        assert_eq!(session.evaluation_mode, EvaluationMode::Evaluation);
    }

    #[test]
    fn correction_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SessionStore::new(dir.path());
        let session = store.create("s1".to_string(), None, vec![note("n1", "pathology", None)], vec!["pathology/histology".to_string()], None).unwrap();

        let updated = store.record_correction(session.id, "n1/pathology/histology", "lobular carcinoma".to_string()).unwrap();
        assert_eq!(updated.corrections["n1/pathology/histology"], "lobular carcinoma");
    }

    #[test]
    fn removing_the_last_prompt_type_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SessionStore::new(dir.path());
        let session = store.create("s1".to_string(), None, vec![note("n1", "pathology", None)], vec!["pathology/histology".to_string()], None).unwrap();

        let err = store.update_prompt_types(session.id, &[], &["pathology/histology".to_string()]).unwrap_err();
        assert!(matches!(err, Error::EmptyPromptTypes(_)));
    }

    #[test]
    fn removing_a_prompt_type_cascades_to_its_annotations() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SessionStore::new(dir.path());
        let mut session =
            store.create("s1".to_string(), None, vec![note("n1", "pathology", None)], vec!["pathology/histology".to_string(), "pathology/grade".to_string()], None).unwrap();
        session.results = vec![result("n1", "pathology", "histology"), result("n1", "pathology", "grade")];
        store.save(&session).unwrap();

        let updated = store.update_prompt_types(session.id, &[], &["pathology/grade".to_string()]).unwrap();
        assert_eq!(updated.results.len(), 1);
        assert_eq!(updated.results[0].field, "histology");
    }

    #[test]
    fn patching_the_mapping_prunes_disallowed_annotations() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SessionStore::new(dir.path());
        let mut mapping = HashMap::new();
        mapping.insert("pathology".to_string(), vec!["pathology/histology".to_string(), "pathology/grade".to_string()]);
        let mut session = store.create("s1".to_string(), None, vec![note("n1", "pathology", None)], Vec::new(), Some(mapping)).unwrap();
        session.results = vec![result("n1", "pathology", "histology"), result("n1", "pathology", "grade")];
        store.save(&session).unwrap();

        let mut narrowed = HashMap::new();
        narrowed.insert("pathology".to_string(), vec!["pathology/histology".to_string()]);
        let updated = store.patch(session.id, None, Some(narrowed)).unwrap();
        assert_eq!(updated.results.len(), 1);
        assert_eq!(updated.prompt_types, vec!["pathology/histology".to_string()]);
    }

    #[test]
    fn delete_removes_the_session_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SessionStore::new(dir.path());
        let session = store.create("s1".to_string(), None, vec![note("n1", "pathology", None)], vec!["pathology/histology".to_string()], None).unwrap();

        store.delete(session.id).unwrap();
        assert!(store.get(session.id).is_err());
    }

    #[test]
    fn list_orders_by_updated_at_descending() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SessionStore::new(dir.path());
        let a = store.create("a".to_string(), None, vec![note("n1", "pathology", None)], vec!["pathology/histology".to_string()], None).unwrap();
        let b = store.create("b".to_string(), None, vec![note("n1", "pathology", None)], vec!["pathology/histology".to_string()], None).unwrap();
        store.record_correction(a.id, "x", "y".to_string()).unwrap();

        let listed = store.list().unwrap();
        assert_eq!(listed[0].id, a.id);
        assert_eq!(listed[1].id, b.id);
    }
}
