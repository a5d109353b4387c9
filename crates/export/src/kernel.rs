//! The row-building kernel shared by the label and coded exports: resolves
//! each annotation's `core_variable`, entity, date reference, and
//! `record_id` before either writer turns the result into a CSV row.

use std::collections::HashMap;
use std::sync::LazyLock;

use annot_core::{AnnotationResult, AnnotationStatus, PromptTemplate, Session};
use regex::Regex;

/// Canonical data-type descriptor for a row, inferred from the field name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Date,
    Integer,
    Float,
    Boolean,
    CodeableConcept,
}

impl FieldKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FieldKind::Date => "date",
            FieldKind::Integer => "integer",
            FieldKind::Float => "float",
            FieldKind::Boolean => "boolean",
            FieldKind::CodeableConcept => "CodeableConcept",
        }
    }
}

/// Infers a field's row type from name heuristics, mirroring the built-in
/// fallback table the prompt-driven type hints take precedence over.
pub fn infer_field_kind(field: &str) -> FieldKind {
    let lower = field.to_lowercase();
    if lower.contains("date") {
        FieldKind::Date
    } else if lower.contains("age") || lower.contains("count") || lower.contains("number") {
        FieldKind::Integer
    } else if lower.contains("bmi") || lower.contains("diameter") || lower.contains("dose") {
        FieldKind::Float
    } else if lower.contains("rupture") || lower.contains("completed") {
        FieldKind::Boolean
    } else {
        FieldKind::CodeableConcept
    }
}

/// Fixed `prompt_type → core_variable` table used when a prompt carries no
/// `entity_mapping` of its own, covering the axes the data model names
/// explicitly.
pub fn built_in_core_variable(prompt_type: &str) -> Option<&'static str> {
    match prompt_type {
        "patient/sex" => Some("Patient.sex"),
        "pathology/histology" | "pathology/histologySubgroup" => Some("Diagnosis.histologySubgroup"),
        "pathology/topography" | "pathology/subsite" => Some("Diagnosis.subsite"),
        "pathology/grade" | "pathology/grading" => Some("Diagnosis.grading"),
        "surgery/surgeryType" => Some("Surgery.surgeryType"),
        "systemictreatment/regimen" => Some("SystemicTreatment.regimen"),
        "radiotherapy/setting" => Some("Radiotherapy.setting"),
        _ => None,
    }
}

/// The two core variables merged into one `Diagnosis.diagnosisCode` row by
/// the coded export.
pub const HISTOLOGY_CORE_VARIABLE: &str = "Diagnosis.histologySubgroup";
pub const TOPOGRAPHY_CORE_VARIABLE: &str = "Diagnosis.subsite";
pub const DIAGNOSIS_CODE_CORE_VARIABLE: &str = "Diagnosis.diagnosisCode";

static LABEL_PREFIXES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)^[a-z][a-z '’]{0,40}:\s*",
        r"(?i)^patient'?s?\s+\w+\s+(is|was)\s+",
        r"(?i)^the\s+\w+\s+(is|was)\s+",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// Strips a leading template label ("Label: X.") or a short declarative
/// lead-in ("Patient's gender X.") from an annotation value, and the
/// trailing full stop the same templates leave behind.
pub fn strip_template_prefix(value: &str) -> String {
    let mut stripped = value.trim();
    for pattern in LABEL_PREFIXES.iter() {
        if let Some(m) = pattern.find(stripped) {
            stripped = &stripped[m.end()..];
            break;
        }
    }
    stripped.trim().trim_end_matches('.').trim().to_string()
}

/// Normalizes a note's calendar date to `DD/MM/YYYY`, the export's date
/// reference format; notes with no date fall back to an empty reference so
/// they still group together under one `record_id`.
pub fn normalize_date_ref(date: Option<jiff::civil::Date>) -> String {
    date.map(|d| format!("{:02}/{:02}/{:04}", d.day(), d.month(), d.year())).unwrap_or_default()
}

/// One fully resolved export row.
#[derive(Debug, Clone)]
pub struct Row {
    pub record_id: u64,
    pub note_id: String,
    pub patient_id: String,
    pub prompt_type: String,
    pub entity: String,
    pub core_variable: String,
    pub value: String,
    pub date_ref: String,
    pub field_kind: FieldKind,
    pub status: AnnotationStatus,
}

/// Looks up the `core_variable` for a result's prompt: the prompt's own
/// mapping first, then the built-in table, then the prompt_type itself as
/// a passthrough for unknown prompts.
fn core_variable_for(result: &AnnotationResult, prompts: &HashMap<String, PromptTemplate>) -> String {
    let prompt_type = result.prompt_type();
    prompts
        .get(&prompt_type)
        .and_then(|p| p.core_variable.clone())
        .or_else(|| built_in_core_variable(&prompt_type).map(str::to_string))
        .unwrap_or(prompt_type)
}

/// Builds one row per `(note, prompt)` annotation with non-empty text,
/// assigning `record_id`s so every field describing the same
/// `(patient_id, entity, date_ref)` event shares one.
pub fn build_rows(session: &Session, prompts: &HashMap<String, PromptTemplate>) -> Vec<Row> {
    let dates_by_note: HashMap<&str, Option<jiff::civil::Date>> = session.notes.iter().map(|n| (n.note_id.as_str(), n.date)).collect();

    let mut record_ids: HashMap<(String, String, String), u64> = HashMap::new();
    let mut next_id: u64 = 1;
    let mut rows = Vec::new();

    for result in &session.results {
        if result.value.trim().is_empty() {
            continue;
        }
        let core_variable = core_variable_for(result, prompts);
        let entity = core_variable.split('.').next().unwrap_or(&core_variable).to_string();
        let value = strip_template_prefix(&result.value);
        let date_ref = normalize_date_ref(dates_by_note.get(result.note_id.as_str()).copied().flatten());

        let key = (result.patient_id.clone(), entity.clone(), date_ref.clone());
        let record_id = *record_ids.entry(key).or_insert_with(|| {
            let id = next_id;
            next_id += 1;
            id
        });

        rows.push(Row {
            record_id,
            note_id: result.note_id.clone(),
            patient_id: result.patient_id.clone(),
            prompt_type: result.prompt_type(),
            entity,
            core_variable,
            value,
            date_ref,
            field_kind: infer_field_kind(&result.field),
            status: result.status,
        });
    }

    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_label_prefix_and_trailing_period() {
        assert_eq!(strip_template_prefix("Histology: ductal carcinoma."), "ductal carcinoma");
    }

    #[test]
    fn leaves_unlabeled_text_alone() {
        assert_eq!(strip_template_prefix("ductal carcinoma"), "ductal carcinoma");
    }

    #[test]
    fn infers_date_and_codeable_concept_kinds() {
        assert_eq!(infer_field_kind("diagnosis_date").as_str(), "date");
        assert_eq!(infer_field_kind("histology").as_str(), "CodeableConcept");
        assert_eq!(infer_field_kind("tumor_diameter").as_str(), "float");
        assert_eq!(infer_field_kind("aneurysm_rupture").as_str(), "boolean");
    }

    #[test]
    fn record_id_groups_by_patient_entity_and_date() {
        use annot_core::{AnnotationStatus, EvaluationMode, Note};
        use std::collections::HashMap as Map;

        let note = Note {
            note_id: "n1".into(),
            patient_id: "p1".into(),
            report_type: "pathology".into(),
            text: "t".into(),
            date: None,
            center: "centerA".into(),
            gold_annotations: None,
        };
        let result = |field: &str, value: &str| AnnotationResult {
            note_id: "n1".into(),
            patient_id: "p1".into(),
            report_type: "pathology".into(),
            field: field.into(),
            value: value.into(),
            reasoning: String::new(),
            evidence: None,
            status: AnnotationStatus::Success,
            code: None,
            evaluation_result: None,
        };
        let session = Session {
            id: uuid::Uuid::new_v4(),
            name: "s".into(),
            description: None,
            evaluation_mode: EvaluationMode::Validation,
            notes: vec![note],
            prompt_types: vec!["pathology/histology".into(), "pathology/grade".into()],
            report_type_mapping: None,
            results: vec![result("histology", "ductal carcinoma"), result("grade", "G2")],
            unified_icdo3_codes: Map::new(),
            corrections: Map::new(),
            created_at: jiff::Timestamp::from_second(0).unwrap(),
            updated_at: jiff::Timestamp::from_second(0).unwrap(),
        };

        let rows = build_rows(&session, &Map::new());
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].record_id, rows[1].record_id);
        assert_eq!(rows[0].entity, "Diagnosis");
    }
}
