use std::collections::HashMap;
use std::io::Write;

use annot_core::{AnnotationStatus, PromptTemplate, Session};

use crate::error::Error;
use crate::kernel::{DIAGNOSIS_CODE_CORE_VARIABLE, FieldKind, HISTOLOGY_CORE_VARIABLE, Row, TOPOGRAPHY_CORE_VARIABLE, build_rows};
use crate::resolver::CodeResolver;

/// Writes one row per resolved export row with the human-readable
/// annotated value, the "label" export.
pub fn write_label_csv<W: Write>(session: &Session, prompts: &HashMap<String, PromptTemplate>, writer: W) -> Result<(), Error> {
    let rows = build_rows(session, prompts);
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(["record_id", "note_id", "patient_id", "entity", "core_variable", "types", "value", "status"])?;
    for row in &rows {
        csv_writer.write_record([
            &row.record_id.to_string(),
            &row.note_id,
            &row.patient_id,
            &row.entity,
            &row.core_variable,
            row.field_kind.as_str(),
            &row.value,
            status_str(row.status),
        ])?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Writes the coded export: histology and topography rows for a note are
/// merged into one `Diagnosis.diagnosisCode` row carrying the note's saved
/// unified ICD-O-3 code (or an `UNRESOLVED::no_unified_icdo3_code`
/// sentinel when none was saved), and every other `CodeableConcept` row is
/// resolved through its prompt's `value_code_mappings` before falling back
/// to the generic [`CodeResolver`].
pub fn write_coded_csv<W: Write>(session: &Session, prompts: &HashMap<String, PromptTemplate>, resolver: &CodeResolver, writer: W) -> Result<(), Error> {
    let rows = build_rows(session, prompts);
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(["record_id", "note_id", "patient_id", "entity", "core_variable", "types", "value", "match_confidence", "match_method", "status"])?;

    let mut diagnosis_emitted = std::collections::HashSet::new();

    for row in &rows {
        if row.core_variable == HISTOLOGY_CORE_VARIABLE || row.core_variable == TOPOGRAPHY_CORE_VARIABLE {
            if !diagnosis_emitted.insert(row.note_id.clone()) {
                continue;
            }
            let unified = session.unified_icdo3_codes.get(&row.note_id);
            let (value, confidence, method) = match unified {
                Some(code) => (code.info.query.clone(), code.confidence, "unified_icdo3".to_string()),
                None => ("UNRESOLVED::no_unified_icdo3_code".to_string(), 0.0, "unresolved".to_string()),
            };
            csv_writer.write_record([
                &row.record_id.to_string(),
                &row.note_id,
                &row.patient_id,
                "Diagnosis",
                DIAGNOSIS_CODE_CORE_VARIABLE,
                "CodeableConcept",
                &value,
                &confidence.to_string(),
                &method,
                status_str(row.status),
            ])?;
            continue;
        }

        let (value, confidence, method) = resolve_row(row, prompts, resolver);
        csv_writer.write_record([
            &row.record_id.to_string(),
            &row.note_id,
            &row.patient_id,
            &row.entity,
            &row.core_variable,
            row.field_kind.as_str(),
            &value,
            &confidence.to_string(),
            &method,
            status_str(row.status),
        ])?;
    }
    csv_writer.flush()?;
    Ok(())
}

fn resolve_row(row: &Row, prompts: &HashMap<String, PromptTemplate>, resolver: &CodeResolver) -> (String, f64, String) {
    if row.field_kind != FieldKind::CodeableConcept {
        return (row.value.clone(), 1.0, "passthrough".to_string());
    }

    let direct = prompts.get(&row.prompt_type).and_then(|p| p.value_code_mappings.as_ref()).and_then(|mappings| mappings.get(&row.value));
    if let Some(code) = direct {
        return (code.clone(), 1.0, "value_code_mapping".to_string());
    }

    let resolved = resolver.resolve(&row.value, &row.core_variable);
    (resolved.code_id, resolved.confidence, resolved.method.to_string())
}

fn status_str(status: AnnotationStatus) -> &'static str {
    match status {
        AnnotationStatus::Success => "success",
        AnnotationStatus::Error => "error",
        AnnotationStatus::Incomplete => "incomplete",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::CodeEntry;
    use annot_core::{AnnotationResult, EvaluationMode, Note, Template, UnifiedICDO3Code, ICDO3CodeInfo};

    fn note() -> Note {
        Note { note_id: "n1".into(), patient_id: "p1".into(), report_type: "pathology".into(), text: "t".into(), date: None, center: "centerA".into(), gold_annotations: None }
    }

    fn result(field: &str, value: &str) -> AnnotationResult {
        AnnotationResult {
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
        }
    }

    fn session(results: Vec<AnnotationResult>, unified: HashMap<String, UnifiedICDO3Code>) -> Session {
        Session {
            id: uuid::Uuid::new_v4(),
            name: "s".into(),
            description: None,
            evaluation_mode: EvaluationMode::Validation,
            notes: vec![note()],
            prompt_types: vec!["pathology/sex".into()],
            report_type_mapping: None,
            results,
            unified_icdo3_codes: unified,
            corrections: HashMap::new(),
            created_at: jiff::Timestamp::from_second(0).unwrap(),
            updated_at: jiff::Timestamp::from_second(0).unwrap(),
        }
    }

    fn prompt(field: &str, core_variable: &str) -> PromptTemplate {
        PromptTemplate {
            name: format!("pathology/{field}"),
            report_type: "pathology".into(),
            field: field.into(),
            center: "centerA".into(),
            template: Template::Raw("x".into()),
            core_variable: Some(core_variable.into()),
            value_code_mappings: None,
        }
    }

    #[test]
    fn label_csv_includes_raw_value() {
        let s = session(vec![result("sex", "Label: Male.")], HashMap::new());
        let prompts = HashMap::from([("pathology/sex".to_string(), prompt("sex", "Patient.sex"))]);
        let mut buf = Vec::new();
        write_label_csv(&s, &prompts, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("Male"));
    }

    #[test]
    fn coded_csv_merges_histology_and_topography_into_one_diagnosis_row() {
        let s = session(
            vec![result("histologySubgroup", "ductal"), result("subsite", "breast")],
            HashMap::from([("n1".to_string(), UnifiedICDO3Code { info: ICDO3CodeInfo { query: "8500/3".into(), ..Default::default() }, confidence: 0.9, method: "unified_icdo3".into() })]),
        );
        let prompts = HashMap::from([("pathology/histologySubgroup".to_string(), prompt("histologySubgroup", HISTOLOGY_CORE_VARIABLE)), ("pathology/subsite".to_string(), prompt("subsite", TOPOGRAPHY_CORE_VARIABLE))]);
        let resolver = CodeResolver::new(vec![]);
        let mut buf = Vec::new();
        write_coded_csv(&s, &prompts, &resolver, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text.matches("Diagnosis.diagnosisCode").count(), 1);
        assert!(text.contains("8500/3"));
    }

    #[test]
    fn coded_csv_falls_back_to_unresolved_without_unified_code() {
        let s = session(vec![result("histologySubgroup", "ductal")], HashMap::new());
        let prompts = HashMap::from([("pathology/histologySubgroup".to_string(), prompt("histologySubgroup", HISTOLOGY_CORE_VARIABLE))]);
        let resolver = CodeResolver::new(vec![]);
        let mut buf = Vec::new();
        write_coded_csv(&s, &prompts, &resolver, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("UNRESOLVED::no_unified_icdo3_code"));
    }

    #[test]
    fn coded_csv_prefers_value_code_mapping_over_resolver() {
        let mut p = prompt("surgeryType", "Surgery.surgeryType");
        p.value_code_mappings = Some(HashMap::from([("mastectomy".to_string(), "SURG-01".to_string())]));
        let s = session(vec![result("surgeryType", "mastectomy")], HashMap::new());
        let prompts = HashMap::from([("pathology/surgeryType".to_string(), p)]);
        let resolver = CodeResolver::new(vec![CodeEntry { category: "surgery_type".into(), code_id: "WRONG".into(), label: "mastectomy".into() }]);
        let mut buf = Vec::new();
        write_coded_csv(&s, &prompts, &resolver, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("SURG-01"));
        assert!(!text.contains("WRONG"));
    }
}
