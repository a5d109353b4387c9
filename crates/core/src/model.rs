//! Data model shared by ingestion, the annotation engine, session storage,
//! and export. Field names and lifecycle follow the annotation pipeline
//! specification; representation choices (enums instead of bare strings,
//! `jiff` for dates) are implementation detail only.

use std::collections::HashMap;

use jiff::civil::Date;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single free-text clinical note belonging to one patient record.
///
/// `note_id` need only be unique within the session the note belongs to.
/// `gold_annotations` is pipe-delimited `prompt_type: value` tokens and is
/// only ever set in an evaluation session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Note {
    pub note_id: String,
    pub patient_id: String,
    pub report_type: String,
    pub text: String,
    pub date: Option<Date>,
    pub center: String,
    #[serde(default)]
    pub gold_annotations: Option<String>,
}

impl Note {
    /// Looks up the gold value for `prompt_type` in [`Note::gold_annotations`],
    /// matching the prompt key case-insensitively as the evaluation contract
    /// requires.
    pub fn gold_annotation(&self, prompt_type: &str) -> Option<&str> {
        let raw = self.gold_annotations.as_deref()?;
        raw.split('|').find_map(|token| {
            let (key, value) = token.split_once(':')?;
            key.trim().eq_ignore_ascii_case(prompt_type).then(|| value.trim())
        })
    }
}

/// A reusable entity-replacement table applied to a template before it is
/// sent to the model, e.g. mapping `{{tumor_site}}` style placeholders onto
/// center-specific vocabulary.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EntityMapping {
    pub entries: HashMap<String, String>,
}

/// A prompt's body, tagged by whether it carries an entity mapping.
///
/// Kept as a sum type rather than an `Option<EntityMapping>` field so every
/// call site that cares about the distinction is forced to match on it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Template {
    Raw(String),
    WithMapping { template: String, mapping: EntityMapping },
}

impl Template {
    pub fn body(&self) -> &str {
        match self {
            Template::Raw(body) => body,
            Template::WithMapping { template, .. } => template,
        }
    }
}

/// A single prompt file: which report type and field it targets, and the
/// center it was authored for.
///
/// `core_variable` and `value_code_mappings` carry the export-facing half
/// of the entity mapping: the canonical `Entity.field` name this field
/// writes into, and a direct value→code lookup the Export Engine tries
/// before falling back to the generic `CodeResolver`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PromptTemplate {
    pub name: String,
    pub report_type: String,
    pub field: String,
    pub center: String,
    pub template: Template,
    #[serde(default)]
    pub core_variable: Option<String>,
    #[serde(default)]
    pub value_code_mappings: Option<HashMap<String, String>>,
}

/// A labelled input/output pair shown to the model as a worked example.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FewShotExample {
    pub id: Uuid,
    pub report_type: String,
    pub field: String,
    pub note_excerpt: String,
    pub expected_output: String,
    pub tags: Vec<String>,
}

/// Outcome of running one prompt against one note.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationStatus {
    Success,
    Error,
    Incomplete,
}

/// A span of the source note text that was cited as evidence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EvidenceSpan {
    pub start: usize,
    pub end: usize,
    pub quote: String,
}

/// How a predicted value compared against a gold annotation, produced by
/// the Annotation Engine's evaluation contract when a session runs in
/// `evaluation` mode.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationOutcome {
    BothEmpty,
    FalsePositive,
    FalseNegative,
    Match,
    Mismatch,
}

/// Result of annotating one `(note, prompt)` pair. Keyed by `note_id` and
/// the `report_type`/`field` that together name the prompt, since a single
/// patient may contribute several notes sharing the same report type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnnotationResult {
    pub note_id: String,
    pub patient_id: String,
    pub report_type: String,
    pub field: String,
    pub value: String,
    pub reasoning: String,
    pub evidence: Option<EvidenceSpan>,
    pub status: AnnotationStatus,
    pub code: Option<UnifiedICDO3Code>,
    #[serde(default)]
    pub evaluation_result: Option<EvaluationOutcome>,
}

impl AnnotationResult {
    /// The `<report_type>/<field>` key this result was produced for, the
    /// same shape as [`PromptTemplate::name`] and `Session::prompt_types`.
    pub fn prompt_type(&self) -> String {
        format!("{}/{}", self.report_type, self.field)
    }
}

/// One row of the ICD-O-3 dictionary as loaded from CSV. Only `query`,
/// `morphology`, `topography`, and `name` are guaranteed by the dictionary
/// format; anything else is best-effort.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ICDO3CodeInfo {
    pub query: String,
    pub morphology: String,
    pub topography: String,
    pub name: String,
    #[serde(default)]
    pub behavior: Option<String>,
    #[serde(default)]
    pub grade: Option<String>,
}

/// A dictionary match returned by [`annot_dictionary`](../annot_dictionary/index.html)
/// resolution, carrying the score and method that produced it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UnifiedICDO3Code {
    pub info: ICDO3CodeInfo,
    pub confidence: f64,
    pub method: String,
}

/// Whether a session is collecting human corrections (`Validation`) or
/// scoring model output against a ground truth (`Evaluation`).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationMode {
    #[default]
    Validation,
    Evaluation,
}

/// A human review session over a batch of annotation results.
///
/// `report_type_mapping`, when set, is the single source of truth for
/// `prompt_types`: the active prompt set is exactly the union of the
/// mapping's values, and every annotation whose prompt is no longer allowed
/// for its note's report type is pruned when the mapping changes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub id: Uuid,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub evaluation_mode: EvaluationMode,
    #[serde(default)]
    pub notes: Vec<Note>,
    /// The `(report_type, field)` names this session currently extracts;
    /// a session is never left with an empty list once notes have been
    /// added to it.
    pub prompt_types: Vec<String>,
    #[serde(default)]
    pub report_type_mapping: Option<HashMap<String, Vec<String>>>,
    pub results: Vec<AnnotationResult>,
    /// Per-note merged histology+topography selection, produced by the
    /// Export Engine or a manual override.
    #[serde(default)]
    pub unified_icdo3_codes: HashMap<String, UnifiedICDO3Code>,
    pub corrections: HashMap<String, String>,
    pub created_at: jiff::Timestamp,
    pub updated_at: jiff::Timestamp,
}

/// Lifecycle state of a background job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

/// A long-running pipeline job tracked by the job runtime.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Job {
    pub id: Uuid,
    pub shape: String,
    pub status: JobStatus,
    pub step: String,
    pub progress: f32,
}

/// A saved set of prompt/few-shot/dictionary selections a user can reapply.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Preset {
    pub id: Uuid,
    pub name: String,
    pub report_types: Vec<String>,
    pub prompt_names: Vec<String>,
}
