use std::sync::Arc;

use annot_core::{AnnotationResult, AnnotationStatus, EvaluationMode, FewShotExample, Note, PromptTemplate};
use annot_dictionary::DictionaryIndex;
use annot_llm::LlmClient;
use futures::future::join_all;
use tokio::sync::Semaphore;

use crate::codes::{is_coded_field, resolve_code};
use crate::evaluate::{evaluate_field, infer_field_type};
use crate::postprocess::normalize_annotation_output;
use crate::span::find_evidence;

/// The shape `generate_structured` extracts from every per-field prompt:
/// the extracted value, the evidence quote backing it, and the model's
/// reasoning.
#[derive(Debug, Clone, serde::Deserialize, schemars::JsonSchema)]
pub struct RawAnnotation {
    pub value: String,
    #[serde(default)]
    pub evidence: String,
    #[serde(default)]
    pub reasoning: String,
}

/// A reasoning string longer than this, or one ending in an ellipsis, is
/// treated as truncated rather than as a completed answer (Open Question 2
/// in the annotation contract).
const INCOMPLETE_REASONING_CHARS: usize = 900;

/// Runs per-field extraction prompts against clinical notes with bounded
/// LLM concurrency, the Annotation Engine component.
pub struct AnnotationEngine {
    llm: Arc<LlmClient>,
    dictionary: Arc<DictionaryIndex>,
    semaphore: Arc<Semaphore>,
}

impl AnnotationEngine {
    pub fn new(llm: Arc<LlmClient>, dictionary: Arc<DictionaryIndex>, concurrency: usize) -> Self {
        Self { llm, dictionary, semaphore: Arc::new(Semaphore::new(concurrency.max(1))) }
    }

    /// Renders `prompt` against `note` (with few-shot examples inlined)
    /// and runs one extraction, acquiring a concurrency permit only around
    /// the LLM call itself so prompt rendering never blocks on the
    /// semaphore. When `evaluation_mode` is `Evaluation`, scores the
    /// prediction against the note's gold annotation for this prompt.
    pub async fn process_one(&self, note: &Note, prompt: &PromptTemplate, fewshots: &[FewShotExample], evaluation_mode: EvaluationMode) -> AnnotationResult {
        let rendered = render_prompt(prompt, note, fewshots);

        let permit = self.semaphore.acquire().await.expect("semaphore is never closed");
        let outcome = self.llm.generate_structured::<RawAnnotation>(&rendered, &["value"]).await;
        drop(permit);

        let (value, reasoning, evidence, status) = match outcome {
            Ok(raw) => {
                let status = if is_incomplete(&raw.reasoning) { AnnotationStatus::Incomplete } else { AnnotationStatus::Success };
                (normalize_annotation_output(&raw.value), raw.reasoning, find_evidence(&note.text, &raw.evidence), status)
            }
            Err(err) => (String::new(), err.to_string(), None, AnnotationStatus::Error),
        };

        let code = if status != AnnotationStatus::Error && is_coded_field(&prompt.field) {
            resolve_code(&self.dictionary, None, None, &value)
        } else {
            None
        };

        let evaluation_result = (evaluation_mode == EvaluationMode::Evaluation && status != AnnotationStatus::Error)
            .then(|| note.gold_annotation(&format!("{}/{}", prompt.report_type, prompt.field)))
            .flatten()
            .map(|expected| evaluate_field(&value, expected, infer_field_type(&prompt.field)));

        AnnotationResult {
            note_id: note.note_id.clone(),
            patient_id: note.patient_id.clone(),
            report_type: note.report_type.clone(),
            field: prompt.field.clone(),
            value,
            reasoning,
            evidence,
            status,
            code,
            evaluation_result,
        }
    }

    /// Runs every `(note, prompt)` pair in the cross product, preserving
    /// submission order in the returned vector regardless of completion
    /// order (Open Question 1).
    pub async fn process_batch(
        &self,
        notes: &[Note],
        prompts: &[PromptTemplate],
        evaluation_mode: EvaluationMode,
        fewshots_for: impl Fn(&str, &str) -> Vec<FewShotExample>,
    ) -> Vec<AnnotationResult> {
        let fewshots_for = &fewshots_for;
        let tasks = notes.iter().flat_map(|note| {
            prompts.iter().filter(|p| p.report_type == note.report_type).map(move |prompt| {
                let fewshots = fewshots_for(&prompt.report_type, &prompt.field);
                async move { self.process_one(note, prompt, &fewshots, evaluation_mode).await }
            })
        });

        join_all(tasks).await
    }
}

fn is_incomplete(reasoning: &str) -> bool {
    reasoning.chars().count() > INCOMPLETE_REASONING_CHARS || reasoning.trim_end().ends_with('…') || reasoning.trim_end().ends_with("...")
}

fn render_prompt(prompt: &PromptTemplate, note: &Note, fewshots: &[FewShotExample]) -> String {
    let fewshot_block = fewshots
        .iter()
        .map(|example| format!("Note: {}\nAnswer: {}", example.note_excerpt, example.expected_output))
        .collect::<Vec<_>>()
        .join("\n\n");

    let mut body = prompt.template.body().replace("{fewshots}", &fewshot_block);

    if let annot_core::Template::WithMapping { mapping, .. } = &prompt.template {
        for (from, to) in &mapping.entries {
            body = body.replace(from, to);
        }
    }

    body.replace("{note}", &note.text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incomplete_detection_on_length() {
        let long = "x".repeat(INCOMPLETE_REASONING_CHARS + 1);
        assert!(is_incomplete(&long));
        assert!(!is_incomplete("short reasoning"));
    }

    #[test]
    fn incomplete_detection_on_ellipsis() {
        assert!(is_incomplete("the model trailed off..."));
        assert!(is_incomplete("the model trailed off…"));
    }

    #[test]
    fn render_prompt_substitutes_note_and_fewshots() {
        let note =
            Note { note_id: "n1".into(), patient_id: "p1".into(), report_type: "pathology".into(), text: "tumor present".into(), date: None, center: "centerA".into(), gold_annotations: None };
        let prompt = PromptTemplate {
            name: "pathology/histology".into(),
            report_type: "pathology".into(),
            field: "histology".into(),
            center: "centerA".into(),
            template: annot_core::Template::Raw("Note: {note}\nExamples: {fewshots}".into()),
            core_variable: None,
            value_code_mappings: None,
        };
        let rendered = render_prompt(&prompt, &note, &[]);
        assert!(rendered.contains("tumor present"));
    }
}
