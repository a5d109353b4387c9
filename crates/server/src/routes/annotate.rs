use std::collections::HashMap;

use annot_core::{AnnotationResult, FewShotExample, Note, PromptTemplate};
use axum::Json;
use axum::extract::{Query, State};
use uuid::Uuid;

use crate::error::Error;
use crate::state::AppState;

#[derive(serde::Deserialize)]
pub struct ProcessQuery {
    pub session_id: Uuid,
    pub note_text: String,
}

#[derive(serde::Deserialize)]
pub struct ProcessBody {
    pub note_id: String,
    pub prompt_types: Vec<String>,
    #[serde(default)]
    pub fewshot_k: Option<usize>,
    #[serde(default = "default_use_fewshots")]
    pub use_fewshots: bool,
}

fn default_use_fewshots() -> bool {
    true
}

/// Runs the requested prompts against a single note's text for an existing
/// session. The note identified by `note_id` supplies the report type and
/// center that select its prompts; `note_text` overrides its stored text so
/// a client can re-run extraction on edited text without re-uploading.
pub async fn process(State(state): State<AppState>, Query(query): Query<ProcessQuery>, Json(body): Json<ProcessBody>) -> Result<Json<Vec<AnnotationResult>>, Error> {
    let mut sessions = state.sessions.lock().await;
    let mut session = sessions.get(query.session_id)?;

    let note = session.notes.iter().find(|n| n.note_id == body.note_id).cloned().ok_or(Error::NotFound)?;
    let note = Note { text: query.note_text, ..note };

    let prompts = selected_prompts(&state, &note.center, &session.prompt_types, &body.prompt_types).await?;
    let fewshots_for = fewshot_lookup(&state, &prompts, body.use_fewshots, body.fewshot_k).await;

    let results = state.engine.process_batch(std::slice::from_ref(&note), &prompts, session.evaluation_mode, fewshots_for).await;

    merge_results(&mut session.results, &results);
    session.updated_at = jiff::Timestamp::now();
    sessions.save(&session)?;

    Ok(Json(results))
}

#[derive(serde::Deserialize)]
pub struct BatchBody {
    pub session_id: Uuid,
    #[serde(default)]
    pub prompt_types: Vec<String>,
    #[serde(default)]
    pub fewshot_k: Option<usize>,
    #[serde(default = "default_use_fewshots")]
    pub use_fewshots: bool,
}

/// Runs the requested prompts (or every active prompt type when none are
/// named) against every note in an existing session.
pub async fn batch(State(state): State<AppState>, Json(body): Json<BatchBody>) -> Result<Json<annot_core::Session>, Error> {
    let mut sessions = state.sessions.lock().await;
    let mut session = sessions.get(body.session_id)?;

    let wanted = if body.prompt_types.is_empty() { session.prompt_types.clone() } else { body.prompt_types.clone() };

    let centers: std::collections::BTreeSet<&str> = session.notes.iter().map(|n| n.center.as_str()).collect();
    let mut prompts = Vec::new();
    for center in centers {
        prompts.extend(selected_prompts(&state, center, &session.prompt_types, &wanted).await?);
    }

    let fewshots_for = fewshot_lookup(&state, &prompts, body.use_fewshots, body.fewshot_k).await;
    let results = state.engine.process_batch(&session.notes, &prompts, session.evaluation_mode, fewshots_for).await;

    merge_results(&mut session.results, &results);
    session.updated_at = jiff::Timestamp::now();
    sessions.save(&session)?;

    Ok(Json(session))
}

async fn selected_prompts(state: &AppState, center: &str, session_prompt_types: &[String], wanted: &[String]) -> Result<Vec<PromptTemplate>, Error> {
    let mut library = state.prompts.lock().await;
    Ok(library
        .templates_for_center(center)?
        .iter()
        .filter(|p| {
            let prompt_type = format!("{}/{}", p.report_type, p.field);
            session_prompt_types.contains(&prompt_type) && wanted.contains(&prompt_type)
        })
        .cloned()
        .collect())
}

async fn fewshot_lookup(state: &AppState, prompts: &[PromptTemplate], use_fewshots: bool, k: Option<usize>) -> Box<dyn Fn(&str, &str) -> Vec<FewShotExample> + Send + Sync> {
    if !use_fewshots {
        return Box::new(|_: &str, _: &str| Vec::new());
    }
    let store = state.fewshot.lock().await;
    let by_field: HashMap<(String, String), Vec<FewShotExample>> = prompts
        .iter()
        .map(|p| {
            let mut examples: Vec<FewShotExample> = store.matching(&p.report_type, &p.field, None).into_iter().cloned().collect();
            if let Some(k) = k {
                examples.truncate(k);
            }
            ((p.report_type.clone(), p.field.clone()), examples)
        })
        .collect();
    Box::new(move |report_type: &str, field: &str| by_field.get(&(report_type.to_string(), field.to_string())).cloned().unwrap_or_default())
}

/// Replaces any prior result for the same `(note_id, report_type, field)`
/// with the freshly produced one, appending otherwise.
fn merge_results(existing: &mut Vec<AnnotationResult>, fresh: &[AnnotationResult]) {
    for result in fresh {
        existing.retain(|r| !(r.note_id == result.note_id && r.report_type == result.report_type && r.field == result.field));
        existing.push(result.clone());
    }
}
