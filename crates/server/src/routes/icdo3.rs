use annot_core::UnifiedICDO3Code;
use axum::Json;
use axum::extract::{Query, State};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::error::Error;
use crate::state::AppState;

#[derive(serde::Deserialize)]
pub struct SearchQuery {
    pub q: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    10
}

pub async fn search(State(state): State<AppState>, Query(query): Query<SearchQuery>) -> Json<Value> {
    Json(json!(state.dictionary.search_by_text(&query.q, query.limit)))
}

#[derive(serde::Deserialize)]
pub struct ResolveQuery {
    pub morphology: Option<String>,
    pub topography: Option<String>,
    pub text: Option<String>,
}

pub async fn resolve(State(state): State<AppState>, Query(query): Query<ResolveQuery>) -> Json<Value> {
    let candidates = state.dictionary.resolve(query.morphology.as_deref(), query.topography.as_deref(), query.text.as_deref());
    Json(json!(candidates))
}

/// Records one dictionary entry as the user-selected candidate for
/// `(note_id, report_type, field)` — the commit step after a client has
/// shown the operator the ranked [`resolve`] candidates and they chose one.
#[derive(serde::Deserialize)]
pub struct SelectCandidateRequest {
    pub session_id: Uuid,
    pub note_id: String,
    pub report_type: String,
    pub field: String,
    pub query: String,
}

pub async fn select(State(state): State<AppState>, Json(request): Json<SelectCandidateRequest>) -> Result<Json<annot_core::Session>, Error> {
    let info = state.dictionary.find_exact(&request.query).cloned().ok_or(Error::NotFound)?;
    let candidate = UnifiedICDO3Code { info, confidence: 1.0, method: "manual_select".to_string() };

    let mut sessions = state.sessions.lock().await;
    let session = sessions.record_candidate(request.session_id, &request.note_id, &request.report_type, &request.field, candidate)?;
    Ok(Json(session))
}

/// Folds a note's already-annotated histology and topography selections
/// into one unified ICD-O-3 code, saved on the session (not as a synthetic
/// annotation) so the Export Engine can merge it into a single
/// `Diagnosis.diagnosisCode` row.
#[derive(serde::Deserialize)]
pub struct CombineCodesRequest {
    pub session_id: Uuid,
    pub note_id: String,
    pub morphology_field: FieldRef,
    pub topography_field: FieldRef,
}

#[derive(serde::Deserialize)]
pub struct FieldRef {
    pub report_type: String,
    pub field: String,
}

pub async fn combine(State(state): State<AppState>, Json(request): Json<CombineCodesRequest>) -> Result<Json<annot_core::Session>, Error> {
    let mut sessions = state.sessions.lock().await;
    let session = sessions.get(request.session_id)?;

    let morphology = find_result(&session, &request.note_id, &request.morphology_field.report_type, &request.morphology_field.field)
        .and_then(|r| r.code.as_ref())
        .map(|c| c.info.morphology.clone())
        .ok_or(Error::NotFound)?;
    let topography = find_result(&session, &request.note_id, &request.topography_field.report_type, &request.topography_field.field)
        .and_then(|r| r.code.as_ref())
        .map(|c| c.info.topography.clone())
        .ok_or(Error::NotFound)?;

    let candidates = state.dictionary.resolve(Some(&morphology), Some(&topography), None);
    let info = candidates.into_iter().next().ok_or(Error::NotFound)?;
    let unified = UnifiedICDO3Code { info: info.info, confidence: 1.0, method: "unified_icdo3".to_string() };

    let session = sessions.save_unified_code(request.session_id, &request.note_id, unified)?;
    Ok(Json(session))
}

fn find_result<'a>(session: &'a annot_core::Session, note_id: &str, report_type: &str, field: &str) -> Option<&'a annot_core::AnnotationResult> {
    session.results.iter().find(|r| r.note_id == note_id && r.report_type == report_type && r.field == field)
}
