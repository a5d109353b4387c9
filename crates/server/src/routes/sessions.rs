use std::collections::HashMap;

use annot_core::Note;
use axum::Json;
use axum::extract::{Path, State};
use uuid::Uuid;

use crate::error::Error;
use crate::state::AppState;

#[derive(serde::Deserialize)]
pub struct CreateSessionRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub notes: Vec<Note>,
    #[serde(default)]
    pub prompt_types: Vec<String>,
    #[serde(default)]
    pub report_type_mapping: Option<HashMap<String, Vec<String>>>,
}

/// Creates a session from an uploaded notes list. `evaluation_mode` is not
/// part of the request: the store derives it from whether any note carries
/// a gold-annotation column.
pub async fn create_session(State(state): State<AppState>, Json(request): Json<CreateSessionRequest>) -> Result<Json<annot_core::Session>, Error> {
    let mut sessions = state.sessions.lock().await;
    Ok(Json(sessions.create(request.name, request.description, request.notes, request.prompt_types, request.report_type_mapping)?))
}

pub async fn list_sessions(State(state): State<AppState>) -> Result<Json<Vec<annot_core::Session>>, Error> {
    let mut sessions = state.sessions.lock().await;
    Ok(Json(sessions.list()?))
}

pub async fn get_session(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<annot_core::Session>, Error> {
    let mut sessions = state.sessions.lock().await;
    Ok(Json(sessions.get(id)?))
}

pub async fn delete_session(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<(), Error> {
    let mut sessions = state.sessions.lock().await;
    Ok(sessions.delete(id)?)
}

#[derive(serde::Deserialize, Default)]
pub struct PatchSessionRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub report_type_mapping: Option<HashMap<String, Vec<String>>>,
}

/// Renames a session and/or replaces its report-type mapping, pruning
/// annotations no longer allowed for their note's report type.
pub async fn patch_session(State(state): State<AppState>, Path(id): Path<Uuid>, Json(body): Json<PatchSessionRequest>) -> Result<Json<annot_core::Session>, Error> {
    let mut sessions = state.sessions.lock().await;
    Ok(Json(sessions.patch(id, body.name, body.report_type_mapping)?))
}

#[derive(serde::Deserialize, Default)]
pub struct PromptTypesRequest {
    #[serde(default)]
    pub add: Vec<String>,
    #[serde(default)]
    pub remove: Vec<String>,
}

/// Rejects with [`Error::Session`] (wrapping `annot_session::Error::EmptyPromptTypes`)
/// if `remove` would leave the session with no active fields.
pub async fn update_prompt_types(State(state): State<AppState>, Path(id): Path<Uuid>, Json(body): Json<PromptTypesRequest>) -> Result<Json<annot_core::Session>, Error> {
    let mut sessions = state.sessions.lock().await;
    Ok(Json(sessions.update_prompt_types(id, &body.add, &body.remove)?))
}

#[derive(serde::Deserialize)]
pub struct CorrectionRequest {
    pub field_key: String,
    pub value: String,
}

pub async fn record_correction(State(state): State<AppState>, Path(id): Path<Uuid>, Json(body): Json<CorrectionRequest>) -> Result<Json<annot_core::Session>, Error> {
    let mut sessions = state.sessions.lock().await;
    Ok(Json(sessions.record_correction(id, &body.field_key, body.value)?))
}
