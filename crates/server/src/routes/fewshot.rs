use annot_core::FewShotExample;
use axum::Json;
use axum::extract::{Path, Query, State};
use uuid::Uuid;

use crate::error::Error;
use crate::state::AppState;

#[derive(serde::Deserialize)]
pub struct MatchQuery {
    pub report_type: String,
    pub field: String,
    pub tag: Option<String>,
}

pub async fn list_all(State(state): State<AppState>) -> Json<Vec<FewShotExample>> {
    let store = state.fewshot.lock().await;
    Json(store.all().to_vec())
}

pub async fn matching(State(state): State<AppState>, Query(query): Query<MatchQuery>) -> Json<Vec<FewShotExample>> {
    let store = state.fewshot.lock().await;
    Json(store.matching(&query.report_type, &query.field, query.tag.as_deref()).into_iter().cloned().collect())
}

pub async fn insert(State(state): State<AppState>, Json(example): Json<FewShotExample>) -> Result<(), Error> {
    let mut store = state.fewshot.lock().await;
    store.insert(example)?;
    Ok(())
}

pub async fn update(State(state): State<AppState>, Json(example): Json<FewShotExample>) -> Result<(), Error> {
    let mut store = state.fewshot.lock().await;
    store.update(example)?;
    Ok(())
}

pub async fn delete(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<(), Error> {
    let mut store = state.fewshot.lock().await;
    store.delete(id)?;
    Ok(())
}
