use annot_core::PromptTemplate;
use axum::Json;
use axum::extract::{Path, Query, State};

use crate::error::Error;
use crate::state::AppState;

#[derive(serde::Deserialize)]
pub struct CenterQuery {
    pub center: String,
}

pub async fn list_for_center(State(state): State<AppState>, Query(query): Query<CenterQuery>) -> Result<Json<Vec<PromptTemplate>>, Error> {
    let mut library = state.prompts.lock().await;
    Ok(Json(library.templates_for_center(&query.center)?.to_vec()))
}

pub async fn find_one(State(state): State<AppState>, Path((center, report_type, field)): Path<(String, String, String)>) -> Result<Json<PromptTemplate>, Error> {
    let mut library = state.prompts.lock().await;
    Ok(Json(library.find(&center, &report_type, &field)?))
}

pub async fn upsert(State(state): State<AppState>, Json(template): Json<PromptTemplate>) -> Result<(), Error> {
    let mut library = state.prompts.lock().await;
    library.upsert(&template)?;
    Ok(())
}

pub async fn delete(State(state): State<AppState>, Path((center, report_type, field)): Path<(String, String, String)>) -> Result<(), Error> {
    let mut library = state.prompts.lock().await;
    library.delete(&center, &report_type, &field)?;
    Ok(())
}
