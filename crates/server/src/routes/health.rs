use axum::Json;
use axum::extract::State;
use serde_json::{Value, json};

use crate::state::AppState;

pub async fn healthz() -> &'static str {
    "ok"
}

pub async fn status(State(state): State<AppState>) -> Json<Value> {
    let status = state.llm.status().await;
    Json(json!({ "llm_available": status.available, "models": status.models }))
}

pub async fn metrics(State(state): State<AppState>) -> Result<Json<Value>, crate::error::Error> {
    let metrics = state.llm.metrics().await.map_err(|err| crate::error::Error::Upstream(err.to_string()))?;
    Ok(Json(json!(metrics)))
}
