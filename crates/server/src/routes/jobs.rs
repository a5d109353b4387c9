use annot_jobs::JobShape;
use axum::Json;
use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::error::Error;
use crate::state::AppState;

#[derive(serde::Deserialize)]
pub struct SubmitJobRequest {
    pub shape: JobShape,
    pub payload: String,
}

#[derive(serde::Serialize)]
pub struct SubmitJobResponse {
    pub job_id: Uuid,
}

pub async fn submit_job(State(state): State<AppState>, Json(request): Json<SubmitJobRequest>) -> Result<Json<SubmitJobResponse>, Error> {
    let job_id = state.jobs.submit(request.shape, &request.payload).await?;
    Ok(Json(SubmitJobResponse { job_id }))
}

/// Starts a job of the given shape against a raw JSON payload string — the
/// shared body behind `/run/link_rows`, `/run/quality_check`, and
/// `/run/discoverability`, which differ only in which shape they submit.
async fn run_shape(state: AppState, shape: JobShape, payload: String) -> Result<Json<SubmitJobResponse>, Error> {
    let job_id = state.jobs.submit(shape, &payload).await?;
    Ok(Json(SubmitJobResponse { job_id }))
}

pub async fn run_link_rows(State(state): State<AppState>, payload: String) -> Result<Json<SubmitJobResponse>, Error> {
    run_shape(state, JobShape::LinkRows, payload).await
}

pub async fn run_quality_check(State(state): State<AppState>, payload: String) -> Result<Json<SubmitJobResponse>, Error> {
    run_shape(state, JobShape::QualityCheck, payload).await
}

pub async fn run_discoverability(State(state): State<AppState>, payload: String) -> Result<Json<SubmitJobResponse>, Error> {
    run_shape(state, JobShape::Discoverability, payload).await
}

/// Starts the ingest stage of the pipeline.
pub async fn run_pipeline(State(state): State<AppState>, payload: String) -> Result<Json<SubmitJobResponse>, Error> {
    run_shape(state, JobShape::Ingest, payload).await
}

/// Resumes the pipeline at the annotation stage once ingest has produced
/// its rows — the natural next `JobShape` after `Ingest`.
pub async fn continue_pipeline(State(state): State<AppState>, payload: String) -> Result<Json<SubmitJobResponse>, Error> {
    run_shape(state, JobShape::Annotate, payload).await
}

pub async fn cancel_job(State(state): State<AppState>, Path(job_id): Path<Uuid>) -> Result<(), Error> {
    Ok(state.jobs.cancel(job_id).await?)
}

/// Forceful stop. The runtime's cancellation already escalates
/// SIGTERM→SIGKILL on its own schedule, so this is the same request as
/// `cancel_job` under a name that matches how operators think about it.
pub async fn kill_job(State(state): State<AppState>, Path(job_id): Path<Uuid>) -> Result<(), Error> {
    Ok(state.jobs.cancel(job_id).await?)
}

#[derive(serde::Deserialize)]
pub struct RecentTasksQuery {
    #[serde(default = "default_recent_limit")]
    pub limit: u32,
}

fn default_recent_limit() -> u32 {
    20
}

pub async fn recent_tasks(State(state): State<AppState>, Query(query): Query<RecentTasksQuery>) -> Result<Json<Value>, Error> {
    let jobs = state.jobs.status_store().recent(query.limit)?;
    let entries: Vec<Value> = jobs
        .into_iter()
        .map(|(job_id, step, progress, result, started_at)| json!({
            "job_id": job_id,
            "step": step,
            "progress": progress,
            "result": result,
            "started_at": started_at,
        }))
        .collect();
    Ok(Json(json!(entries)))
}

pub async fn stage_result(State(state): State<AppState>, Path((job_id, stage_name)): Path<(Uuid, String)>) -> Result<Response, Error> {
    let blob = state.results.read_stage(job_id, &stage_name)?.ok_or(Error::NotFound)?;
    let disposition = header::HeaderValue::from_str(&format!("attachment; filename=\"{stage_name}.csv\"")).unwrap_or_else(|_| header::HeaderValue::from_static("attachment; filename=\"stage.csv\""));
    Ok(Response::builder().header(header::CONTENT_TYPE, "text/csv").header(header::CONTENT_DISPOSITION, disposition).body(Body::from(blob)).unwrap().into_response())
}

pub async fn job_status(State(state): State<AppState>, Path(job_id): Path<Uuid>) -> Result<Json<Value>, Error> {
    let status = state.jobs.status_store().status(job_id)?;
    match status {
        Some((step, progress, result, started_at)) => Ok(Json(json!({
            "job_id": job_id,
            "step": step,
            "progress": progress,
            "result": result,
            "started_at": started_at,
        }))),
        None => Err(Error::NotFound),
    }
}

pub async fn job_logs(State(state): State<AppState>, Path(job_id): Path<Uuid>) -> Result<Json<Value>, Error> {
    let logs = state.jobs.status_store().logs(job_id)?;
    let entries: Vec<Value> = logs
        .into_iter()
        .map(|(timestamp, level, message)| json!({ "timestamp": timestamp, "level": level, "message": message }))
        .collect();
    Ok(Json(json!(entries)))
}
