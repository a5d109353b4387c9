mod annotate;
mod export;
mod fewshot;
mod health;
mod icdo3;
mod jobs;
mod prompts;
mod sessions;
mod upload;

use axum::Router;
use axum::routing::{get, post, put};

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/healthz", get(health::healthz))
        .route("/status", get(health::status))
        .route("/metrics", get(health::metrics))
        .route("/api/upload/csv", post(upload::upload_csv))
        .route("/api/sessions", get(sessions::list_sessions).post(sessions::create_session))
        .route("/api/sessions/{id}", get(sessions::get_session).patch(sessions::patch_session).delete(sessions::delete_session))
        .route("/api/sessions/{id}/prompt_types", post(sessions::update_prompt_types))
        .route("/api/sessions/{id}/corrections", post(sessions::record_correction))
        .route("/api/sessions/{id}/export", get(export::export_label_csv))
        .route("/api/sessions/{id}/export/codes", get(export::export_coded_csv))
        .route("/api/annotate/process", post(annotate::process))
        .route("/api/annotate/batch", post(annotate::batch))
        .route("/api/annotate/icdo3/search", get(icdo3::search))
        .route("/api/annotate/icdo3/select", post(icdo3::select))
        .route("/api/annotate/icdo3/combine", post(icdo3::combine))
        .route("/icdo3/resolve", get(icdo3::resolve))
        .route("/run/link_rows", post(jobs::run_link_rows))
        .route("/run/quality_check", post(jobs::run_quality_check))
        .route("/run/discoverability", post(jobs::run_discoverability))
        .route("/pipeline", post(jobs::run_pipeline))
        .route("/pipeline/continue", post(jobs::continue_pipeline))
        .route("/status/{job_id}", get(jobs::job_status))
        .route("/cancel/{job_id}", post(jobs::cancel_job))
        .route("/kill/{job_id}", post(jobs::kill_job))
        .route("/results/{job_id}/{stage_name}", get(jobs::stage_result))
        .route("/recent_tasks", get(jobs::recent_tasks))
        .route("/jobs", post(jobs::submit_job))
        .route("/jobs/{id}/logs", get(jobs::job_logs))
        .route("/prompts", get(prompts::list_for_center).put(prompts::upsert))
        .route("/prompts/{center}/{report_type}/{field}", get(prompts::find_one).delete(prompts::delete))
        .route("/fewshot", get(fewshot::list_all).post(fewshot::insert))
        .route("/fewshot/match", get(fewshot::matching))
        .route("/fewshot/{id}", put(fewshot::update).delete(fewshot::delete))
}
