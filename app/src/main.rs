use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use annot_config::Config;
use annot_dictionary::DictionaryIndex;
use annot_engine::AnnotationEngine;
use annot_fewshot::FewShotStore;
use annot_jobs::{JobRuntime, ResultsStore, StatusStore};
use annot_llm::{LlmClient, LlmClientConfig};
use annot_prompts::PromptLibrary;
use annot_server::{AppState, ServeConfig};
use annot_session::SessionStore;
use anyhow::Context;
use args::Args;
use clap::Parser;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

mod args;
mod logger;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = Config::load(&args.config).with_context(|| format!("failed to load config from {}", args.config.display()))?;

    let log_filter = args.log_filter.as_deref().unwrap_or(&config.server.log_filter);
    logger::init(log_filter);

    log::info!("annotator starting up");

    let state = build_state(&config)?;

    let listen_address: SocketAddr = config.server.listen_address.parse().with_context(|| format!("invalid listen address {:?}", config.server.listen_address))?;

    let shutdown_signal = CancellationToken::new();
    let shutdown_waiter = shutdown_signal.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("ctrl-c received");
        }
        shutdown_waiter.cancel();
    });

    annot_server::serve(ServeConfig {
        listen_address,
        state,
        cors_origins: config.server.cors_origins.clone(),
        shutdown_signal,
        version: env!("CARGO_PKG_VERSION").to_string(),
        bound_addr_sender: None,
    })
    .await
}

fn build_state(config: &Config) -> anyhow::Result<AppState> {
    let dictionary = Arc::new(DictionaryIndex::load(&config.paths.dictionary_csv).with_context(|| format!("failed to load ICD-O-3 dictionary from {}", config.paths.dictionary_csv))?);

    let llm = Arc::new(LlmClient::new(LlmClientConfig {
        endpoint: config.llm.endpoint.clone(),
        model_name: config.llm.model_name.clone(),
        timeout: Duration::from_secs(config.llm.timeout_secs),
    }));

    let engine = Arc::new(AnnotationEngine::new(llm.clone(), dictionary.clone(), config.llm.concurrency));

    let prompts = Arc::new(Mutex::new(PromptLibrary::new(&config.paths.prompts_dir)));
    let fewshot = Arc::new(Mutex::new(FewShotStore::load(&config.paths.fewshot_file).context("failed to load few-shot example store")?));
    let sessions = Arc::new(Mutex::new(SessionStore::new(&config.paths.sessions_dir)));

    let status_store = StatusStore::open(&config.paths.jobs_db).context("failed to open job status store")?;
    let jobs = Arc::new(JobRuntime::new(
        status_store,
        config.jobs.etl_host.clone(),
        Duration::from_millis(config.jobs.poll_interval_ms),
        Duration::from_millis(config.jobs.graceful_shutdown_ms),
    ));
    let results = Arc::new(ResultsStore::open(&config.paths.results_db).context("failed to open job results store")?);

    Ok(AppState { dictionary, engine, llm, prompts, fewshot, sessions, jobs, results })
}
