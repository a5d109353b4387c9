use std::sync::Arc;

use annot_dictionary::DictionaryIndex;
use annot_engine::AnnotationEngine;
use annot_fewshot::FewShotStore;
use annot_jobs::{JobRuntime, ResultsStore};
use annot_llm::LlmClient;
use annot_prompts::PromptLibrary;
use annot_session::SessionStore;
use tokio::sync::Mutex;

/// Shared application state handed to every axum handler, one `Arc` clone
/// per request.
#[derive(Clone)]
pub struct AppState {
    pub dictionary: Arc<DictionaryIndex>,
    pub engine: Arc<AnnotationEngine>,
    pub llm: Arc<LlmClient>,
    pub prompts: Arc<Mutex<PromptLibrary>>,
    pub fewshot: Arc<Mutex<FewShotStore>>,
    pub sessions: Arc<Mutex<SessionStore>>,
    pub jobs: Arc<JobRuntime>,
    pub results: Arc<ResultsStore>,
}
