#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("request to LLM backend failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("LLM backend returned status {0}")]
    Status(reqwest::StatusCode),
    #[error("LLM backend response was not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),
    #[error("could not extract a {target} from the model's response")]
    Unstructured { target: &'static str },
}
