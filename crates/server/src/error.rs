use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to bind to address: {0}")]
    Bind(#[source] std::io::Error),
    #[error("server error: {0}")]
    Server(#[source] std::io::Error),
    #[error(transparent)]
    Session(#[from] annot_session::Error),
    #[error(transparent)]
    FewShot(#[from] annot_fewshot::Error),
    #[error(transparent)]
    Prompts(#[from] annot_prompts::Error),
    #[error(transparent)]
    Export(#[from] annot_export::Error),
    #[error(transparent)]
    Jobs(#[from] annot_jobs::Error),
    #[error("not found")]
    NotFound,
    #[error("upstream error: {0}")]
    Upstream(String),
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::NotFound => StatusCode::NOT_FOUND,
            Error::Session(annot_session::Error::NotFound(_)) => StatusCode::NOT_FOUND,
            Error::FewShot(annot_fewshot::Error::NotFound(_)) => StatusCode::NOT_FOUND,
            Error::Prompts(annot_prompts::Error::NotFound { .. }) => StatusCode::NOT_FOUND,
            Error::Jobs(annot_jobs::Error::NotFound(_)) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}
