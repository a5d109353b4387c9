#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("failed to read few-shot file: {0}")]
    Read(#[source] std::io::Error),
    #[error("failed to parse few-shot file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to write few-shot file: {0}")]
    Write(#[from] annot_core::AtomicWriteError),
    #[error("no such few-shot example: {0}")]
    NotFound(uuid::Uuid),
}
