#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("failed to read session file: {0}")]
    Read(#[source] std::io::Error),
    #[error("failed to parse session file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to write session file: {0}")]
    Write(#[from] annot_core::AtomicWriteError),
    #[error("no such session: {0}")]
    NotFound(uuid::Uuid),
    #[error("removing these prompt types would leave session {0} with none")]
    EmptyPromptTypes(uuid::Uuid),
}
