#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("status database error: {0}")]
    Db(#[from] rusqlite::Error),
    #[error("failed to spawn job process: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("failed to signal job process: {0}")]
    Signal(#[source] nix::Error),
    #[error("unknown job: {0}")]
    NotFound(uuid::Uuid),
}
