#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("failed to write export CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to open export destination: {0}")]
    Io(#[from] std::io::Error),
}
