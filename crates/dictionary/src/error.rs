#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("failed to open dictionary CSV: {0}")]
    Open(#[from] std::io::Error),
    #[error("failed to parse dictionary CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("dictionary CSV row {row} is missing required column {column}")]
    MissingColumn { row: usize, column: &'static str },
}
