#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("io error at {path}: {source}")]
    Io { path: String, #[source] source: std::io::Error },
    #[error("malformed prompt file {path}: {source}")]
    Parse { path: String, #[source] source: serde_json::Error },
    #[error("unknown center {0}")]
    UnknownCenter(String),
    #[error("malformed prompt key: {0}")]
    MalformedKey(String),
    #[error("prompt not found: center={center} report_type={report_type} field={field}")]
    NotFound { center: String, report_type: String, field: String },
}
