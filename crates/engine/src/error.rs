#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("llm request failed: {0}")]
    Llm(#[from] annot_llm::Error),
    #[error("no prompt for report_type={report_type} field={field} center={center}")]
    MissingPrompt { report_type: String, field: String, center: String },
}
