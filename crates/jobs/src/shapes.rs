/// The job shapes the runtime can execute. Each names a distinct external
/// command invocation the driver shells out to; `Annotate` is the one shape
/// this workspace implements natively (via `annot-engine`), the rest front
/// the linking/quality-check/discoverability system that is out of scope
/// here and addressed through the configured `etl_host`/external command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobShape {
    Ingest,
    Annotate,
    LinkRows,
    QualityCheck,
    Discoverability,
    Export,
}

impl JobShape {
    pub fn as_str(self) -> &'static str {
        match self {
            JobShape::Ingest => "ingest",
            JobShape::Annotate => "annotate",
            JobShape::LinkRows => "link_rows",
            JobShape::QualityCheck => "quality_check",
            JobShape::Discoverability => "discoverability",
            JobShape::Export => "export",
        }
    }
}
