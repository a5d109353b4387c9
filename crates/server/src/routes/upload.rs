use axum::Json;
use axum::extract::Multipart;
use serde_json::{Value, json};

use crate::error::Error;

const PREVIEW_ROWS: usize = 10;

/// Parses an uploaded notes CSV far enough to show the operator what they
/// are about to ingest: its columns, a preview of the first rows, every
/// distinct `report_type` value seen, and whether an `annotations` column
/// is already present (meaning the file carries prior labels, not just raw
/// notes). The full row set comes back too so the client can submit it
/// straight to `/pipeline` without a second upload round trip.
pub async fn upload_csv(mut multipart: Multipart) -> Result<Json<Value>, Error> {
    let mut bytes = Vec::new();
    while let Some(field) = multipart.next_field().await.map_err(|e| Error::Upstream(e.to_string()))? {
        bytes.extend_from_slice(&field.bytes().await.map_err(|e| Error::Upstream(e.to_string()))?);
    }
    if bytes.is_empty() {
        return Err(Error::Upstream("no file field in multipart body".to_string()));
    }

    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(bytes.as_slice());
    let columns: Vec<String> = reader.headers().map_err(|e| Error::Upstream(e.to_string()))?.iter().map(str::to_string).collect();

    let report_type_index = columns.iter().position(|c| c.eq_ignore_ascii_case("report_type"));
    let annotations_present = columns.iter().any(|c| c.eq_ignore_ascii_case("annotations"));

    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut report_types = std::collections::BTreeSet::new();
    for record in reader.records() {
        let record = record.map_err(|e| Error::Upstream(e.to_string()))?;
        if let Some(idx) = report_type_index
            && let Some(value) = record.get(idx)
        {
            report_types.insert(value.to_string());
        }
        rows.push(record.iter().map(str::to_string).collect());
    }

    Ok(Json(json!({
        "columns": columns,
        "row_count": rows.len(),
        "preview": rows.iter().take(PREVIEW_ROWS).collect::<Vec<_>>(),
        "rows": rows,
        "report_types": report_types,
        "annotations_present": annotations_present,
    })))
}
