//! Upload and confirm-mappings API wrappers.

use anyhow::Result;
use reqwest::Client;
use serde::{Deserialize, Deserializer};
use std::path::Path;

use super::{StorageLocation, de_upload_id, endpoint, ensure_success};
use crate::mapping::{ConfirmationPayload, MappingRecord};
use crate::schema::SchemaCatalog;

/// Response body of `POST /file-parser/api/upload/`.
#[derive(Clone, Debug, Deserialize)]
pub struct UploadResponse {
    /// Opaque id used for the confirm call and dashboard lookups.
    #[serde(deserialize_with = "de_upload_id")]
    pub file_upload_id: String,
    /// Raw status label as reported by the backend.
    #[serde(default)]
    pub status: String,
    /// Columns detected in the uploaded file, in file order.
    #[serde(default)]
    pub extracted_columns: Vec<String>,
    /// Suggested mappings, one per matched column.
    #[serde(default)]
    pub mappings: Vec<MappingRecord>,
    /// Columns the backend could not match.
    #[serde(default)]
    pub unmapped: Unmapped,
    /// Destination schema the mappings must reference.
    #[serde(default)]
    pub expected_schema: SchemaCatalog,
    /// Row-level processing counters.
    #[serde(default)]
    pub processing_stats: ProcessingStats,
}

/// Wrapper for the backend's unmapped-column list.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Unmapped {
    #[serde(default)]
    pub unmapped_fields: Vec<String>,
}

/// Row-level counters reported with upload and confirm responses.
///
/// The backend occasionally reports successful + failed != total; the
/// values are displayed as-is rather than rejected.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ProcessingStats {
    #[serde(default)]
    pub total_records: u64,
    #[serde(default)]
    pub successful_records: u64,
    #[serde(default)]
    pub failed_records: u64,
    #[serde(default)]
    pub errors: Vec<String>,
}

/// Response body of the confirm-mappings call; mirrors the upload result
/// shape minus the id and schema.
#[derive(Clone, Debug, Deserialize)]
pub struct ConfirmResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub extracted_columns: Vec<String>,
    /// Echoed mappings; older backends nest them one level deeper.
    #[serde(default, deserialize_with = "de_mappings")]
    pub mappings: Vec<MappingRecord>,
    #[serde(default)]
    pub unmapped: Unmapped,
    #[serde(default)]
    pub processing_stats: ProcessingStats,
}

/// Accept `mappings` either flat (`[...]`) or nested (`{"mappings": [...]}`).
fn de_mappings<'de, D>(d: D) -> Result<Vec<MappingRecord>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Flat(Vec<MappingRecord>),
        Nested { mappings: Vec<MappingRecord> },
    }
    Ok(match Repr::deserialize(d)? {
        Repr::Flat(v) => v,
        Repr::Nested { mappings } => mappings,
    })
}

/// Upload a file for parsing and mapping inference.
pub async fn upload_file(
    http: &Client,
    base_url: &str,
    path: &Path,
    storage: StorageLocation,
) -> Result<UploadResponse> {
    let bytes = tokio::fs::read(path).await?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".into());

    let form = reqwest::multipart::Form::new()
        .part(
            "file",
            reqwest::multipart::Part::bytes(bytes).file_name(filename),
        )
        .text("storageLocation", storage.as_str());

    let url = endpoint(base_url, "/file-parser/api/upload/");
    let resp = http.post(url).multipart(form).send().await?;
    let resp = ensure_success(resp).await?;
    Ok(resp.json::<UploadResponse>().await?)
}

/// Submit the confirmed mappings for a previously uploaded file.
pub async fn confirm_mappings(
    http: &Client,
    base_url: &str,
    payload: &ConfirmationPayload,
) -> Result<ConfirmResponse> {
    let url = endpoint(
        base_url,
        &format!(
            "/file-parser/api/upload/{}/confirm-mappings",
            urlencoding::encode(&payload.file_upload_id)
        ),
    );
    let resp = http.post(url).json(payload).send().await?;
    let resp = ensure_success(resp).await?;
    Ok(resp.json::<ConfirmResponse>().await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_response_decode() {
        // Numeric ids and missing optional sections must decode.
        let resp: UploadResponse = serde_json::from_value(serde_json::json!({
            "file_upload_id": 7,
            "status": "MappingPending",
            "extracted_columns": ["Inv No", "Amt (decimal)"],
            "mappings": [
                {"source_field": "Amt (decimal)", "target_table": "invoices",
                 "target_column": "total (decimal)"}
            ],
            "expected_schema": {"invoices": {"total": "decimal"}}
        }))
        .unwrap();
        assert_eq!(resp.file_upload_id, "7");
        assert_eq!(resp.extracted_columns.len(), 2);
        assert!(resp.unmapped.unmapped_fields.is_empty());
        assert_eq!(resp.processing_stats.total_records, 0);
        assert!(resp.expected_schema.contains_table("invoices"));
    }

    #[test]
    fn test_confirm_response_accepts_flat_and_nested_mappings() {
        let flat: ConfirmResponse = serde_json::from_value(serde_json::json!({
            "status": "Completed",
            "mappings": [{"source_field": "a", "target_table": "t", "target_column": "c"}]
        }))
        .unwrap();
        let nested: ConfirmResponse = serde_json::from_value(serde_json::json!({
            "status": "Completed",
            "mappings": {"mappings": [
                {"source_field": "a", "target_table": "t", "target_column": "c"}
            ]}
        }))
        .unwrap();
        assert_eq!(flat.mappings, nested.mappings);
        assert_eq!(flat.mappings[0].source_field, "a");
    }
}
