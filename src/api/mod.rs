//! HTTP client helpers for the file-parser backend.

/// Dashboard overview and processing-summary endpoints.
pub mod dashboard;
/// Upload and confirm-mappings endpoints.
pub mod upload;

use anyhow::{Result, anyhow};
use serde::{Deserialize, Deserializer, Serialize};

/// Where the backend should keep the uploaded file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageLocation {
    /// Cloud object storage.
    #[default]
    Cloud,
    /// Backend-local disk.
    Local,
}

impl StorageLocation {
    /// Wire value for the multipart `storageLocation` field.
    pub fn as_str(self) -> &'static str {
        match self {
            StorageLocation::Cloud => "cloud",
            StorageLocation::Local => "local",
        }
    }

    /// Human-readable label for the upload screen.
    pub fn label(self) -> &'static str {
        match self {
            StorageLocation::Cloud => "Cloud Storage",
            StorageLocation::Local => "Local Storage",
        }
    }

    /// Flip between the two choices.
    pub fn toggled(self) -> Self {
        match self {
            StorageLocation::Cloud => StorageLocation::Local,
            StorageLocation::Local => StorageLocation::Cloud,
        }
    }
}

/// Upload ids arrive as a number or a string depending on the backend
/// version; normalize to a string so callers can treat them as opaque.
pub(crate) fn de_upload_id<'de, D>(d: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Num(i64),
        Str(String),
    }
    Ok(match Repr::deserialize(d)? {
        Repr::Num(n) => n.to_string(),
        Repr::Str(s) => s,
    })
}

/// Join the configured base URL with an endpoint path.
pub(crate) fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), path)
}

/// Convert non-2xx responses into a structured error.
pub(crate) async fn ensure_success(resp: reqwest::Response) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_else(|_| "".into());
    Err(anyhow!("HTTP status {status} error: {body}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_location_wire_values() {
        assert_eq!(StorageLocation::Cloud.as_str(), "cloud");
        assert_eq!(StorageLocation::Local.as_str(), "local");
        assert_eq!(StorageLocation::Cloud.toggled(), StorageLocation::Local);
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        assert_eq!(
            endpoint("http://localhost:8000/", "/file-parser/api/upload/"),
            "http://localhost:8000/file-parser/api/upload/"
        );
        assert_eq!(endpoint("http://h", "/x"), "http://h/x");
    }
}
