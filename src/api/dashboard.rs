//! Dashboard overview and processing-summary API wrappers.

use anyhow::Result;
use reqwest::Client;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};

use super::{de_upload_id, endpoint, ensure_success};

/// Response body of `GET /file-parser/api/dashboard/overview`.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct DashboardOverview {
    #[serde(default)]
    pub total_files_uploaded: u64,
    #[serde(default)]
    pub completed_processing: u64,
    #[serde(default)]
    pub failed_processing: u64,
    #[serde(default)]
    pub partial_files: u64,
    #[serde(default)]
    pub recent_uploads: Vec<RecentUpload>,
}

/// One row of the recent-uploads table.
#[derive(Clone, Debug, Deserialize)]
pub struct RecentUpload {
    #[serde(default, deserialize_with = "de_upload_id")]
    pub file_upload_id: String,
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub status: String,
    /// Timestamp string as sent by the backend; formatted at render time.
    #[serde(default)]
    pub upload_time: String,
    #[serde(default)]
    pub records_processed: u64,
    #[serde(default)]
    pub storage_location: String,
    #[serde(default)]
    pub file_type: String,
    #[serde(default)]
    pub file_size: u64,
    #[serde(default)]
    pub total_records_found: u64,
    #[serde(default)]
    pub failed_records: u64,
    #[serde(default)]
    pub error_summary: Option<String>,
    /// Shape varies across backend versions; kept opaque for display.
    #[serde(default)]
    pub unmapped_columns: serde_json::Value,
}

/// One row of a summary table; values stay untyped JSON.
pub type SummaryRow = BTreeMap<String, serde_json::Value>;

/// Response body of the per-file processing summary; each entity kind is
/// present only when the file produced rows for it.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ProcessingSummary {
    #[serde(default)]
    pub invoices: Option<Vec<SummaryRow>>,
    #[serde(default)]
    pub vendors: Option<Vec<SummaryRow>>,
    #[serde(default)]
    pub customers: Option<Vec<SummaryRow>>,
    #[serde(default)]
    pub payments: Option<Vec<SummaryRow>>,
    #[serde(default)]
    pub invoice_items: Option<Vec<SummaryRow>>,
}

/// Entity kinds a summary response can carry, in display order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SummaryKind {
    Invoices,
    Vendors,
    Customers,
    Payments,
    InvoiceItems,
}

impl SummaryKind {
    /// Tab label for the summary popup.
    pub fn label(self) -> &'static str {
        match self {
            SummaryKind::Invoices => "Invoices",
            SummaryKind::Vendors => "Vendors",
            SummaryKind::Customers => "Customers",
            SummaryKind::Payments => "Payments",
            SummaryKind::InvoiceItems => "Invoice Items",
        }
    }
}

/// Rows of one entity kind, tagged with that kind instead of being
/// duck-typed off whatever keys happen to be present.
#[derive(Clone, Debug)]
pub struct SummaryTable {
    pub kind: SummaryKind,
    pub rows: Vec<SummaryRow>,
}

impl SummaryTable {
    /// Column set of this table: sorted union of row keys, so the layout
    /// is stable regardless of which row arrives first.
    pub fn columns(&self) -> Vec<String> {
        let mut cols = BTreeSet::new();
        for row in &self.rows {
            cols.extend(row.keys().cloned());
        }
        cols.into_iter().collect()
    }
}

impl ProcessingSummary {
    /// Tables present in the response, in declared kind order.
    pub fn tables(&self) -> Vec<SummaryTable> {
        let kinds = [
            (SummaryKind::Invoices, &self.invoices),
            (SummaryKind::Vendors, &self.vendors),
            (SummaryKind::Customers, &self.customers),
            (SummaryKind::Payments, &self.payments),
            (SummaryKind::InvoiceItems, &self.invoice_items),
        ];
        kinds
            .into_iter()
            .filter_map(|(kind, rows)| {
                rows.as_ref().map(|rows| SummaryTable {
                    kind,
                    rows: rows.clone(),
                })
            })
            .collect()
    }
}

/// Fetch the aggregate counters and recent uploads.
pub async fn fetch_overview(http: &Client, base_url: &str) -> Result<DashboardOverview> {
    let url = endpoint(base_url, "/file-parser/api/dashboard/overview");
    let resp = http.get(url).send().await?;
    let resp = ensure_success(resp).await?;
    Ok(resp.json::<DashboardOverview>().await?)
}

/// Fetch the per-file processing summary.
pub async fn fetch_summary(
    http: &Client,
    base_url: &str,
    file_id: &str,
) -> Result<ProcessingSummary> {
    let url = endpoint(
        base_url,
        &format!(
            "/file-parser/api/dashboard/processing-summary/{}",
            urlencoding::encode(file_id)
        ),
    );
    let resp = http.get(url).send().await?;
    let resp = ensure_success(resp).await?;
    Ok(resp.json::<ProcessingSummary>().await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_tables_keep_declared_order() {
        let summary: ProcessingSummary = serde_json::from_value(serde_json::json!({
            "payments": [{"amount": 10}],
            "invoices": [{"invoice_number": "A-1", "total": 10.5}]
        }))
        .unwrap();
        let tables = summary.tables();
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0].kind, SummaryKind::Invoices);
        assert_eq!(tables[1].kind, SummaryKind::Payments);
    }

    #[test]
    fn test_summary_columns_are_sorted_union() {
        // Heterogeneous rows still yield one deterministic column set.
        let table = SummaryTable {
            kind: SummaryKind::Vendors,
            rows: vec![
                serde_json::from_value(serde_json::json!({"name": "Acme"})).unwrap(),
                serde_json::from_value(serde_json::json!({"address": "x", "name": "Bolt"}))
                    .unwrap(),
            ],
        };
        assert_eq!(table.columns(), vec!["address", "name"]);
    }

    #[test]
    fn test_overview_decode_with_minimal_row() {
        let overview: DashboardOverview = serde_json::from_value(serde_json::json!({
            "total_files_uploaded": 3,
            "recent_uploads": [{"file_upload_id": 1, "filename": "a.csv", "status": "Completed"}]
        }))
        .unwrap();
        assert_eq!(overview.recent_uploads[0].file_upload_id, "1");
        assert_eq!(overview.recent_uploads[0].records_processed, 0);
    }
}
