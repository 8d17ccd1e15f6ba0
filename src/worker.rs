//! Background worker handling file-parser API calls.

use crate::{
    api::{StorageLocation, dashboard, upload},
    config::Config,
    mapping::ConfirmationPayload,
};
use reqwest::Client;
use std::path::PathBuf;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Commands sent from the UI to the worker.
#[derive(Debug)]
pub enum WorkerCmd {
    /// Persist and apply updated settings.
    SaveSettings(Config),
    /// Upload a staged file for parsing.
    Upload {
        token: Uuid,
        path: PathBuf,
        storage: StorageLocation,
    },
    /// Submit the confirmed mappings.
    Confirm {
        token: Uuid,
        payload: ConfirmationPayload,
    },
    /// Reload the dashboard overview.
    FetchOverview,
    /// Load the processing summary for one file.
    FetchSummary { file_id: String },
}

/// Events emitted by the worker for UI updates.
///
/// Upload/confirm events echo the request token so the UI can drop
/// responses that belong to a discarded session.
#[derive(Clone, Debug)]
pub enum WorkerEvent {
    UploadFinished {
        token: Uuid,
        response: Box<upload::UploadResponse>,
    },
    UploadFailed {
        token: Uuid,
        message: String,
    },
    ConfirmFinished {
        token: Uuid,
        response: Box<upload::ConfirmResponse>,
    },
    ConfirmFailed {
        token: Uuid,
        message: String,
    },
    OverviewLoaded(Box<dashboard::DashboardOverview>),
    OverviewFailed(String),
    SummaryLoaded {
        file_id: String,
        summary: dashboard::ProcessingSummary,
    },
    SummaryFailed {
        file_id: String,
        message: String,
    },
    /// Informational log message.
    Log(String),
}

/// Main worker loop: handle commands sequentially.
///
/// Processing one command at a time keeps at most one network call in
/// flight per session.
pub async fn run(
    mut rx: mpsc::Receiver<WorkerCmd>,
    tx: mpsc::Sender<WorkerEvent>,
    mut cfg: Config,
) {
    // Shared HTTP client for all API calls.
    let http = Client::new();
    tracing::info!("worker started (backend {})", cfg.backend.base_url);

    while let Some(cmd) = rx.recv().await {
        match cmd {
            WorkerCmd::SaveSettings(new_cfg) => {
                tracing::info!("settings updated");
                cfg = new_cfg;
                let _ = tx.send(WorkerEvent::Log("settings updated".into())).await;
            }

            WorkerCmd::Upload {
                token,
                path,
                storage,
            } => {
                tracing::info!("upload start: {} ({})", path.display(), storage.as_str());
                match upload::upload_file(&http, &cfg.backend.base_url, &path, storage).await {
                    Ok(response) => {
                        tracing::info!(
                            "upload success: id {} ({} columns)",
                            response.file_upload_id,
                            response.extracted_columns.len()
                        );
                        let _ = tx
                            .send(WorkerEvent::UploadFinished {
                                token,
                                response: Box::new(response),
                            })
                            .await;
                    }
                    Err(e) => {
                        tracing::error!("upload failed: {e}");
                        let _ = tx
                            .send(WorkerEvent::UploadFailed {
                                token,
                                message: e.to_string(),
                            })
                            .await;
                    }
                }
            }

            WorkerCmd::Confirm { token, payload } => {
                tracing::info!("confirm start: id {}", payload.file_upload_id);
                match upload::confirm_mappings(&http, &cfg.backend.base_url, &payload).await {
                    Ok(response) => {
                        tracing::info!("confirm success: status {}", response.status);
                        let _ = tx
                            .send(WorkerEvent::ConfirmFinished {
                                token,
                                response: Box::new(response),
                            })
                            .await;
                    }
                    Err(e) => {
                        tracing::error!("confirm failed: {e}");
                        let _ = tx
                            .send(WorkerEvent::ConfirmFailed {
                                token,
                                message: e.to_string(),
                            })
                            .await;
                    }
                }
            }

            WorkerCmd::FetchOverview => {
                tracing::info!("fetch overview");
                match dashboard::fetch_overview(&http, &cfg.backend.base_url).await {
                    Ok(overview) => {
                        tracing::info!(
                            "overview loaded: {} recent uploads",
                            overview.recent_uploads.len()
                        );
                        let _ = tx
                            .send(WorkerEvent::OverviewLoaded(Box::new(overview)))
                            .await;
                    }
                    Err(e) => {
                        tracing::error!("overview failed: {e}");
                        let _ = tx.send(WorkerEvent::OverviewFailed(e.to_string())).await;
                    }
                }
            }

            WorkerCmd::FetchSummary { file_id } => {
                tracing::info!("fetch summary: {file_id}");
                match dashboard::fetch_summary(&http, &cfg.backend.base_url, &file_id).await {
                    Ok(summary) => {
                        let _ = tx
                            .send(WorkerEvent::SummaryLoaded { file_id, summary })
                            .await;
                    }
                    Err(e) => {
                        tracing::error!("summary failed: {file_id}: {e}");
                        let _ = tx
                            .send(WorkerEvent::SummaryFailed {
                                file_id,
                                message: e.to_string(),
                            })
                            .await;
                    }
                }
            }
        }
    }
}
