//! Config model and persistence helpers.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

use crate::api::StorageLocation;

/// Environment variable that overrides the configured backend base URL.
pub const BASE_URL_ENV: &str = "UPLOAD_TUI_BASE_URL";

/// Top-level configuration stored in `config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// File-parser backend connection values.
    pub backend: BackendCfg,
    /// Upload defaults.
    pub upload: UploadCfg,
}

/// Backend connection values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendCfg {
    /// Base URL of the file-parser service.
    pub base_url: String,
}

/// Defaults applied to new uploads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadCfg {
    /// Storage location preselected on the upload screen.
    pub storage_location: StorageLocation,
}

impl Config {
    /// Load from disk or create defaults when missing, then apply
    /// environment overrides.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        let mut cfg = if path.exists() {
            let s = fs::read_to_string(path)?;
            toml::from_str(&s)?
        } else {
            let cfg = Self::default();
            cfg.save(path)?;
            cfg
        };
        // The base URL may be supplied externally; the override is resolved
        // here once so the rest of the app never reads the environment.
        if let Ok(url) = std::env::var(BASE_URL_ENV)
            && !url.is_empty()
        {
            tracing::info!("base_url overridden from {BASE_URL_ENV}");
            cfg.backend.base_url = url;
        }
        Ok(cfg)
    }

    /// Persist the config as pretty TOML.
    pub fn save(&self, path: &Path) -> Result<()> {
        let s = toml::to_string_pretty(self)?;
        fs::write(path, s)?;
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendCfg {
                base_url: "http://localhost:8000".into(),
            },
            upload: UploadCfg {
                storage_location: StorageLocation::Cloud,
            },
        }
    }
}
