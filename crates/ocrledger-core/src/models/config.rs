//! Configuration structures for the ingestion pipeline.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub use ocrledger_client::{OcrProviderConfig, SheetProviderConfig};

/// Main configuration for the ocrledger pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// OCR provider connection settings.
    pub ocr: OcrProviderConfig,

    /// Spreadsheet provider connection settings.
    pub sheet: SheetProviderConfig,

    /// Upload storage configuration.
    pub upload: UploadConfig,

    /// Batch ingestion configuration.
    pub ingest: IngestConfig,
}

/// Where normalized files land and how they are addressed publicly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Directory normalized files are written to.
    pub upload_dir: PathBuf,

    /// Base URL files are served from; a stored file is reachable at
    /// `{public_base_url}/_upload/{file_name}`.
    pub public_base_url: String,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("upload_files"),
            public_base_url: "http://localhost:8000".to_string(),
        }
    }
}

/// Batch ingestion limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Maximum uploads per batch; larger batches are rejected outright.
    pub max_batch_size: usize,

    /// Maximum OCR requests in flight at once (provider QPS ceiling).
    pub max_concurrency: usize,

    /// Timeout applied to every outbound HTTP call, in seconds.
    pub http_timeout_secs: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 5,
            max_concurrency: 4,
            http_timeout_secs: 30,
        }
    }
}

impl LedgerConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
        std::fs::write(path, content)
    }

    /// Overlay provider secrets from the environment, so credentials do
    /// not have to live in the config file.
    pub fn apply_env(mut self) -> Self {
        if let Ok(v) = std::env::var("APIKEY") {
            self.ocr.api_key = v;
        }
        if let Ok(v) = std::env::var("SECRETKEY") {
            self.ocr.secret_key = v;
        }
        if let Ok(v) = std::env::var("SHEET_APP_ID") {
            self.sheet.app_id = v;
        }
        if let Ok(v) = std::env::var("SHEET_APP_SECRET") {
            self.sheet.app_secret = v;
        }
        if let Ok(v) = std::env::var("BACK_END") {
            self.upload.public_base_url = v;
        }
        self
    }

    /// Shared HTTP client with the configured per-call timeout, used for
    /// every provider request so a slow call cannot stall a batch.
    pub fn http_client(&self) -> Result<reqwest::Client, crate::LedgerError> {
        reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(self.ingest.http_timeout_secs))
            .build()
            .map_err(|e| crate::LedgerError::Config(e.to_string()))
    }
}
