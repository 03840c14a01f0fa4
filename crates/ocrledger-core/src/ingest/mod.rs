//! Batch ingestion orchestrator.
//!
//! Fans a batch of uploads through normalization, OCR, and mapping with
//! bounded concurrency. One file's failure never cancels its siblings;
//! every failure stays attributable to the upload it came from.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::error::{IngestError, Result};
use crate::files::{FileNormalizer, NormalizedFile, UploadedFile};
use crate::mapping;
use crate::models::config::IngestConfig;
use crate::models::record::{BankSlipRecord, VatInvoiceRecord};
use ocrledger_client::{ClientError, DocumentKind, OcrClient, WordsResult};

/// Extraction seam the orchestrator fans out over. Implemented by the
/// real provider client; tests substitute a scripted one.
#[async_trait]
pub trait OcrExtract: Send + Sync {
    /// Make sure the provider is reachable and a credential is on hand.
    /// Called once per batch, before any file is touched, so an auth
    /// failure aborts the whole batch instead of failing file by file.
    async fn prepare(&self) -> std::result::Result<(), ClientError> {
        Ok(())
    }

    async fn extract(
        &self,
        file_name: &str,
        data: &[u8],
        kind: DocumentKind,
    ) -> std::result::Result<WordsResult, ClientError>;
}

#[async_trait]
impl OcrExtract for OcrClient {
    async fn prepare(&self) -> std::result::Result<(), ClientError> {
        self.warm_up().await
    }

    async fn extract(
        &self,
        file_name: &str,
        data: &[u8],
        kind: DocumentKind,
    ) -> std::result::Result<WordsResult, ClientError> {
        OcrClient::extract(self, file_name, data, kind).await
    }
}

/// One upload that could not be turned into a record, with a
/// human-readable reason for the operator.
#[derive(Debug, Clone)]
pub struct FileFailure {
    pub file_name: String,
    pub error: String,
}

impl FileFailure {
    fn new(file_name: &str, error: impl ToString) -> Self {
        Self {
            file_name: file_name.to_string(),
            error: error.to_string(),
        }
    }
}

/// Outcome of one batch: accepted records alongside labeled failures.
#[derive(Debug)]
pub struct IngestReport<R> {
    pub succeeded: Vec<R>,
    pub failed: Vec<FileFailure>,
}

/// A normalized unit still tied to the upload it was derived from.
struct IngestUnit {
    source_name: String,
    file: NormalizedFile,
}

/// Drives uploads through the pipeline against one OCR provider.
pub struct Ingestor<O> {
    normalizer: FileNormalizer,
    ocr: Arc<O>,
    config: IngestConfig,
    public_base_url: String,
}

impl<O: OcrExtract + 'static> Ingestor<O> {
    pub fn new(
        normalizer: FileNormalizer,
        ocr: Arc<O>,
        config: IngestConfig,
        public_base_url: impl Into<String>,
    ) -> Self {
        Self {
            normalizer,
            ocr,
            config,
            public_base_url: public_base_url.into(),
        }
    }

    /// Ingest a batch of bank transfer slips.
    ///
    /// Slip files stay in the upload directory: each record carries a
    /// `bank_slip_url` pointing at its source file.
    pub async fn ingest_bank_slips(
        &self,
        files: &[UploadedFile],
    ) -> Result<IngestReport<BankSlipRecord>> {
        let (units, mut failed) = self.normalize_batch(files).await?;
        let outcomes = self.run_ocr(&units, DocumentKind::BankSlip).await;

        let mut succeeded = Vec::new();
        for (unit, outcome) in units.iter().zip(outcomes) {
            let url = format!(
                "{}/_upload/{}",
                self.public_base_url, unit.file.file_name
            );
            match outcome.and_then(|words| {
                mapping::map_bank_slip(&words, url).map_err(|e| e.to_string())
            }) {
                Ok(record) => succeeded.push(record),
                Err(error) => {
                    warn!(file_name = %unit.source_name, %error, "bank slip unit failed");
                    failed.push(FileFailure::new(&unit.source_name, error));
                }
            }
        }

        info!(
            succeeded = succeeded.len(),
            failed = failed.len(),
            "bank slip batch finished"
        );
        Ok(IngestReport { succeeded, failed })
    }

    /// Ingest a batch of VAT invoices.
    ///
    /// Invoice files are deleted once their unit is consumed, success or
    /// not; nothing downstream references them by URL.
    pub async fn ingest_vat_invoices(
        &self,
        files: &[UploadedFile],
    ) -> Result<IngestReport<VatInvoiceRecord>> {
        let (units, mut failed) = self.normalize_batch(files).await?;
        let outcomes = self.run_ocr(&units, DocumentKind::VatInvoice).await;

        let mut succeeded = Vec::new();
        for (unit, outcome) in units.iter().zip(outcomes) {
            match outcome.and_then(|words| {
                mapping::map_vat_invoice(&words, unit.source_name.clone())
                    .map_err(|e| e.to_string())
            }) {
                Ok(record) => succeeded.push(record),
                Err(error) => {
                    warn!(file_name = %unit.source_name, %error, "VAT invoice unit failed");
                    failed.push(FileFailure::new(&unit.source_name, error));
                }
            }
            self.normalizer.remove(&unit.file).await;
        }

        info!(
            succeeded = succeeded.len(),
            failed = failed.len(),
            "VAT invoice batch finished"
        );
        Ok(IngestReport { succeeded, failed })
    }

    /// Enforce the batch ceiling, then normalize every upload. A failing
    /// upload contributes one labeled failure and excludes only its own
    /// derived units.
    async fn normalize_batch(
        &self,
        files: &[UploadedFile],
    ) -> Result<(Vec<IngestUnit>, Vec<FileFailure>)> {
        let limit = self.config.max_batch_size;
        if files.len() > limit {
            return Err(IngestError::BatchTooLarge {
                given: files.len(),
                limit,
            }
            .into());
        }
        self.ocr.prepare().await?;

        let mut units = Vec::new();
        let mut failed = Vec::new();
        for file in files {
            match self.normalizer.normalize(file).await {
                Ok(normalized) => units.extend(normalized.into_iter().map(|f| IngestUnit {
                    source_name: file.file_name.clone(),
                    file: f,
                })),
                Err(e) => {
                    warn!(file_name = %file.file_name, error = %e, "normalization failed");
                    failed.push(FileFailure::new(&file.file_name, e));
                }
            }
        }

        Ok((units, failed))
    }

    /// Run OCR for every unit with bounded concurrency, awaiting all of
    /// them jointly. Outcomes come back in unit order, so callers
    /// correlate by position, not completion order.
    async fn run_ocr(
        &self,
        units: &[IngestUnit],
        kind: DocumentKind,
    ) -> Vec<std::result::Result<WordsResult, String>> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));

        let tasks = units.iter().map(|unit| {
            let semaphore = semaphore.clone();
            let ocr = self.ocr.clone();
            async move {
                let _permit = semaphore
                    .acquire()
                    .await
                    .map_err(|e| e.to_string())?;
                let data = tokio::fs::read(&unit.file.path)
                    .await
                    .map_err(|e| format!("failed to read normalized file: {e}"))?;
                ocr.extract(&unit.file.file_name, &data, kind)
                    .await
                    .map_err(|e| e.to_string())
            }
        });

        join_all(tasks).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::files::pdf_fixtures::build_pdf;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Marker content that makes the scripted provider fail the request.
    const POISON: &[u8] = b"poison";

    struct ScriptedOcr {
        calls: AtomicUsize,
    }

    impl ScriptedOcr {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl OcrExtract for ScriptedOcr {
        async fn extract(
            &self,
            _file_name: &str,
            data: &[u8],
            kind: DocumentKind,
        ) -> std::result::Result<WordsResult, ClientError> {
            self.calls.fetch_add(1, Ordering::SeqCst);

            if data == POISON {
                return Err(ClientError::Request {
                    provider: "ocr",
                    status: 500,
                    payload: "scripted failure".to_string(),
                });
            }

            let value = match kind {
                DocumentKind::BankSlip => json!({
                    "交易日期": [{"word": "2024年05月01日"}],
                    "小写金额": [{"word": "¥100.00"}],
                    "付款人户名": [{"word": "甲"}],
                    "收款人户名": [{"word": "乙"}],
                }),
                DocumentKind::VatInvoice => json!({
                    "InvoiceDate": "2024年03月15日",
                    "InvoiceNum": "001",
                    "InvoiceType": "普通发票",
                    "PurchaserName": "购",
                    "PurchaserRegisterNum": "P1",
                    "SellerName": "销",
                    "SellerRegisterNum": "S1",
                    "AmountInFiguers": "339.00",
                }),
            };
            Ok(serde_json::from_value(value).unwrap())
        }
    }

    async fn ingestor(
        dir: &tempfile::TempDir,
    ) -> (Ingestor<ScriptedOcr>, Arc<ScriptedOcr>) {
        let ocr = ScriptedOcr::new();
        let normalizer = FileNormalizer::new(dir.path()).await.unwrap();
        (
            Ingestor::new(
                normalizer,
                ocr.clone(),
                IngestConfig::default(),
                "http://localhost:8000",
            ),
            ocr,
        )
    }

    fn image(name: &str) -> UploadedFile {
        UploadedFile::new(name, vec![0x89, b'P', b'N', b'G'])
    }

    #[tokio::test]
    async fn one_failing_file_does_not_abort_siblings() {
        let dir = tempfile::tempdir().unwrap();
        let (ingestor, _) = ingestor(&dir).await;

        let mut files: Vec<UploadedFile> =
            (1..=5).map(|i| image(&format!("f{i}.png"))).collect();
        files[2].data = POISON.to_vec();

        let report = ingestor.ingest_bank_slips(&files).await.unwrap();

        assert_eq!(report.succeeded.len(), 4);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].file_name, "f3.png");
        assert!(report.failed[0].error.contains("scripted failure"));
    }

    #[tokio::test]
    async fn oversized_batch_is_rejected_before_any_work() {
        let dir = tempfile::tempdir().unwrap();
        let (ingestor, ocr) = ingestor(&dir).await;

        let files: Vec<UploadedFile> =
            (1..=6).map(|i| image(&format!("f{i}.png"))).collect();

        let err = ingestor.ingest_bank_slips(&files).await.unwrap_err();

        assert!(err.to_string().contains("exceeds the limit of 5"));
        assert_eq!(ocr.calls.load(Ordering::SeqCst), 0);
        // Nothing was normalized either.
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    /// Provider whose credentials never check out.
    struct DeniedOcr;

    #[async_trait]
    impl OcrExtract for DeniedOcr {
        async fn prepare(&self) -> std::result::Result<(), ClientError> {
            Err(ClientError::Auth {
                provider: "ocr",
                detail: "bad credentials".to_string(),
            })
        }

        async fn extract(
            &self,
            _file_name: &str,
            _data: &[u8],
            _kind: DocumentKind,
        ) -> std::result::Result<WordsResult, ClientError> {
            unreachable!("extract must not run when prepare fails")
        }
    }

    #[tokio::test]
    async fn auth_failure_aborts_before_any_file_is_touched() {
        let dir = tempfile::tempdir().unwrap();
        let normalizer = FileNormalizer::new(dir.path()).await.unwrap();
        let ingestor = Ingestor::new(
            normalizer,
            Arc::new(DeniedOcr),
            IngestConfig::default(),
            "http://localhost:8000",
        );

        let err = ingestor
            .ingest_bank_slips(&[image("slip.png")])
            .await
            .unwrap_err();

        assert!(err.to_string().contains("bad credentials"));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn unsupported_upload_fails_alone() {
        let dir = tempfile::tempdir().unwrap();
        let (ingestor, _) = ingestor(&dir).await;

        let files = vec![image("ok.png"), UploadedFile::new("notes.docx", vec![1])];

        let report = ingestor.ingest_bank_slips(&files).await.unwrap();

        assert_eq!(report.succeeded.len(), 1);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].file_name, "notes.docx");
        assert!(report.failed[0].error.contains("unsupported file type"));
    }

    #[tokio::test]
    async fn bank_slips_are_retained_and_referenced_by_url() {
        let dir = tempfile::tempdir().unwrap();
        let (ingestor, _) = ingestor(&dir).await;

        let report = ingestor
            .ingest_bank_slips(&[image("slip.png")])
            .await
            .unwrap();

        assert_eq!(report.succeeded.len(), 1);
        let url = &report.succeeded[0].bank_slip_url;
        assert!(url.starts_with("http://localhost:8000/_upload/"));

        // The file the URL points at must still exist.
        let file_name = url.rsplit('/').next().unwrap();
        assert!(dir.path().join(file_name).exists());
    }

    #[tokio::test]
    async fn vat_invoice_files_are_deleted_after_recognition() {
        let dir = tempfile::tempdir().unwrap();
        let (ingestor, _) = ingestor(&dir).await;

        let mut files = vec![image("a.png"), image("b.png")];
        files[1].data = POISON.to_vec();

        let report = ingestor.ingest_vat_invoices(&files).await.unwrap();

        assert_eq!(report.succeeded.len(), 1);
        assert_eq!(report.failed.len(), 1);
        // Consumed units are removed regardless of outcome.
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn multi_page_pdf_yields_one_record_per_page() {
        let dir = tempfile::tempdir().unwrap();
        let (ingestor, ocr) = ingestor(&dir).await;

        let files = vec![UploadedFile::new("bundle.pdf", build_pdf(3))];

        let report = ingestor.ingest_vat_invoices(&files).await.unwrap();

        assert_eq!(report.succeeded.len(), 3);
        assert_eq!(ocr.calls.load(Ordering::SeqCst), 3);
        // Every page record is attributed to the originating upload.
        assert!(report.succeeded.iter().all(|r| r.file_name == "bundle.pdf"));
    }
}
