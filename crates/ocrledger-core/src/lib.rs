//! Core library for the ocrledger ingestion pipeline.
//!
//! This crate provides:
//! - File intake and normalization (image pass-through, PDF page splitting)
//! - Mapping of raw OCR provider fields into typed ledger records
//! - The batch ingestion orchestrator with per-file failure isolation
//! - The record sink seam used for persistence (spreadsheet or in-memory)

pub mod error;
pub mod files;
pub mod ingest;
pub mod mapping;
pub mod models;
pub mod sink;

pub use error::{FileError, IngestError, LedgerError, MappingError, Result, SinkError};
pub use files::{FileClass, FileNormalizer, NormalizedFile, UploadedFile};
pub use ingest::{FileFailure, IngestReport, Ingestor, OcrExtract};
pub use models::config::LedgerConfig;
pub use models::record::{BankSlipRecord, VatInvoiceRecord};
pub use sink::{MemorySink, RecordSink, SheetSink};

/// Re-export provider transport types.
pub use ocrledger_client::{ClientError, DocumentKind, OcrClient, SheetClient, WordsResult};
