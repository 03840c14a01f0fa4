//! Error types for the ocrledger-core library.

use thiserror::Error;

/// Main error type for the ingestion pipeline.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// File intake or normalization error.
    #[error("file error: {0}")]
    File(#[from] FileError),

    /// Provider transport error (auth, OCR request, recognition).
    #[error("provider error: {0}")]
    Client(#[from] ocrledger_client::ClientError),

    /// Response mapping error.
    #[error("mapping error: {0}")]
    Mapping(#[from] MappingError),

    /// Batch-level ingestion error.
    #[error("ingestion error: {0}")]
    Ingest(#[from] IngestError),

    /// Persistence error from the record sink.
    #[error("sink error: {0}")]
    Sink(#[from] SinkError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors raised while classifying, splitting, or persisting uploads.
#[derive(Error, Debug)]
pub enum FileError {
    /// The upload is neither a supported image nor a PDF.
    #[error("unsupported file type: {0}")]
    UnsupportedType(String),

    /// The PDF could not be parsed or rewritten.
    #[error("failed to process PDF: {0}")]
    Pdf(String),

    /// The PDF is encrypted with a real password.
    #[error("PDF is encrypted")]
    Encrypted,

    /// The PDF is empty.
    #[error("PDF has no pages")]
    NoPages,

    /// The normalized file could not be written.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while mapping raw OCR fields into records.
#[derive(Error, Debug)]
pub enum MappingError {
    /// The provider response lacks an expected field. Never papered over
    /// with a guessed default.
    #[error("missing expected field: {0}")]
    MissingField(String),

    /// The field was present but unusable after normalization.
    #[error("field {field} has unusable value: {value:?}")]
    InvalidValue { field: String, value: String },
}

/// Batch-level ingestion errors.
#[derive(Error, Debug)]
pub enum IngestError {
    /// More files than the batch ceiling allows. Raised before any file
    /// is touched.
    #[error("batch of {given} files exceeds the limit of {limit}")]
    BatchTooLarge { given: usize, limit: usize },
}

/// Persistence errors from the record sink.
#[derive(Error, Debug)]
pub enum SinkError {
    /// The sink refused the record.
    #[error("sink rejected record: {0}")]
    Rejected(String),

    /// Transport failure while talking to a remote sink.
    #[error(transparent)]
    Client(#[from] ocrledger_client::ClientError),
}

/// Result type for the ocrledger-core library.
pub type Result<T> = std::result::Result<T, LedgerError>;
