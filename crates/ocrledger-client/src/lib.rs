//! Provider transport layer for ocrledger.
//!
//! This crate talks HTTP to the two external services the pipeline depends on:
//! - the OCR provider (bank receipt and VAT invoice recognition endpoints)
//! - the spreadsheet provider (bitable record storage)
//!
//! Both services use short-lived bearer credentials obtained from a token
//! endpoint; [`TokenCache`] owns the credential lifecycle so concurrent
//! callers share one credential and one in-flight refresh.

mod error;
mod ocr;
mod sheet;
mod token;

pub use error::ClientError;
pub use ocr::{DocumentKind, OcrClient, OcrProviderConfig, WordsResult};
pub use sheet::{SheetClient, SheetProviderConfig};
pub use token::{FetchedToken, TokenCache, TokenSource};

/// Result type for provider transport operations.
pub type Result<T> = std::result::Result<T, ClientError>;
