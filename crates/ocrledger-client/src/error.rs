//! Error types for provider transport.

use thiserror::Error;

use crate::ocr::DocumentKind;

/// Errors raised while talking to the external providers.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Credential fetch failed or the token endpoint returned garbage.
    #[error("authentication with {provider} failed: {detail}")]
    Auth {
        provider: &'static str,
        detail: String,
    },

    /// Non-2xx response or an in-band provider error code. Carries the raw
    /// payload for diagnostics; retrying is the caller's decision.
    #[error("{provider} request failed (status {status}): {payload}")]
    Request {
        provider: &'static str,
        status: u16,
        payload: String,
    },

    /// Network-level failure (connect, timeout, TLS).
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// 2xx response whose body does not match the documented shape.
    #[error("malformed {provider} response: {detail}")]
    Malformed {
        provider: &'static str,
        detail: String,
    },

    /// The extraction succeeded but every field came back empty. The file
    /// is almost certainly not the kind of document we asked for.
    #[error("not a {kind} document: all extracted fields are empty")]
    Recognition { kind: DocumentKind },
}
