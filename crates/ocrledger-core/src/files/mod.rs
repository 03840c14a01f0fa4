//! File intake: classification, naming, and normalization.

mod normalizer;

pub use normalizer::FileNormalizer;

use std::path::PathBuf;

use chrono::Local;
use rand::distr::Alphanumeric;
use rand::Rng;

use crate::error::FileError;

const IMAGE_EXTENSIONS: [&str; 4] = [".jpg", ".jpeg", ".png", ".bmp"];

/// A file as the operator uploaded it. Transient; owned by the request
/// that produced it.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Original file name, as uploaded.
    pub file_name: String,
    /// Raw file content.
    pub data: Vec<u8>,
}

impl UploadedFile {
    pub fn new(file_name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            data,
        }
    }
}

/// A single-document unit written to the upload directory.
///
/// Multi-page PDFs are split before this point, so one normalized file
/// always holds at most one OCR-eligible document.
#[derive(Debug, Clone)]
pub struct NormalizedFile {
    /// Generated collision-resistant file name.
    pub file_name: String,
    /// Location on disk.
    pub path: PathBuf,
    /// Document class the file was admitted as.
    pub class: FileClass,
}

/// Supported upload classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileClass {
    /// Plain raster image, passed to OCR unchanged.
    Image,
    /// PDF document, one page per normalized file.
    Pdf,
}

/// Classify an upload by extension, returning the class and the extension
/// (with leading dot, lowercased). Anything unrecognized is rejected.
pub fn classify(file_name: &str) -> Result<(FileClass, String), FileError> {
    let lower = file_name.to_lowercase();
    let ext = match lower.rfind('.') {
        Some(idx) => lower[idx..].to_string(),
        None => return Err(FileError::UnsupportedType(file_name.to_string())),
    };

    if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        Ok((FileClass::Image, ext))
    } else if ext == ".pdf" {
        Ok((FileClass::Pdf, ext))
    } else {
        Err(FileError::UnsupportedType(file_name.to_string()))
    }
}

/// Generate a storage name: `{yyyyMMddHHmmss}-{6 random alphanumerics}{ext}`.
///
/// Collisions would need two files in the same second drawing the same
/// 6-character suffix; that probability is accepted, no retry loop.
pub fn generate_file_name(extension: &str) -> String {
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(char::from)
        .collect();
    format!("{}-{}{}", Local::now().format("%Y%m%d%H%M%S"), suffix, extension)
}
