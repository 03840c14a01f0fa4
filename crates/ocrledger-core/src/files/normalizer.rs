//! Upload normalization: images pass through, PDFs are split per page.

use std::path::PathBuf;

use lopdf::Document;
use tracing::{debug, warn};

use super::{classify, generate_file_name, FileClass, NormalizedFile, UploadedFile};
use crate::error::FileError;

/// Writes uploads into the upload directory as single-document units.
#[derive(Debug, Clone)]
pub struct FileNormalizer {
    upload_dir: PathBuf,
}

impl FileNormalizer {
    /// Create a normalizer rooted at `upload_dir`, creating the directory
    /// if it does not exist yet.
    pub async fn new(upload_dir: impl Into<PathBuf>) -> Result<Self, FileError> {
        let upload_dir = upload_dir.into();
        tokio::fs::create_dir_all(&upload_dir).await?;
        Ok(Self { upload_dir })
    }

    /// Turn one upload into one or more stored single-document files.
    ///
    /// Images are stored unchanged. PDFs are split page by page, each page
    /// becoming an independently named file; the returned order matches
    /// the page order. A PDF that cannot be parsed fails the whole upload
    /// before anything is written, so no split pages are left behind.
    pub async fn normalize(&self, file: &UploadedFile) -> Result<Vec<NormalizedFile>, FileError> {
        let (class, ext) = classify(&file.file_name)?;

        let units: Vec<Vec<u8>> = match class {
            FileClass::Image => vec![file.data.clone()],
            FileClass::Pdf => split_pdf(&file.data)?,
        };

        debug!(
            file_name = %file.file_name,
            units = units.len(),
            "normalizing upload"
        );

        let mut normalized = Vec::with_capacity(units.len());
        for data in units {
            let file_name = generate_file_name(&ext);
            let path = self.upload_dir.join(&file_name);
            tokio::fs::write(&path, &data).await?;
            normalized.push(NormalizedFile {
                file_name,
                path,
                class,
            });
        }

        Ok(normalized)
    }

    /// Remove a normalized file. Best-effort: a failed delete is logged,
    /// never escalated, since the record itself is already safe.
    pub async fn remove(&self, file: &NormalizedFile) {
        if let Err(e) = tokio::fs::remove_file(&file.path).await {
            warn!(file_name = %file.file_name, error = %e, "failed to delete normalized file");
        }
    }
}

/// Split PDF bytes into one buffer per page, entirely in memory.
///
/// A single-page document is passed through as-is. PDFs encrypted with an
/// empty password are decrypted first; a real password fails the file.
fn split_pdf(data: &[u8]) -> Result<Vec<Vec<u8>>, FileError> {
    let mut doc = Document::load_mem(data).map_err(|e| FileError::Pdf(e.to_string()))?;

    let was_encrypted = doc.is_encrypted();
    if was_encrypted {
        if doc.decrypt("").is_err() {
            return Err(FileError::Encrypted);
        }
        debug!("decrypted PDF with empty password");
    }

    let page_count = doc.get_pages().len() as u32;
    if page_count == 0 {
        return Err(FileError::NoPages);
    }

    if page_count == 1 {
        if !was_encrypted {
            return Ok(vec![data.to_vec()]);
        }
        let mut buffer = Vec::new();
        doc.save_to(&mut buffer)
            .map_err(|e| FileError::Pdf(format!("failed to write decrypted PDF: {e}")))?;
        return Ok(vec![buffer]);
    }

    let mut buffers = Vec::with_capacity(page_count as usize);
    for page_num in 1..=page_count {
        let mut single = doc.clone();
        let others: Vec<u32> = (1..=page_count).filter(|&p| p != page_num).collect();
        single.delete_pages(&others);
        single.prune_objects();

        let mut buffer = Vec::new();
        single
            .save_to(&mut buffer)
            .map_err(|e| FileError::Pdf(format!("failed to write page {page_num}: {e}")))?;
        buffers.push(buffer);
    }

    debug!(pages = page_count, "split multi-page PDF");
    Ok(buffers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::files::pdf_fixtures::build_pdf;
    use pretty_assertions::assert_eq;

    async fn normalizer() -> (FileNormalizer, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let normalizer = FileNormalizer::new(dir.path()).await.unwrap();
        (normalizer, dir)
    }

    #[tokio::test]
    async fn image_passes_through_as_one_unit() {
        let (normalizer, dir) = normalizer().await;
        let upload = UploadedFile::new("slip.png", vec![0x89, 0x50, 0x4e, 0x47]);

        let files = normalizer.normalize(&upload).await.unwrap();

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].class, FileClass::Image);
        assert!(files[0].file_name.ends_with(".png"));
        let written = std::fs::read(dir.path().join(&files[0].file_name)).unwrap();
        assert_eq!(written, upload.data);
    }

    #[tokio::test]
    async fn single_page_pdf_stays_whole() {
        let (normalizer, _dir) = normalizer().await;
        let upload = UploadedFile::new("invoice.pdf", build_pdf(1));

        let files = normalizer.normalize(&upload).await.unwrap();

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].class, FileClass::Pdf);
        let saved = std::fs::read(&files[0].path).unwrap();
        assert_eq!(saved, upload.data);
    }

    #[tokio::test]
    async fn multi_page_pdf_splits_into_one_file_per_page() {
        let (normalizer, _dir) = normalizer().await;
        let upload = UploadedFile::new("invoices.pdf", build_pdf(3));

        let files = normalizer.normalize(&upload).await.unwrap();

        assert_eq!(files.len(), 3);
        for (i, file) in files.iter().enumerate() {
            let saved = std::fs::read(&file.path).unwrap();
            let page = Document::load_mem(&saved).unwrap();
            assert_eq!(page.get_pages().len(), 1, "unit {i} must be single-page");

            // Page order must be preserved in the returned sequence.
            let marker = format!("Page {}", i + 1);
            let text = String::from_utf8_lossy(&saved);
            assert!(text.contains(&marker), "unit {i} should carry {marker:?}");
        }
    }

    #[tokio::test]
    async fn corrupt_pdf_fails_without_partial_writes() {
        let (normalizer, dir) = normalizer().await;
        let upload = UploadedFile::new("broken.pdf", b"%PDF-1.5 not actually a pdf".to_vec());

        let result = normalizer.normalize(&upload).await;

        assert!(matches!(result, Err(FileError::Pdf(_))));
        let leftovers = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn unsupported_extension_is_rejected() {
        let (normalizer, _dir) = normalizer().await;
        let upload = UploadedFile::new("report.docx", vec![1, 2, 3]);

        assert!(matches!(
            normalizer.normalize(&upload).await,
            Err(FileError::UnsupportedType(_))
        ));
    }
}
