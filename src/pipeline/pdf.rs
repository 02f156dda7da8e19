//! PDF text extraction.

use std::fs;
use std::path::Path;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("failed to read document: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse PDF: {0}")]
    PdfParsing(String),
}

/// Document text source abstraction (allows stubbing in tests).
pub trait DocumentSource: Send + Sync {
    /// Extract the text of each page, in page order.
    fn extract_pages(&self, path: &Path) -> Result<Vec<String>, ExtractionError>;
}

/// PDF text extractor using the pdf-extract crate.
/// Handles digital PDFs with embedded text layers.
pub struct PdfTextExtractor;

impl DocumentSource for PdfTextExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Vec<String>, ExtractionError> {
        let bytes = fs::read(path)?;
        let pages = pdf_extract::extract_text_from_mem_by_pages(&bytes)
            .map_err(|e| ExtractionError::PdfParsing(e.to_string()))?;
        tracing::debug!(path = %path.display(), pages = pages.len(), "extracted PDF text");
        Ok(pages)
    }
}
