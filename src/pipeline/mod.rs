//! The extraction pipeline: PDF text → structured lab results.
//!
//! `processor` drives the run; the other modules are its pure, separately
//! testable stages.

pub mod aliases;
pub mod classify;
pub mod dates;
pub mod fields;
pub mod lexicon;
pub mod line_match;
pub mod patterns;
pub mod pdf;
pub mod processor;
pub mod range;
pub mod report;

pub use lexicon::{CompiledLexicon, Lexicon, LexiconError};
pub use pdf::{DocumentSource, ExtractionError, PdfTextExtractor};
pub use processor::SubmissionProcessor;

use crate::db::DatabaseError;

/// Errors that abort a processing run. Each maps to a FAILED submission
/// with a bounded human-readable message; none crosses the pipeline
/// boundary to callers.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("no valid PDF file associated with this submission")]
    MissingFile,

    #[error("extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("database error: {0}")]
    Database(#[from] DatabaseError),
}
