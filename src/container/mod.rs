//! Container families and the dispatch between them.
//!
//! The two families share a pipeline shape (locate, patch, finalize) but no
//! structural code, so they are variants selected by input extension rather
//! than implementations of a common trait.

pub mod docx;
pub mod pdf;

pub use docx::compress_docx;
pub use pdf::compress_pdf;

use std::path::Path;

use crate::config::CompressionLevel;
use crate::error::{ContainerError, ValidationError};

/// Supported container formats, selected by filename extension.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ContainerKind {
    /// Cross-reference family (`.pdf`)
    Pdf,
    /// ZIP-member family (`.docx`)
    Docx,
}

impl ContainerKind {
    /// Select the container family from a filename. Anything that is not
    /// `.pdf` or `.docx` is rejected before the pipeline starts.
    pub fn from_name(name: &str) -> Result<ContainerKind, ValidationError> {
        if name.is_empty() {
            return Err(ValidationError::EmptyFilename);
        }
        let extension = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match extension.as_str() {
            "pdf" => Ok(ContainerKind::Pdf),
            "docx" => Ok(ContainerKind::Docx),
            other => Err(ValidationError::UnsupportedExtension(format!(".{other}"))),
        }
    }

    /// Run the family's locate/patch/finalize pipeline for one level.
    pub fn compress(self, input: &[u8], level: CompressionLevel) -> Result<Vec<u8>, ContainerError> {
        match self {
            ContainerKind::Pdf => compress_pdf(input, level),
            ContainerKind::Docx => compress_docx(input, level),
        }
    }
}
