//! Drives one document through every compression level.
//!
//! Each level runs independently against a fresh copy of the input; a level
//! that fails never disturbs the others. Outputs that fail to shrink the
//! document are replaced by the original bytes, so no level ever hands the
//! user something larger than what they uploaded.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::defaults::MAX_INPUT_BYTES;
use crate::config::CompressionLevel;
use crate::container::ContainerKind;
use crate::error::ValidationError;
use crate::report::{format_file_size, output_filename};

/// Terminal record for one (document, level) attempt.
#[derive(Debug, Clone)]
pub struct LevelOutcome {
    pub level: CompressionLevel,
    pub filename: String,
    /// Where the output landed; `None` on failure
    pub path: Option<PathBuf>,
    /// Final byte size after the fallback rule; `None` on failure
    pub byte_size: Option<u64>,
    /// Human-readable rendering of `byte_size`
    pub size_display: Option<String>,
    /// The output did not shrink the document and the original bytes were
    /// written instead
    pub fell_back: bool,
    /// Short failure summary; `None` on success
    pub error: Option<String>,
}

impl LevelOutcome {
    pub fn success(&self) -> bool {
        self.error.is_none()
    }

    fn written(level: CompressionLevel, filename: String, path: PathBuf, size: u64, fell_back: bool) -> Self {
        LevelOutcome {
            level,
            filename,
            path: Some(path),
            byte_size: Some(size),
            size_display: Some(format_file_size(size)),
            fell_back,
            error: None,
        }
    }

    fn failed(level: CompressionLevel, filename: String, error: String) -> Self {
        LevelOutcome {
            level,
            filename,
            path: None,
            byte_size: None,
            size_display: None,
            fell_back: false,
            error: Some(error),
        }
    }
}

/// Process one document at every compression level, writing one output file
/// per level into `output_dir`. Validation failures (unsupported extension,
/// oversized input) reject the document before any level runs.
pub fn process_all_levels(
    input: &[u8],
    original_name: &str,
    output_dir: &Path,
) -> Result<BTreeMap<CompressionLevel, LevelOutcome>, ValidationError> {
    let kind = ContainerKind::from_name(original_name)?;
    if input.len() as u64 > MAX_INPUT_BYTES {
        return Err(ValidationError::FileTooLarge {
            size: input.len() as u64,
            limit: MAX_INPUT_BYTES,
        });
    }

    let mut results = BTreeMap::new();
    for level in CompressionLevel::ALL {
        results.insert(level, run_level(kind, input, original_name, output_dir, level));
    }
    Ok(results)
}

fn run_level(
    kind: ContainerKind,
    input: &[u8],
    original_name: &str,
    output_dir: &Path,
    level: CompressionLevel,
) -> LevelOutcome {
    let filename = output_filename(original_name, level);
    let path = output_dir.join(&filename);

    let bytes = match kind.compress(input, level) {
        Ok(bytes) => bytes,
        Err(err) => {
            log::error!("Level {level} failed for {original_name}: {err}");
            return LevelOutcome::failed(level, filename, err.to_string());
        }
    };

    let (bytes, fell_back) = apply_fallback(input, bytes);
    if fell_back {
        log::info!("Level {level} did not shrink {original_name}, keeping original bytes");
    }

    match fs::write(&path, bytes.as_ref()) {
        Ok(()) => LevelOutcome::written(level, filename, path, bytes.len() as u64, fell_back),
        Err(err) => LevelOutcome::failed(level, filename, err.to_string()),
    }
}

/// The no-growth rule: an output that is not strictly smaller than the
/// original is discarded in favour of the original bytes.
fn apply_fallback<'a>(original: &'a [u8], candidate: Vec<u8>) -> (Cow<'a, [u8]>, bool) {
    if candidate.len() < original.len() {
        (Cow::Owned(candidate), false)
    } else {
        (Cow::Borrowed(original), true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_keeps_smaller_candidate() {
        let original = vec![0u8; 100];
        let (bytes, fell_back) = apply_fallback(&original, vec![1u8; 60]);
        assert!(!fell_back);
        assert_eq!(bytes.len(), 60);
    }

    #[test]
    fn test_fallback_on_equal_or_larger_output() {
        let original = vec![0u8; 100];

        let (bytes, fell_back) = apply_fallback(&original, vec![1u8; 100]);
        assert!(fell_back);
        assert_eq!(bytes.as_ref(), original.as_slice());

        let (bytes, fell_back) = apply_fallback(&original, vec![1u8; 140]);
        assert!(fell_back);
        assert_eq!(bytes.len(), 100);
    }

    #[test]
    fn test_oversized_input_rejected() {
        let big = vec![0u8; (MAX_INPUT_BYTES + 1) as usize];
        let dir = tempfile::tempdir().unwrap();
        let err = process_all_levels(&big, "big.pdf", dir.path()).unwrap_err();
        assert!(matches!(err, ValidationError::FileTooLarge { .. }));
    }

    #[test]
    fn test_unsupported_extension_rejected_before_levels() {
        let dir = tempfile::tempdir().unwrap();
        let err = process_all_levels(b"data", "notes.txt", dir.path()).unwrap_err();
        assert!(matches!(err, ValidationError::UnsupportedExtension(_)));
    }

    #[test]
    fn test_broken_container_fails_every_level_independently() {
        let dir = tempfile::tempdir().unwrap();
        let results = process_all_levels(b"not a pdf at all", "bad.pdf", dir.path()).unwrap();
        assert_eq!(results.len(), 3);
        for (_, outcome) in results {
            assert!(!outcome.success());
            assert!(outcome.error.is_some());
        }
    }
}
