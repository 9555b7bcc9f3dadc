pub mod cli;
pub mod config;
pub mod container;
pub mod error;
pub mod pipeline;
pub mod raster;
pub mod report;

pub use config::{ChromaSubsampling, CompressionLevel, LevelSettings};
pub use container::ContainerKind;
pub use error::{ContainerError, DecodeError, PatchError, ValidationError};
pub use pipeline::{process_all_levels, LevelOutcome};
pub use raster::{recompress, RecompressOutcome};

use std::collections::BTreeMap;
use std::path::Path;

/// High-level API for compressing one document at every level.
///
/// This is the recommended entry point for library consumers: hand it the
/// original container bytes, the declared filename (used to pick the PDF or
/// DOCX pipeline and to derive output names), and a directory to write into.
/// One output file per level is produced; a level whose output would be
/// larger than the input receives the original bytes instead.
///
/// # Example
///
/// ```no_run
/// use docsqueeze::{compress_document, CompressionLevel};
///
/// let input = std::fs::read("report.pdf").unwrap();
/// let results = compress_document(&input, "report.pdf", std::path::Path::new("out")).unwrap();
///
/// let extreme = &results[&CompressionLevel::Extreme];
/// if extreme.success() {
///     println!("{} -> {} bytes", input.len(), extreme.byte_size.unwrap());
/// }
/// ```
pub fn compress_document(
    input: &[u8],
    original_name: &str,
    output_dir: &Path,
) -> Result<BTreeMap<CompressionLevel, LevelOutcome>, ValidationError> {
    pipeline::process_all_levels(input, original_name, output_dir)
}
