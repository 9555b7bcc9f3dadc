//! Output naming and human-readable reporting helpers.

use std::path::Path;

use crate::config::CompressionLevel;

/// Derive the output filename for one level: `"{stem}_{level}.{ext}"`.
pub fn output_filename(original_name: &str, level: CompressionLevel) -> String {
    let path = Path::new(original_name);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    match path.extension() {
        Some(ext) => format!("{stem}_{level}.{}", ext.to_string_lossy()),
        None => format!("{stem}_{level}"),
    }
}

/// Render a byte count the way the upload report does: B below 1 KB, one
/// decimal of KB below 1 MB, two decimals of MB above.
pub fn format_file_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = 1024.0 * 1024.0;
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / KB)
    } else {
        format!("{:.2} MB", bytes as f64 / MB)
    }
}

/// Percentage of the original size that was saved, one decimal.
pub fn compression_ratio(original_size: u64, compressed_size: u64) -> String {
    if original_size == 0 {
        return "0%".to_string();
    }
    let ratio = (1.0 - compressed_size as f64 / original_size as f64) * 100.0;
    format!("{:.1}%", ratio)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_filename_per_level() {
        assert_eq!(
            output_filename("report.pdf", CompressionLevel::Extreme),
            "report_extreme.pdf"
        );
        assert_eq!(
            output_filename("thesis draft.docx", CompressionLevel::Basic),
            "thesis draft_basic.docx"
        );
        assert_eq!(
            output_filename("noext", CompressionLevel::Medium),
            "noext_medium"
        );
    }

    #[test]
    fn test_format_file_size_units() {
        assert_eq!(format_file_size(800), "800 B");
        assert_eq!(format_file_size(2048), "2.0 KB");
        assert_eq!(format_file_size(5 * 1024 * 1024), "5.00 MB");
    }

    #[test]
    fn test_compression_ratio() {
        assert_eq!(compression_ratio(1000, 400), "60.0%");
        assert_eq!(compression_ratio(1000, 1000), "0.0%");
        assert_eq!(compression_ratio(0, 0), "0%");
    }
}
