//! ZIP-member container family: DOCX archives.
//!
//! Images live under `word/media/`. Replacing one may rename it (the codec's
//! canonical extension is `.jpeg`), which means patching every reference in
//! `word/_rels/document.xml.rels` and `[Content_Types].xml` before the tree
//! is repacked.

use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::config::CompressionLevel;
use crate::error::{ContainerError, PatchError};
use crate::raster::{recompress, RecompressOutcome};

/// Media member extensions accepted as raster images.
const RASTER_EXTENSIONS: [&str; 7] = ["png", "jpg", "jpeg", "gif", "bmp", "tiff", "tif"];

/// Default content type declared for replaced images.
const JPEG_DEFAULT: &str = r#"<Default Extension="jpeg" ContentType="image/jpeg"/>"#;

/// Recompress every raster image inside a DOCX archive and return the
/// rebuilt archive. Per-image failures are logged and skipped; extraction or
/// repack failure fails the whole level.
pub fn compress_docx(input: &[u8], level: CompressionLevel) -> Result<Vec<u8>, ContainerError> {
    // TempDir removes the extraction scratch on every exit path
    let scratch = tempfile::tempdir()?;
    let root = scratch.path();

    let mut archive = ZipArchive::new(Cursor::new(input))?;
    archive.extract(root)?;

    let media_dir = root.join("word").join("media");
    if media_dir.is_dir() {
        for member in locate_media_images(&media_dir)? {
            if let Err(err) = patch_media_image(root, &member, level) {
                log::warn!("Skipping image {}: {}", member.display(), err);
            }
        }
    }

    repack(root)
}

/// Enumerate media members with a supported raster extension, sorted for a
/// deterministic processing order.
fn locate_media_images(media_dir: &Path) -> Result<Vec<PathBuf>, ContainerError> {
    let mut members = Vec::new();
    for entry in fs::read_dir(media_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let path = entry.path();
        let supported = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| RASTER_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        if supported {
            members.push(path);
        }
    }
    members.sort();
    Ok(members)
}

/// Recompress one media member in place. When the replacement shrinks the
/// member, it is written under the `.jpeg` extension and every dependent
/// reference is rewritten to the new name.
fn patch_media_image(root: &Path, member: &Path, level: CompressionLevel) -> Result<(), PatchError> {
    let raw = fs::read(member)?;

    let RecompressOutcome::Replaced { bytes, .. } = recompress(&raw, level)? else {
        log::debug!("Keeping {} as-is", member.display());
        return Ok(());
    };

    let new_member = member.with_extension("jpeg");
    fs::write(&new_member, &bytes)?;

    if new_member != member {
        fs::remove_file(member)?;
        let old_name = member_file_name(member)?;
        let new_name = member_file_name(&new_member)?;
        rewrite_references(root, &old_name, &new_name)?;
    }

    log::info!(
        "Recompressed {}: {} -> {} bytes",
        member.display(),
        raw.len(),
        bytes.len()
    );
    Ok(())
}

fn member_file_name(path: &Path) -> Result<String, PatchError> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_owned)
        .ok_or_else(|| PatchError::MemberName(path.display().to_string()))
}

/// Rewrite every occurrence of a renamed member in the relationship map and
/// the content-type declarations, and make sure the `.jpeg` extension has a
/// default content type.
fn rewrite_references(root: &Path, old_name: &str, new_name: &str) -> Result<(), PatchError> {
    let rels = root.join("word").join("_rels").join("document.xml.rels");
    if rels.is_file() {
        let content = fs::read_to_string(&rels)?;
        fs::write(&rels, content.replace(old_name, new_name))?;
    }

    let content_types = root.join("[Content_Types].xml");
    if content_types.is_file() {
        let content = fs::read_to_string(&content_types)?;
        let content = ensure_jpeg_content_type(content);
        fs::write(&content_types, content.replace(old_name, new_name))?;
    }

    Ok(())
}

/// Insert a `<Default>` declaration for the jpeg extension immediately before
/// the closing root element, unless jpeg or jpg is already declared.
fn ensure_jpeg_content_type(content: String) -> String {
    if content.contains(r#"Extension="jpeg""#) || content.contains(r#"Extension="jpg""#) {
        return content;
    }
    content.replace("</Types>", &format!("{JPEG_DEFAULT}</Types>"))
}

/// Rebuild the archive from the extracted tree with Deflate, preserving
/// relative member paths. Non-image members pass through byte-for-byte.
fn repack(root: &Path) -> Result<Vec<u8>, ContainerError> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| ContainerError::Repack(e.to_string()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(root)
            .map_err(|e| ContainerError::Repack(e.to_string()))?;
        let name = relative
            .to_str()
            .ok_or_else(|| ContainerError::Repack(format!("non-UTF-8 path {:?}", relative)))?
            .replace('\\', "/");

        writer.start_file(name, options)?;
        writer.write_all(&fs::read(entry.path())?)?;
    }

    let cursor = writer.finish()?;
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jpeg_content_type_inserted_before_closing_root() {
        let input = concat!(
            r#"<?xml version="1.0"?><Types xmlns="ct">"#,
            r#"<Default Extension="png" ContentType="image/png"/></Types>"#
        )
        .to_string();
        let output = ensure_jpeg_content_type(input);
        assert!(output.contains(r#"<Default Extension="jpeg" ContentType="image/jpeg"/></Types>"#));
    }

    #[test]
    fn test_jpeg_content_type_not_duplicated() {
        for declared in [r#"Extension="jpeg""#, r#"Extension="jpg""#] {
            let input = format!(r#"<Types><Default {declared} ContentType="image/jpeg"/></Types>"#);
            let output = ensure_jpeg_content_type(input.clone());
            assert_eq!(output, input);
        }
    }

    #[test]
    fn test_locate_skips_unsupported_extensions() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("image1.png"), b"png").unwrap();
        fs::write(dir.path().join("image2.JPG"), b"jpg").unwrap();
        fs::write(dir.path().join("chart1.emf"), b"emf").unwrap();
        fs::write(dir.path().join("notes.txt"), b"txt").unwrap();

        let members = locate_media_images(dir.path()).unwrap();
        let names: Vec<String> = members
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["image1.png", "image2.JPG"]);
    }

    #[test]
    fn test_rewrite_references_updates_both_files() {
        let dir = tempfile::tempdir().unwrap();
        let rels_dir = dir.path().join("word").join("_rels");
        fs::create_dir_all(&rels_dir).unwrap();
        fs::write(
            rels_dir.join("document.xml.rels"),
            r#"<Relationship Id="rId4" Target="media/image1.png"/>"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("[Content_Types].xml"),
            r#"<Types><Default Extension="png" ContentType="image/png"/><Override PartName="/word/media/image1.png"/></Types>"#,
        )
        .unwrap();

        rewrite_references(dir.path(), "image1.png", "image1.jpeg").unwrap();

        let rels = fs::read_to_string(rels_dir.join("document.xml.rels")).unwrap();
        assert!(rels.contains("media/image1.jpeg"));
        assert!(!rels.contains("image1.png"));

        let types = fs::read_to_string(dir.path().join("[Content_Types].xml")).unwrap();
        assert!(types.contains(r#"Extension="jpeg""#));
        assert!(types.contains("image1.jpeg"));
    }
}
