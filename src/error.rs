use thiserror::Error;

/// Failure to turn one embedded image's bytes into pixels, or pixels back
/// into JPEG. Always recovered locally: the image keeps its original bytes.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Unrecognized raster format: {0}")]
    Unrecognized(String),

    #[error("Failed to decode image: {0}")]
    Image(#[from] image::ImageError),

    #[error("Unsupported stream encoding: {0}")]
    UnsupportedStream(String),

    #[error("Image dimensions {0}x{1} exceed JPEG limits")]
    TooLarge(u32, u32),

    #[error("JPEG encoding failed: {0}")]
    Encode(#[from] jpeg_encoder::EncodingError),
}

/// Failure while rewriting one image inside its container. Recovered
/// locally, same as [`DecodeError`].
#[derive(Error, Debug)]
pub enum PatchError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("Non-UTF-8 member name: {0}")]
    MemberName(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure that sinks a whole (document, level) attempt: extraction, repack,
/// or document open/save. Other levels are unaffected.
#[derive(Error, Debug)]
pub enum ContainerError {
    #[error("Failed to read archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Failed to repack archive: {0}")]
    Repack(String),

    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Input rejected before any container processing starts.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Empty filename")]
    EmptyFilename,

    #[error("Unsupported file type: {0} (only .pdf and .docx are supported)")]
    UnsupportedExtension(String),

    #[error("File too large: {size} bytes (limit {limit})")]
    FileTooLarge { size: u64, limit: u64 },
}
