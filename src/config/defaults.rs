/// JPEG quality for the extreme level
pub const EXTREME_QUALITY: u8 = 35;

/// Maximum width in pixels for the extreme level
pub const EXTREME_MAX_WIDTH: u32 = 600;

/// Maximum height in pixels for the extreme level
pub const EXTREME_MAX_HEIGHT: u32 = 800;

/// JPEG quality for the medium level
pub const MEDIUM_QUALITY: u8 = 65;

/// Maximum width in pixels for the medium level
pub const MEDIUM_MAX_WIDTH: u32 = 1000;

/// Maximum height in pixels for the medium level
pub const MEDIUM_MAX_HEIGHT: u32 = 1400;

/// JPEG quality for the basic level
pub const BASIC_QUALITY: u8 = 85;

/// Nominal maximum width for the basic level (basic keeps source resolution,
/// so the bound is widened to the source dimensions at runtime)
pub const BASIC_MAX_WIDTH: u32 = 1600;

/// Nominal maximum height for the basic level
pub const BASIC_MAX_HEIGHT: u32 = 2200;

/// Source images below this byte size are never recompressed; re-encoding
/// them tends to grow the file
pub const MIN_SOURCE_BYTES: usize = 1024;

/// PDF images below this pixel area are treated as icons and left alone
pub const MIN_PIXEL_AREA: u64 = 10_000;

/// A PDF stream replacement must shrink the stored stream by at least this
/// percentage to be worth the rewrite
pub const SHRINK_MARGIN_PERCENT: u64 = 5;

/// Maximum accepted input size in bytes (200 MB)
pub const MAX_INPUT_BYTES: u64 = 200 * 1024 * 1024;
