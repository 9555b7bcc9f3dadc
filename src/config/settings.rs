use clap::ValueEnum;

use super::defaults::*;

/// Compression aggressiveness preset, ordered from most to least aggressive.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, ValueEnum)]
pub enum CompressionLevel {
    /// Quality 35, images bounded to 600x800
    Extreme,
    /// Quality 65, images bounded to 1000x1400
    Medium,
    /// Quality 85, original resolution kept
    Basic,
}

/// Chroma subsampling mode handed to the JPEG encoder.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ChromaSubsampling {
    /// 4:2:0 (quarter-resolution chroma)
    Cs420,
    /// 4:2:2 (half-resolution chroma)
    Cs422,
    /// 4:4:4 (full-resolution chroma)
    Cs444,
}

impl ChromaSubsampling {
    pub fn sampling_factor(self) -> jpeg_encoder::SamplingFactor {
        match self {
            ChromaSubsampling::Cs420 => jpeg_encoder::SamplingFactor::R_4_2_0,
            ChromaSubsampling::Cs422 => jpeg_encoder::SamplingFactor::R_4_2_2,
            ChromaSubsampling::Cs444 => jpeg_encoder::SamplingFactor::R_4_4_4,
        }
    }
}

/// Numeric parameters for one [`CompressionLevel`]. Fixed at process start,
/// never mutated.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LevelSettings {
    /// JPEG quality, 1-100, higher is larger/better
    pub quality: u8,
    /// Maximum output width in pixels
    pub max_width: u32,
    /// Maximum output height in pixels
    pub max_height: u32,
    /// Chroma subsampling for the encoder
    pub chroma_subsampling: ChromaSubsampling,
}

const EXTREME_SETTINGS: LevelSettings = LevelSettings {
    quality: EXTREME_QUALITY,
    max_width: EXTREME_MAX_WIDTH,
    max_height: EXTREME_MAX_HEIGHT,
    chroma_subsampling: ChromaSubsampling::Cs420,
};

const MEDIUM_SETTINGS: LevelSettings = LevelSettings {
    quality: MEDIUM_QUALITY,
    max_width: MEDIUM_MAX_WIDTH,
    max_height: MEDIUM_MAX_HEIGHT,
    chroma_subsampling: ChromaSubsampling::Cs420,
};

const BASIC_SETTINGS: LevelSettings = LevelSettings {
    quality: BASIC_QUALITY,
    max_width: BASIC_MAX_WIDTH,
    max_height: BASIC_MAX_HEIGHT,
    chroma_subsampling: ChromaSubsampling::Cs422,
};

impl CompressionLevel {
    /// All levels, most aggressive first.
    pub const ALL: [CompressionLevel; 3] = [
        CompressionLevel::Extreme,
        CompressionLevel::Medium,
        CompressionLevel::Basic,
    ];

    /// Look up the fixed settings for this level. Total: every level has one.
    pub fn settings(self) -> LevelSettings {
        match self {
            CompressionLevel::Extreme => EXTREME_SETTINGS,
            CompressionLevel::Medium => MEDIUM_SETTINGS,
            CompressionLevel::Basic => BASIC_SETTINGS,
        }
    }

    /// Basic only lowers encoding quality; it never scales images down.
    pub fn preserves_resolution(self) -> bool {
        matches!(self, CompressionLevel::Basic)
    }

    /// Stable lowercase name, used in output filenames and reports.
    pub fn as_str(self) -> &'static str {
        match self {
            CompressionLevel::Extreme => "extreme",
            CompressionLevel::Medium => "medium",
            CompressionLevel::Basic => "basic",
        }
    }
}

impl std::fmt::Display for CompressionLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
