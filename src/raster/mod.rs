pub mod recompress;

pub use recompress::{recompress, recompress_pixels, RecompressOutcome, SkipReason};
