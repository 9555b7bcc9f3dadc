pub mod defaults;
pub mod settings;

pub use settings::{ChromaSubsampling, CompressionLevel, LevelSettings};
