pub mod orchestrator;

pub use orchestrator::{process_all_levels, LevelOutcome};
