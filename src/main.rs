use anyhow::{Context, Result};
use clap::Parser;
use std::fs;

use docsqueeze::cli::Args;
use docsqueeze::pipeline::process_all_levels;
use docsqueeze::report::{compression_ratio, format_file_size};

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    env_logger::Builder::new()
        .filter_level(match args.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .init();

    // Read input file
    let input = fs::read(&args.input)
        .with_context(|| format!("Failed to read input file: {}", args.input.display()))?;

    let original_name = args
        .input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let output_dir = args.output_dir();
    fs::create_dir_all(&output_dir)
        .with_context(|| format!("Failed to create output directory: {}", output_dir.display()))?;

    log::info!(
        "Processing {} ({})",
        original_name,
        format_file_size(input.len() as u64)
    );

    let results = process_all_levels(&input, &original_name, &output_dir)
        .map_err(|e| anyhow::anyhow!("{e}"))?;

    let original_size = input.len() as u64;
    println!(
        "{} ({}):",
        original_name,
        format_file_size(original_size)
    );
    for (level, outcome) in &results {
        if outcome.success() {
            let size = outcome.byte_size.unwrap_or(0);
            let note = if outcome.fell_back {
                " [kept original]"
            } else {
                ""
            };
            println!(
                "  {:<8} {} ({}, saved {}){}",
                level.to_string(),
                outcome.filename,
                outcome.size_display.as_deref().unwrap_or("?"),
                compression_ratio(original_size, size),
                note
            );
        } else {
            println!(
                "  {:<8} failed: {}",
                level.to_string(),
                outcome.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    Ok(())
}
