// src/process/mod.rs
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::{
    fs::File,
    io::{BufRead, BufReader},
    time::Instant,
};
use tracing::info;

use crate::config::Config;
use crate::manifest::RunSummary;

pub mod csv_batch_processor;
pub mod date_parser;
pub mod normalize;
pub mod reading;
pub mod writer;

use csv_batch_processor::ReadingBatchProcessor;
use writer::BatchWriter;

/// Stream `config.input_path` line by line into annotated batch files under
/// `config.output_dir`. Every chunk is rescaled against the same
/// `run_start`, which the caller captures once.
#[tracing::instrument(level = "info", skip(config), fields(input = %config.input_path.display()))]
pub fn transform_file(config: &Config, run_start: DateTime<Utc>) -> Result<RunSummary> {
    config.validate()?;
    let start = Instant::now();
    info!("Processing CSV in chunks of {}...", config.chunk_size);

    let file = File::open(&config.input_path)
        .with_context(|| format!("Failed to open input file: {:?}", config.input_path))?;
    let writer = BatchWriter::new(&config.output_dir)?;
    let mut processor =
        ReadingBatchProcessor::new(config.chunk_size, run_start, config.row_policy, writer);

    feed_lines(BufReader::new(file), &mut processor)
        .with_context(|| format!("Failed to read {:?}", config.input_path))?;
    let summary = processor.finish()?;

    if let Some(path) = &config.manifest_path {
        summary.write_json(path)?;
        info!("wrote manifest {}", path.display());
    }

    info!(
        rows = summary.total_rows,
        batches = summary.batches.len(),
        skipped = summary.skipped_rows,
        malformed = summary.malformed_rows,
        elapsed = ?start.elapsed(),
        "Transformation complete!"
    );
    Ok(summary)
}

/// Feed every line of `reader` into `processor`, one at a time.
pub fn feed_lines<R: BufRead>(reader: R, processor: &mut ReadingBatchProcessor) -> Result<()> {
    for (idx, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("reading line {}", idx + 1))?;
        processor.feed_line(&line)?;
    }
    Ok(())
}
