use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::config::RowPolicy;
use crate::manifest::{BatchReport, RunSummary};
use crate::process::{
    normalize::{normalize_chunk, TargetWindow},
    reading::{parse_line, Reading},
    writer::BatchWriter,
};

/// Groups input lines into chunks of `chunk_size` readings, and for every
/// full chunk runs the normalizer and writes the batch file.
pub struct ReadingBatchProcessor {
    chunk_size: usize,
    run_start: DateTime<Utc>,
    window: TargetWindow,
    policy: RowPolicy,
    writer: BatchWriter,
    chunk: Vec<Reading>,
    chunk_index: usize,
    line_no: u64,
    total_rows: u64,
    skipped_rows: u64,
    malformed_rows: u64,
    batches: Vec<BatchReport>,
}

impl ReadingBatchProcessor {
    /// `run_start` anchors the target window of every chunk in this run.
    pub fn new(
        chunk_size: usize,
        run_start: DateTime<Utc>,
        policy: RowPolicy,
        writer: BatchWriter,
    ) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            run_start,
            window: TargetWindow::before(run_start),
            policy,
            writer,
            chunk: Vec::with_capacity(chunk_size),
            chunk_index: 0,
            line_no: 0,
            total_rows: 0,
            skipped_rows: 0,
            malformed_rows: 0,
            batches: Vec::new(),
        }
    }

    /// Rows written so far.
    pub fn row_count(&self) -> u64 {
        self.total_rows
    }

    /// Rows sitting in the buffer, not yet written.
    #[cfg(test)]
    pub fn pending(&self) -> usize {
        self.chunk.len()
    }

    /// Feed one input line (without its line terminator). Blank lines are
    /// dropped; the chunk is flushed as soon as it reaches `chunk_size`.
    pub fn feed_line(&mut self, line: &str) -> Result<()> {
        self.line_no += 1;
        if line.trim().is_empty() {
            return Ok(());
        }

        let reading = match self.policy {
            RowPolicy::PassThrough => {
                let reading = Reading::from_line(line);
                if let Err(e) = reading.validate() {
                    self.malformed_rows += 1;
                    debug!(line = self.line_no, error = %e, "passing malformed row through");
                }
                reading
            }
            RowPolicy::Skip => match parse_line(line) {
                Ok(reading) => reading,
                Err(e) => {
                    self.skipped_rows += 1;
                    warn!(line = self.line_no, error = %e, "skipping malformed row");
                    return Ok(());
                }
            },
            RowPolicy::Strict => parse_line(line)
                .with_context(|| format!("malformed row at line {}", self.line_no))?,
        };

        self.chunk.push(reading);
        if self.chunk.len() >= self.chunk_size {
            self.flush_batch(false)?;
        }
        Ok(())
    }

    /// Normalize and write whatever is buffered, then start a fresh chunk.
    fn flush_batch(&mut self, is_final: bool) -> Result<()> {
        if self.chunk.is_empty() {
            return Ok(());
        }

        let span = normalize_chunk(&mut self.chunk, &self.window);
        let path = self
            .writer
            .write_batch(&self.chunk, self.chunk_index)
            .with_context(|| format!("writing chunk {}", self.chunk_index))?;

        let rows = self.chunk.len() as u64;
        self.total_rows += rows;
        info!(
            "Processed {}chunk {}, rows: {}, total: {}",
            if is_final { "final " } else { "" },
            self.chunk_index + 1,
            rows,
            self.total_rows
        );

        self.batches.push(BatchReport {
            index: self.chunk_index,
            file: path,
            rows,
            source_start: span.min,
            source_end: span.max,
            rescaled: span.rescaled,
        });
        self.chunk_index += 1;
        self.chunk.clear();
        Ok(())
    }

    /// Call once at end of input to flush the trailing partial chunk.
    pub fn finish(mut self) -> Result<RunSummary> {
        self.flush_batch(true)?;
        Ok(RunSummary {
            run_start: self.run_start,
            window_start: self.window.start,
            chunk_size: self.chunk_size,
            total_rows: self.total_rows,
            skipped_rows: self.skipped_rows,
            malformed_rows: self.malformed_rows,
            batches: self.batches,
        })
    }
}
