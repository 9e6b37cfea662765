use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

/// Where one chunk ended up and what it covered before rescaling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub index: usize,
    pub file: PathBuf,
    pub rows: u64,
    pub source_start: Option<DateTime<Utc>>,
    pub source_end: Option<DateTime<Utc>>,
    pub rescaled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub run_start: DateTime<Utc>,
    pub window_start: DateTime<Utc>,
    pub chunk_size: usize,
    pub total_rows: u64,
    pub skipped_rows: u64,
    pub malformed_rows: u64,
    pub batches: Vec<BatchReport>,
}

impl RunSummary {
    /// Pretty JSON, parent directories created as needed.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let file =
            File::create(path).with_context(|| format!("creating manifest {}", path.display()))?;
        let mut out = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut out, self)
            .with_context(|| format!("writing manifest {}", path.display()))?;
        out.flush()
            .with_context(|| format!("flushing manifest {}", path.display()))?;
        Ok(())
    }
}
