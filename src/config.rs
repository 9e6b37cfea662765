use anyhow::{bail, Context, Result};
use std::{env, path::PathBuf, str::FromStr};

pub const DEFAULT_INPUT_PATH: &str = "READING_2023-06-01.csv";
pub const DEFAULT_CHUNK_SIZE: usize = 210_000;

/// What the driver does with a line that fails strict parsing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RowPolicy {
    /// Keep the row as-is and only count it. Unlike the legacy tool, a bad
    /// `readingDate` never disables rescaling for its chunk; the row keeps
    /// its raw text in all three timestamp columns.
    #[default]
    PassThrough,
    /// Drop the row and count it.
    Skip,
    /// Abort the run on the first bad row.
    Strict,
}

impl RowPolicy {
    pub fn as_str(&self) -> &str {
        match self {
            RowPolicy::PassThrough => "passthrough",
            RowPolicy::Skip => "skip",
            RowPolicy::Strict => "strict",
        }
    }
}

impl FromStr for RowPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "passthrough" | "pass-through" => Ok(RowPolicy::PassThrough),
            "skip" => Ok(RowPolicy::Skip),
            "strict" => Ok(RowPolicy::Strict),
            other => bail!("unknown row policy {:?} (expected passthrough, skip or strict)", other),
        }
    }
}

/// Everything a run needs besides the clock.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub input_path: PathBuf,
    pub output_dir: PathBuf,
    pub chunk_size: usize,
    pub row_policy: RowPolicy,
    pub manifest_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_path: PathBuf::from(DEFAULT_INPUT_PATH),
            output_dir: PathBuf::from("."),
            chunk_size: DEFAULT_CHUNK_SIZE,
            row_policy: RowPolicy::default(),
            manifest_path: None,
        }
    }
}

impl Config {
    /// Reads `INPUT_PATH`, `OUTPUT_DIR`, `CHUNK_SIZE`, `ROW_POLICY` and
    /// `MANIFEST_PATH` from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`Config::from_env`] but against an arbitrary lookup; unset
    /// or blank keys fall back to the defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut cfg = Config::default();

        if let Some(path) = get("INPUT_PATH") {
            cfg.input_path = PathBuf::from(path);
        }
        if let Some(dir) = get("OUTPUT_DIR") {
            cfg.output_dir = PathBuf::from(dir);
        }
        if let Some(raw) = get("CHUNK_SIZE") {
            cfg.chunk_size = raw
                .trim()
                .replace('_', "")
                .parse()
                .with_context(|| format!("CHUNK_SIZE must be a positive integer, got {:?}", raw))?;
        }
        if let Some(raw) = get("ROW_POLICY") {
            cfg.row_policy = raw.parse().context("parsing ROW_POLICY")?;
        }
        cfg.manifest_path = get("MANIFEST_PATH").map(PathBuf::from);

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            bail!("CHUNK_SIZE must be at least 1");
        }
        Ok(())
    }
}
