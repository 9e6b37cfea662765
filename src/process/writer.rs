use anyhow::{Context, Result};
use std::{fs, io::ErrorKind, path::PathBuf};
use tracing::{debug, instrument, warn};

use crate::process::reading::Reading;

/// Header block every batch file starts with, byte for byte.
pub const ANNOTATIONS: [&str; 4] = [
    "#group,false,false,true,true,false,false,true,true,true,true,true",
    "#datatype,string,long,dateTime:RFC3339,dateTime:RFC3339,dateTime:RFC3339,double,string,string,string,string,string",
    "#default,mean,,,,,,,,,,",
    ",result,table,_start,_stop,_time,_value,_field,_measurement,displayReference,location,readingType",
];

pub const FIELD_NAME: &str = "reading";
pub const MEASUREMENT: &str = "metrics";

pub fn batch_file_name(chunk_num: usize) -> String {
    format!("influx_batch_{}.csv", chunk_num)
}

/// One 12-column annotated CSV line. Values are joined verbatim; a comma
/// inside a value will shift the columns.
pub fn format_row(r: &Reading) -> String {
    [
        "",
        "",
        "0",
        r.start.as_deref().unwrap_or(""),
        r.stop.as_deref().unwrap_or(""),
        r.reading_date.as_str(),
        r.value.as_str(),
        FIELD_NAME,
        MEASUREMENT,
        r.display_reference.as_str(),
        r.location.as_str(),
        r.reading_type.as_str(),
    ]
    .join(",")
}

/// Writes processed chunks as `influx_batch_<n>.csv` under one directory.
#[derive(Debug, Clone)]
pub struct BatchWriter {
    out_dir: PathBuf,
}

impl BatchWriter {
    pub fn new(out_dir: impl Into<PathBuf>) -> Result<Self> {
        let out_dir = out_dir.into();
        fs::create_dir_all(&out_dir)
            .with_context(|| format!("creating output directory {}", out_dir.display()))?;
        Ok(Self { out_dir })
    }

    /// Render `chunk` under the annotation header and write it in one go,
    /// replacing any previous file with the same index.
    #[instrument(level = "debug", skip(self, chunk), fields(rows = chunk.len()))]
    pub fn write_batch(&self, chunk: &[Reading], chunk_num: usize) -> Result<PathBuf> {
        let final_path = self.out_dir.join(batch_file_name(chunk_num));
        let tmp_path = self
            .out_dir
            .join(format!("{}.tmp", batch_file_name(chunk_num)));

        let content = render_batch(chunk);
        let written = fs::write(&tmp_path, content.as_bytes())
            .with_context(|| format!("writing {}", tmp_path.display()))
            .and_then(|_| {
                fs::rename(&tmp_path, &final_path).with_context(|| {
                    format!(
                        "moving {} into place at {}",
                        tmp_path.display(),
                        final_path.display()
                    )
                })
            });
        if let Err(e) = written {
            if let Err(rm) = fs::remove_file(&tmp_path) {
                if rm.kind() != ErrorKind::NotFound {
                    warn!(path = %tmp_path.display(), error = %rm, "failed to remove temp batch");
                }
            }
            return Err(e);
        }

        debug!(path = %final_path.display(), bytes = content.len(), "batch written");
        Ok(final_path)
    }
}

/// Annotations then one line per reading, `\n`-joined, no trailing newline.
pub fn render_batch(chunk: &[Reading]) -> String {
    let body_len: usize = ANNOTATIONS.iter().map(|l| l.len() + 1).sum::<usize>()
        + chunk.len() * 96;
    let mut out = String::with_capacity(body_len);
    out.push_str(&ANNOTATIONS.join("\n"));
    for r in chunk {
        out.push('\n');
        out.push_str(&format_row(r));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn reading(line: &str) -> Reading {
        let mut r = Reading::from_line(line);
        r.keep_time();
        r
    }

    #[test]
    fn test_row_has_twelve_columns() {
        let r = reading("2023-06-01T00:00:00Z,42,ref1,locA,typeA");
        let line = format_row(&r);
        assert_eq!(
            line,
            ",,0,2023-06-01T00:00:00Z,2023-06-01T00:00:00Z,2023-06-01T00:00:00Z,42,reading,metrics,ref1,locA,typeA"
        );
        assert_eq!(line.split(',').count(), 12);
    }

    #[test]
    fn test_missing_fields_render_empty() {
        let r = Reading::from_line("2023-06-01T00:00:00Z");
        let line = format_row(&r);
        assert_eq!(line, ",,0,,,2023-06-01T00:00:00Z,,reading,metrics,,,");
        assert_eq!(line.split(',').count(), 12);
    }

    #[test]
    fn test_annotations_have_twelve_columns() {
        for line in ANNOTATIONS {
            assert_eq!(line.split(',').count(), 12, "{}", line);
        }
    }

    #[test]
    fn test_write_batch_layout() -> Result<()> {
        let tmp = tempdir()?;
        let writer = BatchWriter::new(tmp.path())?;
        let rows = vec![
            reading("2023-06-01T00:00:00Z,1,ref1,locA,typeA"),
            reading("2023-06-01T00:00:00Z,,ref2,locB,"),
        ];

        let path = writer.write_batch(&rows, 3)?;
        assert_eq!(path, tmp.path().join("influx_batch_3.csv"));
        assert!(!tmp.path().join("influx_batch_3.csv.tmp").exists());

        let text = fs::read_to_string(&path)?;
        let lines: Vec<&str> = text.split('\n').collect();
        assert_eq!(lines.len(), 6);
        assert_eq!(&lines[..4], &ANNOTATIONS[..]);
        assert!(lines[4].ends_with(",1,reading,metrics,ref1,locA,typeA"));
        assert!(lines[5].ends_with(",,reading,metrics,ref2,locB,"));
        assert!(!text.ends_with('\n'));
        Ok(())
    }

    #[test]
    fn test_write_batch_overwrites() -> Result<()> {
        let tmp = tempdir()?;
        let writer = BatchWriter::new(tmp.path().join("nested/out"))?;
        writer.write_batch(
            &[
                reading("2023-06-01T00:00:00Z,1,a,b,c"),
                reading("2023-06-01T00:00:00Z,2,a,b,c"),
            ],
            0,
        )?;
        let path = writer.write_batch(&[reading("2023-06-01T00:00:00Z,9,a,b,c")], 0)?;

        let text = fs::read_to_string(path)?;
        assert_eq!(text.lines().count(), 5);
        assert!(text.contains(",9,reading,"));
        assert!(!text.contains(",1,reading,"));
        Ok(())
    }

    #[test]
    fn test_failed_rename_leaves_no_tmp() -> Result<()> {
        let tmp = tempdir()?;
        let writer = BatchWriter::new(tmp.path())?;
        fs::create_dir(tmp.path().join("influx_batch_0.csv"))?;

        let err = writer
            .write_batch(&[reading("2023-06-01T00:00:00Z,1,a,b,c")], 0)
            .unwrap_err();
        assert!(format!("{:#}", err).contains("influx_batch_0.csv"));
        assert!(!tmp.path().join("influx_batch_0.csv.tmp").exists());
        assert!(tmp.path().join("influx_batch_0.csv").is_dir());
        Ok(())
    }
}
