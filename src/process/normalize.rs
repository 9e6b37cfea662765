use chrono::{DateTime, Duration, Utc};
use tracing::{debug, instrument};

use crate::process::reading::Reading;

/// How far before the run start the target window opens.
pub const WINDOW_LEAD_DAYS: i64 = 20;
/// Width of the target window every chunk is squeezed into.
pub const WINDOW_SPAN_SECS: i64 = 15;

/// The fixed window `[run_start - 20d, run_start - 20d + 15s]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetWindow {
    pub start: DateTime<Utc>,
    pub span: Duration,
}

impl TargetWindow {
    pub fn before(run_start: DateTime<Utc>) -> Self {
        Self {
            start: run_start - Duration::days(WINDOW_LEAD_DAYS),
            span: Duration::seconds(WINDOW_SPAN_SECS),
        }
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.start + self.span
    }
}

/// What the normalizer found in a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSpan {
    pub min: Option<DateTime<Utc>>,
    pub max: Option<DateTime<Utc>>,
    pub rescaled: bool,
}

/// Rescale every timestamp in `chunk` onto `window`, keeping order and
/// proportional spacing. A chunk whose span is under one millisecond keeps
/// its timestamps.
///
/// Readings without a parseable timestamp are left out of the min/max scan
/// and keep their original text.
#[instrument(level = "debug", skip_all, fields(rows = chunk.len()))]
pub fn normalize_chunk(chunk: &mut [Reading], window: &TargetWindow) -> ChunkSpan {
    let mut min: Option<DateTime<Utc>> = None;
    let mut max: Option<DateTime<Utc>> = None;
    for ts in chunk.iter().filter_map(Reading::timestamp) {
        if min.map_or(true, |m| ts < m) {
            min = Some(ts);
        }
        if max.map_or(true, |m| ts > m) {
            max = Some(ts);
        }
    }

    // Span is measured in whole milliseconds, the unit the rescale divides by.
    let span_ms = match (min, max) {
        (Some(lo), Some(hi)) => (hi - lo).num_milliseconds(),
        _ => 0,
    };
    let lo = match min {
        Some(lo) if span_ms > 0 => lo,
        _ => {
            debug!(?min, ?max, "zero-length span, keeping original timestamps");
            chunk.iter_mut().for_each(Reading::keep_time);
            return ChunkSpan {
                min,
                max,
                rescaled: false,
            };
        }
    };

    let source_ms = span_ms as f64;
    let target_ms = window.span.num_milliseconds() as f64;
    for reading in chunk.iter_mut() {
        match reading.timestamp() {
            Some(ts) => {
                let elapsed_ms = (ts - lo).num_milliseconds() as f64;
                let offset_ms = (target_ms * elapsed_ms / source_ms).round() as i64;
                reading.retime(window.start + Duration::milliseconds(offset_ms));
            }
            None => reading.keep_time(),
        }
    }

    ChunkSpan {
        min,
        max,
        rescaled: true,
    }
}
