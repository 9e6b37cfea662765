use chrono::{DateTime, Utc};

use crate::error::RowError;
use crate::process::date_parser::{format_rfc3339, parse_reading_date};

pub const FIELD_COUNT: usize = 5;

/// One meter/sensor reading as it came off an input line.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub reading_date: String,
    pub value: String,
    pub display_reference: String,
    pub location: String,
    pub reading_type: String,
    /// `_start` / `_stop`; empty until the normalizer has seen the chunk.
    pub start: Option<String>,
    pub stop: Option<String>,
    timestamp: Option<DateTime<Utc>>,
    field_count: usize,
}

impl Reading {
    /// Positional split on `,`. Missing trailing fields become empty strings
    /// and anything past the fifth field is ignored.
    pub fn from_line(line: &str) -> Self {
        let mut cols = line.split(',');
        let mut next = || cols.next().map(str::to_string);

        let reading_date = next().unwrap_or_default();
        let value = next().unwrap_or_default();
        let display_reference = next().unwrap_or_default();
        let location = next().unwrap_or_default();
        let reading_type = next().unwrap_or_default();

        let timestamp = parse_reading_date(&reading_date);
        Self {
            reading_date,
            value,
            display_reference,
            location,
            reading_type,
            start: None,
            stop: None,
            timestamp,
            field_count: line.split(',').count(),
        }
    }

    /// The parsed `readingDate`, if it was parseable.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }

    #[cfg(test)]
    pub fn field_count(&self) -> usize {
        self.field_count
    }

    pub fn validate(&self) -> Result<(), RowError> {
        if self.field_count != FIELD_COUNT {
            return Err(RowError::FieldCount {
                expected: FIELD_COUNT,
                found: self.field_count,
            });
        }
        if self.timestamp.is_none() {
            return Err(RowError::Timestamp {
                value: self.reading_date.clone(),
            });
        }
        Ok(())
    }

    /// Moves the reading onto `ts`: `readingDate`, `_start` and `_stop` all
    /// become the same instant.
    pub(crate) fn retime(&mut self, ts: DateTime<Utc>) {
        let rendered = format_rfc3339(ts);
        self.start = Some(rendered.clone());
        self.stop = Some(rendered.clone());
        self.reading_date = rendered;
    }

    /// Stamps `_start` / `_stop` with the untouched `readingDate`.
    pub(crate) fn keep_time(&mut self) {
        self.start = Some(self.reading_date.clone());
        self.stop = Some(self.reading_date.clone());
    }
}

/// Strict parse: the lenient record, rejected when it has the wrong number
/// of fields or an unparseable timestamp.
pub fn parse_line(line: &str) -> Result<Reading, RowError> {
    let reading = Reading::from_line(line);
    reading.validate()?;
    Ok(reading)
}
