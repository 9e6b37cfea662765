use thiserror::Error;

/// Why a single input line could not be turned into a clean reading.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowError {
    #[error("expected {expected} comma-separated fields, found {found}")]
    FieldCount { expected: usize, found: usize },

    #[error("unparseable readingDate {value:?}")]
    Timestamp { value: String },
}
