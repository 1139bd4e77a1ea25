use thiserror::Error;

use crate::types::Timestamp;

#[derive(Error, Debug)]
pub enum TwinError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Timestamp column '{column}' not found in {source_name}")]
    MissingTimeColumn { column: String, source_name: String },

    #[error("Cannot parse timestamp '{value}' on line {line}")]
    BadTimestamp { value: String, line: u64 },

    #[error("Simulator not started")]
    NotStarted,

    #[error("Column '{column}' not found in data")]
    MissingColumn { column: String },

    #[error("Insufficient data: {reason}")]
    InsufficientData { reason: String },

    #[error("Design matrix is singular (features: {features:?})")]
    SingularDesign { features: Vec<String> },

    #[error("No model currently trained")]
    NotTrained,

    #[error("Model features {found:?} do not match configured features {expected:?}")]
    FeatureMismatch { expected: Vec<String>, found: Vec<String> },

    #[error("Ledger append out of order: {dt} is not after {last}")]
    OutOfOrder { dt: Timestamp, last: Timestamp },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Coarse classification callers use to decide how to surface a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Recording or database unreadable, missing or malformed.
    Io,
    /// A configured column is missing or misnamed.
    Config,
    /// Empty or insufficient data for the requested operation.
    Value,
}

impl TwinError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TwinError::Io(_)
            | TwinError::Csv(_)
            | TwinError::Serialization(_)
            | TwinError::MissingTimeColumn { .. }
            | TwinError::BadTimestamp { .. }
            | TwinError::NotStarted
            | TwinError::Other(_) => ErrorKind::Io,
            TwinError::MissingColumn { .. } | TwinError::FeatureMismatch { .. } => {
                ErrorKind::Config
            }
            TwinError::InsufficientData { .. }
            | TwinError::SingularDesign { .. }
            | TwinError::NotTrained
            | TwinError::OutOfOrder { .. } => ErrorKind::Value,
        }
    }

    pub(crate) fn insufficient(reason: impl Into<String>) -> Self {
        TwinError::InsufficientData { reason: reason.into() }
    }

    pub(crate) fn missing_column(column: &str) -> Self {
        TwinError::MissingColumn { column: column.to_string() }
    }
}

pub type TwinResult<T> = Result<T, TwinError>;
