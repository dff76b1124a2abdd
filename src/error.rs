use thiserror::Error;

#[derive(Error, Debug)]
pub enum SpendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[cfg(feature = "xlsx")]
    #[error("Spreadsheet error: {0}")]
    Spreadsheet(String),

    /// The input is not readable as any supported format.
    #[error("Unsupported file format: {0}")]
    Format(String),

    /// The input looked like text but could not be decoded.
    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Mapping error: {0}")]
    Mapping(#[from] MappingError),

    #[error("Invalid rule: {0}")]
    InvalidRule(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("{0}")]
    Other(String),
}

/// Problems with a column mapping. These are recoverable: the user fixes the
/// mapping and the already-parsed rows are mapped again.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MappingError {
    #[error("no column mapping configured and none could be detected from the header")]
    Unmapped,

    #[error("{field} column '{name}' is not in the header")]
    UnknownColumn { field: &'static str, name: String },

    #[error("{field} column '{name}' is named, but the file has no header row")]
    NoHeader { field: &'static str, name: String },

    #[error("{field} column {index} is out of range (rows have {width} columns)")]
    OutOfRange {
        field: &'static str,
        index: usize,
        width: usize,
    },

    #[error("{first} and {second} are both mapped to column {index}")]
    DuplicateColumn {
        first: &'static str,
        second: &'static str,
        index: usize,
    },
}

pub type Result<T> = std::result::Result<T, SpendError>;
