use thiserror::Error;

#[derive(Error, Debug)]
pub enum CardEntryError {
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Lookup error: {0}")]
    LookupError(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Runtime error: {0}")]
    RuntimeError(String),
}

pub type Result<T> = std::result::Result<T, CardEntryError>;
