use thiserror::Error;

#[derive(Error, Debug)]
pub enum FinancialAnalysisError {
    #[error("Unrecognized table layout: {0}")]
    UnrecognizedLayout(String),

    #[error("Unknown period: '{0}' is not present in the dataset")]
    UnknownPeriod(String),

    #[error("Invalid configuration for '{field}': {details}")]
    ValidationError { field: String, details: String },

    #[error("Dataset '{0}' already exists; re-uploads must use a new dataset id")]
    DatasetExists(String),

    #[error("Dataset '{0}' not found")]
    DatasetNotFound(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[cfg(feature = "csv")]
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, FinancialAnalysisError>;
