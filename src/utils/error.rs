use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("Validation error: {message}")]
    ValidationError { message: String },

    /// A warehouse statement failed; `message` is the warehouse diagnostic as received.
    #[error("Statement execution failed: {message}")]
    ExecutionError { statement: String, message: String },

    #[error("Object store error: {message}")]
    ObjectStoreError { message: String },

    #[error("Serialization error: {message}")]
    SerializationError { message: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration field: {field}")]
    MissingConfigError { field: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Parquet error: {0}")]
    ParquetError(#[from] parquet::errors::ParquetError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    Execution,
    Storage,
    Configuration,
    Encoding,
}

impl LoaderError {
    pub fn validation(message: impl Into<String>) -> Self {
        LoaderError::ValidationError {
            message: message.into(),
        }
    }

    pub fn execution(statement: impl Into<String>, message: impl Into<String>) -> Self {
        LoaderError::ExecutionError {
            statement: statement.into(),
            message: message.into(),
        }
    }

    pub fn object_store(message: impl Into<String>) -> Self {
        LoaderError::ObjectStoreError {
            message: message.into(),
        }
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        LoaderError::SerializationError {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            LoaderError::ValidationError { .. } => ErrorCategory::Validation,
            LoaderError::ExecutionError { .. } => ErrorCategory::Execution,
            LoaderError::ObjectStoreError { .. } | LoaderError::IoError(_) => {
                ErrorCategory::Storage
            }
            LoaderError::ConfigError { .. }
            | LoaderError::InvalidConfigValueError { .. }
            | LoaderError::MissingConfigError { .. } => ErrorCategory::Configuration,
            LoaderError::SerializationError { .. }
            | LoaderError::CsvError(_)
            | LoaderError::JsonError(_)
            | LoaderError::ParquetError(_) => ErrorCategory::Encoding,
        }
    }

    /// Process exit code used by the command line front end.
    pub fn exit_code(&self) -> i32 {
        match self.category() {
            ErrorCategory::Validation | ErrorCategory::Configuration => 2,
            ErrorCategory::Execution => 3,
            ErrorCategory::Storage => 4,
            ErrorCategory::Encoding => 5,
        }
    }
}

pub type Result<T> = std::result::Result<T, LoaderError>;
