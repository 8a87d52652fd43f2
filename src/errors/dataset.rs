//! Dataset error types
//!
//! Structured errors for CSV ingestion and for dataset/row queries.
//!
//! ```rust
//! use datagrid::errors::DatasetError;
//!
//! let err = DatasetError::RowNotFound { dataset_id: 3, row_id: 41 };
//! assert_eq!(err.to_string(), "Row 41 not found in dataset 3");
//! ```

use thiserror::Error;

/// Dataset and row operation errors
#[derive(Error, Debug)]
pub enum DatasetError {
    /// Dataset not found by ID
    #[error("Dataset {0} not found")]
    DatasetNotFound(i32),

    /// Row not found under the given dataset
    #[error("Row {row_id} not found in dataset {dataset_id}")]
    RowNotFound { dataset_id: i32, row_id: i32 },

    /// Buffer is not parseable as CSV
    #[error("Invalid CSV: {0}")]
    InvalidCsv(String),

    /// CSV parsed but produced no data rows
    #[error("Empty data set: {0}")]
    EmptySource(String),

    /// Replacement row payload is not a JSON object
    #[error("Invalid row data: {0}")]
    InvalidRowData(String),

    /// Database operation failed
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// IO operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV reader error
    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),
}

impl DatasetError {
    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            DatasetError::DatasetNotFound(_) | DatasetError::RowNotFound { .. }
        )
    }

    /// Errors raised while turning an upload into rows
    pub fn is_ingestion_error(&self) -> bool {
        matches!(
            self,
            DatasetError::InvalidCsv(_) | DatasetError::EmptySource(_) | DatasetError::Csv(_)
        )
    }

    /// Get error code for API responses and logs
    pub fn error_code(&self) -> &'static str {
        match self {
            DatasetError::DatasetNotFound(_) | DatasetError::RowNotFound { .. } => "NOT_FOUND",
            DatasetError::InvalidRowData(_) => "VALIDATION_FAILED",
            DatasetError::InvalidCsv(_) | DatasetError::EmptySource(_) => "INVALID_CSV",
            DatasetError::Csv(_) => "CSV_ERROR",
            DatasetError::Database(_) => "DATABASE_ERROR",
            DatasetError::Io(_) => "IO_ERROR",
        }
    }
}
