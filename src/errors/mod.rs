//! Domain error types for datagrid
//!
//! Services return [`DatasetError`]; the HTTP layer decides which status
//! code each variant maps to on a given route (see `server::error`).
//!
//! ```rust
//! use datagrid::errors::{DatasetError, DatasetResult};
//!
//! fn find(id: i32) -> DatasetResult<()> {
//!     Err(DatasetError::DatasetNotFound(id))
//! }
//!
//! assert!(find(7).unwrap_err().is_not_found());
//! ```

pub mod dataset;

pub use dataset::DatasetError;

/// Result type alias for dataset operations
pub type DatasetResult<T> = Result<T, DatasetError>;
