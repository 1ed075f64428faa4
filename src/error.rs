/// Error types for LiveGrid
///
/// Every operation that can be rejected returns a `GridError`. Rejections
/// caused by what the user asked for (wrong index type, column mismatch,
/// non-coercible edit) are reported back to the view as `show_error`
/// payloads; everything else is logged by the dispatcher.

use crate::table::RowId;

/// All errors produced by the grid engine.
#[derive(Debug, thiserror::Error)]
pub enum GridError {
    #[error("Column '{0}' not found")]
    ColumnNotFound(String),

    #[error("Cannot add a row to a table with a non-integer index")]
    NonIntegerIndex,

    #[error("Cannot duplicate the last row of an empty table")]
    EmptyDataset,

    #[error("Index value {0} has no successor")]
    IndexOverflow(i64),

    /// Explicit row fields did not match the table's column set.
    #[error("Row fields do not match the table columns: {0}")]
    ColumnMismatch(String),

    #[error("Cannot remove rows from a multi-indexed table by partial key {0}")]
    AmbiguousKey(String),

    #[error("Index value {0} not found")]
    IndexNotFound(String),

    #[error("No row with id {0}")]
    RowNotFound(RowId),

    #[error("Column '{0}' is not editable")]
    NotEditable(String),

    #[error("Could not set '{column}' to {value}: {reason}")]
    InvalidEdit {
        column: String,
        value: String,
        reason: String,
    },

    #[error("Invalid dataset: {0}")]
    InvalidDataset(String),

    /// A dropdown page was requested before the dropdown was ever opened.
    #[error("Filter values for column '{0}' have not been listed yet")]
    FilterNotInitialized(String),

    #[error("Value cannot be serialized: {0}")]
    Serialization(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, GridError>;

impl GridError {
    /// True for rejections of user input. These abort the operation, leave
    /// both datasets untouched and are surfaced through `show_error`.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            GridError::NonIntegerIndex
                | GridError::EmptyDataset
                | GridError::IndexOverflow(_)
                | GridError::ColumnMismatch(_)
                | GridError::AmbiguousKey(_)
                | GridError::IndexNotFound(_)
                | GridError::NotEditable(_)
                | GridError::InvalidEdit { .. }
        )
    }
}
