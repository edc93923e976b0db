//! Error types for the character store

use thiserror::Error;

/// Result type for character store operations
pub type Result<T> = std::result::Result<T, CharacterError>;

/// Errors that can occur in schema, record, and access operations
#[derive(Debug, Error)]
pub enum CharacterError {
    /// Malformed numeric or boolean input
    #[error("invalid value for {field}: {message}")]
    Validation { field: String, message: String },

    /// Reference to a column that is not part of the live schema
    #[error("unknown field: {name}")]
    UnknownField { name: String },

    /// Attempt to remove or edit a system column
    #[error("field '{name}' is protected and cannot be changed")]
    ProtectedField { name: String },

    /// Duplicate column name or unsupported column type
    #[error("schema conflict: {message}")]
    SchemaConflict { message: String },

    /// Column name is empty or not a plain identifier
    #[error("invalid field name: '{name}'")]
    InvalidName { name: String },

    /// Role or ownership check failed
    #[error("permission denied: {reason}")]
    PermissionDenied { reason: String },

    /// Operation on a missing record or user
    #[error("{resource} not found: {id}")]
    NotFound { resource: String, id: String },

    /// A previous column removal was interrupted and left the store flagged
    #[error("schema rebuild of column '{column}' was interrupted; repair the database and clear the flag")]
    RecoveryRequired { column: String },

    /// Column removal failed and was rolled back
    #[error("failed to remove field '{column}': {source}")]
    SchemaRebuild {
        column: String,
        source: rusqlite::Error,
    },

    /// Any other SQLite failure
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// Reading interactive input failed
    #[error("input error: {0}")]
    Io(#[from] std::io::Error),
}

impl CharacterError {
    /// Create a validation error
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create an unknown field error
    pub fn unknown_field(name: impl Into<String>) -> Self {
        Self::UnknownField { name: name.into() }
    }

    /// Create a schema conflict error
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::SchemaConflict {
            message: message.into(),
        }
    }

    /// Create a permission denied error
    pub fn denied(reason: impl Into<String>) -> Self {
        Self::PermissionDenied {
            reason: reason.into(),
        }
    }

    /// Create a not found error for a record id
    pub fn record_not_found(id: i64) -> Self {
        Self::NotFound {
            resource: "character".into(),
            id: id.to_string(),
        }
    }

    /// Whether the caller can fix this by re-entering input
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }
}
