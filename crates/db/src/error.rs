use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for store operations
pub type DbResult<T> = Result<T, DbError>;

/// A single schema violation on one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Prefix the field path, used to locate errors inside a batch insert.
    pub fn at_index(self, index: usize) -> Self {
        Self {
            field: format!("{}.{}", index, self.field),
            message: self.message,
        }
    }
}

#[derive(Debug, Error)]
pub enum DbError {
    #[error("{schema} validation failed: {}", summarize(.errors))]
    Validation {
        schema: String,
        errors: Vec<FieldError>,
    },

    #[error("Invalid {field}: {value}.")]
    InvalidId { field: &'static str, value: String },

    #[error("unsupported connection string '{0}'; expected memory:// or file://<path>")]
    UnsupportedScheme(String),

    #[error("failed to access store file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("store snapshot {} is corrupt: {source}", .path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode store snapshot: {0}")]
    Encode(#[from] serde_json::Error),
}

fn summarize(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|error| format!("{}: {}", error.field, error.message))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_message_lists_every_field() {
        let error = DbError::Validation {
            schema: "Book".to_string(),
            errors: vec![
                FieldError::new("title", "`title` is required"),
                FieldError::new("genre", "`genre` is required").at_index(2),
            ],
        };

        assert_eq!(
            error.to_string(),
            "Book validation failed: title: `title` is required, 2.genre: `genre` is required"
        );
    }

    #[test]
    fn invalid_id_names_field_and_value() {
        let error = DbError::InvalidId {
            field: "id",
            value: "not-an-id".to_string(),
        };
        assert_eq!(error.to_string(), "Invalid id: not-an-id.");
    }
}
