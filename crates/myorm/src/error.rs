//! Error types for myorm

use crate::value::Value;
use thiserror::Error;

/// Result type alias for myorm operations
pub type OrmResult<T> = Result<T, OrmError>;

/// Error types for database operations
#[derive(Debug, Error)]
pub enum OrmError {
    /// Database connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// A statement failed to prepare or execute.
    ///
    /// Carries the compiled SQL, the bound values in placeholder order and the
    /// driver message. Never retried.
    #[error("Query execution failed: {message} (sql: {sql})")]
    QueryExecution {
        sql: String,
        params: Vec<Value>,
        message: String,
    },

    /// No primary key value is available on the record
    #[error("Missing primary key on `{table}`")]
    MissingPrimaryKey { table: String },

    /// An operation received a record bound to a different table
    #[error("Type mismatch: expected `{expected}`, got `{found}`")]
    TypeMismatch { expected: String, found: String },

    /// The structure of one table could not be read
    #[error("Schema introspection failed for `{table}`: {message}")]
    SchemaIntrospection { table: String, message: String },

    /// A row could not be mapped to the requested target type
    #[error("Invalid fetch target `{target}`: {message}")]
    InvalidFetchTarget { target: String, message: String },

    /// Row not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Row decode/mapping error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl OrmError {
    /// Create a query execution error
    pub fn query_execution(
        sql: impl Into<String>,
        params: &[Value],
        message: impl Into<String>,
    ) -> Self {
        Self::QueryExecution {
            sql: sql.into(),
            params: params.to_vec(),
            message: message.into(),
        }
    }

    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a type mismatch error between two table names
    pub fn type_mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Create an invalid fetch target error
    pub fn invalid_fetch_target(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidFetchTarget {
            target: target.into(),
            message: message.into(),
        }
    }

    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Check if this is a missing primary key error
    pub fn is_missing_primary_key(&self) -> bool {
        matches!(self, Self::MissingPrimaryKey { .. })
    }

    /// Check if this is a query execution error
    pub fn is_query_execution(&self) -> bool {
        matches!(self, Self::QueryExecution { .. })
    }
}
