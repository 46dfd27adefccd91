//! Error types for flow table construction and configuration.
//!
//! Semantic outcomes of table operations (a rejected insert, a delete that
//! matched nothing) are not errors; they are reported through
//! [`Rejected`](crate::Rejected) and plain counts. This module only covers
//! resource exhaustion and configuration problems.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for table operations.
pub type TableResult<T> = Result<T, TableError>;

/// Errors that can occur while building a flow table.
#[derive(Debug, Error)]
pub enum TableError {
    /// Memory for the table could not be reserved. Nothing was built.
    #[error("Unable to allocate {what} ({requested} entries)")]
    Unavailable {
        /// What was being allocated.
        what: &'static str,
        /// Number of entries requested.
        requested: usize,
    },

    /// Configuration validation error.
    #[error("Invalid configuration for {field}: {message}")]
    InvalidConfig {
        /// The field that failed validation.
        field: String,
        /// Error message.
        message: String,
    },

    /// Failed to read a configuration file.
    #[error("Failed to read table configuration '{}': {source}", path.display())]
    Io {
        /// The file that could not be read.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },

    /// Configuration text could not be parsed.
    #[error("Failed to parse table configuration: {message}")]
    Parse {
        /// Parser error message.
        message: String,
    },
}

impl TableError {
    /// Creates an allocation failure error.
    pub fn unavailable(what: &'static str, requested: usize) -> Self {
        Self::Unavailable { what, requested }
    }

    /// Creates an invalid configuration error.
    pub fn invalid_config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates a parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }
}
