//! Error types for accessor operations.

use thiserror::Error;

/// Errors returned by filesystem accessors.
#[derive(Error, Debug)]
pub enum AccessorError {
    /// The virtual path could not be parsed.
    #[error("Malformed path: {0}")]
    MalformedPath(String),

    /// No usable accessor is registered for the scheme.
    #[error("Unknown accessor '{0}'")]
    UnknownAccessor(String),

    /// The delegate opened the resource but cannot provide random access.
    #[error("Resource '{0}' is not seekable")]
    NotSeekable(String),

    /// The container could not be decoded.
    #[error("Failed to parse '{path}': {source}")]
    ParseFailure {
        path: String,
        #[source]
        source: regf::HiveError,
    },

    /// The in-container path does not name a key.
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    /// The accessor does not support this operation.
    #[error("{operation} is not implemented by the {accessor} accessor")]
    NotImplemented {
        operation: &'static str,
        accessor: &'static str,
    },

    /// I/O error from a delegate.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The owning scope has ended.
    #[error("Scope cancelled")]
    Cancelled,
}

impl AccessorError {
    /// Create a ParseFailure error.
    pub fn parse_failure(path: impl Into<String>, source: regf::HiveError) -> Self {
        AccessorError::ParseFailure {
            path: path.into(),
            source,
        }
    }

    /// Create a NotImplemented error.
    pub fn not_implemented(operation: &'static str, accessor: &'static str) -> Self {
        AccessorError::NotImplemented {
            operation,
            accessor,
        }
    }
}

/// Result type for accessor operations.
pub type AccessorResult<T> = Result<T, AccessorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AccessorError::not_implemented("open", "raw_reg");
        assert_eq!(
            err.to_string(),
            "open is not implemented by the raw_reg accessor"
        );

        let err = AccessorError::KeyNotFound("Software/Missing".into());
        assert!(err.to_string().contains("Software/Missing"));
    }

    #[test]
    fn test_parse_failure_keeps_source() {
        use std::error::Error as _;
        let err = AccessorError::parse_failure(
            "file:/tmp/x",
            regf::HiveError::InvalidHeader("truncated base block".into()),
        );
        assert!(err.source().is_some());
        assert!(err.to_string().contains("file:/tmp/x"));
    }
}
