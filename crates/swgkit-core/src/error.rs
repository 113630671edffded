//! Unified error handling for swgkit
//!
//! Only structural failures surface as errors. Local malformation inside a
//! file (a bad tag, a truncated record array) is recovered by the codecs and
//! reported through `tracing` instead.

use std::path::PathBuf;
use thiserror::Error;

/// Unified error type for all swgkit operations
#[derive(Error, Debug)]
pub enum Error {
    // ==================== I/O Errors ====================

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// File not found
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    // ==================== Structural Errors ====================

    /// Root container type name does not match the expected format
    #[error("Unexpected form: expected {expected}, found {found}")]
    UnexpectedForm {
        expected: String,
        found: String,
    },

    /// A mandatory chunk or form is absent
    #[error("Missing required chunk: {chunk}")]
    MissingChunk {
        chunk: String,
    },

    /// Unsupported format version
    #[error("Unsupported version: {version} (supported: {supported})")]
    UnsupportedVersion {
        version: String,
        supported: String,
    },

    /// Unexpected end of data
    #[error("Unexpected end of data at offset {offset}")]
    UnexpectedEof {
        offset: u64,
    },

    /// Invalid data structure
    #[error("Invalid data: {message}")]
    InvalidData {
        message: String,
    },

    /// Checksum mismatch
    #[error("Checksum mismatch: expected {expected:08X}, got {actual:08X}")]
    ChecksumMismatch {
        expected: u32,
        actual: u32,
    },

    // ==================== General Errors ====================

    /// Custom error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

/// Result type using the unified Error
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create an error with additional context
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Error::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Create an invalid data error
    pub fn invalid_data(message: impl Into<String>) -> Self {
        Error::InvalidData {
            message: message.into(),
        }
    }

    /// Create a missing chunk error
    pub fn missing_chunk(chunk: impl Into<String>) -> Self {
        Error::MissingChunk {
            chunk: chunk.into(),
        }
    }

    /// Create an unexpected form error
    pub fn unexpected_form(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Error::UnexpectedForm {
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Check if this is a parse/format error
    pub fn is_parse_error(&self) -> bool {
        match self {
            Error::UnexpectedForm { .. }
            | Error::MissingChunk { .. }
            | Error::UnsupportedVersion { .. }
            | Error::UnexpectedEof { .. }
            | Error::InvalidData { .. }
            | Error::ChecksumMismatch { .. } => true,
            Error::WithContext { source, .. } => source.is_parse_error(),
            _ => false,
        }
    }

    /// Strip any context wrappers and return the underlying error
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::WithContext { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_with_context() {
        let err = Error::missing_chunk("DATA");
        let contextualized = err.with_context("while decoding PRTO");

        assert!(contextualized.to_string().contains("while decoding PRTO"));
        assert!(contextualized.to_string().contains("DATA"));
    }

    #[test]
    fn test_is_parse_error() {
        assert!(Error::unexpected_form("PRTO", "FLOR").is_parse_error());
        assert!(Error::missing_chunk("DATA").with_context("cell 3").is_parse_error());
        assert!(!Error::FileNotFound(PathBuf::from("/test")).is_parse_error());
    }

    #[test]
    fn test_root_cause() {
        let err = Error::ChecksumMismatch { expected: 1, actual: 2 }
            .with_context("inner")
            .with_context("outer");

        assert!(matches!(err.root_cause(), Error::ChecksumMismatch { expected: 1, actual: 2 }));
    }

    #[test]
    fn test_result_context() {
        let result: Result<()> = Err(Error::FileNotFound(PathBuf::from("/test")));
        let with_context = result.context("loading data");

        assert!(with_context.is_err());
        assert!(with_context.unwrap_err().to_string().contains("loading data"));
    }
}
