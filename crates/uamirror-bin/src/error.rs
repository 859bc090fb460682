// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Error types for the uamirror binary.

use thiserror::Error;

/// Result type alias for uamirror-bin operations.
pub type BinResult<T> = Result<T, BinError>;

/// Errors that can occur in the uamirror binary.
#[derive(Debug, Error)]
pub enum BinError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Runtime error.
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(String),

    /// Requested item does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Client library error.
    #[error("{0}")]
    Mirror(#[from] uamirror::MirrorError),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        /// The context description.
        context: String,
        /// The underlying error.
        #[source]
        source: Box<BinError>,
    },
}

impl BinError {
    /// Creates a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Creates a runtime error.
    pub fn runtime(msg: impl Into<String>) -> Self {
        Self::Runtime(msg.into())
    }

    /// Creates a not found error.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Adds context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Returns the exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Configuration(_) => 1,
            Self::Runtime(_) => 3,
            Self::Io(_) => 4,
            Self::NotFound(_) => 5,
            Self::Mirror(e) => match e {
                uamirror::MirrorError::Configuration(_) => 1,
                e if e.is_not_found() => 5,
                _ => 6,
            },
            Self::WithContext { source, .. } => source.exit_code(),
        }
    }
}

impl From<std::io::Error> for BinError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<anyhow::Error> for BinError {
    fn from(err: anyhow::Error) -> Self {
        Self::Runtime(format!("{:#}", err))
    }
}

// =============================================================================
// Error Reporting
// =============================================================================

/// Reports an error with its cause chain.
pub fn report_error(error: &BinError) {
    eprintln!("Error: {}", error);

    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        eprintln!("  Caused by: {}", cause);
        source = cause.source();
    }
}

/// Reports an error and exits with the appropriate code.
pub fn report_error_and_exit(error: BinError) -> ! {
    report_error(&error);
    std::process::exit(error.exit_code())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use uamirror::{CacheError, ConfigurationError, MirrorError};

    #[test]
    fn test_error_with_context() {
        let err = BinError::config("inner error").with_context("outer context");
        assert_eq!(err.to_string(), "outer context: Configuration error: inner error");
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(BinError::config("test").exit_code(), 1);
        assert_eq!(BinError::runtime("test").exit_code(), 3);
        assert_eq!(BinError::not_found("test").exit_code(), 5);

        let missing: BinError = MirrorError::from(CacheError::not_found("/tmp/x.json")).into();
        assert_eq!(missing.exit_code(), 5);

        let invalid: BinError =
            MirrorError::from(ConfigurationError::invalid_value("endpoint", "bad")).into();
        assert_eq!(invalid.exit_code(), 1);

        let busy: BinError = MirrorError::from(CacheError::Busy).into();
        assert_eq!(busy.exit_code(), 6);
    }

    #[test]
    fn test_from_anyhow() {
        let err: BinError = anyhow::anyhow!("boom").context("demo").into();
        assert_eq!(err.to_string(), "Runtime error: demo: boom");
    }
}
