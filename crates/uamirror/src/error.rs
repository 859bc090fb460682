// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Error types for the mirroring client.
//!
//! Errors are grouped by the component that raises them. Every variant can
//! report a severity, a structured error code and whether the caller may
//! simply try again later.
//!
//! # Error Categories
//!
//! ```text
//! MirrorError
//! ├── Connection    - Transport and session failures
//! ├── Cache         - Cache file persistence and gating
//! ├── Browse        - Address-space traversal failures
//! ├── Monitor       - Registration and subscription failures
//! ├── Coercion      - No wire conversion for a value
//! ├── Write         - Rejected or disallowed writes
//! └── Configuration - Invalid settings
//! ```
//!
//! # Examples
//!
//! ```
//! use uamirror::error::{MirrorError, BrowseError};
//!
//! let error = MirrorError::from(BrowseError::Busy);
//! assert!(error.is_busy());
//! assert_eq!(error.error_code().to_string(), "MR-0301");
//! ```

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;
use tracing::Level;

/// Result alias used throughout the crate.
pub type MirrorResult<T> = Result<T, MirrorError>;

// =============================================================================
// MirrorError - Main Error Type
// =============================================================================

/// The main error type of the crate.
#[derive(Debug, Error)]
pub enum MirrorError {
    /// Transport and session errors.
    #[error("{0}")]
    Connection(#[from] ConnectionError),

    /// Cache file errors.
    #[error("{0}")]
    Cache(#[from] CacheError),

    /// Address-space traversal errors.
    #[error("{0}")]
    Browse(#[from] BrowseError),

    /// Monitoring errors.
    #[error("{0}")]
    Monitor(#[from] MonitorError),

    /// Value coercion errors.
    #[error("{0}")]
    Coercion(#[from] CoercionError),

    /// Write errors.
    #[error("{0}")]
    Write(#[from] WriteError),

    /// Configuration errors.
    #[error("{0}")]
    Configuration(#[from] ConfigurationError),
}

impl MirrorError {
    // =========================================================================
    // Convenience Factory Methods
    // =========================================================================

    /// Creates a not connected error.
    pub fn not_connected() -> Self {
        Self::Connection(ConnectionError::NotConnected)
    }

    /// Creates a read failure for a node.
    pub fn read_failed(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Browse(BrowseError::read_failed(node_id, message))
    }

    /// Creates a browse failure for a node.
    pub fn browse_failed(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Browse(BrowseError::browse_failed(node_id, message))
    }

    /// Creates an unsupported type error.
    pub fn unsupported_type(node_id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self::Coercion(CoercionError::unsupported_type(node_id, kind))
    }

    // =========================================================================
    // Error Properties
    // =========================================================================

    /// Returns `true` if the operation was rejected because another one is running.
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            Self::Browse(BrowseError::Busy) | Self::Cache(CacheError::Busy)
        )
    }

    /// Returns `true` if the error reports a missing file or unknown item.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::Cache(CacheError::NotFound { .. }) | Self::Write(WriteError::NotMonitored { .. })
        )
    }

    /// Returns `true` if retrying the same call later may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection(e) => e.is_retryable(),
            Self::Cache(e) => e.is_retryable(),
            Self::Browse(e) => e.is_retryable(),
            Self::Monitor(e) => e.is_retryable(),
            Self::Write(e) => e.is_retryable(),
            Self::Coercion(_) | Self::Configuration(_) => false,
        }
    }

    /// Returns the severity level of this error.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Connection(e) => e.severity(),
            Self::Cache(e) => e.severity(),
            Self::Browse(e) => e.severity(),
            Self::Monitor(e) => e.severity(),
            Self::Coercion(_) => ErrorSeverity::Error,
            Self::Write(e) => e.severity(),
            Self::Configuration(_) => ErrorSeverity::Critical,
        }
    }

    /// Returns the error category for logging.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Connection(_) => "connection",
            Self::Cache(_) => "cache",
            Self::Browse(_) => "browse",
            Self::Monitor(_) => "monitor",
            Self::Coercion(_) => "coercion",
            Self::Write(_) => "write",
            Self::Configuration(_) => "configuration",
        }
    }

    /// Returns a unique error code for this error.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Connection(e) => e.error_code(),
            Self::Cache(e) => e.error_code(),
            Self::Browse(e) => e.error_code(),
            Self::Monitor(e) => e.error_code(),
            Self::Coercion(e) => e.error_code(),
            Self::Write(e) => e.error_code(),
            Self::Configuration(e) => e.error_code(),
        }
    }

    /// Returns the tracing level for this error.
    pub fn tracing_level(&self) -> Level {
        self.severity().to_tracing_level()
    }

    /// Logs this error with appropriate level and context.
    pub fn log(&self, context: &str) {
        let code = self.error_code();

        match self.tracing_level() {
            Level::ERROR => tracing::error!(
                error_code = %code,
                category = self.category(),
                context = context,
                retryable = self.is_retryable(),
                "{self}"
            ),
            Level::WARN => tracing::warn!(
                error_code = %code,
                category = self.category(),
                context = context,
                retryable = self.is_retryable(),
                "{self}"
            ),
            _ => tracing::info!(
                error_code = %code,
                category = self.category(),
                context = context,
                retryable = self.is_retryable(),
                "{self}"
            ),
        }
    }
}

// =============================================================================
// ConnectionError
// =============================================================================

/// Transport and session errors.
///
/// Reconnection is the transport's business; these are surfaced through
/// lifecycle events and never retried by the client itself.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// Connection refused.
    #[error("Connection refused to '{endpoint}'")]
    Refused {
        /// Target endpoint.
        endpoint: String,
    },

    /// Invalid endpoint URL.
    #[error("Invalid endpoint URL: '{url}' - {reason}")]
    InvalidEndpoint {
        /// The invalid URL.
        url: String,
        /// Reason.
        reason: String,
    },

    /// Session could not be created.
    #[error("Failed to create session: {message}")]
    SessionFailed {
        /// Error message.
        message: String,
    },

    /// Connection closed by the transport.
    #[error("Connection closed{}", .reason.as_ref().map(|r| format!(": {r}")).unwrap_or_default())]
    Closed {
        /// Reason for closure.
        reason: Option<String>,
    },

    /// No session is open.
    #[error("Not connected to server")]
    NotConnected,
}

impl ConnectionError {
    /// Creates a connection refused error.
    pub fn refused(endpoint: impl Into<String>) -> Self {
        Self::Refused {
            endpoint: endpoint.into(),
        }
    }

    /// Creates an invalid endpoint error.
    pub fn invalid_endpoint(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidEndpoint {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Creates a session failure.
    pub fn session_failed(message: impl Into<String>) -> Self {
        Self::SessionFailed {
            message: message.into(),
        }
    }

    /// Creates a connection closed error.
    pub fn closed(reason: Option<String>) -> Self {
        Self::Closed { reason }
    }

    /// Returns `true` if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::InvalidEndpoint { .. })
    }

    /// Returns the severity level.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::NotConnected | Self::Closed { .. } => ErrorSeverity::Warning,
            _ => ErrorSeverity::Error,
        }
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Refused { .. } => ErrorCode::new(1, 1),
            Self::InvalidEndpoint { .. } => ErrorCode::new(1, 2),
            Self::SessionFailed { .. } => ErrorCode::new(1, 3),
            Self::Closed { .. } => ErrorCode::new(1, 4),
            Self::NotConnected => ErrorCode::new(1, 5),
        }
    }
}

// =============================================================================
// CacheError
// =============================================================================

/// Errors raised by the address-space cache.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Cache file does not exist.
    #[error("Cache file not found: {}", .path.display())]
    NotFound {
        /// Expected file location.
        path: PathBuf,
    },

    /// Cache file content is malformed.
    #[error("Malformed cache file {}: {message}", .path.display())]
    Parse {
        /// File location.
        path: PathBuf,
        /// Parser message.
        message: String,
    },

    /// A browse is mutating the cache.
    #[error("Cache is busy: a browse is in progress")]
    Busy,

    /// Filesystem failure.
    #[error("Cache I/O error on {}: {source}", .path.display())]
    Io {
        /// File or directory involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// Serialization failure.
    #[error("Failed to serialize cache: {message}")]
    Serialize {
        /// Serializer message.
        message: String,
    },
}

impl CacheError {
    /// Creates a not found error.
    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        Self::NotFound { path: path.into() }
    }

    /// Creates a parse error.
    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates an I/O error.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns `true` if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Busy | Self::Io { .. })
    }

    /// Returns the severity level.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::NotFound { .. } | Self::Busy => ErrorSeverity::Warning,
            _ => ErrorSeverity::Error,
        }
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::NotFound { .. } => ErrorCode::new(2, 1),
            Self::Parse { .. } => ErrorCode::new(2, 2),
            Self::Busy => ErrorCode::new(2, 3),
            Self::Io { .. } => ErrorCode::new(2, 4),
            Self::Serialize { .. } => ErrorCode::new(2, 5),
        }
    }
}

// =============================================================================
// BrowseError
// =============================================================================

/// Address-space traversal errors.
#[derive(Debug, Error)]
pub enum BrowseError {
    /// Another browse is running.
    #[error("Browse already in progress")]
    Busy,

    /// Reading a visited node failed.
    #[error("Read failed for node '{node_id}': {message}")]
    ReadFailed {
        /// Node being read.
        node_id: String,
        /// Error message.
        message: String,
    },

    /// Listing the references of a node failed.
    #[error("Browse failed for node '{node_id}': {message}")]
    BrowseFailed {
        /// Node being browsed.
        node_id: String,
        /// Error message.
        message: String,
    },
}

impl BrowseError {
    /// Creates a read failure.
    pub fn read_failed(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ReadFailed {
            node_id: node_id.into(),
            message: message.into(),
        }
    }

    /// Creates a browse failure.
    pub fn browse_failed(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BrowseFailed {
            node_id: node_id.into(),
            message: message.into(),
        }
    }

    /// Returns `true` if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        true
    }

    /// Returns the severity level.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Busy => ErrorSeverity::Warning,
            _ => ErrorSeverity::Error,
        }
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Busy => ErrorCode::new(3, 1),
            Self::ReadFailed { .. } => ErrorCode::new(3, 2),
            Self::BrowseFailed { .. } => ErrorCode::new(3, 3),
        }
    }
}

// =============================================================================
// MonitorError
// =============================================================================

/// Registration and subscription errors.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// Monitoring was started with an empty registration set.
    #[error("nothing to monitor")]
    NothingToMonitor,

    /// A subscription is already live.
    #[error("Monitoring already started (subscription {subscription_id})")]
    AlreadyStarted {
        /// Live subscription handle.
        subscription_id: u32,
    },

    /// The node is already registered.
    #[error("Node '{node_id}' is already registered for monitoring")]
    DuplicateRegistration {
        /// Duplicate node.
        node_id: String,
    },

    /// Subscription or monitored item creation failed.
    #[error("Failed to create subscription: {message}")]
    CreationFailed {
        /// Error message.
        message: String,
    },

}

impl MonitorError {
    /// Creates a duplicate registration report.
    pub fn duplicate(node_id: impl Into<String>) -> Self {
        Self::DuplicateRegistration {
            node_id: node_id.into(),
        }
    }

    /// Creates a creation failure.
    pub fn creation_failed(message: impl Into<String>) -> Self {
        Self::CreationFailed {
            message: message.into(),
        }
    }

    /// Returns `true` if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::CreationFailed { .. })
    }

    /// Returns the severity level.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::DuplicateRegistration { .. } => ErrorSeverity::Info,
            Self::NothingToMonitor => ErrorSeverity::Warning,
            _ => ErrorSeverity::Error,
        }
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::NothingToMonitor => ErrorCode::new(4, 1),
            Self::AlreadyStarted { .. } => ErrorCode::new(4, 2),
            Self::DuplicateRegistration { .. } => ErrorCode::new(4, 3),
            Self::CreationFailed { .. } => ErrorCode::new(4, 4),
        }
    }
}

// =============================================================================
// CoercionError
// =============================================================================

/// Errors raised while building a wire value for a write.
#[derive(Debug, Error)]
pub enum CoercionError {
    /// No coercion rule for the value kind.
    #[error("Unsupported type for node '{node_id}': {kind}")]
    UnsupportedType {
        /// Target node.
        node_id: String,
        /// Description of the value kind.
        kind: String,
    },

    /// The proposed value cannot be parsed into the wire type.
    #[error("Cannot convert '{input}' to {expected}")]
    InvalidValue {
        /// Expected wire type.
        expected: String,
        /// Proposed input.
        input: String,
    },

    /// The structured record could not be constructed.
    #[error("Failed to construct record of type '{type_id}': {message}")]
    RecordConstruction {
        /// Declared structure type.
        type_id: String,
        /// Error message.
        message: String,
    },
}

impl CoercionError {
    /// Creates an unsupported type error.
    pub fn unsupported_type(node_id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self::UnsupportedType {
            node_id: node_id.into(),
            kind: kind.into(),
        }
    }

    /// Creates an invalid value error.
    pub fn invalid_value(expected: impl Into<String>, input: impl Into<String>) -> Self {
        Self::InvalidValue {
            expected: expected.into(),
            input: input.into(),
        }
    }

    /// Creates a record construction error.
    pub fn record_construction(type_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RecordConstruction {
            type_id: type_id.into(),
            message: message.into(),
        }
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::UnsupportedType { .. } => ErrorCode::new(5, 1),
            Self::InvalidValue { .. } => ErrorCode::new(5, 2),
            Self::RecordConstruction { .. } => ErrorCode::new(5, 3),
        }
    }
}

// =============================================================================
// WriteError
// =============================================================================

/// Write errors.
#[derive(Debug, Error)]
pub enum WriteError {
    /// Writes are only allowed against monitored items.
    #[error("Node '{node_id}' is not monitored")]
    NotMonitored {
        /// Target node.
        node_id: String,
    },

    /// The server answered with a bad status.
    #[error("Write rejected for node '{node_id}': status 0x{status:08X}")]
    Rejected {
        /// Target node.
        node_id: String,
        /// Returned status code.
        status: u32,
    },
}

impl WriteError {
    /// Creates a not monitored error.
    pub fn not_monitored(node_id: impl Into<String>) -> Self {
        Self::NotMonitored {
            node_id: node_id.into(),
        }
    }

    /// Creates a rejected write error.
    pub fn rejected(node_id: impl Into<String>, status: u32) -> Self {
        Self::Rejected {
            node_id: node_id.into(),
            status,
        }
    }

    /// Returns `true` if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }

    /// Returns the severity level.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::NotMonitored { .. } => ErrorSeverity::Warning,
            Self::Rejected { .. } => ErrorSeverity::Error,
        }
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::NotMonitored { .. } => ErrorCode::new(6, 1),
            Self::Rejected { .. } => ErrorCode::new(6, 2),
        }
    }
}

// =============================================================================
// ConfigurationError
// =============================================================================

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// A field holds an invalid value.
    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue {
        /// Field name.
        field: String,
        /// Reason.
        reason: String,
    },

    /// A node identifier could not be parsed.
    #[error("Invalid node ID format: '{value}' - {reason}")]
    InvalidNodeId {
        /// Offending text.
        value: String,
        /// Reason.
        reason: String,
    },

    /// Configuration file does not exist.
    #[error("Configuration file not found: {}", .path.display())]
    FileNotFound {
        /// Expected location.
        path: PathBuf,
    },

    /// Configuration content is malformed.
    #[error("Failed to parse configuration: {message}")]
    Parse {
        /// Parser message.
        message: String,
    },

    /// File extension is not a known format.
    #[error("Unsupported configuration format: {extension}")]
    UnsupportedFormat {
        /// File extension.
        extension: String,
    },

    /// Configuration file could not be read.
    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        /// File location.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
}

impl ConfigurationError {
    /// Creates an invalid value error.
    pub fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Creates an invalid node ID error.
    pub fn invalid_node_id(value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidNodeId {
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Creates a parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::InvalidValue { .. } => ErrorCode::new(7, 1),
            Self::InvalidNodeId { .. } => ErrorCode::new(7, 2),
            Self::FileNotFound { .. } => ErrorCode::new(7, 3),
            Self::Parse { .. } => ErrorCode::new(7, 4),
            Self::UnsupportedFormat { .. } => ErrorCode::new(7, 5),
            Self::Io { .. } => ErrorCode::new(7, 6),
        }
    }
}

// =============================================================================
// ErrorSeverity
// =============================================================================

/// Severity of an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Informational - no action required.
    Info,
    /// Warning - caller may retry or ignore.
    Warning,
    /// Error - the operation failed.
    Error,
    /// Critical - the client cannot work as configured.
    Critical,
}

impl ErrorSeverity {
    /// Converts to tracing level.
    pub fn to_tracing_level(self) -> Level {
        match self {
            Self::Info => Level::INFO,
            Self::Warning => Level::WARN,
            Self::Error | Self::Critical => Level::ERROR,
        }
    }

    /// Returns the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// ErrorCode
// =============================================================================

/// Structured error code.
///
/// Format: `MR-XXYY` where XX is the category and YY the specific error.
///
/// Categories:
/// - 1: Connection
/// - 2: Cache
/// - 3: Browse
/// - 4: Monitor
/// - 5: Coercion
/// - 6: Write
/// - 7: Configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorCode {
    /// Category (1-7).
    pub category: u8,
    /// Specific error within category.
    pub code: u8,
}

impl ErrorCode {
    /// Creates a new error code.
    pub const fn new(category: u8, code: u8) -> Self {
        Self { category, code }
    }

    /// Returns the full error code as a u16.
    pub fn as_u16(&self) -> u16 {
        ((self.category as u16) << 8) | (self.code as u16)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MR-{:02X}{:02X}", self.category, self.code)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_busy_errors() {
        assert!(MirrorError::from(BrowseError::Busy).is_busy());
        assert!(MirrorError::from(CacheError::Busy).is_busy());
        assert!(!MirrorError::not_connected().is_busy());
    }

    #[test]
    fn test_not_found_errors() {
        assert!(MirrorError::from(CacheError::not_found("/tmp/none.json")).is_not_found());
        assert!(MirrorError::from(WriteError::not_monitored("ns=2;s=A")).is_not_found());
        assert!(!MirrorError::from(CacheError::parse("/tmp/x.json", "eof")).is_not_found());
    }

    #[test]
    fn test_nothing_to_monitor_message() {
        let error = MirrorError::from(MonitorError::NothingToMonitor);
        assert_eq!(error.to_string(), "nothing to monitor");
        assert_eq!(error.severity(), ErrorSeverity::Warning);
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(ErrorCode::new(3, 1).to_string(), "MR-0301");
        assert_eq!(ErrorCode::new(2, 10).as_u16(), 0x020A);
        assert_eq!(
            MirrorError::unsupported_type("ns=2;s=A", "array").error_code(),
            ErrorCode::new(5, 1)
        );
    }

    #[test]
    fn test_retryable() {
        assert!(MirrorError::from(BrowseError::Busy).is_retryable());
        assert!(!MirrorError::unsupported_type("ns=2;s=A", "array").is_retryable());
        assert!(!MirrorError::from(ConnectionError::invalid_endpoint("tcp://x", "scheme"))
            .is_retryable());
    }

    #[test]
    fn test_write_rejected_display() {
        let error = WriteError::rejected("ns=2;s=Pump", 0x8073_0000);
        assert!(error.to_string().contains("0x80730000"));
    }

    #[test]
    fn test_severity_levels() {
        assert_eq!(ErrorSeverity::Warning.to_tracing_level(), Level::WARN);
        assert_eq!(ErrorSeverity::Critical.to_tracing_level(), Level::ERROR);
        assert_eq!(
            MirrorError::from(MonitorError::duplicate("ns=2;s=A")).severity(),
            ErrorSeverity::Info
        );
    }
}
