//! Error types for solo-postgres.

use thiserror::Error;

/// Result type for solo-postgres operations.
pub type Result<T> = core::result::Result<T, Error>;

/// PostgreSQL error/notice field types.
#[derive(Debug, Clone, Default)]
pub struct ErrorFields {
    /// Severity: ERROR, FATAL, PANIC, WARNING, NOTICE, DEBUG, INFO, LOG
    pub severity: Option<String>,
    /// SQLSTATE error code (5 characters)
    pub code: Option<String>,
    /// Primary error message
    pub message: Option<String>,
    /// Detailed error explanation
    pub detail: Option<String>,
    /// Suggestion for fixing the error
    pub hint: Option<String>,
    /// Cursor position in query string (1-based)
    pub position: Option<u32>,
    /// Context/stack trace
    pub where_: Option<String>,
    /// Source file name
    pub file: Option<String>,
    /// Source line number
    pub line: Option<u32>,
    /// Source routine name
    pub routine: Option<String>,
}

impl ErrorFields {
    /// Returns true if the server reported this error as FATAL or PANIC.
    pub fn is_fatal(&self) -> bool {
        matches!(self.severity.as_deref(), Some("FATAL") | Some("PANIC"))
    }
}

impl std::fmt::Display for ErrorFields {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(severity) = &self.severity {
            write!(f, "{}: ", severity)?;
        }
        if let Some(message) = &self.message {
            write!(f, "{}", message)?;
        }
        if let Some(code) = &self.code {
            write!(f, " (SQLSTATE {})", code)?;
        }
        if let Some(detail) = &self.detail {
            write!(f, "\nDETAIL: {}", detail)?;
        }
        if let Some(hint) = &self.hint {
            write!(f, "\nHINT: {}", hint)?;
        }
        Ok(())
    }
}

/// Error type for solo-postgres.
#[derive(Debug, Error)]
pub enum Error {
    /// Server error response
    #[error("PostgreSQL error: {0}")]
    Server(ErrorFields),

    /// Protocol error (corrupt framing, unexpected response, etc.)
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Recoverable decode error. The frame boundary is still trustworthy,
    /// so the frame is skipped and the connection continues.
    #[error("Decode error: {0}")]
    Decode(String),

    /// A wire field requested more bytes than the frame has left.
    /// Indicates desynchronization and is fatal to the connection.
    #[error("Frame underflow: needed {needed} bytes, {available} available")]
    Underflow {
        /// Bytes the read required
        needed: usize,
        /// Bytes remaining in the frame
        available: usize,
    },

    /// I/O error reported by the transport
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Server requested an authentication method this client cannot answer
    #[error("Unsupported authentication method: {0}")]
    UnsupportedAuth(String),

    /// Synchronous API misuse (wrong argument count, etc.)
    #[error("Argument error: {0}")]
    Argument(String),

    /// Connection is broken and cannot be reused
    #[error("Connection is broken")]
    ConnectionBroken,

    /// Invalid usage (e.g., malformed connection URL)
    #[error("Invalid usage: {0}")]
    InvalidUsage(String),

    /// Unsupported feature
    #[error("Unsupported: {0}")]
    Unsupported(String),
}

impl Error {
    /// Returns true if the error indicates the connection is broken and cannot be reused.
    pub fn is_connection_broken(&self) -> bool {
        match self {
            Error::Io(_) | Error::ConnectionBroken | Error::Underflow { .. } => true,
            Error::Server(fields) => fields.is_fatal(),
            _ => false,
        }
    }

    /// Returns true for recoverable decode anomalies that only skip a frame.
    pub fn is_recoverable_decode(&self) -> bool {
        matches!(self, Error::Decode(_))
    }

    /// Get the SQLSTATE code if this is a server error.
    pub fn sqlstate(&self) -> Option<&str> {
        match self {
            Error::Server(fields) => fields.code.as_deref(),
            _ => None,
        }
    }
}
