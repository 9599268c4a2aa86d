//! Error types for the portkill-core library.

use thiserror::Error;

/// Result type alias for portkill operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during port scanning and process termination.
#[derive(Error, Debug)]
pub enum Error {
    /// Caller supplied a bad port or PID.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Insufficient privilege to inspect or signal a process.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// The process vanished before the action could be applied.
    #[error("Process {0} not found")]
    NotFound(u32),

    /// No backend exists for the host OS.
    #[error("Platform not supported: {0}")]
    UnsupportedPlatform(String),

    /// Every PID in a kill batch failed.
    #[error("Failed to kill any process: {0}")]
    TotalFailure(String),

    /// The OS process-info API failed for a reason other than a missing process.
    #[error("Process lookup failed: {0}")]
    LookupError(String),

    /// Failed to execute a system command.
    #[error("Command execution failed: {0}")]
    CommandFailed(String),

    /// Failed to parse command output or a kernel table.
    #[error("Failed to parse output: {0}")]
    ParseError(String),

    /// The caller abandoned the operation.
    #[error("Operation cancelled")]
    Cancelled,

    /// A newer scan of the same port started while this one was in flight.
    #[error("Scan of port {0} was superseded by a newer scan")]
    Superseded(u16),

    /// A kill on this port is still running.
    #[error("A kill on port {0} is in progress")]
    KillInProgress(u16),

    /// A kill referenced a scan that is no longer current.
    #[error("Stale scan: {0}")]
    StaleScan(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Whether this error means the target process no longer exists.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}
