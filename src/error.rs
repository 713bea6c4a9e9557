//! Unified error types for Dockmaster

use std::io;
use thiserror::Error;

/// Main error type for Dockmaster operations
#[derive(Error, Debug)]
pub enum Error {
    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    // External command errors
    #[error("Command '{command}' failed: {message}")]
    CommandFailed { command: String, message: String },

    #[error("Command '{command}' produced invalid output: {message}")]
    CommandOutput { command: String, message: String },

    // Host lookup errors
    #[error("Group lookup failed: {0}")]
    GroupLookup(String),

    #[error("Kernel parameter '{parameter}' unreadable: {message}")]
    KernelParameter { parameter: String, message: String },

    // Report rendering errors
    #[error("Failed to serialize report: {0}")]
    ReportSerialize(#[from] serde_json::Error),
}

/// Result type alias for Dockmaster operations
pub type Result<T> = std::result::Result<T, Error>;
