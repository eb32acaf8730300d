//! Core error type for all APDU operations
//!
//! All error variants are consolidated here so that every layer of the
//! crate propagates the same type up the call stack.

use crate::response::status::StatusWord;

/// Result type with the crate-wide [`Error`]
pub type Result<T> = core::result::Result<T, Error>;

/// Core error type that encompasses all possible errors in the crate
#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    //
    // Transport related errors
    //
    /// Failed to connect to the device
    #[error("Connection error: failed to connect to device")]
    Connection,

    /// Failed to transmit data
    #[error("Transmission error: failed to transmit data")]
    Transmission,

    /// Device level error with message
    #[error("Device error: {0}")]
    Device(String),

    //
    // Response related errors
    //
    /// Parse error when processing a response
    #[error("Parse error: {0}")]
    Parse(&'static str),

    /// Non-success status word from the card
    #[error("Status error {status} ({})", status.description())]
    Status {
        /// Status word that caused the error
        status: StatusWord,
    },

    //
    // Command related errors
    //
    /// Invalid command length
    #[error("Invalid command length: {0}")]
    InvalidCommandLength(usize),

    //
    // Processor related errors
    //
    /// Response chain limit exceeded
    #[error("Chain limit exceeded")]
    ChainLimitExceeded,

    //
    // General errors
    //
    /// Generic dynamic error with string message
    #[error("{0}")]
    Message(String),
}

impl Error {
    /// Create a new status error
    pub const fn status(sw1: u8, sw2: u8) -> Self {
        Self::Status {
            status: StatusWord::new(sw1, sw2),
        }
    }

    /// Create a new error with a dynamic message
    pub fn message<S: Into<String>>(message: S) -> Self {
        Self::Message(message.into())
    }

    /// The status word carried by this error, if any
    pub const fn status_word(&self) -> Option<StatusWord> {
        match self {
            Self::Status { status } => Some(*status),
            _ => None,
        }
    }
}

impl From<StatusWord> for Error {
    fn from(status: StatusWord) -> Self {
        Self::Status { status }
    }
}
