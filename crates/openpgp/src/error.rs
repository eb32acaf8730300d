//! Error type for OpenPGP card operations

use pgpcard_apdu_core::StatusWord;

/// Result type with the crate-wide [`Error`]
pub type Result<T> = core::result::Result<T, Error>;

/// Errors raised by OpenPGP card operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// APDU layer error (transport, status word, chaining)
    #[error(transparent)]
    Apdu(#[from] pgpcard_apdu_core::Error),

    /// Malformed TLV block
    #[error("TLV parse error: {0}")]
    Tlv(&'static str),

    /// Invalid input rejected before any card I/O
    #[error("{0}")]
    Usage(String),

    /// Backup file I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed or incompatible backup container
    #[error("Backup error: {0}")]
    Backup(String),

    /// Key creation date string that cannot be parsed back to a timestamp
    #[error("Invalid date: {0}")]
    Date(String),
}

impl Error {
    /// Create a usage error
    pub fn usage<S: Into<String>>(message: S) -> Self {
        Self::Usage(message.into())
    }

    /// Create a backup error
    pub fn backup<S: Into<String>>(message: S) -> Self {
        Self::Backup(message.into())
    }

    /// The card status word behind this error, if any
    pub const fn status_word(&self) -> Option<StatusWord> {
        match self {
            Self::Apdu(e) => e.status_word(),
            _ => None,
        }
    }
}

impl From<time::error::Parse> for Error {
    fn from(error: time::error::Parse) -> Self {
        Self::Date(error.to_string())
    }
}
