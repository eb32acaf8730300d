//! Core types for APDU (Application Protocol Data Unit) operations
//!
//! This crate provides the foundational types for exchanging APDU commands
//! and responses with smart cards according to ISO/IEC 7816-4:
//!
//! - Creating and serializing APDU commands
//! - Parsing responses and interpreting status words
//! - Communicating through pluggable transport layers
//! - Command chaining for oversized payloads and GET RESPONSE draining
//!   for multi-part responses
#![forbid(unsafe_code)]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

// Re-export bytes for convenience
pub use bytes::{Bytes, BytesMut};

pub mod command;
pub mod error;
pub mod executor;
pub mod processor;
pub mod response;
pub mod transport;

pub use command::Command;
pub use error::{Error, Result};
pub use executor::{CardExecutor, Executor};
pub use processor::{ChainingProcessor, CommandProcessor};
pub use response::Response;
pub use response::status::StatusWord;
pub use transport::CardTransport;

/// Prelude module containing commonly used traits and types
pub mod prelude {
    pub use crate::{Bytes, BytesMut, Error, Result};

    pub use crate::command::Command;
    pub use crate::response::Response;
    pub use crate::response::status::{StatusWord, common as status};

    pub use crate::transport::CardTransport;

    pub use crate::processor::{ChainingProcessor, CommandProcessor};

    pub use crate::executor::{CardExecutor, Executor};
}
