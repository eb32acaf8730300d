//! APDU response definitions
//!
//! This module provides types for parsing APDU responses according to
//! ISO/IEC 7816-4.

pub mod status;

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::Error;
use status::StatusWord;

/// Basic APDU response structure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Response payload data (empty when the card returned only a status)
    payload: Bytes,
    /// Status word
    status: StatusWord,
}

impl Response {
    /// Create a new response with payload and status
    pub fn new(payload: Bytes, status: impl Into<StatusWord>) -> Self {
        Self {
            payload,
            status: status.into(),
        }
    }

    /// Create a success response
    pub const fn success(payload: Bytes) -> Self {
        Self {
            payload,
            status: StatusWord::new(0x90, 0x00),
        }
    }

    /// Parse a response from raw bytes (payload followed by SW1 SW2)
    pub fn from_bytes(data: &[u8]) -> Result<Self, Error> {
        if data.len() < 2 {
            return Err(Error::Parse("Response shorter than a status word"));
        }
        let (payload, sw) = data.split_at(data.len() - 2);
        Ok(Self {
            payload: Bytes::copy_from_slice(payload),
            status: StatusWord::new(sw[0], sw[1]),
        })
    }

    /// Get the response payload data
    pub const fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Get the status word
    pub const fn status(&self) -> StatusWord {
        self.status
    }

    /// Check if the response indicates success
    pub const fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Convert to a payload result, failing on a non-success status
    pub fn into_payload_result(self) -> Result<Bytes, Error> {
        if self.is_success() {
            Ok(self.payload)
        } else {
            Err(Error::Status {
                status: self.status,
            })
        }
    }
}

impl From<Response> for Bytes {
    fn from(response: Response) -> Self {
        let mut buf = BytesMut::with_capacity(response.payload.len() + 2);
        buf.put_slice(&response.payload);
        buf.put_u8(response.status.sw1);
        buf.put_u8(response.status.sw2);
        buf.freeze()
    }
}
