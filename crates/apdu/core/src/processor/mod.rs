//! Command processors for APDU transformations
//!
//! Processors sit between the executor and the transport and take care
//! of the protocol-level transformations a single logical command may
//! need on the wire: splitting oversized payloads into a command chain
//! and draining multi-part responses with GET RESPONSE.

use bytes::BytesMut;
use tracing::{debug, trace};

use crate::command::{CLA_COMMAND_CHAINING, Command, INS_GET_RESPONSE};
use crate::error::Error;
use crate::response::Response;
use crate::transport::CardTransport;

/// Maximum data bytes carried by one short APDU frame
pub const MAX_CHUNK_SIZE: usize = 0xFE;

/// Trait for command processors that transform commands
pub trait CommandProcessor: Send + Sync + std::fmt::Debug {
    /// Process a command, possibly transforming it into several wire
    /// exchanges, and return the reassembled response
    fn process_command(
        &self,
        command: &Command,
        transport: &mut dyn CardTransport,
    ) -> Result<Response, Error>;
}

/// Processor implementing command chaining and GET RESPONSE handling
///
/// Commands whose data fits in one short APDU are sent as-is. Longer
/// payloads are split into chunks of at most [`MAX_CHUNK_SIZE`] bytes;
/// every chunk except the last is sent with the chaining bit set in the
/// class byte and must be acknowledged with `90 00` before the next one
/// goes out. After the final frame, `61 XX` statuses are drained with
/// GET RESPONSE and the payloads concatenated.
#[derive(Debug, Clone)]
pub struct ChainingProcessor {
    /// Upper bound on GET RESPONSE round trips for one command
    max_chains: usize,
}

impl ChainingProcessor {
    /// Create a processor with a custom GET RESPONSE round-trip limit
    pub const fn new(max_chains: usize) -> Self {
        Self { max_chains }
    }

    fn transmit(
        &self,
        command: &Command,
        transport: &mut dyn CardTransport,
    ) -> Result<Response, Error> {
        let raw = transport.transmit_raw(&command.to_bytes())?;
        Response::from_bytes(&raw)
    }
}

impl Default for ChainingProcessor {
    fn default() -> Self {
        Self::new(64)
    }
}

impl CommandProcessor for ChainingProcessor {
    fn process_command(
        &self,
        command: &Command,
        transport: &mut dyn CardTransport,
    ) -> Result<Response, Error> {
        let data = command.data.clone().unwrap_or_default();

        // Send all but the last chunk with the chaining bit set.
        let mut remaining = data;
        while remaining.len() > MAX_CHUNK_SIZE {
            let chunk = remaining.split_to(MAX_CHUNK_SIZE);
            let partial = Command::new_with_data(
                command.cla | CLA_COMMAND_CHAINING,
                command.ins,
                command.p1,
                command.p2,
                chunk,
            );
            trace!(remaining = remaining.len(), "Sending chained APDU frame");
            let response = self.transmit(&partial, transport)?;
            if !response.is_success() {
                debug!(status = %response.status(), "Chained frame rejected");
                return Ok(response);
            }
        }

        let mut last = Command::new(command.cla, command.ins, command.p1, command.p2);
        if !remaining.is_empty() || command.data.is_some() {
            last = last.with_data(remaining);
        }
        if let Some(le) = command.le {
            last = last.with_le(le);
        }
        let mut response = self.transmit(&last, transport)?;

        // Drain `61 XX` continuations.
        if !response.status().is_more_data_available() {
            return Ok(response);
        }
        let mut payload = BytesMut::from(response.payload().as_ref());
        let mut rounds = 0;
        while let Some(le) = response.status().remaining_bytes() {
            rounds += 1;
            if rounds > self.max_chains {
                return Err(Error::ChainLimitExceeded);
            }
            let get_response = Command::new_with_le(0x00, INS_GET_RESPONSE, 0x00, 0x00, le);
            response = self.transmit(&get_response, transport)?;
            payload.extend_from_slice(response.payload());
        }
        debug!(total = payload.len(), "Reassembled chained response");
        Ok(Response::new(payload.freeze(), response.status()))
    }
}
