//! Transport layer for communicating with smart cards
//!
//! This module defines the low-level transport interface used to send
//! raw APDU bytes to a card and receive raw response bytes back.

use crate::error::Error;

/// Core transport trait for APDU communication
///
/// Implementations carry one frame to the card and return the raw
/// response bytes (payload followed by SW1 SW2). Chaining and
/// GET RESPONSE handling live a layer above, in the processors.
pub trait CardTransport: Send + Sync {
    /// Transmit a raw command to the card and return the response
    ///
    /// This wraps [`Self::do_transmit_raw`] with trace logging of both
    /// directions of the exchange.
    fn transmit_raw(&mut self, command: &[u8]) -> Result<Vec<u8>, Error> {
        tracing::trace!(command = hex::encode(command), "Sending APDU command");
        let response = self.do_transmit_raw(command)?;
        tracing::trace!(response = hex::encode(&response), "Received APDU response");
        Ok(response)
    }

    /// Implementation of raw APDU transmission
    fn do_transmit_raw(&mut self, command: &[u8]) -> Result<Vec<u8>, Error>;

    /// Check if the transport is still connected to the card
    fn is_connected(&self) -> bool;

    /// Reset the transport connection
    fn reset(&mut self) -> Result<(), Error>;
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use std::collections::VecDeque;

    /// Mock transport that replays a scripted queue of responses
    #[derive(Debug, Default)]
    pub struct MockTransport {
        /// Responses handed out in order, raw bytes including SW
        pub responses: VecDeque<Vec<u8>>,
        /// Commands captured as they are transmitted
        pub commands: Vec<Vec<u8>>,
        pub connected: bool,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self {
                responses: VecDeque::new(),
                commands: Vec::new(),
                connected: true,
            }
        }

        pub fn with_responses<I>(responses: I) -> Self
        where
            I: IntoIterator<Item = Vec<u8>>,
        {
            Self {
                responses: responses.into_iter().collect(),
                commands: Vec::new(),
                connected: true,
            }
        }

        pub fn queue_response(&mut self, response: Vec<u8>) {
            self.responses.push_back(response);
        }
    }

    impl CardTransport for MockTransport {
        fn do_transmit_raw(&mut self, command: &[u8]) -> Result<Vec<u8>, Error> {
            self.commands.push(command.to_vec());
            self.responses.pop_front().ok_or(Error::Transmission)
        }

        fn is_connected(&self) -> bool {
            self.connected
        }

        fn reset(&mut self) -> Result<(), Error> {
            Ok(())
        }
    }
}
