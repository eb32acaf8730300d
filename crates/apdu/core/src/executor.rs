//! Command execution pipeline
//!
//! The executor owns a transport and a stack of command processors and
//! is the single entry point applications use to talk to a card.

use crate::command::Command;
use crate::error::Error;
use crate::processor::{ChainingProcessor, CommandProcessor};
use crate::response::Response;
use crate::transport::CardTransport;

/// Core trait for command execution
pub trait Executor: Send + Sync {
    /// Execute a command and return the reassembled response
    ///
    /// The response status is returned as-is; callers that only accept
    /// success should use [`Executor::execute_success`].
    fn execute(&mut self, command: &Command) -> Result<Response, Error>;

    /// Execute a command and fail unless the card answered `90 00`
    fn execute_success(&mut self, command: &Command) -> Result<Response, Error> {
        let response = self.execute(command)?;
        if response.is_success() {
            Ok(response)
        } else {
            Err(Error::Status {
                status: response.status(),
            })
        }
    }

    /// Reset the underlying connection
    fn reset(&mut self) -> Result<(), Error>;
}

/// Card executor combining a transport with command processors
#[derive(Debug)]
pub struct CardExecutor<T: CardTransport> {
    /// The transport used for communication
    transport: T,
    /// Command processors applied in order until one handles the command
    processors: Vec<Box<dyn CommandProcessor>>,
}

impl<T: CardTransport> CardExecutor<T> {
    /// Create a new executor with no processors installed
    ///
    /// Commands go to the transport untouched. Most callers want
    /// [`Self::new_with_defaults`] instead.
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            processors: Vec::new(),
        }
    }

    /// Create a new executor with the default processor stack
    pub fn new_with_defaults(transport: T) -> Self {
        Self {
            transport,
            processors: vec![Box::new(ChainingProcessor::default())],
        }
    }

    /// Get a reference to the transport
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Get a mutable reference to the transport
    pub const fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Add a command processor to the pipeline
    pub fn add_processor(&mut self, processor: Box<dyn CommandProcessor>) {
        self.processors.push(processor);
    }
}

impl<T: CardTransport> Executor for CardExecutor<T> {
    fn execute(&mut self, command: &Command) -> Result<Response, Error> {
        if let Some(processor) = self.processors.first() {
            return processor.process_command(command, &mut self.transport);
        }
        let raw = self.transport.transmit_raw(&command.to_bytes())?;
        Response::from_bytes(&raw)
    }

    fn reset(&mut self) -> Result<(), Error> {
        self.transport.reset()
    }
}
