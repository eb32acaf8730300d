//! TCP transport for APDU exchange with emulated devices
//!
//! Device emulators such as Speculos expose the secure element over a
//! TCP socket with a simple length-prefixed framing: each APDU is sent
//! as a big-endian `u32` length followed by the raw bytes, and each
//! response comes back as a big-endian `u32` payload length followed by
//! the payload and the two status bytes.
#![forbid(unsafe_code)]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::time::Duration;

use pgpcard_apdu_core::{CardTransport, Error};
use tracing::debug;

/// Errors specific to the TCP transport
#[derive(Debug, thiserror::Error)]
pub enum TcpError {
    /// Socket I/O failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Peer announced a frame larger than we accept
    #[error("Oversized frame: {0} bytes")]
    OversizedFrame(u32),
}

impl From<TcpError> for Error {
    fn from(error: TcpError) -> Self {
        Self::Device(error.to_string())
    }
}

// Emulated cards return whole objects in one frame, so allow far more
// than a physical short APDU would.
const MAX_FRAME: u32 = 0x0001_0000;

/// Transport speaking the length-prefixed APDU framing over TCP
#[derive(Debug)]
pub struct TcpTransport {
    stream: Option<TcpStream>,
    address: SocketAddr,
}

impl TcpTransport {
    /// Connect to an emulator listening on the given address
    pub fn connect(address: SocketAddr) -> Result<Self, TcpError> {
        let stream = Self::open(address)?;
        Ok(Self {
            stream: Some(stream),
            address,
        })
    }

    fn open(address: SocketAddr) -> Result<TcpStream, TcpError> {
        let stream = TcpStream::connect_timeout(&address, Duration::from_secs(5))?;
        stream.set_nodelay(true)?;
        debug!(%address, "Connected to emulated device");
        Ok(stream)
    }

    fn exchange(&mut self, command: &[u8]) -> Result<Vec<u8>, TcpError> {
        let stream = match self.stream.take() {
            Some(stream) => self.stream.insert(stream),
            None => self.stream.insert(Self::open(self.address)?),
        };

        stream.write_all(&(command.len() as u32).to_be_bytes())?;
        stream.write_all(command)?;

        let mut length_bytes = [0u8; 4];
        stream.read_exact(&mut length_bytes)?;
        let length = u32::from_be_bytes(length_bytes);
        if length > MAX_FRAME {
            return Err(TcpError::OversizedFrame(length));
        }

        // Payload plus the trailing status word.
        let mut response = vec![0u8; length as usize + 2];
        stream.read_exact(&mut response)?;
        Ok(response)
    }
}

impl CardTransport for TcpTransport {
    fn do_transmit_raw(&mut self, command: &[u8]) -> Result<Vec<u8>, Error> {
        self.exchange(command).map_err(|e| {
            self.stream = None;
            e.into()
        })
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    fn reset(&mut self) -> Result<(), Error> {
        self.stream = None;
        self.stream = Some(Self::open(self.address).map_err(Error::from)?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn test_framing_round_trip() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap();

        let server = thread::spawn(move || {
            let (mut socket, _) = listener.accept().unwrap();

            let mut length_bytes = [0u8; 4];
            socket.read_exact(&mut length_bytes).unwrap();
            let length = u32::from_be_bytes(length_bytes) as usize;
            let mut command = vec![0u8; length];
            socket.read_exact(&mut command).unwrap();

            // Echo the command back as payload with a success status.
            socket.write_all(&(length as u32).to_be_bytes()).unwrap();
            socket.write_all(&command).unwrap();
            socket.write_all(&[0x90, 0x00]).unwrap();
            command
        });

        let mut transport = TcpTransport::connect(address).unwrap();
        let apdu = [0x00, 0xCA, 0x00, 0x4F, 0x00];
        let response = transport.do_transmit_raw(&apdu).unwrap();

        assert_eq!(server.join().unwrap(), apdu.to_vec());
        assert_eq!(&response[..5], &apdu);
        assert_eq!(&response[5..], &[0x90, 0x00]);
    }
}
