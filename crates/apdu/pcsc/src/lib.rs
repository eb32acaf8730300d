//! PC/SC transport for APDU operations
//!
//! This crate connects the APDU core types to physical smart card
//! readers through the platform PC/SC service.
//!
//! ```no_run
//! use pgpcard_apdu_transport_pcsc::PcscDeviceManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = PcscDeviceManager::new()?;
//! for reader in manager.list_readers()? {
//!     println!("{} (card present: {})", reader.name(), reader.has_card());
//! }
//! # Ok(())
//! # }
//! ```
#![forbid(unsafe_code)]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

mod config;
mod error;
mod manager;
mod reader;
mod transport;

pub use config::{PcscConfig, ShareMode};
pub use error::PcscError;
pub use manager::PcscDeviceManager;
pub use reader::PcscReader;
pub use transport::PcscTransport;
