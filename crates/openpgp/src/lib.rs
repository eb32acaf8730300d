//! Host-side driver for the OpenPGP card application
//!
//! This crate orchestrates APDU exchanges with an OpenPGP-card-compliant
//! secure element: it reads and writes the card's Data Objects, decodes
//! the nested TLV attribute blocks into a typed card state, computes
//! RFC 4880 key fingerprints for generated RSA keys, and can snapshot
//! the full card configuration to a versioned backup file and replay it
//! back onto a card.
//!
//! The crate performs no cryptography itself beyond the non-secret
//! fingerprint hash; key generation, signing and decryption happen on
//! the card.
#![forbid(unsafe_code)]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

pub mod backup;
pub mod card;
pub mod constants;
pub mod data_object;
pub mod error;
pub mod fingerprint;
pub mod report;
pub mod state;
pub mod tlv;
mod util;

pub use card::{OpenPgpCard, PublicKey};
pub use constants::{KeyOperation, KeyTemplate, Password, PubkeyAlgorithm, Salutation};
pub use data_object::{Access, DataObject};
pub use error::{Error, Result};
pub use state::{CardState, KeyInfo, KeyRole, Uif};
pub use tlv::TlvMap;
