//! In-memory snapshot of the card's readable attribute set

use std::fmt;
use std::str::FromStr;

use time::OffsetDateTime;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;

use crate::constants::Salutation;
use crate::error::{Error, Result};

/// Calendar rendering used for creation dates in reports and backups
pub const DATE_FORMAT: &[BorrowedFormatItem<'_>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

/// The three asymmetric key slots of a card profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyRole {
    /// Digital signature key (PSO:CDS)
    Signature,
    /// Confidentiality key (PSO:DEC)
    Decryption,
    /// Authentication key (INTERNAL AUTHENTICATE)
    Authentication,
}

impl KeyRole {
    /// All roles in the card's canonical sig/dec/aut order
    pub const ALL: [Self; 3] = [Self::Signature, Self::Decryption, Self::Authentication];

    /// Position within fingerprint and date lists
    pub const fn index(self) -> usize {
        match self {
            Self::Signature => 0,
            Self::Decryption => 1,
            Self::Authentication => 2,
        }
    }

    /// Short uppercase name used on the CLI
    pub const fn name(self) -> &'static str {
        match self {
            Self::Signature => "SIG",
            Self::Decryption => "DEC",
            Self::Authentication => "AUT",
        }
    }
}

impl FromStr for KeyRole {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "SIG" => Ok(Self::Signature),
            "DEC" => Ok(Self::Decryption),
            "AUT" => Ok(Self::Authentication),
            _ => Err(Error::usage(format!("Invalid key type {s}!"))),
        }
    }
}

impl fmt::Display for KeyRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// User interaction flag of a key slot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Uif {
    /// No user confirmation required
    #[default]
    Disabled,
    /// Confirmation required for each operation
    Enabled,
    /// Confirmation required and the flag can no longer be cleared
    PermanentlyEnabled,
}

impl Uif {
    /// Decode the first byte of the UIF data object
    pub const fn from_byte(byte: u8) -> Self {
        match byte {
            1 => Self::Enabled,
            2 => Self::PermanentlyEnabled,
            _ => Self::Disabled,
        }
    }

    /// Value written back to the card
    pub const fn as_byte(self) -> u8 {
        match self {
            Self::Disabled => 0,
            Self::Enabled => 1,
            Self::PermanentlyEnabled => 2,
        }
    }
}

/// Per-role key description
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyInfo {
    /// Algorithm attribute bytes (id + algorithm-specific parameters)
    pub attribute: Vec<u8>,
    /// RFC 4880 fingerprint, all-zero when not set
    pub fingerprint: Vec<u8>,
    /// CA fingerprint, all-zero when not set
    pub ca_fingerprint: Vec<u8>,
    /// Cardholder certificate (PEM-like text in practice)
    pub certificate: String,
    /// Key creation timestamp, seconds resolution
    pub creation_date: Option<OffsetDateTime>,
    /// User interaction flag
    pub uif: Uif,
    /// Opaque provider-specific key material blob
    pub key_material: Vec<u8>,
}

impl KeyInfo {
    /// Fingerprint as hex, `None` when absent or all-zero
    pub fn fingerprint_hex(&self) -> Option<String> {
        fingerprint_hex(&self.fingerprint)
    }

    /// CA fingerprint as hex, `None` when absent or all-zero
    pub fn ca_fingerprint_hex(&self) -> Option<String> {
        fingerprint_hex(&self.ca_fingerprint)
    }

    /// Creation date rendered as `YYYY-MM-DD HH:MM:SS`, empty when unset
    pub fn creation_date_string(&self) -> String {
        self.creation_date
            .and_then(|date| date.format(DATE_FORMAT).ok())
            .unwrap_or_default()
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

// All-zero is the sentinel for "not set", never a valid hash.
fn fingerprint_hex(fingerprint: &[u8]) -> Option<String> {
    if fingerprint.is_empty() || fingerprint.iter().all(|&b| b == 0) {
        None
    } else {
        Some(hex::encode(fingerprint))
    }
}

/// Parse a backup date string back to a timestamp
///
/// Malformed input is a loud error, never a silent default.
pub fn parse_date(value: &str) -> Result<OffsetDateTime> {
    let parsed = time::PrimitiveDateTime::parse(value, DATE_FORMAT)?;
    Ok(parsed.assume_utc())
}

/// Aggregate snapshot of every readable card attribute
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CardState {
    /// Application identifier as an uppercase hex string
    pub aid: String,
    /// Extended length information (0x7F66)
    pub ext_length: Vec<u8>,
    /// Extended capabilities flag list (0xC0)
    pub ext_capabilities: Vec<u8>,
    /// Historical bytes (0x5F52)
    pub historical_bytes: Vec<u8>,
    /// PW status block (0xC4)
    pub pw_status: Vec<u8>,
    /// Hardware feature bitmap (first byte of 0x7F74)
    pub hw_features: u8,

    /// Cardholder name
    pub name: String,
    /// Login data
    pub login: String,
    /// Public key URL
    pub url: String,
    /// Language preferences
    pub lang: String,
    /// Cardholder salutation
    pub salutation: Salutation,

    /// Default RSA public exponent
    pub rsa_pub_exp: u32,
    /// Digital signature counter
    pub digital_counter: u32,

    /// Signature key slot
    pub sig: KeyInfo,
    /// Decryption key slot
    pub dec: KeyInfo,
    /// Authentication key slot
    pub aut: KeyInfo,

    /// Private-use data objects 0x0101..0x0104
    pub privates: [Vec<u8>; 4],
}

impl CardState {
    /// Create an empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero every field back to the initial state
    pub fn reset(&mut self) {
        let Self {
            aid,
            ext_length,
            ext_capabilities,
            historical_bytes,
            pw_status,
            hw_features,
            name,
            login,
            url,
            lang,
            salutation,
            rsa_pub_exp,
            digital_counter,
            sig,
            dec,
            aut,
            privates,
        } = self;
        aid.clear();
        ext_length.clear();
        ext_capabilities.clear();
        historical_bytes.clear();
        pw_status.clear();
        *hw_features = 0;
        name.clear();
        login.clear();
        url.clear();
        lang.clear();
        *salutation = Salutation::Unspecified;
        *rsa_pub_exp = 0;
        *digital_counter = 0;
        sig.reset();
        dec.reset();
        aut.reset();
        for private in privates {
            private.clear();
        }
    }

    /// Key slot for a role
    pub const fn key(&self, role: KeyRole) -> &KeyInfo {
        match role {
            KeyRole::Signature => &self.sig,
            KeyRole::Decryption => &self.dec,
            KeyRole::Authentication => &self.aut,
        }
    }

    /// Mutable key slot for a role
    pub const fn key_mut(&mut self, role: KeyRole) -> &mut KeyInfo {
        match role {
            KeyRole::Signature => &mut self.sig,
            KeyRole::Decryption => &mut self.dec,
            KeyRole::Authentication => &mut self.aut,
        }
    }

    /// Serial number field of the AID (hex characters 20..28)
    pub fn serial(&self) -> Option<&str> {
        self.aid.get(20..28)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_zero_fingerprint_is_not_set() {
        let mut info = KeyInfo::default();
        assert_eq!(info.fingerprint_hex(), None);

        info.fingerprint = vec![0u8; 20];
        assert_eq!(info.fingerprint_hex(), None);

        info.fingerprint[19] = 1;
        assert_eq!(
            info.fingerprint_hex().unwrap(),
            format!("{}01", "00".repeat(19))
        );
    }

    #[test]
    fn test_date_round_trip() {
        let date = datetime!(2024-03-01 10:20:30 UTC);
        let mut info = KeyInfo {
            creation_date: Some(date),
            ..Default::default()
        };
        assert_eq!(info.creation_date_string(), "2024-03-01 10:20:30");
        assert_eq!(parse_date(&info.creation_date_string()).unwrap(), date);

        info.creation_date = None;
        assert_eq!(info.creation_date_string(), "");
    }

    #[test]
    fn test_malformed_date_is_an_error() {
        assert!(parse_date("not a date").is_err());
        assert!(parse_date("").is_err());
        assert!(parse_date("2024-13-40 99:99:99").is_err());
    }

    #[test]
    fn test_key_role_parsing() {
        assert_eq!("SIG".parse::<KeyRole>().unwrap(), KeyRole::Signature);
        assert_eq!("DEC".parse::<KeyRole>().unwrap(), KeyRole::Decryption);
        assert_eq!("AUT".parse::<KeyRole>().unwrap(), KeyRole::Authentication);
        assert!("sig".parse::<KeyRole>().is_err());
    }

    #[test]
    fn test_state_reset() {
        let mut state = CardState::new();
        state.aid = "D27600012401".into();
        state.sig.attribute = vec![1, 8, 0];
        state.privates[2] = vec![0xAB];
        state.reset();
        assert_eq!(state, CardState::default());
    }

    #[test]
    fn test_serial_slice() {
        let state = CardState {
            aid: "D2760001240103042C97DEADBEEF0000".into(),
            ..Default::default()
        };
        assert_eq!(state.serial(), Some("DEADBEEF"));
        assert_eq!(CardState::default().serial(), None);
    }
}
