//! Data Object directory
//!
//! Maps symbolic attribute names to 16-bit tags and access metadata.
//! The per-role tag families (algorithm attributes, fingerprint and
//! date writes, UIF, key material) are parameterized by [`KeyRole`]
//! instead of being spelled out three times.
//!
//! The slot and RSA-exponent entries are vendor pseudo-DOs living in a
//! reserved tag range; they are session/device attributes rather than
//! card data objects but use the same GET/PUT DATA verbs.

use crate::state::KeyRole;

/// Access mode of a data object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// GET DATA only
    ReadOnly,
    /// GET DATA and PUT DATA
    ReadWrite,
    /// PUT DATA only
    WriteOnly,
}

/// Data objects of the card application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataObject {
    /// Full application identifier (ISO 7816-4); PUT writes the serial
    Aid,
    /// Login data
    Login,
    /// Public key URL (RFC 1738)
    Url,
    /// Historical bytes
    HistoricalBytes,
    /// Cardholder related data (TLV: name, language, salutation)
    CardholderData,
    /// Cardholder name
    Name,
    /// Language preferences (ISO 639)
    Language,
    /// Salutation (ISO 5218)
    Salutation,
    /// Application related data (TLV: extended length, discretionary)
    ApplicationData,
    /// Extended length information
    ExtendedLength,
    /// Discretionary data objects (nested TLV)
    DiscretionaryData,
    /// Extended capabilities flag list
    ExtendedCapabilities,
    /// Algorithm attributes for a key role
    Attributes(KeyRole),
    /// PW status bytes
    PwStatus,
    /// Fingerprint list, 3 x 20 bytes positional
    Fingerprints,
    /// CA fingerprint list, 3 x 20 bytes positional
    CaFingerprints,
    /// Fingerprint write slot for a key role
    FingerprintWrite(KeyRole),
    /// CA fingerprint write slot for a key role
    CaFingerprintWrite(KeyRole),
    /// Generation date list, 3 x 4 bytes big-endian positional
    KeyDates,
    /// Generation date write slot for a key role
    DateWrite(KeyRole),
    /// Security support template (TLV: signature counter)
    SecurityTemplate,
    /// Digital signature counter (3 bytes big-endian on read)
    SignatureCounter,
    /// PW1 resetting code
    ResetCode,
    /// User interaction flag for a key role
    Uif(KeyRole),
    /// Cardholder certificate (sequential slots for AUT, DEC, SIG)
    Certificate,
    /// Public key template returned by key pair operations
    PublicKey,
    /// General feature management (hardware features)
    GeneralFeatures,
    /// Key material blob for a key role
    KeyBlob(KeyRole),
    /// Private-use data object, index 1 to 4
    Private(u8),
    /// Vendor pseudo-DO: slot configuration
    SlotConfig,
    /// Vendor pseudo-DO: currently selected slot
    SlotCurrent,
    /// Vendor pseudo-DO: default RSA public exponent
    RsaExponent,
}

impl DataObject {
    /// 16-bit tag carried in P1-P2 of GET/PUT DATA
    pub const fn tag(self) -> u16 {
        match self {
            Self::Aid => 0x004F,
            Self::Login => 0x005E,
            Self::Url => 0x5F50,
            Self::HistoricalBytes => 0x5F52,
            Self::CardholderData => 0x0065,
            Self::Name => 0x005B,
            Self::Language => 0x5F2D,
            Self::Salutation => 0x5F35,
            Self::ApplicationData => 0x006E,
            Self::ExtendedLength => 0x7F66,
            Self::DiscretionaryData => 0x0073,
            Self::ExtendedCapabilities => 0x00C0,
            Self::Attributes(role) => 0xC1 + role.index() as u16,
            Self::PwStatus => 0x00C4,
            Self::Fingerprints => 0x00C5,
            Self::CaFingerprints => 0x00C6,
            Self::FingerprintWrite(role) => 0xC7 + role.index() as u16,
            Self::CaFingerprintWrite(role) => 0xCA + role.index() as u16,
            Self::KeyDates => 0x00CD,
            Self::DateWrite(role) => 0xCE + role.index() as u16,
            Self::SecurityTemplate => 0x007A,
            Self::SignatureCounter => 0x0093,
            Self::ResetCode => 0x00D3,
            Self::Uif(role) => 0xD6 + role.index() as u16,
            Self::Certificate => 0x7F21,
            Self::PublicKey => 0x7F49,
            Self::GeneralFeatures => 0x7F74,
            Self::KeyBlob(role) => match role {
                KeyRole::Signature => 0x00B6,
                KeyRole::Decryption => 0x00B8,
                KeyRole::Authentication => 0x00A4,
            },
            Self::Private(index) => 0x0100 + index as u16,
            Self::SlotConfig => 0x01F1,
            Self::SlotCurrent => 0x01F2,
            Self::RsaExponent => 0x01F8,
        }
    }

    /// Access mode
    pub const fn access(self) -> Access {
        match self {
            Self::Aid => Access::ReadWrite,
            Self::HistoricalBytes
            | Self::CardholderData
            | Self::ApplicationData
            | Self::ExtendedLength
            | Self::DiscretionaryData
            | Self::ExtendedCapabilities
            | Self::Fingerprints
            | Self::CaFingerprints
            | Self::KeyDates
            | Self::SecurityTemplate
            | Self::SignatureCounter
            | Self::GeneralFeatures => Access::ReadOnly,
            Self::FingerprintWrite(_)
            | Self::CaFingerprintWrite(_)
            | Self::DateWrite(_)
            | Self::ResetCode => Access::WriteOnly,
            _ => Access::ReadWrite,
        }
    }

    /// Whether the full read cycle fetches this object directly
    pub const fn in_get_all(self) -> bool {
        matches!(
            self,
            Self::Aid
                | Self::Login
                | Self::Url
                | Self::HistoricalBytes
                | Self::GeneralFeatures
                | Self::CardholderData
                | Self::ApplicationData
                | Self::SecurityTemplate
                | Self::Certificate
                | Self::Uif(_)
                | Self::KeyBlob(_)
                | Self::Private(_)
                | Self::SlotConfig
                | Self::SlotCurrent
                | Self::RsaExponent
        )
    }
}
