//! Protocol constants for the OpenPGP card application

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Application identifier of the OpenPGP card application
pub const OPENPGP_AID: [u8; 6] = [0xD2, 0x76, 0x00, 0x01, 0x24, 0x01];

/// Class byte delegating PIN entry to the reader pin-pad
pub const CLA_PINPAD: u8 = 0xEF;

/// Instruction bytes of the card application
pub mod ins {
    /// SELECT
    pub const SELECT: u8 = 0xA4;
    /// ACTIVATE FILE
    pub const ACTIVATE: u8 = 0x44;
    /// TERMINATE DF
    pub const TERMINATE: u8 = 0xE6;
    /// GET DATA
    pub const GET_DATA: u8 = 0xCA;
    /// GET NEXT DATA (sequential certificate slots)
    pub const GET_NEXT_DATA: u8 = 0xCC;
    /// PUT DATA
    pub const PUT_DATA: u8 = 0xDA;
    /// VERIFY
    pub const VERIFY: u8 = 0x20;
    /// CHANGE REFERENCE DATA
    pub const CHANGE_REFERENCE_DATA: u8 = 0x24;
    /// RESET RETRY COUNTER
    pub const RESET_RETRY_COUNTER: u8 = 0x2C;
    /// GENERATE ASYMMETRIC KEY PAIR
    pub const GENERATE_ASYMMETRIC_KEYPAIR: u8 = 0x47;
    /// PERFORM SECURITY OPERATION
    pub const PERFORM_SECURITY_OPERATION: u8 = 0x2A;
    /// INTERNAL AUTHENTICATE
    pub const INTERNAL_AUTHENTICATE: u8 = 0x88;
    /// GET CHALLENGE
    pub const GET_CHALLENGE: u8 = 0x84;
}

/// Password (PIN) references
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Password {
    /// User PIN valid for a single PSO:CDS
    Pw1 = 0x81,
    /// User PIN valid for several attempts
    Pw2 = 0x82,
    /// Admin PIN
    Pw3 = 0x83,
}

impl Password {
    /// Reference byte carried in P2 of VERIFY and related commands
    pub const fn reference(self) -> u8 {
        self as u8
    }
}

/// Operation selector for GENERATE ASYMMETRIC KEY PAIR
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum KeyOperation {
    /// Generate a new key pair on the card
    Generate = 0x80,
    /// Read back the public part of an existing key
    Read = 0x81,
}

/// Public-key algorithm identifiers (RFC 4880 §9.1)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PubkeyAlgorithm {
    /// RSA (encrypt or sign)
    Rsa = 1,
    /// Elliptic Curve Diffie-Hellman
    Ecdh = 18,
    /// Elliptic Curve Digital Signature Algorithm
    Ecdsa = 19,
    /// Edwards-curve Digital Signature Algorithm
    Eddsa = 22,
}

impl PubkeyAlgorithm {
    /// Decode the algorithm id byte of an attribute block
    pub const fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(Self::Rsa),
            18 => Some(Self::Ecdh),
            19 => Some(Self::Ecdsa),
            22 => Some(Self::Eddsa),
            _ => None,
        }
    }
}

impl fmt::Display for PubkeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Rsa => "RSA",
            Self::Ecdh => "ECDH",
            Self::Ecdsa => "ECDSA",
            Self::Eddsa => "EDDSA",
        };
        write!(f, "{name}")
    }
}

/// Algorithm-attribute templates accepted by the card
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTemplate {
    /// RSA 2048 bits, standard format with modulus
    Rsa2048,
    /// RSA 3072 bits, standard format with modulus
    Rsa3072,
    /// NIST P-256 curve
    NistP256,
    /// Ed25519 curve
    Ed25519,
    /// Curve25519 (ECDH)
    Cv25519,
}

impl KeyTemplate {
    /// All template names, for help text
    pub const NAMES: [&'static str; 5] =
        ["rsa2048", "rsa3072", "nistp256", "ed25519", "cv25519"];

    /// Raw algorithm-attribute bytes written to the card
    pub const fn attribute_bytes(self) -> &'static [u8] {
        match self {
            Self::Rsa2048 => &[0x01, 0x08, 0x00, 0x00, 0x20, 0x01],
            Self::Rsa3072 => &[0x01, 0x0C, 0x00, 0x00, 0x20, 0x01],
            Self::NistP256 => &[0x13, 0x2A, 0x86, 0x48, 0xCE, 0x3D, 0x03, 0x01, 0x07],
            Self::Ed25519 => &[0x16, 0x2B, 0x06, 0x01, 0x04, 0x01, 0xDA, 0x47, 0x0F, 0x01],
            Self::Cv25519 => &[
                0x12, 0x2B, 0x06, 0x01, 0x04, 0x01, 0x97, 0x55, 0x01, 0x05, 0x01,
            ],
        }
    }
}

impl fmt::Display for KeyTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Rsa2048 => "rsa2048",
            Self::Rsa3072 => "rsa3072",
            Self::NistP256 => "nistp256",
            Self::Ed25519 => "ed25519",
            Self::Cv25519 => "cv25519",
        };
        write!(f, "{name}")
    }
}

impl FromStr for KeyTemplate {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rsa2048" => Ok(Self::Rsa2048),
            "rsa3072" => Ok(Self::Rsa3072),
            "nistp256" => Ok(Self::NistP256),
            "ed25519" => Ok(Self::Ed25519),
            "cv25519" => Ok(Self::Cv25519),
            _ => Err(Error::usage(format!("Invalid template: {s}"))),
        }
    }
}

/// Cardholder salutation (ISO 5218 code, stored as an ASCII digit)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Salutation {
    /// Not announced
    #[default]
    Unspecified,
    /// Male
    Male,
    /// Female
    Female,
}

impl Salutation {
    /// ASCII digit the card stores for this salutation
    pub const fn code(self) -> u8 {
        match self {
            Self::Unspecified => b'0',
            Self::Male => b'1',
            Self::Female => b'2',
        }
    }

    /// Decode the ASCII digit read from the card
    pub const fn from_code(code: u8) -> Self {
        match code {
            b'1' => Self::Male,
            b'2' => Self::Female,
            _ => Self::Unspecified,
        }
    }
}

impl FromStr for Salutation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Male" => Ok(Self::Male),
            "Female" => Ok(Self::Female),
            _ => Err(Error::usage(format!("Invalid salutation value ({s})!"))),
        }
    }
}

impl fmt::Display for Salutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unspecified => "",
            Self::Male => "Male",
            Self::Female => "Female",
        };
        write!(f, "{name}")
    }
}
