//! Human-readable decoding of card attributes
//!
//! Pure functions from the state snapshot to label/value rows; all
//! printing lives in the CLI.

use crate::constants::PubkeyAlgorithm;
use crate::state::{CardState, KeyInfo, Uif};
use crate::util::be_int;

/// Label/value rows for one report section
pub type Rows = Vec<(&'static str, String)>;

const YES: &str = "\u{2713}";
const NO: &str = "\u{2717}";

fn mark(set: bool) -> &'static str {
    if set { YES } else { NO }
}

/// Application identifier fields
pub fn aid(state: &CardState) -> Rows {
    let field = |range: std::ops::Range<usize>| state.aid.get(range).unwrap_or("").to_string();
    let version = {
        let major = field(12..14).parse::<u8>().unwrap_or(0);
        let minor = field(14..16).parse::<u8>().unwrap_or(0);
        format!("{major}.{minor}")
    };
    vec![
        ("AID", state.aid.clone()),
        ("RID", field(0..10)),
        ("Application", field(10..12)),
        ("Version", version),
        ("Manufacturer", field(16..20)),
        ("Serial", field(20..28)),
    ]
}

/// Historical bytes
pub fn historical_bytes(state: &CardState) -> Rows {
    vec![("historical bytes", hex::encode(&state.historical_bytes))]
}

/// Maximum extended lengths for command and response
pub fn extended_length(state: &CardState) -> Rows {
    let (command, response) = if state.ext_length.is_empty() {
        ("N/A".to_string(), "N/A".to_string())
    } else {
        (
            be_int(&state.ext_length, 2, 2).to_string(),
            be_int(&state.ext_length, 6, 2).to_string(),
        )
    };
    vec![("Command", command), ("Response", response)]
}

/// Extended capabilities flag list
pub fn extended_capabilities(state: &CardState) -> Rows {
    let caps = &state.ext_capabilities;
    let byte = |i: usize| caps.get(i).copied().unwrap_or(0);
    let b1 = byte(0);

    let secure_messaging = if b1 & 0x80 != 0 {
        match byte(1) {
            1 => format!("{YES}: AES 128 bits"),
            2 => format!("{YES}: AES 256 bits"),
            _ => format!("{YES}: ?? bits"),
        }
    } else {
        NO.to_string()
    };
    let challenge = if b1 & 0x40 != 0 {
        format!("{YES} (Max length: {})", be_int(caps, 2, 2))
    } else {
        NO.to_string()
    };

    vec![
        ("Secure Messaging", secure_messaging),
        ("Get Challenge", challenge),
        ("Key import", mark(b1 & 0x20 != 0).to_string()),
        (
            "PW status",
            if b1 & 0x10 != 0 { "Changeable" } else { "Fixed" }.to_string(),
        ),
        ("Private DOs", mark(b1 & 0x08 != 0).to_string()),
        (
            "Algo attributes",
            if b1 & 0x04 != 0 { "Changeable" } else { "Fixed" }.to_string(),
        ),
        ("PSO:DEC AES", mark(b1 & 0x02 != 0).to_string()),
        ("Key Derived Format", mark(b1 & 0x01 != 0).to_string()),
        ("Max Cert len", be_int(caps, 4, 2).to_string()),
        ("Max Special DO", be_int(caps, 6, 2).to_string()),
        ("PIN 2 format", mark(byte(8) != 0).to_string()),
        ("MSE", mark(byte(9) != 0).to_string()),
    ]
}

/// PW status block: format, length and error counter per password
pub fn passwords(state: &CardState) -> Rows {
    let status = &state.pw_status;
    let byte = |i: usize| status.get(i).copied().unwrap_or(0);

    let validity = match byte(0) {
        0 => "Only 1 PSO:CDS".to_string(),
        1 => "Several PSO:CDS".to_string(),
        other => format!("unknown ({other})"),
    };

    let entry = |format_index: usize, counter_index: usize| {
        let format_byte = byte(format_index);
        let format = if format_byte & 0x80 != 0 {
            "Format-2"
        } else {
            "UTF-8"
        };
        let length = format_byte & 0x7F;
        let counter = byte(counter_index);
        format!("{format} ({length} bytes), Error Counter={counter}")
    };

    vec![
        ("PW1", format!("{}, Validity={validity}", entry(1, 4))),
        ("Reset Counter", entry(2, 5)),
        ("PW3", entry(3, 6)),
    ]
}

/// Hardware feature bitmap
pub fn hardware(state: &CardState) -> Rows {
    let features = state.hw_features;
    vec![
        ("Display", mark(features & 0x80 != 0).to_string()),
        ("Biometric sensor", mark(features & 0x40 != 0).to_string()),
        ("Button/Keypad", mark(features & 0x20 != 0).to_string()),
        ("LED", mark(features & 0x10 != 0).to_string()),
        ("Loudspeaker", mark(features & 0x08 != 0).to_string()),
        ("Microphone", mark(features & 0x04 != 0).to_string()),
        ("Touchscreen", mark(features & 0x02 != 0).to_string()),
        ("Battery", mark(features & 0x01 != 0).to_string()),
    ]
}

/// Key slot configuration
pub fn slots(slot_config: [u8; 3], slot_current: u8) -> Rows {
    vec![
        ("Number of Slots", slot_config[0].to_string()),
        ("Default Slot", (slot_config[1] + 1).to_string()),
        ("Selection by APDU", mark(slot_config[2] & 0x01 != 0).to_string()),
        ("Selection by screen", mark(slot_config[2] & 0x02 != 0).to_string()),
        ("Current", (slot_current + 1).to_string()),
    ]
}

/// Render a key's algorithm attribute block
pub fn attributes(key: &KeyInfo) -> String {
    let attribute = &key.attribute;
    let Some(algorithm) = attribute.first().and_then(|&id| PubkeyAlgorithm::from_id(id)) else {
        return String::new();
    };
    match algorithm {
        PubkeyAlgorithm::Rsa => {
            let format = match attribute.get(5).copied().unwrap_or(0xFF) {
                0 => "standard (e, p, q)",
                1 => "standard with modulus (n)",
                2 => "crt (Chinese Remainder Theorem)",
                3 => "crt (Chinese Remainder Theorem) with modulus (n)",
                _ => "unknown",
            };
            format!(
                "RSA-{}, Format: {format}, Exponent size: {}",
                be_int(attribute, 1, 2),
                be_int(attribute, 3, 2)
            )
        }
        other => other.to_string(),
    }
}

/// Render a user interaction flag
pub const fn uif(value: Uif) -> &'static str {
    match value {
        Uif::Disabled => "\u{2717}",
        Uif::Enabled => "\u{2713}",
        Uif::PermanentlyEnabled => "\u{2713} (Permanent)",
    }
}

/// Decode the key-material blob header
///
/// Two 4-byte big-endian identifiers, then a length-prefixed public
/// exponent and a length-prefixed opaque private field. The first
/// length field covers only the public exponent even though the blob
/// documentation calls it the public key size.
pub fn key_blob(key_material: &[u8]) -> Rows {
    let target_id = be_int(key_material, 0, 4);
    let api_level = be_int(key_material, 4, 4);
    let exp_size = be_int(key_material, 8, 4) as usize;
    let exponent = be_int(key_material, 12, 4);
    let private_size = be_int(key_material, 12 + exp_size, 4);
    vec![
        ("OS Target ID", format!("0x{target_id:04x}")),
        ("API Level", api_level.to_string()),
        ("Public exp size", exp_size.to_string()),
        ("Public exp", format!("0x{exponent:06x}")),
        ("Private key size", private_size.to_string()),
    ]
}
