//! RFC 4880 key fingerprint computation
//!
//! Only RSA keys get a fingerprint in this subsystem; EC roles expose
//! their curve OID instead and are never hashed here.

use sha1::{Digest, Sha1};

/// Fixed RSA public-exponent field marker (3-byte exponent layout)
const FOOTER: [u8; 5] = [0x00, 0x11, 0x01, 0x00, 0x01];

/// Compute the RFC 4880 §12.2 fingerprint of an RSA public key
///
/// `bit_length` is the declared key size from the algorithm attribute
/// descriptor and `created` the creation timestamp in epoch seconds.
pub fn rsa_fingerprint(modulus: &[u8], bit_length: u16, created: u32) -> [u8; 20] {
    // Header, modulus and the exponent field marker.
    let total = bit_length / 8 + 0x0D;

    let mut hasher = Sha1::new();
    hasher.update([0x99]);
    hasher.update(total.to_be_bytes());
    hasher.update([0x04]);
    hasher.update(created.to_be_bytes());
    hasher.update([0x01]);
    hasher.update(bit_length.to_be_bytes());
    hasher.update(modulus);
    hasher.update(FOOTER);
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_golden_vector() {
        // Fixed 2048-bit modulus (byte i of 256 = i) at 2024-01-01 00:00:00 UTC.
        let modulus: Vec<u8> = (0..=255u8).collect();
        let fingerprint = rsa_fingerprint(&modulus, 2048, 1_704_067_200);
        assert_eq!(
            hex::encode(fingerprint),
            "cc85ece0408decbcedaead6ce24271f403556636"
        );
    }

    #[test]
    fn test_fingerprint_depends_on_creation_date() {
        let modulus = vec![0xC3u8; 256];
        let a = rsa_fingerprint(&modulus, 2048, 1_000_000_000);
        let b = rsa_fingerprint(&modulus, 2048, 1_000_000_001);
        assert_ne!(a, b);
    }
}
