//! In-memory card used by the integration tests
//!
//! Implements enough of the application protocol to exercise the real
//! session code end to end: command chaining reassembly, GET RESPONSE
//! chunking, the data object directory with its composed TLV blocks,
//! the sequential certificate cursor, PIN verification and on-card RSA
//! key generation and signing backed by the `rsa` crate.
#![allow(dead_code)]

use std::collections::HashMap;

use pgpcard_apdu_core::{CardTransport, Error as ApduError};
use rsa::RsaPrivateKey;
use rsa::traits::PublicKeyParts;
use pgpcard::tlv;

const CHUNK: usize = 254;

const INS_SELECT: u8 = 0xA4;
const INS_ACTIVATE: u8 = 0x44;
const INS_TERMINATE: u8 = 0xE6;
const INS_GET_DATA: u8 = 0xCA;
const INS_GET_NEXT_DATA: u8 = 0xCC;
const INS_PUT_DATA: u8 = 0xDA;
const INS_VERIFY: u8 = 0x20;
const INS_CHANGE_REFERENCE_DATA: u8 = 0x24;
const INS_RESET_RETRY_COUNTER: u8 = 0x2C;
const INS_GENERATE_KEYPAIR: u8 = 0x47;
const INS_PSO: u8 = 0x2A;
const INS_GET_CHALLENGE: u8 = 0x84;
const INS_GET_RESPONSE: u8 = 0xC0;

pub const DEFAULT_PW1: &[u8] = b"123456";
pub const DEFAULT_PW3: &[u8] = b"12345678";

const RSA2048_ATTRIBUTE: [u8; 6] = [0x01, 0x08, 0x00, 0x00, 0x20, 0x01];

pub struct VirtualCard {
    objects: HashMap<u16, Vec<u8>>,
    // RSA keys indexed sig, dec, aut.
    keys: [Option<RsaPrivateKey>; 3],
    // Certificate slots in cursor order: aut, dec, sig.
    certs: [Vec<u8>; 3],
    cert_read: usize,
    cert_write: usize,
    counter: u32,
    pw1: Vec<u8>,
    pw3: Vec<u8>,
    pw1_tries: u8,
    chain: Vec<u8>,
    pending: Vec<u8>,
    connected: bool,
}

impl std::fmt::Debug for VirtualCard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualCard").finish_non_exhaustive()
    }
}

impl Default for VirtualCard {
    fn default() -> Self {
        Self::new()
    }
}

impl VirtualCard {
    pub fn new() -> Self {
        Self {
            objects: default_objects(),
            keys: [None, None, None],
            certs: [Vec::new(), Vec::new(), Vec::new()],
            cert_read: 0,
            cert_write: 0,
            counter: 0,
            pw1: DEFAULT_PW1.to_vec(),
            pw3: DEFAULT_PW3.to_vec(),
            pw1_tries: 3,
            chain: Vec::new(),
            pending: Vec::new(),
            connected: true,
        }
    }

    fn respond(&mut self, payload: Vec<u8>) -> Vec<u8> {
        let mut out = payload;
        if out.len() <= CHUNK {
            out.extend_from_slice(&[0x90, 0x00]);
            return out;
        }
        self.pending = out.split_off(CHUNK);
        out.push(0x61);
        out.push(self.pending.len().min(0xFF) as u8);
        out
    }

    fn get_response(&mut self, le: Option<u8>) -> Vec<u8> {
        let requested = match le {
            Some(0) | None => 256,
            Some(n) => usize::from(n),
        };
        let n = requested.min(self.pending.len());
        let mut out: Vec<u8> = self.pending.drain(..n).collect();
        if self.pending.is_empty() {
            out.extend_from_slice(&[0x90, 0x00]);
        } else {
            out.push(0x61);
            out.push(self.pending.len().min(0xFF) as u8);
        }
        out
    }

    fn compose(&self, tag: u16) -> Option<Vec<u8>> {
        match tag {
            // Cardholder related data.
            0x65 => Some(
                tlv::encode([
                    (0x5Bu16, self.stored(0x5B)),
                    (0x5F2D, self.stored(0x5F2D)),
                    (0x5F35, self.stored(0x5F35)),
                ])
                .to_vec(),
            ),
            // Application related data with nested discretionary block.
            0x6E => {
                let fingerprints = self.concat(&[0xC7, 0xC8, 0xC9]);
                let ca_fingerprints = self.concat(&[0xCA, 0xCB, 0xCC]);
                let dates = self.concat(&[0xCE, 0xCF, 0xD0]);
                let discretionary = tlv::encode([
                    (0xC0u16, self.stored(0xC0)),
                    (0xC1, self.stored(0xC1)),
                    (0xC2, self.stored(0xC2)),
                    (0xC3, self.stored(0xC3)),
                    (0xC4, self.stored(0xC4)),
                    (0xC5, fingerprints.as_slice()),
                    (0xC6, ca_fingerprints.as_slice()),
                    (0xCD, dates.as_slice()),
                ]);
                Some(
                    tlv::encode([
                        (0x7F66u16, self.stored(0x7F66)),
                        (0x73, discretionary.as_ref()),
                    ])
                    .to_vec(),
                )
            }
            // Security support template.
            0x7A => {
                let counter = self.counter.to_be_bytes();
                Some(tlv::encode([(0x93u16, &counter[1..4])]).to_vec())
            }
            _ => None,
        }
    }

    fn stored(&self, tag: u16) -> &[u8] {
        self.objects.get(&tag).map_or(&[], Vec::as_slice)
    }

    fn concat(&self, tags: &[u16]) -> Vec<u8> {
        tags.iter().flat_map(|&t| self.stored(t)).copied().collect()
    }

    fn get_data(&mut self, tag: u16) -> Vec<u8> {
        if tag == 0x7F21 {
            let value = self.certs[0].clone();
            self.cert_read = 1;
            return self.respond(value);
        }
        if let Some(composed) = self.compose(tag) {
            return self.respond(composed);
        }
        match self.objects.get(&tag) {
            Some(value) => {
                let value = value.clone();
                self.respond(value)
            }
            None => vec![0x6A, 0x88],
        }
    }

    fn get_next_data(&mut self, tag: u16) -> Vec<u8> {
        if tag != 0x7F21 {
            return vec![0x6A, 0x88];
        }
        let value = self.certs[self.cert_read % 3].clone();
        self.cert_read += 1;
        self.respond(value)
    }

    fn put_data(&mut self, tag: u16, body: &[u8]) -> Vec<u8> {
        match tag {
            // AID writes replace the four serial bytes.
            0x4F => {
                if body.len() != 4 {
                    return vec![0x6A, 0x80];
                }
                if let Some(aid) = self.objects.get_mut(&0x4F) {
                    aid[10..14].copy_from_slice(body);
                }
            }
            0x7F21 => {
                self.certs[self.cert_write % 3] = body.to_vec();
                self.cert_write += 1;
            }
            0x93 => {
                self.counter = u32::from_be_bytes(body.try_into().unwrap_or([0; 4]));
            }
            _ => {
                self.objects.insert(tag, body.to_vec());
            }
        }
        vec![0x90, 0x00]
    }

    fn verify(&mut self, cla: u8, p2: u8, body: &[u8]) -> Vec<u8> {
        // Pin-pad entry always succeeds on the virtual reader.
        if cla == 0xEF {
            return vec![0x90, 0x00];
        }
        let expected = match p2 {
            0x81 | 0x82 => &self.pw1,
            0x83 => &self.pw3,
            _ => return vec![0x6A, 0x86],
        };
        if body == expected.as_slice() {
            self.pw1_tries = 3;
            vec![0x90, 0x00]
        } else {
            self.pw1_tries = self.pw1_tries.saturating_sub(1);
            vec![0x63, 0xC0 | self.pw1_tries]
        }
    }

    fn change_pin(&mut self, p2: u8, body: &[u8]) -> Vec<u8> {
        let current = match p2 {
            0x81 | 0x82 => self.pw1.clone(),
            0x83 => self.pw3.clone(),
            _ => return vec![0x6A, 0x86],
        };
        let Some(new) = body.strip_prefix(current.as_slice()) else {
            return vec![0x69, 0x82];
        };
        match p2 {
            0x83 => self.pw3 = new.to_vec(),
            _ => self.pw1 = new.to_vec(),
        }
        vec![0x90, 0x00]
    }

    fn reset_retry(&mut self, p1: u8, body: &[u8]) -> Vec<u8> {
        match p1 {
            // Relies on a verified PW3.
            0x02 => {
                self.pw1 = body.to_vec();
                self.pw1_tries = 3;
                vec![0x90, 0x00]
            }
            0x00 => {
                let code = self.stored(0xD3).to_vec();
                match body.strip_prefix(code.as_slice()) {
                    Some(new) if !code.is_empty() => {
                        self.pw1 = new.to_vec();
                        self.pw1_tries = 3;
                        vec![0x90, 0x00]
                    }
                    _ => vec![0x69, 0x82],
                }
            }
            _ => vec![0x6A, 0x86],
        }
    }

    fn generate_keypair(&mut self, p1: u8, body: &[u8]) -> Vec<u8> {
        let Some(&key_tag) = body.first() else {
            return vec![0x6A, 0x80];
        };
        let Some(index) = key_index(key_tag) else {
            return vec![0x6A, 0x88];
        };

        if p1 == 0x80 {
            let mut rng = rand::thread_rng();
            let Ok(key) = RsaPrivateKey::new(&mut rng, 2048) else {
                return vec![0x64, 0x00];
            };
            let blob = key_blob(&key);
            self.objects.insert(u16::from(key_tag), blob);
            self.keys[index] = Some(key);
        }

        let Some(key) = &self.keys[index] else {
            return vec![0x6A, 0x88];
        };
        let modulus = key.n().to_bytes_be();
        let exponent = key.e().to_bytes_be();
        let inner = tlv::encode([(0x81u16, modulus.as_slice()), (0x82, exponent.as_slice())]);
        let outer = tlv::encode([(0x7F49u16, inner.as_ref())]);
        self.respond(outer.to_vec())
    }

    fn sign(&mut self, body: &[u8]) -> Vec<u8> {
        let Some(key) = &self.keys[0] else {
            return vec![0x69, 0x85];
        };
        match key.sign(rsa::Pkcs1v15Sign::new_unprefixed(), body) {
            Ok(signature) => {
                self.counter += 1;
                self.respond(signature)
            }
            Err(_) => vec![0x6A, 0x80],
        }
    }

    fn challenge(&mut self, le: Option<u8>) -> Vec<u8> {
        let length = match le {
            Some(0) | None => 256,
            Some(n) => usize::from(n),
        };
        let payload = (0..length).map(|_| rand::random::<u8>()).collect();
        self.respond(payload)
    }

    fn dispatch(&mut self, command: &[u8]) -> Vec<u8> {
        let Some((header, rest)) = command.split_at_checked(4) else {
            return vec![0x67, 0x00];
        };
        let (cla, ins, p1, p2) = (header[0], header[1], header[2], header[3]);
        let (data, le): (&[u8], Option<u8>) = match rest {
            [] => (&[], None),
            [le] => (&[], Some(*le)),
            [lc, tail @ ..] => {
                let lc = usize::from(*lc);
                if tail.len() < lc {
                    return vec![0x67, 0x00];
                }
                (&tail[..lc], tail.get(lc).copied())
            }
        };

        // Chained frame: buffer the chunk, nothing executes yet.
        if cla & 0x10 != 0 {
            self.chain.extend_from_slice(data);
            return vec![0x90, 0x00];
        }
        let mut body = std::mem::take(&mut self.chain);
        body.extend_from_slice(data);

        if ins == INS_GET_RESPONSE {
            return self.get_response(le);
        }
        self.pending.clear();

        let tag = u16::from_be_bytes([p1, p2]);
        match ins {
            INS_SELECT => {
                if body.starts_with(&[0xD2, 0x76, 0x00, 0x01, 0x24, 0x01]) {
                    self.cert_read = 0;
                    self.cert_write = 0;
                    vec![0x90, 0x00]
                } else {
                    vec![0x6A, 0x82]
                }
            }
            INS_ACTIVATE => vec![0x90, 0x00],
            INS_TERMINATE => {
                *self = Self::new();
                vec![0x90, 0x00]
            }
            INS_GET_DATA => self.get_data(tag),
            INS_GET_NEXT_DATA => self.get_next_data(tag),
            INS_PUT_DATA => self.put_data(tag, &body),
            INS_VERIFY => self.verify(cla, p2, &body),
            INS_CHANGE_REFERENCE_DATA => self.change_pin(p2, &body),
            INS_RESET_RETRY_COUNTER => self.reset_retry(p1, &body),
            INS_GENERATE_KEYPAIR => self.generate_keypair(p1, &body),
            INS_PSO if p1 == 0x9E && p2 == 0x9A => self.sign(&body),
            INS_GET_CHALLENGE => self.challenge(le),
            _ => vec![0x6D, 0x00],
        }
    }
}

impl CardTransport for VirtualCard {
    fn do_transmit_raw(&mut self, command: &[u8]) -> Result<Vec<u8>, ApduError> {
        Ok(self.dispatch(command))
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn reset(&mut self) -> Result<(), ApduError> {
        self.chain.clear();
        self.pending.clear();
        Ok(())
    }
}

fn key_index(tag: u8) -> Option<usize> {
    match tag {
        0xB6 => Some(0),
        0xB8 => Some(1),
        0xA4 => Some(2),
        _ => None,
    }
}

fn key_blob(key: &RsaPrivateKey) -> Vec<u8> {
    let mut blob = Vec::new();
    blob.extend_from_slice(&0x3330_0004u32.to_be_bytes());
    blob.extend_from_slice(&12u32.to_be_bytes());
    blob.extend_from_slice(&4u32.to_be_bytes());
    let mut exponent = key.e().to_bytes_be();
    while exponent.len() < 4 {
        exponent.insert(0, 0);
    }
    blob.extend_from_slice(&exponent);
    blob.extend_from_slice(&256u32.to_be_bytes());
    blob.extend_from_slice(&[0u8; 256]);
    blob
}

fn default_objects() -> HashMap<u16, Vec<u8>> {
    let mut objects = HashMap::new();
    let mut insert = |tag: u16, value: Vec<u8>| {
        objects.insert(tag, value);
    };

    // AID: RID, application, version 3.4, manufacturer, serial, RFU.
    insert(
        0x4F,
        vec![
            0xD2, 0x76, 0x00, 0x01, 0x24, 0x01, 0x03, 0x04, 0x2C, 0x97, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00,
        ],
    );
    insert(0x5B, Vec::new());
    insert(0x5E, Vec::new());
    insert(0x5F2D, Vec::new());
    insert(0x5F35, vec![b'0']);
    insert(0x5F50, Vec::new());
    insert(
        0x5F52,
        vec![0x00, 0x31, 0xC5, 0x73, 0xC0, 0x01, 0x40, 0x05, 0x90, 0x00],
    );
    insert(0x7F74, vec![0x20]);
    insert(0x7F66, vec![0x02, 0x02, 0x1B, 0xD8, 0x02, 0x02, 0x08, 0x00]);
    // Challenge, key import, changeable PW status, private DOs,
    // changeable attributes.
    insert(
        0xC0,
        vec![0x7C, 0x00, 0x08, 0x00, 0x09, 0x60, 0x04, 0x00, 0x00, 0x00],
    );
    insert(0xC1, RSA2048_ATTRIBUTE.to_vec());
    insert(0xC2, RSA2048_ATTRIBUTE.to_vec());
    insert(0xC3, RSA2048_ATTRIBUTE.to_vec());
    insert(0xC4, vec![0x01, 0x0C, 0x0C, 0x0C, 0x03, 0x00, 0x03]);
    for tag in [0xC7u16, 0xC8, 0xC9, 0xCA, 0xCB, 0xCC] {
        insert(tag, vec![0; 20]);
    }
    for tag in [0xCEu16, 0xCF, 0xD0] {
        insert(tag, vec![0; 4]);
    }
    for tag in [0xD6u16, 0xD7, 0xD8] {
        insert(tag, vec![0x00, 0x00]);
    }
    for tag in [0x0101u16, 0x0102, 0x0103, 0x0104] {
        insert(tag, Vec::new());
    }
    insert(0x01F1, vec![0x03, 0x00, 0x03]);
    insert(0x01F2, vec![0x00]);
    insert(0x01F8, vec![0x00, 0x01, 0x00, 0x01]);

    objects
}
