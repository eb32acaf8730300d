//! Card session and operation surface
//!
//! [`OpenPgpCard`] owns the executor, the in-memory [`CardState`] and
//! the slot selection for one exclusive session with a card. All reads
//! and writes go through GET/PUT DATA on the [`DataObject`] directory;
//! multi-frame plumbing lives in the executor's chaining processor.

use bytes::Bytes;
use pgpcard_apdu_core::prelude::*;
use time::OffsetDateTime;
use tracing::{debug, info};

use crate::constants::{
    CLA_PINPAD, KeyOperation, KeyTemplate, OPENPGP_AID, Password, PubkeyAlgorithm, Salutation, ins,
};
use crate::data_object::DataObject;
use crate::error::{Error, Result as CardResult};
use crate::fingerprint::rsa_fingerprint;
use crate::state::{CardState, KeyRole, Uif};
use crate::tlv;
use crate::util::be_int;

/// Public key material returned by an asymmetric key operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublicKey {
    /// RSA public key with the derived RFC 4880 fingerprint
    Rsa {
        /// Declared key size from the algorithm attribute
        bit_length: u16,
        /// Modulus bytes
        modulus: Vec<u8>,
        /// Public exponent bytes
        exponent: Vec<u8>,
        /// Creation timestamp embedded in the fingerprint
        created: OffsetDateTime,
        /// RFC 4880 fingerprint
        fingerprint: [u8; 20],
    },
    /// EC public key, exposed as curve OID plus raw point
    Ec {
        /// Algorithm identifier from the attribute block
        algorithm: PubkeyAlgorithm,
        /// Curve OID bytes
        oid: Vec<u8>,
    },
}

impl PublicKey {
    /// Export the public key as SubjectPublicKeyInfo PEM
    ///
    /// Only RSA material can be re-encoded host-side; EC keys are
    /// published through their card certificate instead.
    pub fn to_pem(&self) -> CardResult<String> {
        use rsa::pkcs8::{EncodePublicKey, LineEnding};

        let Self::Rsa {
            modulus, exponent, ..
        } = self
        else {
            return Err(Error::usage("Only RSA keys can be exported as PEM"));
        };
        let key = rsa::RsaPublicKey::new(
            rsa::BigUint::from_bytes_be(modulus),
            rsa::BigUint::from_bytes_be(exponent),
        )
        .map_err(|e| Error::usage(format!("Invalid RSA public key: {e}")))?;
        key.to_public_key_pem(LineEnding::LF)
            .map_err(|e| Error::usage(format!("PEM encoding failed: {e}")))
    }
}

/// Session with the OpenPGP card application
///
/// The session exclusively owns its transport, the state snapshot and
/// the current slot; nothing here is ambient or shared.
#[derive(Debug)]
pub struct OpenPgpCard<T: CardTransport> {
    executor: CardExecutor<T>,
    state: CardState,
    slot_current: u8,
    slot_config: [u8; 3],
}

impl<T: CardTransport> OpenPgpCard<T> {
    /// Create a session over a connected transport
    pub fn new(transport: T) -> Self {
        Self {
            executor: CardExecutor::new_with_defaults(transport),
            state: CardState::new(),
            slot_current: 0,
            slot_config: [0; 3],
        }
    }

    /// The current state snapshot
    pub const fn state(&self) -> &CardState {
        &self.state
    }

    /// Currently selected key slot (zero-based)
    pub const fn slot_current(&self) -> u8 {
        self.slot_current
    }

    /// Raw slot configuration bytes (count, default, selection flags)
    pub const fn slot_config(&self) -> [u8; 3] {
        self.slot_config
    }

    /// SELECT the OpenPGP application
    pub fn select(&mut self) -> CardResult<()> {
        let command = Command::new_with_data(0x00, ins::SELECT, 0x04, 0x00, OPENPGP_AID.to_vec());
        self.executor.execute_success(&command)?;
        Ok(())
    }

    /// ACTIVATE FILE, re-initializing a terminated application
    pub fn activate(&mut self) -> CardResult<()> {
        self.executor
            .execute_success(&Command::new(0x00, ins::ACTIVATE, 0x00, 0x00))?;
        Ok(())
    }

    /// TERMINATE DF, erasing all card data
    pub fn terminate(&mut self) -> CardResult<()> {
        self.executor
            .execute_success(&Command::new(0x00, ins::TERMINATE, 0x00, 0x00))?;
        Ok(())
    }

    // ----- data object plumbing -----

    /// GET DATA for a directory entry
    ///
    /// A non-success status yields the empty payload: optional objects
    /// (general features, private DOs on cards without them) simply
    /// read back as absent during the full read cycle.
    pub fn get_data(&mut self, object: DataObject) -> CardResult<Bytes> {
        self.get_data_tagged(object.tag(), ins::GET_DATA)
    }

    /// GET NEXT DATA, advancing a sequential slot cursor (certificates)
    pub fn get_data_next(&mut self, object: DataObject) -> CardResult<Bytes> {
        self.get_data_tagged(object.tag(), ins::GET_NEXT_DATA)
    }

    fn get_data_tagged(&mut self, tag: u16, instruction: u8) -> CardResult<Bytes> {
        let [p1, p2] = tag.to_be_bytes();
        let command = Command::new_with_le(0x00, instruction, p1, p2, 0x00);
        let response = self.executor.execute(&command)?;
        if !response.is_success() {
            debug!(tag, status = %response.status(), "Data object not readable");
        }
        Ok(response.payload().clone())
    }

    /// PUT DATA for a directory entry; any non-success status is fatal
    pub fn put_data(&mut self, object: DataObject, data: &[u8]) -> CardResult<()> {
        let [p1, p2] = object.tag().to_be_bytes();
        let mut command = Command::new(0x00, ins::PUT_DATA, p1, p2);
        if !data.is_empty() {
            command = command.with_data(data.to_vec());
        }
        self.executor.execute_success(&command)?;
        Ok(())
    }

    // ----- full read cycle -----

    /// Re-populate the whole state snapshot from the card
    pub fn get_all(&mut self) -> CardResult<()> {
        self.state.reset();

        self.slot_current = self
            .get_data(DataObject::SlotCurrent)?
            .first()
            .copied()
            .unwrap_or(0);
        let config = self.get_data(DataObject::SlotConfig)?;
        for (slot, byte) in self.slot_config.iter_mut().zip(config.iter()) {
            *slot = *byte;
        }

        self.state.aid = hex::encode_upper(self.get_data(DataObject::Aid)?);
        self.state.login = decode_utf8(&self.get_data(DataObject::Login)?);
        self.state.url = decode_utf8(&self.get_data(DataObject::Url)?);
        self.state.historical_bytes = self.get_data(DataObject::HistoricalBytes)?.to_vec();
        self.state.hw_features = self
            .get_data(DataObject::GeneralFeatures)?
            .first()
            .copied()
            .unwrap_or(0);

        self.read_cardholder_data()?;
        self.read_application_data()?;

        let exponent = self.get_data(DataObject::RsaExponent)?;
        self.state.rsa_pub_exp = be_int(&exponent, 0, 4);

        // Certificate slots are sequential: AUT first, then DEC and SIG
        // through the GET NEXT DATA cursor.
        self.state.aut.certificate = decode_utf8(&self.get_data(DataObject::Certificate)?);
        self.state.dec.certificate = decode_utf8(&self.get_data_next(DataObject::Certificate)?);
        self.state.sig.certificate = decode_utf8(&self.get_data_next(DataObject::Certificate)?);

        for role in KeyRole::ALL {
            let uif = self.get_data(DataObject::Uif(role))?;
            self.state.key_mut(role).uif = Uif::from_byte(uif.first().copied().unwrap_or(0));
        }

        let template = self.get_data(DataObject::SecurityTemplate)?;
        let tags = tlv::decode(&template)?;
        if let Some(counter) = tags.get(DataObject::SignatureCounter.tag()) {
            self.state.digital_counter = be_int(counter, 0, 3);
        }

        // Private DOs exist only when the capability bit says so.
        if self.state.ext_capabilities.first().copied().unwrap_or(0) & 0x08 != 0 {
            for index in 0..4u8 {
                self.state.privates[usize::from(index)] =
                    self.get_data(DataObject::Private(index + 1))?.to_vec();
            }
        }

        for role in KeyRole::ALL {
            self.state.key_mut(role).key_material =
                self.get_data(DataObject::KeyBlob(role))?.to_vec();
        }

        info!(aid = %self.state.aid, "Card state refreshed");
        Ok(())
    }

    fn read_cardholder_data(&mut self) -> CardResult<()> {
        let block = self.get_data(DataObject::CardholderData)?;
        let tags = tlv::decode(&block)?;
        if let Some(name) = tags.get(DataObject::Name.tag()) {
            self.state.name = decode_utf8(name);
        }
        if let Some(salutation) = tags.get(DataObject::Salutation.tag()) {
            self.state.salutation =
                Salutation::from_code(salutation.first().copied().unwrap_or(0));
        }
        if let Some(lang) = tags.get(DataObject::Language.tag()) {
            self.state.lang = decode_utf8(lang);
        }
        Ok(())
    }

    fn read_application_data(&mut self) -> CardResult<()> {
        let block = self.get_data(DataObject::ApplicationData)?;
        let tags = tlv::decode(&block)?;
        if let Some(ext_length) = tags.get(DataObject::ExtendedLength.tag()) {
            self.state.ext_length = ext_length.to_vec();
        }
        let Some(discretionary) = tags.get(DataObject::DiscretionaryData.tag()) else {
            return Ok(());
        };
        let tags = tlv::decode(discretionary)?;

        if let Some(capabilities) = tags.get(DataObject::ExtendedCapabilities.tag()) {
            self.state.ext_capabilities = capabilities.to_vec();
        }
        for role in KeyRole::ALL {
            if let Some(attribute) = tags.get(DataObject::Attributes(role).tag()) {
                self.state.key_mut(role).attribute = attribute.to_vec();
            }
        }
        if let Some(status) = tags.get(DataObject::PwStatus.tag()) {
            self.state.pw_status = status.to_vec();
        }

        // Fingerprint and date lists are positional, never nested TLV.
        if let Some(fingerprints) = tags.get(DataObject::Fingerprints.tag()) {
            for role in KeyRole::ALL {
                let offset = role.index() * 20;
                if let Some(chunk) = fingerprints.get(offset..offset + 20) {
                    self.state.key_mut(role).fingerprint = chunk.to_vec();
                }
            }
        }
        if let Some(fingerprints) = tags.get(DataObject::CaFingerprints.tag()) {
            for role in KeyRole::ALL {
                let offset = role.index() * 20;
                if let Some(chunk) = fingerprints.get(offset..offset + 20) {
                    self.state.key_mut(role).ca_fingerprint = chunk.to_vec();
                }
            }
        }
        if let Some(dates) = tags.get(DataObject::KeyDates.tag()) {
            for role in KeyRole::ALL {
                let offset = role.index() * 4;
                if dates.len() >= offset + 4 {
                    let epoch = i64::from(be_int(dates, offset, 4));
                    self.state.key_mut(role).creation_date =
                        OffsetDateTime::from_unix_timestamp(epoch).ok();
                }
            }
        }
        Ok(())
    }

    // ----- user profile -----

    /// Overwrite the serial number field of the AID (8 hex characters)
    pub fn set_serial(&mut self, serial: &str) -> CardResult<()> {
        let bytes = decode_serial(serial)?;
        if self.state.aid.len() < 20 {
            return Err(Error::usage("Invalid AID!"));
        }
        self.state.aid = format!("{}{}", &self.state.aid[..20], serial.to_uppercase());
        self.put_data(DataObject::Aid, &bytes)
    }

    /// Set the cardholder name
    pub fn set_name(&mut self, name: &str) -> CardResult<()> {
        self.state.name = name.to_string();
        self.put_data(DataObject::Name, name.as_bytes())
    }

    /// Set the login data
    pub fn set_login(&mut self, login: &str) -> CardResult<()> {
        self.state.login = login.to_string();
        self.put_data(DataObject::Login, login.as_bytes())
    }

    /// Set the public key URL
    pub fn set_url(&mut self, url: &str) -> CardResult<()> {
        self.state.url = url.to_string();
        self.put_data(DataObject::Url, url.as_bytes())
    }

    /// Set the language preferences
    pub fn set_lang(&mut self, lang: &str) -> CardResult<()> {
        self.state.lang = lang.to_string();
        self.put_data(DataObject::Language, lang.as_bytes())
    }

    /// Set the cardholder salutation
    pub fn set_salutation(&mut self, salutation: Salutation) -> CardResult<()> {
        self.state.salutation = salutation;
        self.put_data(DataObject::Salutation, &[salutation.code()])
    }

    /// Select the active key slot (zero-based)
    pub fn select_slot(&mut self, slot: u8) -> CardResult<()> {
        self.put_data(DataObject::SlotCurrent, &[slot])?;
        self.slot_current = slot;
        Ok(())
    }

    // ----- PIN interface -----

    /// VERIFY a PIN, optionally delegating entry to the reader pin-pad
    ///
    /// Returns whether the card accepted the PIN; a refusal is not an
    /// error and retry policy stays with the caller.
    pub fn verify_pin(&mut self, pw: Password, value: &str, pinpad: bool) -> CardResult<bool> {
        let command = if pinpad {
            Command::new_with_le(CLA_PINPAD, ins::VERIFY, 0x00, pw.reference(), 0x00)
        } else {
            Command::new_with_data(
                0x00,
                ins::VERIFY,
                0x00,
                pw.reference(),
                value.as_bytes().to_vec(),
            )
        };
        let response = self.executor.execute(&command)?;
        if let Some(tries) = response.status().pin_tries_remaining() {
            debug!(pw = ?pw, tries, "PIN refused");
        }
        Ok(response.is_success())
    }

    /// CHANGE REFERENCE DATA, replacing a PIN
    pub fn change_pin(&mut self, pw: Password, current: &str, new: &str) -> CardResult<bool> {
        let mut body = Vec::with_capacity(current.len() + new.len());
        body.extend_from_slice(current.as_bytes());
        body.extend_from_slice(new.as_bytes());
        let command = Command::new_with_data(
            0x00,
            ins::CHANGE_REFERENCE_DATA,
            0x00,
            pw.reference(),
            body,
        );
        let response = self.executor.execute(&command)?;
        Ok(response.is_success())
    }

    /// Set the PW1 resetting code
    pub fn set_resetting_code(&mut self, code: &str) -> CardResult<()> {
        self.put_data(DataObject::ResetCode, code.as_bytes())
    }

    /// RESET RETRY COUNTER: reset PW1 with the resetting code
    ///
    /// With an empty resetting code the command relies on a verified
    /// PW3 instead (P1 = 0x02).
    pub fn reset_user_pin(&mut self, resetting_code: &str, new_pin: &str) -> CardResult<bool> {
        let p1 = if resetting_code.is_empty() { 0x02 } else { 0x00 };
        let mut body = Vec::with_capacity(resetting_code.len() + new_pin.len());
        body.extend_from_slice(resetting_code.as_bytes());
        body.extend_from_slice(new_pin.as_bytes());
        let command = Command::new_with_data(
            0x00,
            ins::RESET_RETRY_COUNTER,
            p1,
            Password::Pw1.reference(),
            body,
        );
        let response = self.executor.execute(&command)?;
        Ok(response.is_success())
    }

    // ----- key interface -----

    /// Write a key algorithm attribute template
    pub fn set_template(&mut self, role: KeyRole, template: KeyTemplate) -> CardResult<()> {
        let bytes = template.attribute_bytes();
        self.state.key_mut(role).attribute = bytes.to_vec();
        self.put_data(DataObject::Attributes(role), bytes)
    }

    /// Write a key fingerprint
    pub fn set_key_fingerprint(&mut self, role: KeyRole, fingerprint: &[u8; 20]) -> CardResult<()> {
        self.state.key_mut(role).fingerprint = fingerprint.to_vec();
        self.put_data(DataObject::FingerprintWrite(role), fingerprint)
    }

    /// GENERATE ASYMMETRIC KEY PAIR or read back the public part
    ///
    /// On Generate for an RSA role, the creation date is written to the
    /// card first, then the RFC 4880 fingerprint is derived from it and
    /// written through, so card and fingerprint always agree.
    pub fn asymmetric_key(&mut self, role: KeyRole, op: KeyOperation) -> CardResult<PublicKey> {
        let attribute = self.state.key(role).attribute.clone();
        let algorithm = attribute
            .first()
            .and_then(|&id| PubkeyAlgorithm::from_id(id))
            .ok_or_else(|| Error::usage("Invalid key attribute!"))?;

        let key_tag = DataObject::KeyBlob(role).tag() as u8;
        let command = Command::new_with_data(
            0x00,
            ins::GENERATE_ASYMMETRIC_KEYPAIR,
            op as u8,
            0x00,
            vec![key_tag, 0x00],
        );
        let response = self.executor.execute_success(&command)?;

        let outer = tlv::decode(response.payload())?;
        let template = outer
            .get(DataObject::PublicKey.tag())
            .ok_or(Error::Tlv("missing public key template"))?;
        let tags = tlv::decode(template)?;

        if algorithm != PubkeyAlgorithm::Rsa {
            let oid = tags
                .get(0x86)
                .ok_or(Error::Tlv("missing curve OID"))?
                .to_vec();
            return Ok(PublicKey::Ec { algorithm, oid });
        }

        let modulus = tags
            .get(0x81)
            .ok_or(Error::Tlv("missing RSA modulus"))?
            .to_vec();
        let exponent = tags
            .get(0x82)
            .ok_or(Error::Tlv("missing RSA exponent"))?
            .to_vec();

        if op == KeyOperation::Generate {
            self.set_key_date_now(role)?;
        }
        let created = self
            .state
            .key(role)
            .creation_date
            .unwrap_or(OffsetDateTime::UNIX_EPOCH);

        let bit_length = be_int(&attribute, 1, 2) as u16;
        let fingerprint = rsa_fingerprint(&modulus, bit_length, created.unix_timestamp() as u32);
        if op == KeyOperation::Generate {
            self.set_key_fingerprint(role, &fingerprint)?;
        }

        Ok(PublicKey::Rsa {
            bit_length,
            modulus,
            exponent,
            created,
            fingerprint,
        })
    }

    /// Regenerate all three key pairs from the device seed
    pub fn seed_key(&mut self) -> CardResult<()> {
        for role in KeyRole::ALL {
            let key_tag = DataObject::KeyBlob(role).tag() as u8;
            let command = Command::new_with_data(
                0x00,
                ins::GENERATE_ASYMMETRIC_KEYPAIR,
                KeyOperation::Generate as u8,
                0x01,
                vec![key_tag, 0x00],
            );
            self.executor.execute_success(&command)?;
        }
        Ok(())
    }

    /// PSO:CDS, signing a digest with the signature key
    pub fn sign_digest(&mut self, digest: &[u8]) -> CardResult<Bytes> {
        let command = Command::new_with_data(
            0x00,
            ins::PERFORM_SECURITY_OPERATION,
            0x9E,
            0x9A,
            digest.to_vec(),
        )
        .with_le(0x00);
        let response = self.executor.execute_success(&command)?;
        Ok(response.payload().clone())
    }

    /// GET CHALLENGE: random bytes from the card
    pub fn get_challenge(&mut self, length: u8) -> CardResult<Bytes> {
        let command = Command::new_with_le(0x00, ins::GET_CHALLENGE, 0x00, 0x00, length);
        let response = self.executor.execute_success(&command)?;
        Ok(response.payload().clone())
    }

    fn set_key_date_now(&mut self, role: KeyRole) -> CardResult<()> {
        let now = OffsetDateTime::now_utc();
        // Seconds resolution: the card stores a 32-bit epoch value.
        let now = OffsetDateTime::from_unix_timestamp(now.unix_timestamp())
            .unwrap_or(OffsetDateTime::UNIX_EPOCH);
        self.state.key_mut(role).creation_date = Some(now);
        let epoch = (now.unix_timestamp() as u32).to_be_bytes();
        self.put_data(DataObject::DateWrite(role), &epoch)
    }

    pub(crate) fn put_key_date(&mut self, role: KeyRole, date: OffsetDateTime) -> CardResult<()> {
        let epoch = (date.unix_timestamp() as u32).to_be_bytes();
        self.put_data(DataObject::DateWrite(role), &epoch)
    }

    pub(crate) fn state_mut(&mut self) -> &mut CardState {
        &mut self.state
    }
}

fn decode_utf8(data: &[u8]) -> String {
    String::from_utf8_lossy(data).into_owned()
}

fn decode_serial(serial: &str) -> CardResult<Vec<u8>> {
    if serial.len() != 8 {
        return Err(Error::usage(
            "Serial must be a 4 bytes hex string value (8 characters)",
        ));
    }
    hex::decode(serial).map_err(|_| {
        Error::usage("Serial must be a 4 bytes hex string value (8 characters)")
    })
}
