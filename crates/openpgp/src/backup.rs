//! Backup and restore of the full card configuration
//!
//! The on-disk container is an explicit, versioned binary record: a
//! `PGPB` magic, a big-endian `u16` version, then every field of the
//! card state in a fixed order, length-prefixed where variable. Unknown
//! magic or version is rejected outright, never guessed at.
//!
//! Restore replays the record through PUT DATA in a fixed order because
//! later writes depend on earlier ones being committed card-side (key
//! dates require key presence, certificate slots advance sequentially).
//! A write failure aborts the remaining sequence; there is no rollback,
//! the card keeps whatever the completed prefix produced.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use pgpcard_apdu_core::CardTransport;
use tracing::info;

use crate::card::OpenPgpCard;
use crate::constants::Salutation;
use crate::data_object::DataObject;
use crate::error::{Error, Result};
use crate::state::{CardState, KeyInfo, KeyRole, Uif, parse_date};

const MAGIC: &[u8; 4] = b"PGPB";
const VERSION: u16 = 1;

// Cap on any single length-prefixed field.
const MAX_FIELD: usize = 1 << 24;

/// Snapshot the live card state into a new backup file
///
/// Always runs a full read cycle first, so the file reflects the card
/// at backup time, never a stale snapshot. Refuses to overwrite an
/// existing file.
pub fn backup<T: CardTransport>(card: &mut OpenPgpCard<T>, path: &Path) -> Result<()> {
    card.get_all()?;
    write_file(card.state(), path)?;
    info!(path = %path.display(), "Configuration saved");
    Ok(())
}

/// Restore a backup file onto the card
///
/// Deserializes the container, then replays every field through PUT
/// DATA in the fixed dependency order.
pub fn restore<T: CardTransport>(card: &mut OpenPgpCard<T>, path: &Path) -> Result<()> {
    let contents = fs::read(path)?;
    let state = deserialize_state(&contents)?;
    *card.state_mut() = state.clone();

    // Serial number (last 4 AID bytes) and password status first.
    let serial = state
        .serial()
        .ok_or_else(|| Error::backup("AID too short for a serial number"))?;
    let serial = hex::decode(serial)
        .map_err(|_| Error::backup("AID serial field is not hex"))?;
    card.put_data(DataObject::Aid, &serial)?;
    card.put_data(DataObject::PwStatus, &state.pw_status)?;

    for index in 0..4u8 {
        card.put_data(
            DataObject::Private(index + 1),
            &state.privates[usize::from(index)],
        )?;
    }

    card.put_data(DataObject::Name, state.name.as_bytes())?;
    card.put_data(DataObject::Login, state.login.as_bytes())?;
    card.put_data(DataObject::Language, state.lang.as_bytes())?;
    card.put_data(DataObject::Url, state.url.as_bytes())?;
    // Absent salutation still writes the "unspecified" code.
    card.put_data(DataObject::Salutation, &[state.salutation.code()])?;

    for role in KeyRole::ALL {
        card.put_data(DataObject::Attributes(role), &state.key(role).attribute)?;
    }
    for role in KeyRole::ALL {
        // The card stores the flag as two little-endian bytes.
        let uif = [state.key(role).uif.as_byte(), 0x00];
        card.put_data(DataObject::Uif(role), &uif)?;
    }

    card.put_data(
        DataObject::SignatureCounter,
        &state.digital_counter.to_be_bytes(),
    )?;
    card.put_data(DataObject::RsaExponent, &state.rsa_pub_exp.to_le_bytes())?;

    // Certificate slots advance sequentially: AUT, DEC, SIG.
    card.put_data(DataObject::Certificate, state.aut.certificate.as_bytes())?;
    card.put_data(DataObject::Certificate, state.dec.certificate.as_bytes())?;
    card.put_data(DataObject::Certificate, state.sig.certificate.as_bytes())?;

    for role in KeyRole::ALL {
        let key = state.key(role).clone();
        card.put_data(DataObject::CaFingerprintWrite(role), &key.ca_fingerprint)?;
        card.put_data(DataObject::FingerprintWrite(role), &key.fingerprint)?;
        match key.creation_date {
            Some(date) => card.put_key_date(role, date)?,
            None => card.put_data(DataObject::DateWrite(role), &[0u8; 4])?,
        }
        card.put_data(DataObject::KeyBlob(role), &key.key_material)?;
    }

    info!(path = %path.display(), "Configuration restored");
    Ok(())
}

fn write_file(state: &CardState, path: &Path) -> Result<()> {
    let contents = serialize_state(state);
    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    match options.open(path) {
        Ok(file) => {
            use std::io::Write;
            let mut file = file;
            file.write_all(&contents)?;
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(Error::backup(format!(
            "Backup file '{}' already exists",
            path.display()
        ))),
        Err(e) => Err(e.into()),
    }
}

/// Serialize a card state into the versioned container
pub fn serialize_state(state: &CardState) -> Vec<u8> {
    let mut w = Writer::new();
    w.bytes_field(state.aid.as_bytes());
    w.bytes_field(&state.pw_status);
    w.u32(state.rsa_pub_exp);
    w.u32(state.digital_counter);
    for private in &state.privates {
        w.bytes_field(private);
    }
    w.bytes_field(state.name.as_bytes());
    w.bytes_field(state.login.as_bytes());
    w.u8(state.salutation.code());
    w.bytes_field(state.url.as_bytes());
    w.bytes_field(state.lang.as_bytes());
    for role in KeyRole::ALL {
        let key = state.key(role);
        w.bytes_field(&key.key_material);
        w.u8(key.uif.as_byte());
        w.bytes_field(&key.attribute);
        w.bytes_field(key.creation_date_string().as_bytes());
        w.bytes_field(&key.fingerprint);
        w.bytes_field(&key.ca_fingerprint);
        w.bytes_field(key.certificate.as_bytes());
    }
    w.finish()
}

/// Deserialize a container back into a card state
///
/// Rejects unknown magic or version and any malformed field, including
/// a creation-date string that does not parse back to a timestamp.
pub fn deserialize_state(contents: &[u8]) -> Result<CardState> {
    let mut r = Reader::new(contents)?;
    let mut state = CardState::new();

    state.aid = r.string_field()?;
    state.pw_status = r.bytes_field()?;
    state.rsa_pub_exp = r.u32()?;
    state.digital_counter = r.u32()?;
    for index in 0..4 {
        state.privates[index] = r.bytes_field()?;
    }
    state.name = r.string_field()?;
    state.login = r.string_field()?;
    state.salutation = Salutation::from_code(r.u8()?);
    state.url = r.string_field()?;
    state.lang = r.string_field()?;
    for role in KeyRole::ALL {
        let key_material = r.bytes_field()?;
        let uif = Uif::from_byte(r.u8()?);
        let attribute = r.bytes_field()?;
        let date = r.string_field()?;
        let creation_date = if date.is_empty() {
            None
        } else {
            Some(parse_date(&date)?)
        };
        let fingerprint = r.bytes_field()?;
        let ca_fingerprint = r.bytes_field()?;
        let certificate = r.string_field()?;
        *state.key_mut(role) = KeyInfo {
            attribute,
            fingerprint,
            ca_fingerprint,
            certificate,
            creation_date,
            uif,
            key_material,
        };
    }
    r.finish()?;

    Ok(state)
}

struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    fn new() -> Self {
        let mut buf = Vec::with_capacity(256);
        buf.extend_from_slice(MAGIC);
        buf.extend_from_slice(&VERSION.to_be_bytes());
        Self { buf }
    }

    fn u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    fn u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    fn bytes_field(&mut self, value: &[u8]) {
        self.u32(value.len() as u32);
        self.buf.extend_from_slice(value);
    }

    fn finish(self) -> Vec<u8> {
        self.buf
    }
}

struct Reader<'a> {
    rest: &'a [u8],
}

impl<'a> Reader<'a> {
    fn new(contents: &'a [u8]) -> Result<Self> {
        let Some((magic, rest)) = contents.split_at_checked(4) else {
            return Err(Error::backup("File too short for a backup container"));
        };
        if magic != MAGIC {
            return Err(Error::backup("Not a backup container (bad magic)"));
        }
        let mut reader = Self { rest };
        let version = reader.u16()?;
        if version != VERSION {
            return Err(Error::backup(format!(
                "Unsupported backup version {version}"
            )));
        }
        Ok(reader)
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let Some((field, rest)) = self.rest.split_at_checked(n) else {
            return Err(Error::backup("Truncated backup container"));
        };
        self.rest = rest;
        Ok(field)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16> {
        let field = self.take(2)?;
        Ok(u16::from_be_bytes([field[0], field[1]]))
    }

    fn u32(&mut self) -> Result<u32> {
        let field = self.take(4)?;
        Ok(u32::from_be_bytes([field[0], field[1], field[2], field[3]]))
    }

    fn bytes_field(&mut self) -> Result<Vec<u8>> {
        let length = self.u32()? as usize;
        if length > MAX_FIELD {
            return Err(Error::backup("Oversized backup field"));
        }
        Ok(self.take(length)?.to_vec())
    }

    fn string_field(&mut self) -> Result<String> {
        String::from_utf8(self.bytes_field()?)
            .map_err(|_| Error::backup("Backup string field is not UTF-8"))
    }

    fn finish(&self) -> Result<()> {
        if self.rest.is_empty() {
            Ok(())
        } else {
            Err(Error::backup("Trailing bytes after backup record"))
        }
    }
}
