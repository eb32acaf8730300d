//! BER-TLV codec for card data objects
//!
//! The card uses a restricted BER profile: tags are one byte, or two
//! bytes when the low five bits of the first byte are all ones; lengths
//! use the short form or the one- and two-byte long forms. Anything
//! else fails closed.
//!
//! Several objects nest a TLV block inside a value (application data
//! 0x6E carries discretionary data 0x73, itself TLV-coded); callers
//! decode the outer block and recurse on the extracted value.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Error, Result};

/// Tag/value directory preserving first-encounter order
///
/// Duplicate tags overwrite the value in place, keeping the original
/// position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlvMap {
    entries: Vec<(u16, Bytes)>,
}

impl TlvMap {
    /// Create an empty map
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Look up a value by tag
    pub fn get(&self, tag: u16) -> Option<&Bytes> {
        self.entries
            .iter()
            .find(|(t, _)| *t == tag)
            .map(|(_, v)| v)
    }

    /// Insert a value, overwriting an existing tag in place
    pub fn insert(&mut self, tag: u16, value: impl Into<Bytes>) {
        let value = value.into();
        match self.entries.iter_mut().find(|(t, _)| *t == tag) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((tag, value)),
        }
    }

    /// Whether the map holds the given tag
    pub fn contains(&self, tag: u16) -> bool {
        self.get(tag).is_some()
    }

    /// Iterate over entries in encounter order
    pub fn iter(&self) -> impl Iterator<Item = (u16, &Bytes)> {
        self.entries.iter().map(|(t, v)| (*t, v))
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Decode a TLV block, consuming it entirely
pub fn decode(block: &[u8]) -> Result<TlvMap> {
    let mut map = TlvMap::new();
    let mut rest = block;

    while !rest.is_empty() {
        let (tag, after_tag) = decode_tag(rest)?;
        let (length, after_length) = decode_length(after_tag)?;
        if after_length.len() < length {
            return Err(Error::Tlv("value extends past end of block"));
        }
        let (value, tail) = after_length.split_at(length);
        map.insert(tag, Bytes::copy_from_slice(value));
        rest = tail;
    }

    Ok(map)
}

fn decode_tag(data: &[u8]) -> Result<(u16, &[u8])> {
    match data {
        [first, second, rest @ ..] if first & 0x1F == 0x1F => {
            Ok((u16::from_be_bytes([*first, *second]), rest))
        }
        [first, ..] if first & 0x1F == 0x1F => Err(Error::Tlv("truncated two-byte tag")),
        [first, rest @ ..] => Ok((u16::from(*first), rest)),
        [] => Err(Error::Tlv("empty block")),
    }
}

fn decode_length(data: &[u8]) -> Result<(usize, &[u8])> {
    match data {
        [first, rest @ ..] if first & 0x80 == 0 => Ok((usize::from(*first), rest)),
        [0x81, length, rest @ ..] => Ok((usize::from(*length), rest)),
        [0x82, hi, lo, rest @ ..] => Ok((usize::from(u16::from_be_bytes([*hi, *lo])), rest)),
        [0x81] | [0x82, ..] => Err(Error::Tlv("truncated long-form length")),
        [_, ..] => Err(Error::Tlv("unsupported long-form length")),
        [] => Err(Error::Tlv("missing length")),
    }
}

/// Encode entries back into a TLV block
///
/// Tags above 0xFF are written as two bytes; lengths use the minimal
/// form.
pub fn encode<'a, I>(entries: I) -> Bytes
where
    I: IntoIterator<Item = (u16, &'a [u8])>,
{
    let mut buf = BytesMut::new();
    for (tag, value) in entries {
        if tag > 0xFF {
            buf.put_u16(tag);
        } else {
            buf.put_u8(tag as u8);
        }
        match value.len() {
            n if n < 0x80 => buf.put_u8(n as u8),
            n if n <= 0xFF => {
                buf.put_u8(0x81);
                buf.put_u8(n as u8);
            }
            n => {
                buf.put_u8(0x82);
                buf.put_u16(n as u16);
            }
        }
        buf.put_slice(value);
    }
    buf.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_one_byte_tag_short_length() {
        let map = decode(&[0x5B, 0x03, 0x41, 0x42, 0x43]).unwrap();
        assert_eq!(map.get(0x5B).unwrap().as_ref(), b"ABC");
    }

    #[test]
    fn test_decode_two_byte_tag() {
        // 0x5F low five bits are all ones, so the tag spans two bytes.
        let map = decode(&[0x5F, 0x50, 0x02, 0x68, 0x69]).unwrap();
        assert_eq!(map.get(0x5F50).unwrap().as_ref(), b"hi");
    }

    #[test]
    fn test_decode_long_form_lengths() {
        let mut block = vec![0x7F, 0x21, 0x81, 0xA0];
        block.extend(std::iter::repeat_n(0x55, 0xA0));
        let map = decode(&block).unwrap();
        assert_eq!(map.get(0x7F21).unwrap().len(), 0xA0);

        let mut block = vec![0x7F, 0x21, 0x82, 0x01, 0x10];
        block.extend(std::iter::repeat_n(0xAA, 0x0110));
        let map = decode(&block).unwrap();
        assert_eq!(map.get(0x7F21).unwrap().len(), 0x0110);
    }

    #[test]
    fn test_unsupported_length_forms_fail_closed() {
        assert!(matches!(
            decode(&[0x4F, 0x83, 0x01, 0x02, 0x03, 0x00]),
            Err(Error::Tlv(_))
        ));
        assert!(matches!(decode(&[0x4F, 0x80, 0x00]), Err(Error::Tlv(_))));
    }

    #[test]
    fn test_truncated_blocks_fail_closed() {
        assert!(decode(&[0x4F]).is_err());
        assert!(decode(&[0x4F, 0x05, 0x01]).is_err());
        assert!(decode(&[0x5F]).is_err());
        assert!(decode(&[0x4F, 0x81]).is_err());
        assert!(decode(&[0x4F, 0x82, 0x01]).is_err());
    }

    #[test]
    fn test_duplicate_tag_overwrites_in_place() {
        let map = decode(&[0x4F, 0x01, 0xAA, 0x5E, 0x01, 0x01, 0x4F, 0x01, 0xBB]).unwrap();
        assert_eq!(map.len(), 2);
        let tags: Vec<u16> = map.iter().map(|(t, _)| t).collect();
        assert_eq!(tags, vec![0x4F, 0x5E]);
        assert_eq!(map.get(0x4F).unwrap().as_ref(), &[0xBB]);
    }

    #[test]
    fn test_round_trip() {
        let long_value = vec![0x77u8; 0x123];
        let entries: Vec<(u16, &[u8])> = vec![
            (0x4F, &[0xD2, 0x76]),
            (0x5F2D, b"fr"),
            (0x7F21, &long_value),
            (0x93, &[0x00, 0x00, 0x07]),
        ];
        let block = encode(entries.iter().map(|(t, v)| (*t, *v)));
        let map = decode(&block).unwrap();
        assert_eq!(map.len(), entries.len());
        for (tag, value) in entries {
            assert_eq!(map.get(tag).unwrap().as_ref(), value);
        }
    }

    #[test]
    fn test_nested_decode_matches_direct_decode() {
        let inner: &[u8] = &[0xC0, 0x02, 0x78, 0x00, 0xC4, 0x01, 0x01];
        let outer = encode([(0x73u16, inner)]);
        let outer_map = decode(&outer).unwrap();
        let nested = decode(outer_map.get(0x73).unwrap()).unwrap();
        assert_eq!(nested, decode(inner).unwrap());
    }
}
