//! Small helpers for big-endian field extraction

/// Read a `size`-byte (2 to 4) big-endian integer at `offset`
///
/// Returns 0 when the buffer is too short, matching the card's habit of
/// omitting optional trailing fields.
pub(crate) fn be_int(buffer: &[u8], offset: usize, size: usize) -> u32 {
    let Some(field) = buffer.get(offset..offset + size) else {
        return 0;
    };
    field.iter().fold(0u32, |acc, &b| (acc << 8) | u32::from(b))
}

#[cfg(test)]
mod tests {
    use super::be_int;

    #[test]
    fn test_be_int() {
        let buf = [0x01, 0x02, 0x03, 0x04, 0x05];
        assert_eq!(be_int(&buf, 0, 2), 0x0102);
        assert_eq!(be_int(&buf, 1, 3), 0x020304);
        assert_eq!(be_int(&buf, 1, 4), 0x02030405);
        assert_eq!(be_int(&buf, 4, 2), 0);
    }
}
