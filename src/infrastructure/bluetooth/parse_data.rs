//! Binary Field Decoding
//!
//! Fixed-width field readers used by the EEPROM decoder and the spectrum
//! packet parser. Every reader takes a buffer and a byte offset and returns
//! `None` when the field would run past the end of the buffer.

/// Read an unsigned byte
pub fn to_u8(buf: &[u8], offset: usize) -> Option<u8> {
    buf.get(offset).copied()
}

/// Read a boolean flag (any non-zero byte is true)
pub fn to_bool(buf: &[u8], offset: usize) -> Option<bool> {
    to_u8(buf, offset).map(|b| b != 0)
}

fn array<const N: usize>(buf: &[u8], offset: usize) -> Option<[u8; N]> {
    let end = offset.checked_add(N)?;
    buf.get(offset..end)?.try_into().ok()
}

/// Read a little-endian u16
pub fn to_u16(buf: &[u8], offset: usize) -> Option<u16> {
    array(buf, offset).map(u16::from_le_bytes)
}

/// Read a big-endian u16
pub fn to_u16_be(buf: &[u8], offset: usize) -> Option<u16> {
    array(buf, offset).map(u16::from_be_bytes)
}

/// Read a little-endian i16
pub fn to_i16(buf: &[u8], offset: usize) -> Option<i16> {
    array(buf, offset).map(i16::from_le_bytes)
}

/// Read a big-endian i16
pub fn to_i16_be(buf: &[u8], offset: usize) -> Option<i16> {
    array(buf, offset).map(i16::from_be_bytes)
}

/// Read a little-endian u32
pub fn to_u32(buf: &[u8], offset: usize) -> Option<u32> {
    array(buf, offset).map(u32::from_le_bytes)
}

/// Read a little-endian IEEE-754 f32
pub fn to_f32(buf: &[u8], offset: usize) -> Option<f32> {
    array(buf, offset).map(f32::from_le_bytes)
}

/// Read a fixed-length ASCII string.
///
/// The field is cut at the first NUL byte, non-printable bytes are dropped and
/// surrounding whitespace is trimmed. Returns `None` if the field is out of range.
pub fn to_string(buf: &[u8], offset: usize, len: usize) -> Option<String> {
    let end = offset.checked_add(len)?;
    let raw = buf.get(offset..end)?;
    let text: String = raw
        .iter()
        .take_while(|&&b| b != 0)
        .filter(|b| b.is_ascii_graphic() || **b == b' ')
        .map(|&b| b as char)
        .collect();
    Some(text.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_endianness() {
        let buf = [0x34, 0x12, 0xFF, 0xFF];
        assert_eq!(to_u16(&buf, 0), Some(0x1234));
        assert_eq!(to_u16_be(&buf, 0), Some(0x3412));
        assert_eq!(to_i16(&buf, 2), Some(-1));
        assert_eq!(to_u32(&buf, 0), Some(0xFFFF_1234));
    }

    #[test]
    fn test_out_of_range() {
        let buf = [0u8; 4];
        assert_eq!(to_u16(&buf, 3), None);
        assert_eq!(to_f32(&buf, 1), None);
        assert_eq!(to_string(&buf, 2, 8), None);
        assert_eq!(to_u8(&buf, usize::MAX), None);
    }

    #[test]
    fn test_float() {
        let buf = 24.5f32.to_le_bytes();
        assert_eq!(to_f32(&buf, 0), Some(24.5));
    }

    #[test]
    fn test_string_stops_at_nul() {
        let mut buf = [0u8; 16];
        buf[..6].copy_from_slice(b"WP-785");
        buf[7] = b'X';
        assert_eq!(to_string(&buf, 0, 16).as_deref(), Some("WP-785"));
    }
}
