use crate::WireError;

const MAX_VARINT_LEN: usize = 10;

/// Append `value` as a little-endian base-128 varint.
pub fn encode_varint(mut value: u64, buf: &mut Vec<u8>) {
    while value >= 0x80 {
        buf.push((value as u8 & 0x7f) | 0x80);
        value >>= 7;
    }
    buf.push(value as u8);
}

/// Decode a varint from the start of `bytes`.
///
/// Returns the value and the number of bytes consumed.
pub fn decode_varint(bytes: &[u8]) -> Result<(u64, usize), WireError> {
    let mut value: u64 = 0;
    for (idx, byte) in bytes.iter().copied().enumerate() {
        if idx >= MAX_VARINT_LEN {
            return Err(WireError::VarintOverflow(0));
        }
        value |= u64::from(byte & 0x7f) << (7 * idx);
        if byte & 0x80 == 0 {
            return Ok((value, idx + 1));
        }
    }
    if bytes.len() >= MAX_VARINT_LEN {
        Err(WireError::VarintOverflow(0))
    } else {
        Err(WireError::Truncated(bytes.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_byte_values_encode_verbatim() {
        let mut buf = Vec::new();
        encode_varint(1, &mut buf);
        encode_varint(127, &mut buf);
        assert_eq!(buf, vec![0x01, 0x7f]);
    }

    #[test]
    fn multi_byte_value_sets_continuation_bit() {
        let mut buf = Vec::new();
        encode_varint(300, &mut buf);
        assert_eq!(buf, vec![0xac, 0x02]);
        assert_eq!(decode_varint(&buf), Ok((300, 2)));
    }

    #[test]
    fn decode_ignores_trailing_bytes() {
        assert_eq!(decode_varint(&[0x96, 0x01, 0xff]), Ok((150, 2)));
    }

    #[test]
    fn u64_max_uses_ten_bytes() {
        let mut buf = Vec::new();
        encode_varint(u64::MAX, &mut buf);
        assert_eq!(buf.len(), 10);
        assert_eq!(decode_varint(&buf), Ok((u64::MAX, 10)));
    }

    #[test]
    fn unterminated_varint_is_truncated() {
        assert_eq!(decode_varint(&[0x80, 0x80]), Err(WireError::Truncated(2)));
        assert_eq!(decode_varint(&[]), Err(WireError::Truncated(0)));
    }

    #[test]
    fn overlong_varint_is_rejected() {
        let bytes = [0xffu8; 11];
        assert_eq!(decode_varint(&bytes), Err(WireError::VarintOverflow(0)));
    }
}
