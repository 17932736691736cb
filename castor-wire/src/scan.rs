use crate::{WireError, WireType, varint::decode_varint};

/// One field of a flat message, borrowed from the source buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field<'a> {
    pub number: u32,
    pub wire_type: WireType,
    /// The full encoded field (tag included), as it appeared in the source.
    pub raw: &'a [u8],
    /// The field payload without tag or length prefix.
    pub payload: &'a [u8],
}

/// Iterator over the top-level fields of an encoded message.
///
/// Stops at the first malformed field and yields the error once.
#[derive(Debug, Clone)]
pub struct Fields<'a> {
    bytes: &'a [u8],
    offset: usize,
    failed: bool,
}

impl<'a> Fields<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            offset: 0,
            failed: false,
        }
    }

    fn read_varint(&self, at: usize) -> Result<(u64, usize), WireError> {
        decode_varint(&self.bytes[at..]).map_err(|e| match e {
            WireError::Truncated(_) => WireError::Truncated(self.bytes.len()),
            WireError::VarintOverflow(_) => WireError::VarintOverflow(at),
            other => other,
        })
    }

    fn span_end(&self, at: usize, len: u64) -> Result<usize, WireError> {
        let len = usize::try_from(len).map_err(|_| WireError::Truncated(self.bytes.len()))?;
        let end = at
            .checked_add(len)
            .filter(|end| *end <= self.bytes.len())
            .ok_or(WireError::Truncated(self.bytes.len()))?;
        Ok(end)
    }

    fn next_field(&mut self) -> Result<Field<'a>, WireError> {
        let start = self.offset;
        let (key, key_len) = self.read_varint(start)?;
        let wire_type = WireType::try_from((key & 0x07) as u8)?;
        let number = u32::try_from(key >> 3).map_err(|_| WireError::VarintOverflow(start))?;
        if number == 0 {
            return Err(WireError::ZeroFieldNumber);
        }

        let body = start + key_len;
        let (payload_start, end) = match wire_type {
            WireType::Varint => {
                let (_, len) = self.read_varint(body)?;
                (body, body + len)
            }
            WireType::Fixed64 => (body, self.span_end(body, 8)?),
            WireType::Fixed32 => (body, self.span_end(body, 4)?),
            WireType::LengthDelimited => {
                let (len, len_len) = self.read_varint(body)?;
                let payload_start = body + len_len;
                (payload_start, self.span_end(payload_start, len)?)
            }
        };

        self.offset = end;
        Ok(Field {
            number,
            wire_type,
            raw: &self.bytes[start..end],
            payload: &self.bytes[payload_start..end],
        })
    }
}

impl<'a> Iterator for Fields<'a> {
    type Item = Result<Field<'a>, WireError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.offset >= self.bytes.len() {
            return None;
        }
        let field = self.next_field();
        self.failed = field.is_err();
        Some(field)
    }
}

/// Drop every top-level occurrence of `field_number`, keeping all other
/// fields byte-identical and in their original order.
pub fn strip_field(message: &[u8], field_number: u32) -> Result<Vec<u8>, WireError> {
    replace_fields(message, &[field_number], &[])
}

/// Strip all `strip` field numbers in one pass, then append `append`.
pub fn replace_fields(message: &[u8], strip: &[u32], append: &[u8]) -> Result<Vec<u8>, WireError> {
    let mut out = Vec::with_capacity(message.len() + append.len());
    for field in Fields::new(message) {
        let field = field?;
        if !strip.contains(&field.number) {
            out.extend_from_slice(field.raw);
        }
    }
    out.extend_from_slice(append);
    Ok(out)
}

/// First length-delimited field `field_number`, decoded as UTF-8.
pub fn find_string(message: &[u8], field_number: u32) -> Result<Option<String>, WireError> {
    for field in Fields::new(message) {
        let field = field?;
        if field.number == field_number && field.wire_type == WireType::LengthDelimited {
            return String::from_utf8(field.payload.to_vec())
                .map(Some)
                .map_err(|_| WireError::InvalidUtf8(field_number));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MessageBuilder;

    fn sample() -> Vec<u8> {
        MessageBuilder::new()
            .string(1, "user-1")
            .varint(3, 42)
            .string(2, "old@example.com")
            .bytes(6, &[0x0a, 0x01, b'x'])
            .string(9, "keep me")
            .finish()
    }

    fn numbers(message: &[u8]) -> Vec<u32> {
        Fields::new(message)
            .map(|f| f.expect("valid field").number)
            .collect()
    }

    #[test]
    fn iterates_all_supported_wire_types() {
        let mut bytes = MessageBuilder::new().varint(1, 7).finish();
        bytes.extend_from_slice(&[0x11, 1, 2, 3, 4, 5, 6, 7, 8]); // field 2, fixed64
        bytes.extend_from_slice(&[0x1d, 1, 2, 3, 4]); // field 3, fixed32
        bytes.extend(MessageBuilder::new().string(4, "s").finish());

        let fields: Vec<_> = Fields::new(&bytes).collect::<Result<_, _>>().unwrap();
        assert_eq!(fields.len(), 4);
        assert_eq!(fields[1].wire_type, WireType::Fixed64);
        assert_eq!(fields[1].payload.len(), 8);
        assert_eq!(fields[2].payload, &[1, 2, 3, 4]);
        assert_eq!(fields[3].payload, b"s");
    }

    #[test]
    fn unknown_wire_type_is_an_error() {
        // field 1, wire type 3 (start group)
        let err = strip_field(&[0x0b, 0x00], 2).unwrap_err();
        assert_eq!(err, WireError::UnsupportedWireType(3));
    }

    #[test]
    fn truncated_length_delimited_payload_is_an_error() {
        let err = strip_field(&[0x12, 0x05, b'a'], 1).unwrap_err();
        assert!(matches!(err, WireError::Truncated(_)));
    }

    #[test]
    fn strip_preserves_order_of_other_fields() {
        let stripped = strip_field(&sample(), 2).unwrap();
        assert_eq!(numbers(&stripped), vec![1, 3, 6, 9]);

        let expected = MessageBuilder::new()
            .string(1, "user-1")
            .varint(3, 42)
            .bytes(6, &[0x0a, 0x01, b'x'])
            .string(9, "keep me")
            .finish();
        assert_eq!(stripped, expected);
    }

    #[test]
    fn strip_is_idempotent() {
        let once = strip_field(&sample(), 6).unwrap();
        let twice = strip_field(&once, 6).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn strip_of_absent_field_returns_input() {
        let input = sample();
        assert_eq!(strip_field(&input, 42).unwrap(), input);
    }

    #[test]
    fn strip_removes_repeated_occurrences() {
        let bytes = MessageBuilder::new()
            .string(2, "a")
            .varint(5, 1)
            .string(2, "b")
            .finish();
        assert_eq!(numbers(&strip_field(&bytes, 2).unwrap()), vec![5]);
    }

    #[test]
    fn replace_then_decode_yields_new_value_and_untouched_rest() {
        let original = sample();
        let append = MessageBuilder::new().string(2, "new@example.com").finish();
        let replaced = replace_fields(&original, &[1, 2, 6], &append).unwrap();

        assert_eq!(
            find_string(&replaced, 2).unwrap().as_deref(),
            Some("new@example.com")
        );
        assert_eq!(find_string(&replaced, 9).unwrap().as_deref(), Some("keep me"));
        assert_eq!(numbers(&replaced), vec![3, 9, 2]);

        let kept: Vec<_> = Fields::new(&original)
            .map(Result::unwrap)
            .filter(|f| f.number == 3 || f.number == 9)
            .map(|f| f.raw.to_vec())
            .collect();
        let after: Vec<_> = Fields::new(&replaced)
            .map(Result::unwrap)
            .filter(|f| f.number == 3 || f.number == 9)
            .map(|f| f.raw.to_vec())
            .collect();
        assert_eq!(kept, after);
    }

    #[test]
    fn empty_message_has_no_fields() {
        assert!(Fields::new(&[]).next().is_none());
        assert_eq!(find_string(&[], 1).unwrap(), None);
    }
}
