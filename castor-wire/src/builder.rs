use crate::{WireType, tag, varint::encode_varint};

/// Append-only encoder for a flat protobuf message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageBuilder {
    buf: Vec<u8>,
}

impl MessageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn varint(mut self, field_number: u32, value: u64) -> Self {
        encode_varint(tag(field_number, WireType::Varint), &mut self.buf);
        encode_varint(value, &mut self.buf);
        self
    }

    /// Length-delimited field: tag, varint length, payload.
    pub fn bytes(mut self, field_number: u32, payload: &[u8]) -> Self {
        encode_varint(tag(field_number, WireType::LengthDelimited), &mut self.buf);
        encode_varint(payload.len() as u64, &mut self.buf);
        self.buf.extend_from_slice(payload);
        self
    }

    pub fn string(self, field_number: u32, value: &str) -> Self {
        self.bytes(field_number, value.as_bytes())
    }

    pub fn message(self, field_number: u32, nested: &MessageBuilder) -> Self {
        self.bytes(field_number, nested.as_bytes())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}
