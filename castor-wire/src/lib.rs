//! Minimal protobuf wire-format primitives.
//!
//! Only what is needed to hand-edit the two persisted message shapes the
//! foreign application keeps in its state database: varints, tags,
//! length-delimited framing, and an order-preserving field filter.

pub mod builder;
pub mod scan;
pub mod varint;

pub use builder::MessageBuilder;
pub use scan::{Field, Fields, find_string, replace_fields, strip_field};
pub use varint::{decode_varint, encode_varint};

use thiserror::Error as ThisError;

/// Wire types understood by the scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WireType {
    Varint = 0,
    Fixed64 = 1,
    LengthDelimited = 2,
    Fixed32 = 5,
}

impl TryFrom<u8> for WireType {
    type Error = WireError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Varint),
            1 => Ok(Self::Fixed64),
            2 => Ok(Self::LengthDelimited),
            5 => Ok(Self::Fixed32),
            other => Err(WireError::UnsupportedWireType(other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum WireError {
    #[error("message truncated at offset {0}")]
    Truncated(usize),

    #[error("varint longer than 10 bytes at offset {0}")]
    VarintOverflow(usize),

    #[error("unsupported wire type {0}")]
    UnsupportedWireType(u8),

    #[error("field number 0 is reserved")]
    ZeroFieldNumber,

    #[error("field {0} is not valid UTF-8")]
    InvalidUtf8(u32),
}

/// Build a field tag: `(field_number << 3) | wire_type`.
pub fn tag(field_number: u32, wire_type: WireType) -> u64 {
    (u64::from(field_number) << 3) | wire_type as u64
}
