//! Field keys and the six payload encodings of the protobuf wire format.

use crate::error::{Error, MalformedKind, Result};

/// Smallest field id the wire format permits; zero never appears in a key.
pub const MINIMUM_TAG_VAL: u32 = 1;
/// Largest field id: a key reserves its low three bits for the wire type,
/// leaving 29 bits of id.
pub const MAXIMUM_TAG_VAL: u32 = (1 << 29) - 1;

/// How the payload after a field key is laid out.
///
/// The wire type is the low three bits of every key. It is all a reader
/// needs to find the end of a payload, which is what makes fields skippable
/// without consulting a schema.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum WireType {
    /// Base-128 varint: the integer scalars, `bool`, and enum numbers.
    Varint = 0,
    /// Eight little-endian bytes: `fixed64`, `sfixed64`, `double`.
    I64 = 1,
    /// Length-prefixed: `string`, `bytes`, embedded messages, and packed
    /// repeated scalars.
    Len = 2,
    /// Opens a group; the payload runs until the matching end-group key.
    SGroup = 3,
    /// Closes a group.
    EGroup = 4,
    /// Four little-endian bytes: `fixed32`, `sfixed32`, `float`.
    I32 = 5,
}

impl WireType {
    /// Highest raw value that names a real wire type; 6 and 7 are reserved.
    const MAX_VAL: u8 = WireType::I32 as u8;

    // `into_val` and the key arithmetic cast variants straight to their
    // discriminants, so those must stay the raw on-wire values 0..=5. This
    // breaks the build if a variant ever drifts.
    const _DISCRIMINANT_CHECK: () = {
        assert!(WireType::Varint as u8 == 0);
        assert!(WireType::I64 as u8 == 1);
        assert!(WireType::Len as u8 == 2);
        assert!(WireType::SGroup as u8 == 3);
        assert!(WireType::EGroup as u8 == 4);
        assert!(WireType::I32 as u8 == 5);
    };

    /// Interpret the raw 3-bit value from a field key.
    ///
    /// Returns `None` for the reserved values 6 and 7; callers attach the
    /// byte offset when turning that into an error.
    #[inline]
    pub fn try_from_val(value: u8) -> Option<Self> {
        match value {
            0 => Some(WireType::Varint),
            1 => Some(WireType::I64),
            2 => Some(WireType::Len),
            3 => Some(WireType::SGroup),
            4 => Some(WireType::EGroup),
            5 => Some(WireType::I32),
            _ => None,
        }
    }

    /// The 3-bit value this wire type occupies in a field key.
    #[inline]
    pub const fn into_val(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for WireType {
    type Error = Error;

    #[inline]
    fn try_from(value: u8) -> Result<Self> {
        WireType::try_from_val(value)
            .ok_or_else(|| Error::malformed(0, MalformedKind::InvalidWireType(value)))
    }
}

/// Builds the field key for the provided tag and wire type.
///
/// The multiplication form is the canonical definition; it is identical to
/// `(tag << 3) | wire_type` for every tag in `[1, 2^29-1]` since the key
/// arithmetic stays inside u32.
#[inline]
pub const fn make_key(tag: u32, wire_type: WireType) -> u32 {
    tag * 8 + wire_type as u32
}

/// Splits a raw key into its tag and wire-type halves.
///
/// The wire type comes back raw; callers validate it via
/// [`WireType::try_from_val`] so that reserved values surface as errors with
/// a meaningful offset.
#[inline]
pub const fn split_key(key: u32) -> (u32, u8) {
    (key >> 3, (key & 0b111) as u8)
}

/// Write the key introducing a `tag`/`wire_type` field record onto `buf`.
#[inline]
pub fn encode_key<B: bytes::BufMut>(wire_type: WireType, tag: u32, buf: &mut B) {
    encode_varint(u64::from(make_key(tag, wire_type)), buf);
}

/// Encodes `value` as a LEB128 varint onto `buf`.
pub fn encode_varint<B: bytes::BufMut>(mut value: u64, buf: &mut B) {
    while value >= 0x80 {
        buf.put_u8((value as u8) | 0x80);
        value >>= 7;
    }
    buf.put_u8(value as u8);
}

/// The number of bytes `value` occupies as a LEB128 varint.
pub fn varint_len(value: u64) -> usize {
    // 1 byte per started group of 7 bits; zero still takes one byte.
    let bits = 64 - (value | 1).leading_zeros() as usize;
    bits.div_ceil(7)
}

/// ZigZag-encode a signed 32-bit integer.
#[inline]
pub const fn zigzag32(value: i32) -> u32 {
    ((value << 1) ^ (value >> 31)) as u32
}

/// ZigZag-encode a signed 64-bit integer.
#[inline]
pub const fn zigzag64(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

/// ZigZag-decode to a signed 32-bit integer.
#[inline]
pub const fn unzigzag32(value: u32) -> i32 {
    ((value >> 1) as i32) ^ -((value & 1) as i32)
}

/// ZigZag-decode to a signed 64-bit integer.
#[inline]
pub const fn unzigzag64(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}
