//! Cursor over an encoded protobuf buffer.
//!
//! [`Reader`] borrows its byte slice and never copies it; the payloads of
//! `bytes` and `string` fields are copied out on read, so decoded values do
//! not borrow from the input buffer.

use bytes::Bytes;

use crate::error::{Error, MalformedKind, Result};
use crate::wire::{unzigzag32, unzigzag64, WireType};

/// Maximum bytes a 64-bit varint may occupy.
const MAX_VARINT_BYTES: usize = 10;

/// Maximum group nesting [`Reader::skip_type`] will follow.
///
/// Hostile input can nest start-group markers arbitrarily deep; without a cap
/// the recursive skip would exhaust the stack.
const MAX_SKIP_DEPTH: usize = 100;

/// A cursor over an immutable byte slice that decodes base wire primitives.
///
/// All reads advance [`Reader::pos`]; on error the cursor is left at the
/// failing position.
#[derive(Debug)]
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    /// Create a reader positioned at the start of `buf`.
    pub fn new(buf: &'a [u8]) -> Self {
        Reader { buf, pos: 0 }
    }

    /// Current cursor position.
    #[inline]
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Total length of the underlying buffer.
    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// True when no bytes remain.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }

    /// Bytes remaining past the cursor.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Decode a LEB128 varint of at most ten bytes.
    ///
    /// Running out of buffer mid-varint is `Truncated`; an eleventh
    /// continuation byte, or high bits set in the tenth byte (which would
    /// overflow 64 bits), is `Malformed`.
    pub fn varint(&mut self) -> Result<u64> {
        let mut result: u64 = 0;
        let mut shift = 0u32;

        for _ in 0..MAX_VARINT_BYTES {
            let Some(&byte) = self.buf.get(self.pos) else {
                return Err(Error::truncated(self.pos));
            };

            // The tenth byte carries only bit 63; anything above overflows.
            if shift == 63 && byte & 0x7E != 0 {
                return Err(Error::malformed(self.pos, MalformedKind::InvalidVarint));
            }

            self.pos += 1;
            result |= u64::from(byte & 0x7F) << shift;
            if byte & 0x80 == 0 {
                return Ok(result);
            }
            shift += 7;
        }

        Err(Error::malformed(self.pos, MalformedKind::InvalidVarint))
    }

    /// Read a `uint32` (varint, low 32 bits).
    pub fn uint32(&mut self) -> Result<u32> {
        self.varint().map(|v| v as u32)
    }

    /// Read an `int32` (varint, sign carried through the low 32 bits).
    pub fn int32(&mut self) -> Result<i32> {
        self.varint().map(|v| v as i32)
    }

    /// Read a `sint32` (ZigZag varint).
    pub fn sint32(&mut self) -> Result<i32> {
        self.uint32().map(unzigzag32)
    }

    /// Read a `uint64` (varint).
    pub fn uint64(&mut self) -> Result<u64> {
        self.varint()
    }

    /// Read an `int64` (varint, two's complement).
    pub fn int64(&mut self) -> Result<i64> {
        self.varint().map(|v| v as i64)
    }

    /// Read a `sint64` (ZigZag varint).
    pub fn sint64(&mut self) -> Result<i64> {
        self.varint().map(unzigzag64)
    }

    /// Read a `bool` (varint, any non-zero value is true).
    pub fn read_bool(&mut self) -> Result<bool> {
        self.varint().map(|v| v != 0)
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N]> {
        let end = self.pos.checked_add(N).filter(|&end| end <= self.buf.len());
        let Some(end) = end else {
            return Err(Error::truncated(self.pos));
        };
        let mut out = [0u8; N];
        out.copy_from_slice(&self.buf[self.pos..end]);
        self.pos = end;
        Ok(out)
    }

    /// Read a little-endian `fixed32`.
    pub fn fixed32(&mut self) -> Result<u32> {
        self.take::<4>().map(u32::from_le_bytes)
    }

    /// Read a little-endian `sfixed32`.
    pub fn sfixed32(&mut self) -> Result<i32> {
        self.take::<4>().map(i32::from_le_bytes)
    }

    /// Read an IEEE 754 little-endian `float`.
    pub fn float(&mut self) -> Result<f32> {
        self.take::<4>().map(f32::from_le_bytes)
    }

    /// Read a little-endian `fixed64`.
    pub fn fixed64(&mut self) -> Result<u64> {
        self.take::<8>().map(u64::from_le_bytes)
    }

    /// Read a little-endian `sfixed64`.
    pub fn sfixed64(&mut self) -> Result<i64> {
        self.take::<8>().map(i64::from_le_bytes)
    }

    /// Read an IEEE 754 little-endian `double`.
    pub fn double(&mut self) -> Result<f64> {
        self.take::<8>().map(f64::from_le_bytes)
    }

    /// Read a length prefix and validate it against the remaining buffer.
    pub fn read_len(&mut self) -> Result<usize> {
        let start = self.pos;
        let raw = self.varint()?;
        let len = usize::try_from(raw)
            .map_err(|_| Error::malformed(start, MalformedKind::LengthOverflow(raw)))?;
        if len > self.remaining() {
            return Err(Error::truncated(self.pos));
        }
        Ok(len)
    }

    /// Read a length-prefixed `bytes` payload, copied out of the buffer.
    pub fn bytes(&mut self) -> Result<Bytes> {
        let len = self.read_len()?;
        let payload = Bytes::copy_from_slice(&self.buf[self.pos..self.pos + len]);
        self.pos += len;
        Ok(payload)
    }

    /// Read a length-prefixed UTF-8 `string`.
    pub fn string(&mut self) -> Result<String> {
        let len = self.read_len()?;
        // Validate before allocating.
        let text = std::str::from_utf8(&self.buf[self.pos..self.pos + len])
            .map_err(|_| Error::malformed(self.pos, MalformedKind::InvalidUtf8))?
            .to_owned();
        self.pos += len;
        Ok(text)
    }

    /// Advance past an unknown field's payload according to its wire type.
    ///
    /// `field_id` is the id from the key that introduced the field; it only
    /// matters for start-group payloads, which are skipped recursively until
    /// an end-group tag carrying the same id. An end-group tag for a
    /// different id, or buffer exhaustion inside the group, is `Truncated`.
    /// A bare end-group marker, or a reserved wire type, is `Malformed`.
    pub fn skip_type(&mut self, field_id: u32, wire_type: u8) -> Result<()> {
        self.skip_type_at_depth(field_id, wire_type, 0)
    }

    fn skip_type_at_depth(&mut self, field_id: u32, wire_type: u8, depth: usize) -> Result<()> {
        if depth > MAX_SKIP_DEPTH {
            return Err(Error::malformed(self.pos, MalformedKind::NestingTooDeep));
        }

        let wt = WireType::try_from_val(wire_type)
            .ok_or_else(|| Error::malformed(self.pos, MalformedKind::InvalidWireType(wire_type)))?;
        match wt {
            WireType::Varint => {
                self.varint()?;
            }
            WireType::I64 => {
                self.take::<8>()?;
            }
            WireType::Len => {
                let len = self.read_len()?;
                self.pos += len;
            }
            WireType::I32 => {
                self.take::<4>()?;
            }
            WireType::SGroup => loop {
                let key_offset = self.pos;
                let key = self.uint32()?;
                let (inner_id, inner_wt) = ((key >> 3), (key & 0b111) as u8);
                if inner_wt == WireType::EGroup.into_val() {
                    if inner_id != field_id {
                        return Err(Error::truncated(key_offset));
                    }
                    break;
                }
                self.skip_type_at_depth(inner_id, inner_wt, depth + 1)?;
            },
            WireType::EGroup => {
                return Err(Error::malformed(
                    self.pos,
                    MalformedKind::InvalidWireType(wire_type),
                ));
            }
        }
        Ok(())
    }
}
