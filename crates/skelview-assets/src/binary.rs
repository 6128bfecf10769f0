//! Cursor-based reader for the binary skeleton encoding.
//!
//! The format stores integers as little-endian base-128 varints (optionally
//! zig-zag encoded) and strings as a varint length-plus-one followed by a
//! modified UTF-8 byte sequence.

use crate::error::DecodeError;

/// Bytes reserved at the start of a binary skeleton before the version string.
pub const SKELETON_HEADER_SKIP: usize = 8;

/// Reader over an immutable byte buffer.
///
/// The reader never copies the buffer; it only advances a cursor. Every read
/// fails with [`DecodeError::OutOfBounds`] instead of panicking when the
/// buffer is shorter than the encoding claims.
#[derive(Debug, Clone)]
pub struct BinaryInput<'a> {
    bytes: &'a [u8],
    position: usize,
}

impl<'a> BinaryInput<'a> {
    /// Reader positioned at the first byte.
    pub fn new(bytes: &'a [u8]) -> Self {
        Self::at(bytes, 0)
    }

    /// Reader positioned at `offset`.
    pub fn at(bytes: &'a [u8], offset: usize) -> Self {
        Self {
            bytes,
            position: offset,
        }
    }

    /// Reader positioned past the fixed skeleton preamble.
    pub fn skeleton(bytes: &'a [u8]) -> Self {
        Self::at(bytes, SKELETON_HEADER_SKIP)
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len().saturating_sub(self.position)
    }

    pub fn read_unsigned_byte(&mut self) -> Result<u8, DecodeError> {
        let byte = self
            .bytes
            .get(self.position)
            .copied()
            .ok_or(DecodeError::OutOfBounds {
                offset: self.position,
                len: self.bytes.len(),
            })?;
        self.position += 1;
        Ok(byte)
    }

    pub fn read_byte(&mut self) -> Result<i8, DecodeError> {
        self.read_unsigned_byte().map(|b| b as i8)
    }

    /// Read a 1 to 5 byte varint.
    ///
    /// Each byte contributes its low 7 bits, least-significant group first;
    /// the high bit flags a continuation. Bits shifted past 32 are dropped.
    /// With `optimize_positive == false` the value is zig-zag decoded.
    pub fn read_varint(&mut self, optimize_positive: bool) -> Result<i32, DecodeError> {
        let mut raw: u32 = 0;
        for shift in [0u32, 7, 14, 21, 28] {
            let b = self.read_unsigned_byte()?;
            raw |= ((b & 0x7F) as u32) << shift;
            if b & 0x80 == 0 {
                break;
            }
        }

        if optimize_positive {
            Ok(raw as i32)
        } else {
            Ok(((raw >> 1) ^ (raw & 1).wrapping_neg()) as i32)
        }
    }

    /// Read a length-prefixed string.
    ///
    /// A stored length of `0` means "no string" and yields `None`, which is
    /// distinct from the empty string (stored length `1`). The payload is
    /// decoded permissively: lead bytes `0xC_`/`0xD_` take one continuation
    /// byte, `0xE_` takes two, anything else is a single code unit.
    /// Continuation bytes are not validated. Code units that are not Unicode
    /// scalar values (lone surrogates) become U+FFFD.
    pub fn read_string(&mut self) -> Result<Option<String>, DecodeError> {
        let byte_count = self.read_varint(true)? as u32 as usize;
        match byte_count {
            0 => return Ok(None),
            1 => return Ok(Some(String::new())),
            _ => {}
        }

        let byte_count = byte_count - 1;
        let mut chars = String::with_capacity(byte_count.min(self.remaining()));
        let mut consumed = 0;
        while consumed < byte_count {
            let b = self.read_unsigned_byte()? as u32;
            let unit = match b >> 4 {
                12 | 13 => {
                    let b1 = self.read_unsigned_byte()? as u32;
                    consumed += 2;
                    ((b & 0x1F) << 6) | (b1 & 0x3F)
                }
                14 => {
                    let b1 = self.read_unsigned_byte()? as u32;
                    let b2 = self.read_unsigned_byte()? as u32;
                    consumed += 3;
                    ((b & 0x0F) << 12) | ((b1 & 0x3F) << 6) | (b2 & 0x3F)
                }
                _ => {
                    consumed += 1;
                    b
                }
            };
            chars.push(char::from_u32(unit).unwrap_or(char::REPLACEMENT_CHARACTER));
        }

        Ok(Some(chars))
    }
}
