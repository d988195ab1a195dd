//! Length-delimited binary wire decoding.
//!
//! Some local caches store state as undocumented protobuf-style blobs with no
//! schema available. This module decodes the wire format structurally: every
//! top-level record is a varint tag (`field << 3 | wire_type`) followed by a
//! value whose shape depends on the wire type.
//!
//! | wire type | value |
//! |-----------|-------|
//! | 0 | varint |
//! | 1 | 8 bytes, little endian |
//! | 2 | varint length + bytes |
//! | 5 | 4 bytes, little endian |
//!
//! Nested messages are not decoded eagerly; call [`WireValue::as_message`] on
//! a length-delimited value to descend.

// Varint and fixed-width decoding is bit-level work bounded by the format.
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::error::WireError;

/// A varint never spans more than ten bytes.
const MAX_VARINT_BYTES: usize = 10;

// ============================================================================
// Values
// ============================================================================

/// One decoded field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireValue<'a> {
    /// Wire type 0.
    Varint(u64),
    /// Wire type 1.
    Fixed64(u64),
    /// Wire type 2, borrowed from the input.
    Bytes(&'a [u8]),
    /// Wire type 5.
    Fixed32(u32),
}

impl<'a> WireValue<'a> {
    /// The varint payload.
    pub fn as_varint(&self) -> Option<u64> {
        match self {
            Self::Varint(v) => Some(*v),
            _ => None,
        }
    }

    /// The length-delimited payload.
    pub fn as_bytes(&self) -> Option<&'a [u8]> {
        match self {
            Self::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Decodes a length-delimited payload as a nested message.
    ///
    /// Returns `None` for other wire types.
    ///
    /// # Errors
    ///
    /// Returns a [`WireError`] if the payload is not a well-formed message.
    pub fn as_message(&self) -> Option<Result<WireMessage<'a>, WireError>> {
        self.as_bytes().map(WireMessage::decode)
    }

    /// Decodes a length-delimited payload as text.
    ///
    /// Nested messages are also length-delimited, so a slice that happens to
    /// be valid UTF-8 but contains no alphabetic character is rejected as
    /// probably not text.
    pub fn as_string(&self) -> Option<String> {
        let bytes = self.as_bytes()?;
        let text = std::str::from_utf8(bytes).ok()?;
        text.chars()
            .any(char::is_alphabetic)
            .then(|| text.to_string())
    }

    /// Reads a fixed-width float: fixed32 as `f32`, fixed64 as `f64`.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Fixed32(bits) => Some(f64::from(f32::from_bits(*bits))),
            Self::Fixed64(bits) => Some(f64::from_bits(*bits)),
            _ => None,
        }
    }

    /// Reads a nested `{1: seconds, 2: nanos}` timestamp message.
    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        let message = self.as_message()?.ok()?;
        let seconds = message.varint(1)? as i64;
        let nanos = message.varint(2).unwrap_or(0);
        let nanos = u32::try_from(nanos).ok().filter(|n| *n < 1_000_000_000)?;
        DateTime::from_timestamp(seconds, nanos)
    }
}

// ============================================================================
// Messages
// ============================================================================

/// A decoded message: field number to values in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WireMessage<'a> {
    fields: BTreeMap<u64, Vec<WireValue<'a>>>,
}

impl<'a> WireMessage<'a> {
    /// Decodes every top-level field of `data`.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::Truncated`] if a tag or value runs past the end
    /// of the input and [`WireError::UnknownWireType`] for wire types other
    /// than 0, 1, 2 and 5.
    pub fn decode(data: &'a [u8]) -> Result<Self, WireError> {
        let mut fields: BTreeMap<u64, Vec<WireValue<'a>>> = BTreeMap::new();
        let mut pos = 0;

        while pos < data.len() {
            let tag_offset = pos;
            let (tag, next) = read_varint(data, pos)?;
            pos = next;
            let field = tag >> 3;
            let wire_type = (tag & 7) as u8;

            let value = match wire_type {
                0 => {
                    let (v, next) = read_varint(data, pos)?;
                    pos = next;
                    WireValue::Varint(v)
                }
                1 => {
                    let raw = take(data, pos, 8)?;
                    pos += 8;
                    let mut buf = [0u8; 8];
                    buf.copy_from_slice(raw);
                    WireValue::Fixed64(u64::from_le_bytes(buf))
                }
                2 => {
                    let (len, next) = read_varint(data, pos)?;
                    let len = usize::try_from(len).map_err(|_| WireError::Truncated(next))?;
                    let raw = take(data, next, len)?;
                    pos = next + len;
                    WireValue::Bytes(raw)
                }
                5 => {
                    let raw = take(data, pos, 4)?;
                    pos += 4;
                    let mut buf = [0u8; 4];
                    buf.copy_from_slice(raw);
                    WireValue::Fixed32(u32::from_le_bytes(buf))
                }
                _ => {
                    return Err(WireError::UnknownWireType {
                        wire_type,
                        field,
                        offset: tag_offset,
                    });
                }
            };

            fields.entry(field).or_default().push(value);
        }

        Ok(Self { fields })
    }

    /// All values of a field, in input order.
    pub fn get_all(&self, field: u64) -> &[WireValue<'a>] {
        self.fields.get(&field).map_or(&[], Vec::as_slice)
    }

    /// The first value of a field.
    pub fn get(&self, field: u64) -> Option<&WireValue<'a>> {
        self.get_all(field).first()
    }

    /// The first value of a field as a varint.
    pub fn varint(&self, field: u64) -> Option<u64> {
        self.get(field)?.as_varint()
    }

    /// The first value of a field as text.
    pub fn string(&self, field: u64) -> Option<String> {
        self.get(field)?.as_string()
    }

    /// Field numbers present, ascending.
    pub fn field_numbers(&self) -> impl Iterator<Item = u64> + '_ {
        self.fields.keys().copied()
    }

    /// True when no fields were decoded.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Follows a path of length-delimited fields, taking the first value at
    /// each step.
    ///
    /// Returns `Ok(None)` if any step is missing or not length-delimited.
    ///
    /// # Errors
    ///
    /// Returns a [`WireError`] if a nested message on the path is malformed.
    pub fn descend(&self, path: &[u64]) -> Result<Option<WireMessage<'a>>, WireError> {
        let mut current = self.clone();
        for field in path {
            let next = current.get(*field).and_then(WireValue::as_message);
            match next {
                Some(next) => current = next?,
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }
}

// ============================================================================
// Primitives
// ============================================================================

/// Reads a varint at `offset`, returning the value and the next offset.
///
/// # Errors
///
/// Returns [`WireError::Truncated`] at end of input and
/// [`WireError::VarintOverflow`] past ten bytes.
pub fn read_varint(data: &[u8], offset: usize) -> Result<(u64, usize), WireError> {
    let mut result = 0u64;
    let mut pos = offset;

    for i in 0..MAX_VARINT_BYTES {
        let Some(&byte) = data.get(pos) else {
            return Err(WireError::Truncated(pos));
        };
        result |= u64::from(byte & 0x7F) << (7 * i);
        pos += 1;
        if byte & 0x80 == 0 {
            return Ok((result, pos));
        }
    }

    Err(WireError::VarintOverflow(offset))
}

fn take(data: &[u8], offset: usize, len: usize) -> Result<&[u8], WireError> {
    offset
        .checked_add(len)
        .and_then(|end| data.get(offset..end))
        .ok_or(WireError::Truncated(data.len()))
}

// ============================================================================
// Writer
// ============================================================================

/// Minimal encoder, used to build fixtures.
#[derive(Debug, Clone, Default)]
pub struct WireWriter {
    buf: Vec<u8>,
}

impl WireWriter {
    /// Creates an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    fn push_varint(&mut self, mut value: u64) {
        while value >= 0x80 {
            self.buf.push((value & 0x7F | 0x80) as u8);
            value >>= 7;
        }
        self.buf.push(value as u8);
    }

    fn push_tag(&mut self, field: u64, wire_type: u8) {
        self.push_varint(field << 3 | u64::from(wire_type));
    }

    /// Appends a varint field.
    #[must_use]
    pub fn varint(mut self, field: u64, value: u64) -> Self {
        self.push_tag(field, 0);
        self.push_varint(value);
        self
    }

    /// Appends a length-delimited field.
    #[must_use]
    pub fn bytes(mut self, field: u64, value: &[u8]) -> Self {
        self.push_tag(field, 2);
        self.push_varint(value.len() as u64);
        self.buf.extend_from_slice(value);
        self
    }

    /// Appends a nested message.
    #[must_use]
    pub fn message(self, field: u64, message: &WireWriter) -> Self {
        self.bytes(field, &message.buf)
    }

    /// Appends an `f32` as fixed32.
    #[must_use]
    pub fn float(mut self, field: u64, value: f32) -> Self {
        self.push_tag(field, 5);
        self.buf.extend_from_slice(&value.to_bits().to_le_bytes());
        self
    }

    /// Appends an `f64` as fixed64.
    #[must_use]
    pub fn double(mut self, field: u64, value: f64) -> Self {
        self.push_tag(field, 1);
        self.buf.extend_from_slice(&value.to_bits().to_le_bytes());
        self
    }

    /// Finishes encoding.
    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

// ============================================================================
// Tests
// ============================================================================
