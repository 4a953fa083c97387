//! # Serialization Utilities
//!
//! Helpers for reading and writing the handshake's wire types from and to byte
//! buffers: variable-byte integers, length-prefixed strings and binary data,
//! and MQTT v5 property lists.
//!
//! Every reader takes a `cursor` into the buffer and advances it; running off
//! the end of the buffer is a [`ProtocolError::MalformedPacket`]. Writers
//! report [`CodecError::BufferTooSmall`] instead of panicking.

use crate::error::{CodecError, ProtocolError};

const MALFORMED: CodecError = CodecError::Protocol(ProtocolError::MalformedPacket);

/// Largest value a four-byte variable-byte integer can hold.
pub const MAX_VARIABLE_BYTE_INTEGER: usize = 268_435_455;

/// Property identifiers used by the `CONNECT`/`CONNACK` exchange.
pub mod property {
    pub const SESSION_EXPIRY_INTERVAL: u8 = 0x11;
    pub const ASSIGNED_CLIENT_IDENTIFIER: u8 = 0x12;
    pub const SERVER_KEEP_ALIVE: u8 = 0x13;
    pub const AUTHENTICATION_METHOD: u8 = 0x15;
    pub const AUTHENTICATION_DATA: u8 = 0x16;
    pub const REQUEST_PROBLEM_INFORMATION: u8 = 0x17;
    pub const REQUEST_RESPONSE_INFORMATION: u8 = 0x19;
    pub const RESPONSE_INFORMATION: u8 = 0x1A;
    pub const SERVER_REFERENCE: u8 = 0x1C;
    pub const REASON_STRING: u8 = 0x1F;
    pub const RECEIVE_MAXIMUM: u8 = 0x21;
    pub const TOPIC_ALIAS_MAXIMUM: u8 = 0x22;
    pub const MAXIMUM_QOS: u8 = 0x24;
    pub const RETAIN_AVAILABLE: u8 = 0x25;
    pub const USER_PROPERTY: u8 = 0x26;
    pub const MAXIMUM_PACKET_SIZE: u8 = 0x27;
    pub const WILDCARD_SUBSCRIPTION_AVAILABLE: u8 = 0x28;
    pub const SUBSCRIPTION_IDENTIFIER_AVAILABLE: u8 = 0x29;
    pub const SHARED_SUBSCRIPTION_AVAILABLE: u8 = 0x2A;
}

/// Reads a variable-byte integer from the buffer, advancing the cursor.
///
/// This is the encoding used for packet lengths and property-list lengths.
pub fn read_variable_byte_integer(cursor: &mut usize, buf: &[u8]) -> Result<usize, CodecError> {
    let mut multiplier = 1;
    let mut value = 0;
    let mut i = 0;
    loop {
        let encoded_byte = *buf.get(*cursor + i).ok_or(MALFORMED)?;
        value += (encoded_byte & 127) as usize * multiplier;
        if (encoded_byte & 128) == 0 {
            break;
        }
        multiplier *= 128;
        i += 1;
        if i >= 4 {
            return Err(MALFORMED);
        }
    }
    *cursor += i + 1;
    Ok(value)
}

/// Writes a variable-byte integer to the buffer, advancing the cursor.
pub fn write_variable_byte_integer(
    cursor: &mut usize,
    buf: &mut [u8],
    mut val: usize,
) -> Result<(), CodecError> {
    if val > MAX_VARIABLE_BYTE_INTEGER {
        return Err(CodecError::Protocol(ProtocolError::PayloadTooLarge));
    }
    loop {
        let mut encoded_byte = (val % 128) as u8;
        val /= 128;
        if val > 0 {
            encoded_byte |= 128;
        }
        write_u8(cursor, buf, encoded_byte)?;
        if val == 0 {
            break;
        }
    }
    Ok(())
}

pub fn read_u8(cursor: &mut usize, buf: &[u8]) -> Result<u8, CodecError> {
    let byte = *buf.get(*cursor).ok_or(MALFORMED)?;
    *cursor += 1;
    Ok(byte)
}

pub fn read_u16(cursor: &mut usize, buf: &[u8]) -> Result<u16, CodecError> {
    let bytes = buf.get(*cursor..*cursor + 2).ok_or(MALFORMED)?;
    *cursor += 2;
    Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
}

pub fn read_u32(cursor: &mut usize, buf: &[u8]) -> Result<u32, CodecError> {
    let bytes = buf.get(*cursor..*cursor + 4).ok_or(MALFORMED)?;
    *cursor += 4;
    Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Reads binary data (prefixed with a 2-byte length) from the buffer.
pub fn read_binary<'a>(cursor: &mut usize, buf: &'a [u8]) -> Result<&'a [u8], CodecError> {
    let len = read_u16(cursor, buf)? as usize;
    let data = buf.get(*cursor..*cursor + len).ok_or(MALFORMED)?;
    *cursor += len;
    Ok(data)
}

/// Reads a UTF-8 encoded string (prefixed with a 2-byte length) from the buffer.
pub fn read_utf8_string<'a>(cursor: &mut usize, buf: &'a [u8]) -> Result<&'a str, CodecError> {
    let raw = read_binary(cursor, buf)?;
    core::str::from_utf8(raw).map_err(|_| CodecError::Protocol(ProtocolError::InvalidUtf8String))
}

pub fn write_u8(cursor: &mut usize, buf: &mut [u8], val: u8) -> Result<(), CodecError> {
    *buf.get_mut(*cursor).ok_or(CodecError::BufferTooSmall)? = val;
    *cursor += 1;
    Ok(())
}

pub fn write_u16(cursor: &mut usize, buf: &mut [u8], val: u16) -> Result<(), CodecError> {
    write_slice(cursor, buf, &val.to_be_bytes())
}

pub fn write_u32(cursor: &mut usize, buf: &mut [u8], val: u32) -> Result<(), CodecError> {
    write_slice(cursor, buf, &val.to_be_bytes())
}

/// Copies raw bytes into the buffer without a length prefix.
pub fn write_slice(cursor: &mut usize, buf: &mut [u8], data: &[u8]) -> Result<(), CodecError> {
    let dest = buf
        .get_mut(*cursor..*cursor + data.len())
        .ok_or(CodecError::BufferTooSmall)?;
    dest.copy_from_slice(data);
    *cursor += data.len();
    Ok(())
}

/// Writes binary data (prefixed with a 2-byte length) to the buffer.
pub fn write_binary(cursor: &mut usize, buf: &mut [u8], data: &[u8]) -> Result<(), CodecError> {
    let len = u16::try_from(data.len())
        .map_err(|_| CodecError::Protocol(ProtocolError::PayloadTooLarge))?;
    write_u16(cursor, buf, len)?;
    write_slice(cursor, buf, data)
}

/// Writes a UTF-8 encoded string (prefixed with a 2-byte length) to the buffer.
pub fn write_utf8_string(cursor: &mut usize, buf: &mut [u8], s: &str) -> Result<(), CodecError> {
    write_binary(cursor, buf, s.as_bytes())
}

/// A single decoded property.
///
/// The variant is determined by the property identifier, so every identifier
/// maps to exactly one wire type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Property<'a> {
    Byte { id: u8, value: u8 },
    TwoByteInteger { id: u8, value: u16 },
    FourByteInteger { id: u8, value: u32 },
    Utf8String { id: u8, value: &'a str },
    BinaryData { id: u8, value: &'a [u8] },
    UserProperty { key: &'a str, value: &'a str },
}

impl<'a> Property<'a> {
    /// The property identifier.
    pub fn id(&self) -> u8 {
        match *self {
            Property::Byte { id, .. }
            | Property::TwoByteInteger { id, .. }
            | Property::FourByteInteger { id, .. }
            | Property::Utf8String { id, .. }
            | Property::BinaryData { id, .. } => id,
            Property::UserProperty { .. } => property::USER_PROPERTY,
        }
    }

    fn read(cursor: &mut usize, buf: &'a [u8]) -> Result<Self, CodecError> {
        use crate::util::property::*;

        let id = read_u8(cursor, buf)?;
        let prop = match id {
            REQUEST_PROBLEM_INFORMATION
            | REQUEST_RESPONSE_INFORMATION
            | MAXIMUM_QOS
            | RETAIN_AVAILABLE
            | WILDCARD_SUBSCRIPTION_AVAILABLE
            | SUBSCRIPTION_IDENTIFIER_AVAILABLE
            | SHARED_SUBSCRIPTION_AVAILABLE => Property::Byte {
                id,
                value: read_u8(cursor, buf)?,
            },
            SERVER_KEEP_ALIVE | RECEIVE_MAXIMUM | TOPIC_ALIAS_MAXIMUM => Property::TwoByteInteger {
                id,
                value: read_u16(cursor, buf)?,
            },
            SESSION_EXPIRY_INTERVAL | MAXIMUM_PACKET_SIZE => Property::FourByteInteger {
                id,
                value: read_u32(cursor, buf)?,
            },
            ASSIGNED_CLIENT_IDENTIFIER
            | AUTHENTICATION_METHOD
            | RESPONSE_INFORMATION
            | SERVER_REFERENCE
            | REASON_STRING => Property::Utf8String {
                id,
                value: read_utf8_string(cursor, buf)?,
            },
            AUTHENTICATION_DATA => Property::BinaryData {
                id,
                value: read_binary(cursor, buf)?,
            },
            USER_PROPERTY => Property::UserProperty {
                key: read_utf8_string(cursor, buf)?,
                value: read_utf8_string(cursor, buf)?,
            },
            other => return Err(CodecError::Protocol(ProtocolError::UnknownProperty(other))),
        };
        Ok(prop)
    }

    fn write(&self, cursor: &mut usize, buf: &mut [u8]) -> Result<(), CodecError> {
        write_u8(cursor, buf, self.id())?;
        match *self {
            Property::Byte { value, .. } => write_u8(cursor, buf, value),
            Property::TwoByteInteger { value, .. } => write_u16(cursor, buf, value),
            Property::FourByteInteger { value, .. } => write_u32(cursor, buf, value),
            Property::Utf8String { value, .. } => write_utf8_string(cursor, buf, value),
            Property::BinaryData { value, .. } => write_binary(cursor, buf, value),
            Property::UserProperty { key, value } => {
                write_utf8_string(cursor, buf, key)?;
                write_utf8_string(cursor, buf, value)
            }
        }
    }
}

/// A borrowed, still-encoded property list (without its length prefix).
///
/// Properties are decoded lazily while iterating, so a `CONNACK` may carry any
/// number of them without an intermediate collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Properties<'a> {
    raw: &'a [u8],
}

impl<'a> Properties<'a> {
    /// Wraps raw property bytes, e.g. the output of [`encode_properties`].
    pub const fn new(raw: &'a [u8]) -> Self {
        Self { raw }
    }

    pub const fn empty() -> Self {
        Self { raw: &[] }
    }

    /// The encoded bytes, excluding the length prefix.
    pub fn as_bytes(&self) -> &'a [u8] {
        self.raw
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Checks that every property decodes.
    pub fn validate(&self) -> Result<(), CodecError> {
        self.iter().try_for_each(|prop| prop.map(|_| ()))
    }

    pub fn iter(&self) -> PropertyIter<'a> {
        PropertyIter {
            raw: self.raw,
            cursor: 0,
        }
    }

    /// First UTF-8 string property with the given identifier.
    pub fn utf8_string(&self, id: u8) -> Option<&'a str> {
        self.iter().find_map(|prop| match prop {
            Ok(Property::Utf8String { id: found, value }) if found == id => Some(value),
            _ => None,
        })
    }
}

impl<'a> IntoIterator for Properties<'a> {
    type Item = Result<Property<'a>, CodecError>;
    type IntoIter = PropertyIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over a [`Properties`] list. Stops after the first error.
#[derive(Debug, Clone)]
pub struct PropertyIter<'a> {
    raw: &'a [u8],
    cursor: usize,
}

impl<'a> Iterator for PropertyIter<'a> {
    type Item = Result<Property<'a>, CodecError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor >= self.raw.len() {
            return None;
        }
        let result = Property::read(&mut self.cursor, self.raw);
        if result.is_err() {
            self.cursor = self.raw.len();
        }
        Some(result)
    }
}

/// Reads a length-prefixed property list, advancing the cursor past it.
pub fn read_properties<'a>(cursor: &mut usize, buf: &'a [u8]) -> Result<Properties<'a>, CodecError> {
    let len = read_variable_byte_integer(cursor, buf)?;
    let raw = buf.get(*cursor..*cursor + len).ok_or(MALFORMED)?;
    *cursor += len;
    Ok(Properties::new(raw))
}

/// Writes a length-prefixed property list.
pub fn write_properties(
    cursor: &mut usize,
    buf: &mut [u8],
    properties: &Properties<'_>,
) -> Result<(), CodecError> {
    write_variable_byte_integer(cursor, buf, properties.raw.len())?;
    write_slice(cursor, buf, properties.raw)
}

/// Encodes properties back to back into `out`, returning the byte count.
///
/// Wrap the result with [`Properties::new`] to attach it to a packet.
pub fn encode_properties(properties: &[Property<'_>], out: &mut [u8]) -> Result<usize, CodecError> {
    let mut cursor = 0;
    for prop in properties {
        prop.write(&mut cursor, out)?;
    }
    Ok(cursor)
}
