//! # Handshake Packet Structures and Serialization
//!
//! The capability exchange rides on MQTT v5 framing: the client sends
//! `CONNECT`, the broker answers `CONNACK` whose user properties carry the
//! capability report, and the client ends the session with `DISCONNECT`.
//! This module defines those packets and the traits for encoding and decoding
//! them to and from a byte buffer.

use crate::error::{CodecError, ConnectReasonCode, ProtocolError};
use crate::util::{
    self, Properties, read_binary, read_properties, read_u8, read_u16, read_utf8_string,
    read_variable_byte_integer, write_binary, write_properties, write_u8, write_u16,
    write_utf8_string,
};

/// Protocol name carried in every `CONNECT`.
pub const PROTOCOL_NAME: &str = "MQTT";
/// Protocol level for MQTT 5.0.
pub const PROTOCOL_LEVEL: u8 = 5;

const CONNECT: u8 = 1;
const CONNACK: u8 = 2;
const DISCONNECT: u8 = 14;

const FLAG_USERNAME: u8 = 0x80;
const FLAG_PASSWORD: u8 = 0x40;
const FLAG_CLEAN_START: u8 = 0x02;

/// Bytes reserved after the first header byte for the remaining length.
const LENGTH_RESERVE: usize = 4;

/// A trait for packets that can be encoded into a byte buffer.
pub trait EncodePacket {
    /// Writes the complete packet to the start of `buf`, returning its length.
    fn encode(&self, buf: &mut [u8]) -> Result<usize, CodecError>;
}

/// A trait for packets that can be decoded from a byte buffer.
pub trait DecodePacket<'a>: Sized {
    /// Decodes one complete packet starting at `buf[0]`.
    fn decode(buf: &'a [u8]) -> Result<Self, CodecError>;
}

/// The packets that take part in the capability exchange.
#[derive(Debug)]
pub enum Packet<'a> {
    Connect(Connect<'a>),
    ConnAck(ConnAck<'a>),
    Disconnect(Disconnect),
}

/// Decodes a complete frame into a [`Packet`].
pub fn decode(buf: &[u8]) -> Result<Packet<'_>, CodecError> {
    let first = *buf
        .first()
        .ok_or(CodecError::Protocol(ProtocolError::MalformedPacket))?;
    let packet = match first >> 4 {
        CONNECT => Packet::Connect(Connect::decode(buf)?),
        CONNACK => Packet::ConnAck(ConnAck::decode(buf)?),
        DISCONNECT => Packet::Disconnect(Disconnect::decode(buf)?),
        other => return Err(CodecError::Protocol(ProtocolError::InvalidPacketType(other))),
    };
    Ok(packet)
}

/// Total length of the frame at the start of `buf`.
///
/// Returns `Ok(None)` while the fixed header is still incomplete, so callers
/// can keep reading until the length is known.
pub fn frame_len(buf: &[u8]) -> Result<Option<usize>, CodecError> {
    if buf.len() < 2 {
        return Ok(None);
    }
    let mut cursor = 1;
    match read_variable_byte_integer(&mut cursor, buf) {
        Ok(remaining) => Ok(Some(cursor + remaining)),
        // The length bytes may simply not have arrived yet.
        Err(_) if buf.len() < 1 + LENGTH_RESERVE && buf[1..].iter().all(|b| b & 0x80 != 0) => {
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

/// Writes the fixed header and compacts the body written after the reserve.
///
/// Encoders write their body starting at `1 + LENGTH_RESERVE`; this moves it
/// directly behind the real remaining-length bytes.
fn finish_frame(buf: &mut [u8], header: u8, body_end: usize) -> Result<usize, CodecError> {
    let content_start = 1 + LENGTH_RESERVE;
    if body_end > buf.len() || body_end < content_start {
        return Err(CodecError::BufferTooSmall);
    }
    let remaining_len = body_end - content_start;
    let mut cursor = 0;
    write_u8(&mut cursor, buf, header)?;
    util::write_variable_byte_integer(&mut cursor, buf, remaining_len)?;
    buf.copy_within(content_start..body_end, cursor);
    Ok(cursor + remaining_len)
}

/// Reads the fixed header, checking the packet type, and returns the end of
/// the frame.
fn read_fixed_header(cursor: &mut usize, buf: &[u8], packet_type: u8) -> Result<usize, CodecError> {
    let first = read_u8(cursor, buf)?;
    if first >> 4 != packet_type {
        return Err(CodecError::Protocol(ProtocolError::InvalidPacketType(
            first >> 4,
        )));
    }
    let remaining = read_variable_byte_integer(cursor, buf)?;
    let end = *cursor + remaining;
    if end > buf.len() {
        return Err(CodecError::Protocol(ProtocolError::MalformedPacket));
    }
    Ok(end)
}

// --- CONNECT Packet ---
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Connect<'a> {
    pub clean_start: bool,
    pub keep_alive: u16,
    pub client_id: &'a str,
    pub username: Option<&'a str>,
    pub password: Option<&'a [u8]>,
    pub properties: Properties<'a>,
}

impl<'a> Connect<'a> {
    pub fn new(client_id: &'a str, keep_alive: u16) -> Self {
        Self {
            clean_start: true,
            keep_alive,
            client_id,
            username: None,
            password: None,
            properties: Properties::empty(),
        }
    }

    pub fn with_credentials(mut self, username: &'a str, password: &'a [u8]) -> Self {
        self.username = Some(username);
        self.password = Some(password);
        self
    }

    pub fn with_properties(mut self, properties: Properties<'a>) -> Self {
        self.properties = properties;
        self
    }
}

impl EncodePacket for Connect<'_> {
    fn encode(&self, buf: &mut [u8]) -> Result<usize, CodecError> {
        let mut cursor = 1 + LENGTH_RESERVE;
        write_utf8_string(&mut cursor, buf, PROTOCOL_NAME)?;
        write_u8(&mut cursor, buf, PROTOCOL_LEVEL)?;

        let mut flags = 0;
        if self.clean_start {
            flags |= FLAG_CLEAN_START;
        }
        if self.username.is_some() {
            flags |= FLAG_USERNAME;
        }
        if self.password.is_some() {
            flags |= FLAG_PASSWORD;
        }
        write_u8(&mut cursor, buf, flags)?;
        write_u16(&mut cursor, buf, self.keep_alive)?;
        write_properties(&mut cursor, buf, &self.properties)?;

        write_utf8_string(&mut cursor, buf, self.client_id)?;
        if let Some(username) = self.username {
            write_utf8_string(&mut cursor, buf, username)?;
        }
        if let Some(password) = self.password {
            write_binary(&mut cursor, buf, password)?;
        }

        finish_frame(buf, CONNECT << 4, cursor)
    }
}

impl<'a> DecodePacket<'a> for Connect<'a> {
    fn decode(buf: &'a [u8]) -> Result<Self, CodecError> {
        let mut cursor = 0;
        let end = read_fixed_header(&mut cursor, buf, CONNECT)?;
        let buf = &buf[..end];

        if read_utf8_string(&mut cursor, buf)? != PROTOCOL_NAME
            || read_u8(&mut cursor, buf)? != PROTOCOL_LEVEL
        {
            return Err(CodecError::Protocol(ProtocolError::MalformedPacket));
        }
        let flags = read_u8(&mut cursor, buf)?;
        let keep_alive = read_u16(&mut cursor, buf)?;
        let properties = read_properties(&mut cursor, buf)?;
        properties.validate()?;

        let client_id = read_utf8_string(&mut cursor, buf)?;
        let username = if flags & FLAG_USERNAME != 0 {
            Some(read_utf8_string(&mut cursor, buf)?)
        } else {
            None
        };
        let password = if flags & FLAG_PASSWORD != 0 {
            Some(read_binary(&mut cursor, buf)?)
        } else {
            None
        };

        Ok(Self {
            clean_start: flags & FLAG_CLEAN_START != 0,
            keep_alive,
            client_id,
            username,
            password,
            properties,
        })
    }
}

// --- CONNACK Packet ---
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnAck<'a> {
    pub session_present: bool,
    pub reason_code: u8,
    pub properties: Properties<'a>,
}

impl<'a> ConnAck<'a> {
    pub fn new(reason_code: u8, properties: Properties<'a>) -> Self {
        Self {
            session_present: false,
            reason_code,
            properties,
        }
    }

    pub fn reason(&self) -> ConnectReasonCode {
        ConnectReasonCode::from(self.reason_code)
    }

    /// Human-readable refusal detail, when the broker supplied one.
    pub fn reason_string(&self) -> Option<&'a str> {
        self.properties.utf8_string(util::property::REASON_STRING)
    }
}

impl EncodePacket for ConnAck<'_> {
    fn encode(&self, buf: &mut [u8]) -> Result<usize, CodecError> {
        let mut cursor = 1 + LENGTH_RESERVE;
        write_u8(&mut cursor, buf, u8::from(self.session_present))?;
        write_u8(&mut cursor, buf, self.reason_code)?;
        write_properties(&mut cursor, buf, &self.properties)?;
        finish_frame(buf, CONNACK << 4, cursor)
    }
}

impl<'a> DecodePacket<'a> for ConnAck<'a> {
    fn decode(buf: &'a [u8]) -> Result<Self, CodecError> {
        let mut cursor = 0;
        let end = read_fixed_header(&mut cursor, buf, CONNACK)?;
        let buf = &buf[..end];

        let session_present = read_u8(&mut cursor, buf)? & 0x01 != 0;
        let reason_code = read_u8(&mut cursor, buf)?;
        // Pre-v5 brokers answer with a bare two-byte CONNACK.
        let properties = if cursor < end {
            read_properties(&mut cursor, buf)?
        } else {
            Properties::empty()
        };
        properties.validate()?;

        Ok(Self {
            session_present,
            reason_code,
            properties,
        })
    }
}

// --- DISCONNECT Packet ---
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Disconnect {
    pub reason_code: u8,
}

impl EncodePacket for Disconnect {
    fn encode(&self, buf: &mut [u8]) -> Result<usize, CodecError> {
        let mut cursor = 1 + LENGTH_RESERVE;
        // A normal disconnection may omit the reason code entirely.
        if self.reason_code != 0 {
            write_u8(&mut cursor, buf, self.reason_code)?;
        }
        finish_frame(buf, DISCONNECT << 4, cursor)
    }
}

impl<'a> DecodePacket<'a> for Disconnect {
    fn decode(buf: &'a [u8]) -> Result<Self, CodecError> {
        let mut cursor = 0;
        let end = read_fixed_header(&mut cursor, buf, DISCONNECT)?;
        let reason_code = if cursor < end {
            read_u8(&mut cursor, &buf[..end])?
        } else {
            0
        };
        Ok(Self { reason_code })
    }
}
