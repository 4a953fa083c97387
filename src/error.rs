//! # Error Types
//!
//! Errors raised while establishing a session, decoding the broker's handshake
//! reply, and querying the negotiated capability table. Argument errors live
//! next to the parsers in [`crate::options`].

use crate::capability::ScalarCapability;
use crate::session::SessionState;

/// Failure to bring a session up to `Connected`.
///
/// It is generic over the transport error type `T`, so TCP, UART or in-memory
/// transports surface their own errors unchanged. No variant is retried by the
/// client; the caller decides whether to connect again.
#[derive(Debug, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnectError<T> {
    /// The underlying transport failed (unreachable host, reset, I/O timeout).
    #[error("transport failure: {0:?}")]
    Transport(T),
    /// The broker's reply violated the handshake framing.
    #[error("protocol error: {0}")]
    Protocol(ProtocolError),
    /// The broker refused the connection. The enclosed code provides the reason.
    #[error("connection refused by broker: {0}")]
    ConnectionRefused(ConnectReasonCode),
    /// A frame did not fit the session buffer.
    #[error("handshake frame does not fit the session buffer")]
    BufferTooSmall,
    /// The broker did not answer within the configured timeout.
    #[error("timed out waiting for the broker")]
    Timeout,
    /// `connect` was called on a session that is not `Disconnected`.
    #[error("cannot connect a session in state {0}")]
    InvalidState(SessionState),
}

impl<T> From<ProtocolError> for ConnectError<T> {
    fn from(err: ProtocolError) -> Self {
        ConnectError::Protocol(err)
    }
}

impl<T> From<CodecError> for ConnectError<T> {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::Protocol(p) => ConnectError::Protocol(p),
            CodecError::BufferTooSmall => ConnectError::BufferTooSmall,
        }
    }
}

/// Errors produced by the packet codec.
///
/// Encoding and decoding never touch the transport, so they use this
/// transport-free error and are lifted into [`ConnectError`] with `?`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CodecError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("buffer too small")]
    BufferTooSmall,
}

/// Represents the reason codes for a connection refusal (`CONNACK`).
///
/// Covers both the MQTT 3.1.1 return codes and the MQTT 5 reason codes a
/// broker may use to reject a `CONNECT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnectReasonCode {
    /// The connection was accepted.
    Success,
    /// The broker does not support the requested protocol version.
    UnacceptableProtocolVersion,
    /// The client identifier is not valid.
    IdentifierRejected,
    /// The broker is unavailable.
    ServerUnavailable,
    /// The username or password is not valid.
    BadUserNameOrPassword,
    /// The client is not authorized to connect.
    NotAuthorized,
    /// Unspecified error (0x80).
    UnspecifiedError,
    /// The broker could not parse the `CONNECT` (0x81).
    MalformedPacket,
    /// The broker rejected a field of the `CONNECT` (0x82).
    ProtocolError,
    /// The broker is too busy to accept the session (0x89).
    ServerBusy,
    /// The client is banned (0x8A).
    Banned,
    /// The requested virtual routing domain does not exist or is disabled.
    /// Brokers report it as "bad authentication method" (0x8C).
    BadAuthenticationMethod,
    /// Quota exceeded (0x97).
    QuotaExceeded,
    /// Connection rate exceeded (0x9F).
    ConnectionRateExceeded,
    /// An unknown or unspecified error occurred.
    Other(u8),
}

impl From<u8> for ConnectReasonCode {
    fn from(val: u8) -> Self {
        match val {
            0x00 => Self::Success,
            0x01 | 0x84 => Self::UnacceptableProtocolVersion,
            0x02 | 0x85 => Self::IdentifierRejected,
            0x03 | 0x88 => Self::ServerUnavailable,
            0x04 | 0x86 => Self::BadUserNameOrPassword,
            0x05 | 0x87 => Self::NotAuthorized,
            0x80 => Self::UnspecifiedError,
            0x81 => Self::MalformedPacket,
            0x82 => Self::ProtocolError,
            0x89 => Self::ServerBusy,
            0x8A => Self::Banned,
            0x8C => Self::BadAuthenticationMethod,
            0x97 => Self::QuotaExceeded,
            0x9F => Self::ConnectionRateExceeded,
            _ => Self::Other(val),
        }
    }
}

impl core::fmt::Display for ConnectReasonCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let text = match self {
            Self::Success => "success",
            Self::UnacceptableProtocolVersion => "unacceptable protocol version",
            Self::IdentifierRejected => "client identifier rejected",
            Self::ServerUnavailable => "server unavailable",
            Self::BadUserNameOrPassword => "bad username or password",
            Self::NotAuthorized => "not authorized",
            Self::UnspecifiedError => "unspecified error",
            Self::MalformedPacket => "malformed packet",
            Self::ProtocolError => "protocol error",
            Self::ServerBusy => "server busy",
            Self::Banned => "banned",
            Self::BadAuthenticationMethod => "bad authentication method",
            Self::QuotaExceeded => "quota exceeded",
            Self::ConnectionRateExceeded => "connection rate exceeded",
            Self::Other(code) => return write!(f, "reason code {code:#04x}"),
        };
        f.write_str(text)
    }
}

/// Enumerates handshake protocol errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProtocolError {
    /// An invalid packet type was received.
    #[error("invalid packet type {0}")]
    InvalidPacketType(u8),
    /// The broker sent something other than the expected reply.
    #[error("unexpected response from broker")]
    InvalidResponse,
    /// The connection was closed by the broker.
    #[error("connection closed by broker")]
    ConnectionClosed,
    /// A packet was received that was not correctly formed.
    #[error("malformed packet")]
    MalformedPacket,
    /// A field exceeds the maximum size the codec can represent or hold.
    #[error("payload too large")]
    PayloadTooLarge,
    /// A string was not valid UTF-8.
    #[error("invalid UTF-8 string")]
    InvalidUtf8String,
    /// A property identifier not defined for the handshake packets.
    #[error("unknown property identifier {0:#04x}")]
    UnknownProperty(u8),
    /// A capability was reported with a value of the wrong type.
    #[error("capability reported with a value of the wrong type")]
    InvalidCapabilityValue,
    /// The same capability was reported twice.
    #[error("capability reported more than once")]
    DuplicateCapability,
}

/// A capability query that could not be answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CapabilityError {
    /// The session is not `Connected`; the table does not exist.
    #[error("capabilities are unavailable while the session is {0}")]
    InvalidState(SessionState),
    /// The broker did not report this scalar capability.
    #[error("broker did not report {0}")]
    NotPresent(ScalarCapability),
}
