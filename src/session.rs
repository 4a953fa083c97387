//! # Capability Session
//!
//! A [`Session`] owns one connection to a broker and the capabilities the
//! broker reported while accepting it.
//!
//! ```text
//! Disconnected --connect--> Connecting --CONNACK accepted--> Connected
//!                               |                               |
//!                               +--failure--> Closed <--close---+
//! ```
//!
//! Capability queries are only answered in `Connected`; in every other state
//! they fail with [`CapabilityError::InvalidState`].

use core::fmt;

use crate::capability::{BooleanCapability, CapabilityTable, ScalarCapability, ScalarValue};
use crate::error::{CapabilityError, ConnectError, ProtocolError};
use crate::options::ConnectionParameters;
use crate::packet::{self, Connect, Disconnect, EncodePacket, Packet};
use crate::transport::{Transport, TransportError};
use crate::util::{Properties, Property, encode_properties};

/// Session buffer size used when the caller has no reason to pick another.
pub const DEFAULT_BUFFER_SIZE: usize = 2048;

/// User-property key carrying the virtual routing domain in `CONNECT`.
pub const VPN_NAME_PROPERTY: &str = "vpn-name";

/// Scratch space for the `CONNECT` property list.
const CONNECT_PROPERTIES_SIZE: usize = 256;

/// Lifecycle of a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting => "connecting",
            SessionState::Connected => "connected",
            SessionState::Closed => "closed",
        })
    }
}

/// A capability-negotiating session over transport `T`.
///
/// `BUF_SIZE` bounds the largest handshake frame; a `CONNACK` that does not
/// fit fails the connect with [`ConnectError::BufferTooSmall`].
pub struct Session<'p, T: Transport, const BUF_SIZE: usize> {
    transport: Option<T>,
    params: ConnectionParameters<'p>,
    state: SessionState,
    capabilities: Option<CapabilityTable>,
    buf: [u8; BUF_SIZE],
}

impl<'p, T: Transport, const BUF_SIZE: usize> Session<'p, T, BUF_SIZE> {
    /// Creates a `Disconnected` session over an open transport.
    pub fn new(transport: T, params: ConnectionParameters<'p>) -> Self {
        Self {
            transport: Some(transport),
            params,
            state: SessionState::Disconnected,
            capabilities: None,
            buf: [0; BUF_SIZE],
        }
    }

    /// Creates a session and connects it in one step.
    pub async fn open(
        transport: T,
        params: ConnectionParameters<'p>,
    ) -> Result<Self, ConnectError<T::Error>> {
        let mut session = Self::new(transport, params);
        session.connect().await?;
        Ok(session)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn params(&self) -> &ConnectionParameters<'p> {
        &self.params
    }

    /// Authenticates and negotiates capabilities.
    ///
    /// Only valid on a `Disconnected` session. Any failure closes the session
    /// and releases the transport; nothing is retried.
    pub async fn connect(&mut self) -> Result<(), ConnectError<T::Error>> {
        if self.state != SessionState::Disconnected {
            return Err(ConnectError::InvalidState(self.state));
        }
        self.state = SessionState::Connecting;
        debug!(
            "connecting to {}:{} as {}@{}",
            self.params.host(),
            self.params.port(),
            self.params.username(),
            self.params.vpn_name()
        );

        match self.handshake().await {
            Ok(table) => {
                info!(
                    "session established with {}:{} ({} capabilities reported)",
                    self.params.host(),
                    self.params.port(),
                    table.len()
                );
                for (id, value) in table.iter() {
                    debug!("capability {} = {:?}", id.wire_name(), value);
                }
                self.capabilities = Some(table);
                self.state = SessionState::Connected;
                Ok(())
            }
            Err(err) => {
                warn!("connect failed: {:?}", err);
                self.release().await;
                Err(err)
            }
        }
    }

    async fn handshake(&mut self) -> Result<CapabilityTable, ConnectError<T::Error>> {
        let Self {
            transport,
            params,
            buf,
            ..
        } = self;
        let transport = transport
            .as_mut()
            .ok_or(ConnectError::InvalidState(SessionState::Closed))?;

        let mut props = [0u8; CONNECT_PROPERTIES_SIZE];
        let props_len = encode_properties(
            &[Property::UserProperty {
                key: VPN_NAME_PROPERTY,
                value: params.vpn_name(),
            }],
            &mut props,
        )?;
        let connect = Connect::new(params.client_id(), params.keep_alive_secs())
            .with_credentials(params.username(), params.password().as_bytes())
            .with_properties(Properties::new(&props[..props_len]));
        let len = connect.encode(buf)?;
        transport.send(&buf[..len]).await.map_err(transport_error)?;

        let frame = read_frame(transport, buf).await?;
        let ack = match packet::decode(&buf[..frame])? {
            Packet::ConnAck(ack) => ack,
            other => {
                debug!("expected CONNACK, got {:?}", other);
                return Err(ProtocolError::InvalidResponse.into());
            }
        };

        let reason = ack.reason();
        if ack.reason_code != 0 {
            if let Some(detail) = ack.reason_string() {
                warn!("broker refused connection: {} ({})", reason, detail);
            }
            return Err(ConnectError::ConnectionRefused(reason));
        }

        Ok(CapabilityTable::from_properties(ack.properties)?)
    }

    /// Whether the broker granted a boolean capability.
    ///
    /// A capability the broker did not report is treated as not granted.
    pub fn is_capable(&self, tag: BooleanCapability) -> Result<bool, CapabilityError> {
        Ok(self.capabilities()?.is_capable(tag))
    }

    /// The value the broker reported for a scalar capability.
    pub fn capability(&self, tag: ScalarCapability) -> Result<&ScalarValue, CapabilityError> {
        self.capabilities()?
            .scalar(tag)
            .ok_or(CapabilityError::NotPresent(tag))
    }

    /// The whole negotiated table.
    pub fn capabilities(&self) -> Result<&CapabilityTable, CapabilityError> {
        match (self.state, &self.capabilities) {
            (SessionState::Connected, Some(table)) => Ok(table),
            _ => Err(CapabilityError::InvalidState(self.state)),
        }
    }

    /// Ends the session and releases the transport.
    ///
    /// A connected session says goodbye with `DISCONNECT` first. Closing a
    /// closed session does nothing.
    pub async fn close(&mut self) {
        match self.state {
            SessionState::Closed => return,
            SessionState::Connected => {
                if let Err(err) = self.send_disconnect().await {
                    debug!("DISCONNECT not delivered: {:?}", err);
                }
            }
            SessionState::Disconnected | SessionState::Connecting => {}
        }
        self.release().await;
        info!("session closed");
    }

    async fn send_disconnect(&mut self) -> Result<(), ConnectError<T::Error>> {
        let len = Disconnect::default().encode(&mut self.buf)?;
        if let Some(transport) = self.transport.as_mut() {
            transport
                .send(&self.buf[..len])
                .await
                .map_err(transport_error)?;
        }
        Ok(())
    }

    async fn release(&mut self) {
        self.capabilities = None;
        self.state = SessionState::Closed;
        if let Some(mut transport) = self.transport.take() {
            if let Err(err) = transport.close().await {
                debug!("transport close failed: {:?}", err);
            }
        }
    }
}

impl<T: Transport, const BUF_SIZE: usize> fmt::Debug for Session<'_, T, BUF_SIZE> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("params", &self.params)
            .field("state", &self.state)
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}

fn transport_error<E: TransportError>(err: E) -> ConnectError<E> {
    if err.is_timeout() {
        ConnectError::Timeout
    } else {
        ConnectError::Transport(err)
    }
}

/// Reads until one complete frame sits at the start of `buf`, returning its
/// length.
async fn read_frame<T: Transport>(
    transport: &mut T,
    buf: &mut [u8],
) -> Result<usize, ConnectError<T::Error>> {
    let mut filled = 0;
    loop {
        if let Some(len) = packet::frame_len(&buf[..filled])? {
            if len > buf.len() {
                return Err(ConnectError::BufferTooSmall);
            }
            if filled >= len {
                return Ok(len);
            }
        }
        if filled == buf.len() {
            return Err(ConnectError::BufferTooSmall);
        }
        let n = transport
            .recv(&mut buf[filled..])
            .await
            .map_err(transport_error)?;
        if n == 0 {
            return Err(ProtocolError::ConnectionClosed.into());
        }
        filled += n;
    }
}
