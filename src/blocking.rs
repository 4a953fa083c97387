//! Blocking entry points over `std::net`.

use std::io;

use embassy_futures::block_on;

use crate::error::ConnectError;
use crate::options::ConnectionParameters;
use crate::session::{DEFAULT_BUFFER_SIZE, Session};
use crate::transport::{StdTcpTransport, TransportError};

/// A session over a blocking TCP socket.
pub type BlockingSession<'p> = Session<'p, StdTcpTransport, DEFAULT_BUFFER_SIZE>;

/// Opens a TCP connection to the broker and negotiates capabilities.
///
/// Returns only once the session is `Connected` or has failed; the socket
/// timeouts come from [`ConnectionParameters::timeout`].
pub fn connect(params: ConnectionParameters<'_>) -> Result<BlockingSession<'_>, ConnectError<io::Error>> {
    let transport = StdTcpTransport::connect(params.host(), params.port(), params.timeout())
        .map_err(|err| {
            if err.is_timeout() {
                ConnectError::Timeout
            } else {
                ConnectError::Transport(err)
            }
        })?;
    block_on(Session::open(transport, params))
}

/// Closes a blocking session. Safe to call more than once.
pub fn close(session: &mut BlockingSession<'_>) {
    block_on(session.close())
}
