//! # Transport Abstraction
//!
//! This module defines the `Transport` trait, which abstracts the byte stream a
//! session runs over, allowing the handshake and capability logic to stay
//! hardware and network-stack agnostic.
//!
//! Two implementations ship with the crate:
//!
//! - [`TcpTransport`] over an `embassy-net` socket (feature `embassy-net`).
//! - [`StdTcpTransport`] over a blocking `std::net::TcpStream` (feature `std`).
//!   Its futures complete without suspending, so it is driven with
//!   `embassy_futures::block_on`.

/// A reliable, ordered byte stream to the broker.
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// The error type returned by the transport.
    type Error: TransportError;

    /// Sends the whole buffer over the transport.
    async fn send(&mut self, buf: &[u8]) -> Result<(), Self::Error>;

    /// Receives data from the transport into a buffer.
    ///
    /// Returns the number of bytes read; `0` means the peer closed the stream.
    async fn recv(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;

    /// Releases the underlying connection. Called at most once per session.
    async fn close(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// A marker trait for transport-related errors.
pub trait TransportError: core::fmt::Debug {
    /// Whether the error means the peer did not answer in time.
    fn is_timeout(&self) -> bool {
        false
    }
}

impl TransportError for core::convert::Infallible {}

#[cfg(feature = "std")]
impl TransportError for std::io::Error {
    fn is_timeout(&self) -> bool {
        matches!(
            self.kind(),
            std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
        )
    }
}

impl<T: Transport + ?Sized> Transport for &mut T {
    type Error = T::Error;

    async fn send(&mut self, buf: &[u8]) -> Result<(), Self::Error> {
        (**self).send(buf).await
    }

    async fn recv(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        (**self).recv(buf).await
    }

    async fn close(&mut self) -> Result<(), Self::Error> {
        (**self).close().await
    }
}

#[cfg(feature = "embassy-net")]
pub use self::embassy::{TcpTransport, TcpTransportError};

#[cfg(feature = "std")]
pub use self::std_tcp::StdTcpTransport;

#[cfg(feature = "embassy-net")]
mod embassy {
    use super::{Transport, TransportError};
    use embassy_net::tcp::{Error as TcpError, TcpSocket};
    use embassy_time::{Duration, Timer};
    use embedded_io_async::Write;

    /// Errors raised by [`TcpTransport`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub enum TcpTransportError {
        /// The socket reported an error.
        Tcp(TcpError),
        /// No data arrived before the read timeout elapsed.
        Timeout,
    }

    impl TransportError for TcpTransportError {
        fn is_timeout(&self) -> bool {
            matches!(self, TcpTransportError::Timeout)
        }
    }

    /// TCP transport implementation using `embassy-net`.
    pub struct TcpTransport<'a> {
        socket: TcpSocket<'a>,
        timeout: Duration,
    }

    impl<'a> TcpTransport<'a> {
        /// Creates a new `TcpTransport` over a connected socket.
        pub fn new(socket: TcpSocket<'a>, timeout: Duration) -> Self {
            Self { socket, timeout }
        }

        async fn read_with_timeout(&mut self, buf: &mut [u8]) -> Result<usize, TcpTransportError> {
            let read_fut = self.socket.read(buf);
            let timer = Timer::after(self.timeout);

            match futures::future::select(core::pin::pin!(read_fut), core::pin::pin!(timer)).await
            {
                futures::future::Either::Left((Ok(n), _)) => {
                    trace!("tcp read: {} bytes", n);
                    Ok(n)
                }
                futures::future::Either::Left((Err(e), _)) => {
                    debug!("tcp read error: {:?}", e);
                    Err(TcpTransportError::Tcp(e))
                }
                futures::future::Either::Right(((), _)) => {
                    debug!("tcp read timed out");
                    Err(TcpTransportError::Timeout)
                }
            }
        }
    }

    impl<'a> Transport for TcpTransport<'a> {
        type Error = TcpTransportError;

        async fn send(&mut self, buf: &[u8]) -> Result<(), Self::Error> {
            trace!("tcp write: {} bytes", buf.len());
            self.socket
                .write_all(buf)
                .await
                .map_err(TcpTransportError::Tcp)?;
            self.socket.flush().await.map_err(TcpTransportError::Tcp)
        }

        async fn recv(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
            self.read_with_timeout(buf).await
        }

        async fn close(&mut self) -> Result<(), Self::Error> {
            self.socket.close();
            self.socket.flush().await.map_err(TcpTransportError::Tcp)
        }
    }
}

#[cfg(feature = "std")]
mod std_tcp {
    use super::Transport;
    use std::io::{self, Read, Write};
    use std::net::{Shutdown, TcpStream, ToSocketAddrs};
    use std::time::Duration;

    /// Blocking TCP transport over `std::net`.
    ///
    /// Timeouts are enforced by the socket itself, so a stalled broker surfaces
    /// as an `io::Error` of kind `WouldBlock` or `TimedOut`.
    #[derive(Debug)]
    pub struct StdTcpTransport {
        stream: TcpStream,
    }

    impl StdTcpTransport {
        /// Connects to the first reachable address of `host:port`.
        pub fn connect(host: &str, port: u16, timeout: Duration) -> io::Result<Self> {
            let mut last_err = None;
            for addr in (host, port).to_socket_addrs()? {
                debug!("connecting to {}", addr);
                match TcpStream::connect_timeout(&addr, timeout) {
                    Ok(stream) => return Self::from_stream(stream, timeout),
                    Err(err) => {
                        debug!("connect to {} failed: {}", addr, err);
                        last_err = Some(err);
                    }
                }
            }
            Err(last_err.unwrap_or_else(|| {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("{host}:{port} did not resolve to any address"),
                )
            }))
        }

        /// Wraps an already connected stream, applying read and write timeouts.
        pub fn from_stream(stream: TcpStream, timeout: Duration) -> io::Result<Self> {
            stream.set_read_timeout(Some(timeout))?;
            stream.set_write_timeout(Some(timeout))?;
            stream.set_nodelay(true)?;
            Ok(Self { stream })
        }
    }

    impl Transport for StdTcpTransport {
        type Error = io::Error;

        async fn send(&mut self, buf: &[u8]) -> Result<(), Self::Error> {
            trace!("tcp write: {} bytes", buf.len());
            self.stream.write_all(buf)?;
            self.stream.flush()
        }

        async fn recv(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
            let n = self.stream.read(buf)?;
            trace!("tcp read: {} bytes", n);
            Ok(n)
        }

        async fn close(&mut self) -> Result<(), Self::Error> {
            match self.stream.shutdown(Shutdown::Both) {
                // The broker may already have dropped its side.
                Err(err) if err.kind() == io::ErrorKind::NotConnected => Ok(()),
                other => other,
            }
        }
    }
}
