//! # Broker Capability Detection
//!
//! `broker-capabilities` connects to a message broker, authenticates, and
//! reads back the optional features the broker grants the client: whether it
//! may publish guaranteed messages, create endpoints, browse queues, how large
//! a message may be, and so on.
//!
//! ## Core Features
//!
//! - **`no_std` core:** Packets, capability parsing and the session state
//!   machine need neither the standard library nor an allocator. Bounded
//!   storage comes from `heapless`.
//! - **Transport Agnostic:** The session runs over anything implementing
//!   [`Transport`]: an `embassy-net` socket on embedded targets (feature
//!   `embassy-net`) or a blocking `std::net::TcpStream` on the host.
//! - **MQTT v5 handshake:** Credentials and the routing domain travel in
//!   `CONNECT`; capabilities come back as user properties in `CONNACK`.
//!
//! ## Usage
//!
//! With the `std` feature, [`blocking::connect`] does the whole handshake:
//!
//! ```no_run
//! use broker_capabilities::{BooleanCapability, ConnectionParameters, blocking};
//!
//! let params = ConnectionParameters::parse("broker.local:1883", "alice@default", "secret")?;
//! let mut session = blocking::connect(params)?;
//! if session.is_capable(BooleanCapability::PubGuaranteed)? {
//!     // publish persistent messages
//! }
//! blocking::close(&mut session);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! On embedded targets drive [`Session`] from an executor instead:
//!
//! ```ignore
//! let transport = TcpTransport::new(socket, Duration::from_secs(5));
//! let mut session = Session::<_, 1024>::open(transport, params).await?;
//! let max = session.capability(ScalarCapability::MaxDirectMsgSize)?;
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

// Must come first: the logging macros are used by every other module.
mod fmt;

#[cfg(feature = "std")]
pub mod blocking;
pub mod capability;
pub mod error;
pub mod options;
pub mod packet;
pub mod report;
pub mod session;
pub mod transport;
pub mod util;

// Re-export key types for easier access at the crate root.
pub use capability::{BooleanCapability, CapabilityTable, ScalarCapability, ScalarValue};
pub use error::{CapabilityError, ConnectError, ProtocolError};
pub use options::{ArgumentError, ConnectionParameters};
pub use session::{Session, SessionState};
pub use transport::Transport;

#[cfg(feature = "std")]
pub use transport::StdTcpTransport;
#[cfg(feature = "embassy-net")]
pub use transport::TcpTransport;
