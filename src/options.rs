//! # Connection Parameters
//!
//! Everything a session needs before it can connect: where the broker is, who
//! the client is, and the timing knobs. Parameters borrow their strings, so
//! they work without an allocator, and are immutable once built.

use core::time::Duration;

/// Port used when the endpoint does not name one.
pub const DEFAULT_PORT: u16 = 1883;
/// Client identifier sent when the caller does not choose one.
pub const DEFAULT_CLIENT_ID: &str = "capability-detection";
pub const DEFAULT_KEEP_ALIVE_SECS: u16 = 60;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Caller input that cannot be turned into connection parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ArgumentError {
    #[error("endpoint must name a host")]
    MissingHost,
    #[error("endpoint port must be a number between 1 and 65535")]
    InvalidPort,
    #[error("identity must have the form username@domain")]
    MissingSeparator,
    #[error("identity is missing the username before '@'")]
    MissingUsername,
    #[error("identity is missing the domain after '@'")]
    MissingDomain,
}

/// A broker address, `host[:port]`. IPv6 hosts are written in brackets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint<'a> {
    pub host: &'a str,
    pub port: u16,
}

impl<'a> Endpoint<'a> {
    pub fn parse(raw: &'a str) -> Result<Self, ArgumentError> {
        let raw = raw.trim();
        let (host, port) = if let Some(rest) = raw.strip_prefix('[') {
            let (host, after) = rest.split_once(']').ok_or(ArgumentError::MissingHost)?;
            match after {
                "" => (host, None),
                _ => (
                    host,
                    Some(after.strip_prefix(':').ok_or(ArgumentError::InvalidPort)?),
                ),
            }
        } else {
            match raw.split_once(':') {
                Some((host, port)) => (host, Some(port)),
                None => (raw, None),
            }
        };

        if host.is_empty() {
            return Err(ArgumentError::MissingHost);
        }
        let port = match port {
            None => DEFAULT_PORT,
            Some(port) => match port.parse::<u16>() {
                Ok(0) | Err(_) => return Err(ArgumentError::InvalidPort),
                Ok(port) => port,
            },
        };
        Ok(Self { host, port })
    }
}

/// The client's identity, `username@domain`.
///
/// The domain is everything after the last `@`, so usernames may themselves
/// contain `@` (for example e-mail addresses).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity<'a> {
    pub username: &'a str,
    pub domain: &'a str,
}

impl<'a> Identity<'a> {
    pub fn parse(raw: &'a str) -> Result<Self, ArgumentError> {
        let (username, domain) = raw.rsplit_once('@').ok_or(ArgumentError::MissingSeparator)?;
        if username.is_empty() {
            return Err(ArgumentError::MissingUsername);
        }
        if domain.is_empty() {
            return Err(ArgumentError::MissingDomain);
        }
        Ok(Self { username, domain })
    }
}

/// Parameters for a single session.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ConnectionParameters<'a> {
    host: &'a str,
    port: u16,
    username: &'a str,
    password: &'a str,
    vpn_name: &'a str,
    client_id: &'a str,
    keep_alive_secs: u16,
    timeout: Duration,
}

impl<'a> ConnectionParameters<'a> {
    pub fn new(endpoint: Endpoint<'a>, identity: Identity<'a>, password: &'a str) -> Self {
        Self {
            host: endpoint.host,
            port: endpoint.port,
            username: identity.username,
            password,
            vpn_name: identity.domain,
            client_id: DEFAULT_CLIENT_ID,
            keep_alive_secs: DEFAULT_KEEP_ALIVE_SECS,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Parses `host[:port]` and `username@domain` into parameters.
    ///
    /// No network activity happens here, so malformed input is rejected
    /// before any connection attempt.
    pub fn parse(endpoint: &'a str, identity: &'a str, password: &'a str) -> Result<Self, ArgumentError> {
        Ok(Self::new(
            Endpoint::parse(endpoint)?,
            Identity::parse(identity)?,
            password,
        ))
    }

    pub fn with_client_id(mut self, client_id: &'a str) -> Self {
        self.client_id = client_id;
        self
    }

    pub fn with_keep_alive(mut self, secs: u16) -> Self {
        self.keep_alive_secs = secs;
        self
    }

    /// Upper bound for connecting and for each read or write of the handshake.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn host(&self) -> &'a str {
        self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn username(&self) -> &'a str {
        self.username
    }

    pub fn password(&self) -> &'a str {
        self.password
    }

    /// The virtual routing domain the session is scoped to.
    pub fn vpn_name(&self) -> &'a str {
        self.vpn_name
    }

    pub fn client_id(&self) -> &'a str {
        self.client_id
    }

    pub fn keep_alive_secs(&self) -> u16 {
        self.keep_alive_secs
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl core::fmt::Debug for ConnectionParameters<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ConnectionParameters")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("vpn_name", &self.vpn_name)
            .field("client_id", &self.client_id)
            .field("keep_alive_secs", &self.keep_alive_secs)
            .field("timeout", &self.timeout)
            .finish()
    }
}
