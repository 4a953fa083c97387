#![allow(dead_code)]

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpListener};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};
use broker_capabilities::ConnectionParameters;
use broker_capabilities::packet::{self, ConnAck, EncodePacket};
use broker_capabilities::transport::{Transport, TransportError};
use broker_capabilities::util::{Properties, Property, encode_properties};

/// Failures a [`MockTransport`] can be told to raise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockError {
    Reset,
    Timeout,
}

impl TransportError for MockError {
    fn is_timeout(&self) -> bool {
        matches!(self, MockError::Timeout)
    }
}

/// In-memory transport replaying scripted inbound chunks.
///
/// Each `recv` hands out at most one queued chunk; an empty queue reads as
/// end of stream.
#[derive(Debug, Default)]
pub struct MockTransport {
    inbound: VecDeque<Vec<u8>>,
    pub sent: Vec<Vec<u8>>,
    pub closed: usize,
    pub recv_error: Option<MockError>,
}

impl MockTransport {
    pub fn replying(reply: &[u8]) -> Self {
        Self::chunked(&[reply])
    }

    pub fn chunked(chunks: &[&[u8]]) -> Self {
        Self {
            inbound: chunks.iter().map(|chunk| chunk.to_vec()).collect(),
            ..Self::default()
        }
    }

    pub fn failing(err: MockError) -> Self {
        Self {
            recv_error: Some(err),
            ..Self::default()
        }
    }
}

impl Transport for MockTransport {
    type Error = MockError;

    async fn send(&mut self, buf: &[u8]) -> Result<(), Self::Error> {
        self.sent.push(buf.to_vec());
        Ok(())
    }

    async fn recv(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        if let Some(err) = self.recv_error {
            return Err(err);
        }
        let Some(mut chunk) = self.inbound.pop_front() else {
            return Ok(0);
        };
        let n = chunk.len().min(buf.len());
        buf[..n].copy_from_slice(&chunk[..n]);
        if n < chunk.len() {
            self.inbound.push_front(chunk.split_off(n));
        }
        Ok(n)
    }

    async fn close(&mut self) -> Result<(), Self::Error> {
        self.closed += 1;
        Ok(())
    }
}

pub fn params() -> ConnectionParameters<'static> {
    ConnectionParameters::parse("broker.local:55555", "alice@tenant-a", "s3cret")
        .expect("valid parameters")
}

/// Encodes a CONNACK carrying `caps` as user properties.
pub fn connack(reason_code: u8, caps: &[(&str, &str)]) -> Vec<u8> {
    let props: Vec<Property<'_>> = caps
        .iter()
        .map(|&(key, value)| Property::UserProperty { key, value })
        .collect();
    let mut raw = vec![0u8; 1024];
    let len = encode_properties(&props, &mut raw).expect("properties fit");
    let mut frame = vec![0u8; 1100];
    let n = ConnAck::new(reason_code, Properties::new(&raw[..len]))
        .encode(&mut frame)
        .expect("CONNACK fits");
    frame.truncate(n);
    frame
}

/// A complete set of capabilities, as a permissive broker reports them.
pub const FULL_CAPABILITIES: [(&str, &str); 10] = [
    ("PUB_GUARANTEED", "true"),
    ("SUB_FLOW_GUARANTEED", "false"),
    ("ENDPOINT_MANAGEMENT", "TRUE"),
    ("TEMP_ENDPOINT", "true"),
    ("BROWSER", "false"),
    ("SUBSCRIPTION_MANAGER", "false"),
    ("PEER_SOFTWARE_VERSION", "10.4.1.32"),
    ("PEER_ROUTER_NAME", "edge-router-1"),
    ("MAX_DIRECT_MSG_SIZE", "10000000"),
    ("MAX_GUARANTEED_MSG_SIZE", "30000000"),
];

/// A single-connection broker on a loopback port.
///
/// It answers the first complete frame it receives with `reply`, then
/// records everything the client sends until the client hangs up.
pub struct FakeBroker {
    pub addr: SocketAddr,
    handle: JoinHandle<io::Result<Vec<u8>>>,
}

impl FakeBroker {
    pub fn spawn(reply: Vec<u8>) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").context("binding fake broker")?;
        let addr = listener.local_addr()?;
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept()?;
            stream.set_read_timeout(Some(Duration::from_secs(5)))?;

            let mut received = Vec::new();
            let mut chunk = [0u8; 512];
            loop {
                let done = packet::frame_len(&received)
                    .ok()
                    .flatten()
                    .is_some_and(|len| received.len() >= len);
                if done {
                    break;
                }
                let n = stream.read(&mut chunk)?;
                if n == 0 {
                    return Ok(received);
                }
                received.extend_from_slice(&chunk[..n]);
            }
            stream.write_all(&reply)?;

            loop {
                match stream.read(&mut chunk) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => received.extend_from_slice(&chunk[..n]),
                }
            }
            Ok(received)
        });
        Ok(Self { addr, handle })
    }

    pub fn endpoint(&self) -> String {
        self.addr.to_string()
    }

    /// Waits for the client to hang up and returns the bytes it sent.
    pub fn finish(self) -> Result<Vec<u8>> {
        let received = self
            .handle
            .join()
            .map_err(|_| anyhow::anyhow!("fake broker panicked"))?
            .context("fake broker I/O")?;
        Ok(received)
    }
}
