//! # Capability Report
//!
//! The fixed, human-readable listing of everything a session negotiated:
//! boolean capabilities first, then scalars, each in a stable order.

use core::fmt;

use crate::capability::{BooleanCapability, ScalarCapability, ScalarValue};
use crate::error::CapabilityError;
use crate::session::Session;
use crate::transport::Transport;

/// Boolean capabilities in report order, with their labels.
pub const BOOLEAN_REPORT: [(BooleanCapability, &str); 6] = [
    (BooleanCapability::PubGuaranteed, "Guaranteed Publish Flow"),
    (BooleanCapability::SubFlowGuaranteed, "Guaranteed Subscription Flow"),
    (BooleanCapability::EndpointManagement, "Endpoint Management"),
    (BooleanCapability::TempEndpoint, "Temporary Endpoints"),
    (BooleanCapability::Browser, "Queue Browser"),
    (
        BooleanCapability::SubscriptionManager,
        "On-Behalf-Of Subscription Manager",
    ),
];

/// Scalar capabilities in report order, with their labels.
pub const SCALAR_REPORT: [(ScalarCapability, &str); 4] = [
    (ScalarCapability::PeerSoftwareVersion, "Peer Software Version"),
    (ScalarCapability::PeerRouterName, "Message Router Name"),
    (ScalarCapability::MaxDirectMsgSize, "MAX Direct Message Size"),
    (ScalarCapability::MaxGuaranteedMsgSize, "MAX Guaranteed Message Size"),
];

/// One printed line of the report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportLine<'s> {
    Flag { label: &'static str, allowed: bool },
    Value { label: &'static str, value: &'s ScalarValue },
}

impl fmt::Display for ReportLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportLine::Flag {
                label,
                allowed: true,
            } => write!(f, "{label} - Allowed"),
            ReportLine::Flag {
                label,
                allowed: false,
            } => write!(f, "{label} - Not Allowed"),
            ReportLine::Value { label, value } => write!(f, "{label} = {value}"),
        }
    }
}

/// Queries every capability in report order, one line per query.
///
/// The walk ends after the first failing query: a scalar the broker did not
/// report yields [`CapabilityError::NotPresent`] and nothing follows it. Lines
/// before the failure are still produced, so callers can print as they go.
pub fn lines<'s, T: Transport, const BUF_SIZE: usize>(
    session: &'s Session<'_, T, BUF_SIZE>,
) -> impl Iterator<Item = Result<ReportLine<'s>, CapabilityError>> {
    let flags = BOOLEAN_REPORT.into_iter().map(move |(tag, label)| {
        session
            .is_capable(tag)
            .map(|allowed| ReportLine::Flag { label, allowed })
    });
    let values = SCALAR_REPORT.into_iter().map(move |(tag, label)| {
        session
            .capability(tag)
            .map(|value| ReportLine::Value { label, value })
    });
    let mut failed = false;
    flags.chain(values).take_while(move |line| {
        let keep = !failed;
        failed |= line.is_err();
        keep
    })
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;
    use crate::options::ConnectionParameters;
    use crate::packet::{ConnAck, EncodePacket};
    use crate::session::SessionState;
    use crate::util::{Properties, Property, encode_properties};
    use core::convert::Infallible;
    use embassy_futures::block_on;

    struct Reply<'a>(&'a [u8]);

    impl Transport for Reply<'_> {
        type Error = Infallible;

        async fn send(&mut self, _buf: &[u8]) -> Result<(), Self::Error> {
            Ok(())
        }

        async fn recv(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
            let n = self.0.len().min(buf.len());
            buf[..n].copy_from_slice(&self.0[..n]);
            self.0 = &self.0[n..];
            Ok(n)
        }
    }

    fn user(key: &'static str, value: &'static str) -> Property<'static> {
        Property::UserProperty { key, value }
    }

    /// Connects against a broker reporting `props` and renders the walk.
    fn render(props: &[Property<'_>]) -> Vec<Result<String, CapabilityError>> {
        let mut raw = [0u8; 512];
        let len = encode_properties(props, &mut raw).unwrap();
        let mut frame = [0u8; 600];
        let n = ConnAck::new(0, Properties::new(&raw[..len]))
            .encode(&mut frame)
            .unwrap();

        let params = ConnectionParameters::parse("broker", "u@vpn", "pw").unwrap();
        let session: Session<'_, _, 1024> =
            block_on(Session::open(Reply(&frame[..n]), params)).unwrap();
        lines(&session)
            .map(|line| line.map(|line| line.to_string()))
            .collect()
    }

    const SCALARS: [(&str, &str); 4] = [
        ("PEER_SOFTWARE_VERSION", "10.4.1"),
        ("PEER_ROUTER_NAME", "router-a"),
        ("MAX_DIRECT_MSG_SIZE", "10000"),
        ("MAX_GUARANTEED_MSG_SIZE", "30000000"),
    ];

    #[test]
    fn flags_are_reported_before_a_missing_scalar() {
        let report = render(&[
            user("PUB_GUARANTEED", "true"),
            user("SUB_FLOW_GUARANTEED", "false"),
        ]);

        assert_eq!(
            report,
            [
                Ok("Guaranteed Publish Flow - Allowed".to_string()),
                Ok("Guaranteed Subscription Flow - Not Allowed".to_string()),
                Ok("Endpoint Management - Not Allowed".to_string()),
                Ok("Temporary Endpoints - Not Allowed".to_string()),
                Ok("Queue Browser - Not Allowed".to_string()),
                Ok("On-Behalf-Of Subscription Manager - Not Allowed".to_string()),
                Err(CapabilityError::NotPresent(
                    ScalarCapability::PeerSoftwareVersion
                )),
            ]
        );
    }

    #[test]
    fn walk_stops_at_first_failure() {
        let report = render(&[user("PEER_SOFTWARE_VERSION", "10.4.1")]);
        assert_eq!(report.len(), 8);
        assert_eq!(report[6].as_deref(), Ok("Peer Software Version = 10.4.1"));
        assert_eq!(
            report[7],
            Err(CapabilityError::NotPresent(ScalarCapability::PeerRouterName))
        );
    }

    #[test]
    fn integers_render_without_grouping() {
        let props: Vec<_> = SCALARS.iter().map(|&(k, v)| user(k, v)).collect();
        let report = render(&props);
        assert_eq!(report.len(), 10);
        assert_eq!(report[8].as_deref(), Ok("MAX Direct Message Size = 10000"));
        assert_eq!(
            report[9].as_deref(),
            Ok("MAX Guaranteed Message Size = 30000000")
        );
        assert_eq!(report[7].as_deref(), Ok("Message Router Name = router-a"));
    }

    #[test]
    fn closed_session_has_no_report() {
        let mut frame = [0u8; 16];
        let n = ConnAck::new(0, Properties::empty()).encode(&mut frame).unwrap();
        let params = ConnectionParameters::parse("broker", "u@vpn", "pw").unwrap();
        let mut session: Session<'_, _, 256> =
            block_on(Session::open(Reply(&frame[..n]), params)).unwrap();
        block_on(session.close());
        assert_eq!(
            lines(&session).collect::<Vec<_>>(),
            [Err(CapabilityError::InvalidState(SessionState::Closed))]
        );
    }
}
