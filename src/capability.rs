//! # Capabilities
//!
//! The closed set of capability tags a broker can report, their typed values,
//! and the table a session fills from the broker's `CONNACK`.
//!
//! Each capability travels as a user property whose key is the tag's wire
//! name (for example `PUB_GUARANTEED`). Boolean tags carry `true`/`false`,
//! integer tags a decimal `u32`, string tags arbitrary UTF-8 up to
//! [`MAX_TEXT_LEN`] bytes.

use core::fmt;

use heapless::{LinearMap, String};

use crate::error::{CodecError, ProtocolError};
use crate::util::{Properties, Property};

/// Maximum length of a string capability value, in bytes.
pub const MAX_TEXT_LEN: usize = 64;

/// Number of distinct capability tags; the table holds at most one of each.
pub const CAPABILITY_COUNT: usize = BooleanCapability::ALL.len() + ScalarCapability::ALL.len();

/// A bounded string capability value.
pub type Text = String<MAX_TEXT_LEN>;

/// Capabilities that are either granted or not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BooleanCapability {
    /// The client may publish guaranteed (persistent) messages.
    PubGuaranteed,
    /// The client may bind flows to endpoints and receive guaranteed messages.
    SubFlowGuaranteed,
    /// The client may create and delete durable endpoints.
    EndpointManagement,
    /// The client may create temporary endpoints.
    TempEndpoint,
    /// The client may browse queues without consuming.
    Browser,
    /// The client may manage subscriptions on behalf of other clients.
    SubscriptionManager,
}

impl BooleanCapability {
    pub const ALL: [Self; 6] = [
        Self::PubGuaranteed,
        Self::SubFlowGuaranteed,
        Self::EndpointManagement,
        Self::TempEndpoint,
        Self::Browser,
        Self::SubscriptionManager,
    ];

    /// The user-property key this capability is reported under.
    pub const fn wire_name(self) -> &'static str {
        match self {
            Self::PubGuaranteed => "PUB_GUARANTEED",
            Self::SubFlowGuaranteed => "SUB_FLOW_GUARANTEED",
            Self::EndpointManagement => "ENDPOINT_MANAGEMENT",
            Self::TempEndpoint => "TEMP_ENDPOINT",
            Self::Browser => "BROWSER",
            Self::SubscriptionManager => "SUBSCRIPTION_MANAGER",
        }
    }
}

impl fmt::Display for BooleanCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// Capabilities that carry a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ScalarCapability {
    /// Software version of the broker (string).
    PeerSoftwareVersion,
    /// Name of the broker/router the session landed on (string).
    PeerRouterName,
    /// Largest direct message accepted, in bytes (integer).
    MaxDirectMsgSize,
    /// Largest guaranteed message accepted, in bytes (integer).
    MaxGuaranteedMsgSize,
}

/// The declared value type of a [`ScalarCapability`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    Text,
    Integer,
}

impl ScalarCapability {
    pub const ALL: [Self; 4] = [
        Self::PeerSoftwareVersion,
        Self::PeerRouterName,
        Self::MaxDirectMsgSize,
        Self::MaxGuaranteedMsgSize,
    ];

    /// The user-property key this capability is reported under.
    pub const fn wire_name(self) -> &'static str {
        match self {
            Self::PeerSoftwareVersion => "PEER_SOFTWARE_VERSION",
            Self::PeerRouterName => "PEER_ROUTER_NAME",
            Self::MaxDirectMsgSize => "MAX_DIRECT_MSG_SIZE",
            Self::MaxGuaranteedMsgSize => "MAX_GUARANTEED_MSG_SIZE",
        }
    }

    pub const fn kind(self) -> ScalarKind {
        match self {
            Self::PeerSoftwareVersion | Self::PeerRouterName => ScalarKind::Text,
            Self::MaxDirectMsgSize | Self::MaxGuaranteedMsgSize => ScalarKind::Integer,
        }
    }
}

impl fmt::Display for ScalarCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// Any capability tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CapabilityId {
    Boolean(BooleanCapability),
    Scalar(ScalarCapability),
}

impl CapabilityId {
    /// Resolves a wire name. Unknown names return `None` and are ignored by
    /// the table, so brokers can report capabilities this client predates.
    pub fn from_wire_name(name: &str) -> Option<Self> {
        BooleanCapability::ALL
            .into_iter()
            .find(|tag| tag.wire_name() == name)
            .map(Self::Boolean)
            .or_else(|| {
                ScalarCapability::ALL
                    .into_iter()
                    .find(|tag| tag.wire_name() == name)
                    .map(Self::Scalar)
            })
    }

    pub const fn wire_name(self) -> &'static str {
        match self {
            Self::Boolean(tag) => tag.wire_name(),
            Self::Scalar(tag) => tag.wire_name(),
        }
    }
}

/// The value of a scalar capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScalarValue {
    Text(Text),
    Integer(u32),
}

impl ScalarValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ScalarValue::Text(text) => Some(text.as_str()),
            ScalarValue::Integer(_) => None,
        }
    }

    pub fn as_integer(&self) -> Option<u32> {
        match self {
            ScalarValue::Integer(value) => Some(*value),
            ScalarValue::Text(_) => None,
        }
    }

    pub fn kind(&self) -> ScalarKind {
        match self {
            ScalarValue::Text(_) => ScalarKind::Text,
            ScalarValue::Integer(_) => ScalarKind::Integer,
        }
    }
}

/// Integers render as plain decimal digits with no grouping.
impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::Text(text) => f.write_str(text),
            ScalarValue::Integer(value) => write!(f, "{value}"),
        }
    }
}

/// A stored capability value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CapabilityValue {
    Flag(bool),
    Scalar(ScalarValue),
}

/// The capabilities negotiated for one session.
///
/// Filled once from the broker's report and read-only afterwards: the session
/// only hands out shared references.
#[derive(Debug, Clone, Default)]
pub struct CapabilityTable {
    entries: LinearMap<CapabilityId, CapabilityValue, CAPABILITY_COUNT>,
}

impl CapabilityTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the table from `CONNACK` properties.
    ///
    /// User properties with a known wire name become entries; everything else
    /// is skipped.
    pub fn from_properties(properties: Properties<'_>) -> Result<Self, CodecError> {
        let mut table = Self::new();
        for prop in properties {
            match prop? {
                Property::UserProperty { key, value } => {
                    if !table.record(key, value)? {
                        debug!("ignoring unknown broker property {}={}", key, value);
                    }
                }
                other => trace!("ignoring CONNACK property {:#04x}", other.id()),
            }
        }
        Ok(table)
    }

    /// Parses and stores one reported capability.
    ///
    /// Returns `Ok(false)` when `key` is not a capability wire name.
    pub fn record(&mut self, key: &str, value: &str) -> Result<bool, ProtocolError> {
        let Some(id) = CapabilityId::from_wire_name(key) else {
            return Ok(false);
        };
        let parsed = match id {
            CapabilityId::Boolean(_) => CapabilityValue::Flag(parse_flag(value)?),
            CapabilityId::Scalar(tag) => CapabilityValue::Scalar(parse_scalar(tag.kind(), value)?),
        };
        self.insert(id, parsed)?;
        Ok(true)
    }

    /// Stores a value, rejecting duplicates and values of the wrong type.
    pub fn insert(&mut self, id: CapabilityId, value: CapabilityValue) -> Result<(), ProtocolError> {
        let matches_kind = match (id, &value) {
            (CapabilityId::Boolean(_), CapabilityValue::Flag(_)) => true,
            (CapabilityId::Scalar(tag), CapabilityValue::Scalar(scalar)) => {
                tag.kind() == scalar.kind()
            }
            _ => false,
        };
        if !matches_kind {
            return Err(ProtocolError::InvalidCapabilityValue);
        }
        if self.entries.contains_key(&id) {
            return Err(ProtocolError::DuplicateCapability);
        }
        self.entries
            .insert(id, value)
            .map_err(|_| ProtocolError::PayloadTooLarge)?;
        Ok(())
    }

    /// The reported flag, or `None` when the broker did not mention it.
    pub fn flag(&self, tag: BooleanCapability) -> Option<bool> {
        match self.entries.get(&CapabilityId::Boolean(tag)) {
            Some(CapabilityValue::Flag(flag)) => Some(*flag),
            _ => None,
        }
    }

    /// Whether the capability is granted. Not reported means not granted.
    pub fn is_capable(&self, tag: BooleanCapability) -> bool {
        self.flag(tag).unwrap_or(false)
    }

    pub fn scalar(&self, tag: ScalarCapability) -> Option<&ScalarValue> {
        match self.entries.get(&CapabilityId::Scalar(tag)) {
            Some(CapabilityValue::Scalar(value)) => Some(value),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CapabilityId, &CapabilityValue)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn parse_flag(value: &str) -> Result<bool, ProtocolError> {
    if value.eq_ignore_ascii_case("true") {
        Ok(true)
    } else if value.eq_ignore_ascii_case("false") {
        Ok(false)
    } else {
        Err(ProtocolError::InvalidCapabilityValue)
    }
}

fn parse_scalar(kind: ScalarKind, value: &str) -> Result<ScalarValue, ProtocolError> {
    match kind {
        // `u32::from_str` would also take a leading '+'.
        ScalarKind::Integer if value.bytes().all(|b| b.is_ascii_digit()) => value
            .parse::<u32>()
            .map(ScalarValue::Integer)
            .map_err(|_| ProtocolError::InvalidCapabilityValue),
        ScalarKind::Integer => Err(ProtocolError::InvalidCapabilityValue),
        ScalarKind::Text => Text::try_from(value)
            .map(ScalarValue::Text)
            .map_err(|_| ProtocolError::PayloadTooLarge),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::{encode_properties, property};

    fn table_from(props: &[Property<'_>]) -> Result<CapabilityTable, CodecError> {
        let mut raw = [0u8; 512];
        let len = encode_properties(props, &mut raw).unwrap();
        CapabilityTable::from_properties(Properties::new(&raw[..len]))
    }

    fn user<'a>(key: &'a str, value: &'a str) -> Property<'a> {
        Property::UserProperty { key, value }
    }

    #[test]
    fn wire_names_resolve_to_tags() {
        for tag in BooleanCapability::ALL {
            assert_eq!(
                CapabilityId::from_wire_name(tag.wire_name()),
                Some(CapabilityId::Boolean(tag))
            );
        }
        for tag in ScalarCapability::ALL {
            assert_eq!(
                CapabilityId::from_wire_name(tag.wire_name()),
                Some(CapabilityId::Scalar(tag))
            );
        }
        assert_eq!(CapabilityId::from_wire_name("pub_guaranteed"), None);
    }

    #[test]
    fn iter_yields_reported_entries_by_wire_name() {
        let table = table_from(&[
            user("BROWSER", "true"),
            user("MAX_DIRECT_MSG_SIZE", "512"),
        ])
        .unwrap();

        let mut seen = [("", false); 2];
        for (slot, (id, value)) in seen.iter_mut().zip(table.iter()) {
            *slot = (
                id.wire_name(),
                matches!(value, CapabilityValue::Flag(true))
                    || value == &CapabilityValue::Scalar(ScalarValue::Integer(512)),
            );
        }
        assert_eq!(table.iter().count(), 2);
        assert!(seen.contains(&("BROWSER", true)));
        assert!(seen.contains(&("MAX_DIRECT_MSG_SIZE", true)));
    }

    #[test]
    fn absent_flag_is_not_capable() {
        let table = table_from(&[
            user("PUB_GUARANTEED", "true"),
            user("SUB_FLOW_GUARANTEED", "false"),
        ])
        .unwrap();

        assert!(table.is_capable(BooleanCapability::PubGuaranteed));
        assert!(!table.is_capable(BooleanCapability::SubFlowGuaranteed));
        assert!(!table.is_capable(BooleanCapability::Browser));
        assert_eq!(table.flag(BooleanCapability::SubFlowGuaranteed), Some(false));
        assert_eq!(table.flag(BooleanCapability::Browser), None);
    }

    #[test]
    fn scalars_keep_their_declared_type() {
        let table = table_from(&[
            user("PEER_SOFTWARE_VERSION", "10.4.1.38"),
            user("MAX_DIRECT_MSG_SIZE", "10000"),
        ])
        .unwrap();

        let version = table.scalar(ScalarCapability::PeerSoftwareVersion).unwrap();
        assert_eq!(version.as_str(), Some("10.4.1.38"));
        assert_eq!(version.as_integer(), None);

        let size = table.scalar(ScalarCapability::MaxDirectMsgSize).unwrap();
        assert_eq!(size.as_integer(), Some(10_000));
        assert_eq!(table.scalar(ScalarCapability::PeerRouterName), None);
    }

    #[test]
    fn non_numeric_integer_is_rejected() {
        assert_eq!(
            table_from(&[user("MAX_GUARANTEED_MSG_SIZE", "10k")]).unwrap_err(),
            CodecError::Protocol(ProtocolError::InvalidCapabilityValue)
        );
    }

    #[test]
    fn signed_or_padded_integers_are_rejected() {
        for raw in ["+10000", "-1", " 10000", "10000 ", ""] {
            assert_eq!(
                table_from(&[user("MAX_DIRECT_MSG_SIZE", raw)]).unwrap_err(),
                CodecError::Protocol(ProtocolError::InvalidCapabilityValue),
                "{raw:?}"
            );
        }
    }

    #[test]
    fn flag_must_be_true_or_false() {
        assert_eq!(
            table_from(&[user("BROWSER", "1")]).unwrap_err(),
            CodecError::Protocol(ProtocolError::InvalidCapabilityValue)
        );
        let table = table_from(&[user("BROWSER", "TRUE")]).unwrap();
        assert!(table.is_capable(BooleanCapability::Browser));
    }

    #[test]
    fn duplicate_capability_is_rejected() {
        assert_eq!(
            table_from(&[user("BROWSER", "true"), user("BROWSER", "false")]).unwrap_err(),
            CodecError::Protocol(ProtocolError::DuplicateCapability)
        );
    }

    #[test]
    fn oversized_text_is_rejected() {
        let long = [b'x'; MAX_TEXT_LEN + 1];
        let long = core::str::from_utf8(&long).unwrap();
        assert_eq!(
            table_from(&[user("PEER_ROUTER_NAME", long)]).unwrap_err(),
            CodecError::Protocol(ProtocolError::PayloadTooLarge)
        );
    }

    #[test]
    fn unknown_and_standard_properties_are_ignored() {
        let table = table_from(&[
            user("x-broker-region", "eu-west"),
            Property::FourByteInteger {
                id: property::MAXIMUM_PACKET_SIZE,
                value: 65_536,
            },
            user("TEMP_ENDPOINT", "true"),
        ])
        .unwrap();
        assert_eq!(table.len(), 1);
        assert!(table.is_capable(BooleanCapability::TempEndpoint));
    }

    #[test]
    fn insert_checks_the_value_kind() {
        let mut table = CapabilityTable::new();
        assert_eq!(
            table.insert(
                CapabilityId::Scalar(ScalarCapability::MaxDirectMsgSize),
                CapabilityValue::Flag(true)
            ),
            Err(ProtocolError::InvalidCapabilityValue)
        );
        assert!(table.is_empty());
    }
}
