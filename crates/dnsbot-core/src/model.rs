//! Shared value types
//!
//! Identifiers handed to us by the chat transport and the record snapshots
//! handed to us by the DNS provider. Everything here is plain data.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;

/// Chat identifier (numeric, transport-assigned)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChatId(pub i64);

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outbound message handle (numeric, transport-assigned)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub i32);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// IP address family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IpFamily {
    V4,
    V6,
}

impl IpFamily {
    /// Family of a concrete address
    pub fn of(ip: &IpAddr) -> Self {
        match ip {
            IpAddr::V4(_) => IpFamily::V4,
            IpAddr::V6(_) => IpFamily::V6,
        }
    }
}

impl fmt::Display for IpFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IpFamily::V4 => f.write_str("IPv4"),
            IpFamily::V6 => f.write_str("IPv6"),
        }
    }
}

/// DNS record type
///
/// Only `A` and `AAAA` carry addresses this bot can write; every other type
/// returned by a zone listing is kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RecordType {
    /// A record (IPv4)
    A,
    /// AAAA record (IPv6)
    Aaaa,
    /// Any other record type (CNAME, TXT, MX, ...)
    Other(String),
}

impl RecordType {
    /// Record type that stores addresses of the given family
    pub fn for_family(family: IpFamily) -> Self {
        match family {
            IpFamily::V4 => RecordType::A,
            IpFamily::V6 => RecordType::Aaaa,
        }
    }

    /// Record type matching a concrete address
    pub fn for_ip(ip: &IpAddr) -> Self {
        Self::for_family(IpFamily::of(ip))
    }

    /// Address family stored by this record type, if it stores one
    pub fn family(&self) -> Option<IpFamily> {
        match self {
            RecordType::A => Some(IpFamily::V4),
            RecordType::Aaaa => Some(IpFamily::V6),
            RecordType::Other(_) => None,
        }
    }

    /// Whether this record type stores an address
    pub fn is_address(&self) -> bool {
        self.family().is_some()
    }

    /// Wire name (`A`, `AAAA`, ...)
    pub fn as_str(&self) -> &str {
        match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
            RecordType::Other(name) => name,
        }
    }

    /// Label shown to users
    pub fn display_name(&self) -> String {
        match self {
            RecordType::A => "IPv4 (A)".to_string(),
            RecordType::Aaaa => "IPv6 (AAAA)".to_string(),
            RecordType::Other(name) => name.clone(),
        }
    }
}

impl From<String> for RecordType {
    fn from(value: String) -> Self {
        match value.to_ascii_uppercase().as_str() {
            "A" => RecordType::A,
            "AAAA" => RecordType::Aaaa,
            other => RecordType::Other(other.to_string()),
        }
    }
}

impl From<&str> for RecordType {
    fn from(value: &str) -> Self {
        RecordType::from(value.to_string())
    }
}

impl From<RecordType> for String {
    fn from(value: RecordType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A DNS record as the provider reported it at fetch time
///
/// Snapshots are never refreshed in place: an update or delete always targets
/// the `id`/`zone_id` captured here, even if the remote record changed since.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsRecordSnapshot {
    /// Provider record ID
    pub id: String,
    /// Provider zone ID
    pub zone_id: String,
    /// Fully-qualified record name
    pub name: String,
    /// Record type
    #[serde(rename = "type")]
    pub record_type: RecordType,
    /// Record content (address for A/AAAA)
    pub content: String,
    /// Whether traffic is routed through the provider's edge
    #[serde(default)]
    pub proxied: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_type_round_trips_wire_names() {
        assert_eq!(RecordType::from("a"), RecordType::A);
        assert_eq!(RecordType::from("AAAA"), RecordType::Aaaa);
        assert_eq!(RecordType::from("cname"), RecordType::Other("CNAME".to_string()));
        assert_eq!(String::from(RecordType::Aaaa), "AAAA");
    }

    #[test]
    fn record_type_family() {
        let v4: IpAddr = "192.168.1.1".parse().unwrap();
        let v6: IpAddr = "2001:db8::1".parse().unwrap();

        assert_eq!(RecordType::for_ip(&v4), RecordType::A);
        assert_eq!(RecordType::for_ip(&v6), RecordType::Aaaa);
        assert_eq!(RecordType::A.family(), Some(IpFamily::V4));
        assert!(!RecordType::from("TXT").is_address());
    }

    #[test]
    fn snapshot_deserializes_provider_shape() {
        let json = serde_json::json!({
            "id": "rec-1",
            "zone_id": "zone-1",
            "name": "www.example.com",
            "type": "A",
            "content": "1.2.3.4",
            "proxied": true
        });

        let record: DnsRecordSnapshot = serde_json::from_value(json).unwrap();
        assert_eq!(record.record_type, RecordType::A);
        assert!(record.proxied);
    }
}
