//! Relay node model and the health fields the watchdog owns.

use std::fmt;
use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Enums
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Wire protocol a relay node speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    Https,
}

impl Protocol {
    pub fn scheme(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.scheme())
    }
}

/// Liveness classification of a node.
///
/// `Degraded` is part of the persisted shape but no code path assigns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Active,
    Degraded,
    Dead,
}

impl NodeStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Degraded => "degraded",
            Self::Dead => "dead",
        }
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Node
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A relay endpoint as persisted in the node store.
///
/// `id`, `ip`, `port`, `protocol` and `country` are set by registration.
/// `status`, `latency` and `last_checked` are written only by the watchdog
/// (see [`HealthUpdate`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: String,
    pub ip: String,
    pub port: u16,
    pub protocol: Protocol,
    pub status: NodeStatus,
    /// Last measured round-trip in milliseconds. Zero unless `Active`.
    #[serde(default)]
    pub latency: u64,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub last_checked: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

impl Node {
    /// `host:port` form used for probing and logging. IPv6 literals are
    /// bracketed so the result is a valid URL authority.
    pub fn authority(&self) -> String {
        match self.ip.trim_matches(|c| c == '[' || c == ']').parse::<IpAddr>() {
            Ok(IpAddr::V6(v6)) => format!("[{v6}]:{}", self.port),
            _ => format!("{}:{}", self.ip, self.port),
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == NodeStatus::Active
    }
}

/// Identity and address fields supplied when a node is registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRegistration {
    pub id: String,
    pub ip: String,
    pub port: u16,
    #[serde(default = "d_protocol")]
    pub protocol: Protocol,
    #[serde(default)]
    pub country: Option<String>,
}

fn d_protocol() -> Protocol {
    Protocol::Http
}

impl NodeRegistration {
    /// Build a never-checked node. New nodes start `Dead` and only become
    /// selectable after the watchdog has probed them.
    pub fn into_node(self) -> Node {
        Node {
            id: self.id,
            ip: self.ip,
            port: self.port,
            protocol: self.protocol,
            status: NodeStatus::Dead,
            latency: 0,
            last_checked: None,
            country: self.country.map(|c| c.trim().to_ascii_uppercase()),
        }
    }

    /// Replace the address fields of `existing`, keeping its health fields.
    pub fn merge_into(self, existing: &Node) -> Node {
        let mut node = self.into_node();
        node.status = existing.status;
        node.latency = existing.latency;
        node.last_checked = existing.last_checked;
        node
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Health update
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Partial update of the three watchdog-owned fields.
///
/// Only constructible as "active with a measured latency" or "dead with
/// latency 0", so a write can never carry any other combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthUpdate {
    status: NodeStatus,
    latency: u64,
    checked_at: DateTime<Utc>,
}

impl HealthUpdate {
    pub fn active(latency_ms: u64, checked_at: DateTime<Utc>) -> Self {
        Self {
            status: NodeStatus::Active,
            latency: latency_ms,
            checked_at,
        }
    }

    pub fn dead(checked_at: DateTime<Utc>) -> Self {
        Self {
            status: NodeStatus::Dead,
            latency: 0,
            checked_at,
        }
    }

    pub fn status(&self) -> NodeStatus {
        self.status
    }

    pub fn latency(&self) -> u64 {
        self.latency
    }

    pub fn checked_at(&self) -> DateTime<Utc> {
        self.checked_at
    }

    /// Write `status`, `latency` and `last_checked` on `node`. Nothing else
    /// is touched.
    pub fn apply(&self, node: &mut Node) {
        node.status = self.status;
        node.latency = self.latency;
        node.last_checked = Some(self.checked_at);
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn registration() -> NodeRegistration {
        NodeRegistration {
            id: "node-1".into(),
            ip: "10.0.0.1".into(),
            port: 8080,
            protocol: Protocol::Https,
            country: Some(" de ".into()),
        }
    }

    #[test]
    fn registration_starts_dead_and_unchecked() {
        let node = registration().into_node();
        assert_eq!(node.status, NodeStatus::Dead);
        assert_eq!(node.latency, 0);
        assert!(node.last_checked.is_none());
        assert_eq!(node.country.as_deref(), Some("DE"));
    }

    #[test]
    fn re_registration_keeps_health_fields() {
        let checked = Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap();
        let mut existing = registration().into_node();
        HealthUpdate::active(42, checked).apply(&mut existing);

        let mut moved = registration();
        moved.ip = "10.0.0.9".into();
        let node = moved.merge_into(&existing);

        assert_eq!(node.ip, "10.0.0.9");
        assert_eq!(node.status, NodeStatus::Active);
        assert_eq!(node.latency, 42);
        assert_eq!(node.last_checked, Some(checked));
    }

    #[test]
    fn dead_update_zeroes_latency_and_keeps_address() {
        let checked = Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap();
        let mut node = registration().into_node();
        HealthUpdate::active(120, checked).apply(&mut node);
        HealthUpdate::dead(checked).apply(&mut node);

        assert_eq!(node.status, NodeStatus::Dead);
        assert_eq!(node.latency, 0);
        assert_eq!(node.ip, "10.0.0.1");
        assert_eq!(node.port, 8080);
        assert_eq!(node.protocol, Protocol::Https);
        assert_eq!(node.country.as_deref(), Some("DE"));
    }

    #[test]
    fn node_serializes_with_camel_case_and_epoch_millis() {
        let checked = Utc.timestamp_millis_opt(1_718_452_800_000).unwrap();
        let mut node = registration().into_node();
        HealthUpdate::active(50, checked).apply(&mut node);

        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["status"], "active");
        assert_eq!(json["protocol"], "https");
        assert_eq!(json["lastChecked"], 1_718_452_800_000_i64);
        assert_eq!(json["latency"], 50);
    }

    #[test]
    fn node_without_country_omits_field() {
        let mut reg = registration();
        reg.country = None;
        let json = serde_json::to_value(reg.into_node()).unwrap();
        assert!(json.get("country").is_none());
    }

    #[test]
    fn registration_protocol_defaults_to_http() {
        let reg: NodeRegistration =
            serde_json::from_str(r#"{"id":"n","ip":"1.2.3.4","port":80}"#).unwrap();
        assert_eq!(reg.protocol, Protocol::Http);
        assert!(reg.country.is_none());
    }

    #[test]
    fn authority_brackets_ipv6_only() {
        let mut node = registration().into_node();
        assert_eq!(node.authority(), "10.0.0.1:8080");

        node.ip = "2001:db8::1".into();
        assert_eq!(node.authority(), "[2001:db8::1]:8080");

        node.ip = "[2001:db8::1]".into();
        assert_eq!(node.authority(), "[2001:db8::1]:8080");

        node.ip = "proxy.example.net".into();
        assert_eq!(node.authority(), "proxy.example.net:8080");
    }
}
