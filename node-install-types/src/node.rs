// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Managed compute nodes.

use crate::ClusterUuid;
use crate::NodeUuid;
use serde::Deserialize;
use serde::Serialize;
use std::fmt;
use std::net::IpAddr;

/// Lifecycle status of a node.
///
/// Only the install orchestrator moves a node through these states while an
/// install session holds the node's lock; everyone else only reads them.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::EnumIter,
    strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NodeStatus {
    Installing,
    NonResponsive,
    InstallFailed,
    Reboot,
    Maintenance,
    Initializing,
    NonOperational,
}

/// The kind of software image a node runs.
///
/// Records written by older software may carry a type this crate doesn't know
/// about. Those are preserved as [`NodeType::Unrecognized`] rather than
/// failing to load, so the installer can reject them with a useful message.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NodeType {
    /// A general-purpose host with the node software installed from packages.
    Standard,
    /// A purpose-built appliance image.
    Appliance,
    /// The previous generation of appliance image. It predates both firewall
    /// overrides and playbook-driven configuration.
    LegacyAppliance,
    Unrecognized(String),
}

impl NodeType {
    const STANDARD: &'static str = "standard";
    const APPLIANCE: &'static str = "appliance";
    const LEGACY_APPLIANCE: &'static str = "legacy_appliance";

    pub fn as_str(&self) -> &str {
        match self {
            NodeType::Standard => Self::STANDARD,
            NodeType::Appliance => Self::APPLIANCE,
            NodeType::LegacyAppliance => Self::LEGACY_APPLIANCE,
            NodeType::Unrecognized(s) => s,
        }
    }

    pub fn is_legacy(&self) -> bool {
        matches!(self, NodeType::LegacyAppliance)
    }
}

impl From<String> for NodeType {
    fn from(s: String) -> Self {
        match s.as_str() {
            Self::STANDARD => NodeType::Standard,
            Self::APPLIANCE => NodeType::Appliance,
            Self::LEGACY_APPLIANCE => NodeType::LegacyAppliance,
            _ => NodeType::Unrecognized(s),
        }
    }
}

impl From<NodeType> for String {
    fn from(t: NodeType) -> Self {
        match t {
            NodeType::Unrecognized(s) => s,
            other => other.as_str().to_owned(),
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A managed compute node, as stored by the node store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeUuid,
    pub name: String,
    /// Address used to reach the node, either a DNS name or an IP literal.
    pub hostname: String,
    pub ssh_port: u16,
    /// Port the node's management agent listens on.
    pub management_port: u16,
    pub node_type: NodeType,
    pub cluster_id: ClusterUuid,
    pub status: NodeStatus,
    /// Kernel command line the node is currently configured to boot with.
    #[serde(default)]
    pub current_kernel_cmdline: Option<String>,
    /// Kernel command line recorded the last time an install actually ran
    /// something on the node.
    #[serde(default)]
    pub last_stored_kernel_cmdline: Option<String>,
}

impl Node {
    /// Returns the node's address if `hostname` is an IP literal.
    pub fn ip_literal(&self) -> Option<IpAddr> {
        // Accept bracketed IPv6 literals too.
        self.hostname
            .trim_start_matches('[')
            .trim_end_matches(']')
            .parse()
            .ok()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn node_type_round_trips_unknown_values() {
        for t in [
            NodeType::Standard,
            NodeType::Appliance,
            NodeType::LegacyAppliance,
            NodeType::Unrecognized("hypervisor-2000".to_string()),
        ] {
            let s = serde_json::to_string(&t).unwrap();
            let back: NodeType = serde_json::from_str(&s).unwrap();
            assert_eq!(t, back);
        }

        let t: NodeType = serde_json::from_str("\"mainframe\"").unwrap();
        assert_eq!(t, NodeType::Unrecognized("mainframe".to_string()));
        assert!(!t.is_legacy());
    }

    #[test]
    fn status_display_matches_serde() {
        for status in NodeStatus::iter() {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{status}\""));
        }
    }

    #[test]
    fn ip_literal() {
        let mut node: Node = toml::from_str(
            r#"
            id = "0d6d5ba4-0a38-4bd4-a3b5-6a5c1c2ae93c"
            name = "n1"
            hostname = "192.0.2.7"
            ssh_port = 22
            management_port = 54321
            node_type = "standard"
            cluster_id = "b4fb6a8e-a0a4-4a54-8a12-0b5b7bd8d9a3"
            status = "maintenance"
            "#,
        )
        .unwrap();
        assert_eq!(node.ip_literal(), Some("192.0.2.7".parse().unwrap()));
        assert_eq!(node.current_kernel_cmdline, None);

        node.hostname = "[2001:db8::1]".to_string();
        assert_eq!(node.ip_literal(), Some("2001:db8::1".parse().unwrap()));

        node.hostname = "node1.example.com".to_string();
        assert_eq!(node.ip_literal(), None);
    }
}
