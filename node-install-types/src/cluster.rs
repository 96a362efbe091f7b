// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::ClusterUuid;
use serde::Deserialize;
use serde::Serialize;

/// Firewall implementation nodes in a cluster are configured with.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::EnumIter,
    strum::Display,
)]
#[serde(rename_all = "snake_case")]
pub enum FirewallType {
    #[strum(serialize = "IPTABLES")]
    Iptables,
    #[strum(serialize = "FIREWALLD")]
    Firewalld,
}

/// Virtual switch implementation nodes in a cluster are configured with.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
pub enum SwitchType {
    Legacy,
    Ovs,
}

impl SwitchType {
    /// The value used for this switch type in node configuration.
    pub fn option_value(&self) -> &'static str {
        match self {
            SwitchType::Legacy => "legacy",
            SwitchType::Ovs => "ovs",
        }
    }
}

/// A cluster of nodes sharing one configuration.
///
/// Read-only from the install orchestrator's point of view.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster {
    pub id: ClusterUuid,
    pub name: String,
    pub compatibility_version: String,
    pub firewall_type: FirewallType,
    pub switch_type: SwitchType,
    pub gluster_service: bool,
    pub virt_service: bool,
    /// Whether console traffic on the management network is encrypted.
    #[serde(default)]
    pub vnc_encryption: bool,
}
