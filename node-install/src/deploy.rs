// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Selection of the configuration units applied by a provisioning run
//!
//! Each [`DeploymentUnit`] contributes one independent fragment to the
//! provisioning request. Units do no I/O of their own; the set is assembled
//! up front from the request and the node's cluster, then handed to the
//! provisioning backend as a whole.

use crate::InstallError;
use crate::InstallRequest;
use node_install_types::Cluster;
use node_install_types::FirewallType;
use node_install_types::Node;
use node_install_types::NodeType;
use serde::Serialize;
use slog::Logger;
use slog::warn;
use std::collections::BTreeMap;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "unit", rename_all = "snake_case")]
pub enum DeploymentUnit {
    /// Base node software.
    BaseSoftware,
    /// The VM management agent, built for the cluster's compatibility
    /// version.
    ManagementAgent { compatibility_version: String },
    /// Certificate enrollment.
    Pki,
    Kdump,
    /// Kernel command line handling.
    Kernel,
    /// Firewall override. `iptables` selects iptables over firewalld.
    Firewall { iptables: bool },
    SerialConsole,
    HostedEngine { configuration: BTreeMap<String, String> },
}

impl DeploymentUnit {
    pub fn name(&self) -> &'static str {
        match self {
            DeploymentUnit::BaseSoftware => "base_software",
            DeploymentUnit::ManagementAgent { .. } => "management_agent",
            DeploymentUnit::Pki => "pki",
            DeploymentUnit::Kdump => "kdump",
            DeploymentUnit::Kernel => "kernel",
            DeploymentUnit::Firewall { .. } => "firewall",
            DeploymentUnit::SerialConsole => "serial_console",
            DeploymentUnit::HostedEngine { .. } => "hosted_engine",
        }
    }
}

/// Ordered set of units for one provisioning run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DeploymentUnitSet {
    units: Vec<DeploymentUnit>,
}

impl DeploymentUnitSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, unit: DeploymentUnit) -> &mut Self {
        self.units.push(unit);
        self
    }

    /// Assemble the units for installing `node` as described by `request`.
    ///
    /// Fails with [`InstallError::InvalidRequest`] if a firewall override is
    /// requested for a node type this installer doesn't know how to handle.
    pub fn for_install(
        log: &Logger,
        node: &Node,
        cluster: &Cluster,
        request: &InstallRequest,
    ) -> Result<Self, InstallError> {
        let mut set = Self::new();
        set.add(DeploymentUnit::BaseSoftware)
            .add(DeploymentUnit::ManagementAgent {
                compatibility_version: cluster.compatibility_version.clone(),
            })
            .add(DeploymentUnit::Pki)
            .add(DeploymentUnit::Kdump)
            .add(DeploymentUnit::Kernel);

        if request.override_firewall {
            match &node.node_type {
                NodeType::Standard | NodeType::Appliance => {
                    set.add(DeploymentUnit::Firewall {
                        iptables: cluster.firewall_type
                            == FirewallType::Iptables,
                    });
                }
                NodeType::LegacyAppliance => {
                    warn!(
                        log,
                        "ignoring firewall override, not supported for node type";
                        "node_name" => &node.name,
                        "node_type" => %node.node_type,
                    );
                }
                NodeType::Unrecognized(node_type) => {
                    return Err(InstallError::invalid_request(format!(
                        "unhandled node type: {node_type}"
                    )));
                }
            }
        }

        if request.enable_serial_console {
            set.add(DeploymentUnit::SerialConsole);
        }

        if !request.hosted_engine_configuration.is_empty() {
            set.add(DeploymentUnit::HostedEngine {
                configuration: request.hosted_engine_configuration.clone(),
            });
        }

        Ok(set)
    }

    pub fn units(&self) -> &[DeploymentUnit] {
        &self.units
    }

    pub fn iter(&self) -> impl Iterator<Item = &DeploymentUnit> {
        self.units.iter()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.units.iter().map(DeploymentUnit::name).collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::AuthMethod;
    use crate::test_util::test_setup_log;
    use assert_matches::assert_matches;
    use node_install_types::ClusterUuid;
    use node_install_types::NodeStatus;
    use node_install_types::NodeUuid;
    use node_install_types::SwitchType;

    fn node(node_type: NodeType) -> Node {
        Node {
            id: NodeUuid::new_v4(),
            name: "node1".to_string(),
            hostname: "192.0.2.10".to_string(),
            ssh_port: 22,
            management_port: 54321,
            node_type,
            cluster_id: ClusterUuid::new_v4(),
            status: NodeStatus::Maintenance,
            current_kernel_cmdline: None,
            last_stored_kernel_cmdline: None,
        }
    }

    fn cluster(firewall_type: FirewallType) -> Cluster {
        Cluster {
            id: ClusterUuid::new_v4(),
            name: "default".to_string(),
            compatibility_version: "4.7".to_string(),
            firewall_type,
            switch_type: SwitchType::Legacy,
            gluster_service: false,
            virt_service: true,
            vnc_encryption: false,
        }
    }

    fn request(node: &Node) -> InstallRequest {
        InstallRequest::new(node.id, AuthMethod::PublicKey)
            .enable_serial_console(false)
    }

    fn firewall_units(set: &DeploymentUnitSet) -> Vec<&DeploymentUnit> {
        set.iter()
            .filter(|u| matches!(u, DeploymentUnit::Firewall { .. }))
            .collect()
    }

    #[test]
    fn base_units_always_present_in_order() {
        let logctx = test_setup_log("base_units_always_present_in_order");
        let node = node(NodeType::Standard);
        let request = request(&node).override_firewall(false);

        let set = DeploymentUnitSet::for_install(
            &logctx.log,
            &node,
            &cluster(FirewallType::Firewalld),
            &request,
        )
        .unwrap();
        assert_eq!(
            set.names(),
            ["base_software", "management_agent", "pki", "kdump", "kernel"]
        );
        assert_eq!(
            set.units()[1],
            DeploymentUnit::ManagementAgent {
                compatibility_version: "4.7".to_string()
            }
        );

        logctx.cleanup_successful();
    }

    #[test]
    fn firewall_follows_cluster_type() {
        let logctx = test_setup_log("firewall_follows_cluster_type");
        for node_type in [NodeType::Standard, NodeType::Appliance] {
            for (firewall_type, iptables) in
                [(FirewallType::Iptables, true), (FirewallType::Firewalld, false)]
            {
                let node = node(node_type.clone());
                let set = DeploymentUnitSet::for_install(
                    &logctx.log,
                    &node,
                    &cluster(firewall_type),
                    &request(&node),
                )
                .unwrap();
                assert_eq!(
                    firewall_units(&set),
                    [&DeploymentUnit::Firewall { iptables }]
                );
            }
        }
        logctx.cleanup_successful();
    }

    #[test]
    fn legacy_node_ignores_firewall_override() {
        let logctx = test_setup_log("legacy_node_ignores_firewall_override");
        let node = node(NodeType::LegacyAppliance);
        let set = DeploymentUnitSet::for_install(
            &logctx.log,
            &node,
            &cluster(FirewallType::Iptables),
            &request(&node),
        )
        .unwrap();
        assert!(firewall_units(&set).is_empty());
        logctx.cleanup_successful();
    }

    #[test]
    fn unrecognized_node_type_is_rejected() {
        let logctx = test_setup_log("unrecognized_node_type_is_rejected");
        let node = node(NodeType::Unrecognized("mainframe".to_string()));

        let error = DeploymentUnitSet::for_install(
            &logctx.log,
            &node,
            &cluster(FirewallType::Iptables),
            &request(&node),
        )
        .expect_err("unknown node type with firewall override");
        assert_matches!(
            error,
            InstallError::InvalidRequest { message } if message.contains("mainframe")
        );

        // Without a firewall override the node type doesn't matter.
        let set = DeploymentUnitSet::for_install(
            &logctx.log,
            &node,
            &cluster(FirewallType::Iptables),
            &request(&node).override_firewall(false),
        )
        .unwrap();
        assert_eq!(set.len(), 5);

        logctx.cleanup_successful();
    }

    #[test]
    fn optional_units() {
        let logctx = test_setup_log("optional_units");
        let node = node(NodeType::Standard);
        let mut he = BTreeMap::new();
        he.insert("HOST_ID".to_string(), "2".to_string());
        let request = request(&node)
            .override_firewall(false)
            .enable_serial_console(true)
            .hosted_engine_configuration(he.clone());

        let set = DeploymentUnitSet::for_install(
            &logctx.log,
            &node,
            &cluster(FirewallType::Iptables),
            &request,
        )
        .unwrap();
        assert_eq!(&set.names()[5..], ["serial_console", "hosted_engine"]);
        assert_eq!(
            set.units().last(),
            Some(&DeploymentUnit::HostedEngine { configuration: he })
        );

        logctx.cleanup_successful();
    }
}
