// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The install session state machine
//!
//! A session takes the node's install lock, provisions the node, and then
//! moves the node into a status determined by the provisioning outcome:
//!
//! * `Failed`: `InstallFailed`. Nothing ran on the node, so no bookkeeping.
//! * `Incomplete`: the kernel command line is recorded, then
//!   `InstallFailed`.
//! * `Reboot`: the kernel command line is recorded and the node marked
//!   reinstalled. The node goes to `Reboot` and then to the status computed
//!   by [`status_after_reboot`].
//! * `Complete`: as for `Reboot`, then the post-install playbook and network
//!   convergence run. The node ends in `Maintenance`, or `Initializing` if it
//!   is to be activated.
//!
//! A session that fails leaves the node in the status carried by its
//! [`InstallError`].

use crate::InstallError;
use crate::InstallRequest;
use crate::audit::AuditContext;
use crate::audit::AuditEvent;
use crate::audit::AuditSink;
use crate::config::InstallConfig;
use crate::deploy::DeploymentUnitSet;
use crate::lock::NodeLockTable;
use crate::network::NetworkConvergence;
use crate::network::NodeAgent;
use crate::playbook::PlaybookBackend;
use crate::playbook::PostInstallAutomation;
use crate::provisioning::ProvisioningBackend;
use crate::provisioning::ProvisioningRunner;
use crate::store::ClusterStore;
use crate::store::NodeStore;
use crate::store::ProviderStore;
use display_error_chain::DisplayErrorChain;
use newtype_uuid::GenericUuid;
use node_install_types::Cluster;
use node_install_types::Node;
use node_install_types::NodeStatus;
use node_install_types::NodeUuid;
use node_install_types::RunOutcome;
use slog::Logger;
use slog::error;
use slog::info;
use slog::o;
use std::sync::Arc;
use uuid::Uuid;

/// External systems an install session talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub nodes: Arc<dyn NodeStore>,
    pub clusters: Arc<dyn ClusterStore>,
    pub providers: Arc<dyn ProviderStore>,
    pub audit: Arc<dyn AuditSink>,
    pub provisioning: Arc<dyn ProvisioningBackend>,
    pub playbook: Arc<dyn PlaybookBackend>,
    pub agent: Arc<dyn NodeAgent>,
}

/// Result of a successful install session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstallSummary {
    pub node_id: NodeUuid,
    pub correlation_id: String,
    pub outcome: RunOutcome,
    pub final_status: NodeStatus,
}

pub struct InstallOrchestrator {
    log: Logger,
    nodes: Arc<dyn NodeStore>,
    clusters: Arc<dyn ClusterStore>,
    audit: Arc<dyn AuditSink>,
    locks: NodeLockTable,
    provisioning: ProvisioningRunner,
    automation: PostInstallAutomation,
    network: NetworkConvergence,
}

impl InstallOrchestrator {
    pub fn new(
        log: &Logger,
        config: InstallConfig,
        collaborators: Collaborators,
    ) -> Self {
        let locks = NodeLockTable::new(log);
        Self::with_lock_table(log, config, collaborators, locks)
    }

    /// Build an orchestrator that shares `locks` with other holders of the
    /// same table.
    pub fn with_lock_table(
        log: &Logger,
        config: InstallConfig,
        collaborators: Collaborators,
        locks: NodeLockTable,
    ) -> Self {
        let Collaborators {
            nodes,
            clusters,
            providers,
            audit,
            provisioning,
            playbook,
            agent,
        } = collaborators;

        let provisioning = ProvisioningRunner::new(
            log,
            provisioning,
            nodes.clone(),
            config.default_key_path.clone(),
        );
        let network = NetworkConvergence::new(log, agent, config.agent_wait);
        let automation = PostInstallAutomation::new(
            log,
            playbook,
            providers,
            audit.clone(),
            config,
        );

        Self {
            log: log.new(o!("component" => "InstallOrchestrator")),
            nodes,
            clusters,
            audit,
            locks,
            provisioning,
            automation,
            network,
        }
    }

    pub fn locks(&self) -> &NodeLockTable {
        &self.locks
    }

    /// Run one install session for the node named in `request`.
    ///
    /// The node's install lock is held for the whole session and released
    /// before this returns, whatever the result.
    pub async fn install(
        &self,
        request: InstallRequest,
    ) -> Result<InstallSummary, InstallError> {
        if request.node_id.into_untyped_uuid().is_nil() {
            return Err(InstallError::invalid_request("invalid node id"));
        }
        // Validate before contending for the lock.
        let (node, _) = self.load(request.node_id).await?;

        let correlation_id = request
            .correlation_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let lock = self
            .locks
            .acquire(node.id, &correlation_id)
            .map_err(|_| InstallError::LockContention { node_id: node.id })?;

        // Another session may have changed the node between the read above
        // and taking the lock; only a record read under the lock is used.
        let (node, cluster) = self.load(node.id).await?;

        let log = self.log.new(o!(
            "node_id" => node.id.to_string(),
            "correlation_id" => correlation_id.clone(),
        ));
        let context = AuditContext {
            node_id: node.id,
            node_name: node.name.clone(),
            correlation_id: correlation_id.clone(),
        };

        self.audit.log(AuditEvent::InstallStarted, &context).await;
        info!(log, "before installation"; "node_name" => &node.name);

        let result =
            self.run_session(&log, &node, &cluster, &request, &context).await;

        let result = match result {
            Ok((outcome, final_status)) => {
                info!(
                    log, "after installation";
                    "node_name" => &node.name,
                    "node_type" => %node.node_type,
                    "status" => %final_status,
                );
                self.audit.log(AuditEvent::InstallFinished, &context).await;
                Ok(InstallSummary {
                    node_id: node.id,
                    correlation_id,
                    outcome,
                    final_status,
                })
            }
            Err(error) => {
                self.record_failure(&log, &node, &error, &context).await;
                Err(error)
            }
        };

        lock.release();
        result
    }

    async fn load(
        &self,
        node_id: NodeUuid,
    ) -> Result<(Node, Cluster), InstallError> {
        let node = self.nodes.get(node_id).await?.ok_or_else(|| {
            InstallError::invalid_request("node does not exist")
        })?;
        let cluster =
            self.clusters.get(node.cluster_id).await?.ok_or_else(|| {
                InstallError::invalid_request(format!(
                    "cluster {} of node {} does not exist",
                    node.cluster_id, node.id
                ))
            })?;
        Ok((node, cluster))
    }

    /// Everything that happens while the lock is held. Returns the
    /// provisioning outcome and the status the node ended in.
    async fn run_session(
        &self,
        log: &Logger,
        node: &Node,
        cluster: &Cluster,
        request: &InstallRequest,
        context: &AuditContext,
    ) -> Result<(RunOutcome, NodeStatus), InstallError> {
        let initial_status = node.status;
        let units =
            DeploymentUnitSet::for_install(log, node, cluster, request)?;

        let outcome = self
            .provisioning
            .run(node, &units, &request.auth, &context.correlation_id)
            .await?;
        info!(log, "provisioning outcome"; "outcome" => %outcome);

        if outcome.ran_on_node() {
            self.nodes
                .update_last_stored_kernel_cmdline(
                    node.id,
                    node.current_kernel_cmdline.clone(),
                )
                .await?;
        }
        if outcome.reinstalled() {
            self.nodes.mark_reinstalled(node.id).await?;
        }

        let final_status = match outcome {
            RunOutcome::Failed => {
                return Err(InstallError::run_failure(
                    NodeStatus::InstallFailed,
                    "",
                ));
            }
            RunOutcome::Incomplete => {
                return Err(InstallError::run_failure(
                    NodeStatus::InstallFailed,
                    "Partial installation",
                ));
            }
            RunOutcome::Reboot => {
                self.nodes.update_status(node.id, NodeStatus::Reboot).await?;
                let status =
                    status_after_reboot(initial_status, request.activate_host);
                if status != NodeStatus::Maintenance {
                    return Err(InstallError::run_failure(
                        status,
                        "Node is rebooting after installation",
                    ));
                }
                status
            }
            RunOutcome::Complete => {
                self.automation.run(node, cluster, request, context).await?;
                self.network.converge(node).await?;
                if request.activate_host {
                    NodeStatus::Initializing
                } else {
                    NodeStatus::Maintenance
                }
            }
        };

        self.nodes.update_status(node.id, final_status).await?;
        Ok((outcome, final_status))
    }

    async fn record_failure(
        &self,
        log: &Logger,
        node: &Node,
        error: &InstallError,
        context: &AuditContext,
    ) {
        error!(
            log, "installation failed";
            "error" => %DisplayErrorChain::new(error),
        );
        if let Some(status) = error.node_status() {
            if let Err(store_error) =
                self.nodes.update_status(node.id, status).await
            {
                error!(
                    log, "failed to record node status after failed install";
                    "status" => %status,
                    "error" => %DisplayErrorChain::new(&store_error),
                );
            }
        }
        self.audit
            .log(
                AuditEvent::InstallFailed { message: error.to_string() },
                context,
            )
            .await;
    }
}

/// Status a node moves to once it has been told to reboot after install.
///
/// A node that was in maintenance stays there unless it is to be activated;
/// otherwise it is non-responsive until it comes back up and is picked up by
/// the regular monitoring.
pub fn status_after_reboot(
    initial_status: NodeStatus,
    activate_host: bool,
) -> NodeStatus {
    if initial_status == NodeStatus::Maintenance && !activate_host {
        NodeStatus::Maintenance
    } else {
        NodeStatus::NonResponsive
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn reboot_status() {
        for initial in NodeStatus::iter() {
            let expected = if initial == NodeStatus::Maintenance {
                NodeStatus::Maintenance
            } else {
                NodeStatus::NonResponsive
            };
            assert_eq!(status_after_reboot(initial, false), expected);
            assert_eq!(
                status_after_reboot(initial, true),
                NodeStatus::NonResponsive
            );
        }
    }
}
