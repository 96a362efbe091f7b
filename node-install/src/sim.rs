// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Simulated collaborators
//!
//! In lieu of real databases, remote sessions, and node agents, these keep
//! everything in memory, follow a script supplied up front, and record every
//! call for later inspection. They back the `node-install-sim` binary as
//! well as the tests.

use crate::audit::AuditContext;
use crate::audit::AuditEvent;
use crate::audit::AuditSink;
use crate::config::ConfigError;
use crate::deploy::DeploymentUnit;
use crate::network::AgentError;
use crate::network::NodeAgent;
use crate::orchestrator::Collaborators;
use crate::playbook::PlaybookBackend;
use crate::playbook::PlaybookCommand;
use crate::playbook::PlaybookError;
use crate::playbook::PlaybookResult;
use crate::playbook::PlaybookReturnCode;
use crate::provisioning::Credential;
use crate::provisioning::ProvisioningBackend;
use crate::provisioning::ProvisioningError;
use crate::provisioning::ProvisioningRequest;
use crate::store::ClusterStore;
use crate::store::NodeStore;
use crate::store::ProviderStore;
use crate::store::StoreError;
use async_trait::async_trait;
use camino::Utf8Path;
use node_install_types::Cluster;
use node_install_types::ClusterUuid;
use node_install_types::Node;
use node_install_types::NodeStatus;
use node_install_types::NodeUuid;
use node_install_types::Provider;
use node_install_types::ProviderUuid;
use node_install_types::RunOutcome;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;

#[derive(Debug, Default)]
struct SimNodeStoreInner {
    nodes: BTreeMap<NodeUuid, Node>,
    status_history: BTreeMap<NodeUuid, Vec<NodeStatus>>,
    stored_cmdlines: BTreeMap<NodeUuid, Vec<Option<String>>>,
    reinstalled: BTreeMap<NodeUuid, usize>,
}

/// In-memory node records.
#[derive(Debug, Default)]
pub struct SimNodeStore {
    inner: Mutex<SimNodeStoreInner>,
}

impl SimNodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, node: Node) {
        self.inner.lock().unwrap().nodes.insert(node.id, node);
    }

    /// Current record for `id`.
    pub fn node(&self, id: NodeUuid) -> Option<Node> {
        self.inner.lock().unwrap().nodes.get(&id).cloned()
    }

    /// Every status written for `id`, oldest first.
    pub fn status_history(&self, id: NodeUuid) -> Vec<NodeStatus> {
        self.inner
            .lock()
            .unwrap()
            .status_history
            .get(&id)
            .cloned()
            .unwrap_or_default()
    }

    /// Every kernel command line recorded as stored for `id`, oldest first.
    pub fn stored_cmdline_updates(&self, id: NodeUuid) -> Vec<Option<String>> {
        self.inner
            .lock()
            .unwrap()
            .stored_cmdlines
            .get(&id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn reinstalled_count(&self, id: NodeUuid) -> usize {
        self.inner.lock().unwrap().reinstalled.get(&id).copied().unwrap_or(0)
    }
}

#[async_trait]
impl NodeStore for SimNodeStore {
    async fn get(&self, id: NodeUuid) -> Result<Option<Node>, StoreError> {
        Ok(self.node(id))
    }

    async fn update_status(
        &self,
        id: NodeUuid,
        status: NodeStatus,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let node = inner
            .nodes
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })?;
        node.status = status;
        inner.status_history.entry(id).or_default().push(status);
        Ok(())
    }

    async fn update_last_stored_kernel_cmdline(
        &self,
        id: NodeUuid,
        cmdline: Option<String>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let node = inner
            .nodes
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })?;
        node.last_stored_kernel_cmdline = cmdline.clone();
        inner.stored_cmdlines.entry(id).or_default().push(cmdline);
        Ok(())
    }

    async fn mark_reinstalled(&self, id: NodeUuid) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.nodes.contains_key(&id) {
            return Err(StoreError::NotFound { id: id.to_string() });
        }
        *inner.reinstalled.entry(id).or_default() += 1;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct SimClusterStore {
    clusters: Mutex<BTreeMap<ClusterUuid, Cluster>>,
}

impl SimClusterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, cluster: Cluster) {
        self.clusters.lock().unwrap().insert(cluster.id, cluster);
    }
}

#[async_trait]
impl ClusterStore for SimClusterStore {
    async fn get(
        &self,
        id: ClusterUuid,
    ) -> Result<Option<Cluster>, StoreError> {
        Ok(self.clusters.lock().unwrap().get(&id).cloned())
    }
}

#[derive(Debug, Default)]
pub struct SimProviderStore {
    providers: Mutex<BTreeMap<ProviderUuid, Provider>>,
}

impl SimProviderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, provider: Provider) {
        self.providers.lock().unwrap().insert(provider.id, provider);
    }
}

#[async_trait]
impl ProviderStore for SimProviderStore {
    async fn get(
        &self,
        id: ProviderUuid,
    ) -> Result<Option<Provider>, StoreError> {
        Ok(self.providers.lock().unwrap().get(&id).cloned())
    }
}

/// Keeps every audit event it is given.
#[derive(Debug, Default)]
pub struct RecordingAuditSink {
    records: Mutex<Vec<(AuditEvent, AuditContext)>>,
}

impl RecordingAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<(AuditEvent, AuditContext)> {
        self.records.lock().unwrap().clone()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .map(|(event, _)| event.clone())
            .collect()
    }
}

#[async_trait]
impl AuditSink for RecordingAuditSink {
    async fn log(&self, event: AuditEvent, context: &AuditContext) {
        self.records.lock().unwrap().push((event, context.clone()));
    }
}

/// One provisioning run as seen by [`SimProvisioningBackend`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedRun {
    pub node_id: NodeUuid,
    pub units: Vec<DeploymentUnit>,
    /// `password` or `key_pair:<path>`; passwords themselves are not kept.
    pub credential: String,
    pub correlation_id: String,
}

/// Provisioning backend that reports a fixed outcome for every run.
#[derive(Debug)]
pub struct SimProvisioningBackend {
    outcome: RunOutcome,
    runs: Mutex<Vec<RecordedRun>>,
}

impl SimProvisioningBackend {
    pub fn new(outcome: RunOutcome) -> Self {
        Self { outcome, runs: Mutex::new(Vec::new()) }
    }

    pub fn runs(&self) -> Vec<RecordedRun> {
        self.runs.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProvisioningBackend for SimProvisioningBackend {
    async fn run(
        &self,
        request: &ProvisioningRequest<'_>,
    ) -> Result<RunOutcome, ProvisioningError> {
        let credential = match &request.credential {
            Credential::Password(_) => "password".to_string(),
            Credential::KeyPair { private_key } => {
                format!("key_pair:{private_key}")
            }
        };
        self.runs.lock().unwrap().push(RecordedRun {
            node_id: request.node.id,
            units: request.units.units().to_vec(),
            credential,
            correlation_id: request.correlation_id.to_string(),
        });
        Ok(self.outcome)
    }
}

/// Playbook backend that answers every run with a fixed return code.
#[derive(Debug)]
pub struct SimPlaybookBackend {
    code: PlaybookReturnCode,
    commands: Mutex<Vec<PlaybookCommand>>,
}

impl SimPlaybookBackend {
    pub fn new(code: PlaybookReturnCode) -> Self {
        Self { code, commands: Mutex::new(Vec::new()) }
    }

    pub fn commands(&self) -> Vec<PlaybookCommand> {
        self.commands.lock().unwrap().clone()
    }
}

#[async_trait]
impl PlaybookBackend for SimPlaybookBackend {
    async fn run(
        &self,
        command: &PlaybookCommand,
    ) -> Result<PlaybookResult, PlaybookError> {
        self.commands.lock().unwrap().push(command.clone());
        Ok(PlaybookResult { code: self.code, log_path: command.log_path() })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AgentCall {
    Ping,
    RefreshNetworkConfig,
    EnsureManagementNetwork,
}

/// How a [`SimNodeAgent`] behaves.
#[derive(Debug, Default)]
pub struct AgentScript {
    /// Number of pings that fail before the agent answers.
    pub failed_pings: usize,
    /// The agent never answers a ping.
    pub never_responds: bool,
    /// A ping never returns.
    pub hangs: bool,
    /// Error returned by the first network config refresh.
    pub refresh_error: Option<AgentError>,
    /// Error returned by the first management network check.
    pub ensure_error: Option<AgentError>,
}

#[derive(Debug)]
struct SimNodeAgentInner {
    script: AgentScript,
    calls: Vec<AgentCall>,
}

/// Management agent that follows an [`AgentScript`].
#[derive(Debug)]
pub struct SimNodeAgent {
    inner: Mutex<SimNodeAgentInner>,
}

impl SimNodeAgent {
    pub fn new(script: AgentScript) -> Self {
        Self {
            inner: Mutex::new(SimNodeAgentInner { script, calls: Vec::new() }),
        }
    }

    pub fn calls(&self) -> Vec<AgentCall> {
        self.inner.lock().unwrap().calls.clone()
    }
}

#[async_trait]
impl NodeAgent for SimNodeAgent {
    async fn ping(&self, node: &Node) -> Result<(), AgentError> {
        let hangs = {
            let mut inner = self.inner.lock().unwrap();
            inner.calls.push(AgentCall::Ping);
            if inner.script.never_responds {
                return Err(AgentError::Network {
                    message: format!("no answer from {}", node.hostname),
                });
            }
            if inner.script.failed_pings > 0 {
                inner.script.failed_pings -= 1;
                return Err(AgentError::Network {
                    message: format!(
                        "connection refused by {}",
                        node.hostname
                    ),
                });
            }
            inner.script.hangs
        };
        if hangs {
            std::future::pending::<()>().await;
        }
        Ok(())
    }

    async fn refresh_network_config(
        &self,
        _node: &Node,
    ) -> Result<(), AgentError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(AgentCall::RefreshNetworkConfig);
        inner.script.refresh_error.take().map_or(Ok(()), Err)
    }

    async fn ensure_management_network(
        &self,
        _node: &Node,
    ) -> Result<(), AgentError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(AgentCall::EnsureManagementNetwork);
        inner.script.ensure_error.take().map_or(Ok(()), Err)
    }
}

/// A failure a simulated agent is scripted to return.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScriptedAgentFailure {
    Network { message: String },
    Operation { message: String },
}

impl From<ScriptedAgentFailure> for AgentError {
    fn from(failure: ScriptedAgentFailure) -> Self {
        match failure {
            ScriptedAgentFailure::Network { message } => {
                AgentError::Network { message }
            }
            ScriptedAgentFailure::Operation { message } => {
                AgentError::Operation { message }
            }
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AgentInventory {
    pub failed_pings: usize,
    pub never_responds: bool,
    pub hangs: bool,
    pub refresh_failure: Option<ScriptedAgentFailure>,
    pub ensure_failure: Option<ScriptedAgentFailure>,
}

impl From<AgentInventory> for AgentScript {
    fn from(agent: AgentInventory) -> Self {
        AgentScript {
            failed_pings: agent.failed_pings,
            never_responds: agent.never_responds,
            hangs: agent.hangs,
            refresh_error: agent.refresh_failure.map(AgentError::from),
            ensure_error: agent.ensure_failure.map(AgentError::from),
        }
    }
}

fn default_playbook_result() -> PlaybookReturnCode {
    PlaybookReturnCode::Ok
}

/// Scripted behavior of the simulated backends.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct ScriptInventory {
    pub provisioning_outcome: RunOutcome,
    #[serde(default = "default_playbook_result")]
    pub playbook_result: PlaybookReturnCode,
    #[serde(default)]
    pub agent: AgentInventory,
}

/// A node, its cluster, the providers it may refer to, and how the
/// simulated backends behave, as read from a TOML file.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct SimInventory {
    pub node: Node,
    pub cluster: Cluster,
    #[serde(default)]
    pub providers: Vec<Provider>,
    pub script: ScriptInventory,
}

impl SimInventory {
    pub fn from_file<P: AsRef<Utf8Path>>(
        path: P,
    ) -> Result<SimInventory, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|error| {
            ConfigError::Io { error, path: path.to_owned() }
        })?;
        toml::from_str(&contents).map_err(|error| ConfigError::Parse {
            error,
            path: path.to_owned(),
        })
    }

    /// Build the simulated collaborators this inventory describes.
    pub fn into_environment(self) -> SimEnvironment {
        let nodes = Arc::new(SimNodeStore::new());
        nodes.insert(self.node);
        let clusters = Arc::new(SimClusterStore::new());
        clusters.insert(self.cluster);
        let providers = Arc::new(SimProviderStore::new());
        for provider in self.providers {
            providers.insert(provider);
        }

        SimEnvironment {
            nodes,
            clusters,
            providers,
            audit: Arc::new(RecordingAuditSink::new()),
            provisioning: Arc::new(SimProvisioningBackend::new(
                self.script.provisioning_outcome,
            )),
            playbook: Arc::new(SimPlaybookBackend::new(
                self.script.playbook_result,
            )),
            agent: Arc::new(SimNodeAgent::new(self.script.agent.into())),
        }
    }
}

/// Handles on a full set of simulated collaborators.
#[derive(Clone)]
pub struct SimEnvironment {
    pub nodes: Arc<SimNodeStore>,
    pub clusters: Arc<SimClusterStore>,
    pub providers: Arc<SimProviderStore>,
    pub audit: Arc<RecordingAuditSink>,
    pub provisioning: Arc<SimProvisioningBackend>,
    pub playbook: Arc<SimPlaybookBackend>,
    pub agent: Arc<SimNodeAgent>,
}

impl SimEnvironment {
    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            nodes: self.nodes.clone(),
            clusters: self.clusters.clone(),
            providers: self.providers.clone(),
            audit: self.audit.clone(),
            provisioning: self.provisioning.clone(),
            playbook: self.playbook.clone(),
            agent: self.agent.clone(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use node_install_types::NodeType;

    const INVENTORY: &str = r#"
        [node]
        id = "5f6c1b8e-6a43-4a4e-9c64-8b1f5d3e2a10"
        name = "node1"
        hostname = "node1.example.com"
        ssh_port = 22
        management_port = 54321
        node_type = "legacy_appliance"
        cluster_id = "9d7f0a52-4c1e-4b8f-a1d3-2e6b5c7a8f90"
        status = "maintenance"
        current_kernel_cmdline = "console=ttyS0"

        [cluster]
        id = "9d7f0a52-4c1e-4b8f-a1d3-2e6b5c7a8f90"
        name = "prod"
        compatibility_version = "4.7"
        firewall_type = "firewalld"
        switch_type = "legacy"
        gluster_service = false
        virt_service = true

        [script]
        provisioning_outcome = "reboot"

        [script.agent]
        failed_pings = 3
        ensure_failure = { kind = "operation", message = "no bridge" }
    "#;

    #[test]
    fn parse_inventory() {
        let inventory: SimInventory = toml::from_str(INVENTORY).unwrap();
        assert_eq!(inventory.node.node_type, NodeType::LegacyAppliance);
        assert_eq!(inventory.node.cluster_id, inventory.cluster.id);
        assert!(inventory.providers.is_empty());
        assert_eq!(inventory.script.provisioning_outcome, RunOutcome::Reboot);
        assert_eq!(inventory.script.playbook_result, PlaybookReturnCode::Ok);
        assert_eq!(inventory.script.agent.failed_pings, 3);
        assert_eq!(
            inventory.script.agent.ensure_failure,
            Some(ScriptedAgentFailure::Operation {
                message: "no bridge".to_string()
            })
        );
    }

    #[tokio::test]
    async fn node_store_records_history() {
        let inventory: SimInventory = toml::from_str(INVENTORY).unwrap();
        let node_id = inventory.node.id;
        let env = inventory.into_environment();

        env.nodes
            .update_status(node_id, NodeStatus::Installing)
            .await
            .unwrap();
        env.nodes.update_status(node_id, NodeStatus::Reboot).await.unwrap();
        env.nodes
            .update_last_stored_kernel_cmdline(
                node_id,
                Some("console=ttyS0".to_string()),
            )
            .await
            .unwrap();

        assert_eq!(
            env.nodes.status_history(node_id),
            [NodeStatus::Installing, NodeStatus::Reboot]
        );
        let node = env.nodes.node(node_id).unwrap();
        assert_eq!(node.status, NodeStatus::Reboot);
        assert_eq!(
            node.last_stored_kernel_cmdline.as_deref(),
            Some("console=ttyS0")
        );

        let missing = NodeUuid::new_v4();
        assert!(
            env.nodes.update_status(missing, NodeStatus::Reboot).await.is_err()
        );
    }
}
