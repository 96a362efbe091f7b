// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Shared setup for install session tests

use dropshot::ConfigLogging;
use dropshot::ConfigLoggingIfExists;
use dropshot::ConfigLoggingLevel;
use dropshot::test_util::LogContext;
use node_install::InstallConfig;
use node_install::InstallOrchestrator;
use node_install::config::AgentWaitConfig;
use node_install::playbook::PlaybookReturnCode;
use node_install::sim::AgentInventory;
use node_install::sim::ScriptInventory;
use node_install::sim::SimEnvironment;
use node_install::sim::SimInventory;
use node_install_types::Cluster;
use node_install_types::ClusterUuid;
use node_install_types::FirewallType;
use node_install_types::Node;
use node_install_types::NodeStatus;
use node_install_types::NodeType;
use node_install_types::NodeUuid;
use node_install_types::Provider;
use node_install_types::RunOutcome;
use node_install_types::SwitchType;

pub const DEPLOY_LOG_DIR: &str = "/var/log/test-deploy";
pub const CURRENT_CMDLINE: &str = "console=ttyS0 intel_iommu=on";

pub fn test_setup_log(test_name: &str) -> LogContext {
    let log_config = ConfigLogging::File {
        level: ConfigLoggingLevel::Trace,
        path: "UNUSED".into(),
        if_exists: ConfigLoggingIfExists::Fail,
    };
    LogContext::new(test_name, &log_config)
}

/// Install settings with a short agent wait.
pub fn install_config() -> InstallConfig {
    InstallConfig {
        deploy_log_dir: DEPLOY_LOG_DIR.into(),
        agent_wait: AgentWaitConfig {
            initial_interval_ms: 5,
            max_interval_ms: 20,
            timeout_secs: 1,
        },
        ..Default::default()
    }
}

pub struct Harness {
    pub logctx: LogContext,
    pub env: SimEnvironment,
    pub orchestrator: InstallOrchestrator,
    pub node: Node,
}

impl Harness {
    pub fn cleanup_successful(self) {
        self.logctx.cleanup_successful();
    }

    pub fn node_status(&self) -> NodeStatus {
        self.env.nodes.node(self.node.id).expect("node exists").status
    }
}

pub struct HarnessBuilder {
    node: Node,
    cluster: Cluster,
    providers: Vec<Provider>,
    script: ScriptInventory,
}

impl HarnessBuilder {
    pub fn new() -> Self {
        let cluster = Cluster {
            id: ClusterUuid::new_v4(),
            name: "cluster0".to_string(),
            compatibility_version: "4.7".to_string(),
            firewall_type: FirewallType::Firewalld,
            switch_type: SwitchType::Legacy,
            gluster_service: false,
            virt_service: true,
            vnc_encryption: false,
        };
        let node = Node {
            id: NodeUuid::new_v4(),
            name: "node0".to_string(),
            hostname: "192.0.2.20".to_string(),
            ssh_port: 22,
            management_port: 54321,
            node_type: NodeType::Standard,
            cluster_id: cluster.id,
            status: NodeStatus::Maintenance,
            current_kernel_cmdline: Some(CURRENT_CMDLINE.to_string()),
            last_stored_kernel_cmdline: None,
        };
        Self {
            node,
            cluster,
            providers: Vec::new(),
            script: ScriptInventory {
                provisioning_outcome: RunOutcome::Complete,
                playbook_result: PlaybookReturnCode::Ok,
                agent: AgentInventory::default(),
            },
        }
    }

    pub fn node_type(mut self, node_type: NodeType) -> Self {
        self.node.node_type = node_type;
        self
    }

    pub fn status(mut self, status: NodeStatus) -> Self {
        self.node.status = status;
        self
    }

    pub fn firewall_type(mut self, firewall_type: FirewallType) -> Self {
        self.cluster.firewall_type = firewall_type;
        self
    }

    pub fn provider(mut self, provider: Provider) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn outcome(mut self, outcome: RunOutcome) -> Self {
        self.script.provisioning_outcome = outcome;
        self
    }

    pub fn playbook_result(mut self, code: PlaybookReturnCode) -> Self {
        self.script.playbook_result = code;
        self
    }

    pub fn agent(mut self, agent: AgentInventory) -> Self {
        self.script.agent = agent;
        self
    }

    pub fn build(self, test_name: &str) -> Harness {
        let logctx = test_setup_log(test_name);
        let node = self.node.clone();
        let env = SimInventory {
            node: self.node,
            cluster: self.cluster,
            providers: self.providers,
            script: self.script,
        }
        .into_environment();
        let orchestrator = InstallOrchestrator::new(
            &logctx.log,
            install_config(),
            env.collaborators(),
        );
        Harness { logctx, env, orchestrator, node }
    }
}
