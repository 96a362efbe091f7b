// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Post-install automation: the host-deploy playbook run after a complete
//! provisioning run

use crate::InstallError;
use crate::InstallRequest;
use crate::audit::AuditContext;
use crate::audit::AuditEvent;
use crate::audit::AuditSink;
use crate::config::InstallConfig;
use crate::store::ProviderStore;
use async_trait::async_trait;
use camino::Utf8PathBuf;
use node_install_types::Cluster;
use node_install_types::Node;
use node_install_types::NodeStatus;
use node_install_types::ProviderUuid;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use slog::Logger;
use slog::info;
use slog::o;
use slog::warn;
use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;
use thiserror::Error;
use url::Host;
use url::Url;

const LOG_FILE_PREFIX: &str = "node-deploy-ansible";

/// A playbook invocation: which playbook, against which hosts, with which
/// variables, and where its log goes.
#[derive(Clone, Debug, PartialEq)]
pub struct PlaybookCommand {
    playbook: String,
    hosts: Vec<String>,
    variables: BTreeMap<String, Value>,
    log_dir: Utf8PathBuf,
    log_prefix: String,
    log_name: String,
    log_suffix: String,
}

impl PlaybookCommand {
    pub fn new(playbook: impl Into<String>) -> Self {
        Self {
            playbook: playbook.into(),
            hosts: Vec::new(),
            variables: BTreeMap::new(),
            log_dir: Utf8PathBuf::new(),
            log_prefix: String::new(),
            log_name: String::new(),
            log_suffix: String::new(),
        }
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.hosts.push(host.into());
        self
    }

    pub fn variable(
        mut self,
        name: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    /// Like [`PlaybookCommand::variable`], but leaves the variable unset when
    /// `value` is `None`.
    pub fn optional_variable(
        self,
        name: impl Into<String>,
        value: Option<impl Into<Value>>,
    ) -> Self {
        match value {
            Some(value) => self.variable(name, value),
            None => self,
        }
    }

    /// Write the run's log to `<dir>/<prefix>-<name>-<suffix>.log`.
    pub fn log_file(
        mut self,
        dir: impl Into<Utf8PathBuf>,
        prefix: impl Into<String>,
        name: impl Into<String>,
        suffix: impl Into<String>,
    ) -> Self {
        self.log_dir = dir.into();
        self.log_prefix = prefix.into();
        self.log_name = name.into();
        self.log_suffix = suffix.into();
        self
    }

    pub fn playbook(&self) -> &str {
        &self.playbook
    }

    pub fn hosts(&self) -> &[String] {
        &self.hosts
    }

    pub fn variables(&self) -> &BTreeMap<String, Value> {
        &self.variables
    }

    pub fn log_path(&self) -> Utf8PathBuf {
        self.log_dir.join(format!(
            "{}-{}-{}.log",
            self.log_prefix, self.log_name, self.log_suffix
        ))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybookReturnCode {
    Ok,
    Fail,
    Unreachable,
    ParseError,
}

impl fmt::Display for PlaybookReturnCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PlaybookReturnCode::Ok => "ok",
            PlaybookReturnCode::Fail => "fail",
            PlaybookReturnCode::Unreachable => "unreachable",
            PlaybookReturnCode::ParseError => "parse_error",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlaybookResult {
    pub code: PlaybookReturnCode,
    /// Where the backend actually wrote the run's log.
    pub log_path: Utf8PathBuf,
}

#[derive(Debug, Error)]
pub enum PlaybookError {
    #[error("failed to launch playbook {playbook}")]
    Launch {
        playbook: String,
        #[source]
        source: std::io::Error,
    },
}

#[async_trait]
pub trait PlaybookBackend: Send + Sync {
    async fn run(
        &self,
        command: &PlaybookCommand,
    ) -> Result<PlaybookResult, PlaybookError>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AutomationOutcome {
    /// The node type predates playbook support; nothing was run.
    Skipped,
    Succeeded { log_path: Utf8PathBuf },
}

/// Runs the host-deploy playbook against a freshly provisioned node.
pub struct PostInstallAutomation {
    log: Logger,
    backend: Arc<dyn PlaybookBackend>,
    providers: Arc<dyn ProviderStore>,
    audit: Arc<dyn AuditSink>,
    config: InstallConfig,
}

impl PostInstallAutomation {
    pub fn new(
        log: &Logger,
        backend: Arc<dyn PlaybookBackend>,
        providers: Arc<dyn ProviderStore>,
        audit: Arc<dyn AuditSink>,
        config: InstallConfig,
    ) -> Self {
        Self {
            log: log.new(o!("component" => "PostInstallAutomation")),
            backend,
            providers,
            audit,
            config,
        }
    }

    pub async fn run(
        &self,
        node: &Node,
        cluster: &Cluster,
        request: &InstallRequest,
        context: &AuditContext,
    ) -> Result<AutomationOutcome, InstallError> {
        let log = self.log.new(o!(
            "node_id" => node.id.to_string(),
            "correlation_id" => context.correlation_id.clone(),
        ));

        if node.node_type.is_legacy() {
            warn!(
                log,
                "skipping post-install playbook, not supported for node type";
                "node_type" => %node.node_type,
            );
            return Ok(AutomationOutcome::Skipped);
        }

        let ovn_central =
            self.resolve_ovn_central(request.network_provider_id).await?;
        let tunneling_interface = self.node_address(&log, node).await;

        let command = PlaybookCommand::new(&self.config.playbook)
            .host(&node.hostname)
            .variable(
                "host_deploy_cluster_version",
                cluster.compatibility_version.as_str(),
            )
            .variable("host_deploy_cluster_name", cluster.name.as_str())
            .variable(
                "host_deploy_cluster_switch_type",
                cluster.switch_type.option_value(),
            )
            .variable("host_deploy_gluster_enabled", cluster.gluster_service)
            .variable("host_deploy_virt_enabled", cluster.virt_service)
            .variable("host_deploy_vdsm_port", node.management_port)
            .variable(
                "host_deploy_override_firewall",
                request.override_firewall,
            )
            .variable(
                "host_deploy_firewall_type",
                cluster.firewall_type.to_string(),
            )
            .variable("ansible_port", node.ssh_port)
            .variable(
                "host_deploy_post_tasks",
                self.config.post_tasks_path.as_str(),
            )
            .variable("host_deploy_ovn_tunneling_interface", tunneling_interface)
            .optional_variable(
                "host_deploy_ovn_central",
                ovn_central.map(|ip| ip.to_string()),
            )
            .variable(
                "host_deploy_vnc_tls",
                if cluster.vnc_encryption { "true" } else { "false" },
            )
            .log_file(
                &self.config.deploy_log_dir,
                LOG_FILE_PREFIX,
                &node.hostname,
                &context.correlation_id,
            );

        self.audit.log(AuditEvent::PlaybookStarted, context).await;
        info!(
            log, "running post-install playbook";
            "playbook" => command.playbook(),
            "log_path" => %command.log_path(),
        );

        let result = self.backend.run(&command).await?;
        if result.code != PlaybookReturnCode::Ok {
            warn!(
                log, "post-install playbook failed";
                "code" => %result.code,
                "log_path" => %result.log_path,
            );
            let message = format!(
                "Failed to execute host-deploy playbook. Please check logs \
                 for more details: {}",
                result.log_path,
            );
            return Err(InstallError::RunFailure {
                status: NodeStatus::InstallFailed,
                message,
                log_path: Some(result.log_path),
                source: None,
            });
        }

        self.audit.log(AuditEvent::PlaybookFinished, context).await;
        info!(log, "post-install playbook finished");
        Ok(AutomationOutcome::Succeeded { log_path: result.log_path })
    }

    /// Address of the OVN central controller, when the node's cluster is
    /// attached to an OVN network provider.
    async fn resolve_ovn_central(
        &self,
        provider_id: Option<ProviderUuid>,
    ) -> Result<Option<IpAddr>, InstallError> {
        let Some(provider_id) = provider_id else {
            return Ok(None);
        };
        let provider =
            self.providers.get(provider_id).await?.ok_or_else(|| {
                InstallError::invalid_request(format!(
                    "network provider {provider_id} does not exist"
                ))
            })?;
        if !provider.is_ovn_network_provider() {
            return Ok(None);
        }

        match resolve_url_host(&provider.url).await {
            Some(ip) => Ok(Some(ip)),
            None => {
                Err(InstallError::ProviderResolution { url: provider.url })
            }
        }
    }

    /// The node's IP address as a string, for the OVN tunneling interface.
    ///
    /// Falls back to the bare hostname if it doesn't resolve.
    async fn node_address(&self, log: &Logger, node: &Node) -> String {
        if let Some(ip) = node.ip_literal() {
            return ip.to_string();
        }
        let resolved =
            tokio::net::lookup_host((node.hostname.as_str(), node.ssh_port))
                .await
                .map(|mut addrs| addrs.next());
        match resolved {
            Ok(Some(addr)) => addr.ip().to_string(),
            Ok(None) => {
                warn!(log, "node hostname resolved to no addresses");
                node.hostname.clone()
            }
            Err(error) => {
                warn!(
                    log, "failed to resolve node hostname";
                    "error" => %error,
                );
                node.hostname.clone()
            }
        }
    }
}

/// Extract an IP address from the host part of `url`, resolving it if it is
/// a domain name.
async fn resolve_url_host(url: &str) -> Option<IpAddr> {
    let url = Url::parse(url).ok()?;
    match url.host()? {
        Host::Ipv4(ip) => Some(IpAddr::V4(ip)),
        Host::Ipv6(ip) => Some(IpAddr::V6(ip)),
        Host::Domain(domain) => tokio::net::lookup_host((domain, 0))
            .await
            .ok()?
            .next()
            .map(|addr| addr.ip()),
    }
}
