// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Running the remote provisioning session against a node

use crate::AuthMethod;
use crate::InstallError;
use crate::deploy::DeploymentUnitSet;
use crate::store::NodeStore;
use async_trait::async_trait;
use camino::Utf8Path;
use camino::Utf8PathBuf;
use node_install_types::Node;
use node_install_types::NodeStatus;
use node_install_types::RunOutcome;
use secrecy::ExposeSecret;
use secrecy::SecretString;
use slog::Logger;
use slog::info;
use slog::o;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Credential the provisioning backend logs in to the node with.
pub enum Credential<'a> {
    Password(&'a SecretString),
    KeyPair { private_key: &'a Utf8Path },
}

impl fmt::Debug for Credential<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::Password(_) => f.write_str("Password(..)"),
            Credential::KeyPair { private_key } => f
                .debug_struct("KeyPair")
                .field("private_key", private_key)
                .finish(),
        }
    }
}

/// Everything a provisioning backend needs for one run.
#[derive(Debug)]
pub struct ProvisioningRequest<'a> {
    pub node: &'a Node,
    pub units: &'a DeploymentUnitSet,
    pub credential: Credential<'a>,
    pub correlation_id: &'a str,
}

#[derive(Debug, Error)]
pub enum ProvisioningError {
    #[error("failed to connect to {hostname}:{port}")]
    Connect {
        hostname: String,
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("provisioning session aborted: {message}")]
    Session { message: String },
}

/// Executes provisioning sessions on nodes.
#[async_trait]
pub trait ProvisioningBackend: Send + Sync {
    /// Run one provisioning session and report how far it got.
    ///
    /// An `Err` means the session could not be run at all; a run that
    /// started and then failed on the node is `Ok(RunOutcome::Failed)`.
    async fn run(
        &self,
        request: &ProvisioningRequest<'_>,
    ) -> Result<RunOutcome, ProvisioningError>;
}

/// Drives a single provisioning run for a node.
pub struct ProvisioningRunner {
    log: Logger,
    backend: Arc<dyn ProvisioningBackend>,
    nodes: Arc<dyn NodeStore>,
    default_key_path: Utf8PathBuf,
}

impl ProvisioningRunner {
    pub fn new(
        log: &Logger,
        backend: Arc<dyn ProvisioningBackend>,
        nodes: Arc<dyn NodeStore>,
        default_key_path: Utf8PathBuf,
    ) -> Self {
        Self {
            log: log.new(o!("component" => "ProvisioningRunner")),
            backend,
            nodes,
            default_key_path,
        }
    }

    /// Pick the credential for `auth`.
    ///
    /// This never touches the network, so a bad credential is reported
    /// before the node is marked as installing.
    pub fn resolve_credential<'a>(
        &'a self,
        auth: &'a AuthMethod,
    ) -> Result<Credential<'a>, InstallError> {
        match auth {
            AuthMethod::Password(password) => {
                if password.expose_secret().is_empty() {
                    return Err(InstallError::invalid_request(
                        "password authentication requested with an empty \
                         password",
                    ));
                }
                Ok(Credential::Password(password))
            }
            AuthMethod::PublicKey => Ok(Credential::KeyPair {
                private_key: &self.default_key_path,
            }),
        }
    }

    /// Mark `node` as installing and run one provisioning session on it.
    pub async fn run(
        &self,
        node: &Node,
        units: &DeploymentUnitSet,
        auth: &AuthMethod,
        correlation_id: &str,
    ) -> Result<RunOutcome, InstallError> {
        let credential = self.resolve_credential(auth)?;

        self.nodes.update_status(node.id, NodeStatus::Installing).await?;

        let log = self.log.new(o!(
            "node_id" => node.id.to_string(),
            "correlation_id" => correlation_id.to_owned(),
        ));
        info!(
            log, "starting provisioning run";
            "hostname" => &node.hostname,
            "auth" => auth.label(),
            "units" => ?units.names(),
        );

        let request = ProvisioningRequest {
            node,
            units,
            credential,
            correlation_id,
        };
        let outcome = self.backend.run(&request).await?;

        info!(log, "provisioning run finished"; "outcome" => %outcome);
        Ok(outcome)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::sim::SimNodeStore;
    use crate::sim::SimProvisioningBackend;
    use crate::test_util::test_setup_log;
    use assert_matches::assert_matches;
    use node_install_types::ClusterUuid;
    use node_install_types::NodeType;
    use node_install_types::NodeUuid;

    fn node() -> Node {
        Node {
            id: NodeUuid::new_v4(),
            name: "node1".to_string(),
            hostname: "192.0.2.10".to_string(),
            ssh_port: 22,
            management_port: 54321,
            node_type: NodeType::Standard,
            cluster_id: ClusterUuid::new_v4(),
            status: NodeStatus::Maintenance,
            current_kernel_cmdline: None,
            last_stored_kernel_cmdline: None,
        }
    }

    #[tokio::test]
    async fn marks_node_installing_before_run() {
        let logctx = test_setup_log("marks_node_installing_before_run");
        let node = node();
        let nodes = Arc::new(SimNodeStore::new());
        nodes.insert(node.clone());
        let backend = Arc::new(SimProvisioningBackend::new(RunOutcome::Reboot));
        let runner = ProvisioningRunner::new(
            &logctx.log,
            backend.clone(),
            nodes.clone(),
            "/keys/id_rsa".into(),
        );

        let outcome = runner
            .run(&node, &DeploymentUnitSet::new(), &AuthMethod::PublicKey, "c1")
            .await
            .unwrap();
        assert_eq!(outcome, RunOutcome::Reboot);
        assert_eq!(nodes.status_history(node.id), [NodeStatus::Installing]);

        let runs = backend.runs();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].correlation_id, "c1");
        assert_eq!(runs[0].credential, "key_pair:/keys/id_rsa");

        logctx.cleanup_successful();
    }

    #[tokio::test]
    async fn empty_password_rejected_before_any_side_effect() {
        let logctx =
            test_setup_log("empty_password_rejected_before_any_side_effect");
        let node = node();
        let nodes = Arc::new(SimNodeStore::new());
        nodes.insert(node.clone());
        let backend =
            Arc::new(SimProvisioningBackend::new(RunOutcome::Complete));
        let runner = ProvisioningRunner::new(
            &logctx.log,
            backend.clone(),
            nodes.clone(),
            "/keys/id_rsa".into(),
        );

        let auth = AuthMethod::Password(SecretString::from(""));
        let error = runner
            .run(&node, &DeploymentUnitSet::new(), &auth, "c1")
            .await
            .expect_err("empty password");
        assert_matches!(error, InstallError::InvalidRequest { .. });
        assert!(nodes.status_history(node.id).is_empty());
        assert!(backend.runs().is_empty());

        logctx.cleanup_successful();
    }

    #[test]
    fn password_never_shown() {
        let secret = SecretString::from("hunter2");
        let printed = format!("{:?}", Credential::Password(&secret));
        assert!(!printed.contains("hunter2"));
    }
}
