// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bringing a freshly installed node's management network in line with its
//! cluster

use crate::InstallError;
use crate::config::AgentWaitConfig;
use async_trait::async_trait;
use backoff::ExponentialBackoff;
use backoff::future::retry_notify;
use display_error_chain::DisplayErrorChain;
use node_install_types::Node;
use node_install_types::NodeStatus;
use slog::Logger;
use slog::debug;
use slog::error;
use slog::info;
use slog::o;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

const NETWORK_ERROR_MESSAGE: &str =
    "Network error during communication with the node";
const CONFIGURE_ERROR_MESSAGE: &str =
    "Failed to configure management network on the node";

#[derive(Debug, Error)]
pub enum AgentError {
    /// The agent could not be reached, or the exchange with it broke down.
    #[error("network error talking to node agent: {message}")]
    Network { message: String },

    /// The agent answered but the operation failed.
    #[error("node agent operation failed: {message}")]
    Operation { message: String },
}

/// Client for the management agent running on a node.
#[async_trait]
pub trait NodeAgent: Send + Sync {
    async fn ping(&self, node: &Node) -> Result<(), AgentError>;

    /// Ask the agent to report its current network configuration.
    async fn refresh_network_config(
        &self,
        node: &Node,
    ) -> Result<(), AgentError>;

    /// Create the cluster's management network on the node if it is missing.
    async fn ensure_management_network(
        &self,
        node: &Node,
    ) -> Result<(), AgentError>;
}

pub struct NetworkConvergence {
    log: Logger,
    agent: Arc<dyn NodeAgent>,
    wait: AgentWaitConfig,
}

impl NetworkConvergence {
    pub fn new(
        log: &Logger,
        agent: Arc<dyn NodeAgent>,
        wait: AgentWaitConfig,
    ) -> Self {
        Self {
            log: log.new(o!("component" => "NetworkConvergence")),
            agent,
            wait,
        }
    }

    fn wait_policy(&self) -> ExponentialBackoff {
        let initial_interval = self.wait.initial_interval();
        ExponentialBackoff {
            current_interval: initial_interval,
            initial_interval,
            multiplier: 2.0,
            max_interval: self.wait.max_interval(),
            max_elapsed_time: Some(self.wait.timeout()),
            ..ExponentialBackoff::default()
        }
    }

    /// Poll the node's agent until it answers or the configured wait runs
    /// out. Returns whether the agent answered.
    ///
    /// A ping that does not return is abandoned after `max_interval`, and
    /// the whole wait never exceeds `timeout`.
    pub async fn await_responsive(&self, log: &Logger, node: &Node) -> bool {
        let attempt_timeout = self.wait.max_interval();
        let ping = || async move {
            let result =
                tokio::time::timeout(attempt_timeout, self.agent.ping(node))
                    .await;
            match result {
                Ok(result) => result.map_err(backoff::Error::transient),
                Err(_) => Err(backoff::Error::transient(AgentError::Network {
                    message: format!(
                        "no answer to ping within {attempt_timeout:?}"
                    ),
                })),
            }
        };
        let log_failure = |error: AgentError, delay: Duration| {
            debug!(
                log, "node agent not responding yet";
                "retry_in" => ?delay,
                "error" => %error,
            );
        };

        let wait = retry_notify(self.wait_policy(), ping, log_failure);
        let error = match tokio::time::timeout(self.wait.timeout(), wait).await
        {
            Ok(Ok(())) => return true,
            Ok(Err(error)) => error,
            Err(_) => AgentError::Network {
                message: "wait for node agent timed out".to_string(),
            },
        };
        error!(
            log, "node agent never became responsive";
            "timeout" => ?self.wait.timeout(),
            "error" => %DisplayErrorChain::new(&error),
        );
        false
    }

    /// Wait for the node's agent, then refresh its network configuration and
    /// make sure the management network exists.
    ///
    /// Failures carry the status the node should be left in: `NonResponsive`
    /// when the node could not be talked to, `NonOperational` otherwise.
    pub async fn converge(&self, node: &Node) -> Result<(), InstallError> {
        let log = self.log.new(o!("node_id" => node.id.to_string()));

        if !self.await_responsive(&log, node).await {
            return Err(InstallError::run_failure(
                NodeStatus::NonResponsive,
                NETWORK_ERROR_MESSAGE,
            ));
        }

        let result = match self.agent.refresh_network_config(node).await {
            Ok(()) => self.agent.ensure_management_network(node).await,
            Err(error) => Err(error),
        };
        match result {
            Ok(()) => {
                info!(log, "management network converged");
                Ok(())
            }
            Err(error) => {
                error!(
                    log, "management network convergence failed";
                    "error" => %DisplayErrorChain::new(&error),
                );
                let (status, message) = match &error {
                    AgentError::Network { .. } => {
                        (NodeStatus::NonResponsive, NETWORK_ERROR_MESSAGE)
                    }
                    AgentError::Operation { .. } => {
                        (NodeStatus::NonOperational, CONFIGURE_ERROR_MESSAGE)
                    }
                };
                Err(InstallError::run_failure(status, message)
                    .with_source(error))
            }
        }
    }
}
