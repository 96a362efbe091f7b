// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Errors reported by an install session

use crate::playbook::PlaybookError;
use crate::provisioning::ProvisioningError;
use crate::store::StoreError;
use camino::Utf8Path;
use camino::Utf8PathBuf;
use node_install_types::NodeStatus;
use node_install_types::NodeUuid;
use thiserror::Error;

/// Why an install session failed.
///
/// Every variant except [`InstallError::LockContention`] corresponds to a node
/// status the session leaves behind; see [`InstallError::node_status`].
#[derive(Debug, Error)]
pub enum InstallError {
    /// Another session already holds the node's install lock.
    #[error("object locked: node {node_id} is being installed by another session")]
    LockContention { node_id: NodeUuid },

    /// The request or the records it refers to cannot be installed as given.
    #[error("invalid request: {message}")]
    InvalidRequest { message: String },

    /// A step of the install failed in a way that has been classified into
    /// the status the node should be left in.
    #[error("{message}")]
    RunFailure {
        status: NodeStatus,
        message: String,
        /// Log of the failed step, when there is one to point operators at.
        log_path: Option<Utf8PathBuf>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },

    /// The OVN central address could not be derived from the network
    /// provider's URL.
    #[error("failed to extract OVN central IP from {url}")]
    ProviderResolution { url: String },

    #[error("node store operation failed")]
    Store(#[from] StoreError),

    #[error("provisioning run could not be executed")]
    Provisioning(#[from] ProvisioningError),

    #[error("post-install playbook could not be executed")]
    Playbook(#[from] PlaybookError),
}

impl InstallError {
    pub fn invalid_request(message: impl Into<String>) -> Self {
        InstallError::InvalidRequest { message: message.into() }
    }

    pub fn run_failure(status: NodeStatus, message: impl Into<String>) -> Self {
        InstallError::RunFailure {
            status,
            message: message.into(),
            log_path: None,
            source: None,
        }
    }

    /// Attach the underlying cause to a [`InstallError::RunFailure`].
    ///
    /// Other variants are returned unchanged.
    pub fn with_source<E>(mut self, error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        if let InstallError::RunFailure { source, .. } = &mut self {
            *source = Some(Box::new(error));
        }
        self
    }

    /// The status a node is left in when its install session fails with this
    /// error.
    ///
    /// Returns `None` for lock contention: the session never touched the
    /// node.
    pub fn node_status(&self) -> Option<NodeStatus> {
        match self {
            InstallError::LockContention { .. } => None,
            InstallError::RunFailure { status, .. } => Some(*status),
            InstallError::InvalidRequest { .. }
            | InstallError::ProviderResolution { .. }
            | InstallError::Store(_)
            | InstallError::Provisioning(_)
            | InstallError::Playbook(_) => Some(NodeStatus::InstallFailed),
        }
    }

    pub fn log_path(&self) -> Option<&Utf8Path> {
        match self {
            InstallError::RunFailure { log_path, .. } => log_path.as_deref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use display_error_chain::DisplayErrorChain;

    #[test]
    fn statuses() {
        assert_eq!(
            InstallError::LockContention { node_id: NodeUuid::new_v4() }
                .node_status(),
            None
        );
        assert_eq!(
            InstallError::invalid_request("nope").node_status(),
            Some(NodeStatus::InstallFailed)
        );
        assert_eq!(
            InstallError::ProviderResolution { url: "x".to_string() }
                .node_status(),
            Some(NodeStatus::InstallFailed)
        );
        assert_eq!(
            InstallError::run_failure(NodeStatus::NonOperational, "boom")
                .node_status(),
            Some(NodeStatus::NonOperational)
        );
    }

    #[test]
    fn source_is_reported_in_chain() {
        let error = InstallError::run_failure(
            NodeStatus::NonResponsive,
            "Network error during communication with the node",
        )
        .with_source(std::io::Error::other("connection reset"));
        let chain = DisplayErrorChain::new(&error).to_string();
        assert!(chain.contains("Network error during communication"), "{chain}");
        assert!(chain.contains("connection reset"), "{chain}");
    }
}
