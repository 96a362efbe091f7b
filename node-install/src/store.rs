// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Interfaces to the stores that persist the records an install touches
//!
//! The installer never owns these records. It reads clusters and providers,
//! and makes a small set of targeted updates to the node being installed.

use async_trait::async_trait;
use node_install_types::Cluster;
use node_install_types::ClusterUuid;
use node_install_types::Node;
use node_install_types::NodeStatus;
use node_install_types::NodeUuid;
use node_install_types::Provider;
use node_install_types::ProviderUuid;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record {id} not found")]
    NotFound { id: String },

    #[error("store unavailable: {message}")]
    Unavailable { message: String },
}

#[async_trait]
pub trait NodeStore: Send + Sync {
    async fn get(&self, id: NodeUuid) -> Result<Option<Node>, StoreError>;

    async fn update_status(
        &self,
        id: NodeUuid,
        status: NodeStatus,
    ) -> Result<(), StoreError>;

    /// Record `cmdline` as the kernel command line last applied to the node.
    async fn update_last_stored_kernel_cmdline(
        &self,
        id: NodeUuid,
        cmdline: Option<String>,
    ) -> Result<(), StoreError>;

    /// Note that the node has just been reinstalled.
    async fn mark_reinstalled(&self, id: NodeUuid) -> Result<(), StoreError>;
}

#[async_trait]
pub trait ClusterStore: Send + Sync {
    async fn get(&self, id: ClusterUuid)
        -> Result<Option<Cluster>, StoreError>;
}

#[async_trait]
pub trait ProviderStore: Send + Sync {
    async fn get(
        &self,
        id: ProviderUuid,
    ) -> Result<Option<Provider>, StoreError>;
}
