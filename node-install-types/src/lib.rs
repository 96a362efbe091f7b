// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Types shared between the node install orchestrator and its callers.
//!
//! Nothing in this crate performs I/O. The records here are the orchestrator's
//! view of entities persisted elsewhere: nodes, the clusters they belong to,
//! and the network providers a cluster may be attached to.

mod cluster;
mod ids;
mod node;
mod outcome;
mod provider;

pub use cluster::Cluster;
pub use cluster::FirewallType;
pub use cluster::SwitchType;
pub use ids::ClusterKind;
pub use ids::ClusterUuid;
pub use ids::NodeKind;
pub use ids::NodeUuid;
pub use ids::ProviderKind;
pub use ids::ProviderUuid;
pub use node::Node;
pub use node::NodeStatus;
pub use node::NodeType;
pub use outcome::RunOutcome;
pub use provider::OVN_PLUGIN_TYPE;
pub use provider::Provider;
pub use provider::ProviderType;
