// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Orchestration of node installs
//!
//! An install session takes a node's exclusive install lock, provisions the
//! node with a set of deployment units, runs the post-install playbook,
//! converges the node's management network, and leaves the node in a status
//! that reflects how far it got. [`InstallOrchestrator`] is the entry point;
//! everything it talks to is behind a trait so that [`sim`] can stand in for
//! the real systems.

pub mod audit;
pub mod config;
pub mod deploy;
mod error;
pub mod lock;
pub mod network;
pub mod orchestrator;
pub mod playbook;
pub mod provisioning;
mod request;
pub mod sim;
pub mod store;
#[cfg(test)]
mod test_util;

pub use config::Config;
pub use config::InstallConfig;
pub use error::InstallError;
pub use orchestrator::Collaborators;
pub use orchestrator::InstallOrchestrator;
pub use orchestrator::InstallSummary;
pub use request::AuthMethod;
pub use request::InstallRequest;
