// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Configuration related types used by the node installer

use camino::{Utf8Path, Utf8PathBuf};
use dropshot::ConfigLogging;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    pub log: ConfigLogging,
    #[serde(default)]
    pub install: InstallConfig,
}

impl Config {
    /// Load a `Config` from the given TOML file
    pub fn from_file<P: AsRef<Utf8Path>>(
        path: P,
    ) -> Result<Config, ConfigError> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|error| {
            ConfigError::Io { error, path: path.to_owned() }
        })?;
        toml::from_str(&data).map_err(|error| ConfigError::Parse {
            error,
            path: path.to_owned(),
        })
    }
}

/// Knobs for the install orchestrator itself.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallConfig {
    /// Directory that post-install playbook logs are written to.
    pub deploy_log_dir: Utf8PathBuf,
    /// Playbook run after a complete provisioning run.
    pub playbook: String,
    /// Extra tasks file handed to the playbook.
    pub post_tasks_path: Utf8PathBuf,
    /// Private key used when a session authenticates with the default
    /// key pair instead of a password.
    pub default_key_path: Utf8PathBuf,
    pub agent_wait: AgentWaitConfig,
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            deploy_log_dir: Utf8PathBuf::from(
                "/var/log/node-install/host-deploy",
            ),
            playbook: "node-deploy.yml".to_string(),
            post_tasks_path: Utf8PathBuf::from(
                "/etc/node-install/host-deploy-post-tasks.yml",
            ),
            default_key_path: Utf8PathBuf::from(
                "/etc/node-install/keys/deploy_id_rsa",
            ),
            agent_wait: AgentWaitConfig::default(),
        }
    }
}

/// How long to wait for a node's management agent to answer after install.
///
/// The wait polls with exponential backoff, starting at `initial_interval_ms`
/// and capping each sleep at `max_interval_ms`, until `timeout_secs` have
/// elapsed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentWaitConfig {
    pub initial_interval_ms: u64,
    pub max_interval_ms: u64,
    pub timeout_secs: u64,
}

impl AgentWaitConfig {
    pub fn initial_interval(&self) -> Duration {
        Duration::from_millis(self.initial_interval_ms)
    }

    pub fn max_interval(&self) -> Duration {
        Duration::from_millis(self.max_interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for AgentWaitConfig {
    fn default() -> Self {
        Self { initial_interval_ms: 250, max_interval_ms: 5000, timeout_secs: 120 }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {path}")]
    Io {
        #[source]
        error: std::io::Error,
        path: Utf8PathBuf,
    },
    #[error("Failed to parse config file: {path}")]
    Parse {
        #[source]
        error: toml::de::Error,
        path: Utf8PathBuf,
    },
}
