// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Executable that runs one install session against simulated collaborators

use anyhow::Context;
use anyhow::anyhow;
use camino::Utf8PathBuf;
use clap::Parser;
use node_install::AuthMethod;
use node_install::Config;
use node_install::InstallOrchestrator;
use node_install::InstallRequest;
use node_install::sim::SimInventory;
use node_install_types::ProviderUuid;
use secrecy::SecretString;

#[derive(Debug, Parser)]
#[clap(
    name = "node-install-sim",
    about = "Install a simulated node described by an inventory file"
)]
enum Args {
    /// Run one install session and report the node's final status
    Run {
        #[clap(name = "CONFIG_FILE_PATH", action)]
        config_file_path: Utf8PathBuf,

        #[clap(name = "INVENTORY_FILE_PATH", action)]
        inventory_file_path: Utf8PathBuf,

        /// Activate the node after a successful install instead of leaving
        /// it in maintenance
        #[clap(long, action)]
        activate: bool,

        /// Leave the node's firewall configuration alone
        #[clap(long, action)]
        no_override_firewall: bool,

        /// Configure the serial console (the default)
        #[clap(long, action, overrides_with = "no_serial_console")]
        serial_console: bool,

        /// Don't configure the serial console
        #[clap(long, action, overrides_with = "serial_console")]
        no_serial_console: bool,

        /// Correlation id for logs and audit events; generated if omitted
        #[clap(long, action)]
        correlation_id: Option<String>,

        /// Authentication method wire code: 0 for password, 1 for the
        /// default key pair
        #[clap(long, action, default_value_t = 1)]
        auth_method: u32,

        /// Password used with `--auth-method 0`
        #[clap(long, env = "NODE_INSTALL_PASSWORD", hide_env_values = true)]
        password: Option<String>,

        /// Network provider the node's cluster is attached to
        #[clap(long, action)]
        network_provider: Option<ProviderUuid>,
    },
}

#[tokio::main]
async fn main() {
    if let Err(error) = do_run().await {
        eprintln!("node-install-sim: {error:#}");
        std::process::exit(1);
    }
}

async fn do_run() -> anyhow::Result<()> {
    let Args::Run {
        config_file_path,
        inventory_file_path,
        activate,
        no_override_firewall,
        serial_console: _,
        no_serial_console,
        correlation_id,
        auth_method,
        password,
        network_provider,
    } = Args::parse();

    let config = Config::from_file(&config_file_path)
        .with_context(|| format!("loading {config_file_path}"))?;
    let inventory = SimInventory::from_file(&inventory_file_path)
        .with_context(|| format!("loading {inventory_file_path}"))?;
    let log = config
        .log
        .to_logger("node-install")
        .map_err(|error| anyhow!(error))
        .context("initializing logger")?;

    let node_id = inventory.node.id;
    let env = inventory.into_environment();
    let orchestrator =
        InstallOrchestrator::new(&log, config.install, env.collaborators());

    let auth =
        AuthMethod::from_wire(auth_method, password.map(SecretString::from))?;
    let mut request = InstallRequest::new(node_id, auth)
        .activate_host(activate)
        .override_firewall(!no_override_firewall)
        .enable_serial_console(!no_serial_console);
    if let Some(correlation_id) = correlation_id {
        request = request.correlation_id(correlation_id);
    }
    if let Some(provider_id) = network_provider {
        request = request.network_provider_id(provider_id);
    }

    let result = orchestrator.install(request).await;
    let final_status = env
        .nodes
        .node(node_id)
        .map(|node| node.status.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    match result {
        Ok(summary) => {
            println!(
                "node {} installed: outcome {}, status {}",
                summary.node_id, summary.outcome, summary.final_status
            );
            Ok(())
        }
        Err(error) => {
            println!("node {node_id} install failed: status {final_status}");
            Err(error.into())
        }
    }
}
