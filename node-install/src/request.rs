// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Parameters of an install request

use crate::InstallError;
use node_install_types::NodeUuid;
use node_install_types::ProviderUuid;
use secrecy::SecretString;
use std::collections::BTreeMap;

/// How the provisioning run authenticates to the node.
#[derive(Debug)]
pub enum AuthMethod {
    /// Use a password supplied with the request.
    Password(SecretString),
    /// Use the installer's default key pair.
    PublicKey,
}

impl AuthMethod {
    const PASSWORD: u32 = 0;
    const PUBLIC_KEY: u32 = 1;

    /// Build an `AuthMethod` from its numeric wire code and the password that
    /// accompanied the request, if any.
    pub fn from_wire(
        code: u32,
        password: Option<SecretString>,
    ) -> Result<AuthMethod, InstallError> {
        match code {
            Self::PASSWORD => password.map(AuthMethod::Password).ok_or_else(
                || {
                    InstallError::invalid_request(
                        "password authentication requested without a password",
                    )
                },
            ),
            Self::PUBLIC_KEY => Ok(AuthMethod::PublicKey),
            _ => Err(InstallError::invalid_request(format!(
                "invalid authentication method: {code}"
            ))),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AuthMethod::Password(_) => "password",
            AuthMethod::PublicKey => "public_key",
        }
    }
}

/// A request to (re)install a node.
///
/// Defaults follow what a fresh add or reinstall of a node normally wants:
/// override the node's firewall, enable the serial console, and leave the
/// node in maintenance afterwards.
#[derive(Debug)]
pub struct InstallRequest {
    pub node_id: NodeUuid,
    /// Identifier threaded through logs and audit events. Generated if not
    /// supplied.
    pub correlation_id: Option<String>,
    pub auth: AuthMethod,
    pub override_firewall: bool,
    /// Whether the node should be activated once installed, rather than
    /// left in maintenance.
    pub activate_host: bool,
    pub enable_serial_console: bool,
    /// Hosted-engine deployment settings. Empty means the node will not host
    /// the engine.
    pub hosted_engine_configuration: BTreeMap<String, String>,
    /// Network provider the node's cluster is attached to, if any.
    pub network_provider_id: Option<ProviderUuid>,
}

impl InstallRequest {
    pub fn new(node_id: NodeUuid, auth: AuthMethod) -> Self {
        Self {
            node_id,
            correlation_id: None,
            auth,
            override_firewall: true,
            activate_host: false,
            enable_serial_console: true,
            hosted_engine_configuration: BTreeMap::new(),
            network_provider_id: None,
        }
    }

    pub fn correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    pub fn override_firewall(mut self, value: bool) -> Self {
        self.override_firewall = value;
        self
    }

    pub fn activate_host(mut self, value: bool) -> Self {
        self.activate_host = value;
        self
    }

    pub fn enable_serial_console(mut self, value: bool) -> Self {
        self.enable_serial_console = value;
        self
    }

    pub fn hosted_engine_configuration(
        mut self,
        configuration: BTreeMap<String, String>,
    ) -> Self {
        self.hosted_engine_configuration = configuration;
        self
    }

    pub fn network_provider_id(mut self, id: ProviderUuid) -> Self {
        self.network_provider_id = Some(id);
        self
    }
}
