// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::ProviderUuid;
use serde::Deserialize;
use serde::Serialize;

/// Plugin type reported by external network providers backed by OVN.
pub const OVN_PLUGIN_TYPE: &str = "OVIRT_PROVIDER_OVN";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderType {
    ExternalNetwork,
    OpenstackNetwork,
    OpenstackImage,
    OpenstackVolume,
    Foreman,
    Kubevirt,
}

/// Metadata about an external provider attached to the system.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provider {
    pub id: ProviderUuid,
    pub name: String,
    pub provider_type: ProviderType,
    pub url: String,
    /// Only meaningful for network providers.
    #[serde(default)]
    pub plugin_type: Option<String>,
}

impl Provider {
    /// Whether this provider is an external network provider backed by OVN.
    pub fn is_ovn_network_provider(&self) -> bool {
        self.provider_type == ProviderType::ExternalNetwork
            && self.plugin_type.as_deref() == Some(OVN_PLUGIN_TYPE)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn ovn_detection() {
        let mut provider = Provider {
            id: ProviderUuid::new_v4(),
            name: "ovn".to_string(),
            provider_type: ProviderType::ExternalNetwork,
            url: "https://192.0.2.1:9696".to_string(),
            plugin_type: Some(OVN_PLUGIN_TYPE.to_string()),
        };
        assert!(provider.is_ovn_network_provider());

        provider.plugin_type = Some("OPEN_VSWITCH".to_string());
        assert!(!provider.is_ovn_network_provider());

        provider.plugin_type = Some(OVN_PLUGIN_TYPE.to_string());
        provider.provider_type = ProviderType::OpenstackNetwork;
        assert!(!provider.is_ovn_network_provider());
    }
}
