//! Configuration file parsing for macvland
//!
//! Parses `macvland.toml` configuration files using serde

use crate::driver::{DEFAULT_CONTAINER_PREFIX, DriverOptions};
use crate::endpoint::EndpointRecord;
use crate::error::{Error, Result};
use crate::network::link::MAX_IFNAME_LEN;
use crate::network::naming::{DEFAULT_PREFIX, SUFFIX_LEN};
use crate::network::{LinkManager, MacvlanMode, Subnet};
use crate::registry::{NetworkConfig, Registry};
use ipnet::IpNet;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Load configuration from a file
pub fn load(path: &Path) -> Result<MacvlandConfig> {
    let content = fs::read_to_string(path).map_err(|e| Error::ConfigRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    parse(&content)
}

/// Parse and validate configuration text
pub fn parse(content: &str) -> Result<MacvlandConfig> {
    let config: MacvlandConfig = toml::from_str(content)?;
    config.validate()?;
    Ok(config)
}

/// Root configuration structure
#[derive(Debug, Deserialize)]
pub struct MacvlandConfig {
    /// Global driver settings
    #[serde(default)]
    pub config: GlobalConfig,

    /// Network definitions
    #[serde(default)]
    pub networks: Vec<NetworkDef>,
}

impl MacvlandConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let prefix = &self.config.interface_prefix;
        if prefix.is_empty() || prefix.len() + SUFFIX_LEN > MAX_IFNAME_LEN {
            return Err(Error::ConfigValidation(format!(
                "interface_prefix '{}' must be 1-{} characters",
                prefix,
                MAX_IFNAME_LEN - SUFFIX_LEN
            )));
        }

        if self.config.container_prefix.is_empty() {
            return Err(Error::ConfigValidation(
                "container_prefix must not be empty".into(),
            ));
        }

        // Check for duplicate network IDs
        let mut ids = HashSet::new();
        for network in &self.networks {
            if network.id.is_empty() {
                return Err(Error::ConfigValidation("Network with empty id".into()));
            }
            if !ids.insert(&network.id) {
                return Err(Error::ConfigValidation(format!(
                    "Duplicate network id: {}",
                    network.id
                )));
            }
            network.validate()?;
        }

        Ok(())
    }

    /// Build the driver registry from the configured networks
    ///
    /// Networks without a parent get their dummy parent link created on the
    /// host if it is not there yet.
    pub fn build_registry(&self, links: &dyn LinkManager) -> Result<Registry> {
        let registry = Registry::new();
        for def in &self.networks {
            let config = def.network_config();
            if def.uses_dummy_parent() && !links.link_exists(&config.parent)? {
                links.create_dummy(&config.parent)?;
                info!(network = %def.id, parent = %config.parent, "Created dummy parent link");
            }

            let network = registry.add_network(&def.id, config)?;
            for ep in &def.endpoints {
                network.add_endpoint(ep.record(&def.id))?;
            }
        }
        Ok(registry)
    }

    pub fn driver_options(&self) -> DriverOptions {
        DriverOptions {
            interface_prefix: self.config.interface_prefix.clone(),
            container_prefix: self.config.container_prefix.clone(),
        }
    }
}

/// Global configuration settings
#[derive(Debug, Deserialize)]
pub struct GlobalConfig {
    /// Directory holding persisted endpoint records
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,

    /// Directory holding live binding state; cleared on reboot
    #[serde(default = "default_runtime_dir")]
    pub runtime_dir: PathBuf,

    /// Prefix for generated host-side interface names
    #[serde(default = "default_interface_prefix")]
    pub interface_prefix: String,

    /// Prefix for the container-side interface name
    #[serde(default = "default_container_prefix")]
    pub container_prefix: String,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            state_dir: default_state_dir(),
            runtime_dir: default_runtime_dir(),
            interface_prefix: default_interface_prefix(),
            container_prefix: default_container_prefix(),
        }
    }
}

fn default_state_dir() -> PathBuf {
    PathBuf::from("/var/lib/macvland")
}

fn default_runtime_dir() -> PathBuf {
    PathBuf::from("/run/macvland")
}

fn default_interface_prefix() -> String {
    DEFAULT_PREFIX.into()
}

fn default_container_prefix() -> String {
    DEFAULT_CONTAINER_PREFIX.into()
}

/// Network definition
#[derive(Debug, Clone, Deserialize)]
pub struct NetworkDef {
    /// Network ID
    pub id: String,

    /// Parent interface; when absent the network is internal
    pub parent: Option<String>,

    /// Macvlan mode
    #[serde(default)]
    pub mode: MacvlanMode,

    /// Operator-requested internal network
    #[serde(default)]
    pub internal: bool,

    #[serde(default)]
    pub ipv4_subnets: Vec<Subnet>,

    #[serde(default)]
    pub ipv6_subnets: Vec<Subnet>,

    /// Endpoints already created on this network
    #[serde(default)]
    pub endpoints: Vec<EndpointDef>,
}

impl NetworkDef {
    fn validate(&self) -> Result<()> {
        for (subnets, v4) in [(&self.ipv4_subnets, true), (&self.ipv6_subnets, false)] {
            for subnet in subnets {
                let net: IpNet = subnet.subnet_cidr.parse().map_err(|e| {
                    Error::ConfigValidation(format!(
                        "Invalid subnet '{}' for network '{}': {}",
                        subnet.subnet_cidr, self.id, e
                    ))
                })?;
                if matches!(net, IpNet::V4(_)) != v4 {
                    return Err(Error::ConfigValidation(format!(
                        "Subnet '{}' listed under the wrong family for network '{}'",
                        subnet.subnet_cidr, self.id
                    )));
                }
            }
        }

        let mut ids = HashSet::new();
        for ep in &self.endpoints {
            if ep.id.is_empty() {
                return Err(Error::ConfigValidation(format!(
                    "Endpoint with empty id in network '{}'",
                    self.id
                )));
            }
            if !ids.insert(&ep.id) {
                return Err(Error::ConfigValidation(format!(
                    "Duplicate endpoint id '{}' in network '{}'",
                    ep.id, self.id
                )));
            }
            if matches!(ep.address, Some(IpNet::V6(_))) {
                return Err(Error::ConfigValidation(format!(
                    "Endpoint '{}' address must be IPv4",
                    ep.id
                )));
            }
            if matches!(ep.address_v6, Some(IpNet::V4(_))) {
                return Err(Error::ConfigValidation(format!(
                    "Endpoint '{}' address_v6 must be IPv6",
                    ep.id
                )));
            }
        }

        Ok(())
    }

    fn uses_dummy_parent(&self) -> bool {
        self.parent.as_deref().is_none_or(str::is_empty)
    }

    /// Driver-side network configuration
    ///
    /// A network without a parent is bound to a dummy parent named after
    /// the network and forced internal.
    pub fn network_config(&self) -> NetworkConfig {
        let (parent, internal) = match self.parent.as_deref() {
            Some(parent) if !parent.is_empty() => (parent.to_string(), self.internal),
            _ => (dummy_parent_name(&self.id), true),
        };

        NetworkConfig {
            parent,
            mode: self.mode,
            internal,
            ipv4_subnets: self.ipv4_subnets.clone(),
            ipv6_subnets: self.ipv6_subnets.clone(),
        }
    }
}

/// Dummy parent link name for a network created without a parent
pub fn dummy_parent_name(network_id: &str) -> String {
    let short: String = network_id.chars().take(12).collect();
    format!("dm-{}", short)
}

/// Endpoint definition
#[derive(Debug, Clone, Deserialize)]
pub struct EndpointDef {
    pub id: String,
    pub address: Option<IpNet>,
    pub address_v6: Option<IpNet>,
}

impl EndpointDef {
    fn record(&self, network_id: &str) -> EndpointRecord {
        let mut record = EndpointRecord::new(&self.id, network_id);
        record.addr = self.address;
        record.addr_v6 = self.address_v6;
        record
    }
}
