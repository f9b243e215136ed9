//! Join output published to the sandbox
//!
//! The orchestration layer hands the driver a `JoinInfo` during Join; the
//! driver fills in gateways and interface names on it.

use crate::error::{Error, Result};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::net::IpAddr;

/// Endpoint option carrying a user-requested container-side interface name
pub const IFNAME_OPTION: &str = "com.docker.network.endpoint.ifname";

/// Endpoint options passed to Join
pub type Options = HashMap<String, Value>;

/// Container-side name override from the endpoint options, if any
pub fn ifname_option(options: &Options) -> Option<&str> {
    options.get(IFNAME_OPTION).and_then(Value::as_str)
}

/// Mutators the driver uses to describe the sandbox's connectivity
pub trait JoinInfo {
    /// Default IPv4 gateway for the sandbox
    fn set_gateway(&mut self, gw: IpAddr) -> Result<()>;

    /// Default IPv6 gateway for the sandbox
    fn set_gateway_v6(&mut self, gw: IpAddr) -> Result<()>;

    /// Tell the orchestration layer not to provide a gateway endpoint
    fn disable_gateway_service(&mut self);

    /// Host-side interface, container-side prefix, and optional exact name
    fn set_names(&mut self, src_name: &str, dst_prefix: &str, dst_name: Option<&str>) -> Result<()>;
}

/// Interface names published by Join
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InterfaceNames {
    pub src_name: String,
    pub dst_prefix: String,
    pub dst_name: Option<String>,
}

/// Recording `JoinInfo` handed to sandboxes created by this binary
#[derive(Debug, Clone, Default, Serialize)]
pub struct SandboxJoinInfo {
    pub gateway: Option<IpAddr>,
    pub gateway_v6: Option<IpAddr>,
    pub gateway_service_disabled: bool,
    pub names: Option<InterfaceNames>,
}

impl SandboxJoinInfo {
    pub fn new() -> Self {
        Self::default()
    }
}

impl JoinInfo for SandboxJoinInfo {
    fn set_gateway(&mut self, gw: IpAddr) -> Result<()> {
        if !gw.is_ipv4() {
            return Err(Error::JoinInfo(format!("{} is not an IPv4 gateway", gw)));
        }
        self.gateway = Some(gw);
        Ok(())
    }

    fn set_gateway_v6(&mut self, gw: IpAddr) -> Result<()> {
        if !gw.is_ipv6() {
            return Err(Error::JoinInfo(format!("{} is not an IPv6 gateway", gw)));
        }
        self.gateway_v6 = Some(gw);
        Ok(())
    }

    fn disable_gateway_service(&mut self) {
        self.gateway_service_disabled = true;
    }

    fn set_names(&mut self, src_name: &str, dst_prefix: &str, dst_name: Option<&str>) -> Result<()> {
        if self.names.is_some() {
            return Err(Error::JoinInfo("Interface names already set".to_string()));
        }
        if src_name.is_empty() {
            return Err(Error::JoinInfo("Source interface name is empty".to_string()));
        }
        if dst_name.is_some_and(str::is_empty) {
            return Err(Error::JoinInfo(
                "Requested interface name is empty".to_string(),
            ));
        }

        self.names = Some(InterfaceNames {
            src_name: src_name.to_string(),
            dst_prefix: dst_prefix.to_string(),
            dst_name: dst_name.map(str::to_string),
        });
        Ok(())
    }
}
