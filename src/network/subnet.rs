//! Subnet matching for endpoint addresses
//!
//! Maps an endpoint address (with its own mask) onto the configured subnet
//! that governs it. Used by the gateway policy during Join.

use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// A configured IP range plus its gateway address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subnet {
    /// Subnet in CIDR form (e.g., "10.0.0.0/24")
    #[serde(rename = "subnet")]
    pub subnet_cidr: String,
    /// Gateway address, bare or in CIDR form (e.g., "10.0.0.1" or "10.0.0.1/24")
    #[serde(rename = "gateway")]
    pub gateway_ip: String,
}

impl Subnet {
    #[allow(dead_code)]
    pub fn new(subnet_cidr: impl Into<String>, gateway_ip: impl Into<String>) -> Self {
        Self {
            subnet_cidr: subnet_cidr.into(),
            gateway_ip: gateway_ip.into(),
        }
    }

    /// Parse the gateway address
    ///
    /// Accepts both "10.0.0.1" and "10.0.0.1/24"; the prefix is discarded.
    pub fn gateway(&self) -> Option<IpAddr> {
        let raw = self.gateway_ip.trim();
        raw.parse::<IpNet>()
            .map(|net| net.addr())
            .or_else(|_| raw.parse::<IpAddr>())
            .ok()
    }
}

/// Find the subnet an address belongs to
///
/// Subnets are checked in configured order. A subnet only matches when its
/// prefix length equals the address's own mask length and it contains the
/// address. An unparseable subnet ends the search with no match.
pub fn resolve<'a>(addr: &IpNet, subnets: &'a [Subnet]) -> Option<&'a Subnet> {
    for subnet in subnets {
        let net: IpNet = match subnet.subnet_cidr.trim().parse() {
            Ok(net) => net,
            Err(_) => return None,
        };

        if net.prefix_len() != addr.prefix_len() {
            continue;
        }

        if net.contains(&addr.addr()) {
            return Some(subnet);
        }
    }

    None
}
