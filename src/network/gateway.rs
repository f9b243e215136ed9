//! Gateway policy for joining endpoints
//!
//! Decides whether a sandbox gets a default gateway and from which subnet:
//! - Internal networks never get one and the gateway service is disabled
//! - External networks with subnets must resolve the endpoint address
//! - External networks without any subnet disable the gateway service

use crate::endpoint::EndpointRecord;
use crate::error::{Error, Family, Result};
use crate::join_info::JoinInfo;
use crate::network::subnet::{self, Subnet};
use crate::registry::NetworkConfig;
use ipnet::IpNet;
use std::net::IpAddr;

/// Result of applying the gateway policy to one endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GatewayDecision {
    /// IPv4 gateway to advertise
    pub gateway: Option<IpAddr>,
    /// IPv6 gateway to advertise
    pub gateway_v6: Option<IpAddr>,
    /// Whether the gateway service must be disabled for this endpoint
    pub disable_service: bool,
}

impl GatewayDecision {
    /// Push the decision onto the sandbox join info
    pub fn apply(&self, info: &mut dyn JoinInfo) -> Result<()> {
        if let Some(gw) = self.gateway {
            info.set_gateway(gw)?;
        }
        if let Some(gw) = self.gateway_v6 {
            info.set_gateway_v6(gw)?;
        }
        if self.disable_service {
            info.disable_gateway_service();
        }
        Ok(())
    }
}

pub struct GatewayPolicy;

impl GatewayPolicy {
    pub fn decide(config: &NetworkConfig, endpoint: &EndpointRecord) -> Result<GatewayDecision> {
        let mut decision = GatewayDecision::default();

        // Covers networks marked internal because no parent could be bound
        if config.internal {
            decision.disable_service = true;
            return Ok(decision);
        }

        if !config.ipv4_subnets.is_empty() {
            decision.gateway = Some(Self::resolve_gateway(
                &endpoint.id,
                endpoint.addr.as_ref(),
                &config.ipv4_subnets,
                Family::V4,
            )?);
        }

        if endpoint.addr_v6.is_some() && !config.ipv6_subnets.is_empty() {
            decision.gateway_v6 = Some(Self::resolve_gateway(
                &endpoint.id,
                endpoint.addr_v6.as_ref(),
                &config.ipv6_subnets,
                Family::V6,
            )?);
        }

        // No addresses, no gateway
        if config.ipv4_subnets.is_empty() && config.ipv6_subnets.is_empty() {
            decision.disable_service = true;
        }

        Ok(decision)
    }

    fn resolve_gateway(
        endpoint: &str,
        addr: Option<&IpNet>,
        subnets: &[Subnet],
        family: Family,
    ) -> Result<IpAddr> {
        let mismatch = || Error::ConfigurationMismatch {
            endpoint: endpoint.to_string(),
            family,
        };

        let addr = addr.ok_or_else(mismatch)?;
        let subnet = subnet::resolve(addr, subnets).ok_or_else(mismatch)?;

        let gateway = subnet
            .gateway()
            .filter(|gw| match family {
                Family::V4 => gw.is_ipv4(),
                Family::V6 => gw.is_ipv6(),
            })
            .ok_or_else(|| Error::InvalidGateway {
                endpoint: endpoint.to_string(),
                gateway: subnet.gateway_ip.clone(),
                family,
            })?;

        Ok(gateway)
    }
}
