//! Macvlan driver: Join and Leave
//!
//! Join binds a sandbox to an endpoint:
//! 1. Resolve the network and endpoint
//! 2. Create a macvlan sub-interface on the network's parent
//! 3. Record the interface name and re-resolve the endpoint
//! 4. Apply the gateway policy and publish interface names
//! 5. Persist the endpoint and record the binding
//!
//! Leave validates that the binding still exists and clears it from the
//! binding ledger. The interface and the stored record are left alone;
//! interfaces created by a failed Join are left on the host for the orphan
//! sweep.

use crate::bindings::BindingLedger;
use crate::endpoint::BindingState;
use crate::error::{Error, Result};
use crate::join_info::{self, JoinInfo, Options};
use crate::network::naming::{self, DEFAULT_PREFIX};
use crate::network::{GatewayPolicy, LinkManager};
use crate::registry::{EndpointHandle, Network, Registry, lock};
use crate::store::EndpointStore;
use std::sync::Arc;
use tracing::{debug, warn};

/// Default prefix for the container-side interface name
pub const DEFAULT_CONTAINER_PREFIX: &str = "eth";

/// Naming settings for a driver instance
#[derive(Debug, Clone)]
pub struct DriverOptions {
    /// Prefix for generated host-side interface names
    pub interface_prefix: String,
    /// Prefix the sandbox uses when renaming the interface
    pub container_prefix: String,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            interface_prefix: DEFAULT_PREFIX.to_string(),
            container_prefix: DEFAULT_CONTAINER_PREFIX.to_string(),
        }
    }
}

/// The macvlan network driver
pub struct Driver {
    registry: Arc<Registry>,
    links: Arc<dyn LinkManager>,
    store: Arc<dyn EndpointStore>,
    bindings: Arc<dyn BindingLedger>,
    options: DriverOptions,
}

impl Driver {
    pub fn new(
        registry: Arc<Registry>,
        links: Arc<dyn LinkManager>,
        store: Arc<dyn EndpointStore>,
        bindings: Arc<dyn BindingLedger>,
        options: DriverOptions,
    ) -> Self {
        Self {
            registry,
            links,
            store,
            bindings,
            options,
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Reattach persisted endpoints to the registry (driver startup)
    pub fn restore(&self) -> Result<()> {
        let records = self.store.load_endpoints()?;
        let joined = self.bindings.joined()?;
        for id in self.registry.restore(records, &joined) {
            warn!(endpoint = %id, "Persisted endpoint is no longer configured; ignoring it");
        }
        Ok(())
    }

    /// Drop all in-memory state (driver shutdown)
    pub fn shutdown(&self) {
        self.registry.clear();
    }

    /// Attach a sandbox to an endpoint
    ///
    /// Any error means the endpoint is not joined. `info` may hold partial
    /// results after an error and must be discarded by the caller.
    pub fn join(
        &self,
        nid: &str,
        eid: &str,
        sandbox_key: &str,
        info: &mut dyn JoinInfo,
        options: &Options,
    ) -> Result<()> {
        let _span = tracing::debug_span!("macvlan.join", nid, eid, sandbox_key).entered();

        let network = self.registry.get_network(nid)?;
        let handle = network
            .endpoint(eid)
            .ok_or_else(|| Error::EndpointNotFound(eid.to_string()))?;

        // Claim the endpoint; a second Join sees Joining or Joined and stops here
        let previous_name = {
            let mut slot = lock(&handle);
            slot.begin_join()
                .map_err(|_| Error::AlreadyJoined(eid.to_string()))?;
            slot.record.src_name.clone()
        };

        match self.bind(nid, eid, &network, &handle, info, options) {
            Ok(()) => {
                lock(&handle)
                    .joined()
                    .map_err(|_| Error::AlreadyJoined(eid.to_string()))?;
                Ok(())
            }
            Err(e) => {
                let mut slot = lock(&handle);
                slot.record.src_name = previous_name;
                if let Err(abort) = slot.abort() {
                    warn!(
                        endpoint = %eid,
                        error = ?abort,
                        "Failed to roll back endpoint binding"
                    );
                }
                Err(e)
            }
        }
    }

    fn bind(
        &self,
        nid: &str,
        eid: &str,
        network: &Network,
        handle: &EndpointHandle,
        info: &mut dyn JoinInfo,
        options: &Options,
    ) -> Result<()> {
        let config = network.config();

        // Generate a name for the iface that will be renamed in the sandbox
        let taken = self.registry.assigned_names();
        let candidate = naming::generate_interface_name(
            self.links.as_ref(),
            &self.options.interface_prefix,
            |name| taken.contains(name),
        )
        .map_err(|e| Error::ResourceCreation {
            endpoint: eid.to_string(),
            message: format!("error generating an interface name: {}", e),
        })?;

        let src_name = self
            .links
            .create_macvlan(&candidate, &config.parent, config.mode)
            .map_err(|e| Error::ResourceCreation {
                endpoint: eid.to_string(),
                message: e.to_string(),
            })?;

        lock(handle).record.src_name = Some(src_name.clone());

        // Interface creation can be slow; the registry may have moved on
        let current = self
            .registry
            .get_network(nid)?
            .endpoint(eid)
            .ok_or_else(|| Error::EndpointNotFound(eid.to_string()))?;
        if !Arc::ptr_eq(&current, handle) {
            return Err(Error::EndpointReplaced(eid.to_string()));
        }
        let record = lock(&current).record.clone();

        // Decide before touching `info` so policy errors leave it untouched
        let decision = GatewayPolicy::decide(config, &record)?;

        info.set_names(
            &src_name,
            &self.options.container_prefix,
            join_info::ifname_option(options),
        )
        .map_err(|e| Error::Sandbox {
            endpoint: eid.to_string(),
            message: e.to_string(),
        })?;

        decision.apply(info).map_err(|e| Error::Sandbox {
            endpoint: eid.to_string(),
            message: e.to_string(),
        })?;

        if config.internal {
            debug!(
                ipv4 = ?record.addr,
                ipv6 = ?record.addr_v6,
                mode = %config.mode,
                parent = %config.parent,
                "Macvlan endpoint joined internal network"
            );
        } else {
            debug!(
                ipv4 = ?record.addr,
                gateway = ?decision.gateway,
                ipv6 = ?record.addr_v6,
                gateway_v6 = ?decision.gateway_v6,
                gateway_service = !decision.disable_service,
                mode = %config.mode,
                parent = %config.parent,
                "Macvlan endpoint joined"
            );
        }

        if let Err(e) = self.store.upsert_endpoint(&record) {
            warn!(
                interface = %src_name,
                "Interface exists but endpoint is not recorded; left for the orphan sweep"
            );
            return Err(Error::Persistence {
                endpoint: eid.to_string(),
                message: e.to_string(),
            });
        }

        self.bindings
            .mark_joined(nid, eid)
            .map_err(|e| Error::Binding {
                endpoint: eid.to_string(),
                message: e.to_string(),
            })
    }

    /// Detach a sandbox from an endpoint
    ///
    /// Clears the binding only: the interface, gateway and stored record are
    /// left untouched.
    pub fn leave(&self, nid: &str, eid: &str) -> Result<()> {
        let _span = tracing::debug_span!("macvlan.leave", nid, eid).entered();

        let network = self.registry.get_network(nid)?;
        let handle = network
            .get_endpoint(eid)?
            .found()
            .ok_or_else(|| Error::EndpointNotFound(eid.to_string()))?;

        let mut slot = lock(&handle);
        if slot.state() != BindingState::Joined {
            return Err(Error::EndpointNotJoined(eid.to_string()));
        }

        // Ledger first: a failed write keeps the endpoint joined everywhere
        self.bindings
            .mark_left(nid, eid)
            .map_err(|e| Error::Binding {
                endpoint: eid.to_string(),
                message: e.to_string(),
            })?;
        slot.leave()
            .map_err(|_| Error::EndpointNotJoined(eid.to_string()))?;

        debug!(interface = ?slot.record.src_name, "Macvlan endpoint left");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::EndpointRecord;
    use crate::error::{ErrorKind, Family};
    use crate::join_info::{IFNAME_OPTION, SandboxJoinInfo};
    use crate::network::{MacvlanMode, Subnet};
    use crate::registry::NetworkConfig;
    use crate::testing::{FakeLinks, MemoryLedger, MemoryStore};

    struct Harness {
        driver: Arc<Driver>,
        links: Arc<FakeLinks>,
        store: Arc<MemoryStore>,
        bindings: Arc<MemoryLedger>,
        config: NetworkConfig,
        endpoints: Vec<EndpointRecord>,
    }

    fn harness(config: NetworkConfig, endpoints: Vec<EndpointRecord>) -> Harness {
        start(
            Arc::new(FakeLinks::with_parent("eth0")),
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryLedger::new()),
            config,
            endpoints,
        )
    }

    /// A new driver over the same host, store and ledger, as a fresh
    /// process would build from the same configuration
    fn restart(h: &Harness) -> Harness {
        start(
            h.links.clone(),
            h.store.clone(),
            h.bindings.clone(),
            h.config.clone(),
            h.endpoints.clone(),
        )
    }

    fn start(
        links: Arc<FakeLinks>,
        store: Arc<MemoryStore>,
        bindings: Arc<MemoryLedger>,
        config: NetworkConfig,
        endpoints: Vec<EndpointRecord>,
    ) -> Harness {
        let registry = Arc::new(Registry::new());
        let network = registry.add_network("net1", config.clone()).unwrap();
        for ep in &endpoints {
            network.add_endpoint(ep.clone()).unwrap();
        }

        let driver = Driver::new(
            registry,
            links.clone(),
            store.clone(),
            bindings.clone(),
            DriverOptions::default(),
        );
        driver.restore().unwrap();

        Harness {
            driver: Arc::new(driver),
            links,
            store,
            bindings,
            config,
            endpoints,
        }
    }

    fn v4_network() -> NetworkConfig {
        NetworkConfig::new("eth0", MacvlanMode::Bridge)
            .ipv4_subnet(Subnet::new("10.0.0.0/24", "10.0.0.1"))
    }

    fn endpoint(addr: &str) -> EndpointRecord {
        EndpointRecord::new("ep1", "net1").addr(addr.parse().unwrap())
    }

    fn state(h: &Harness) -> BindingState {
        let network = h.driver.registry().get_network("net1").unwrap();
        let handle = network.endpoint("ep1").unwrap();
        lock(&handle).state()
    }

    fn join(h: &Harness, info: &mut SandboxJoinInfo) -> Result<()> {
        h.driver.join("net1", "ep1", "/var/run/netns/sb1", info, &Options::new())
    }

    #[test]
    fn test_join_resolves_v4_gateway() {
        let h = harness(v4_network(), vec![endpoint("10.0.0.5/24")]);
        let mut info = SandboxJoinInfo::new();

        join(&h, &mut info).unwrap();

        assert_eq!(info.gateway, Some("10.0.0.1".parse().unwrap()));
        assert!(!info.gateway_service_disabled);
        assert_eq!(state(&h), BindingState::Joined);

        let created = h.links.created();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].1, "eth0");
        assert_eq!(created[0].2, MacvlanMode::Bridge);

        let names = info.names.unwrap();
        assert_eq!(names.src_name, created[0].0);
        assert_eq!(names.dst_prefix, "eth");
        assert!(names.src_name.starts_with("macvlan"));

        let stored = h.store.get("ep1").unwrap();
        assert_eq!(stored.src_name.as_deref(), Some(created[0].0.as_str()));
        assert!(h.bindings.contains("net1", "ep1"));
    }

    #[test]
    fn test_join_outside_subnet_fails() {
        let h = harness(v4_network(), vec![endpoint("10.0.1.5/24")]);
        let mut info = SandboxJoinInfo::new();

        let err = join(&h, &mut info).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigurationMismatch);
        assert!(matches!(err, Error::ConfigurationMismatch { family: Family::V4, .. }));
        assert!(err.to_string().contains("ep1"));

        // Not bound: name rolled back, nothing persisted
        assert_eq!(state(&h), BindingState::Unbound);
        let network = h.driver.registry().get_network("net1").unwrap();
        assert_eq!(lock(&network.endpoint("ep1").unwrap()).record.src_name, None);
        assert_eq!(h.store.len(), 0);
        assert!(info.names.is_none());
    }

    #[test]
    fn test_join_internal_network() {
        let config = NetworkConfig::new("eth0", MacvlanMode::Private).internal(true);
        let h = harness(config, vec![endpoint("172.16.0.9/16")]);
        let mut info = SandboxJoinInfo::new();

        join(&h, &mut info).unwrap();

        assert!(info.gateway_service_disabled);
        assert_eq!(info.gateway, None);
        assert_eq!(h.links.created()[0].2, MacvlanMode::Private);
    }

    #[test]
    fn test_join_without_subnets_disables_gateway_service() {
        let config = NetworkConfig::new("eth0", MacvlanMode::Bridge);
        let h = harness(config, vec![EndpointRecord::new("ep1", "net1")]);
        let mut info = SandboxJoinInfo::new();

        join(&h, &mut info).unwrap();

        assert!(info.gateway_service_disabled);
        assert_eq!(info.gateway, None);
        assert_eq!(info.gateway_v6, None);
    }

    #[test]
    fn test_join_dual_stack() {
        let config = v4_network().ipv6_subnet(Subnet::new("fd00::/64", "fd00::1/64"));
        let ep = endpoint("10.0.0.5/24").addr_v6("fd00::5/64".parse().unwrap());
        let h = harness(config, vec![ep]);
        let mut info = SandboxJoinInfo::new();

        join(&h, &mut info).unwrap();

        assert_eq!(info.gateway, Some("10.0.0.1".parse().unwrap()));
        assert_eq!(info.gateway_v6, Some("fd00::1".parse().unwrap()));
    }

    #[test]
    fn test_join_unknown_ids() {
        let h = harness(v4_network(), vec![endpoint("10.0.0.5/24")]);
        let mut info = SandboxJoinInfo::new();

        let err = h
            .driver
            .join("nope", "ep1", "sb", &mut info, &Options::new())
            .unwrap_err();
        assert!(matches!(err, Error::NetworkNotFound(_)));

        let err = h
            .driver
            .join("net1", "nope", "sb", &mut info, &Options::new())
            .unwrap_err();
        assert!(matches!(err, Error::EndpointNotFound(_)));
        assert!(h.links.created().is_empty());
    }

    #[test]
    fn test_join_twice_is_rejected() {
        let h = harness(v4_network(), vec![endpoint("10.0.0.5/24")]);

        join(&h, &mut SandboxJoinInfo::new()).unwrap();
        let err = join(&h, &mut SandboxJoinInfo::new()).unwrap_err();

        assert!(matches!(err, Error::AlreadyJoined(_)));
        assert_eq!(h.links.created().len(), 1);
    }

    #[test]
    fn test_join_after_leave() {
        let h = harness(v4_network(), vec![endpoint("10.0.0.5/24")]);

        join(&h, &mut SandboxJoinInfo::new()).unwrap();
        h.driver.leave("net1", "ep1").unwrap();
        join(&h, &mut SandboxJoinInfo::new()).unwrap();

        assert_eq!(h.links.created().len(), 2);
        assert_eq!(state(&h), BindingState::Joined);
    }

    #[test]
    fn test_concurrent_joins_create_one_interface() {
        let h = harness(v4_network(), vec![endpoint("10.0.0.5/24")]);

        let results: Vec<Result<()>> = std::thread::scope(|s| {
            let workers: Vec<_> = (0..8)
                .map(|_| s.spawn(|| join(&h, &mut SandboxJoinInfo::new())))
                .collect();
            workers.into_iter().map(|w| w.join().unwrap()).collect()
        });

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(
            results
                .iter()
                .filter_map(|r| r.as_ref().err())
                .all(|e| matches!(e, Error::AlreadyJoined(_)))
        );
        assert_eq!(h.links.created().len(), 1);
    }

    #[test]
    fn test_link_failure_is_resource_creation() {
        let h = harness(v4_network(), vec![endpoint("10.0.0.5/24")]);
        h.links.fail_create(true);

        let err = join(&h, &mut SandboxJoinInfo::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ResourceCreation);
        assert!(err.to_string().contains("ep1"));
        assert_eq!(state(&h), BindingState::Unbound);

        // Not joined, so a retry goes through
        h.links.fail_create(false);
        join(&h, &mut SandboxJoinInfo::new()).unwrap();
    }

    #[test]
    fn test_persistence_failure() {
        let h = harness(v4_network(), vec![endpoint("10.0.0.5/24")]);
        h.store.fail_writes(true);

        let err = join(&h, &mut SandboxJoinInfo::new()).unwrap_err();
        assert!(matches!(err, Error::Persistence { ref endpoint, .. } if endpoint == "ep1"));
        assert_eq!(state(&h), BindingState::Unbound);

        // The interface stays on the host for the sweep
        assert_eq!(h.links.created().len(), 1);
        assert!(!h.bindings.contains("net1", "ep1"));
        assert!(matches!(
            h.driver.leave("net1", "ep1"),
            Err(Error::EndpointNotJoined(_))
        ));
    }

    #[test]
    fn test_sweep_reclaims_unrecorded_interface() {
        let h = harness(v4_network(), vec![endpoint("10.0.0.5/24")]);
        h.store.fail_writes(true);
        assert!(join(&h, &mut SandboxJoinInfo::new()).is_err());
        h.store.fail_writes(false);

        let report =
            crate::sweep::run(h.links.as_ref(), h.store.as_ref(), "macvlan", true).unwrap();
        assert_eq!(report.deleted.len(), 1);
        assert_eq!(h.links.names(), vec!["eth0".to_string()]);

        // A later successful join is recorded and survives the sweep
        join(&h, &mut SandboxJoinInfo::new()).unwrap();
        let report =
            crate::sweep::run(h.links.as_ref(), h.store.as_ref(), "macvlan", true).unwrap();
        assert!(report.orphans.is_empty());
    }

    #[test]
    fn test_endpoint_removed_during_create() {
        let h = harness(v4_network(), vec![endpoint("10.0.0.5/24")]);
        let registry = Arc::clone(h.driver.registry());
        h.links.on_create(move || {
            if let Ok(network) = registry.get_network("net1") {
                network.remove_endpoint("ep1");
            }
        });

        let err = join(&h, &mut SandboxJoinInfo::new()).unwrap_err();
        assert!(matches!(err, Error::EndpointNotFound(_)));
        assert_eq!(h.store.len(), 0);
    }

    #[test]
    fn test_endpoint_replaced_during_create() {
        let h = harness(v4_network(), vec![endpoint("10.0.0.5/24")]);
        let registry = Arc::clone(h.driver.registry());
        h.links.on_create(move || {
            if let Ok(network) = registry.get_network("net1") {
                if network.remove_endpoint("ep1").is_some() {
                    network
                        .add_endpoint(EndpointRecord::new("ep1", "net1"))
                        .unwrap();
                }
            }
        });

        let err = join(&h, &mut SandboxJoinInfo::new()).unwrap_err();
        assert!(matches!(err, Error::EndpointReplaced(_)));
    }

    #[test]
    fn test_ifname_override() {
        let h = harness(v4_network(), vec![endpoint("10.0.0.5/24")]);
        let mut options = Options::new();
        options.insert(IFNAME_OPTION.to_string(), serde_json::Value::from("data0"));
        let mut info = SandboxJoinInfo::new();

        h.driver
            .join("net1", "ep1", "sb", &mut info, &options)
            .unwrap();

        assert_eq!(info.names.unwrap().dst_name.as_deref(), Some("data0"));
    }

    #[test]
    fn test_join_info_rejection_names_endpoint() {
        let h = harness(v4_network(), vec![endpoint("10.0.0.5/24")]);
        let mut info = SandboxJoinInfo::new();
        info.set_names("preset", "eth", None).unwrap();

        let err = join(&h, &mut info).unwrap_err();
        assert!(matches!(err, Error::Sandbox { ref endpoint, .. } if endpoint == "ep1"));
        assert_eq!(h.store.len(), 0);

        // Rejected before any gateway was handed over
        assert_eq!(info.gateway, None);
        assert!(!info.gateway_service_disabled);
    }

    #[test]
    fn test_leave() {
        let h = harness(v4_network(), vec![endpoint("10.0.0.5/24")]);
        join(&h, &mut SandboxJoinInfo::new()).unwrap();
        let name = h.store.get("ep1").unwrap().src_name;

        h.driver.leave("net1", "ep1").unwrap();

        // Validation only: name, link and record untouched
        assert_eq!(state(&h), BindingState::Unbound);
        let network = h.driver.registry().get_network("net1").unwrap();
        assert_eq!(lock(&network.endpoint("ep1").unwrap()).record.src_name, name);
        assert_eq!(h.links.created().len(), 1);
        assert_eq!(h.store.get("ep1").unwrap().src_name, name);
        assert!(!h.bindings.contains("net1", "ep1"));
    }

    #[test]
    fn test_leave_never_joined() {
        let h = harness(v4_network(), vec![endpoint("10.0.0.5/24")]);

        let err = h.driver.leave("net1", "ep1").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = h.driver.leave("net1", "ghost").unwrap_err();
        assert!(matches!(err, Error::EndpointNotFound(_)));

        let err = h.driver.leave("nope", "ep1").unwrap_err();
        assert!(matches!(err, Error::NetworkNotFound(_)));

        let err = h.driver.leave("net1", "").unwrap_err();
        assert!(matches!(err, Error::InvalidEndpointId(_)));
    }

    #[test]
    fn test_restore_from_store() {
        let h = harness(v4_network(), vec![endpoint("10.0.0.5/24")]);
        join(&h, &mut SandboxJoinInfo::new()).unwrap();
        let name = h.store.get("ep1").unwrap().src_name;

        let h = restart(&h);
        assert_eq!(state(&h), BindingState::Joined);
        let network = h.driver.registry().get_network("net1").unwrap();
        assert_eq!(lock(&network.endpoint("ep1").unwrap()).record.src_name, name);

        h.driver.shutdown();
        assert!(h.driver.registry().networks().is_empty());
    }

    #[test]
    fn test_lifecycle_across_restarts() {
        let h = harness(v4_network(), vec![endpoint("10.0.0.5/24")]);
        join(&h, &mut SandboxJoinInfo::new()).unwrap();

        let h = restart(&h);
        assert!(matches!(
            join(&h, &mut SandboxJoinInfo::new()),
            Err(Error::AlreadyJoined(_))
        ));
        h.driver.leave("net1", "ep1").unwrap();

        let h = restart(&h);
        assert_eq!(state(&h), BindingState::Unbound);
        let err = h.driver.leave("net1", "ep1").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        join(&h, &mut SandboxJoinInfo::new()).unwrap();

        let h = restart(&h);
        assert_eq!(state(&h), BindingState::Joined);
        assert_eq!(h.links.created().len(), 2);
    }

    #[test]
    fn test_restore_uses_configured_address() {
        let h = harness(v4_network(), vec![endpoint("10.0.0.5/24")]);
        join(&h, &mut SandboxJoinInfo::new()).unwrap();
        h.driver.leave("net1", "ep1").unwrap();

        // Operator moves the endpoint out of every configured subnet
        let mut moved = restart(&h);
        moved.endpoints = vec![endpoint("10.9.0.5/24")];
        let h = restart(&moved);

        let err = join(&h, &mut SandboxJoinInfo::new()).unwrap_err();
        assert!(matches!(err, Error::ConfigurationMismatch { .. }));
    }

    #[test]
    fn test_unconfigured_record_not_restored() {
        let h = harness(v4_network(), vec![endpoint("10.0.0.5/24")]);
        join(&h, &mut SandboxJoinInfo::new()).unwrap();

        let mut removed = restart(&h);
        removed.endpoints.clear();
        let h = restart(&removed);

        let network = h.driver.registry().get_network("net1").unwrap();
        assert!(network.endpoint("ep1").is_none());
        assert!(matches!(
            h.driver.leave("net1", "ep1"),
            Err(Error::EndpointNotFound(_))
        ));
    }

    #[test]
    fn test_ledger_failure() {
        let h = harness(v4_network(), vec![endpoint("10.0.0.5/24")]);
        h.bindings.fail_writes(true);

        let err = join(&h, &mut SandboxJoinInfo::new()).unwrap_err();
        assert!(matches!(err, Error::Binding { ref endpoint, .. } if endpoint == "ep1"));
        assert_eq!(err.kind(), ErrorKind::Persistence);
        assert_eq!(state(&h), BindingState::Unbound);

        h.bindings.fail_writes(false);
        join(&h, &mut SandboxJoinInfo::new()).unwrap();

        // A Leave that cannot be recorded keeps the endpoint joined
        h.bindings.fail_writes(true);
        assert!(h.driver.leave("net1", "ep1").is_err());
        assert_eq!(state(&h), BindingState::Joined);
        assert!(h.bindings.contains("net1", "ep1"));
    }
}
