//! Network registry
//!
//! Owns every configured network and its endpoints. The registry is the
//! single source of truth; callers resolve networks and endpoints by ID on
//! each operation and must not hold on to handles across calls.

use crate::bindings::BindingKey;
use crate::endpoint::{BindingState, EndpointRecord, EndpointSlot};
use crate::error::{Error, Result};
use crate::network::{MacvlanMode, Subnet};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use tracing::warn;

/// Shared handle to a registered endpoint
pub type EndpointHandle = Arc<Mutex<EndpointSlot>>;

/// Outcome of an ID lookup at the registry boundary
#[derive(Debug, Clone)]
pub enum Lookup<T> {
    Found(T),
    NotFound,
}

impl<T> Lookup<T> {
    pub fn found(self) -> Option<T> {
        match self {
            Lookup::Found(v) => Some(v),
            Lookup::NotFound => None,
        }
    }

    #[allow(dead_code)] // Public API for callers that only test presence
    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }
}

/// Immutable network configuration
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Parent interface the macvlan sub-interfaces attach to
    pub parent: String,
    /// Macvlan mode
    pub mode: MacvlanMode,
    /// Internal networks have no external reachability and no gateway
    pub internal: bool,
    /// IPv4 subnets in configured order
    pub ipv4_subnets: Vec<Subnet>,
    /// IPv6 subnets in configured order
    pub ipv6_subnets: Vec<Subnet>,
}

// Builder methods for NetworkConfig - public API for programmatic use
#[allow(dead_code)]
impl NetworkConfig {
    pub fn new(parent: impl Into<String>, mode: MacvlanMode) -> Self {
        Self {
            parent: parent.into(),
            mode,
            internal: false,
            ipv4_subnets: Vec::new(),
            ipv6_subnets: Vec::new(),
        }
    }

    pub fn internal(mut self, internal: bool) -> Self {
        self.internal = internal;
        self
    }

    pub fn ipv4_subnet(mut self, subnet: Subnet) -> Self {
        self.ipv4_subnets.push(subnet);
        self
    }

    pub fn ipv6_subnet(mut self, subnet: Subnet) -> Self {
        self.ipv6_subnets.push(subnet);
        self
    }
}

/// Lock a mutex, recovering the data if a previous holder panicked
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A macvlan network and the endpoints attached to it
#[derive(Debug)]
pub struct Network {
    id: String,
    config: NetworkConfig,
    endpoints: Mutex<HashMap<String, EndpointHandle>>,
}

impl Network {
    pub fn new(id: impl Into<String>, config: NetworkConfig) -> Self {
        Self {
            id: id.into(),
            config,
            endpoints: Mutex::new(HashMap::new()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    /// Look up an endpoint by ID
    pub fn lookup_endpoint(&self, eid: &str) -> Lookup<EndpointHandle> {
        match lock(&self.endpoints).get(eid) {
            Some(handle) => Lookup::Found(Arc::clone(handle)),
            None => Lookup::NotFound,
        }
    }

    /// Endpoint by ID, absent when unknown
    pub fn endpoint(&self, eid: &str) -> Option<EndpointHandle> {
        self.lookup_endpoint(eid).found()
    }

    /// Endpoint by ID, rejecting malformed IDs
    ///
    /// An unknown ID is not an error here; the caller decides how to treat
    /// `Lookup::NotFound`.
    pub fn get_endpoint(&self, eid: &str) -> Result<Lookup<EndpointHandle>> {
        if eid.is_empty() {
            return Err(Error::InvalidEndpointId(eid.to_string()));
        }
        Ok(self.lookup_endpoint(eid))
    }

    /// Register a new endpoint on this network
    pub fn add_endpoint(&self, record: EndpointRecord) -> Result<EndpointHandle> {
        self.insert_slot(EndpointSlot::new(record))
    }

    /// Reapply a persisted record to the configured endpoint with the same ID
    ///
    /// Only the host-side name and binding state come from the store; the
    /// addresses stay as configured. Returns false when the endpoint is no
    /// longer configured.
    pub fn restore_endpoint(&self, record: EndpointRecord, joined: bool) -> bool {
        let Some(handle) = self.endpoint(&record.id) else {
            return false;
        };

        let mut slot = lock(&handle);
        slot.record.src_name = record.src_name;
        if joined && slot.record.src_name.is_some() {
            if let Err(e) = slot.resume_joined() {
                warn!(
                    endpoint = %slot.record.id,
                    error = ?e,
                    "Could not resume endpoint binding"
                );
            }
        }
        true
    }

    fn insert_slot(&self, mut slot: EndpointSlot) -> Result<EndpointHandle> {
        if slot.record.id.is_empty() {
            return Err(Error::InvalidEndpointId(slot.record.id.clone()));
        }
        slot.record.network_id = self.id.clone();

        let mut endpoints = lock(&self.endpoints);
        if endpoints.contains_key(&slot.record.id) {
            return Err(Error::EndpointAlreadyExists(slot.record.id.clone()));
        }

        let id = slot.record.id.clone();
        let handle = Arc::new(Mutex::new(slot));
        endpoints.insert(id, Arc::clone(&handle));
        Ok(handle)
    }

    /// Remove an endpoint (deletion path)
    #[allow(dead_code)]
    pub fn remove_endpoint(&self, eid: &str) -> Option<EndpointHandle> {
        lock(&self.endpoints).remove(eid)
    }

    /// Snapshot of every endpoint record with its binding state, sorted by ID
    pub fn snapshot(&self) -> Vec<(EndpointRecord, BindingState)> {
        let handles: Vec<EndpointHandle> = lock(&self.endpoints).values().cloned().collect();
        let mut out: Vec<_> = handles
            .iter()
            .map(|h| {
                let slot = lock(h);
                (slot.record.clone(), slot.state())
            })
            .collect();
        out.sort_by(|a, b| a.0.id.cmp(&b.0.id));
        out
    }

    /// Host-side names currently recorded on endpoints of this network
    fn assigned_names(&self, into: &mut HashSet<String>) {
        let handles: Vec<EndpointHandle> = lock(&self.endpoints).values().cloned().collect();
        for handle in handles {
            if let Some(name) = &lock(&handle).record.src_name {
                into.insert(name.clone());
            }
        }
    }
}

/// Registry of all networks known to the driver
///
/// Created at driver startup and cleared at shutdown.
#[derive(Debug, Default)]
pub struct Registry {
    networks: RwLock<HashMap<String, Arc<Network>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a network
    pub fn add_network(&self, id: &str, config: NetworkConfig) -> Result<Arc<Network>> {
        if id.is_empty() {
            return Err(Error::InvalidNetworkId(id.to_string()));
        }

        let mut networks = self.networks.write().unwrap_or_else(PoisonError::into_inner);
        if networks.contains_key(id) {
            return Err(Error::NetworkAlreadyExists(id.to_string()));
        }

        let network = Arc::new(Network::new(id, config));
        networks.insert(id.to_string(), Arc::clone(&network));
        Ok(network)
    }

    /// Get a network by ID
    pub fn get_network(&self, nid: &str) -> Result<Arc<Network>> {
        if nid.is_empty() {
            return Err(Error::InvalidNetworkId(nid.to_string()));
        }

        self.networks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(nid)
            .cloned()
            .ok_or_else(|| Error::NetworkNotFound(nid.to_string()))
    }

    /// Remove a network (deletion path)
    #[allow(dead_code)]
    pub fn remove_network(&self, nid: &str) -> Option<Arc<Network>> {
        self.networks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(nid)
    }

    /// All networks, sorted by ID
    pub fn networks(&self) -> Vec<Arc<Network>> {
        let mut out: Vec<_> = self
            .networks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        out.sort_by(|a, b| a.id().cmp(b.id()));
        out
    }

    /// Host-side interface names recorded on any endpoint
    pub fn assigned_names(&self) -> HashSet<String> {
        let mut names = HashSet::new();
        for network in self.networks() {
            network.assigned_names(&mut names);
        }
        names
    }

    /// Reattach persisted endpoint records to their configured endpoints
    ///
    /// `joined` holds the bindings recorded as live by the runtime ledger.
    /// Returns the IDs of records whose network or endpoint is no longer
    /// configured; those records are not registered.
    pub fn restore(
        &self,
        records: Vec<EndpointRecord>,
        joined: &HashSet<BindingKey>,
    ) -> Vec<String> {
        let mut skipped = Vec::new();
        for record in records {
            let key = (record.network_id.clone(), record.id.clone());
            let restored = match self.get_network(&record.network_id) {
                Ok(network) => network.restore_endpoint(record, joined.contains(&key)),
                Err(_) => false,
            };
            if !restored {
                skipped.push(key.1);
            }
        }
        skipped
    }

    /// Drop all state (driver shutdown)
    pub fn clear(&self) {
        self.networks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
