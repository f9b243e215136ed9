//! In-memory fakes for the driver's host, store and ledger capabilities

use crate::bindings::{BindingKey, BindingLedger};
use crate::endpoint::EndpointRecord;
use crate::error::{Error, Result};
use crate::network::{LinkManager, MacvlanMode};
use crate::registry::lock;
use crate::store::EndpointStore;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

type Hook = Box<dyn Fn() + Send + Sync>;

/// Fake host interface table
#[derive(Default)]
pub struct FakeLinks {
    links: Mutex<BTreeSet<String>>,
    created: Mutex<Vec<(String, String, MacvlanMode)>>,
    dummies: Mutex<Vec<String>>,
    fail_create: AtomicBool,
    on_create: Mutex<Option<Hook>>,
}

impl FakeLinks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fake with a parent interface present
    pub fn with_parent(parent: &str) -> Self {
        let links = Self::new();
        links.add_existing(parent);
        links
    }

    pub fn add_existing(&self, name: &str) {
        lock(&self.links).insert(name.to_string());
    }

    pub fn fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    /// Run `hook` while a macvlan is being created
    pub fn on_create(&self, hook: impl Fn() + Send + Sync + 'static) {
        *lock(&self.on_create) = Some(Box::new(hook));
    }

    pub fn created(&self) -> Vec<(String, String, MacvlanMode)> {
        lock(&self.created).clone()
    }

    pub fn dummies(&self) -> Vec<String> {
        lock(&self.dummies).clone()
    }

    pub fn names(&self) -> Vec<String> {
        lock(&self.links).iter().cloned().collect()
    }
}

impl LinkManager for FakeLinks {
    fn link_exists(&self, name: &str) -> Result<bool> {
        Ok(lock(&self.links).contains(name))
    }

    fn create_macvlan(&self, name: &str, parent: &str, mode: MacvlanMode) -> Result<String> {
        if let Some(hook) = lock(&self.on_create).as_ref() {
            hook();
        }
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(Error::Link(format!("Failed to create the macvlan port {}", name)));
        }

        let mut links = lock(&self.links);
        if !links.contains(parent) {
            return Err(Error::Link(format!("Parent {} not found", parent)));
        }
        if !links.insert(name.to_string()) {
            return Err(Error::Link(format!("{} already exists", name)));
        }
        lock(&self.created).push((name.to_string(), parent.to_string(), mode));
        Ok(name.to_string())
    }

    fn create_dummy(&self, name: &str) -> Result<()> {
        if !lock(&self.links).insert(name.to_string()) {
            return Err(Error::Link(format!("{} already exists", name)));
        }
        lock(&self.dummies).push(name.to_string());
        Ok(())
    }

    fn list_links(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(lock(&self.links)
            .iter()
            .filter(|n| n.starts_with(prefix))
            .cloned()
            .collect())
    }

    fn delete_link(&self, name: &str) -> Result<()> {
        lock(&self.links).remove(name);
        Ok(())
    }
}

/// Fake endpoint store with injectable write failures
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<BTreeMap<String, EndpointRecord>>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn get(&self, id: &str) -> Option<EndpointRecord> {
        lock(&self.records).get(id).cloned()
    }

    pub fn len(&self) -> usize {
        lock(&self.records).len()
    }
}

impl EndpointStore for MemoryStore {
    fn upsert_endpoint(&self, record: &EndpointRecord) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::Store("store unavailable".to_string()));
        }
        lock(&self.records).insert(record.id.clone(), record.clone());
        Ok(())
    }

    fn load_endpoints(&self) -> Result<Vec<EndpointRecord>> {
        Ok(lock(&self.records).values().cloned().collect())
    }
}

/// Fake binding ledger with injectable write failures
#[derive(Default)]
pub struct MemoryLedger {
    joined: Mutex<HashSet<BindingKey>>,
    fail_writes: AtomicBool,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn contains(&self, nid: &str, eid: &str) -> bool {
        lock(&self.joined).contains(&(nid.to_string(), eid.to_string()))
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::Store("ledger unavailable".to_string()));
        }
        Ok(())
    }
}

impl BindingLedger for MemoryLedger {
    fn mark_joined(&self, nid: &str, eid: &str) -> Result<()> {
        self.check_writable()?;
        lock(&self.joined).insert((nid.to_string(), eid.to_string()));
        Ok(())
    }

    fn mark_left(&self, nid: &str, eid: &str) -> Result<()> {
        self.check_writable()?;
        lock(&self.joined).remove(&(nid.to_string(), eid.to_string()));
        Ok(())
    }

    fn joined(&self) -> Result<HashSet<BindingKey>> {
        Ok(lock(&self.joined).clone())
    }
}
