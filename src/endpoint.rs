//! Endpoint records and their binding state machine
//!
//! An endpoint binds one sandbox to one network. The record is what gets
//! persisted; the binding machine tracks the in-memory Join/Leave lifecycle
//! using the state-machines crate in dynamic dispatch mode.

use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use state_machines::state_machine;
use std::fmt;

state_machine! {
    name: BindingMachine,
    dynamic: true,
    initial: Unbound,
    states: [Unbound, Joining, Joined],
    events {
        join {
            transition: { from: Unbound, to: Joining }
        }
        joined {
            transition: { from: Joining, to: Joined }
        }
        abort {
            transition: { from: Joining, to: Unbound }
        }
        leave {
            transition: { from: Joined, to: Unbound }
        }
    }
}

/// Binding lifecycle state for external use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingState {
    Unbound,
    Joining,
    Joined,
}

impl BindingState {
    /// Parse state from the machine's string representation
    pub fn from_str(s: &str) -> Self {
        match s {
            "Joining" => BindingState::Joining,
            "Joined" => BindingState::Joined,
            _ => BindingState::Unbound,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BindingState::Unbound => "unbound",
            BindingState::Joining => "joining",
            BindingState::Joined => "joined",
        }
    }
}

/// Persistent endpoint data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointRecord {
    /// Endpoint ID
    pub id: String,
    /// Owning network ID
    pub network_id: String,
    /// IPv4 address with the endpoint's own mask
    #[serde(default)]
    pub addr: Option<IpNet>,
    /// IPv6 address with the endpoint's own mask
    #[serde(default)]
    pub addr_v6: Option<IpNet>,
    /// Host-side interface name, set during Join
    #[serde(default)]
    pub src_name: Option<String>,
}

impl EndpointRecord {
    pub fn new(id: impl Into<String>, network_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            network_id: network_id.into(),
            addr: None,
            addr_v6: None,
            src_name: None,
        }
    }

    #[allow(dead_code)]
    pub fn addr(mut self, addr: IpNet) -> Self {
        self.addr = Some(addr);
        self
    }

    #[allow(dead_code)]
    pub fn addr_v6(mut self, addr: IpNet) -> Self {
        self.addr_v6 = Some(addr);
        self
    }
}

/// Registry entry for an endpoint: record plus binding machine
pub struct EndpointSlot {
    pub record: EndpointRecord,
    machine: DynamicBindingMachine<()>,
}

impl EndpointSlot {
    pub fn new(record: EndpointRecord) -> Self {
        Self {
            record,
            machine: BindingMachine::new(()).into_dynamic(),
        }
    }

    /// Unbound -> Joined, for a binding recorded by an earlier driver run
    pub fn resume_joined(&mut self) -> Result<(), state_machines::DynamicError> {
        self.begin_join()?;
        self.joined()
    }

    /// Get current binding state
    pub fn state(&self) -> BindingState {
        BindingState::from_str(self.machine.current_state())
    }

    #[allow(dead_code)]
    pub fn is_joined(&self) -> bool {
        self.state() == BindingState::Joined
    }

    /// Unbound -> Joining
    pub fn begin_join(&mut self) -> Result<(), state_machines::DynamicError> {
        self.machine.handle(BindingMachineEvent::Join)
    }

    /// Joining -> Joined
    pub fn joined(&mut self) -> Result<(), state_machines::DynamicError> {
        self.machine.handle(BindingMachineEvent::Joined)
    }

    /// Joining -> Unbound
    pub fn abort(&mut self) -> Result<(), state_machines::DynamicError> {
        self.machine.handle(BindingMachineEvent::Abort)
    }

    /// Joined -> Unbound
    pub fn leave(&mut self) -> Result<(), state_machines::DynamicError> {
        self.machine.handle(BindingMachineEvent::Leave)
    }
}

impl fmt::Debug for EndpointSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointSlot")
            .field("record", &self.record)
            .field("state", &self.state())
            .finish()
    }
}
