//! Network primitives for the macvlan driver
//!
//! Provides:
//! - Subnet matching for endpoint addresses
//! - Gateway policy per network mode
//! - Macvlan link management and host-side naming

pub mod gateway;
pub mod link;
pub mod naming;
pub mod subnet;

pub use gateway::GatewayPolicy;
pub use link::{IpLink, LinkManager, MacvlanMode};
pub use subnet::Subnet;
