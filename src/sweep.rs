//! Orphaned interface sweep
//!
//! Join creates the host interface before the endpoint is persisted. If the
//! store write fails, or the driver dies in between, the interface is left
//! on the host with no record pointing at it. The sweep finds interfaces
//! carrying the driver prefix that no persisted endpoint claims.
//!
//! Callers hold the state directory lock (`store::StateLock`) while sweeping
//! so an interface whose join is still in flight is not taken for an orphan.

use crate::endpoint::EndpointRecord;
use crate::error::Result;
use crate::network::LinkManager;
use crate::store::EndpointStore;
use serde::Serialize;
use std::collections::HashSet;
use tracing::{info, warn};

/// Outcome of a sweep
#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepReport {
    /// Interfaces no persisted endpoint claims
    pub orphans: Vec<String>,
    /// Orphans that were deleted
    pub deleted: Vec<String>,
    /// Orphans that could not be deleted, with the reason
    pub failed: Vec<(String, String)>,
}

/// Links not referenced by any record
pub fn find_orphans(links: &[String], records: &[EndpointRecord]) -> Vec<String> {
    let claimed: HashSet<&str> = records
        .iter()
        .filter_map(|r| r.src_name.as_deref())
        .collect();

    links
        .iter()
        .filter(|name| !claimed.contains(name.as_str()))
        .cloned()
        .collect()
}

/// List, report, and optionally delete orphaned interfaces
pub fn run(
    links: &dyn LinkManager,
    store: &dyn EndpointStore,
    prefix: &str,
    delete: bool,
) -> Result<SweepReport> {
    let records = store.load_endpoints()?;
    let present = links.list_links(prefix)?;

    let mut report = SweepReport {
        orphans: find_orphans(&present, &records),
        ..Default::default()
    };

    for name in &report.orphans {
        if !delete {
            info!(interface = %name, "Orphaned macvlan interface");
            continue;
        }
        match links.delete_link(name) {
            Ok(()) => {
                info!(interface = %name, "Deleted orphaned macvlan interface");
                report.deleted.push(name.clone());
            }
            Err(e) => {
                warn!(interface = %name, error = %e, "Failed to delete orphaned interface");
                report.failed.push((name.clone(), e.to_string()));
            }
        }
    }

    Ok(report)
}
