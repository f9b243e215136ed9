//! Runtime binding ledger
//!
//! Records which endpoints are currently joined so the binding survives
//! across driver invocations. The ledger is separate from the endpoint
//! store: Leave updates the ledger and never rewrites a persisted record.
//! It lives under a runtime directory (tmpfs on most hosts), so a reboot
//! forgets bindings along with the interfaces they referred to.

use crate::error::{Error, Result};
use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};

/// (network ID, endpoint ID)
pub type BindingKey = (String, String);

/// Cross-invocation record of joined endpoints
pub trait BindingLedger: Send + Sync {
    /// Record that an endpoint is joined
    fn mark_joined(&self, nid: &str, eid: &str) -> Result<()>;

    /// Record that an endpoint left; a missing entry is not an error
    fn mark_left(&self, nid: &str, eid: &str) -> Result<()>;

    /// Every endpoint currently recorded as joined
    fn joined(&self) -> Result<HashSet<BindingKey>>;
}

/// Ledger keeping one marker file per binding under
/// `<runtime_dir>/bindings/<network>/<endpoint>`
#[derive(Debug, Clone)]
pub struct RuntimeLedger {
    dir: PathBuf,
}

impl RuntimeLedger {
    pub fn open(runtime_dir: &Path) -> Result<Self> {
        let dir = runtime_dir.join("bindings");
        fs::create_dir_all(&dir).map_err(|e| {
            Error::Store(format!("Failed to create {}: {}", dir.display(), e))
        })?;
        Ok(Self { dir })
    }

    fn marker(&self, nid: &str, eid: &str) -> Result<PathBuf> {
        if !valid_component(nid) {
            return Err(Error::InvalidNetworkId(nid.to_string()));
        }
        if !valid_component(eid) {
            return Err(Error::InvalidEndpointId(eid.to_string()));
        }
        Ok(self.dir.join(nid).join(eid))
    }
}

/// IDs that would escape their directory are rejected
fn valid_component(id: &str) -> bool {
    !(id.is_empty() || id.contains(['/', '\\']) || id.starts_with('.'))
}

impl BindingLedger for RuntimeLedger {
    fn mark_joined(&self, nid: &str, eid: &str) -> Result<()> {
        let path = self.marker(nid, eid)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, b"")
            .map_err(|e| Error::Store(format!("Failed to write {}: {}", path.display(), e)))
    }

    fn mark_left(&self, nid: &str, eid: &str) -> Result<()> {
        let path = self.marker(nid, eid)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == IoErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Store(format!(
                "Failed to remove {}: {}",
                path.display(),
                e
            ))),
        }
    }

    fn joined(&self) -> Result<HashSet<BindingKey>> {
        let mut out = HashSet::new();
        for network in fs::read_dir(&self.dir)? {
            let network = network?;
            if !network.file_type()?.is_dir() {
                continue;
            }
            let nid = network.file_name().to_string_lossy().into_owned();
            for endpoint in fs::read_dir(network.path())? {
                let eid = endpoint?.file_name().to_string_lossy().into_owned();
                out.insert((nid.clone(), eid));
            }
        }
        Ok(out)
    }
}
