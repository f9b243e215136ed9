//! Macvlan link management
//!
//! Macvlan sub-interfaces hang off a parent interface on the host. The
//! driver creates one per endpoint; the sandbox later renames it to the
//! container-side name (e.g., "eth0").

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::ffi::CString;
use std::fmt;
use std::path::Path;
use std::process::Command;
use std::str::FromStr;

/// Maximum interface name length on Linux (IFNAMSIZ minus the NUL)
pub const MAX_IFNAME_LEN: usize = libc::IF_NAMESIZE - 1;

/// Macvlan operating mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MacvlanMode {
    #[default]
    Bridge,
    Vepa,
    Passthru,
    Private,
}

impl MacvlanMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            MacvlanMode::Bridge => "bridge",
            MacvlanMode::Vepa => "vepa",
            MacvlanMode::Passthru => "passthru",
            MacvlanMode::Private => "private",
        }
    }
}

impl fmt::Display for MacvlanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for MacvlanMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "" | "bridge" => Ok(MacvlanMode::Bridge),
            "vepa" => Ok(MacvlanMode::Vepa),
            "passthru" => Ok(MacvlanMode::Passthru),
            "private" => Ok(MacvlanMode::Private),
            other => Err(Error::ConfigValidation(format!(
                "Unknown macvlan mode '{}'",
                other
            ))),
        }
    }
}

/// Host interface operations the driver depends on
///
/// Implementations are responsible for bounding their own latency; the
/// driver propagates whatever failure they report.
pub trait LinkManager: Send + Sync {
    /// Check whether an interface with this name exists on the host
    fn link_exists(&self, name: &str) -> Result<bool>;

    /// Create a macvlan sub-interface on `parent`, returning its actual name
    fn create_macvlan(&self, name: &str, parent: &str, mode: MacvlanMode) -> Result<String>;

    /// Create a dummy interface and bring it up
    ///
    /// Stands in as the parent of networks configured without one.
    fn create_dummy(&self, name: &str) -> Result<()>;

    /// List host interfaces whose names start with `prefix`
    fn list_links(&self, prefix: &str) -> Result<Vec<String>>;

    /// Delete an interface; deleting a missing interface is not an error
    fn delete_link(&self, name: &str) -> Result<()>;
}

/// `LinkManager` backed by iproute2 and the kernel interface index
#[derive(Debug, Clone, Default)]
pub struct IpLink;

impl IpLink {
    pub fn new() -> Self {
        Self
    }

    fn run(args: &[&str]) -> Result<String> {
        let output = Command::new("ip")
            .args(args)
            .output()
            .map_err(|e| Error::CommandFailed {
                command: format!("ip {}", args.join(" ")),
                message: e.to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::CommandFailed {
                command: format!("ip {}", args.join(" ")),
                message: stderr.trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl LinkManager for IpLink {
    fn link_exists(&self, name: &str) -> Result<bool> {
        // Names that do not fit IFNAMSIZ can't exist
        if name.is_empty() || name.len() > MAX_IFNAME_LEN {
            return Ok(false);
        }

        let cname = CString::new(name)
            .map_err(|e| Error::Link(format!("Invalid interface name '{}': {}", name, e)))?;
        let index = unsafe { libc::if_nametoindex(cname.as_ptr()) };

        Ok(index != 0)
    }

    fn create_macvlan(&self, name: &str, parent: &str, mode: MacvlanMode) -> Result<String> {
        if !self.link_exists(parent)? {
            return Err(Error::Link(format!(
                "The requested parent interface {} was not found on the host",
                parent
            )));
        }

        Self::run(&[
            "link",
            "add",
            name,
            "link",
            parent,
            "type",
            "macvlan",
            "mode",
            mode.as_str(),
        ])
        .map_err(|e| {
            Error::Link(format!(
                "Failed to create the macvlan port {} on {}: {}",
                name, parent, e
            ))
        })?;

        Ok(name.to_string())
    }

    fn create_dummy(&self, name: &str) -> Result<()> {
        if name.is_empty() || name.len() > MAX_IFNAME_LEN {
            return Err(Error::Link(format!("Invalid dummy interface name '{}'", name)));
        }

        Self::run(&["link", "add", name, "type", "dummy"]).map_err(|e| {
            Error::Link(format!("Failed to create the dummy link {}: {}", name, e))
        })?;
        Self::run(&["link", "set", name, "up"]).map_err(|e| {
            Error::Link(format!("Failed to bring up the dummy link {}: {}", name, e))
        })?;

        Ok(())
    }

    fn list_links(&self, prefix: &str) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(Path::new("/sys/class/net"))? {
            let name = entry?.file_name().to_string_lossy().into_owned();
            if name.starts_with(prefix) {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    fn delete_link(&self, name: &str) -> Result<()> {
        match Self::run(&["link", "del", name]) {
            Ok(_) => Ok(()),
            // Already gone
            Err(Error::CommandFailed { message, .. }) if message.contains("Cannot find device") => {
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}
