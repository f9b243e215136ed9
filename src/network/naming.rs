//! Host-side interface name generation

use crate::error::{Error, Result};
use crate::network::link::{LinkManager, MAX_IFNAME_LEN};
use rand::Rng;

/// Default host-side prefix for generated macvlan names
pub const DEFAULT_PREFIX: &str = "macvlan";

/// Number of random characters appended to the prefix
pub const SUFFIX_LEN: usize = 7;

/// Candidates tried before giving up
const MAX_ATTEMPTS: usize = 3;

const HEX: &[u8] = b"0123456789abcdef";

/// Build a random candidate name: prefix followed by hex characters
pub fn random_name<R: Rng + ?Sized>(rng: &mut R, prefix: &str, suffix_len: usize) -> String {
    let mut name = String::with_capacity(prefix.len() + suffix_len);
    name.push_str(prefix);
    for _ in 0..suffix_len {
        name.push(HEX[rng.random_range(0..HEX.len())] as char);
    }
    name
}

/// Generate an interface name that is free on the host
///
/// `taken` reports names the caller already has assigned (e.g., recorded on
/// other endpoints but not yet created or currently moved into a sandbox).
pub fn generate_interface_name(
    links: &dyn LinkManager,
    prefix: &str,
    taken: impl Fn(&str) -> bool,
) -> Result<String> {
    generate_with_rng(&mut rand::rng(), links, prefix, taken)
}

pub fn generate_with_rng<R: Rng + ?Sized>(
    rng: &mut R,
    links: &dyn LinkManager,
    prefix: &str,
    taken: impl Fn(&str) -> bool,
) -> Result<String> {
    if prefix.len() + SUFFIX_LEN > MAX_IFNAME_LEN {
        return Err(Error::Link(format!(
            "Interface prefix '{}' leaves no room for a unique suffix",
            prefix
        )));
    }

    for _ in 0..MAX_ATTEMPTS {
        let candidate = random_name(rng, prefix, SUFFIX_LEN);
        if taken(&candidate) {
            continue;
        }
        if !links.link_exists(&candidate)? {
            return Ok(candidate);
        }
    }

    Err(Error::Link(
        "Could not generate a unique interface name".to_string(),
    ))
}
