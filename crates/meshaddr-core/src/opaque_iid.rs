//! RFC 7217 semantically opaque interface identifiers.
//!
//! `IID = first 64 bits of SHA-256(prefix[0..8] | identity | dad_counter | key)`

use crate::error::{AddrError, Result};
use meshaddr_types::Ipv6Address;
use sha2::{Digest, Sha256};
use std::fmt;
use tracing::{debug, warn};

/// Identity of the interface mixed into the hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterfaceIdentity<'a> {
    Name(&'a str),
    Index(u32),
}

impl InterfaceIdentity<'_> {
    fn feed(&self, hasher: &mut Sha256) {
        match self {
            InterfaceIdentity::Name(name) => hasher.update(name.as_bytes()),
            InterfaceIdentity::Index(id) => hasher.update(id.to_be_bytes()),
        }
    }
}

/// Returns true for IIDs reserved by RFC 5453.
pub fn is_reserved_iid(iid: &[u8; 8]) -> bool {
    // Subnet-Router anycast
    if *iid == [0u8; 8] {
        return true;
    }
    // IANA Ethernet block 0200:5eff:fe00:0000-0200:5eff:feff:ffff
    if iid[..5] == [0x02, 0x00, 0x5e, 0xff, 0xfe] {
        return true;
    }
    // Reserved subnet anycast fdff:ffff:ffff:ff80-fdff:ffff:ffff:ffff
    iid[..7] == [0xfd, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff] && iid[7] >= 0x80
}

/// Keyed generator state.
#[derive(Clone, Default)]
pub struct OpaqueIidGenerator {
    secret_key: Option<Vec<u8>>,
    initial_iid: Option<[u8; 8]>,
}

impl fmt::Debug for OpaqueIidGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpaqueIidGenerator")
            .field("key_set", &self.key_is_set())
            .field("initial_iid", &self.initial_iid)
            .finish()
    }
}

impl OpaqueIidGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets or clears the secret key. An empty key clears it.
    pub fn set_key(&mut self, key: Option<&[u8]>) {
        self.secret_key = key.filter(|k| !k.is_empty()).map(<[u8]>::to_vec);
        debug!(key_set = self.secret_key.is_some(), "Opaque IID key updated");
    }

    /// Sets or clears the fixed IID used before any DAD failure.
    pub fn set_initial_iid(&mut self, iid: Option<[u8; 8]>) {
        self.initial_iid = iid;
    }

    pub fn key_is_set(&self) -> bool {
        self.secret_key.is_some()
    }

    fn hash(&self, prefix: &Ipv6Address, identity: InterfaceIdentity<'_>, counter: u8) -> Result<[u8; 8]> {
        let key = self.secret_key.as_deref().ok_or(AddrError::OpaqueKeyUnset)?;

        let mut hasher = Sha256::new();
        hasher.update(&prefix.octets()[..8]);
        identity.feed(&mut hasher);
        hasher.update([counter]);
        hasher.update(key);
        let digest = hasher.finalize();

        let mut iid = [0u8; 8];
        iid.copy_from_slice(&digest[..8]);
        Ok(iid)
    }

    /// Returns `prefix` with its low 64 bits replaced by an opaque IID.
    ///
    /// `dad_failures` is the interface's DAD failure counter; it is bumped
    /// once for every reserved identifier that had to be skipped.
    pub fn generate(
        &self,
        prefix: &Ipv6Address,
        identity: InterfaceIdentity<'_>,
        dad_failures: &mut u8,
    ) -> Result<Ipv6Address> {
        for _ in 0..=u8::MAX {
            let iid = match self.initial_iid {
                Some(iid) if *dad_failures == 0 => iid,
                _ => self.hash(prefix, identity, *dad_failures)?,
            };

            if !is_reserved_iid(&iid) {
                return Ok(prefix.with_interface_id(iid));
            }

            warn!(
                prefix = %prefix,
                dad_failures = *dad_failures,
                "Generated opaque IID is reserved, retrying"
            );
            *dad_failures = dad_failures.wrapping_add(1);
        }

        Err(AddrError::invalid_config(
            "opaque_secret_key",
            "every candidate interface identifier is reserved",
        ))
    }
}
