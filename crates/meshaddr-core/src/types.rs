//! Identifier and value types shared across the address core.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Numeric identifier of a network interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InterfaceId(pub u32);

impl fmt::Display for InterfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable handle of an address record.
///
/// Handles are allocated from a per-interface counter and never reused, so
/// a handle held across a deletion simply stops resolving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AddressHandle(pub(crate) u64);

impl fmt::Display for AddressHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Index of an owner registered with the subsystem's dispatch table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OwnerId(pub(crate) usize);

/// Protocol that created an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressSource {
    #[default]
    Unknown,
    Slaac,
    Dhcp,
    Manual,
    Thread,
}

impl fmt::Display for AddressSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AddressSource::Unknown => "unknown",
            AddressSource::Slaac => "slaac",
            AddressSource::Dhcp => "dhcp",
            AddressSource::Manual => "manual",
            AddressSource::Thread => "thread",
        };
        f.write_str(name)
    }
}

/// Raw value used on the wire and in configuration for an infinite lifetime.
pub const INFINITE_LIFETIME: u32 = u32::MAX;

/// An address lifetime in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifetime {
    Finite(u32),
    Infinite,
}

impl Lifetime {
    /// Maps a raw seconds value, treating [`INFINITE_LIFETIME`] as infinite.
    pub const fn from_secs(secs: u32) -> Self {
        if secs == INFINITE_LIFETIME {
            Lifetime::Infinite
        } else {
            Lifetime::Finite(secs)
        }
    }

    pub const fn as_secs(&self) -> u32 {
        match self {
            Lifetime::Finite(secs) => *secs,
            Lifetime::Infinite => INFINITE_LIFETIME,
        }
    }

    pub const fn is_zero(&self) -> bool {
        matches!(self, Lifetime::Finite(0))
    }

    /// Returns the smaller of the two lifetimes.
    pub fn min(self, other: Lifetime) -> Lifetime {
        match (self, other) {
            (Lifetime::Infinite, x) | (x, Lifetime::Infinite) => x,
            (Lifetime::Finite(a), Lifetime::Finite(b)) => Lifetime::Finite(a.min(b)),
        }
    }
}

impl From<u32> for Lifetime {
    fn from(secs: u32) -> Self {
        Lifetime::from_secs(secs)
    }
}

impl fmt::Display for Lifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lifetime::Finite(secs) => write!(f, "{}s", secs),
            Lifetime::Infinite => f.write_str("infinite"),
        }
    }
}

/// Caller preference between temporary and public addresses (RFC 6724 rule 7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemporaryPreference {
    #[default]
    Temporary,
    Public,
}

/// Caller preference for addresses whose IID embeds a 6LoWPAN short address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LowpanPreference {
    #[default]
    Short,
    Long,
}

/// Preference flags consulted by source address selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SourcePreferences {
    #[serde(default)]
    pub temporary: TemporaryPreference,
    #[serde(default)]
    pub lowpan: LowpanPreference,
}

impl SourcePreferences {
    pub const fn new(temporary: TemporaryPreference, lowpan: LowpanPreference) -> Self {
        Self { temporary, lowpan }
    }
}
