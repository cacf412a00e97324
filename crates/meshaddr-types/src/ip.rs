//! IPv6 address and prefix types with safe parsing.

use crate::bits;
use crate::scope::Scope;
use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv6Addr;
use std::str::FromStr;

/// Interface identifier pattern of a 6LoWPAN short-address derived IID
/// (`0000:00ff:fe00:XXXX`), bytes 8..14.
const LOWPAN_SHORT_IID_PATTERN: [u8; 6] = [0x00, 0x00, 0x00, 0xff, 0xfe, 0x00];

/// An IPv6 address wrapper with mesh-stack classification utilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ipv6Address(Ipv6Addr);

impl Ipv6Address {
    pub const UNSPECIFIED: Self = Ipv6Address(Ipv6Addr::UNSPECIFIED);
    pub const LOCALHOST: Self = Ipv6Address(Ipv6Addr::LOCALHOST);
    /// ff01::1
    pub const ALL_NODES_INTERFACE_LOCAL: Self = Ipv6Address::new(0xff01, 0, 0, 0, 0, 0, 0, 1);
    /// ff02::1
    pub const ALL_NODES_LINK_LOCAL: Self = Ipv6Address::new(0xff02, 0, 0, 0, 0, 0, 0, 1);

    #[allow(clippy::too_many_arguments)]
    pub const fn new(a: u16, b: u16, c: u16, d: u16, e: u16, f: u16, g: u16, h: u16) -> Self {
        Ipv6Address(Ipv6Addr::new(a, b, c, d, e, f, g, h))
    }

    pub fn from_octets(octets: [u8; 16]) -> Self {
        Ipv6Address(Ipv6Addr::from(octets))
    }

    pub const fn inner(&self) -> Ipv6Addr {
        self.0
    }

    pub const fn octets(&self) -> [u8; 16] {
        self.0.octets()
    }

    pub const fn segments(&self) -> [u16; 8] {
        self.0.segments()
    }

    pub fn is_unspecified(&self) -> bool {
        self.0.is_unspecified()
    }

    pub fn is_loopback(&self) -> bool {
        self.0.is_loopback()
    }

    /// Returns true if this is a multicast address (ff00::/8).
    pub fn is_multicast(&self) -> bool {
        self.octets()[0] == 0xff
    }

    /// Returns true if this is a link-local address (fe80::/10).
    pub fn is_link_local(&self) -> bool {
        let segments = self.segments();
        (segments[0] & 0xffc0) == 0xfe80
    }

    /// Returns true if this is a deprecated site-local address (fec0::/10).
    pub fn is_site_local(&self) -> bool {
        let segments = self.segments();
        (segments[0] & 0xffc0) == 0xfec0
    }

    /// Returns true if this is a unique local address (fc00::/7).
    pub fn is_unique_local(&self) -> bool {
        (self.segments()[0] & 0xfe00) == 0xfc00
    }

    /// Returns true if this is an IPv4-mapped address (::ffff:0:0/96).
    pub fn is_ipv4_mapped(&self) -> bool {
        let o = self.octets();
        o[..10] == [0u8; 10] && o[10] == 0xff && o[11] == 0xff
    }

    /// Returns true if the interface identifier has the 6LoWPAN
    /// short-address form `0000:00ff:fe00:XXXX`.
    pub fn is_lowpan_short(&self) -> bool {
        self.octets()[8..14] == LOWPAN_SHORT_IID_PATTERN
    }

    /// Returns the scope carried in a multicast address, or `None` for
    /// unicast addresses.
    pub fn multicast_scope(&self) -> Option<Scope> {
        let o = self.octets();
        if o[0] == 0xff {
            Some(Scope::from_nibble(o[1]))
        } else {
            None
        }
    }

    /// Returns the scope of this address.
    ///
    /// Multicast addresses report the scope field. For unicast, loopback and
    /// link-local addresses are link scope, site-local addresses are site
    /// scope and IPv4-mapped addresses are classified by the embedded IPv4
    /// address (RFC 6724 section 3.2). Everything else is global.
    pub fn scope(&self) -> Scope {
        if let Some(scope) = self.multicast_scope() {
            return scope;
        }
        if self.is_link_local() || self.is_loopback() {
            return Scope::LINK_LOCAL;
        }
        if self.is_site_local() {
            return Scope::SITE_LOCAL;
        }
        if self.is_ipv4_mapped() {
            let o = self.octets();
            // 169.254/16 and 127/8 are link-local in scope
            if (o[12] == 169 && o[13] == 254) || o[12] == 127 {
                return Scope::LINK_LOCAL;
            }
        }
        Scope::GLOBAL
    }

    /// Returns the solicited-node multicast group `ff02::1:ffXX:XXXX`
    /// formed from the low 24 bits of this address.
    pub fn solicited_node(&self) -> Ipv6Address {
        let mut group = Ipv6Address::new(0xff02, 0, 0, 0, 0, 1, 0xff00, 0).octets();
        bits::copy_low_bits(&mut group, &self.octets(), 24);
        Ipv6Address::from_octets(group)
    }

    /// Length of the common leading bit sequence shared with `other`.
    pub fn common_prefix_len(&self, other: &Ipv6Address) -> u8 {
        bits::common_prefix_len(&self.octets(), &other.octets())
    }

    /// Returns true if the first `len` bits match `prefix`.
    pub fn matches_prefix(&self, prefix: &Ipv6Address, len: u8) -> bool {
        bits::bits_equal(&self.octets(), &prefix.octets(), len)
    }

    /// Returns the 64-bit interface identifier (low half of the address).
    pub fn interface_id(&self) -> [u8; 8] {
        let o = self.octets();
        let mut iid = [0u8; 8];
        iid.copy_from_slice(&o[8..]);
        iid
    }

    /// Returns a copy with the low 64 bits replaced by `iid`.
    pub fn with_interface_id(&self, iid: [u8; 8]) -> Ipv6Address {
        let mut o = self.octets();
        o[8..].copy_from_slice(&iid);
        Ipv6Address::from_octets(o)
    }
}

impl fmt::Display for Ipv6Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for Ipv6Address {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<Ipv6Addr>()
            .map(Ipv6Address)
            .map_err(|_| ParseError::InvalidIpAddress(s.to_string()))
    }
}

impl From<Ipv6Addr> for Ipv6Address {
    fn from(addr: Ipv6Addr) -> Self {
        Ipv6Address(addr)
    }
}

impl From<Ipv6Address> for Ipv6Addr {
    fn from(addr: Ipv6Address) -> Self {
        addr.0
    }
}

impl From<[u8; 16]> for Ipv6Address {
    fn from(octets: [u8; 16]) -> Self {
        Ipv6Address::from_octets(octets)
    }
}

/// An IPv6 prefix (network address and prefix length).
///
/// Bits beyond the prefix length are cleared on construction, so two
/// prefixes covering the same network always compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ipv6Prefix {
    address: Ipv6Address,
    prefix_len: u8,
}

impl Ipv6Prefix {
    /// Creates a new IPv6 prefix.
    ///
    /// # Errors
    ///
    /// Returns an error if the prefix length exceeds 128.
    pub fn new(address: Ipv6Address, prefix_len: u8) -> Result<Self, ParseError> {
        if prefix_len > 128 {
            return Err(ParseError::InvalidPrefixLength(prefix_len));
        }

        Ok(Ipv6Prefix {
            address: Ipv6Address::from_octets(bits::mask_prefix(&address.octets(), prefix_len)),
            prefix_len,
        })
    }

    /// The default route `::/0`.
    pub const fn default_route() -> Self {
        Ipv6Prefix {
            address: Ipv6Address::UNSPECIFIED,
            prefix_len: 0,
        }
    }

    /// Returns the network address of this prefix.
    pub const fn address(&self) -> &Ipv6Address {
        &self.address
    }

    /// Returns the prefix length in bits.
    pub const fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    /// Returns true if `addr` falls inside this prefix.
    pub fn contains(&self, addr: &Ipv6Address) -> bool {
        addr.matches_prefix(&self.address, self.prefix_len)
    }

    /// Returns true if this is the default route `::/0`.
    pub const fn is_default(&self) -> bool {
        self.prefix_len == 0
    }
}

impl fmt::Display for Ipv6Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.prefix_len)
    }
}

impl FromStr for Ipv6Prefix {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr_str, len_str) = s
            .rsplit_once('/')
            .ok_or_else(|| ParseError::InvalidIpPrefix(s.to_string()))?;

        let address: Ipv6Address = addr_str.parse()?;
        let prefix_len: u8 = len_str
            .parse()
            .map_err(|_| ParseError::InvalidIpPrefix(s.to_string()))?;

        Ipv6Prefix::new(address, prefix_len)
    }
}

impl Serialize for Ipv6Prefix {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Ipv6Prefix {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
