//! IPv6 address scopes (RFC 4291 section 2.7, RFC 7346).

use serde::{Deserialize, Serialize};
use std::fmt;

/// An IPv6 scope value.
///
/// Scopes are ordered numerically: a larger value is a wider scope. Only the
/// well-known values have constants; multicast addresses may carry any 4-bit
/// value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Scope(u8);

impl Scope {
    pub const INTERFACE_LOCAL: Self = Scope(0x1);
    pub const LINK_LOCAL: Self = Scope(0x2);
    pub const REALM_LOCAL: Self = Scope(0x3);
    pub const ADMIN_LOCAL: Self = Scope(0x4);
    pub const SITE_LOCAL: Self = Scope(0x5);
    pub const ORGANIZATION_LOCAL: Self = Scope(0x8);
    pub const GLOBAL: Self = Scope(0xe);

    /// Creates a scope from its 4-bit value. Higher bits are discarded.
    pub const fn from_nibble(value: u8) -> Self {
        Scope(value & 0x0f)
    }

    pub const fn value(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Scope::INTERFACE_LOCAL => f.write_str("interface-local"),
            Scope::LINK_LOCAL => f.write_str("link-local"),
            Scope::REALM_LOCAL => f.write_str("realm-local"),
            Scope::ADMIN_LOCAL => f.write_str("admin-local"),
            Scope::SITE_LOCAL => f.write_str("site-local"),
            Scope::ORGANIZATION_LOCAL => f.write_str("organization-local"),
            Scope::GLOBAL => f.write_str("global"),
            Scope(other) => write!(f, "scope-{:x}", other),
        }
    }
}
