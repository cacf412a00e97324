//! IPv6 value types for the mesh address core.
//!
//! This crate provides type-safe representations of the network primitives
//! the address core works with:
//!
//! - [`Ipv6Address`]: 128-bit IPv6 addresses with classification helpers
//! - [`Ipv6Prefix`]: IPv6 network prefixes (CIDR notation)
//! - [`Scope`]: RFC 4291 address scopes
//! - [`bits`]: bit-exact helpers used for solicited-node and IID derivation

pub mod bits;
mod ip;
mod scope;

pub use ip::{Ipv6Address, Ipv6Prefix};
pub use scope::Scope;

/// Common error type for parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid IPv6 address format: {0}")]
    InvalidIpAddress(String),

    #[error("invalid IPv6 prefix format: {0}")]
    InvalidIpPrefix(String),

    #[error("invalid prefix length: {0} (must be 0-128)")]
    InvalidPrefixLength(u8),
}
