//! Error types for address core operations.
//!
//! Conditions the address core treats as silent no-ops (deleting an unknown
//! address, leaving a group that was never joined) are reported through
//! `bool`/`Option` returns and never surface here.

use crate::types::InterfaceId;
use meshaddr_types::{Ipv6Address, Ipv6Prefix, ParseError};
use thiserror::Error;

/// Result type alias for address core operations.
pub type Result<T> = std::result::Result<T, AddrError>;

/// Errors that can occur during address core operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddrError {
    /// No interface is registered under the given id.
    #[error("Interface {0} not found")]
    InterfaceNotFound(InterfaceId),

    /// An interface with the same id is already registered.
    #[error("Interface {0} already exists")]
    InterfaceExists(InterfaceId),

    /// The address is already present on the interface.
    #[error("Address {address} already exists on interface {interface}")]
    AddressExists {
        interface: InterfaceId,
        address: Ipv6Address,
    },

    #[error("Invalid prefix length: {0} (must be 0-128)")]
    InvalidPrefixLength(u8),

    /// A group operation was given a unicast address.
    #[error("{0} is not a multicast address")]
    NotMulticast(Ipv6Address),

    /// An address operation was given a multicast or unspecified address.
    #[error("{0} is not a unicast address")]
    NotUnicast(Ipv6Address),

    #[error("Policy entry for {prefix} already exists")]
    PolicyExists { prefix: Ipv6Prefix },

    #[error("Policy entry for {prefix} not found")]
    PolicyNotFound { prefix: Ipv6Prefix },

    /// The `::/0` policy entry cannot be removed.
    #[error("The default policy entry ::/0 cannot be removed")]
    DefaultPolicyRequired,

    /// Opaque IID generation needs a secret key and none is configured.
    #[error("Opaque IID secret key is not set")]
    OpaqueKeyUnset,

    /// Configuration validation error.
    #[error("Invalid configuration for {field}: {message}")]
    InvalidConfig { field: String, message: String },

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),
}

impl AddrError {
    /// Creates an invalid configuration error.
    pub fn invalid_config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            message: message.into(),
        }
    }
}
