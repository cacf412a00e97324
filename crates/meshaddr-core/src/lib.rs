//! IPv6 address management core for 6LoWPAN mesh stacks.
//!
//! Owns the lifecycle of every unicast address and multicast group bound to
//! an interface and picks source addresses for outgoing packets:
//!
//! - [`interface`]: address lifecycle and duplicate address detection (RFC 4862)
//! - [`group`]: reference-counted multicast membership
//! - [`policy`]: RFC 6724 policy table
//! - [`select`]: RFC 6724 source address selection
//! - [`opaque_iid`]: RFC 7217 interface identifiers
//! - [`notify`]: lifecycle notifications to observers and owners
//!
//! Everything is driven by two periodic ticks on [`AddressSubsystem`]:
//! a fast tick (about 100 ms) for DAD progression and a slow tick (1 s)
//! for lifetime countdown.

pub mod address;
pub mod config;
pub mod error;
pub mod group;
pub mod hooks;
pub mod interface;
pub mod notify;
pub mod opaque_iid;
pub mod policy;
pub mod select;
pub mod subsystem;
pub mod types;

pub use address::{AddressRecord, AddressState, NewAddress};
pub use config::{InterfaceConfig, StaticAddressConfig, SubsystemConfig, ZoneConfig};
pub use error::{AddrError, Result};
pub use group::{GroupJoinResult, GroupLeaveResult, GroupRecord};
pub use hooks::{DadProber, InterfaceHooks, MulticastListener};
pub use interface::{GroupRequest, Interface};
pub use notify::{AddressEvent, AddressNotification, AddressObserver};
pub use opaque_iid::OpaqueIidGenerator;
pub use policy::{PolicyEntry, PolicyTable};
pub use subsystem::AddressSubsystem;
pub use types::{
    AddressHandle, AddressSource, InterfaceId, Lifetime, LowpanPreference, OwnerId,
    SourcePreferences, TemporaryPreference, INFINITE_LIFETIME,
};

pub use meshaddr_types::{Ipv6Address, Ipv6Prefix, Scope};
