//! Call-outs to the collaborators surrounding the address core.
//!
//! The multicast listener protocol (MLD) is told when a real group
//! membership starts and ends. The neighbor discovery layer transmits one
//! Neighbor Solicitation per DAD probe.

use crate::group::GroupRecord;
use crate::types::InterfaceId;
use meshaddr_types::Ipv6Address;

/// Multicast listener protocol hook.
pub trait MulticastListener {
    /// First reference to a non-implicit group was taken.
    ///
    /// The listener may update the record's report housekeeping fields.
    fn start_listening(&mut self, interface: InterfaceId, group: &mut GroupRecord);

    /// Last reference to a group was dropped; the record is about to go.
    fn stop_listening(&mut self, interface: InterfaceId, group: &GroupRecord);
}

/// Neighbor Solicitation transmitter used by DAD.
pub trait DadProber {
    /// Sends one DAD probe for `target` from the unspecified address to its
    /// solicited-node group.
    fn send_probe(&mut self, interface: InterfaceId, target: &Ipv6Address);
}

/// Hooks installed on one interface.
pub struct InterfaceHooks {
    pub listener: Box<dyn MulticastListener>,
    pub prober: Box<dyn DadProber>,
}

impl InterfaceHooks {
    pub fn new(listener: Box<dyn MulticastListener>, prober: Box<dyn DadProber>) -> Self {
        Self { listener, prober }
    }

    /// Hooks that do nothing, for interfaces without MLD or ND.
    pub fn noop() -> Self {
        Self::new(Box::new(Noop), Box::new(Noop))
    }
}

struct Noop;

impl MulticastListener for Noop {
    fn start_listening(&mut self, _interface: InterfaceId, _group: &mut GroupRecord) {}

    fn stop_listening(&mut self, _interface: InterfaceId, _group: &GroupRecord) {}
}

impl DadProber for Noop {
    fn send_probe(&mut self, _interface: InterfaceId, _target: &Ipv6Address) {}
}
