//! Per-interface address lifecycle and DAD state machine.
//!
//! ```text
//! add ──► TENTATIVE(0) ──timer──► join solicited-node ──► probe ──► ... ──► ASSIGNED
//!   └──(skip_dad / dad_transmits = 0)──────────────────────────────────────┘
//! ASSIGNED ──preferred = 0──► DEPRECATED ──valid = 0──► INVALIDATED ──► removed
//! ```
//!
//! Mutators raise notifications into a pending queue instead of calling
//! out directly. The queue also carries deferred removals, so a record
//! reported as `DadFailed` or `Invalidated` is still present while that
//! notification is delivered and is removed right after.

use crate::address::{AddressRecord, AddressTable, NewAddress};
use crate::config::InterfaceConfig;
use crate::error::{AddrError, Result};
use crate::group::{is_implicit_group, GroupJoinResult, GroupLeaveResult, GroupRecord, GroupTable};
use crate::hooks::InterfaceHooks;
use crate::notify::{AddressEvent, AddressNotification};
use crate::opaque_iid::{InterfaceIdentity, OpaqueIidGenerator};
use crate::types::{AddressHandle, AddressSource, InterfaceId, Lifetime, OwnerId};
use meshaddr_types::{Ipv6Address, Scope};
use rand::Rng;
use std::collections::VecDeque;
use std::fmt;
use tracing::{debug, info, warn};

/// Valid lifetime cap applied by [`Interface::deprecate`] (RFC 4862 5.5.3).
pub const DEPRECATE_VALID_LIFETIME_CAP: u32 = 7200;

/// Group change asked for by a notification handler.
///
/// Handlers only see their own interface, so membership changes are queued
/// and carried out by the subsystem, with zone checks, once delivery is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupRequest {
    Join(Ipv6Address),
    Leave(Ipv6Address),
}

#[derive(Debug)]
enum Pending {
    Notify(AddressNotification),
    Remove(AddressHandle),
}

/// One network interface: its addresses, groups and DAD parameters.
pub struct Interface {
    config: InterfaceConfig,
    addresses: AddressTable,
    groups: GroupTable,
    dad_failures: u8,
    retrans_ticks: u16,
    hooks: InterfaceHooks,
    pending: VecDeque<Pending>,
    group_requests: Vec<GroupRequest>,
}

impl fmt::Debug for Interface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interface")
            .field("id", &self.config.id)
            .field("addresses", &self.addresses)
            .field("groups", &self.groups)
            .field("dad_failures", &self.dad_failures)
            .field("retrans_ticks", &self.retrans_ticks)
            .finish()
    }
}

impl Interface {
    /// Creates an interface ticked every `fast_tick_ms` milliseconds.
    pub fn new(config: InterfaceConfig, hooks: InterfaceHooks, fast_tick_ms: u64) -> Self {
        let retrans_ticks = config.retrans_ticks(fast_tick_ms);
        Self {
            config,
            addresses: AddressTable::new(),
            groups: GroupTable::new(),
            dad_failures: 0,
            retrans_ticks,
            hooks,
            pending: VecDeque::new(),
            group_requests: Vec::new(),
        }
    }

    pub fn id(&self) -> InterfaceId {
        self.config.id
    }

    pub fn config(&self) -> &InterfaceConfig {
        &self.config
    }

    /// Interface-wide count of DAD failures (wraps).
    pub fn dad_failures(&self) -> u8 {
        self.dad_failures
    }

    pub fn addresses(&self) -> &AddressTable {
        &self.addresses
    }

    pub fn groups(&self) -> &GroupTable {
        &self.groups
    }

    pub fn get_entry(&self, address: &Ipv6Address) -> Option<&AddressRecord> {
        self.addresses.find(address)
    }

    pub fn get_group_entry(&self, group: &Ipv6Address) -> Option<&GroupRecord> {
        self.groups.get(group)
    }

    /// First link-local address, skipping tentative ones unless allowed.
    pub fn link_local_address(&self, allow_tentative: bool) -> Option<Ipv6Address> {
        self.addresses
            .iter()
            .find(|r| r.address.is_link_local() && (allow_tentative || !r.tentative))
            .map(|r| r.address)
    }

    fn identity(&self) -> InterfaceIdentity<'_> {
        match &self.config.name {
            Some(name) => InterfaceIdentity::Name(name),
            None => InterfaceIdentity::Index(self.config.id.0),
        }
    }

    /// Fills the low 64 bits of `prefix` with an opaque identifier.
    pub fn generate_opaque_iid(
        &mut self,
        generator: &OpaqueIidGenerator,
        prefix: &Ipv6Address,
    ) -> Result<Ipv6Address> {
        let mut failures = self.dad_failures;
        let result = generator.generate(prefix, self.identity(), &mut failures);
        self.dad_failures = failures;
        result
    }

    fn notify(&mut self, handle: AddressHandle, event: AddressEvent) {
        if let Some(record) = self.addresses.get(handle) {
            self.pending.push_back(Pending::Notify(AddressNotification {
                interface: self.config.id,
                event,
                record: record.clone(),
            }));
        }
    }

    /// Adds an address.
    ///
    /// With `skip_dad`, or when the interface sends no DAD probes, the
    /// record is assigned immediately and `DadComplete` is raised.
    /// Otherwise it starts tentative with a random initial delay.
    pub fn add(&mut self, new: NewAddress) -> Result<AddressHandle> {
        if new.prefix_len > 128 {
            return Err(AddrError::InvalidPrefixLength(new.prefix_len));
        }
        if new.address.is_multicast() || new.address.is_unspecified() {
            return Err(AddrError::NotUnicast(new.address));
        }
        if self.addresses.find(&new.address).is_some() {
            debug!(interface = %self.config.id, address = %new.address, "Address already exists");
            return Err(AddrError::AddressExists {
                interface: self.config.id,
                address: new.address,
            });
        }

        let handle = self.addresses.allocate_handle();
        let immediate = new.skip_dad || self.config.dad_transmits == 0;
        let state_timer = if immediate {
            0
        } else {
            let min = self.config.dad_delay_min_ticks;
            let max = self.config.dad_delay_max_ticks.max(min);
            rand::thread_rng().gen_range(min..=max).max(1)
        };

        self.addresses.push(AddressRecord {
            handle,
            address: new.address,
            prefix_len: new.prefix_len,
            source: new.source,
            valid_lifetime: new.valid_lifetime,
            preferred_lifetime: new.preferred_lifetime,
            tentative: !immediate,
            probe_count: 0,
            group_added: false,
            temporary: new.temporary,
            state_timer,
            owner: new.owner,
        });

        if immediate {
            self.join_solicited(handle);
            info!(interface = %self.config.id, address = %new.address, source = %new.source, "Address assigned without DAD");
            self.notify(handle, AddressEvent::DadComplete);
        } else {
            debug!(
                interface = %self.config.id,
                address = %new.address,
                delay_ticks = state_timer,
                "Address added as tentative"
            );
        }
        Ok(handle)
    }

    /// Removes a record immediately, leaving its solicited-node group.
    pub fn delete(&mut self, address: &Ipv6Address) -> bool {
        match self.addresses.handle_of(address) {
            Some(handle) => {
                self.remove_record(handle);
                true
            }
            None => {
                debug!(interface = %self.config.id, address = %address, "Delete of unknown address ignored");
                false
            }
        }
    }

    /// Removes every record inside `prefix/prefix_len`, optionally only
    /// those from `source`. Returns the number removed.
    pub fn delete_matching(
        &mut self,
        prefix: &Ipv6Address,
        prefix_len: u8,
        source: Option<AddressSource>,
    ) -> usize {
        let victims: Vec<AddressHandle> = self
            .addresses
            .iter()
            .filter(|r| r.address.matches_prefix(prefix, prefix_len))
            .filter(|r| source.map_or(true, |s| r.source == s))
            .map(|r| r.handle)
            .collect();
        for handle in &victims {
            self.remove_record(*handle);
        }
        victims.len()
    }

    fn remove_record(&mut self, handle: AddressHandle) {
        let Some(record) = self.addresses.remove(handle) else {
            return;
        };
        if record.group_added {
            self.leave_group(&record.address.solicited_node());
        }
        info!(interface = %self.config.id, address = %record.address, "Address removed");
        self.pending.push_back(Pending::Notify(AddressNotification {
            interface: self.config.id,
            event: AddressEvent::Deleted,
            record,
        }));
    }

    /// Deprecates an address and caps its valid lifetime.
    pub fn deprecate(&mut self, address: &Ipv6Address) -> bool {
        let cap = Lifetime::Finite(DEPRECATE_VALID_LIFETIME_CAP);
        let Some(handle) = self.addresses.handle_of(address) else {
            debug!(interface = %self.config.id, address = %address, "Deprecate of unknown address ignored");
            return false;
        };
        // the Deprecated snapshot must carry the capped lifetime
        if let Some(record) = self.addresses.get_mut(handle) {
            record.valid_lifetime = record.valid_lifetime.min(cap);
        }
        self.set_preferred(handle, Lifetime::Finite(0));
        true
    }

    pub fn set_valid_lifetime(&mut self, address: &Ipv6Address, lifetime: Lifetime) -> bool {
        let Some(handle) = self.addresses.handle_of(address) else {
            return false;
        };
        if let Some(record) = self.addresses.get_mut(handle) {
            record.valid_lifetime = lifetime;
        }
        true
    }

    /// Setting zero on a preferred address raises `Deprecated`.
    pub fn set_preferred_lifetime(&mut self, address: &Ipv6Address, lifetime: Lifetime) -> bool {
        match self.addresses.handle_of(address) {
            Some(handle) => {
                self.set_preferred(handle, lifetime);
                true
            }
            None => false,
        }
    }

    fn set_preferred(&mut self, handle: AddressHandle, lifetime: Lifetime) {
        let Some(record) = self.addresses.get_mut(handle) else {
            return;
        };
        let was_deprecated = record.is_deprecated();
        record.preferred_lifetime = lifetime;
        if !was_deprecated && lifetime.is_zero() {
            info!(interface = %self.config.id, address = %record.address, "Address deprecated");
            self.notify(handle, AddressEvent::Deprecated);
        }
    }

    /// Deprecates every record from `source`. Returns the number changed.
    pub fn set_non_preferred(&mut self, source: AddressSource) -> usize {
        let targets: Vec<AddressHandle> = self
            .addresses
            .iter()
            .filter(|r| r.source == source && !r.is_deprecated())
            .map(|r| r.handle)
            .collect();
        for handle in &targets {
            self.set_preferred(*handle, Lifetime::Finite(0));
        }
        targets.len()
    }

    pub fn set_temporary(&mut self, address: &Ipv6Address, temporary: bool) -> bool {
        let Some(handle) = self.addresses.handle_of(address) else {
            return false;
        };
        if let Some(record) = self.addresses.get_mut(handle) {
            record.temporary = temporary;
        }
        true
    }

    /// Binds the record to an owner, or unbinds it with `None`.
    pub fn set_owner(&mut self, address: &Ipv6Address, owner: Option<OwnerId>) -> bool {
        let Some(handle) = self.addresses.handle_of(address) else {
            return false;
        };
        if let Some(record) = self.addresses.get_mut(handle) {
            record.owner = owner;
        }
        true
    }

    /// Arms the state timer of an assigned record; `Timer` is raised when
    /// it expires. Tentative records are refused.
    pub fn set_timer(&mut self, address: &Ipv6Address, ticks: u16) -> bool {
        let Some(handle) = self.addresses.handle_of(address) else {
            return false;
        };
        match self.addresses.get_mut(handle) {
            Some(record) if !record.tentative => {
                record.state_timer = ticks;
                true
            }
            _ => false,
        }
    }

    /// Reports an address conflict seen on the link.
    ///
    /// Bumps the DAD failure counter and raises `DadFailed`; the record is
    /// removed once that notification has been delivered.
    pub fn duplicate_detected(&mut self, address: &Ipv6Address) -> bool {
        let Some(handle) = self.addresses.handle_of(address) else {
            debug!(interface = %self.config.id, address = %address, "Duplicate report for unknown address ignored");
            return false;
        };
        self.dad_failures = self.dad_failures.wrapping_add(1);
        warn!(
            interface = %self.config.id,
            address = %address,
            dad_failures = self.dad_failures,
            "Duplicate address detected"
        );
        self.notify(handle, AddressEvent::DadFailed);
        self.pending.push_back(Pending::Remove(handle));
        true
    }

    /// Joins `group`, invoking "start listening" only if `listen` is set.
    pub(crate) fn join_group_with(&mut self, group: Ipv6Address, listen: bool) -> Result<GroupJoinResult> {
        if !group.is_multicast() {
            return Err(AddrError::NotMulticast(group));
        }
        if is_implicit_group(&group) {
            return Ok(GroupJoinResult::Implicit);
        }
        if let Some(record) = self.groups.get_mut(&group) {
            let count = record.acquire();
            debug!(interface = %self.config.id, group = %group, ref_count = count, "Group reference added");
            return Ok(GroupJoinResult::AlreadyMember);
        }

        let mut record = GroupRecord::new(group);
        if listen {
            self.hooks.listener.start_listening(self.config.id, &mut record);
            record.listening = true;
            info!(interface = %self.config.id, group = %group, "Joined multicast group");
        } else {
            debug!(interface = %self.config.id, group = %group, "Group joined, zone already listening");
        }
        self.groups.insert(record);
        Ok(GroupJoinResult::Joined)
    }

    /// Joins `group` on this interface alone, without zone checks.
    pub(crate) fn join_group(&mut self, group: Ipv6Address) -> Result<GroupJoinResult> {
        self.join_group_with(group, true)
    }

    /// Drops one reference to `group`, without zone takeover.
    pub(crate) fn leave_group(&mut self, group: &Ipv6Address) -> GroupLeaveResult {
        if is_implicit_group(group) {
            return GroupLeaveResult::Implicit;
        }
        let Some(record) = self.groups.get_mut(group) else {
            debug!(interface = %self.config.id, group = %group, "Leave of unjoined group ignored");
            return GroupLeaveResult::NotMember;
        };
        match record.release() {
            Some(0) => {}
            _ => return GroupLeaveResult::StillMember,
        }

        let Some(record) = self.groups.remove(group) else {
            return GroupLeaveResult::NotMember;
        };
        if record.listening {
            self.hooks.listener.stop_listening(self.config.id, &record);
            info!(interface = %self.config.id, group = %group, "Left multicast group");
        }
        GroupLeaveResult::Left(record)
    }

    /// Starts listening on a group record that was joined without it.
    pub(crate) fn take_over_listening(&mut self, group: &Ipv6Address) -> bool {
        let id = self.config.id;
        match self.groups.get_mut(group) {
            Some(record) if !record.listening => {
                self.hooks.listener.start_listening(id, record);
                record.listening = true;
                info!(interface = %id, group = %group, "Took over zone listener");
                true
            }
            _ => false,
        }
    }

    /// Queues a join of `group` for the subsystem.
    pub fn request_join(&mut self, group: Ipv6Address) {
        debug!(interface = %self.config.id, group = %group, "Group join requested");
        self.group_requests.push(GroupRequest::Join(group));
    }

    /// Queues a leave of `group` for the subsystem.
    pub fn request_leave(&mut self, group: Ipv6Address) {
        debug!(interface = %self.config.id, group = %group, "Group leave requested");
        self.group_requests.push(GroupRequest::Leave(group));
    }

    pub(crate) fn take_group_requests(&mut self) -> Vec<GroupRequest> {
        std::mem::take(&mut self.group_requests)
    }

    pub(crate) fn is_listening_to(&self, group: &Ipv6Address) -> bool {
        self.groups.get(group).map_or(false, |r| r.listening)
    }

    pub(crate) fn zone_index(&self, scope: Scope) -> u32 {
        self.config.zone_index(scope)
    }

    fn join_solicited(&mut self, handle: AddressHandle) {
        let Some(address) = self.addresses.get(handle).map(|r| r.address) else {
            return;
        };
        match self.join_group(address.solicited_node()) {
            Ok(_) => {
                if let Some(record) = self.addresses.get_mut(handle) {
                    record.group_added = true;
                }
            }
            Err(e) => warn!(interface = %self.config.id, address = %address, error = %e, "Solicited-node join failed"),
        }
    }

    /// Advances the state timer of one record by `ticks` fast ticks.
    fn advance_timer(&mut self, handle: AddressHandle, ticks: u16) {
        let Some(record) = self.addresses.get_mut(handle) else {
            return;
        };
        if record.state_timer == 0 {
            return;
        }
        record.state_timer = record.state_timer.saturating_sub(ticks);
        if record.state_timer != 0 {
            return;
        }

        if !record.tentative {
            debug!(interface = %self.config.id, address = %record.address, "Address timer expired");
            self.notify(handle, AddressEvent::Timer);
            return;
        }

        if !record.group_added {
            self.join_solicited(handle);
        }

        let dad_transmits = self.config.dad_transmits;
        let retrans_ticks = self.retrans_ticks;
        let id = self.config.id;
        let Some(record) = self.addresses.get_mut(handle) else {
            return;
        };

        if record.probe_count >= dad_transmits {
            record.tentative = false;
            info!(interface = %id, address = %record.address, probes = record.probe_count, "DAD complete");
            self.notify(handle, AddressEvent::DadComplete);
        } else {
            let target = record.address;
            record.probe_count += 1;
            record.state_timer = retrans_ticks;
            debug!(interface = %id, address = %target, probe = record.probe_count, "Sending DAD probe");
            self.hooks.prober.send_probe(id, &target);
        }
    }

    /// Counts down the lifetimes of one record by `secs` seconds.
    fn age(&mut self, handle: AddressHandle, secs: u32) {
        let Some(record) = self.addresses.get_mut(handle) else {
            return;
        };

        let mut deprecated = false;
        if let Lifetime::Finite(preferred) = record.preferred_lifetime {
            if preferred != 0 {
                if preferred > secs {
                    record.preferred_lifetime = Lifetime::Finite(preferred - secs);
                } else {
                    record.preferred_lifetime = Lifetime::Finite(0);
                    deprecated = true;
                }
            }
        }

        let mut expired = false;
        if let Lifetime::Finite(valid) = record.valid_lifetime {
            if valid > secs {
                record.valid_lifetime = Lifetime::Finite(valid - secs);
            } else {
                record.valid_lifetime = Lifetime::Finite(0);
                expired = true;
            }
        }

        let address = record.address;
        if deprecated {
            info!(interface = %self.config.id, address = %address, "Address deprecated");
            self.notify(handle, AddressEvent::Deprecated);
        }
        if expired {
            info!(interface = %self.config.id, address = %address, "Address invalidated");
            self.notify(handle, AddressEvent::Invalidated);
            self.pending.push_back(Pending::Remove(handle));
        }
    }

    /// Drains the pending queue, handing each notification to `deliver`.
    ///
    /// `deliver` may mutate the interface; anything it raises is appended
    /// to the queue and drained in the same call.
    pub(crate) fn process_pending<F>(&mut self, deliver: &mut F)
    where
        F: FnMut(&mut Interface, &AddressNotification),
    {
        while let Some(item) = self.pending.pop_front() {
            match item {
                Pending::Notify(notification) => deliver(self, &notification),
                Pending::Remove(handle) => self.remove_record(handle),
            }
        }
    }

    /// Fast tick: DAD progression and owner timers.
    pub(crate) fn fast_tick<F>(&mut self, ticks: u16, deliver: &mut F)
    where
        F: FnMut(&mut Interface, &AddressNotification),
    {
        for handle in self.addresses.handles() {
            self.advance_timer(handle, ticks);
            self.process_pending(deliver);
        }
    }

    /// Slow tick: lifetime countdown.
    pub(crate) fn slow_tick<F>(&mut self, secs: u32, deliver: &mut F)
    where
        F: FnMut(&mut Interface, &AddressNotification),
    {
        for handle in self.addresses.handles() {
            self.age(handle, secs);
            self.process_pending(deliver);
        }
    }

    /// Removes every address and leaves every group.
    ///
    /// Returns the groups this interface was actively listening to.
    pub(crate) fn shutdown<F>(&mut self, deliver: &mut F) -> Vec<Ipv6Address>
    where
        F: FnMut(&mut Interface, &AddressNotification),
    {
        for handle in self.addresses.handles() {
            self.remove_record(handle);
            self.process_pending(deliver);
        }

        let mut released = Vec::new();
        for record in self.groups.drain() {
            if record.listening {
                self.hooks.listener.stop_listening(self.config.id, &record);
                released.push(*record.group());
            }
        }
        released
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::AddressState;
    use crate::config::DEFAULT_FAST_TICK_MS;
    use crate::hooks::{DadProber, MulticastListener};
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum HookCall {
        Start(Ipv6Address),
        Stop(Ipv6Address),
        Probe(Ipv6Address),
    }

    #[derive(Clone, Default)]
    struct Recorder(Rc<RefCell<Vec<HookCall>>>);

    impl MulticastListener for Recorder {
        fn start_listening(&mut self, _interface: InterfaceId, group: &mut GroupRecord) {
            self.0.borrow_mut().push(HookCall::Start(*group.group()));
        }

        fn stop_listening(&mut self, _interface: InterfaceId, group: &GroupRecord) {
            self.0.borrow_mut().push(HookCall::Stop(*group.group()));
        }
    }

    impl DadProber for Recorder {
        fn send_probe(&mut self, _interface: InterfaceId, target: &Ipv6Address) {
            self.0.borrow_mut().push(HookCall::Probe(*target));
        }
    }

    fn addr(s: &str) -> Ipv6Address {
        s.parse().unwrap()
    }

    fn setup(dad_transmits: u8) -> (Interface, Recorder) {
        let mut config = InterfaceConfig::new(InterfaceId(1));
        config.dad_transmits = dad_transmits;
        config.retrans_timer_ms = 100;
        config.dad_delay_min_ticks = 1;
        config.dad_delay_max_ticks = 1;
        let recorder = Recorder::default();
        let hooks = InterfaceHooks::new(Box::new(recorder.clone()), Box::new(recorder.clone()));
        (Interface::new(config, hooks, DEFAULT_FAST_TICK_MS), recorder)
    }

    fn drain(iface: &mut Interface) -> Vec<AddressEvent> {
        let mut events = Vec::new();
        iface.process_pending(&mut |_: &mut Interface, n: &AddressNotification| events.push(n.event));
        events
    }

    fn fast(iface: &mut Interface, ticks: u16) -> Vec<AddressEvent> {
        let mut events = Vec::new();
        iface.fast_tick(ticks, &mut |_: &mut Interface, n: &AddressNotification| events.push(n.event));
        events
    }

    fn slow(iface: &mut Interface, secs: u32) -> Vec<AddressEvent> {
        let mut events = Vec::new();
        iface.slow_tick(secs, &mut |_: &mut Interface, n: &AddressNotification| events.push(n.event));
        events
    }

    #[test]
    fn test_add_rejects_duplicates_and_bad_input() {
        let (mut iface, _) = setup(1);
        iface.add(NewAddress::new(addr("fe80::1"), 64)).unwrap();
        assert!(matches!(
            iface.add(NewAddress::new(addr("fe80::1"), 64)),
            Err(AddrError::AddressExists { .. })
        ));
        assert_eq!(
            iface.add(NewAddress::new(addr("fe80::2"), 129)),
            Err(AddrError::InvalidPrefixLength(129))
        );
        assert_eq!(
            iface.add(NewAddress::new(addr("ff02::2"), 128)),
            Err(AddrError::NotUnicast(addr("ff02::2")))
        );
        assert_eq!(iface.addresses().len(), 1);
    }

    #[test]
    fn test_skip_dad_assigns_immediately() {
        let (mut iface, hooks) = setup(1);
        iface
            .add(NewAddress::new(addr("fe80::1:2:3"), 64).skip_dad(true))
            .unwrap();
        assert_eq!(drain(&mut iface), vec![AddressEvent::DadComplete]);

        let record = iface.get_entry(&addr("fe80::1:2:3")).unwrap();
        assert_eq!(record.state(), AddressState::Assigned);
        assert!(record.group_added());
        let group = addr("ff02::1:ff02:3");
        assert_eq!(iface.get_group_entry(&group).unwrap().ref_count(), 1);
        assert_eq!(hooks.0.borrow().clone(), vec![HookCall::Start(group)]);
    }

    #[test]
    fn test_zero_transmits_skips_dad() {
        let (mut iface, hooks) = setup(0);
        iface.add(NewAddress::new(addr("2001:db8::5"), 64)).unwrap();
        assert_eq!(drain(&mut iface), vec![AddressEvent::DadComplete]);
        assert!(!iface.get_entry(&addr("2001:db8::5")).unwrap().is_tentative());
        assert!(!hooks.0.borrow().iter().any(|c| matches!(c, HookCall::Probe(_))));
    }

    #[test]
    fn test_dad_converges_after_n_plus_one_expiries() {
        let (mut iface, hooks) = setup(2);
        let target = addr("2001:db8::abcd");
        iface.add(NewAddress::new(target, 64)).unwrap();

        assert_eq!(fast(&mut iface, 1), vec![]);
        assert_eq!(
            iface.get_entry(&target).unwrap().state(),
            AddressState::Tentative { probe_count: 1 }
        );
        assert_eq!(fast(&mut iface, 1), vec![]);
        assert!(iface.get_entry(&target).unwrap().is_tentative());
        assert_eq!(fast(&mut iface, 1), vec![AddressEvent::DadComplete]);
        assert_eq!(iface.get_entry(&target).unwrap().state(), AddressState::Assigned);

        let solicited = target.solicited_node();
        assert_eq!(
            hooks.0.borrow().clone(),
            vec![
                HookCall::Start(solicited),
                HookCall::Probe(target),
                HookCall::Probe(target),
            ]
        );
    }

    #[test]
    fn test_multi_tick_catch_up() {
        let (mut iface, _) = setup(1);
        let mut config = iface.config().clone();
        config.retrans_timer_ms = 1000;
        iface.config = config;
        let target = addr("2001:db8::7");
        iface.add(NewAddress::new(target, 64)).unwrap();

        // join delay expires, first probe armed for 10 ticks
        fast(&mut iface, 5);
        assert_eq!(iface.get_entry(&target).unwrap().state_timer(), 10);
        assert_eq!(fast(&mut iface, 9), vec![]);
        assert_eq!(fast(&mut iface, 30), vec![AddressEvent::DadComplete]);
    }

    #[test]
    fn test_duplicate_detected_deletes_after_notification() {
        let (mut iface, hooks) = setup(1);
        let target = addr("fe80::99");
        iface.add(NewAddress::new(target, 64)).unwrap();
        fast(&mut iface, 1);

        assert!(iface.duplicate_detected(&target));
        assert!(iface.get_entry(&target).is_some());

        let mut seen_present = false;
        let mut events = Vec::new();
        iface.process_pending(&mut |iface: &mut Interface, n: &AddressNotification| {
            if n.event == AddressEvent::DadFailed {
                seen_present = iface.get_entry(n.address()).is_some();
            }
            events.push(n.event);
        });
        assert!(seen_present);
        assert_eq!(events, vec![AddressEvent::DadFailed, AddressEvent::Deleted]);
        assert!(iface.get_entry(&target).is_none());
        assert_eq!(iface.dad_failures(), 1);
        assert!(iface.get_group_entry(&target.solicited_node()).is_none());
        assert_eq!(
            hooks.0.borrow().last().cloned(),
            Some(HookCall::Stop(target.solicited_node()))
        );
        assert!(!iface.duplicate_detected(&target));
        assert_eq!(iface.dad_failures(), 1);
    }

    #[test]
    fn test_delete_unknown_is_noop() {
        let (mut iface, _) = setup(1);
        assert!(!iface.delete(&addr("fe80::1")));
        assert!(!iface.deprecate(&addr("fe80::1")));
        assert!(drain(&mut iface).is_empty());
    }

    #[test]
    fn test_shared_solicited_group_refcount() {
        let (mut iface, hooks) = setup(1);
        // same low 24 bits
        iface
            .add(NewAddress::new(addr("fe80::12:3456"), 64).skip_dad(true))
            .unwrap();
        iface
            .add(NewAddress::new(addr("2001:db8::12:3456"), 64).skip_dad(true))
            .unwrap();
        let group = addr("ff02::1:ff12:3456");
        assert_eq!(iface.get_group_entry(&group).unwrap().ref_count(), 2);

        assert!(iface.delete(&addr("fe80::12:3456")));
        assert_eq!(iface.get_group_entry(&group).unwrap().ref_count(), 1);
        assert!(iface.delete(&addr("2001:db8::12:3456")));
        assert!(iface.get_group_entry(&group).is_none());
        assert_eq!(
            hooks.0.borrow().clone(),
            vec![HookCall::Start(group), HookCall::Stop(group)]
        );
    }

    #[test]
    fn test_deprecate_caps_valid_lifetime() {
        let (mut iface, _) = setup(1);
        let a = addr("2001:db8::1");
        iface.add(NewAddress::new(a, 64).skip_dad(true)).unwrap();
        drain(&mut iface);

        assert!(iface.deprecate(&a));
        assert_eq!(drain(&mut iface), vec![AddressEvent::Deprecated]);
        let record = iface.get_entry(&a).unwrap();
        assert_eq!(record.valid_lifetime(), Lifetime::Finite(DEPRECATE_VALID_LIFETIME_CAP));
        assert!(record.is_deprecated());

        // already deprecated: no second notification
        assert!(iface.deprecate(&a));
        assert!(drain(&mut iface).is_empty());
    }

    #[test]
    fn test_deprecated_snapshot_carries_capped_lifetime() {
        let (mut iface, _) = setup(1);
        let a = addr("2001:db8::1");
        iface.add(NewAddress::new(a, 64).skip_dad(true)).unwrap();
        drain(&mut iface);

        assert!(iface.deprecate(&a));
        let mut seen = Vec::new();
        iface.process_pending(&mut |_: &mut Interface, n: &AddressNotification| {
            seen.push((n.event, n.record.valid_lifetime()))
        });
        assert_eq!(
            seen,
            vec![(
                AddressEvent::Deprecated,
                Lifetime::Finite(DEPRECATE_VALID_LIFETIME_CAP)
            )]
        );
    }

    #[test]
    fn test_group_requests_are_queued_not_applied() {
        let (mut iface, recorder) = setup(1);
        let group = addr("ff05::1:3");
        iface.request_join(group);
        iface.request_leave(group);

        assert!(iface.get_group_entry(&group).is_none());
        assert!(recorder.0.borrow().is_empty());
        assert_eq!(
            iface.take_group_requests(),
            vec![GroupRequest::Join(group), GroupRequest::Leave(group)]
        );
        assert!(iface.take_group_requests().is_empty());
    }

    #[test]
    fn test_deprecate_keeps_shorter_valid_lifetime() {
        let (mut iface, _) = setup(1);
        let a = addr("2001:db8::1");
        iface
            .add(NewAddress::new(a, 64).skip_dad(true).lifetimes(30, 20))
            .unwrap();
        iface.deprecate(&a);
        assert_eq!(iface.get_entry(&a).unwrap().valid_lifetime(), Lifetime::Finite(30));
    }

    #[test]
    fn test_lifetimes_count_down() {
        let (mut iface, _) = setup(1);
        let a = addr("2001:db8::1");
        iface
            .add(NewAddress::new(a, 64).skip_dad(true).lifetimes(5, 3))
            .unwrap();
        drain(&mut iface);

        assert_eq!(slow(&mut iface, 2), vec![]);
        assert_eq!(slow(&mut iface, 1), vec![AddressEvent::Deprecated]);
        assert_eq!(slow(&mut iface, 1), vec![]);
        assert_eq!(
            slow(&mut iface, 1),
            vec![AddressEvent::Invalidated, AddressEvent::Deleted]
        );
        assert!(iface.get_entry(&a).is_none());
    }

    #[test]
    fn test_simultaneous_deprecate_and_invalidate() {
        let (mut iface, _) = setup(1);
        let a = addr("2001:db8::1");
        iface
            .add(NewAddress::new(a, 64).skip_dad(true).lifetimes(10, 10))
            .unwrap();
        drain(&mut iface);
        assert_eq!(
            slow(&mut iface, 100),
            vec![
                AddressEvent::Deprecated,
                AddressEvent::Invalidated,
                AddressEvent::Deleted
            ]
        );
    }

    #[test]
    fn test_invalidated_record_not_revived() {
        let (mut iface, _) = setup(1);
        let a = addr("2001:db8::1");
        iface
            .add(NewAddress::new(a, 64).skip_dad(true).lifetimes(1, INFINITE))
            .unwrap();
        drain(&mut iface);

        iface.slow_tick(1, &mut |iface: &mut Interface, n: &AddressNotification| {
            if n.event == AddressEvent::Invalidated {
                iface.set_valid_lifetime(n.address(), Lifetime::Infinite);
            }
        });
        assert!(iface.get_entry(&a).is_none());
    }

    const INFINITE: u32 = crate::types::INFINITE_LIFETIME;

    #[test]
    fn test_infinite_lifetimes_never_expire() {
        let (mut iface, _) = setup(1);
        let a = addr("2001:db8::1");
        iface.add(NewAddress::new(a, 64).skip_dad(true)).unwrap();
        drain(&mut iface);
        assert!(slow(&mut iface, u32::MAX - 1).is_empty());
        assert_eq!(iface.get_entry(&a).unwrap().state(), AddressState::Assigned);
    }

    #[test]
    fn test_timer_fires_once_assigned() {
        let (mut iface, _) = setup(1);
        let a = addr("2001:db8::1");
        iface.add(NewAddress::new(a, 64)).unwrap();
        assert!(!iface.set_timer(&a, 5));
        fast(&mut iface, 1);
        fast(&mut iface, 1);

        assert!(iface.set_timer(&a, 3));
        assert_eq!(fast(&mut iface, 2), vec![]);
        assert_eq!(fast(&mut iface, 1), vec![AddressEvent::Timer]);
        assert_eq!(fast(&mut iface, 10), vec![]);
    }

    #[test]
    fn test_handler_deleting_current_record_during_tick() {
        let (mut iface, _) = setup(1);
        for a in ["2001:db8::1", "2001:db8::2", "2001:db8::3"] {
            iface
                .add(NewAddress::new(addr(a), 64).skip_dad(true).lifetimes(1, 1))
                .unwrap();
        }
        drain(&mut iface);

        let mut deleted = Vec::new();
        iface.slow_tick(1, &mut |iface: &mut Interface, n: &AddressNotification| match n.event {
            AddressEvent::Deprecated => {
                iface.delete(n.address());
            }
            AddressEvent::Deleted => deleted.push(*n.address()),
            _ => {}
        });
        assert!(iface.addresses().is_empty());
        assert_eq!(
            deleted,
            vec![addr("2001:db8::1"), addr("2001:db8::2"), addr("2001:db8::3")]
        );
    }

    #[test]
    fn test_delete_matching_and_set_non_preferred() {
        let (mut iface, _) = setup(1);
        iface
            .add(NewAddress::new(addr("2001:db8:1::1"), 64).skip_dad(true).source(AddressSource::Dhcp))
            .unwrap();
        iface
            .add(NewAddress::new(addr("2001:db8:1::2"), 64).skip_dad(true).source(AddressSource::Slaac))
            .unwrap();
        iface
            .add(NewAddress::new(addr("2001:db8:2::1"), 64).skip_dad(true).source(AddressSource::Dhcp))
            .unwrap();
        drain(&mut iface);

        assert_eq!(iface.set_non_preferred(AddressSource::Dhcp), 2);
        assert_eq!(
            drain(&mut iface),
            vec![AddressEvent::Deprecated, AddressEvent::Deprecated]
        );

        let prefix = addr("2001:db8:1::");
        assert_eq!(iface.delete_matching(&prefix, 48, Some(AddressSource::Dhcp)), 1);
        assert!(iface.get_entry(&addr("2001:db8:1::2")).is_some());
        assert_eq!(iface.delete_matching(&prefix, 48, None), 1);
        assert_eq!(iface.addresses().len(), 1);
    }

    #[test]
    fn test_implicit_and_non_multicast_groups() {
        let (mut iface, hooks) = setup(1);
        assert_eq!(
            iface.join_group(addr("ff02::1")).unwrap(),
            GroupJoinResult::Implicit
        );
        assert_eq!(
            iface.join_group(addr("2001:db8::1")),
            Err(AddrError::NotMulticast(addr("2001:db8::1")))
        );
        assert_eq!(iface.leave_group(&addr("ff01::1")), GroupLeaveResult::Implicit);
        assert_eq!(iface.leave_group(&addr("ff02::fb")), GroupLeaveResult::NotMember);
        assert!(iface.groups().is_empty());
        assert!(hooks.0.borrow().is_empty());
    }

    #[test]
    fn test_permanent_group_survives_leave() {
        let (mut iface, hooks) = setup(1);
        let group = addr("ff02::fb");
        iface.join_group(group).unwrap();
        for _ in 0..u16::MAX {
            iface.join_group(group).unwrap();
        }
        assert_eq!(iface.get_group_entry(&group).unwrap().ref_count(), u16::MAX);
        assert_eq!(iface.leave_group(&group), GroupLeaveResult::StillMember);
        assert!(iface.get_group_entry(&group).unwrap().is_permanent());
        assert_eq!(hooks.0.borrow().len(), 1);
    }

    #[test]
    fn test_link_local_lookup() {
        let (mut iface, _) = setup(1);
        iface.add(NewAddress::new(addr("fe80::1"), 64)).unwrap();
        assert_eq!(iface.link_local_address(false), None);
        assert_eq!(iface.link_local_address(true), Some(addr("fe80::1")));
    }

    #[test]
    fn test_opaque_iid_uses_interface_counter() {
        let (mut iface, _) = setup(1);
        let mut generator = OpaqueIidGenerator::new();
        generator.set_key(Some(b"k"));
        let prefix = addr("2001:db8::");

        let first = iface.generate_opaque_iid(&generator, &prefix).unwrap();
        iface.add(NewAddress::new(first, 64)).unwrap();
        iface.duplicate_detected(&first);
        drain(&mut iface);

        let second = iface.generate_opaque_iid(&generator, &prefix).unwrap();
        assert!(first != second);
        assert!(second.matches_prefix(&prefix, 64));
    }
}
