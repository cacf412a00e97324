//! The address subsystem context.
//!
//! Owns every interface together with the process-wide state (policy
//! table, opaque IID secret, notification observers and owners). All entry
//! points run to completion: notifications raised along the way, including
//! those raised by handlers, are delivered before the call returns.

use crate::address::{AddressRecord, NewAddress};
use crate::config::{InterfaceConfig, SubsystemConfig, DEFAULT_FAST_TICK_MS};
use crate::error::{AddrError, Result};
use crate::group::{GroupJoinResult, GroupLeaveResult, GroupRecord};
use crate::hooks::InterfaceHooks;
use crate::interface::{GroupRequest, Interface};
use crate::notify::{AddressNotification, AddressObserver, Dispatcher};
use crate::opaque_iid::OpaqueIidGenerator;
use crate::policy::{PolicyEntry, PolicyTable};
use crate::select;
use crate::types::{AddressHandle, AddressSource, InterfaceId, Lifetime, OwnerId, SourcePreferences};
use meshaddr_types::{Ipv6Address, Ipv6Prefix, Scope};
use std::collections::BTreeMap;
use tracing::{debug, info, instrument, warn};

/// Address management state for all interfaces.
#[derive(Debug)]
pub struct AddressSubsystem {
    interfaces: BTreeMap<InterfaceId, Interface>,
    policy: PolicyTable,
    opaque: OpaqueIidGenerator,
    dispatcher: Dispatcher,
    fast_tick_ms: u64,
}

impl Default for AddressSubsystem {
    fn default() -> Self {
        Self::with_fast_tick_ms(DEFAULT_FAST_TICK_MS)
    }
}

impl AddressSubsystem {
    /// Creates an empty subsystem with the default policy table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty subsystem whose fast tick lasts `fast_tick_ms`.
    ///
    /// DAD retransmission intervals are converted to ticks of this length.
    pub fn with_fast_tick_ms(fast_tick_ms: u64) -> Self {
        Self {
            interfaces: BTreeMap::new(),
            policy: PolicyTable::default(),
            opaque: OpaqueIidGenerator::default(),
            dispatcher: Dispatcher::default(),
            fast_tick_ms: fast_tick_ms.max(1),
        }
    }

    pub fn fast_tick_ms(&self) -> u64 {
        self.fast_tick_ms
    }

    /// Builds a subsystem from configuration.
    ///
    /// `hooks_for` supplies the collaborator hooks of each interface.
    /// Observers must be registered before static addresses are seeded to
    /// see their notifications, so seeding is left to
    /// [`AddressSubsystem::seed_static_addresses`].
    pub fn from_config<F>(config: &SubsystemConfig, mut hooks_for: F) -> Result<Self>
    where
        F: FnMut(&InterfaceConfig) -> InterfaceHooks,
    {
        config.validate()?;

        let mut subsystem = Self::with_fast_tick_ms(config.fast_tick_ms);
        subsystem.opaque_iid_key_set(config.opaque_secret_key.as_deref());
        subsystem.opaque_initial_iid_set(config.opaque_initial_iid);
        for entry in &config.policy_entries {
            subsystem.policy_insert(*entry)?;
        }
        for iface in &config.interfaces {
            let hooks = hooks_for(iface);
            subsystem.add_interface(iface.clone(), hooks)?;
        }
        Ok(subsystem)
    }

    /// Adds the configured static addresses of every interface.
    ///
    /// Returns the number of addresses added.
    pub fn seed_static_addresses(&mut self) -> Result<usize> {
        let plan: Vec<(InterfaceId, Vec<_>)> = self
            .interfaces
            .values()
            .map(|iface| (iface.id(), iface.config().static_addresses.clone()))
            .collect();

        let mut added = 0;
        for (id, entries) in plan {
            for entry in entries {
                let address = if entry.opaque_iid {
                    self.generate_opaque_iid(id, &entry.address)?
                } else {
                    entry.address
                };
                let mut new = NewAddress::new(address, entry.prefix_len)
                    .source(entry.source)
                    .skip_dad(entry.skip_dad)
                    .temporary(entry.temporary);
                new.valid_lifetime = entry.valid_lifetime.map_or(Lifetime::Infinite, Lifetime::from_secs);
                new.preferred_lifetime = entry
                    .preferred_lifetime
                    .map_or(Lifetime::Infinite, Lifetime::from_secs);
                self.add(id, new)?;
                added += 1;
            }
        }
        Ok(added)
    }

    /// Registers an observer for every notification on every interface.
    pub fn notification_register(&mut self, observer: Box<dyn AddressObserver>) {
        self.dispatcher.register(observer);
    }

    /// Registers an owner that records can be bound to.
    pub fn register_owner(&mut self, owner: Box<dyn AddressObserver>) -> OwnerId {
        self.dispatcher.register_owner(owner)
    }

    /// Runs `op` on an interface, delivers what it raised and then carries
    /// out the group requests its handlers made.
    fn with_interface<T>(&mut self, id: InterfaceId, op: impl FnOnce(&mut Interface) -> T) -> Option<T> {
        let iface = self.interfaces.get_mut(&id)?;
        let out = op(iface);
        let dispatcher = &mut self.dispatcher;
        iface.process_pending(&mut |iface: &mut Interface, n: &AddressNotification| {
            dispatcher.deliver(iface, n)
        });
        let requests = iface.take_group_requests();
        self.apply_group_requests(id, requests);
        Some(out)
    }

    /// Runs handler group requests through the zone-aware join and leave.
    fn apply_group_requests(&mut self, id: InterfaceId, requests: Vec<GroupRequest>) {
        for request in requests {
            let outcome = match request {
                GroupRequest::Join(group) => self
                    .add_group(id, group)
                    .map(|r| debug!(result = ?r, "Requested join applied")),
                GroupRequest::Leave(group) => self
                    .remove_group(id, &group)
                    .map(|r| debug!(result = ?r, "Requested leave applied")),
            };
            if let Err(e) = outcome {
                warn!(interface = %id, ?request, error = %e, "Requested group change failed");
            }
        }
    }

    // ---- interfaces ----

    #[instrument(skip(self, config, hooks), fields(interface = %config.id))]
    pub fn add_interface(&mut self, config: InterfaceConfig, hooks: InterfaceHooks) -> Result<()> {
        config.validate()?;
        if self.interfaces.contains_key(&config.id) {
            return Err(AddrError::InterfaceExists(config.id));
        }
        info!(
            name = ?config.name,
            dad_transmits = config.dad_transmits,
            retrans_ticks = config.retrans_ticks(self.fast_tick_ms),
            "Interface added"
        );
        self.interfaces
            .insert(config.id, Interface::new(config, hooks, self.fast_tick_ms));
        Ok(())
    }

    /// Removes an interface, deleting its addresses and leaving its groups.
    #[instrument(skip(self))]
    pub fn remove_interface(&mut self, id: InterfaceId) -> Result<()> {
        let mut iface = self
            .interfaces
            .remove(&id)
            .ok_or(AddrError::InterfaceNotFound(id))?;
        let dispatcher = &mut self.dispatcher;
        let released = iface.shutdown(&mut |iface: &mut Interface, n: &AddressNotification| {
            dispatcher.deliver(iface, n)
        });
        let dropped = iface.take_group_requests();
        if !dropped.is_empty() {
            debug!(count = dropped.len(), "Dropping group requests of removed interface");
        }
        for group in released {
            if let Some(scope) = zoned_scope(&group) {
                self.take_over_in_zone(id, &group, scope, iface.zone_index(scope));
            }
        }
        info!("Interface removed");
        Ok(())
    }

    pub fn interface(&self, id: InterfaceId) -> Option<&Interface> {
        self.interfaces.get(&id)
    }

    pub fn interface_ids(&self) -> Vec<InterfaceId> {
        self.interfaces.keys().copied().collect()
    }

    // ---- address lifecycle ----

    /// Adds an address; see [`Interface::add`].
    #[instrument(skip(self))]
    pub fn add(&mut self, id: InterfaceId, new: NewAddress) -> Result<AddressHandle> {
        self.with_interface(id, |iface| iface.add(new))
            .ok_or(AddrError::InterfaceNotFound(id))?
    }

    /// Adds an address bound to `owner`.
    pub fn add_with_owner(&mut self, id: InterfaceId, new: NewAddress, owner: OwnerId) -> Result<AddressHandle> {
        self.add(id, new.owner(owner))
    }

    #[instrument(skip(self))]
    pub fn delete(&mut self, id: InterfaceId, address: &Ipv6Address) -> bool {
        self.with_interface(id, |iface| iface.delete(address))
            .unwrap_or(false)
    }

    /// Deletes every address inside `prefix/prefix_len`, optionally only
    /// those created by `source`.
    #[instrument(skip(self))]
    pub fn delete_matching(
        &mut self,
        id: InterfaceId,
        prefix: &Ipv6Address,
        prefix_len: u8,
        source: Option<AddressSource>,
    ) -> usize {
        self.with_interface(id, |iface| iface.delete_matching(prefix, prefix_len, source))
            .unwrap_or(0)
    }

    #[instrument(skip(self))]
    pub fn deprecate(&mut self, id: InterfaceId, address: &Ipv6Address) -> bool {
        self.with_interface(id, |iface| iface.deprecate(address))
            .unwrap_or(false)
    }

    /// Deprecates every address created by `source`.
    #[instrument(skip(self))]
    pub fn set_non_preferred(&mut self, id: InterfaceId, source: AddressSource) -> usize {
        self.with_interface(id, |iface| iface.set_non_preferred(source))
            .unwrap_or(0)
    }

    /// Sets the valid lifetime in seconds (`INFINITE_LIFETIME` for infinite).
    #[instrument(skip(self))]
    pub fn set_valid_lifetime(&mut self, id: InterfaceId, address: &Ipv6Address, secs: u32) -> bool {
        self.with_interface(id, |iface| iface.set_valid_lifetime(address, Lifetime::from_secs(secs)))
            .unwrap_or(false)
    }

    /// Sets the preferred lifetime in seconds (`INFINITE_LIFETIME` for infinite).
    #[instrument(skip(self))]
    pub fn set_preferred_lifetime(&mut self, id: InterfaceId, address: &Ipv6Address, secs: u32) -> bool {
        self.with_interface(id, |iface| {
            iface.set_preferred_lifetime(address, Lifetime::from_secs(secs))
        })
        .unwrap_or(false)
    }

    #[instrument(skip(self))]
    pub fn set_temporary(&mut self, id: InterfaceId, address: &Ipv6Address, temporary: bool) -> bool {
        self.with_interface(id, |iface| iface.set_temporary(address, temporary))
            .unwrap_or(false)
    }

    #[instrument(skip(self))]
    pub fn set_owner(&mut self, id: InterfaceId, address: &Ipv6Address, owner: Option<OwnerId>) -> bool {
        self.with_interface(id, |iface| iface.set_owner(address, owner))
            .unwrap_or(false)
    }

    #[instrument(skip(self))]
    pub fn set_timer(&mut self, id: InterfaceId, address: &Ipv6Address, ticks: u16) -> bool {
        self.with_interface(id, |iface| iface.set_timer(address, ticks))
            .unwrap_or(false)
    }

    /// Reports an address conflict; the record is deleted.
    #[instrument(skip(self))]
    pub fn duplicate_detected(&mut self, id: InterfaceId, address: &Ipv6Address) -> bool {
        self.with_interface(id, |iface| iface.duplicate_detected(address))
            .unwrap_or(false)
    }

    /// Advances DAD and owner timers on every interface.
    pub fn fast_tick(&mut self, ticks: u16) {
        let dispatcher = &mut self.dispatcher;
        let mut requests = Vec::new();
        for iface in self.interfaces.values_mut() {
            iface.fast_tick(ticks, &mut |iface: &mut Interface, n: &AddressNotification| {
                dispatcher.deliver(iface, n)
            });
            requests.push((iface.id(), iface.take_group_requests()));
        }
        for (id, batch) in requests {
            self.apply_group_requests(id, batch);
        }
    }

    /// Counts down address lifetimes on every interface.
    pub fn slow_tick(&mut self, secs: u32) {
        let dispatcher = &mut self.dispatcher;
        let mut requests = Vec::new();
        for iface in self.interfaces.values_mut() {
            iface.slow_tick(secs, &mut |iface: &mut Interface, n: &AddressNotification| {
                dispatcher.deliver(iface, n)
            });
            requests.push((iface.id(), iface.take_group_requests()));
        }
        for (id, batch) in requests {
            self.apply_group_requests(id, batch);
        }
    }

    // ---- lookups ----

    pub fn get_entry(&self, id: InterfaceId, address: &Ipv6Address) -> Option<&AddressRecord> {
        self.interfaces.get(&id)?.get_entry(address)
    }

    /// Snapshot of an interface's addresses in list order.
    pub fn addresses(&self, id: InterfaceId) -> Vec<AddressRecord> {
        self.interfaces
            .get(&id)
            .map(|iface| iface.addresses().iter().cloned().collect())
            .unwrap_or_default()
    }

    /// True if the address is present and has completed DAD.
    pub fn is_assigned(&self, id: InterfaceId, address: &Ipv6Address) -> bool {
        self.get_entry(id, address).map_or(false, |r| !r.is_tentative())
    }

    pub fn is_tentative(&self, id: InterfaceId, address: &Ipv6Address) -> bool {
        self.get_entry(id, address).map_or(false, |r| r.is_tentative())
    }

    pub fn link_local_address(&self, id: InterfaceId, allow_tentative: bool) -> Option<Ipv6Address> {
        self.interfaces.get(&id)?.link_local_address(allow_tentative)
    }

    // ---- groups ----

    /// Joins a multicast group.
    ///
    /// For scopes wider than link-local, "start listening" is skipped when
    /// another interface in the same zone already listens to the group.
    #[instrument(skip(self))]
    pub fn add_group(&mut self, id: InterfaceId, group: Ipv6Address) -> Result<GroupJoinResult> {
        let scope = group.multicast_scope().ok_or(AddrError::NotMulticast(group))?;
        let iface = self
            .interfaces
            .get(&id)
            .ok_or(AddrError::InterfaceNotFound(id))?;

        let zone_listening = scope > Scope::LINK_LOCAL && {
            let zone = iface.zone_index(scope);
            self.interfaces.values().any(|other| {
                other.id() != id && other.zone_index(scope) == zone && other.is_listening_to(&group)
            })
        };

        self.with_interface(id, |iface| iface.join_group_with(group, !zone_listening))
            .ok_or(AddrError::InterfaceNotFound(id))?
    }

    /// Leaves a multicast group.
    ///
    /// If this interface was the zone's listener, another interface of the
    /// zone still holding the group takes over.
    #[instrument(skip(self))]
    pub fn remove_group(&mut self, id: InterfaceId, group: &Ipv6Address) -> Result<GroupLeaveResult> {
        let iface = self
            .interfaces
            .get_mut(&id)
            .ok_or(AddrError::InterfaceNotFound(id))?;
        let result = iface.leave_group(group);

        if let (GroupLeaveResult::Left(record), Some(scope)) = (&result, zoned_scope(group)) {
            if record.is_listening() {
                let zone = iface.zone_index(scope);
                self.take_over_in_zone(id, group, scope, zone);
            }
        }
        Ok(result)
    }

    fn take_over_in_zone(&mut self, from: InterfaceId, group: &Ipv6Address, scope: Scope, zone: u32) {
        let successor = self
            .interfaces
            .values_mut()
            .filter(|other| other.id() != from && other.zone_index(scope) == zone)
            .find(|other| other.get_group_entry(group).is_some());
        match successor {
            Some(other) => {
                other.take_over_listening(group);
            }
            None => debug!(group = %group, zone, "No remaining zone member for group"),
        }
    }

    pub fn get_group_entry(&self, id: InterfaceId, group: &Ipv6Address) -> Option<&GroupRecord> {
        self.interfaces.get(&id)?.get_group_entry(group)
    }

    // ---- policy table ----

    pub fn policy_insert(&mut self, entry: PolicyEntry) -> Result<()> {
        self.policy.insert(entry)
    }

    pub fn policy_delete(&mut self, prefix: &Ipv6Prefix) -> Result<PolicyEntry> {
        self.policy.delete(prefix)
    }

    pub fn get_policy(&self, address: &Ipv6Address) -> &PolicyEntry {
        self.policy.lookup(address)
    }

    pub fn policy_entries(&self) -> &[PolicyEntry] {
        self.policy.entries()
    }

    // ---- opaque IIDs ----

    /// Sets or clears (with `None` or an empty key) the opaque IID secret.
    pub fn opaque_iid_key_set(&mut self, key: Option<&[u8]>) {
        self.opaque.set_key(key);
    }

    /// Sets or clears the fixed IID used before any DAD failure.
    pub fn opaque_initial_iid_set(&mut self, iid: Option<[u8; 8]>) {
        self.opaque.set_initial_iid(iid);
    }

    pub fn opaque_iid_key_is_set(&self) -> bool {
        self.opaque.key_is_set()
    }

    /// Returns `prefix` with an opaque IID for the interface in its low 64 bits.
    pub fn generate_opaque_iid(&mut self, id: InterfaceId, prefix: &Ipv6Address) -> Result<Ipv6Address> {
        let iface = self
            .interfaces
            .get_mut(&id)
            .ok_or(AddrError::InterfaceNotFound(id))?;
        iface.generate_opaque_iid(&self.opaque, prefix)
    }

    // ---- source selection ----

    pub fn select_source(
        &self,
        id: InterfaceId,
        dest: &Ipv6Address,
        prefs: SourcePreferences,
    ) -> Option<Ipv6Address> {
        let iface = self.interfaces.get(&id)?;
        select::select_source(iface.addresses().iter(), &self.policy, dest, prefs).map(|r| *r.address())
    }

    pub fn select_with_prefix(
        &self,
        id: InterfaceId,
        prefix: &Ipv6Address,
        prefix_len: u8,
        prefs: SourcePreferences,
    ) -> Option<Ipv6Address> {
        let iface = self.interfaces.get(&id)?;
        select::select_with_prefix(iface.addresses().iter(), &self.policy, prefix, prefix_len, prefs)
            .map(|r| *r.address())
    }
}

/// Scope of a multicast group whose membership is shared across a zone.
fn zoned_scope(group: &Ipv6Address) -> Option<Scope> {
    group
        .multicast_scope()
        .filter(|scope| *scope > Scope::LINK_LOCAL)
}
