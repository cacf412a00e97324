//! Address records and the per-interface address table.

use crate::types::{AddressHandle, AddressSource, Lifetime, OwnerId};
use meshaddr_types::Ipv6Address;

/// Observable DAD/lifetime state of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressState {
    /// Undergoing duplicate address detection.
    Tentative { probe_count: u8 },
    Assigned,
    /// Still assigned, preferred lifetime exhausted.
    Deprecated,
}

/// One unicast or anycast address bound to an interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressRecord {
    pub(crate) handle: AddressHandle,
    pub(crate) address: Ipv6Address,
    pub(crate) prefix_len: u8,
    pub(crate) source: AddressSource,
    pub(crate) valid_lifetime: Lifetime,
    pub(crate) preferred_lifetime: Lifetime,
    pub(crate) tentative: bool,
    pub(crate) probe_count: u8,
    pub(crate) group_added: bool,
    pub(crate) temporary: bool,
    pub(crate) state_timer: u16,
    pub(crate) owner: Option<OwnerId>,
}

impl AddressRecord {
    pub fn handle(&self) -> AddressHandle {
        self.handle
    }

    pub fn address(&self) -> &Ipv6Address {
        &self.address
    }

    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    pub fn source(&self) -> AddressSource {
        self.source
    }

    pub fn valid_lifetime(&self) -> Lifetime {
        self.valid_lifetime
    }

    pub fn preferred_lifetime(&self) -> Lifetime {
        self.preferred_lifetime
    }

    pub fn is_tentative(&self) -> bool {
        self.tentative
    }

    pub fn probe_count(&self) -> u8 {
        self.probe_count
    }

    /// True if this record holds a reference on its solicited-node group.
    pub fn group_added(&self) -> bool {
        self.group_added
    }

    pub fn is_temporary(&self) -> bool {
        self.temporary
    }

    pub fn state_timer(&self) -> u16 {
        self.state_timer
    }

    pub fn owner(&self) -> Option<OwnerId> {
        self.owner
    }

    pub fn is_deprecated(&self) -> bool {
        self.preferred_lifetime.is_zero()
    }

    pub fn state(&self) -> AddressState {
        if self.tentative {
            AddressState::Tentative {
                probe_count: self.probe_count,
            }
        } else if self.is_deprecated() {
            AddressState::Deprecated
        } else {
            AddressState::Assigned
        }
    }
}

/// Parameters of an address to be added.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAddress {
    pub address: Ipv6Address,
    pub prefix_len: u8,
    pub source: AddressSource,
    pub valid_lifetime: Lifetime,
    pub preferred_lifetime: Lifetime,
    pub skip_dad: bool,
    pub temporary: bool,
    pub owner: Option<OwnerId>,
}

impl NewAddress {
    /// An address of unknown source with infinite lifetimes that runs DAD.
    pub fn new(address: Ipv6Address, prefix_len: u8) -> Self {
        Self {
            address,
            prefix_len,
            source: AddressSource::Unknown,
            valid_lifetime: Lifetime::Infinite,
            preferred_lifetime: Lifetime::Infinite,
            skip_dad: false,
            temporary: false,
            owner: None,
        }
    }

    pub fn source(mut self, source: AddressSource) -> Self {
        self.source = source;
        self
    }

    /// Sets both lifetimes in seconds; `INFINITE_LIFETIME` means infinite.
    pub fn lifetimes(mut self, valid: u32, preferred: u32) -> Self {
        self.valid_lifetime = Lifetime::from_secs(valid);
        self.preferred_lifetime = Lifetime::from_secs(preferred);
        self
    }

    pub fn skip_dad(mut self, skip: bool) -> Self {
        self.skip_dad = skip;
        self
    }

    pub fn temporary(mut self, temporary: bool) -> Self {
        self.temporary = temporary;
        self
    }

    pub fn owner(mut self, owner: OwnerId) -> Self {
        self.owner = Some(owner);
        self
    }
}

/// Address records of one interface in insertion order.
///
/// Insertion order is what source selection falls back to on a full tie,
/// so records are never reordered.
#[derive(Debug, Clone, Default)]
pub struct AddressTable {
    records: Vec<AddressRecord>,
    next_handle: u64,
}

impl AddressTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AddressRecord> {
        self.records.iter()
    }

    pub fn find(&self, address: &Ipv6Address) -> Option<&AddressRecord> {
        self.records.iter().find(|r| r.address == *address)
    }

    pub fn get(&self, handle: AddressHandle) -> Option<&AddressRecord> {
        self.records.iter().find(|r| r.handle == handle)
    }

    pub(crate) fn get_mut(&mut self, handle: AddressHandle) -> Option<&mut AddressRecord> {
        self.records.iter_mut().find(|r| r.handle == handle)
    }

    pub(crate) fn handle_of(&self, address: &Ipv6Address) -> Option<AddressHandle> {
        self.find(address).map(|r| r.handle)
    }

    /// Snapshot of the current handles, safe to iterate while mutating.
    pub(crate) fn handles(&self) -> Vec<AddressHandle> {
        self.records.iter().map(|r| r.handle).collect()
    }

    pub(crate) fn allocate_handle(&mut self) -> AddressHandle {
        let handle = AddressHandle(self.next_handle);
        self.next_handle += 1;
        handle
    }

    pub(crate) fn push(&mut self, record: AddressRecord) {
        self.records.push(record);
    }

    pub(crate) fn remove(&mut self, handle: AddressHandle) -> Option<AddressRecord> {
        let pos = self.records.iter().position(|r| r.handle == handle)?;
        Some(self.records.remove(pos))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record(table: &mut AddressTable, addr: &str) -> AddressHandle {
        let handle = table.allocate_handle();
        table.push(AddressRecord {
            handle,
            address: addr.parse().unwrap(),
            prefix_len: 64,
            source: AddressSource::Manual,
            valid_lifetime: Lifetime::Infinite,
            preferred_lifetime: Lifetime::Infinite,
            tentative: false,
            probe_count: 0,
            group_added: false,
            temporary: false,
            state_timer: 0,
            owner: None,
        });
        handle
    }

    #[test]
    fn test_handles_are_unique_and_not_reused() {
        let mut table = AddressTable::new();
        let a = record(&mut table, "fe80::1");
        let b = record(&mut table, "fe80::2");
        assert!(a != b);
        table.remove(a).unwrap();
        let c = record(&mut table, "fe80::1");
        assert!(c != a);
        assert!(table.get(a).is_none());
        assert_eq!(table.get(c).unwrap().address().to_string(), "fe80::1");
    }

    #[test]
    fn test_insertion_order_kept() {
        let mut table = AddressTable::new();
        record(&mut table, "fe80::1");
        let mid = record(&mut table, "2001:db8::1");
        record(&mut table, "fd00::1");
        table.remove(mid);
        let order: Vec<String> = table.iter().map(|r| r.address().to_string()).collect();
        assert_eq!(order, vec!["fe80::1", "fd00::1"]);
    }

    #[test]
    fn test_state_reporting() {
        let mut table = AddressTable::new();
        let h = record(&mut table, "fe80::1");
        assert_eq!(table.get(h).unwrap().state(), AddressState::Assigned);

        let rec = table.get_mut(h).unwrap();
        rec.preferred_lifetime = Lifetime::Finite(0);
        assert_eq!(rec.state(), AddressState::Deprecated);

        rec.tentative = true;
        rec.probe_count = 2;
        assert_eq!(rec.state(), AddressState::Tentative { probe_count: 2 });
    }

    #[test]
    fn test_new_address_builder() {
        let new = NewAddress::new("2002:db8::1".parse().unwrap(), 32)
            .source(AddressSource::Slaac)
            .lifetimes(7200, 1800)
            .temporary(true);
        assert_eq!(new.valid_lifetime, Lifetime::Finite(7200));
        assert_eq!(new.preferred_lifetime, Lifetime::Finite(1800));
        assert_eq!(new.source, AddressSource::Slaac);
        assert!(new.temporary);
        assert!(!new.skip_dad);
    }
}
