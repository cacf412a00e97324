//! Reference-counted multicast group table.
//!
//! The table never creates entries implicitly: lookups return `Option`,
//! and records only come into existence through an explicit insert. Every
//! reason for holding a group (a socket join, a solicited-node group for an
//! address) takes one reference.
//!
//! # Saturation
//!
//! The reference count saturates at `u16::MAX` instead of wrapping. A
//! saturated count is a permanent membership: releases no longer decrement
//! it and the record stays until the interface goes away.

use meshaddr_types::Ipv6Address;

/// Outcome of a group join.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupJoinResult {
    /// A new record was created.
    Joined,
    /// The reference count of an existing record was incremented.
    AlreadyMember,
    /// Every interface is implicitly a member; no record is kept.
    Implicit,
}

/// Outcome of a group leave.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupLeaveResult {
    /// The last reference was dropped; the removed record is returned.
    Left(GroupRecord),
    /// References remain (or the membership is permanent).
    StillMember,
    /// No record exists for the group.
    NotMember,
    /// Implicit groups cannot be left.
    Implicit,
}

/// Groups every interface belongs to without an explicit record.
pub fn is_implicit_group(group: &Ipv6Address) -> bool {
    *group == Ipv6Address::ALL_NODES_INTERFACE_LOCAL || *group == Ipv6Address::ALL_NODES_LINK_LOCAL
}

/// One multicast group membership.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupRecord {
    group: Ipv6Address,
    ref_count: u16,
    pub(crate) listening: bool,
    /// MLD: this node sent the last report for the group
    pub last_reporter: bool,
    /// MLD: ticks until the pending report is sent
    pub report_timer: u16,
}

impl GroupRecord {
    pub(crate) fn new(group: Ipv6Address) -> Self {
        Self {
            group,
            ref_count: 1,
            listening: false,
            last_reporter: false,
            report_timer: 0,
        }
    }

    pub fn group(&self) -> &Ipv6Address {
        &self.group
    }

    pub fn ref_count(&self) -> u16 {
        self.ref_count
    }

    /// True if this record's interface invoked "start listening" for it.
    pub fn is_listening(&self) -> bool {
        self.listening
    }

    pub fn is_permanent(&self) -> bool {
        self.ref_count == u16::MAX
    }

    /// Takes a reference and returns the new count.
    pub(crate) fn acquire(&mut self) -> u16 {
        self.ref_count = self.ref_count.saturating_add(1);
        self.ref_count
    }

    /// Drops a reference and returns the new count.
    ///
    /// Returns `None` for a permanent membership.
    pub(crate) fn release(&mut self) -> Option<u16> {
        if self.is_permanent() {
            return None;
        }
        self.ref_count = self.ref_count.saturating_sub(1);
        Some(self.ref_count)
    }
}

/// Ordered table of group records of one interface.
#[derive(Debug, Clone, Default)]
pub struct GroupTable {
    inner: Vec<GroupRecord>,
}

impl GroupTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns the record for `group`. **This never creates entries.**
    pub fn get(&self, group: &Ipv6Address) -> Option<&GroupRecord> {
        self.inner.iter().find(|r| r.group == *group)
    }

    /// Returns the record for `group`. **This never creates entries.**
    pub fn get_mut(&mut self, group: &Ipv6Address) -> Option<&mut GroupRecord> {
        self.inner.iter_mut().find(|r| r.group == *group)
    }

    pub fn iter(&self) -> impl Iterator<Item = &GroupRecord> {
        self.inner.iter()
    }

    /// Inserts a new record. The caller has checked the group is absent.
    pub(crate) fn insert(&mut self, record: GroupRecord) {
        self.inner.push(record);
    }

    pub(crate) fn remove(&mut self, group: &Ipv6Address) -> Option<GroupRecord> {
        let pos = self.inner.iter().position(|r| r.group == *group)?;
        Some(self.inner.remove(pos))
    }

    /// Removes every record, returning them in table order.
    pub(crate) fn drain(&mut self) -> Vec<GroupRecord> {
        std::mem::take(&mut self.inner)
    }
}
