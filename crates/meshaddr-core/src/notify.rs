//! Address lifecycle notifications.
//!
//! Notifications are raised by the interface, queued, and delivered
//! synchronously before the entry point that caused them returns. Each one
//! carries a snapshot of the record, so a handler never holds a reference
//! into the address table: the record may already be gone by the time a
//! queued notification is delivered.

use crate::address::AddressRecord;
use crate::interface::Interface;
use crate::types::{AddressHandle, InterfaceId, OwnerId};
use meshaddr_types::Ipv6Address;
use std::fmt;
use tracing::debug;

/// Lifecycle transition being reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressEvent {
    /// DAD finished (or was skipped); the address is assigned.
    DadComplete,
    /// A duplicate was detected; the record is deleted right after.
    DadFailed,
    /// The owner-armed state timer expired.
    Timer,
    /// Preferred lifetime reached zero.
    Deprecated,
    /// Valid lifetime reached zero; the record is deleted right after.
    Invalidated,
    /// The record was removed from its interface.
    Deleted,
}

impl fmt::Display for AddressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AddressEvent::DadComplete => "dad-complete",
            AddressEvent::DadFailed => "dad-failed",
            AddressEvent::Timer => "timer",
            AddressEvent::Deprecated => "deprecated",
            AddressEvent::Invalidated => "invalidated",
            AddressEvent::Deleted => "deleted",
        };
        f.write_str(name)
    }
}

/// A notification with the state of the record when it was raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressNotification {
    pub interface: InterfaceId,
    pub event: AddressEvent,
    pub record: AddressRecord,
}

impl AddressNotification {
    pub fn handle(&self) -> AddressHandle {
        self.record.handle()
    }

    pub fn address(&self) -> &Ipv6Address {
        self.record.address()
    }
}

/// Receives address notifications.
///
/// Handlers run synchronously and may mutate the interface, including
/// deleting the record being reported. Notifications raised by a handler
/// are queued and delivered after the current one. Group membership is
/// changed with [`Interface::request_join`] and [`Interface::request_leave`],
/// which the subsystem carries out with zone checks after delivery.
pub trait AddressObserver {
    fn on_address_event(&mut self, interface: &mut Interface, notification: &AddressNotification);
}

impl<F> AddressObserver for F
where
    F: FnMut(&mut Interface, &AddressNotification),
{
    fn on_address_event(&mut self, interface: &mut Interface, notification: &AddressNotification) {
        self(interface, notification)
    }
}

/// Observer list plus the per-record owner dispatch table.
#[derive(Default)]
pub struct Dispatcher {
    observers: Vec<Box<dyn AddressObserver>>,
    owners: Vec<Box<dyn AddressObserver>>,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("observers", &self.observers.len())
            .field("owners", &self.owners.len())
            .finish()
    }
}

impl Dispatcher {
    /// Adds an observer that sees every notification of every interface.
    pub fn register(&mut self, observer: Box<dyn AddressObserver>) {
        self.observers.push(observer);
    }

    /// Adds an owner that records can be bound to.
    pub fn register_owner(&mut self, owner: Box<dyn AddressObserver>) -> OwnerId {
        self.owners.push(owner);
        OwnerId(self.owners.len() - 1)
    }

    /// Delivers to every observer, then to the record's owner.
    pub fn deliver(&mut self, interface: &mut Interface, notification: &AddressNotification) {
        debug!(
            interface = %notification.interface,
            address = %notification.address(),
            event = %notification.event,
            "Delivering address notification"
        );

        for observer in &mut self.observers {
            observer.on_address_event(interface, notification);
        }

        if let Some(owner) = notification.record.owner() {
            if let Some(handler) = self.owners.get_mut(owner.0) {
                handler.on_address_event(interface, notification);
            }
        }
    }
}
