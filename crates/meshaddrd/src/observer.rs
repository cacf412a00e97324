//! Notification observer that logs every lifecycle event.

use meshaddr_core::{AddressEvent, AddressNotification, AddressObserver, Interface};
use std::cell::Cell;
use std::rc::Rc;
use tracing::{info, warn};

/// Logs notifications and keeps a running count shared with the daemon.
#[derive(Debug, Clone, Default)]
pub struct LoggingObserver {
    delivered: Rc<Cell<u64>>,
}

impl LoggingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle to the number of notifications seen so far.
    pub fn counter(&self) -> Rc<Cell<u64>> {
        Rc::clone(&self.delivered)
    }
}

impl AddressObserver for LoggingObserver {
    fn on_address_event(&mut self, interface: &mut Interface, notification: &AddressNotification) {
        self.delivered.set(self.delivered.get() + 1);
        let record = &notification.record;
        match notification.event {
            AddressEvent::DadFailed => warn!(
                interface = %notification.interface,
                address = %record.address(),
                dad_failures = interface.dad_failures(),
                "Address event: {}",
                notification.event
            ),
            event => info!(
                interface = %notification.interface,
                address = %record.address(),
                prefix_len = record.prefix_len(),
                source = %record.source(),
                valid = %record.valid_lifetime(),
                preferred = %record.preferred_lifetime(),
                "Address event: {}",
                event
            ),
        }
    }
}
