//! Recording fakes shared by the integration tests.

#![allow(dead_code)]

use meshaddr_core::{
    AddressEvent, AddressNotification, AddressObserver, AddressSubsystem, DadProber, GroupRecord,
    Interface, InterfaceConfig, InterfaceHooks, InterfaceId, Ipv6Address, MulticastListener,
};
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookCall {
    Start(InterfaceId, Ipv6Address),
    Stop(InterfaceId, Ipv6Address),
    Probe(InterfaceId, Ipv6Address),
}

/// Multicast listener and DAD prober that record every call.
#[derive(Clone, Default)]
pub struct RecordingHooks {
    pub calls: Rc<RefCell<Vec<HookCall>>>,
}

impl RecordingHooks {
    pub fn hooks(&self) -> InterfaceHooks {
        InterfaceHooks::new(Box::new(self.clone()), Box::new(self.clone()))
    }

    pub fn calls(&self) -> Vec<HookCall> {
        self.calls.borrow().clone()
    }

    pub fn starts(&self) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|c| matches!(c, HookCall::Start(..)))
            .count()
    }

    pub fn probes(&self) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|c| matches!(c, HookCall::Probe(..)))
            .count()
    }
}

impl MulticastListener for RecordingHooks {
    fn start_listening(&mut self, interface: InterfaceId, group: &mut GroupRecord) {
        group.last_reporter = true;
        self.calls
            .borrow_mut()
            .push(HookCall::Start(interface, *group.group()));
    }

    fn stop_listening(&mut self, interface: InterfaceId, group: &GroupRecord) {
        self.calls
            .borrow_mut()
            .push(HookCall::Stop(interface, *group.group()));
    }
}

impl DadProber for RecordingHooks {
    fn send_probe(&mut self, interface: InterfaceId, target: &Ipv6Address) {
        self.calls
            .borrow_mut()
            .push(HookCall::Probe(interface, *target));
    }
}

/// Observer recording `(tag, event, address)` for every notification.
#[derive(Clone)]
pub struct RecordingObserver {
    pub tag: &'static str,
    pub log: Rc<RefCell<Vec<(&'static str, AddressEvent, Ipv6Address)>>>,
}

impl RecordingObserver {
    pub fn new(tag: &'static str, log: &Rc<RefCell<Vec<(&'static str, AddressEvent, Ipv6Address)>>>) -> Self {
        Self {
            tag,
            log: Rc::clone(log),
        }
    }
}

impl AddressObserver for RecordingObserver {
    fn on_address_event(&mut self, _interface: &mut Interface, notification: &AddressNotification) {
        self.log
            .borrow_mut()
            .push((self.tag, notification.event, *notification.address()));
    }
}

pub type EventLog = Rc<RefCell<Vec<(&'static str, AddressEvent, Ipv6Address)>>>;

pub fn addr(s: &str) -> Ipv6Address {
    s.parse().unwrap()
}

/// Interface with one DAD probe, one-tick retransmission and a fixed
/// one-tick join delay.
pub fn fast_dad_config(id: u32) -> InterfaceConfig {
    let mut config = InterfaceConfig::new(InterfaceId(id));
    config.dad_transmits = 1;
    config.retrans_timer_ms = 100;
    config.dad_delay_min_ticks = 1;
    config.dad_delay_max_ticks = 1;
    config
}

/// Subsystem with one interface and a global observer.
pub fn subsystem_with_observer(id: u32) -> (AddressSubsystem, RecordingHooks, EventLog) {
    let mut subsystem = AddressSubsystem::new();
    let hooks = RecordingHooks::default();
    subsystem
        .add_interface(fast_dad_config(id), hooks.hooks())
        .unwrap();
    let log: EventLog = Rc::new(RefCell::new(Vec::new()));
    subsystem.notification_register(Box::new(RecordingObserver::new("observer", &log)));
    (subsystem, hooks, log)
}

pub fn events(log: &EventLog) -> Vec<AddressEvent> {
    log.borrow().iter().map(|(_, event, _)| *event).collect()
}
