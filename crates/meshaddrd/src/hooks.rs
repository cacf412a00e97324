//! Collaborator hooks that report MLD and Neighbor Solicitation call-outs
//! through `tracing` instead of touching the network.

use meshaddr_core::{
    DadProber, GroupRecord, InterfaceConfig, InterfaceHooks, InterfaceId, Ipv6Address,
    MulticastListener,
};
use tracing::info;

/// Logs group membership changes and marks this node as the last reporter.
#[derive(Debug, Clone)]
pub struct LoggingListener {
    name: String,
}

impl MulticastListener for LoggingListener {
    fn start_listening(&mut self, interface: InterfaceId, group: &mut GroupRecord) {
        group.last_reporter = true;
        info!(interface = %interface, name = %self.name, group = %group.group(), "MLD report");
    }

    fn stop_listening(&mut self, interface: InterfaceId, group: &GroupRecord) {
        info!(
            interface = %interface,
            name = %self.name,
            group = %group.group(),
            last_reporter = group.last_reporter,
            "MLD done"
        );
    }
}

/// Logs every DAD probe and counts them.
#[derive(Debug, Clone)]
pub struct LoggingProber {
    name: String,
    sent: u64,
}

impl DadProber for LoggingProber {
    fn send_probe(&mut self, interface: InterfaceId, target: &Ipv6Address) {
        self.sent += 1;
        info!(
            interface = %interface,
            name = %self.name,
            target = %target,
            solicited = %target.solicited_node(),
            sent = self.sent,
            "Neighbor Solicitation (DAD)"
        );
    }
}

/// Builds the logging hooks for one configured interface.
pub fn logging_hooks(config: &InterfaceConfig) -> InterfaceHooks {
    let name = config
        .name
        .clone()
        .unwrap_or_else(|| format!("if{}", config.id));
    InterfaceHooks::new(
        Box::new(LoggingListener { name: name.clone() }),
        Box::new(LoggingProber { name, sent: 0 }),
    )
}
