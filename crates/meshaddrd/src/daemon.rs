//! Tick loop around the address subsystem.

use crate::hooks::logging_hooks;
use crate::observer::LoggingObserver;
use anyhow::{Context, Result};
use meshaddr_core::{AddressSubsystem, InterfaceId, Ipv6Address, SubsystemConfig};
use std::cell::Cell;
use std::future::Future;
use std::path::Path;
use std::rc::Rc;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info};

/// Counters reported when the loop stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickStats {
    pub fast_ticks: u64,
    pub slow_ticks: u64,
}

/// Address subsystem plus the timing settings that drive it.
#[derive(Debug)]
pub struct Daemon {
    config: SubsystemConfig,
    subsystem: AddressSubsystem,
    notifications: Rc<Cell<u64>>,
    stats: TickStats,
}

impl Daemon {
    /// Loads `path` (defaults when absent) and brings the daemon up.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config = SubsystemConfig::load_or_default(path)
            .with_context(|| format!("loading {}", path.display()))?;
        Self::new(config)
    }

    /// Brings every configured interface up and seeds its static addresses.
    pub fn new(config: SubsystemConfig) -> Result<Self> {
        let mut subsystem =
            AddressSubsystem::from_config(&config, logging_hooks).context("building subsystem")?;

        let observer = LoggingObserver::new();
        let notifications = observer.counter();
        subsystem.notification_register(Box::new(observer));

        let seeded = subsystem
            .seed_static_addresses()
            .context("seeding static addresses")?;
        info!(
            interfaces = config.interfaces.len(),
            seeded,
            policy_entries = subsystem.policy_entries().len(),
            opaque_key = subsystem.opaque_iid_key_is_set(),
            "Address subsystem ready"
        );

        Ok(Self {
            config,
            subsystem,
            notifications,
            stats: TickStats::default(),
        })
    }

    pub fn config(&self) -> &SubsystemConfig {
        &self.config
    }

    pub fn subsystem(&self) -> &AddressSubsystem {
        &self.subsystem
    }

    pub fn subsystem_mut(&mut self) -> &mut AddressSubsystem {
        &mut self.subsystem
    }

    pub fn stats(&self) -> TickStats {
        self.stats
    }

    /// Number of notifications delivered since start-up.
    pub fn notifications(&self) -> u64 {
        self.notifications.get()
    }

    /// Source address for `dest` using the configured preferences.
    pub fn select_source(&self, id: InterfaceId, dest: &Ipv6Address) -> Option<Ipv6Address> {
        self.subsystem
            .select_source(id, dest, self.config.preferences)
    }

    /// Runs the fast and slow ticks until `shutdown` completes.
    pub async fn run<F>(&mut self, shutdown: F) -> TickStats
    where
        F: Future<Output = ()>,
    {
        let mut fast = time::interval(self.config.fast_tick());
        let mut slow = time::interval(self.config.slow_tick());
        fast.set_missed_tick_behavior(MissedTickBehavior::Burst);
        slow.set_missed_tick_behavior(MissedTickBehavior::Burst);
        // both intervals fire immediately; skip that so a tick is a full period
        fast.tick().await;
        slow.tick().await;

        tokio::pin!(shutdown);
        info!(
            fast_tick_ms = self.config.fast_tick_ms,
            slow_tick_ms = self.config.slow_tick_ms,
            "Tick loop started"
        );

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
                _ = fast.tick() => {
                    self.subsystem.fast_tick(1);
                    self.stats.fast_ticks += 1;
                }
                _ = slow.tick() => {
                    self.subsystem.slow_tick(1);
                    self.stats.slow_ticks += 1;
                    debug!(slow_ticks = self.stats.slow_ticks, "Lifetimes aged");
                }
            }
        }

        self.stats
    }

    /// Removes every interface, firing the final notifications.
    pub fn shutdown(&mut self) -> Result<()> {
        for id in self.subsystem.interface_ids() {
            self.subsystem
                .remove_interface(id)
                .with_context(|| format!("removing interface {}", id))?;
        }
        info!(
            fast_ticks = self.stats.fast_ticks,
            slow_ticks = self.stats.slow_ticks,
            notifications = self.notifications(),
            "Address subsystem stopped"
        );
        Ok(())
    }
}
