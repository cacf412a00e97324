//! Configuration for the address subsystem.
//!
//! Loads interface and subsystem settings from TOML files. Everything the
//! core owns is rebuilt from this configuration at interface bring-up.

use crate::error::{AddrError, Result};
use crate::policy::PolicyEntry;
use crate::types::{AddressSource, InterfaceId, SourcePreferences};
use meshaddr_types::{Ipv6Address, Scope};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Default length of one fast tick in milliseconds.
pub const DEFAULT_FAST_TICK_MS: u64 = 100;

/// Per-scope zone index override.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneConfig {
    /// Scope value (1-15).
    pub scope: u8,
    /// Zone index for that scope.
    pub index: u32,
}

/// Address seeded when the interface is brought up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticAddressConfig {
    pub address: Ipv6Address,

    #[serde(default = "default_prefix_len")]
    pub prefix_len: u8,

    #[serde(default = "default_static_source")]
    pub source: AddressSource,

    /// Valid lifetime in seconds; absent means infinite
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_lifetime: Option<u32>,

    /// Preferred lifetime in seconds; absent means infinite
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_lifetime: Option<u32>,

    #[serde(default)]
    pub skip_dad: bool,

    /// Replace the low 64 bits with an RFC 7217 opaque identifier
    #[serde(default)]
    pub opaque_iid: bool,

    #[serde(default)]
    pub temporary: bool,
}

/// Per-interface configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceConfig {
    pub id: InterfaceId,

    /// Interface name, preferred over the numeric id as opaque IID input
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Number of Neighbor Solicitation probes sent during DAD
    #[serde(default = "default_dad_transmits")]
    pub dad_transmits: u8,

    /// Interval between DAD probes in milliseconds
    #[serde(default = "default_retrans_timer_ms")]
    pub retrans_timer_ms: u32,

    /// Lower bound of the random initial join delay, in fast ticks
    #[serde(default = "default_dad_delay_min_ticks")]
    pub dad_delay_min_ticks: u16,

    /// Upper bound of the random initial join delay, in fast ticks
    #[serde(default = "default_dad_delay_max_ticks")]
    pub dad_delay_max_ticks: u16,

    #[serde(default)]
    pub zones: Vec<ZoneConfig>,

    #[serde(default)]
    pub static_addresses: Vec<StaticAddressConfig>,
}

/// Complete address subsystem configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubsystemConfig {
    /// Fast tick period in milliseconds (DAD progression)
    #[serde(default = "default_fast_tick_ms")]
    pub fast_tick_ms: u64,

    /// Slow tick period in milliseconds (lifetime countdown)
    #[serde(default = "default_slow_tick_ms")]
    pub slow_tick_ms: u64,

    /// Secret key for opaque IID generation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opaque_secret_key: Option<Vec<u8>>,

    /// Fixed IID used instead of hashing until the first DAD failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opaque_initial_iid: Option<[u8; 8]>,

    /// Preferences used when the daemon selects source addresses
    #[serde(default)]
    pub preferences: SourcePreferences,

    /// Entries added on top of the RFC 6724 default policy table
    #[serde(default)]
    pub policy_entries: Vec<PolicyEntry>,

    #[serde(default)]
    pub interfaces: Vec<InterfaceConfig>,
}

// Default functions
fn default_prefix_len() -> u8 {
    64
}

fn default_static_source() -> AddressSource {
    AddressSource::Manual
}

fn default_dad_transmits() -> u8 {
    1
}

fn default_retrans_timer_ms() -> u32 {
    1000
}

fn default_dad_delay_min_ticks() -> u16 {
    1
}

fn default_dad_delay_max_ticks() -> u16 {
    10
}

fn default_fast_tick_ms() -> u64 {
    DEFAULT_FAST_TICK_MS
}

fn default_slow_tick_ms() -> u64 {
    1000
}

impl Default for SubsystemConfig {
    fn default() -> Self {
        Self {
            fast_tick_ms: default_fast_tick_ms(),
            slow_tick_ms: default_slow_tick_ms(),
            opaque_secret_key: None,
            opaque_initial_iid: None,
            preferences: SourcePreferences::default(),
            policy_entries: Vec::new(),
            interfaces: Vec::new(),
        }
    }
}

impl StaticAddressConfig {
    pub fn new(address: Ipv6Address, prefix_len: u8) -> Self {
        Self {
            address,
            prefix_len,
            source: default_static_source(),
            valid_lifetime: None,
            preferred_lifetime: None,
            skip_dad: false,
            opaque_iid: false,
            temporary: false,
        }
    }
}

impl InterfaceConfig {
    /// Creates a configuration with default DAD parameters.
    pub fn new(id: InterfaceId) -> Self {
        Self {
            id,
            name: None,
            dad_transmits: default_dad_transmits(),
            retrans_timer_ms: default_retrans_timer_ms(),
            dad_delay_min_ticks: default_dad_delay_min_ticks(),
            dad_delay_max_ticks: default_dad_delay_max_ticks(),
            zones: Vec::new(),
            static_addresses: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Retransmission interval rounded to fast ticks of `fast_tick_ms`,
    /// never below one tick.
    pub fn retrans_ticks(&self, fast_tick_ms: u64) -> u16 {
        let tick = fast_tick_ms.max(1);
        let ticks = (u64::from(self.retrans_timer_ms) + tick / 2) / tick;
        u16::try_from(ticks).unwrap_or(u16::MAX).max(1)
    }

    /// Zone index of this interface for `scope`.
    ///
    /// Interface-local and link-local zones are the interface itself; every
    /// wider scope defaults to the single zone 0 unless overridden.
    pub fn zone_index(&self, scope: Scope) -> u32 {
        if let Some(zone) = self.zones.iter().find(|z| z.scope == scope.value()) {
            return zone.index;
        }
        if scope <= Scope::LINK_LOCAL {
            self.id.0
        } else {
            0
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.dad_delay_min_ticks > self.dad_delay_max_ticks {
            return Err(AddrError::invalid_config(
                "dad_delay_min_ticks",
                format!(
                    "interface {}: {} exceeds dad_delay_max_ticks {}",
                    self.id, self.dad_delay_min_ticks, self.dad_delay_max_ticks
                ),
            ));
        }

        for zone in &self.zones {
            if zone.scope == 0 || zone.scope > 0x0f {
                return Err(AddrError::invalid_config(
                    "zones.scope",
                    format!("interface {}: scope {} must be 1-15", self.id, zone.scope),
                ));
            }
        }

        for entry in &self.static_addresses {
            if entry.prefix_len > 128 {
                return Err(AddrError::invalid_config(
                    "static_addresses.prefix_len",
                    format!("{}: {} must be 0-128", entry.address, entry.prefix_len),
                ));
            }
        }

        Ok(())
    }
}

impl SubsystemConfig {
    /// Load configuration from file, falling back to defaults if file not found
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        match fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| {
                AddrError::invalid_config(
                    path.display().to_string(),
                    format!("failed to parse: {}", e),
                )
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "Config file not found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(AddrError::invalid_config(
                path.display().to_string(),
                e.to_string(),
            )),
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)
            .map_err(|e| AddrError::invalid_config("config", format!("failed to serialize: {}", e)))?;

        fs::write(path, content)
            .map_err(|e| AddrError::invalid_config(path.display().to_string(), e.to_string()))
    }

    /// Get fast tick period as Duration
    pub fn fast_tick(&self) -> Duration {
        Duration::from_millis(self.fast_tick_ms)
    }

    /// Get slow tick period as Duration
    pub fn slow_tick(&self) -> Duration {
        Duration::from_millis(self.slow_tick_ms)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.fast_tick_ms == 0 {
            return Err(AddrError::invalid_config("fast_tick_ms", "must be > 0"));
        }
        if self.slow_tick_ms == 0 {
            return Err(AddrError::invalid_config("slow_tick_ms", "must be > 0"));
        }
        if matches!(&self.opaque_secret_key, Some(key) if key.is_empty()) {
            return Err(AddrError::invalid_config(
                "opaque_secret_key",
                "must not be empty when present",
            ));
        }

        let mut seen = HashSet::new();
        for iface in &self.interfaces {
            if !seen.insert(iface.id) {
                return Err(AddrError::invalid_config(
                    "interfaces.id",
                    format!("duplicate interface id {}", iface.id),
                ));
            }
            iface.validate()?;
        }

        Ok(())
    }
}
