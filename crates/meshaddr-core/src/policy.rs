//! RFC 6724 address selection policy table.
//!
//! Entries are kept longest-prefix-first so a linear scan returns the
//! longest match. The `::/0` entry is always present, which makes
//! [`PolicyTable::lookup`] total.

use crate::error::{AddrError, Result};
use meshaddr_types::{Ipv6Address, Ipv6Prefix};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One policy table row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyEntry {
    pub prefix: Ipv6Prefix,
    pub precedence: u8,
    pub label: u8,
}

impl PolicyEntry {
    pub const fn new(prefix: Ipv6Prefix, precedence: u8, label: u8) -> Self {
        Self {
            prefix,
            precedence,
            label,
        }
    }
}

const DEFAULT_ENTRY: PolicyEntry = PolicyEntry::new(Ipv6Prefix::default_route(), 40, 1);

/// RFC 6724 Table 2 as (prefix, precedence, label).
const DEFAULT_POLICY: [(&str, u8, u8); 9] = [
    ("::1/128", 50, 0),
    ("::/0", 40, 1),
    ("::ffff:0:0/96", 35, 4),
    ("2002::/16", 30, 2),
    ("2001::/32", 5, 5),
    ("fc00::/7", 3, 13),
    ("::/96", 1, 3),
    ("fec0::/10", 1, 11),
    ("3ffe::/16", 1, 12),
];

/// Ordered policy table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyTable {
    entries: Vec<PolicyEntry>,
}

impl Default for PolicyTable {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl PolicyTable {
    /// Creates a table holding only the `::/0` entry.
    pub fn new() -> Self {
        Self {
            entries: vec![DEFAULT_ENTRY],
        }
    }

    /// Creates a table seeded with the RFC 6724 default policy.
    pub fn with_defaults() -> Self {
        let mut table = Self { entries: Vec::new() };
        for (prefix, precedence, label) in DEFAULT_POLICY {
            if let Ok(prefix) = prefix.parse() {
                // the default rows are distinct, so insert cannot fail
                let _ = table.insert(PolicyEntry::new(prefix, precedence, label));
            }
        }
        if !table.entries.iter().any(|e| e.prefix.is_default()) {
            table.entries.push(DEFAULT_ENTRY);
        }
        table
    }

    /// Inserts an entry, keeping longest-prefix-first order.
    ///
    /// Entries with equal prefix length keep insertion order.
    pub fn insert(&mut self, entry: PolicyEntry) -> Result<()> {
        if self.entries.iter().any(|e| e.prefix == entry.prefix) {
            return Err(AddrError::PolicyExists {
                prefix: entry.prefix,
            });
        }

        let pos = self
            .entries
            .iter()
            .position(|e| e.prefix.prefix_len() < entry.prefix.prefix_len())
            .unwrap_or(self.entries.len());
        self.entries.insert(pos, entry);
        debug!(prefix = %entry.prefix, precedence = entry.precedence, label = entry.label, "Policy entry added");
        Ok(())
    }

    /// Removes the entry for exactly `prefix`.
    pub fn delete(&mut self, prefix: &Ipv6Prefix) -> Result<PolicyEntry> {
        if prefix.is_default() {
            return Err(AddrError::DefaultPolicyRequired);
        }
        let pos = self
            .entries
            .iter()
            .position(|e| e.prefix == *prefix)
            .ok_or(AddrError::PolicyNotFound { prefix: *prefix })?;
        let entry = self.entries.remove(pos);
        debug!(prefix = %prefix, "Policy entry removed");
        Ok(entry)
    }

    /// Longest-prefix match for `addr`.
    pub fn lookup(&self, addr: &Ipv6Address) -> &PolicyEntry {
        self.entries
            .iter()
            .find(|e| e.prefix.contains(addr))
            .unwrap_or(&DEFAULT_ENTRY)
    }

    pub fn entries(&self) -> &[PolicyEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
