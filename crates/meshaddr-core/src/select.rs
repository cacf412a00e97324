//! Default source address selection (RFC 6724 section 5).
//!
//! Candidates are compared pairwise: the best address seen so far (`a`)
//! against the next candidate (`b`). Each rule returns `Greater` when `a`
//! is preferred, `Less` when `b` is, and `Equal` to defer to the next rule.
//! On a full tie the first candidate in list order is kept.

use crate::address::AddressRecord;
use crate::policy::PolicyTable;
use crate::types::{LowpanPreference, SourcePreferences, TemporaryPreference};
use meshaddr_types::{Ipv6Address, Scope};
use std::cmp::Ordering;

/// Picks a source address for packets sent to `dest`.
///
/// Tentative records are never candidates. Returns `None` when no
/// candidate remains.
pub fn select_source<'a, I>(
    candidates: I,
    policy: &PolicyTable,
    dest: &Ipv6Address,
    prefs: SourcePreferences,
) -> Option<&'a AddressRecord>
where
    I: IntoIterator<Item = &'a AddressRecord>,
{
    let dest_scope = dest.scope();
    let dest_label = policy.lookup(dest).label;

    let mut best: Option<&AddressRecord> = None;
    for candidate in candidates.into_iter().filter(|r| !r.tentative) {
        // Rule 1: prefer same address
        if candidate.address == *dest {
            return Some(candidate);
        }
        best = match best {
            None => Some(candidate),
            Some(current) => {
                let order = rule_2(current.address.scope(), candidate.address.scope(), dest_scope)
                    .then_with(|| rule_3(current.is_deprecated(), candidate.is_deprecated()))
                    .then_with(|| {
                        rule_6(
                            policy.lookup(&current.address).label == dest_label,
                            policy.lookup(&candidate.address).label == dest_label,
                        )
                    })
                    .then_with(|| rule_7(current.temporary, candidate.temporary, prefs.temporary))
                    .then_with(|| rule_8(current, candidate, dest))
                    .then_with(|| lowpan_rule(&current.address, &candidate.address, prefs.lowpan))
                    .then_with(|| {
                        precedence_rule(
                            policy.lookup(&current.address).precedence,
                            policy.lookup(&candidate.address).precedence,
                        )
                    });
                keep_or_replace(current, candidate, order)
            }
        };
    }
    best
}

/// Picks an address inside `prefix/prefix_len`.
///
/// With no destination to match, scope preference is inverted to favor the
/// widest scope, precedence stands in for label matching, and longest
/// matching prefix does not apply.
pub fn select_with_prefix<'a, I>(
    candidates: I,
    policy: &PolicyTable,
    prefix: &Ipv6Address,
    prefix_len: u8,
    prefs: SourcePreferences,
) -> Option<&'a AddressRecord>
where
    I: IntoIterator<Item = &'a AddressRecord>,
{
    let mut best: Option<&AddressRecord> = None;
    for candidate in candidates
        .into_iter()
        .filter(|r| !r.tentative && r.address.matches_prefix(prefix, prefix_len))
    {
        best = match best {
            None => Some(candidate),
            Some(current) => {
                let order = current
                    .address
                    .scope()
                    .cmp(&candidate.address.scope())
                    .then_with(|| rule_3(current.is_deprecated(), candidate.is_deprecated()))
                    .then_with(|| {
                        precedence_rule(
                            policy.lookup(&current.address).precedence,
                            policy.lookup(&candidate.address).precedence,
                        )
                    })
                    .then_with(|| rule_7(current.temporary, candidate.temporary, prefs.temporary))
                    .then_with(|| lowpan_rule(&current.address, &candidate.address, prefs.lowpan));
                keep_or_replace(current, candidate, order)
            }
        };
    }
    best
}

fn keep_or_replace<'a>(
    current: &'a AddressRecord,
    candidate: &'a AddressRecord,
    order: Ordering,
) -> Option<&'a AddressRecord> {
    match order {
        Ordering::Less => Some(candidate),
        Ordering::Equal | Ordering::Greater => Some(current),
    }
}

// Rule 2: prefer appropriate scope. The smallest scope that still covers
// the destination wins; if neither does, the larger one.
fn rule_2(a: Scope, b: Scope, dest: Scope) -> Ordering {
    match a.cmp(&b) {
        Ordering::Less if a < dest => Ordering::Less,
        Ordering::Less => Ordering::Greater,
        Ordering::Greater if b < dest => Ordering::Greater,
        Ordering::Greater => Ordering::Less,
        Ordering::Equal => Ordering::Equal,
    }
}

// Rule 3: avoid deprecated addresses.
fn rule_3(a_deprecated: bool, b_deprecated: bool) -> Ordering {
    match (a_deprecated, b_deprecated) {
        (true, false) => Ordering::Less,
        (true, true) | (false, false) => Ordering::Equal,
        (false, true) => Ordering::Greater,
    }
}

// Rule 6: prefer matching label.
fn rule_6(a_matches: bool, b_matches: bool) -> Ordering {
    match (a_matches, b_matches) {
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        _ => Ordering::Equal,
    }
}

// Rule 7: prefer temporary or public addresses as requested.
fn rule_7(a_temporary: bool, b_temporary: bool, pref: TemporaryPreference) -> Ordering {
    if a_temporary == b_temporary {
        return Ordering::Equal;
    }
    let a_wins = match pref {
        TemporaryPreference::Temporary => a_temporary,
        TemporaryPreference::Public => !a_temporary,
    };
    if a_wins {
        Ordering::Greater
    } else {
        Ordering::Less
    }
}

// Rule 8: longest matching prefix, bounded by the source prefix length.
fn rule_8(a: &AddressRecord, b: &AddressRecord, dest: &Ipv6Address) -> Ordering {
    let a_len = a.address.common_prefix_len(dest).min(a.prefix_len);
    let b_len = b.address.common_prefix_len(dest).min(b.prefix_len);
    a_len.cmp(&b_len)
}

// Prefer or avoid IIDs carrying a 6LoWPAN short address.
fn lowpan_rule(a: &Ipv6Address, b: &Ipv6Address, pref: LowpanPreference) -> Ordering {
    let (a_short, b_short) = (a.is_lowpan_short(), b.is_lowpan_short());
    if a_short == b_short {
        return Ordering::Equal;
    }
    let a_wins = match pref {
        LowpanPreference::Short => a_short,
        LowpanPreference::Long => !a_short,
    };
    if a_wins {
        Ordering::Greater
    } else {
        Ordering::Less
    }
}

// Final tie-break: higher policy precedence.
fn precedence_rule(a: u8, b: u8) -> Ordering {
    a.cmp(&b)
}
