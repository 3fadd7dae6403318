//! Deterministic iteration over a configuration and splicing one
//! configuration into another.

use std::collections::BTreeSet;
use std::fmt;

use tracing::debug;

use crate::query::profile::{record_slot_event, SlotEvent};
use crate::query::slots::aliases::AliasGraph;
use crate::query::slots::{Slot, SlotConfiguration, SlotConfigurationSize, SlotKey};
use crate::types::Result;

/// A root slot together with the names aliasing it.
#[derive(Clone, Copy, Debug)]
pub struct SlotWithKeyAndAliases<'a> {
    /// Owning key. Never an alias.
    pub key: &'a SlotKey,
    /// The slot.
    pub slot: &'a Slot,
    /// Aliases of a variable key; empty for other keys.
    pub aliases: &'a BTreeSet<String>,
}

impl SlotConfiguration {
    fn roots(&self) -> impl Iterator<Item = SlotWithKeyAndAliases<'_>> {
        self.slots.iter().filter_map(|(key, slot)| {
            let aliases = match key {
                SlotKey::Variable(name) if self.aliases.is_alias(name) => return None,
                SlotKey::Variable(name) => self.aliases.aliases_of(name),
                _ => AliasGraph::empty(),
            };
            Some(SlotWithKeyAndAliases { key, slot, aliases })
        })
    }

    /// Visits every non-alias key and its slot, in no particular order.
    pub fn foreach_slot(&self, mut f: impl FnMut(&SlotKey, &Slot)) {
        for entry in self.roots() {
            f(entry.key, entry.slot);
        }
    }

    /// Visits every non-alias key with its slot and aliases, in no
    /// particular order.
    pub fn foreach_slot_and_aliases(&self, mut f: impl FnMut(SlotWithKeyAndAliases<'_>)) {
        for entry in self.roots() {
            f(entry);
        }
    }

    /// Non-alias slots in canonical order: long slots, then reference slots,
    /// each by increasing offset. Slots whose offset is below the matching
    /// count of `skip_first` are left out.
    pub fn slots_and_aliases_ordered(
        &self,
        skip_first: SlotConfigurationSize,
    ) -> Vec<SlotWithKeyAndAliases<'_>> {
        let mut entries: Vec<_> = self
            .roots()
            .filter(|entry| entry.slot.offset() >= skip_first.of(entry.slot.kind()))
            .collect();
        entries.sort_by_key(|entry| (!entry.slot.is_long(), entry.slot.offset()));
        entries
    }

    /// Visits non-alias slots in the order of
    /// [`slots_and_aliases_ordered`](Self::slots_and_aliases_ordered).
    pub fn foreach_slot_and_aliases_ordered(
        &self,
        skip_first: SlotConfigurationSize,
        mut f: impl FnMut(SlotWithKeyAndAliases<'_>),
    ) {
        for entry in self.slots_and_aliases_ordered(skip_first) {
            f(entry);
        }
    }

    /// Slots, aliases included, whose key and slot satisfy `predicate`.
    pub fn filter_slots(&self, mut predicate: impl FnMut(&SlotKey, &Slot) -> bool) -> Vec<&Slot> {
        self.slots
            .iter()
            .filter(|(key, slot)| predicate(key, slot))
            .map(|(_, slot)| slot)
            .collect()
    }

    /// Root variable name stored at `offset` of the long or reference array.
    pub fn name_of_slot(&self, offset: usize, is_long: bool) -> Option<&str> {
        self.roots()
            .filter(|entry| entry.slot.offset() == offset && entry.slot.is_long() == is_long)
            .find_map(|entry| entry.key.as_variable())
    }

    /// Replays this configuration's slots into `other` in canonical order.
    ///
    /// Variables are re-allocated with their aliases, cached properties are
    /// always duplicated, arguments and metadata go through their own
    /// allocators. Slots below `skip_first` are not copied.
    pub fn add_all_slots_in_order_to(
        &self,
        other: &mut SlotConfiguration,
        skip_first: SlotConfigurationSize,
    ) -> Result<()> {
        other.ensure_mutable("add slots")?;
        let entries = self.slots_and_aliases_ordered(skip_first);
        debug!(
            count = entries.len(),
            skip_longs = skip_first.n_longs,
            skip_refs = skip_first.n_references,
            "slots.splice"
        );
        record_slot_event(SlotEvent::Splice);
        for entry in entries {
            match entry.key {
                SlotKey::Variable(name) => {
                    match entry.slot {
                        Slot::Long { nullable, ty, .. } => {
                            other.new_long(name, *nullable, ty.clone())?;
                        }
                        Slot::Ref { nullable, ty, .. } => {
                            other.new_reference(name, *nullable, ty.clone())?;
                        }
                    }
                    for alias in entry.aliases {
                        other.add_alias(alias, name)?;
                    }
                }
                SlotKey::CachedProperty(key) => {
                    other.new_cached_property(key.clone(), true)?;
                }
                SlotKey::MetaData(name) => {
                    other.new_meta_data(name)?;
                }
                SlotKey::ApplyArgument(plan) => {
                    other.new_argument(*plan)?;
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for SlotConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SlotConfiguration(longs={}, refs={})",
            self.number_of_longs(),
            self.number_of_references()
        )?;
        for entry in self.slots_and_aliases_ordered(SlotConfigurationSize::ZERO) {
            write!(f, "\n  {} -> {}", entry.key, entry.slot)?;
            if !entry.aliases.is_empty() {
                let names: Vec<&str> = entry.aliases.iter().map(String::as_str).collect();
                write!(f, " aka {}", names.join(", "))?;
            }
        }
        for offset in self.reserved_reference_offsets() {
            write!(f, "\n  <reserved> -> RefSlot({offset})")?;
        }
        Ok(())
    }
}
