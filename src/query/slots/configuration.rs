//! Build-time registry mapping slot keys to physical slots.

use std::collections::BTreeSet;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use crate::query::cypher_type::CypherType;
use crate::query::profile::{record_slot_event, SlotEvent};
use crate::query::slots::accessors::{
    AccessorRegistry, Getter, PrimitiveSetter, SlotAccessors, Setter,
};
use crate::query::slots::aliases::AliasGraph;
use crate::query::slots::key::{CachedPropertyKey, SlotKey};
use crate::query::slots::slot::{Slot, SlotConfigurationSize, SlotKind};
use crate::types::{PlanId, Result, SlotError};

/// Long offset of the top-level argument, which is never allocated.
pub const TOP_LEVEL_ARGUMENT_OFFSET: usize = 0;

/// Finalized configuration shared between compiled operators.
pub type SharedSlots = Arc<SlotConfiguration>;

/// Maps keys to slots for one pipeline of a physical plan.
///
/// Long and reference offsets are dense: every offset below the matching
/// counter is either mapped by a key or listed in
/// [`reserved_reference_offsets`](Self::reserved_reference_offsets). The
/// reserved cells come from duplicated cached properties and are reachable
/// only by raw offset, never by key lookup.
///
/// A configuration is built by one planner thread, then [finalized](Self::finalize).
/// Every mutator fails with [`SlotError::Finalized`] afterwards.
#[derive(Clone, Debug, Default)]
pub struct SlotConfiguration {
    pub(super) slots: FxHashMap<SlotKey, Slot>,
    pub(super) aliases: AliasGraph,
    cached_property_offsets: Vec<usize>,
    reserved_references: Vec<usize>,
    accessors: AccessorRegistry,
    number_of_longs: usize,
    number_of_references: usize,
    finalized: bool,
}

impl SlotConfiguration {
    /// Creates an empty configuration.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Creates an empty configuration with room for `capacity` keys.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
            ..Self::default()
        }
    }

    /// Number of long slots.
    pub fn number_of_longs(&self) -> usize {
        self.number_of_longs
    }

    /// Number of reference slots, reserved cells included.
    pub fn number_of_references(&self) -> usize {
        self.number_of_references
    }

    /// Dimensions of a row built from this configuration.
    pub fn size(&self) -> SlotConfigurationSize {
        SlotConfigurationSize::new(self.number_of_longs, self.number_of_references)
    }

    /// Whether the configuration has been finalized.
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Marks the configuration read-only. Calling it again has no effect.
    pub fn finalize(&mut self) {
        if !self.finalized {
            debug!(
                longs = self.number_of_longs,
                refs = self.number_of_references,
                "slots.finalize"
            );
            self.finalized = true;
        }
    }

    /// Finalizes and moves the configuration behind an `Arc`.
    pub fn freeze(mut self) -> SharedSlots {
        self.finalize();
        Arc::new(self)
    }

    /// Independent, mutable copy. The copy is never finalized.
    pub fn copy(&self) -> Self {
        record_slot_event(SlotEvent::Copy);
        let mut copy = self.clone();
        copy.finalized = false;
        copy
    }

    pub(super) fn ensure_mutable(&self, operation: &'static str) -> Result<()> {
        if self.finalized {
            return Err(SlotError::Finalized { operation });
        }
        Ok(())
    }

    /// Allocates, or widens, a long slot for variable `key`.
    ///
    /// `ty` must be [`CypherType::Node`] or [`CypherType::Relationship`].
    pub fn new_long(&mut self, key: &str, nullable: bool, ty: CypherType) -> Result<&mut Self> {
        self.ensure_mutable("allocate a long slot")?;
        let requested = Slot::long(self.number_of_longs, nullable, ty)?;
        self.allocate_variable(key, requested)
    }

    /// Allocates, or widens, a reference slot for variable `key`.
    pub fn new_reference(
        &mut self,
        key: &str,
        nullable: bool,
        ty: CypherType,
    ) -> Result<&mut Self> {
        self.ensure_mutable("allocate a reference slot")?;
        let requested = Slot::reference(self.number_of_references, nullable, ty);
        self.allocate_variable(key, requested)
    }

    fn allocate_variable(&mut self, key: &str, requested: Slot) -> Result<&mut Self> {
        let slot_key = SlotKey::variable(key);
        let Some(existing) = self.slots.get(&slot_key) else {
            trace!(var = key, slot = %requested, "slots.allocate");
            match requested.kind() {
                SlotKind::Long => {
                    self.number_of_longs += 1;
                    record_slot_event(SlotEvent::LongAlloc);
                }
                SlotKind::Ref => {
                    self.number_of_references += 1;
                    record_slot_event(SlotEvent::RefAlloc);
                }
            }
            self.slots.insert(slot_key, requested);
            self.aliases.add_root(key);
            return Ok(self);
        };
        let conflict = || SlotError::TypeConflict {
            key: key.to_owned(),
            existing: existing.to_string(),
            requested: requested.to_string(),
        };
        if !existing.is_type_compatible_with(&requested) {
            return Err(conflict());
        }
        let widened = existing.unify(&requested).ok_or_else(conflict)?;
        if widened != *existing {
            trace!(var = key, from = %existing, to = %widened, "slots.widen");
            record_slot_event(SlotEvent::Widen);
            for member in self.aliases.group_of(key)? {
                self.slots.insert(SlotKey::Variable(member), widened.clone());
            }
        }
        Ok(self)
    }

    /// Allocates a slot caching one property read.
    ///
    /// With `should_duplicate` and an existing slot for `key`, one reference
    /// cell is reserved without a key so that bulk row copies get a
    /// physically distinct cell.
    pub fn new_cached_property(
        &mut self,
        key: CachedPropertyKey,
        should_duplicate: bool,
    ) -> Result<&mut Self> {
        self.ensure_mutable("allocate a cached property slot")?;
        let slot_key = SlotKey::CachedProperty(key);
        if self.slots.contains_key(&slot_key) {
            if should_duplicate {
                trace!(key = %slot_key, offset = self.number_of_references, "slots.reserve");
                record_slot_event(SlotEvent::CachedPropertyDuplicate);
                self.reserved_references.push(self.number_of_references);
                self.number_of_references += 1;
            }
            return Ok(self);
        }
        let offset = self.number_of_references;
        trace!(key = %slot_key, offset, "slots.cached_property");
        record_slot_event(SlotEvent::CachedProperty);
        self.slots
            .insert(slot_key, Slot::reference(offset, false, CypherType::Any));
        self.cached_property_offsets.push(offset);
        self.number_of_references += 1;
        Ok(self)
    }

    /// Allocates the argument long slot for the `Apply` identified by `plan`.
    ///
    /// [`PlanId::NONE`] is the top-level scope and allocates nothing.
    pub fn new_argument(&mut self, plan: PlanId) -> Result<&mut Self> {
        self.ensure_mutable("allocate an argument slot")?;
        if plan.is_none() {
            return Ok(self);
        }
        let slot_key = SlotKey::ApplyArgument(plan);
        if self.slots.contains_key(&slot_key) {
            return Err(SlotError::DoubleArgument { plan });
        }
        trace!(plan = plan.0, offset = self.number_of_longs, "slots.argument");
        record_slot_event(SlotEvent::Argument);
        self.slots
            .insert(slot_key, Slot::argument(self.number_of_longs));
        self.number_of_longs += 1;
        Ok(self)
    }

    /// Allocates a metadata slot. Repeated calls keep the first slot.
    pub fn new_meta_data(&mut self, key: &str) -> Result<&mut Self> {
        self.ensure_mutable("allocate a metadata slot")?;
        let slot_key = SlotKey::MetaData(key.to_owned());
        if !self.slots.contains_key(&slot_key) {
            record_slot_event(SlotEvent::MetaData);
            self.slots.insert(
                slot_key,
                Slot::reference(self.number_of_references, true, CypherType::Any),
            );
            self.number_of_references += 1;
        }
        Ok(self)
    }

    /// Binds `new_key` to the slot of `existing_key`.
    ///
    /// The alias is recorded under the root of `existing_key`. Rebinding a
    /// name that already owns a different slot is a type conflict.
    pub fn add_alias(&mut self, new_key: &str, existing_key: &str) -> Result<&mut Self> {
        self.ensure_mutable("add an alias")?;
        let slot = self
            .slots
            .get(&SlotKey::variable(existing_key))
            .cloned()
            .ok_or_else(|| SlotError::unknown(SlotKey::variable(existing_key)))?;
        let new_slot_key = SlotKey::variable(new_key);
        if let Some(current) = self.slots.get(&new_slot_key) {
            if *current != slot {
                return Err(SlotError::TypeConflict {
                    key: new_key.to_owned(),
                    existing: current.to_string(),
                    requested: slot.to_string(),
                });
            }
            if !self.aliases.is_alias(new_key) && self.aliases.root_of(existing_key)? != new_key
            {
                return Err(SlotError::TypeConflict {
                    key: new_key.to_owned(),
                    existing: format!("root {current}"),
                    requested: format!("alias of '{existing_key}'"),
                });
            }
        }
        let root = self.aliases.add_alias(new_key, existing_key)?;
        trace!(alias = new_key, root = %root, "slots.alias");
        record_slot_event(SlotEvent::Alias);
        self.slots.insert(new_slot_key, slot);
        Ok(self)
    }

    /// True iff `key` is not a root of the alias graph.
    pub fn is_alias(&self, key: &str) -> bool {
        self.aliases.is_alias(key)
    }

    /// Aliases recorded for root variable `root`.
    pub fn get_aliases_for(&self, root: &str) -> &BTreeSet<String> {
        self.aliases.aliases_of(root)
    }

    /// Slot bound to variable `name`.
    pub fn get(&self, name: &str) -> Option<&Slot> {
        self.slots.get(&SlotKey::variable(name))
    }

    /// Slot bound to any key.
    pub fn get_slot(&self, key: &SlotKey) -> Option<&Slot> {
        self.slots.get(key)
    }

    /// Long offset of variable `name`.
    pub fn get_long_offset_for(&self, name: &str) -> Result<usize> {
        match self.get(name) {
            Some(Slot::Long { offset, .. }) => Ok(*offset),
            _ => Err(SlotError::unknown(format!("long slot '{name}'"))),
        }
    }

    /// Reference offset of variable `name`.
    pub fn get_reference_offset_for(&self, name: &str) -> Result<usize> {
        match self.get(name) {
            Some(Slot::Ref { offset, .. }) => Ok(*offset),
            _ => Err(SlotError::unknown(format!("reference slot '{name}'"))),
        }
    }

    /// Long offset of the argument injected by `plan`.
    pub fn get_argument_long_offset_for(&self, plan: PlanId) -> Result<usize> {
        if plan.is_none() {
            return Ok(TOP_LEVEL_ARGUMENT_OFFSET);
        }
        let key = SlotKey::ApplyArgument(plan);
        self.slots
            .get(&key)
            .map(Slot::offset)
            .ok_or_else(|| SlotError::unknown(key))
    }

    /// Reference offset of a cached property.
    pub fn get_cached_property_offset_for(&self, key: &CachedPropertyKey) -> Result<usize> {
        let key = SlotKey::CachedProperty(key.clone());
        self.slots
            .get(&key)
            .map(Slot::offset)
            .ok_or_else(|| SlotError::unknown(key))
    }

    /// Reference offset of a metadata cell.
    pub fn get_meta_data_offset_for(&self, name: &str) -> Result<usize> {
        let key = SlotKey::MetaData(name.to_owned());
        self.slots
            .get(&key)
            .map(Slot::offset)
            .ok_or_else(|| SlotError::unknown(key))
    }

    /// Offsets of all keyed cached-property slots, in allocation order.
    pub fn cached_property_offsets(&self) -> &[usize] {
        &self.cached_property_offsets
    }

    /// Reference offsets reserved without a key by duplicated cached
    /// properties.
    pub fn reserved_reference_offsets(&self) -> &[usize] {
        &self.reserved_references
    }

    /// Registers compiled accessors for variable `key`.
    pub fn update_accessor_functions(
        &mut self,
        key: &str,
        getter: Getter,
        setter: Setter,
        primitive_node_setter: Option<PrimitiveSetter>,
        primitive_relationship_setter: Option<PrimitiveSetter>,
    ) -> Result<&mut Self> {
        self.ensure_mutable("update accessor functions")?;
        self.accessors.insert(
            key,
            SlotAccessors {
                getter,
                setter,
                primitive_node_setter,
                primitive_relationship_setter,
            },
        );
        Ok(self)
    }

    /// Registered accessors.
    pub fn accessors(&self) -> &AccessorRegistry {
        &self.accessors
    }

    /// Getter for `key`; fails if none is registered.
    pub fn getter(&self, key: &str) -> Result<&Getter> {
        self.maybe_getter(key).ok_or_else(|| SlotError::MissingAccessor {
            var: key.to_owned(),
            kind: "getter",
        })
    }

    /// Setter for `key`; fails if none is registered.
    pub fn setter(&self, key: &str) -> Result<&Setter> {
        self.maybe_setter(key).ok_or_else(|| SlotError::MissingAccessor {
            var: key.to_owned(),
            kind: "setter",
        })
    }

    /// Getter for `key`, if registered.
    pub fn maybe_getter(&self, key: &str) -> Option<&Getter> {
        self.accessors.get(key).map(|a| &a.getter)
    }

    /// Setter for `key`, if registered.
    pub fn maybe_setter(&self, key: &str) -> Option<&Setter> {
        self.accessors.get(key).map(|a| &a.setter)
    }

    /// Raw node-id setter for `key`, if registered.
    pub fn maybe_primitive_node_setter(&self, key: &str) -> Option<&PrimitiveSetter> {
        self.accessors
            .get(key)
            .and_then(|a| a.primitive_node_setter.as_ref())
    }

    /// Raw relationship-id setter for `key`, if registered.
    pub fn maybe_primitive_relationship_setter(&self, key: &str) -> Option<&PrimitiveSetter> {
        self.accessors
            .get(key)
            .and_then(|a| a.primitive_relationship_setter.as_ref())
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::slots::ExecutionRow;
    use crate::query::Value;

    #[test]
    fn aliases_share_the_root_slot() {
        let mut slots = SlotConfiguration::empty();
        slots
            .new_long("a", false, CypherType::Node)
            .unwrap()
            .new_long("b", false, CypherType::Relationship)
            .unwrap()
            .add_alias("c", "a")
            .unwrap();
        assert_eq!(slots.get("c"), slots.get("a"));
        assert_eq!(slots.number_of_longs(), 2);
        assert!(slots.is_alias("c"));
        assert!(!slots.is_alias("a"));
        assert!(slots.get_aliases_for("a").contains("c"));
    }

    #[test]
    fn reallocation_widens_nullability_in_place() {
        let mut slots = SlotConfiguration::empty();
        slots.new_reference("x", false, CypherType::Any).unwrap();
        slots.new_reference("x", true, CypherType::Any).unwrap();
        assert_eq!(slots.number_of_references(), 1);
        assert!(slots.get("x").unwrap().is_nullable());

        slots.new_reference("x", false, CypherType::Any).unwrap();
        assert!(slots.get("x").unwrap().is_nullable());
    }

    #[test]
    fn widening_propagates_to_every_alias() {
        let mut slots = SlotConfiguration::empty();
        slots
            .new_reference("n", false, CypherType::Integer)
            .unwrap()
            .add_alias("m", "n")
            .unwrap()
            .add_alias("k", "m")
            .unwrap();
        slots.new_reference("k", true, CypherType::Number).unwrap();
        let expected = Slot::reference(0, true, CypherType::Number);
        for name in ["n", "m", "k"] {
            assert_eq!(slots.get(name), Some(&expected), "{name}");
        }
        assert_eq!(slots.number_of_references(), 1);
    }

    #[test]
    fn incompatible_reallocation_is_rejected() {
        let mut slots = SlotConfiguration::empty();
        slots.new_long("a", false, CypherType::Node).unwrap();
        let err = slots
            .new_long("a", false, CypherType::Relationship)
            .unwrap_err();
        assert_eq!(err.code(), "TypeConflict");
        let err = slots.new_reference("a", false, CypherType::Node).unwrap_err();
        assert_eq!(err.code(), "TypeConflict");
        assert_eq!(slots.get("a").unwrap().ty(), &CypherType::Node);
    }

    #[test]
    fn long_slots_need_entity_types() {
        let mut slots = SlotConfiguration::empty();
        let err = slots.new_long("a", false, CypherType::Any).unwrap_err();
        assert_eq!(err.code(), "InvalidType");
        assert_eq!(slots.number_of_longs(), 0);
    }

    #[test]
    fn aliasing_unknown_key_fails() {
        let mut slots = SlotConfiguration::empty();
        let err = slots.add_alias("b", "a").unwrap_err();
        assert_eq!(err.code(), "UnknownKey");
    }

    #[test]
    fn aliasing_over_a_different_slot_fails() {
        let mut slots = SlotConfiguration::empty();
        slots
            .new_long("a", false, CypherType::Node)
            .unwrap()
            .new_long("b", false, CypherType::Node)
            .unwrap();
        let err = slots.add_alias("b", "a").unwrap_err();
        assert_eq!(err.code(), "TypeConflict");
        slots.add_alias("a2", "a").unwrap();
        slots.add_alias("a2", "a").unwrap();
        assert_eq!(slots.get_aliases_for("a").len(), 1);
    }

    #[test]
    fn cached_property_duplicates_reserve_unkeyed_cells() {
        let mut slots = SlotConfiguration::empty();
        let key = CachedPropertyKey::node("n", "name");
        slots.new_cached_property(key.clone(), false).unwrap();
        slots.new_cached_property(key.clone(), false).unwrap();
        assert_eq!(slots.number_of_references(), 1);

        slots.new_cached_property(key.clone(), true).unwrap();
        assert_eq!(slots.number_of_references(), 2);
        assert_eq!(slots.get_cached_property_offset_for(&key).unwrap(), 0);
        assert_eq!(slots.cached_property_offsets(), &[0]);
        assert_eq!(slots.reserved_reference_offsets(), &[1]);
        let slot = slots.get_slot(&SlotKey::CachedProperty(key)).unwrap();
        assert_eq!(*slot, Slot::reference(0, false, CypherType::Any));
    }

    #[test]
    fn argument_slots_are_allocated_once_per_plan() {
        let mut slots = SlotConfiguration::empty();
        slots.new_argument(PlanId::NONE).unwrap();
        assert_eq!(slots.number_of_longs(), 0);
        assert_eq!(
            slots.get_argument_long_offset_for(PlanId::NONE).unwrap(),
            TOP_LEVEL_ARGUMENT_OFFSET
        );

        slots.new_argument(PlanId(7)).unwrap();
        let err = slots.new_argument(PlanId(7)).unwrap_err();
        assert_eq!(err.code(), "DoubleAllocation");
        assert_eq!(slots.get_argument_long_offset_for(PlanId(7)).unwrap(), 0);
        assert_eq!(slots.number_of_longs(), 1);
    }

    #[test]
    fn meta_data_is_idempotent() {
        let mut slots = SlotConfiguration::empty();
        slots.new_meta_data("csv").unwrap();
        slots.new_meta_data("csv").unwrap();
        assert_eq!(slots.number_of_references(), 1);
        assert_eq!(slots.get_meta_data_offset_for("csv").unwrap(), 0);
    }

    #[test]
    fn lookups_of_unallocated_keys_fail() {
        let mut slots = SlotConfiguration::empty();
        slots.new_reference("r", true, CypherType::Any).unwrap();
        assert_eq!(slots.get_long_offset_for("r").unwrap_err().code(), "UnknownKey");
        assert_eq!(slots.get_reference_offset_for("r").unwrap(), 0);
        assert!(slots.get_reference_offset_for("q").is_err());
        assert!(slots.get_argument_long_offset_for(PlanId(3)).is_err());
        assert!(slots.get_meta_data_offset_for("csv").is_err());
        assert!(slots
            .get_cached_property_offset_for(&CachedPropertyKey::node("r", "p"))
            .is_err());
    }

    #[test]
    fn finalized_configurations_reject_mutation() {
        let mut slots = SlotConfiguration::empty();
        slots.new_long("a", false, CypherType::Node).unwrap();
        slots.finalize();
        let faults = [
            slots.new_long("b", false, CypherType::Node).map(|_| ()),
            slots.new_reference("c", false, CypherType::Any).map(|_| ()),
            slots.add_alias("d", "a").map(|_| ()),
            slots.new_argument(PlanId(1)).map(|_| ()),
            slots.new_meta_data("m").map(|_| ()),
            slots
                .new_cached_property(CachedPropertyKey::node("a", "p"), false)
                .map(|_| ()),
        ];
        for fault in faults {
            assert_eq!(fault.unwrap_err().code(), "FinalizedMutation");
        }
        assert_eq!(slots.size(), SlotConfigurationSize::new(1, 0));
    }

    #[test]
    fn finalized_configurations_reject_new_accessors() {
        let mut slots = SlotConfiguration::empty();
        slots.new_long("a", false, CypherType::Node).unwrap();
        slots.finalize();
        let getter: Getter = Arc::new(|_: &dyn ExecutionRow| Value::Null);
        let setter: Setter = Arc::new(|_: &mut dyn ExecutionRow, _: Value| Ok::<_, SlotError>(()));
        let err = slots
            .update_accessor_functions("a", getter, setter, None, None)
            .unwrap_err();
        assert_eq!(err.code(), "FinalizedMutation");
        assert!(slots.maybe_getter("a").is_none());
    }

    #[test]
    fn copies_are_independent_and_mutable() {
        let mut original = SlotConfiguration::empty();
        original.new_long("a", false, CypherType::Node).unwrap();
        original.finalize();

        let mut copy = original.copy();
        assert!(!copy.is_finalized());
        copy.new_reference("x", true, CypherType::Any)
            .unwrap()
            .add_alias("b", "a")
            .unwrap();

        assert_eq!(original.size(), SlotConfigurationSize::new(1, 0));
        assert!(original.get("x").is_none());
        assert!(original.get_aliases_for("a").is_empty());
        assert_eq!(copy.size(), SlotConfigurationSize::new(1, 1));
    }

    #[test]
    fn frozen_slots_are_shareable() {
        let mut slots = SlotConfiguration::empty();
        slots.new_long("a", false, CypherType::Node).unwrap();
        let shared = slots.freeze();
        assert!(shared.is_finalized());
        let handle = std::thread::spawn({
            let shared = Arc::clone(&shared);
            move || shared.get_long_offset_for("a").unwrap()
        });
        assert_eq!(handle.join().unwrap(), 0);
    }
}
