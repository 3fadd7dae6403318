//! Row abstraction the accessors read and write.
//!
//! The runtime owns the real row implementation. [`SlottedRow`] is a plain
//! vector-backed row sized from a configuration, used by tests and tools.

use crate::query::slots::{SlotConfiguration, SlotConfigurationSize};
use crate::query::Value;

/// Long-slot value standing for "no entity".
pub const NULL_ENTITY: i64 = -1;

/// Opaque execution row with one entity-id array and one value array.
pub trait ExecutionRow {
    /// Reads the long array at `offset`.
    fn get_long(&self, offset: usize) -> i64;
    /// Writes the long array at `offset`.
    fn set_long(&mut self, offset: usize, value: i64);
    /// Reads the reference array at `offset`.
    fn get_ref(&self, offset: usize) -> &Value;
    /// Writes the reference array at `offset`.
    fn set_ref(&mut self, offset: usize, value: Value);
}

/// Vector-backed row.
#[derive(Clone, Debug, PartialEq)]
pub struct SlottedRow {
    longs: Vec<i64>,
    refs: Vec<Value>,
}

impl SlottedRow {
    /// Allocates a row with every long set to [`NULL_ENTITY`] and every
    /// reference set to [`Value::Null`].
    pub fn new(size: SlotConfigurationSize) -> Self {
        Self {
            longs: vec![NULL_ENTITY; size.n_longs],
            refs: vec![Value::Null; size.n_references],
        }
    }

    /// Row dimensions.
    pub fn size(&self) -> SlotConfigurationSize {
        SlotConfigurationSize::new(self.longs.len(), self.refs.len())
    }

    /// Raw long array.
    pub fn longs(&self) -> &[i64] {
        &self.longs
    }

    /// Raw reference array.
    pub fn refs(&self) -> &[Value] {
        &self.refs
    }
}

impl ExecutionRow for SlottedRow {
    fn get_long(&self, offset: usize) -> i64 {
        self.longs[offset]
    }

    fn set_long(&mut self, offset: usize, value: i64) {
        self.longs[offset] = value;
    }

    fn get_ref(&self, offset: usize) -> &Value {
        &self.refs[offset]
    }

    fn set_ref(&mut self, offset: usize, value: Value) {
        self.refs[offset] = value;
    }
}

/// Raw-copies the first `prefix.n_longs` longs and `prefix.n_references`
/// references, e.g. the argument region an `Apply` hands to its inner side.
pub fn copy_prefix(
    from: &dyn ExecutionRow,
    to: &mut dyn ExecutionRow,
    prefix: SlotConfigurationSize,
) {
    for offset in 0..prefix.n_longs {
        to.set_long(offset, from.get_long(offset));
    }
    for offset in 0..prefix.n_references {
        to.set_ref(offset, from.get_ref(offset).clone());
    }
}

/// Copies every keyed cached-property cell of `slots` between two rows
/// sharing that layout.
pub fn copy_cached_properties(
    slots: &SlotConfiguration,
    from: &dyn ExecutionRow,
    to: &mut dyn ExecutionRow,
) {
    for &offset in slots.cached_property_offsets() {
        to.set_ref(offset, from.get_ref(offset).clone());
    }
}
