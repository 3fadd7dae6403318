//! Physical slot allocation for slotted execution rows.
//!
//! A row has two arrays: one of entity ids ("longs") and one of general
//! values ("references"). [`SlotConfiguration`] decides which variable,
//! cached property, apply argument, or metadata cell lives at which offset
//! of which array. The planner fills one configuration per pipeline while
//! walking the plan bottom-up, then finalizes it and shares it with the
//! runtime.

pub mod accessors;
pub mod aliases;
pub mod configuration;
pub mod key;
pub mod row;
pub mod slot;
pub mod traversal;

pub use accessors::{
    generate_slot_accessors, AccessorRegistry, Getter, PrimitiveSetter, Setter, SlotAccessors,
};
pub use aliases::AliasGraph;
pub use configuration::{SharedSlots, SlotConfiguration, TOP_LEVEL_ARGUMENT_OFFSET};
pub use key::{CachedPropertyKey, EntityKind, SlotKey};
pub use row::{copy_cached_properties, copy_prefix, ExecutionRow, SlottedRow, NULL_ENTITY};
pub use slot::{Slot, SlotConfigurationSize, SlotKind};
pub use traversal::SlotWithKeyAndAliases;
