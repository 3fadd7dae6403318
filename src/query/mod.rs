#![forbid(unsafe_code)]

//! Slotted query compilation: types, slot layouts, and the allocation pass
//! that maps a physical plan onto execution rows.

/// Bottom-up slot allocation over physical plans.
pub mod allocation;

/// Slot allocator configuration.
pub mod config;

/// Static value types carried by slots.
pub mod cypher_type;

/// Physical query plan representation.
///
/// Operator tree whose variables are mapped onto slots.
pub mod physical;

/// Allocation counters enabled by `SOMBRA_PROFILE`.
pub mod profile;

/// Slot keys, slots, configurations, accessors, and rows.
pub mod slots;

/// Runtime values stored in reference slots.
pub mod value;

pub use allocation::{SlotAllocation, SlotAllocator};
pub use config::SlotAllocatorConfig;
pub use cypher_type::CypherType;
pub use slots::{Slot, SlotConfiguration, SlotKey};
pub use value::Value;
