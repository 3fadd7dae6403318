//! Slot allocation for Sombra's slotted query runtime.
//!
//! Maps the variables and intermediate values of a compiled plan onto the
//! two arrays of an execution row: entity ids and general values.

#![warn(missing_docs)]

pub mod query;
pub mod types;
