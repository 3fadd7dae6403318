//! Slot allocator configuration.

use serde::{Deserialize, Serialize};

use crate::types::{Result, SlotError};

/// Knobs for [`SlotAllocator`](crate::query::allocation::SlotAllocator).
///
/// ```toml
/// generate_accessors = true
/// capacity_hint = 32
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct SlotAllocatorConfig {
    /// Compile getter/setter closures for every variable before finalizing.
    pub generate_accessors: bool,
    /// Initial key capacity of configurations created from scratch.
    pub capacity_hint: usize,
}

impl Default for SlotAllocatorConfig {
    fn default() -> Self {
        Self {
            generate_accessors: true,
            capacity_hint: 16,
        }
    }
}

impl SlotAllocatorConfig {
    /// Parses a TOML document; missing keys keep their defaults.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|err| SlotError::Config(err.to_string()))
    }

    /// Sets whether accessors are generated.
    pub fn generate_accessors(mut self, enabled: bool) -> Self {
        self.generate_accessors = enabled;
        self
    }

    /// Sets the initial key capacity.
    pub fn capacity_hint(mut self, capacity: usize) -> Self {
        self.capacity_hint = capacity;
        self
    }
}
