//! Identifiers for what occupies a slot.

use std::fmt;

use crate::types::PlanId;

/// Kind of entity a cached property was read from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    /// Property of a node.
    Node,
    /// Property of a relationship.
    Relationship,
}

/// Identifies one cached `entity.property` read within a row.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CachedPropertyKey {
    /// Variable holding the entity.
    pub entity: String,
    /// Property key name.
    pub property: String,
    /// Whether the entity is a node or a relationship.
    pub kind: EntityKind,
}

impl CachedPropertyKey {
    /// Cache key for a node property.
    pub fn node(entity: impl Into<String>, property: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            property: property.into(),
            kind: EntityKind::Node,
        }
    }

    /// Cache key for a relationship property.
    pub fn relationship(entity: impl Into<String>, property: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            property: property.into(),
            kind: EntityKind::Relationship,
        }
    }
}

/// What a slot is allocated for.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SlotKey {
    /// Named query variable.
    Variable(String),
    /// Cached property read.
    CachedProperty(CachedPropertyKey),
    /// Argument slot injected by the `Apply` with this plan id.
    ApplyArgument(PlanId),
    /// Pipeline bookkeeping cell addressed by name.
    MetaData(String),
}

impl SlotKey {
    /// Key for a named variable.
    pub fn variable(name: impl Into<String>) -> Self {
        SlotKey::Variable(name.into())
    }

    /// Variable name if this is a variable key.
    pub fn as_variable(&self) -> Option<&str> {
        match self {
            SlotKey::Variable(name) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotKey::Variable(name) => write!(f, "'{name}'"),
            SlotKey::CachedProperty(key) => write!(f, "cache[{}.{}]", key.entity, key.property),
            SlotKey::ApplyArgument(plan) => write!(f, "argument({plan})"),
            SlotKey::MetaData(name) => write!(f, "meta({name})"),
        }
    }
}
