//! Physical slot descriptors.

use std::fmt;

use crate::query::cypher_type::CypherType;
use crate::types::{Result, SlotError};

/// Which of the two row arrays a slot lives in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SlotKind {
    /// Entity-id array.
    Long,
    /// General value array.
    Ref,
}

/// One physical location inside an execution row.
///
/// Long slots hold node or relationship ids; reference slots hold arbitrary
/// values. The offset indexes into the array selected by the variant.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Slot {
    /// Cell in the entity-id array.
    Long {
        /// Index into the long array.
        offset: usize,
        /// Whether the cell may hold the null entity.
        nullable: bool,
        /// Node or relationship; apply arguments use `Any`.
        ty: CypherType,
    },
    /// Cell in the value array.
    Ref {
        /// Index into the reference array.
        offset: usize,
        /// Whether the cell may hold null.
        nullable: bool,
        /// Declared value type, `Any` when unknown.
        ty: CypherType,
    },
}

impl Slot {
    /// Builds a long slot, rejecting non-entity types.
    pub fn long(offset: usize, nullable: bool, ty: CypherType) -> Result<Self> {
        if !ty.is_entity() {
            return Err(SlotError::InvalidLongType { ty: ty.to_string() });
        }
        Ok(Slot::Long {
            offset,
            nullable,
            ty,
        })
    }

    /// Builds a reference slot.
    pub fn reference(offset: usize, nullable: bool, ty: CypherType) -> Self {
        Slot::Ref {
            offset,
            nullable,
            ty,
        }
    }

    // Argument slots carry an argument row id, not an entity.
    pub(crate) fn argument(offset: usize) -> Self {
        Slot::Long {
            offset,
            nullable: false,
            ty: CypherType::Any,
        }
    }

    /// Offset within the slot's array.
    pub fn offset(&self) -> usize {
        match self {
            Slot::Long { offset, .. } | Slot::Ref { offset, .. } => *offset,
        }
    }

    /// Whether the slot may hold null.
    pub fn is_nullable(&self) -> bool {
        match self {
            Slot::Long { nullable, .. } | Slot::Ref { nullable, .. } => *nullable,
        }
    }

    /// Declared type of the slot.
    pub fn ty(&self) -> &CypherType {
        match self {
            Slot::Long { ty, .. } | Slot::Ref { ty, .. } => ty,
        }
    }

    /// Array the slot lives in.
    pub fn kind(&self) -> SlotKind {
        match self {
            Slot::Long { .. } => SlotKind::Long,
            Slot::Ref { .. } => SlotKind::Ref,
        }
    }

    /// True for long slots.
    pub fn is_long(&self) -> bool {
        self.kind() == SlotKind::Long
    }

    /// True when `self` can absorb a re-allocation shaped like `other`:
    /// same array, and one type is a supertype of the other.
    pub fn is_type_compatible_with(&self, other: &Slot) -> bool {
        self.kind() == other.kind() && self.ty().is_related_to(other.ty())
    }

    /// Merges a compatible request into this slot, keeping the offset.
    ///
    /// Nullability only goes from `false` to `true` and the type only widens.
    /// Returns `None` when the two slots are not compatible.
    pub fn unify(&self, other: &Slot) -> Option<Slot> {
        if self.kind() != other.kind() {
            return None;
        }
        let ty = self.ty().wider_of(other.ty())?;
        let nullable = self.is_nullable() || other.is_nullable();
        Some(match self {
            Slot::Long { offset, .. } => Slot::Long {
                offset: *offset,
                nullable,
                ty,
            },
            Slot::Ref { offset, .. } => Slot::Ref {
                offset: *offset,
                nullable,
                ty,
            },
        })
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (name, offset, nullable, ty) = match self {
            Slot::Long {
                offset,
                nullable,
                ty,
            } => ("LongSlot", offset, nullable, ty),
            Slot::Ref {
                offset,
                nullable,
                ty,
            } => ("RefSlot", offset, nullable, ty),
        };
        write!(f, "{name}({offset}, {ty}")?;
        if *nullable {
            f.write_str("?")?;
        }
        f.write_str(")")
    }
}

/// Row dimensions described by a configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct SlotConfigurationSize {
    /// Length of the long array.
    pub n_longs: usize,
    /// Length of the reference array.
    pub n_references: usize,
}

impl SlotConfigurationSize {
    /// Size with no slots, used to splice without skipping.
    pub const ZERO: SlotConfigurationSize = SlotConfigurationSize {
        n_longs: 0,
        n_references: 0,
    };

    /// Creates a size from both counts.
    pub const fn new(n_longs: usize, n_references: usize) -> Self {
        Self {
            n_longs,
            n_references,
        }
    }

    /// Count for the given array.
    pub fn of(&self, kind: SlotKind) -> usize {
        match kind {
            SlotKind::Long => self.n_longs,
            SlotKind::Ref => self.n_references,
        }
    }
}
