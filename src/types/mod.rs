#![forbid(unsafe_code)]

//! Identifier newtypes and the crate-wide error type.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a node in the graph store.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
pub struct NodeId(pub u64);
/// Identifier of a relationship in the graph store.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
pub struct EdgeId(pub u64);
/// Identifier of a node label.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct LabelId(pub u32);
/// Identifier of a relationship type.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct TypeId(pub u32);
/// Identifier of a property key.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct PropId(pub u32);

/// Identifier of an operator within a physical plan.
///
/// [`PlanId::NONE`] stands for the top-level scope, which has no enclosing
/// `Apply` and therefore no argument slot of its own.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct PlanId(pub i32);

impl PlanId {
    /// Sentinel for "no plan", i.e. the top-level argument scope.
    pub const NONE: PlanId = PlanId(-1);

    /// Returns true for the top-level sentinel.
    pub const fn is_none(self) -> bool {
        self.0 == PlanId::NONE.0
    }
}

/// Faults raised while building or reading a slot configuration.
///
/// Every variant signals a bug in the calling planner stage. Callers abort
/// compilation of the offending query instead of retrying.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SlotError {
    /// A long slot was requested for a type other than node or relationship.
    #[error("long slots only hold node or relationship ids, not {ty}")]
    InvalidLongType {
        /// Rendered type of the rejected request.
        ty: String,
    },
    /// A key was re-allocated with a slot it cannot be unified with.
    #[error("tried overwriting already taken slot {key} ({existing}) with {requested}")]
    TypeConflict {
        /// Key being re-allocated.
        key: String,
        /// Slot currently mapped to the key.
        existing: String,
        /// Slot shape the caller asked for.
        requested: String,
    },
    /// A key was looked up or aliased before being allocated.
    #[error("no slot allocated for {key}")]
    UnknownKey {
        /// Key that was not found.
        key: String,
    },
    /// An alias was found with no root in the alias graph.
    #[error("alias '{alias}' has no root variable")]
    AliasWithoutRoot {
        /// Alias name without a root.
        alias: String,
    },
    /// A mutating operation ran after the configuration was finalized.
    #[error("cannot {operation} on a finalized slot configuration")]
    Finalized {
        /// Name of the rejected operation.
        operation: &'static str,
    },
    /// An apply argument slot was allocated twice for the same plan.
    #[error("argument slot for plan {plan} allocated twice")]
    DoubleArgument {
        /// Offending plan id.
        plan: PlanId,
    },
    /// An accessor was requested for a variable that has none registered.
    #[error("no {kind} registered for variable '{var}'")]
    MissingAccessor {
        /// Variable name.
        var: String,
        /// Which accessor was missing.
        kind: &'static str,
    },
    /// A row setter received a value its slot cannot hold.
    #[error("variable '{var}' expects {expected}, got {found}")]
    WrongValueType {
        /// Variable being written.
        var: String,
        /// Accepted value shape.
        expected: String,
        /// Rejected value.
        found: String,
    },
    /// A physical plan handed to slot allocation is malformed.
    #[error("plan {plan}: {reason}")]
    InvalidPlan {
        /// Offending plan id.
        plan: PlanId,
        /// What is wrong with it.
        reason: String,
    },
    /// Allocator configuration could not be parsed.
    #[error("invalid slot allocator config: {0}")]
    Config(String),
}

impl SlotError {
    /// Returns a machine-readable code for the error variant.
    pub fn code(&self) -> &'static str {
        match self {
            SlotError::InvalidLongType { .. } => "InvalidType",
            SlotError::TypeConflict { .. } => "TypeConflict",
            SlotError::UnknownKey { .. } => "UnknownKey",
            SlotError::AliasWithoutRoot { .. } => "InternalConsistency",
            SlotError::Finalized { .. } => "FinalizedMutation",
            SlotError::DoubleArgument { .. } => "DoubleAllocation",
            SlotError::MissingAccessor { .. } => "UnknownKey",
            SlotError::WrongValueType { .. } => "TypeMismatch",
            SlotError::InvalidPlan { .. } => "InvalidPlan",
            SlotError::Config(_) => "Config",
        }
    }

    pub(crate) fn unknown(key: impl fmt::Display) -> Self {
        SlotError::UnknownKey {
            key: key.to_string(),
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SlotError>;

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for LabelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for PropId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for PlanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for PropId {
    fn from(value: u32) -> Self {
        PropId(value)
    }
}

impl From<i32> for PlanId {
    fn from(value: i32) -> Self {
        PlanId(value)
    }
}
