//! Static value types attached to slots.
//!
//! The types form a tree rooted at [`CypherType::Any`]. Nodes and
//! relationships sit beneath `Map`, integers and floats beneath `Number`, and
//! lists are covariant in their element type.

use std::fmt;

/// Declared type of the value held in a slot.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum CypherType {
    /// Top type; used when nothing more specific is known.
    Any,
    /// Boolean.
    Boolean,
    /// UTF-8 string.
    String,
    /// Integer or float.
    Number,
    /// 64-bit integer.
    Integer,
    /// 64-bit float.
    Float,
    /// Instant in time.
    DateTime,
    /// Map, including entities.
    Map,
    /// Graph node.
    Node,
    /// Graph relationship.
    Relationship,
    /// Alternating node/relationship path.
    Path,
    /// List with the given element type.
    List(Box<CypherType>),
}

impl CypherType {
    /// Shorthand for `List(inner)`.
    pub fn list_of(inner: CypherType) -> Self {
        CypherType::List(Box::new(inner))
    }

    /// Returns true for the two types that may live in a long slot.
    pub fn is_entity(&self) -> bool {
        matches!(self, CypherType::Node | CypherType::Relationship)
    }

    /// Immediate supertype, or `None` for [`CypherType::Any`].
    pub fn parent(&self) -> Option<CypherType> {
        match self {
            CypherType::Any => None,
            CypherType::Integer | CypherType::Float => Some(CypherType::Number),
            CypherType::Node | CypherType::Relationship => Some(CypherType::Map),
            CypherType::List(inner) => Some(match inner.parent() {
                Some(parent) => CypherType::list_of(parent),
                None => CypherType::Any,
            }),
            _ => Some(CypherType::Any),
        }
    }

    /// True when every value of `other` is also a value of `self`.
    pub fn is_assignable_from(&self, other: &CypherType) -> bool {
        match (self, other) {
            (CypherType::Any, _) => true,
            (CypherType::List(a), CypherType::List(b)) => a.is_assignable_from(b),
            (a, b) if a == b => true,
            (a, b) => match b.parent() {
                Some(parent) => a.is_assignable_from(&parent),
                None => false,
            },
        }
    }

    /// True when one type is a supertype of the other.
    pub fn is_related_to(&self, other: &CypherType) -> bool {
        self.is_assignable_from(other) || other.is_assignable_from(self)
    }

    /// Returns the more general of two related types, `None` if unrelated.
    pub fn wider_of(&self, other: &CypherType) -> Option<CypherType> {
        if self.is_assignable_from(other) {
            Some(self.clone())
        } else if other.is_assignable_from(self) {
            Some(other.clone())
        } else {
            None
        }
    }
}

impl fmt::Display for CypherType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CypherType::Any => f.write_str("Any"),
            CypherType::Boolean => f.write_str("Boolean"),
            CypherType::String => f.write_str("String"),
            CypherType::Number => f.write_str("Number"),
            CypherType::Integer => f.write_str("Integer"),
            CypherType::Float => f.write_str("Float"),
            CypherType::DateTime => f.write_str("DateTime"),
            CypherType::Map => f.write_str("Map"),
            CypherType::Node => f.write_str("Node"),
            CypherType::Relationship => f.write_str("Relationship"),
            CypherType::Path => f.write_str("Path"),
            CypherType::List(inner) => write!(f, "List<{inner}>"),
        }
    }
}
