//! Precompiled per-variable row accessors.
//!
//! Each variable gets a getter and a setter that index straight into the
//! row, so the runtime never resolves a variable name per row. Entity-typed
//! variables also get a primitive setter taking a raw id.

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::query::cypher_type::CypherType;
use crate::query::slots::row::{ExecutionRow, NULL_ENTITY};
use crate::query::slots::{Slot, SlotConfiguration};
use crate::query::Value;
use crate::types::{EdgeId, NodeId, Result, SlotError};

/// Reads a variable from a row.
pub type Getter = Arc<dyn Fn(&dyn ExecutionRow) -> Value + Send + Sync>;
/// Writes a variable into a row, rejecting values the slot cannot hold.
pub type Setter = Arc<dyn Fn(&mut dyn ExecutionRow, Value) -> Result<()> + Send + Sync>;
/// Writes a raw entity id into a row. [`NULL_ENTITY`] is accepted only by
/// nullable slots; other negative ids are rejected.
pub type PrimitiveSetter = Arc<dyn Fn(&mut dyn ExecutionRow, i64) -> Result<()> + Send + Sync>;

/// Accessor set bound to one variable.
#[derive(Clone)]
pub struct SlotAccessors {
    /// Mandatory reader.
    pub getter: Getter,
    /// Mandatory writer.
    pub setter: Setter,
    /// Raw node-id writer for node-typed variables.
    pub primitive_node_setter: Option<PrimitiveSetter>,
    /// Raw relationship-id writer for relationship-typed variables.
    pub primitive_relationship_setter: Option<PrimitiveSetter>,
}

impl fmt::Debug for SlotAccessors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlotAccessors")
            .field("primitive_node_setter", &self.primitive_node_setter.is_some())
            .field(
                "primitive_relationship_setter",
                &self.primitive_relationship_setter.is_some(),
            )
            .finish_non_exhaustive()
    }
}

/// Variable name to accessor set.
#[derive(Clone, Debug, Default)]
pub struct AccessorRegistry {
    entries: FxHashMap<String, SlotAccessors>,
}

impl AccessorRegistry {
    pub(crate) fn insert(&mut self, var: &str, accessors: SlotAccessors) {
        self.entries.insert(var.to_owned(), accessors);
    }

    /// Accessors for `var`, if registered.
    pub fn get(&self, var: &str) -> Option<&SlotAccessors> {
        self.entries.get(var)
    }

    /// Number of variables with accessors.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no accessors are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Compiles and registers accessors for every variable in `slots`,
/// aliases included.
pub fn generate_slot_accessors(slots: &mut SlotConfiguration) -> Result<()> {
    let mut compiled = Vec::new();
    slots.foreach_slot_and_aliases(|entry| {
        if let Some(name) = entry.key.as_variable() {
            let accessors = compile_accessors(name, entry.slot);
            compiled.push((name.to_owned(), accessors.clone()));
            for alias in entry.aliases {
                compiled.push((alias.clone(), accessors.clone()));
            }
        }
    });
    for (var, accessors) in compiled {
        slots.update_accessor_functions(
            &var,
            accessors.getter,
            accessors.setter,
            accessors.primitive_node_setter,
            accessors.primitive_relationship_setter,
        )?;
    }
    Ok(())
}

fn compile_accessors(var: &str, slot: &Slot) -> SlotAccessors {
    let (getter, setter) = match slot {
        Slot::Long {
            offset,
            nullable,
            ty,
        } => (
            long_getter(*offset, *nullable, ty),
            long_setter(var, *offset, *nullable, ty),
        ),
        Slot::Ref {
            offset, nullable, ..
        } => (ref_getter(*offset), ref_setter(var, *offset, *nullable)),
    };
    SlotAccessors {
        getter,
        setter,
        primitive_node_setter: (*slot.ty() == CypherType::Node)
            .then(|| primitive_setter(var, slot, Value::Node as fn(NodeId) -> Value, NodeId)),
        primitive_relationship_setter: (*slot.ty() == CypherType::Relationship).then(|| {
            primitive_setter(var, slot, Value::Relationship as fn(EdgeId) -> Value, EdgeId)
        }),
    }
}

fn long_getter(offset: usize, nullable: bool, ty: &CypherType) -> Getter {
    let wrap: fn(u64) -> Value = match ty {
        CypherType::Relationship => |id| Value::Relationship(EdgeId(id)),
        _ => |id| Value::Node(NodeId(id)),
    };
    if nullable {
        Arc::new(move |row: &dyn ExecutionRow| match row.get_long(offset) {
            NULL_ENTITY => Value::Null,
            id => wrap(id as u64),
        })
    } else {
        Arc::new(move |row: &dyn ExecutionRow| wrap(row.get_long(offset) as u64))
    }
}

fn long_setter(var: &str, offset: usize, nullable: bool, ty: &CypherType) -> Setter {
    let var = var.to_owned();
    let ty = ty.clone();
    Arc::new(move |row: &mut dyn ExecutionRow, value: Value| {
        let raw = match (&ty, value) {
            (CypherType::Node, Value::Node(id)) => entity_id(&var, id.0)?,
            (CypherType::Relationship, Value::Relationship(id)) => entity_id(&var, id.0)?,
            (_, Value::Null) if nullable => NULL_ENTITY,
            (_, other) => {
                return Err(SlotError::WrongValueType {
                    var: var.clone(),
                    expected: ty.to_string(),
                    found: format!("{other:?}"),
                })
            }
        };
        row.set_long(offset, raw);
        Ok(())
    })
}

// Ids above i64::MAX would alias NULL_ENTITY or other negative cells.
fn entity_id(var: &str, id: u64) -> Result<i64> {
    i64::try_from(id).map_err(|_| SlotError::WrongValueType {
        var: var.to_owned(),
        expected: "entity id up to i64::MAX".to_owned(),
        found: id.to_string(),
    })
}

fn ref_getter(offset: usize) -> Getter {
    Arc::new(move |row: &dyn ExecutionRow| row.get_ref(offset).clone())
}

fn ref_setter(var: &str, offset: usize, nullable: bool) -> Setter {
    let var = var.to_owned();
    Arc::new(move |row: &mut dyn ExecutionRow, value: Value| {
        if value.is_null() && !nullable {
            return Err(SlotError::WrongValueType {
                var: var.clone(),
                expected: "non-null value".to_owned(),
                found: "Null".to_owned(),
            });
        }
        row.set_ref(offset, value);
        Ok(())
    })
}

fn primitive_setter<I: 'static>(
    var: &str,
    slot: &Slot,
    boxed: fn(I) -> Value,
    id: fn(u64) -> I,
) -> PrimitiveSetter {
    let var = var.to_owned();
    let nullable = slot.is_nullable();
    let check = move |raw: i64| -> Result<Option<u64>> {
        match raw {
            NULL_ENTITY if nullable => Ok(None),
            raw if raw >= 0 => Ok(Some(raw as u64)),
            raw => Err(SlotError::WrongValueType {
                var: var.clone(),
                expected: "entity id".to_owned(),
                found: raw.to_string(),
            }),
        }
    };
    match *slot {
        Slot::Long { offset, .. } => Arc::new(move |row: &mut dyn ExecutionRow, raw: i64| {
            check(raw)?;
            row.set_long(offset, raw);
            Ok(())
        }),
        Slot::Ref { offset, .. } => Arc::new(move |row: &mut dyn ExecutionRow, raw: i64| {
            let value = match check(raw)? {
                None => Value::Null,
                Some(raw) => boxed(id(raw)),
            };
            row.set_ref(offset, value);
            Ok(())
        }),
    }
}
