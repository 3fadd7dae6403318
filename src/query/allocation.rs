//! Bottom-up slot allocation over a physical plan.
//!
//! Operators that stream rows through unchanged layouts share one
//! configuration with their input. Leaves start from a copy of the current
//! argument configuration. `Apply` adds its argument slot to the lhs layout
//! and hands a copy to the rhs leaves; `CartesianProduct` splices the rhs
//! layout after the lhs one; `Aggregate` starts a fresh layout.

use std::collections::{HashMap, HashSet};

use tracing::{debug, trace};

use crate::query::config::SlotAllocatorConfig;
use crate::query::cypher_type::CypherType;
use crate::query::physical::{literal_type, PhysicalNode, PhysicalOp, PhysicalPlan, ProjectField};
use crate::query::profile::{profile_timer, record_plan_allocation};
use crate::query::slots::{
    generate_slot_accessors, SharedSlots, Slot, SlotConfiguration, SlotConfigurationSize,
};
use crate::types::{PlanId, Result, SlotError};

/// Metadata cell holding the current CSV line number.
pub const CSV_LINE_NUMBER: &str = "csv.line_number";
/// Metadata cell holding the current CSV file name.
pub const CSV_FILE_NAME: &str = "csv.file_name";

/// Finalized layouts for every operator of a plan.
#[derive(Debug, Default)]
pub struct SlotAllocation {
    slots: HashMap<PlanId, SharedSlots>,
    argument_sizes: HashMap<PlanId, SlotConfigurationSize>,
}

impl SlotAllocation {
    /// Layout of the rows produced by `plan`.
    pub fn slots_for(&self, plan: PlanId) -> Result<&SharedSlots> {
        self.slots.get(&plan).ok_or_else(|| SlotError::InvalidPlan {
            plan,
            reason: "no slots allocated".to_owned(),
        })
    }

    /// Size of the argument prefix a leaf copies from its enclosing scope.
    /// Zero for leaves at the top level.
    pub fn argument_size_for(&self, plan: PlanId) -> Option<SlotConfigurationSize> {
        self.argument_sizes.get(&plan).copied()
    }

    /// Number of operators with an allocated layout.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True when nothing was allocated.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Walks a physical plan and assigns slots to every operator.
#[derive(Clone, Debug, Default)]
pub struct SlotAllocator {
    config: SlotAllocatorConfig,
}

impl SlotAllocator {
    /// Creates an allocator with the given configuration.
    pub fn new(config: SlotAllocatorConfig) -> Self {
        Self { config }
    }

    /// Allocates and finalizes layouts for every operator of `plan`.
    pub fn allocate(&self, plan: &PhysicalPlan) -> Result<SlotAllocation> {
        let timer = profile_timer();
        let mut pass = AllocationPass {
            config: &self.config,
            arena: Vec::new(),
            owners: Vec::new(),
            seen: HashSet::new(),
            argument_sizes: HashMap::new(),
        };
        let top_level = ArgumentScope {
            config: None,
            size: SlotConfigurationSize::ZERO,
        };
        let root = pass.allocate_node(&plan.root, top_level)?;
        debug!(
            operators = pass.owners.len(),
            layouts = pass.arena.len(),
            root_longs = pass.arena[root].number_of_longs(),
            root_refs = pass.arena[root].number_of_references(),
            "slots.allocate_plan"
        );
        let allocation = pass.finish()?;
        record_plan_allocation(timer);
        Ok(allocation)
    }
}

#[derive(Clone, Copy)]
struct ArgumentScope {
    config: Option<usize>,
    size: SlotConfigurationSize,
}

struct AllocationPass<'c> {
    config: &'c SlotAllocatorConfig,
    arena: Vec<SlotConfiguration>,
    owners: Vec<(PlanId, usize)>,
    seen: HashSet<PlanId>,
    argument_sizes: HashMap<PlanId, SlotConfigurationSize>,
}

impl AllocationPass<'_> {
    fn allocate_node(&mut self, node: &PhysicalNode, argument: ArgumentScope) -> Result<usize> {
        if !self.seen.insert(node.id) {
            return Err(invalid(node.id, "duplicate plan id"));
        }
        if node.inputs.len() != node.op.arity() {
            return Err(invalid(
                node.id,
                format!(
                    "{} expects {} inputs, got {}",
                    node.op.name(),
                    node.op.arity(),
                    node.inputs.len()
                ),
            ));
        }
        trace!(plan = node.id.0, op = node.op.name(), "slots.allocate_operator");
        let idx = match &node.op {
            PhysicalOp::Argument => self.leaf(node.id, argument),
            PhysicalOp::AllNodesScan { as_var } | PhysicalOp::LabelScan { as_var, .. } => {
                let idx = self.leaf(node.id, argument);
                self.arena[idx].new_long(as_var.as_str(), false, CypherType::Node)?;
                idx
            }
            PhysicalOp::LoadCsv {
                as_var,
                with_headers,
            } => {
                let idx = self.leaf(node.id, argument);
                let ty = if *with_headers {
                    CypherType::Map
                } else {
                    CypherType::list_of(CypherType::String)
                };
                self.arena[idx]
                    .new_reference(as_var.as_str(), false, ty)?
                    .new_meta_data(CSV_LINE_NUMBER)?
                    .new_meta_data(CSV_FILE_NAME)?;
                idx
            }
            PhysicalOp::Expand {
                from,
                edge,
                to,
                optional,
                ..
            } => {
                let idx = self.allocate_node(&node.inputs[0], argument)?;
                let slots = &mut self.arena[idx];
                require_variable(slots, node.id, from.as_str())?;
                slots
                    .new_long(edge.as_str(), *optional, CypherType::Relationship)?
                    .new_long(to.as_str(), *optional, CypherType::Node)?;
                idx
            }
            PhysicalOp::Filter { pred } => {
                let idx = self.allocate_node(&node.inputs[0], argument)?;
                require_variable(&self.arena[idx], node.id, pred.var().as_str())?;
                idx
            }
            PhysicalOp::CacheProperties { props } => {
                let idx = self.allocate_node(&node.inputs[0], argument)?;
                let slots = &mut self.arena[idx];
                for prop in props {
                    require_variable(slots, node.id, &prop.entity)?;
                    slots.new_cached_property(prop.clone(), false)?;
                }
                idx
            }
            PhysicalOp::Project { fields } => {
                let idx = self.allocate_node(&node.inputs[0], argument)?;
                project(&mut self.arena[idx], node.id, fields)?;
                idx
            }
            PhysicalOp::Distinct => self.allocate_node(&node.inputs[0], argument)?,
            PhysicalOp::Aggregate {
                grouping,
                aggregates,
            } => {
                let source = self.allocate_node(&node.inputs[0], argument)?;
                let mut slots = self.fresh(argument);
                for var in grouping {
                    match require_variable(&self.arena[source], node.id, var.as_str())? {
                        Slot::Long { nullable, ty, .. } => {
                            slots.new_long(var.as_str(), nullable, ty)?;
                        }
                        Slot::Ref { nullable, ty, .. } => {
                            slots.new_reference(var.as_str(), nullable, ty)?;
                        }
                    }
                }
                for aggregate in aggregates {
                    let (ty, nullable) = aggregate.func.result_type();
                    slots.new_reference(aggregate.as_var.as_str(), nullable, ty)?;
                }
                self.push(slots)
            }
            PhysicalOp::Apply => {
                let lhs = self.allocate_node(&node.inputs[0], argument)?;
                self.arena[lhs].new_argument(node.id)?;
                let inner = ArgumentScope {
                    config: Some(lhs),
                    size: self.arena[lhs].size(),
                };
                self.allocate_node(&node.inputs[1], inner)?
            }
            PhysicalOp::CartesianProduct => {
                let lhs = self.allocate_node(&node.inputs[0], argument)?;
                let rhs = self.allocate_node(&node.inputs[1], argument)?;
                let mut merged = self.arena[lhs].copy();
                self.arena[rhs].add_all_slots_in_order_to(&mut merged, argument.size)?;
                self.push(merged)
            }
        };
        self.owners.push((node.id, idx));
        Ok(idx)
    }

    fn fresh(&self, argument: ArgumentScope) -> SlotConfiguration {
        match argument.config {
            Some(idx) => self.arena[idx].copy(),
            None => SlotConfiguration::with_capacity(self.config.capacity_hint),
        }
    }

    fn leaf(&mut self, plan: PlanId, argument: ArgumentScope) -> usize {
        self.argument_sizes.insert(plan, argument.size);
        let slots = self.fresh(argument);
        self.push(slots)
    }

    fn push(&mut self, slots: SlotConfiguration) -> usize {
        self.arena.push(slots);
        self.arena.len() - 1
    }

    fn finish(self) -> Result<SlotAllocation> {
        let mut frozen = Vec::with_capacity(self.arena.len());
        for mut slots in self.arena {
            if self.config.generate_accessors {
                generate_slot_accessors(&mut slots)?;
            }
            frozen.push(slots.freeze());
        }
        let slots = self
            .owners
            .into_iter()
            .map(|(plan, idx)| (plan, SharedSlots::clone(&frozen[idx])))
            .collect();
        Ok(SlotAllocation {
            slots,
            argument_sizes: self.argument_sizes,
        })
    }
}

fn project(slots: &mut SlotConfiguration, plan: PlanId, fields: &[ProjectField]) -> Result<()> {
    for field in fields {
        let name = field.output_name();
        match field {
            ProjectField::Var { var, .. } => {
                require_variable(slots, plan, var.as_str())?;
                if name != var.as_str() {
                    slots.add_alias(&name, var.as_str())?;
                }
            }
            ProjectField::Prop { var, .. } => {
                require_variable(slots, plan, var.as_str())?;
                slots.new_reference(&name, true, CypherType::Any)?;
            }
            ProjectField::Literal { value, .. } => {
                slots.new_reference(&name, value.is_null(), literal_type(value))?;
            }
        }
    }
    Ok(())
}

fn require_variable(slots: &SlotConfiguration, plan: PlanId, var: &str) -> Result<Slot> {
    slots.get(var).cloned().ok_or_else(|| {
        invalid(plan, format!("variable '{var}' is used before it is bound"))
    })
}

fn invalid(plan: PlanId, reason: impl Into<String>) -> SlotError {
    SlotError::InvalidPlan {
        plan,
        reason: reason.into(),
    }
}
