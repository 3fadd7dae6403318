//! Physical operator tree handed to slot allocation.

use std::fmt;

use crate::query::cypher_type::CypherType;
use crate::query::slots::CachedPropertyKey;
use crate::query::Value;
use crate::types::{LabelId, PlanId, PropId, TypeId};

/// Identifier assigned to a binding (node, edge, or value) within the query.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Var(pub String);

impl Var {
    /// Borrowed variable name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Var {
    fn from(value: &str) -> Self {
        Var(value.to_owned())
    }
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Physical plan produced by the planner.
#[derive(Clone, Debug)]
pub struct PhysicalPlan {
    /// The root node of the physical plan tree.
    pub root: PhysicalNode,
}

impl PhysicalPlan {
    /// Creates a new physical plan with the given root node.
    pub fn new(root: PhysicalNode) -> Self {
        Self { root }
    }
}

/// Node within the physical plan tree.
#[derive(Clone, Debug)]
pub struct PhysicalNode {
    /// Plan-unique identifier of this operator.
    pub id: PlanId,
    /// The physical operator at this node.
    pub op: PhysicalOp,
    /// Child nodes that provide input to this operator.
    pub inputs: Vec<PhysicalNode>,
}

impl PhysicalNode {
    /// Creates a new physical node with no inputs.
    pub fn new(id: impl Into<PlanId>, op: PhysicalOp) -> Self {
        Self {
            id: id.into(),
            op,
            inputs: Vec::new(),
        }
    }

    /// Creates a new physical node with the given inputs.
    pub fn with_inputs(id: impl Into<PlanId>, op: PhysicalOp, inputs: Vec<PhysicalNode>) -> Self {
        Self {
            id: id.into(),
            op,
            inputs,
        }
    }
}

/// Physical operators understood by slot allocation.
#[derive(Clone, Debug)]
pub enum PhysicalOp {
    /// Produces the argument row of the enclosing `Apply`, or one empty row
    /// at the top level.
    Argument,
    /// Scans every node.
    AllNodesScan {
        /// Variable name to bind matched nodes.
        as_var: Var,
    },
    /// Scans all nodes with a specific label.
    LabelScan {
        /// The label ID to scan for.
        label: LabelId,
        /// Variable name to bind matched nodes.
        as_var: Var,
    },
    /// Expands from one node to its neighbors via edges.
    Expand {
        /// Variable representing the source node.
        from: Var,
        /// Variable to bind traversed relationships.
        edge: Var,
        /// Variable to bind target nodes.
        to: Var,
        /// Direction of edge traversal.
        dir: Dir,
        /// Optional edge type filter.
        ty: Option<TypeId>,
        /// Produces a null row instead of dropping rows with no match.
        optional: bool,
    },
    /// Filters rows based on a property predicate.
    Filter {
        /// The predicate to apply for filtering.
        pred: PropPredicate,
    },
    /// Reads properties once and keeps them in the row.
    CacheProperties {
        /// Property reads to cache.
        props: Vec<CachedPropertyKey>,
    },
    /// Projects specific fields into the output.
    Project {
        /// Fields to include in the projection.
        fields: Vec<ProjectField>,
    },
    /// Removes duplicate rows from the result stream.
    Distinct,
    /// Groups rows and computes aggregates; starts a new row layout.
    Aggregate {
        /// Grouping variables carried into the output.
        grouping: Vec<Var>,
        /// Aggregate outputs.
        aggregates: Vec<Aggregation>,
    },
    /// Runs `inputs[1]` once per row of `inputs[0]`, with that row as argument.
    Apply,
    /// Cross product of `inputs[0]` and `inputs[1]`.
    CartesianProduct,
    /// Reads CSV rows into a variable.
    LoadCsv {
        /// Variable bound to each line.
        as_var: Var,
        /// Lines are maps keyed by header when true, string lists otherwise.
        with_headers: bool,
    },
}

impl PhysicalOp {
    /// Operator name used in diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            PhysicalOp::Argument => "Argument",
            PhysicalOp::AllNodesScan { .. } => "AllNodesScan",
            PhysicalOp::LabelScan { .. } => "LabelScan",
            PhysicalOp::Expand { optional: false, .. } => "Expand",
            PhysicalOp::Expand { optional: true, .. } => "OptionalExpand",
            PhysicalOp::Filter { .. } => "Filter",
            PhysicalOp::CacheProperties { .. } => "CacheProperties",
            PhysicalOp::Project { .. } => "Project",
            PhysicalOp::Distinct => "Distinct",
            PhysicalOp::Aggregate { .. } => "Aggregate",
            PhysicalOp::Apply => "Apply",
            PhysicalOp::CartesianProduct => "CartesianProduct",
            PhysicalOp::LoadCsv { .. } => "LoadCsv",
        }
    }

    /// Number of inputs the operator expects.
    pub fn arity(&self) -> usize {
        match self {
            PhysicalOp::Argument
            | PhysicalOp::AllNodesScan { .. }
            | PhysicalOp::LabelScan { .. }
            | PhysicalOp::LoadCsv { .. } => 0,
            PhysicalOp::Apply | PhysicalOp::CartesianProduct => 2,
            _ => 1,
        }
    }
}

/// Edge traversal direction for physical expansion.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Dir {
    /// Traverse outgoing edges from source to target.
    Out,
    /// Traverse incoming edges from target to source.
    In,
    /// Traverse edges in both directions.
    Both,
}

/// Property predicate lowered to the physical layer.
#[derive(Clone, Debug)]
pub enum PropPredicate {
    /// Equality predicate on a property.
    Eq {
        /// Variable whose property to check.
        var: Var,
        /// Property ID to check.
        prop: PropId,
        /// Value to compare against.
        value: Value,
    },
    /// Checks whether the property is present and not null.
    IsNotNull {
        /// Variable whose property to check.
        var: Var,
        /// Property ID to check.
        prop: PropId,
    },
}

impl PropPredicate {
    /// Variable the predicate reads.
    pub fn var(&self) -> &Var {
        match self {
            PropPredicate::Eq { var, .. } | PropPredicate::IsNotNull { var, .. } => var,
        }
    }
}

/// Projected field in the output stream.
#[derive(Clone, Debug)]
pub enum ProjectField {
    /// Projects a variable value.
    Var {
        /// The variable to project.
        var: Var,
        /// Optional alias for the output field.
        alias: Option<String>,
    },
    /// Projects a property from a bound variable.
    Prop {
        /// Variable exposing the property.
        var: Var,
        /// Resolved property identifier.
        prop: PropId,
        /// Property name preserved for default aliasing.
        prop_name: String,
        /// Optional alias for the output field.
        alias: Option<String>,
    },
    /// Projects a constant.
    Literal {
        /// The constant.
        value: Value,
        /// Output name.
        alias: String,
    },
}

impl ProjectField {
    /// Name the field is bound to in the output row.
    pub fn output_name(&self) -> String {
        match self {
            ProjectField::Var { var, alias } => alias.clone().unwrap_or_else(|| var.0.clone()),
            ProjectField::Prop {
                var,
                prop_name,
                alias,
                ..
            } => alias
                .clone()
                .unwrap_or_else(|| format!("{}.{}", var.0, prop_name)),
            ProjectField::Literal { alias, .. } => alias.clone(),
        }
    }
}

/// Aggregate function output.
#[derive(Clone, Debug)]
pub struct Aggregation {
    /// Output variable.
    pub as_var: Var,
    /// Function computed.
    pub func: AggregateFn,
}

/// Supported aggregate functions.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AggregateFn {
    /// Row count.
    Count,
    /// List of inputs.
    Collect,
    /// Numeric sum.
    Sum,
    /// Smallest input.
    Min,
    /// Largest input.
    Max,
}

impl AggregateFn {
    /// Static type and nullability of the aggregate result.
    pub fn result_type(self) -> (CypherType, bool) {
        match self {
            AggregateFn::Count => (CypherType::Integer, false),
            AggregateFn::Collect => (CypherType::list_of(CypherType::Any), false),
            AggregateFn::Sum => (CypherType::Number, false),
            AggregateFn::Min | AggregateFn::Max => (CypherType::Any, true),
        }
    }
}

/// Static type of a literal value.
pub fn literal_type(value: &Value) -> CypherType {
    match value {
        Value::Null => CypherType::Any,
        Value::Bool(_) => CypherType::Boolean,
        Value::Int(_) => CypherType::Integer,
        Value::Float(_) => CypherType::Float,
        Value::String(_) => CypherType::String,
        Value::Bytes(_) => CypherType::Any,
        Value::DateTime(_) => CypherType::DateTime,
        Value::Node(_) => CypherType::Node,
        Value::Relationship(_) => CypherType::Relationship,
        Value::List(items) => {
            let mut element: Option<CypherType> = None;
            for item in items {
                let ty = literal_type(item);
                element = Some(match element {
                    None => ty,
                    Some(current) => current.wider_of(&ty).unwrap_or(CypherType::Any),
                });
            }
            CypherType::list_of(element.unwrap_or(CypherType::Any))
        }
    }
}
