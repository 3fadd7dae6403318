#![allow(missing_docs)]

use std::sync::Once;

use sombra_slots::query::allocation::{CSV_FILE_NAME, CSV_LINE_NUMBER};
use sombra_slots::query::physical::{
    AggregateFn, Aggregation, Dir, PhysicalNode, PhysicalOp, PhysicalPlan, ProjectField, Var,
};
use sombra_slots::query::slots::{
    copy_cached_properties, copy_prefix, CachedPropertyKey, ExecutionRow, SlotConfigurationSize,
    SlottedRow, NULL_ENTITY,
};
use sombra_slots::query::{CypherType, Slot, SlotAllocator, SlotAllocatorConfig, Value};
use sombra_slots::types::{LabelId, NodeId, PlanId, PropId, Result};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("sombra_slots=debug"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .try_init();
    });
}

fn scan(id: i32, var: &str) -> PhysicalNode {
    PhysicalNode::new(
        id,
        PhysicalOp::LabelScan {
            label: LabelId(1),
            as_var: Var::from(var),
        },
    )
}

fn expand(
    id: i32,
    from: &str,
    edge: &str,
    to: &str,
    optional: bool,
    input: PhysicalNode,
) -> PhysicalNode {
    PhysicalNode::with_inputs(
        id,
        PhysicalOp::Expand {
            from: Var::from(from),
            edge: Var::from(edge),
            to: Var::from(to),
            dir: Dir::Out,
            ty: None,
            optional,
        },
        vec![input],
    )
}

#[test]
fn apply_hands_its_lhs_row_to_rhs_leaves() -> Result<()> {
    init_tracing();
    let rhs = expand(3, "a", "r", "b", false, PhysicalNode::new(1, PhysicalOp::Argument));
    let plan = PhysicalPlan::new(PhysicalNode::with_inputs(
        2,
        PhysicalOp::Apply,
        vec![scan(0, "a"), rhs],
    ));
    let allocation = SlotAllocator::default().allocate(&plan)?;

    let outer = allocation.slots_for(PlanId(0))?;
    assert_eq!(outer.size(), SlotConfigurationSize::new(2, 0));
    assert_eq!(outer.get_argument_long_offset_for(PlanId(2))?, 1);

    let inner = allocation.slots_for(PlanId(2))?;
    assert_eq!(allocation.argument_size_for(PlanId(1)), Some(outer.size()));
    assert_eq!(allocation.argument_size_for(PlanId(0)), Some(SlotConfigurationSize::ZERO));
    assert_eq!(inner.get_long_offset_for("a")?, 0);
    assert_eq!(inner.get_argument_long_offset_for(PlanId(2))?, 1);
    assert_eq!(inner.get_long_offset_for("r")?, 2);
    assert_eq!(inner.get_long_offset_for("b")?, 3);

    let mut outer_row = SlottedRow::new(outer.size());
    (outer.setter("a")?)(&mut outer_row, Value::Node(NodeId(42)))?;
    outer_row.set_long(1, 7);

    let mut inner_row = SlottedRow::new(inner.size());
    copy_prefix(&outer_row, &mut inner_row, outer.size());
    assert_eq!((inner.getter("a")?)(&inner_row), Value::Node(NodeId(42)));
    assert_eq!(inner_row.longs(), &[42, 7, NULL_ENTITY, NULL_ENTITY]);
    Ok(())
}

#[test]
fn cartesian_product_under_apply_skips_the_shared_argument() -> Result<()> {
    init_tracing();
    let product = PhysicalNode::with_inputs(
        3,
        PhysicalOp::CartesianProduct,
        vec![scan(4, "y"), scan(5, "z")],
    );
    let plan = PhysicalPlan::new(PhysicalNode::with_inputs(
        10,
        PhysicalOp::Apply,
        vec![scan(0, "x"), product],
    ));
    let allocation = SlotAllocator::default().allocate(&plan)?;

    let rhs = allocation.slots_for(PlanId(5))?;
    assert_eq!(rhs.get_long_offset_for("z")?, 2);

    let merged = allocation.slots_for(PlanId(3))?;
    assert_eq!(merged.size(), SlotConfigurationSize::new(4, 0));
    assert_eq!(merged.get_long_offset_for("x")?, 0);
    assert_eq!(merged.get_argument_long_offset_for(PlanId(10))?, 1);
    assert_eq!(merged.get_long_offset_for("y")?, 2);
    assert_eq!(merged.get_long_offset_for("z")?, 3);
    assert_eq!(merged.name_of_slot(3, true), Some("z"));
    Ok(())
}

#[test]
fn top_level_cartesian_product_leaves_inputs_untouched() -> Result<()> {
    init_tracing();
    let plan = PhysicalPlan::new(PhysicalNode::with_inputs(
        2,
        PhysicalOp::CartesianProduct,
        vec![scan(0, "a"), scan(1, "b")],
    ));
    let allocation = SlotAllocator::default().allocate(&plan)?;
    assert_eq!(allocation.len(), 3);
    assert_eq!(allocation.slots_for(PlanId(0))?.size(), SlotConfigurationSize::new(1, 0));
    assert_eq!(allocation.slots_for(PlanId(1))?.get_long_offset_for("b")?, 0);
    let merged = allocation.slots_for(PlanId(2))?;
    assert_eq!(merged.get_long_offset_for("a")?, 0);
    assert_eq!(merged.get_long_offset_for("b")?, 1);
    Ok(())
}

#[test]
fn aggregation_starts_a_fresh_layout() -> Result<()> {
    init_tracing();
    let input = expand(1, "n", "r", "m", false, scan(0, "n"));
    let plan = PhysicalPlan::new(PhysicalNode::with_inputs(
        2,
        PhysicalOp::Aggregate {
            grouping: vec![Var::from("m")],
            aggregates: vec![Aggregation {
                as_var: Var::from("c"),
                func: AggregateFn::Count,
            }],
        },
        vec![input],
    ));
    let allocation = SlotAllocator::default().allocate(&plan)?;
    let slots = allocation.slots_for(PlanId(2))?;
    assert_eq!(slots.size(), SlotConfigurationSize::new(1, 1));
    assert!(slots.get("n").is_none());
    assert_eq!(slots.get_long_offset_for("m")?, 0);
    assert_eq!(
        slots.get("c"),
        Some(&Slot::reference(0, false, CypherType::Integer))
    );
    assert_eq!(allocation.slots_for(PlanId(1))?.number_of_longs(), 3);
    Ok(())
}

#[test]
fn optional_expand_produces_nullable_entities() -> Result<()> {
    init_tracing();
    let plan = PhysicalPlan::new(expand(1, "a", "r", "b", true, scan(0, "a")));
    let allocation = SlotAllocator::default().allocate(&plan)?;
    let slots = allocation.slots_for(PlanId(1))?;
    assert!(!slots.get("a").map(Slot::is_nullable).unwrap_or(true));
    assert!(slots.get("r").map(Slot::is_nullable).unwrap_or(false));

    let mut row = SlottedRow::new(slots.size());
    assert_eq!((slots.getter("b")?)(&row), Value::Null);
    (slots.setter("b")?)(&mut row, Value::Null)?;
    assert_eq!(row.get_long(2), NULL_ENTITY);

    let err = (slots.setter("a")?)(&mut row, Value::Null).unwrap_err();
    assert_eq!(err.code(), "TypeMismatch");

    let set_rel = slots
        .maybe_primitive_relationship_setter("r")
        .expect("relationship setter");
    set_rel(&mut row, 9)?;
    assert_eq!(row.get_long(1), 9);
    assert!(slots.maybe_primitive_node_setter("r").is_none());
    Ok(())
}

#[test]
fn projection_aliases_and_allocates_values() -> Result<()> {
    init_tracing();
    let plan = PhysicalPlan::new(PhysicalNode::with_inputs(
        1,
        PhysicalOp::Project {
            fields: vec![
                ProjectField::Var {
                    var: Var::from("a"),
                    alias: Some("x".to_owned()),
                },
                ProjectField::Prop {
                    var: Var::from("a"),
                    prop: PropId(3),
                    prop_name: "name".to_owned(),
                    alias: None,
                },
                ProjectField::Literal {
                    value: Value::Int(1),
                    alias: "one".to_owned(),
                },
            ],
        },
        vec![scan(0, "a")],
    ));
    let allocation = SlotAllocator::default().allocate(&plan)?;
    let slots = allocation.slots_for(PlanId(1))?;

    assert!(slots.is_alias("x"));
    assert_eq!(slots.get("x"), slots.get("a"));
    assert_eq!(slots.get("a.name"), Some(&Slot::reference(0, true, CypherType::Any)));
    assert_eq!(slots.get("one"), Some(&Slot::reference(1, false, CypherType::Integer)));

    let mut row = SlottedRow::new(slots.size());
    (slots.setter("x")?)(&mut row, Value::Node(NodeId(5)))?;
    assert_eq!((slots.getter("a")?)(&row), Value::Node(NodeId(5)));
    (slots.setter("one")?)(&mut row, Value::Int(1))?;
    assert_eq!(row.refs()[1], Value::Int(1));
    Ok(())
}

#[test]
fn cached_properties_follow_rows() -> Result<()> {
    init_tracing();
    let age = CachedPropertyKey::node("n", "age");
    let plan = PhysicalPlan::new(PhysicalNode::with_inputs(
        1,
        PhysicalOp::CacheProperties {
            props: vec![age.clone()],
        },
        vec![scan(0, "n")],
    ));
    let allocation = SlotAllocator::default().allocate(&plan)?;
    let slots = allocation.slots_for(PlanId(1))?;
    let offset = slots.get_cached_property_offset_for(&age)?;

    let mut from = SlottedRow::new(slots.size());
    from.set_ref(offset, Value::Int(30));
    let mut to = SlottedRow::new(slots.size());
    copy_cached_properties(slots, &from, &mut to);
    assert_eq!(to.get_ref(offset), &Value::Int(30));
    Ok(())
}

#[test]
fn load_csv_reserves_line_metadata() -> Result<()> {
    init_tracing();
    let plan = PhysicalPlan::new(PhysicalNode::new(
        0,
        PhysicalOp::LoadCsv {
            as_var: Var::from("line"),
            with_headers: true,
        },
    ));
    let allocation = SlotAllocator::default().allocate(&plan)?;
    let slots = allocation.slots_for(PlanId(0))?;
    assert_eq!(slots.get("line").map(Slot::ty), Some(&CypherType::Map));
    assert_eq!(slots.get_meta_data_offset_for(CSV_LINE_NUMBER)?, 1);
    assert_eq!(slots.get_meta_data_offset_for(CSV_FILE_NAME)?, 2);
    assert_eq!(slots.size(), SlotConfigurationSize::new(0, 3));
    Ok(())
}

#[test]
fn toml_config_can_disable_accessors() -> Result<()> {
    init_tracing();
    let config =
        SlotAllocatorConfig::from_toml_str("generate_accessors = false\ncapacity_hint = 4")?;
    let allocation = SlotAllocator::new(config).allocate(&PhysicalPlan::new(scan(0, "a")))?;
    let slots = allocation.slots_for(PlanId(0))?;
    assert_eq!(slots.getter("a").err().map(|err| err.code()), Some("UnknownKey"));
    assert!(slots.is_finalized());

    let err = SlotAllocatorConfig::from_toml_str("capacity_hint = \"many\"").unwrap_err();
    assert_eq!(err.code(), "Config");
    Ok(())
}

#[test]
fn missing_plan_ids_are_reported() -> Result<()> {
    let allocation = SlotAllocator::default().allocate(&PhysicalPlan::new(scan(0, "a")))?;
    let err = allocation.slots_for(PlanId(99)).unwrap_err();
    assert_eq!(err.code(), "InvalidPlan");
    assert!(allocation.argument_size_for(PlanId(99)).is_none());
    Ok(())
}
