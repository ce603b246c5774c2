// Copyright 2025 Stoolap Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.


//! Compiled and interpreted expression evaluation must agree
//!
//! Every expression is run once as a projection and, when boolean, once as
//! a filter. The compiled plan output (or error) must equal the output of
//! interpreting the same plan.

use std::sync::Arc;

use sqljit::compiler::CompilerConfig;
use sqljit::executor::{ExecutionMode, QueryRunner};
use sqljit::expression::Expression;
use sqljit::plan::{
    FilterNode, MapScanNode, PlanBuilder, PlanNodeKind, PlanTree, ProjectNode, QueryPath,
    TopObjectDescriptor,
};
use sqljit::storage::{MapContainer, Storage};
use sqljit::{ComparisonMode, DataType, Error, ObjectValue, Result, Row, Value};

fn storage_with(values: &[(Value, Value)]) -> Arc<Storage> {
    let mut map = MapContainer::with_partitions("points", 3);
    for (key, (c, d)) in values.iter().enumerate() {
        map.put(
            key as i32,
            ObjectValue::new("Point")
                .with("c", c.clone())
                .with("d", d.clone()),
        );
    }
    let mut storage = Storage::new();
    storage.register(map);
    Arc::new(storage)
}

/// Nulls, zero, negatives and mixed signs
fn edge_values() -> Arc<Storage> {
    storage_with(&[
        (Value::Int(0), Value::Int(0)),
        (Value::Int(1), Value::Int(-1)),
        (Value::Int(-5), Value::Int(3)),
        (Value::Null, Value::Int(2)),
        (Value::Int(7), Value::Null),
        (Value::Null, Value::Null),
        (Value::Int(12), Value::Int(12)),
    ])
}

fn scan() -> MapScanNode {
    MapScanNode {
        map_name: "points".to_string(),
        key_descriptor: TopObjectDescriptor::Scalar(DataType::Int),
        value_descriptor: TopObjectDescriptor::class("Point"),
        field_paths: vec![QueryPath::value_field("c"), QueryPath::value_field("d")],
        field_types: vec![DataType::Int, DataType::Int],
        projects: vec![0, 1],
        filter: None,
    }
}

fn project_plan(expression: Expression) -> PlanTree {
    let mut b = PlanBuilder::new();
    b.add(1, PlanNodeKind::MapScan(scan()), &[]).expect("scan");
    b.add(
        2,
        PlanNodeKind::Project(ProjectNode {
            projects: vec![expression],
        }),
        &[1],
    )
    .expect("project");
    b.add(3, PlanNodeKind::Root, &[2]).expect("root");
    b.build(3).expect("build")
}

fn filter_plan(condition: Expression) -> PlanTree {
    let mut b = PlanBuilder::new();
    b.add(1, PlanNodeKind::MapScan(scan()), &[]).expect("scan");
    b.add(2, PlanNodeKind::Filter(FilterNode { condition }), &[1])
        .expect("filter");
    b.add(3, PlanNodeKind::Root, &[2]).expect("root");
    b.build(3).expect("build")
}

/// Run both ways and return the common result
fn run_both(storage: Arc<Storage>, tree: &PlanTree) -> Result<Vec<Row>> {
    let runner = QueryRunner::new(storage, CompilerConfig::default());
    let interpreted = runner.run_interpreted(tree, &runner.context());
    let compiled = runner.run(tree).map(|output| {
        assert_eq!(output.mode, ExecutionMode::Compiled);
        output.rows
    });
    assert_eq!(compiled, interpreted, "plan {:?}", tree.root());
    compiled
}

fn c() -> Expression {
    Expression::column(0, DataType::Int)
}

fn d() -> Expression {
    Expression::column(1, DataType::Int)
}

fn cmp(mode: ComparisonMode, l: Expression, r: Expression) -> Expression {
    Expression::comparison(mode, l, r)
}

fn column_of(rows: &[Row]) -> Vec<Value> {
    rows.iter().map(|r| r[0].clone()).collect()
}

#[test]
fn test_arithmetic_projections() {
    let expressions = vec![
        Expression::plus(c(), d(), DataType::Int),
        Expression::minus(c(), d(), DataType::Int),
        Expression::multiply(c(), d(), DataType::Int),
        Expression::plus(c(), Expression::constant(-3), DataType::Int),
        Expression::multiply(c(), Expression::constant(2i64), DataType::BigInt),
        Expression::minus(Expression::constant(1.5), d(), DataType::Double),
        Expression::plus(c(), Expression::null(DataType::Int), DataType::Int),
    ];
    for expression in expressions {
        let rows = run_both(edge_values(), &project_plan(expression)).expect("Run failed");
        assert_eq!(rows.len(), 7);
    }
}

#[test]
fn test_arithmetic_null_propagation() {
    let rows = run_both(
        edge_values(),
        &project_plan(Expression::plus(c(), d(), DataType::Int)),
    )
    .expect("Run failed");
    let nulls = column_of(&rows).iter().filter(|v| v.is_null()).count();
    assert_eq!(nulls, 3);
}

#[test]
fn test_comparison_modes() {
    let modes = [
        ComparisonMode::Equals,
        ComparisonMode::NotEquals,
        ComparisonMode::LessThan,
        ComparisonMode::LessThanOrEqual,
        ComparisonMode::GreaterThan,
        ComparisonMode::GreaterThanOrEqual,
    ];
    for mode in modes {
        run_both(edge_values(), &project_plan(cmp(mode, c(), d()))).expect("Run failed");
        run_both(edge_values(), &filter_plan(cmp(mode, c(), d()))).expect("Run failed");
        // INT against BIGINT compares as BIGINT
        run_both(
            edge_values(),
            &filter_plan(cmp(mode, c(), Expression::constant(1i64))),
        )
        .expect("Run failed");
    }
}

#[test]
fn test_three_valued_logic() {
    let positive_c = cmp(ComparisonMode::GreaterThan, c(), Expression::constant(0));
    let positive_d = cmp(ComparisonMode::GreaterThan, d(), Expression::constant(0));
    let expressions = vec![
        Expression::and(positive_c.clone(), positive_d.clone()),
        Expression::or(positive_c.clone(), positive_d.clone()),
        Expression::not(positive_c.clone()),
        Expression::not(Expression::and(positive_c.clone(), positive_d.clone())),
        Expression::or(Expression::is_null(c()), Expression::is_null(d())),
        Expression::and(positive_c, Expression::constant(true)),
    ];
    for expression in expressions {
        run_both(edge_values(), &project_plan(expression.clone())).expect("Run failed");
        run_both(edge_values(), &filter_plan(expression)).expect("Run failed");
    }
}

#[test]
fn test_and_with_null_operand() {
    // (c > 0) AND NULL is FALSE only where c <= 0
    let condition = Expression::not(Expression::and(
        cmp(ComparisonMode::GreaterThan, c(), Expression::constant(0)),
        Expression::null(DataType::Boolean),
    ));
    let rows = run_both(edge_values(), &filter_plan(condition)).expect("Run failed");
    let mut cs = column_of(&rows);
    cs.sort_by_key(|v| v.to_string());
    assert_eq!(cs, vec![Value::Int(-5), Value::Int(0)]);
}

#[test]
fn test_comparison_with_null_constant_drops_every_row() {
    let condition = Expression::equals(c(), Expression::null(DataType::Int));
    let rows = run_both(edge_values(), &filter_plan(condition)).expect("Run failed");
    assert!(rows.is_empty());
}

#[test]
fn test_is_null() {
    let rows = run_both(edge_values(), &filter_plan(Expression::is_null(c()))).expect("Run failed");
    assert_eq!(rows.len(), 2);
}

#[test]
fn test_fallback_expressions() {
    let expressions = vec![
        Expression::abs(c()),
        Expression::cast(c(), DataType::Double),
        Expression::plus(
            Expression::divide(c(), Expression::constant(2), DataType::Int),
            d(),
            DataType::Int,
        ),
    ];
    for expression in expressions {
        run_both(edge_values(), &project_plan(expression)).expect("Run failed");
    }
}

#[test]
fn test_division_by_zero_fails_on_both_paths() {
    let err = run_both(
        edge_values(),
        &project_plan(Expression::divide(c(), d(), DataType::Int)),
    )
    .expect_err("Division by zero should fail");
    assert_eq!(err, Error::DivisionByZero);
}

#[test]
fn test_overflow_fails_on_both_paths() {
    let storage = || {
        storage_with(&[
            (Value::Int(1), Value::Int(1)),
            (Value::Int(i32::MAX), Value::Int(1)),
        ])
    };
    let err = run_both(storage(), &project_plan(Expression::plus(c(), d(), DataType::Int)))
        .expect_err("INT overflow should fail");
    assert!(matches!(err, Error::ArithmeticOverflow(_)));

    // Widening to BIGINT first does not overflow
    let rows = run_both(
        storage(),
        &project_plan(Expression::plus(c(), d(), DataType::BigInt)),
    )
    .expect("Run failed");
    let mut sums = column_of(&rows);
    sums.sort_by_key(|v| v.to_string());
    assert_eq!(
        sums,
        vec![Value::BigInt(2), Value::BigInt(i64::from(i32::MAX) + 1)]
    );
}

// =============================================================================
// Typed fields: BIGINT, DOUBLE, VARCHAR and BOOLEAN columns
// =============================================================================

const TYPED_FIELDS: [(&str, DataType); 5] = [
    ("i", DataType::Int),
    ("b", DataType::BigInt),
    ("x", DataType::Double),
    ("s", DataType::Varchar),
    ("f", DataType::Boolean),
];

fn typed_row(i: Value, b: Value, x: Value, s: Value, f: Value) -> ObjectValue {
    ObjectValue::new("Sample")
        .with("i", i)
        .with("b", b)
        .with("x", x)
        .with("s", s)
        .with("f", f)
}

/// Boundary integers, non-finite doubles and strings with control characters
fn typed_values() -> Arc<Storage> {
    let rows = vec![
        typed_row(
            Value::Int(0),
            Value::BigInt(0),
            Value::Double(0.0),
            Value::from(""),
            Value::Boolean(false),
        ),
        typed_row(
            Value::Int(i32::MIN),
            Value::BigInt(i64::MIN),
            Value::Double(f64::NEG_INFINITY),
            Value::from("a\0b"),
            Value::Boolean(true),
        ),
        typed_row(
            Value::Int(i32::MAX),
            Value::BigInt(i64::MAX),
            Value::Double(f64::INFINITY),
            Value::from("tab\there \"q\" \\"),
            Value::Boolean(false),
        ),
        typed_row(
            Value::Int(-1),
            Value::BigInt(-1),
            Value::Double(f64::NAN),
            Value::from("\u{1b}[0m"),
            Value::Boolean(true),
        ),
        typed_row(
            Value::Int(42),
            Value::BigInt(1 << 40),
            Value::Double(-0.0),
            Value::from("é\u{2028}"),
            Value::Null,
        ),
        typed_row(
            Value::Null,
            Value::Null,
            Value::Null,
            Value::Null,
            Value::Boolean(true),
        ),
        typed_row(
            Value::Int(7),
            Value::BigInt(7),
            Value::Double(1.5e-7),
            Value::from("line\nbreak"),
            Value::Boolean(false),
        ),
    ];
    let mut map = MapContainer::with_partitions("typed", 3);
    for (key, row) in rows.into_iter().enumerate() {
        map.put(key as i32, row);
    }
    let mut storage = Storage::new();
    storage.register(map);
    Arc::new(storage)
}

fn typed_scan() -> MapScanNode {
    MapScanNode {
        map_name: "typed".to_string(),
        key_descriptor: TopObjectDescriptor::Scalar(DataType::Int),
        value_descriptor: TopObjectDescriptor::class("Sample"),
        field_paths: TYPED_FIELDS
            .iter()
            .map(|(name, _)| QueryPath::value_field(*name))
            .collect(),
        field_types: TYPED_FIELDS.iter().map(|(_, ty)| *ty).collect(),
        projects: (0..TYPED_FIELDS.len()).collect(),
        filter: None,
    }
}

fn typed_plan(kind: PlanNodeKind) -> PlanTree {
    let mut b = PlanBuilder::new();
    b.add(1, PlanNodeKind::MapScan(typed_scan()), &[])
        .expect("scan");
    b.add(2, kind, &[1]).expect("operator");
    b.add(3, PlanNodeKind::Root, &[2]).expect("root");
    b.build(3).expect("build")
}

/// Like [`run_both`], comparing through `Debug` so NaN rows match NaN rows
fn run_typed(kind: PlanNodeKind) -> Result<Vec<Row>> {
    let tree = typed_plan(kind);
    let runner = QueryRunner::new(typed_values(), CompilerConfig::default());
    let interpreted = runner.run_interpreted(&tree, &runner.context());
    let compiled = runner.run(&tree).map(|output| {
        assert_eq!(output.mode, ExecutionMode::Compiled);
        output.rows
    });
    assert_eq!(
        format!("{:?}", compiled),
        format!("{:?}", interpreted),
        "plan {:?}",
        tree.root()
    );
    compiled
}

fn typed_project(expression: Expression) -> Result<Vec<Row>> {
    run_typed(PlanNodeKind::Project(ProjectNode {
        projects: vec![expression],
    }))
}

fn typed_filter(condition: Expression) -> Result<Vec<Row>> {
    run_typed(PlanNodeKind::Filter(FilterNode { condition }))
}

fn field(name: &str) -> Expression {
    let index = TYPED_FIELDS
        .iter()
        .position(|(n, _)| *n == name)
        .expect("typed field");
    Expression::column(index, TYPED_FIELDS[index].1)
}

const ALL_MODES: [ComparisonMode; 6] = [
    ComparisonMode::Equals,
    ComparisonMode::NotEquals,
    ComparisonMode::LessThan,
    ComparisonMode::LessThanOrEqual,
    ComparisonMode::GreaterThan,
    ComparisonMode::GreaterThanOrEqual,
];

#[test]
fn test_typed_field_passthrough() {
    let rows = run_typed(PlanNodeKind::Filter(FilterNode {
        condition: Expression::constant(true),
    }))
    .expect("Run failed");
    assert_eq!(rows.len(), 7);
    assert!(rows
        .iter()
        .any(|r| r[3] == Value::from("a\0b") && r[1] == Value::BigInt(i64::MIN)));
}

#[test]
fn test_typed_comparison_matrix() {
    let pairs = vec![
        (field("b"), field("i")),
        (field("b"), Expression::constant(i64::MAX)),
        (field("b"), Expression::constant(i64::MIN)),
        (field("i"), Expression::constant(i32::MIN)),
        (field("i"), Expression::constant(i32::MAX)),
        (field("x"), field("b")),
        (field("x"), Expression::constant(0.0)),
        (field("x"), Expression::constant(-1.5e300)),
        (field("x"), field("x")),
        (field("s"), Expression::constant("")),
        (field("s"), Expression::constant("a\0b")),
        (field("s"), Expression::constant("tab\there \"q\" \\")),
        (field("s"), field("s")),
        (field("f"), Expression::constant(true)),
        (field("f"), field("f")),
    ];
    for mode in ALL_MODES {
        for (left, right) in &pairs {
            typed_project(cmp(mode, left.clone(), right.clone())).expect("Run failed");
            typed_filter(cmp(mode, left.clone(), right.clone())).expect("Run failed");
        }
    }
}

#[test]
fn test_typed_arithmetic_matrix() {
    let expressions = vec![
        Expression::minus(field("b"), field("i"), DataType::BigInt),
        Expression::minus(field("b"), Expression::constant(0i64), DataType::BigInt),
        Expression::multiply(field("i"), Expression::constant(1i64), DataType::BigInt),
        Expression::plus(field("x"), field("x"), DataType::Double),
        Expression::minus(field("x"), field("x"), DataType::Double),
        Expression::multiply(field("x"), field("b"), DataType::Double),
        Expression::plus(field("i"), Expression::constant(0.25), DataType::Double),
        Expression::multiply(field("x"), Expression::constant(-0.0), DataType::Double),
    ];
    for expression in expressions {
        let rows = typed_project(expression).expect("Run failed");
        assert_eq!(rows.len(), 7);
    }
}

#[test]
fn test_typed_overflow_fails_on_both_paths() {
    let err = typed_project(Expression::plus(
        field("b"),
        Expression::constant(i64::MAX),
        DataType::BigInt,
    ))
    .expect_err("BIGINT overflow should fail");
    assert!(matches!(err, Error::ArithmeticOverflow(_)));

    let err = typed_project(Expression::minus(
        field("i"),
        Expression::constant(1),
        DataType::Int,
    ))
    .expect_err("INT underflow should fail");
    assert!(matches!(err, Error::ArithmeticOverflow(_)));
}

#[test]
fn test_nan_and_infinite_doubles() {
    // NaN compares false under every ordering, so it never passes these filters
    let rows = typed_filter(Expression::or(
        cmp(ComparisonMode::LessThan, field("x"), Expression::constant(0.0)),
        cmp(ComparisonMode::GreaterThanOrEqual, field("x"), Expression::constant(0.0)),
    ))
    .expect("Run failed");
    assert_eq!(rows.len(), 5);
    assert!(rows.iter().all(|r| match &r[2] {
        Value::Double(v) => !v.is_nan(),
        _ => false,
    }));

    // inf - inf is NaN on both paths
    let rows = typed_project(Expression::minus(field("x"), field("x"), DataType::Double))
        .expect("Run failed");
    let nans = rows
        .iter()
        .filter(|r| matches!(r[0], Value::Double(v) if v.is_nan()))
        .count();
    assert_eq!(nans, 3);
}

#[test]
fn test_non_finite_double_constants() {
    // Non-finite literals are evaluated through the expression handle
    for constant in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
        typed_filter(cmp(
            ComparisonMode::LessThan,
            field("x"),
            Expression::constant(constant),
        ))
        .expect("Run failed");
        typed_project(Expression::plus(
            field("x"),
            Expression::constant(constant),
            DataType::Double,
        ))
        .expect("Run failed");
    }
    let rows = typed_filter(Expression::equals(
        field("x"),
        Expression::constant(f64::INFINITY),
    ))
    .expect("Run failed");
    assert_eq!(rows.len(), 1);
}

#[test]
fn test_varchar_constants_with_control_characters() {
    let cases = [
        ("a\0b", 1),
        ("tab\there \"q\" \\", 1),
        ("\u{1b}[0m", 1),
        ("é\u{2028}", 1),
        ("line\nbreak", 1),
        ("", 1),
        ("\0", 0),
    ];
    for (text, expected) in cases {
        let rows = typed_filter(Expression::equals(field("s"), Expression::constant(text)))
            .expect("Run failed");
        assert_eq!(rows.len(), expected, "filter on {:?}", text);

        let rows = typed_project(Expression::constant(text)).expect("Run failed");
        assert!(rows.iter().all(|r| r[0] == Value::from(text)));
    }
}

// =============================================================================
// Large expressions
// =============================================================================

/// Balanced OR of `c == k` for every k in `keys`
fn balanced_or(keys: &[i32]) -> Expression {
    match keys {
        [k] => Expression::equals(c(), Expression::constant(*k)),
        _ => {
            let (l, r) = keys.split_at(keys.len() / 2);
            Expression::or(balanced_or(l), balanced_or(r))
        }
    }
}

#[test]
fn test_filter_wider_than_u16_operands() {
    // Roughly 75k locals and constants in one routine
    let keys: Vec<i32> = (5..25_005).collect();
    let values: Vec<(Value, Value)> = (0..10)
        .map(|k| (Value::Int(k), Value::Int(-k)))
        .collect();
    let rows =
        run_both(storage_with(&values), &filter_plan(balanced_or(&keys))).expect("Run failed");
    let mut cs = column_of(&rows);
    cs.sort_by_key(|v| match v {
        Value::Int(k) => *k,
        _ => i32::MIN,
    });
    assert_eq!(cs, (5..10).map(Value::Int).collect::<Vec<_>>());
}
