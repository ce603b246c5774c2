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


//! Integration tests for fragment generation and compiled unit reuse

use std::sync::Arc;

use sqljit::compiler::driver::compile_generated;
use sqljit::compiler::{partition, CompilerConfig, CompilerManager, GeneratedUnit};
use sqljit::executor::{ExecutionMode, QueryRunner};
use sqljit::expression::Expression;
use sqljit::plan::{
    FilterNode, JoinNode, MapScanNode, PlanBuilder, PlanNodeKind, PlanTree, QueryPath,
    TopObjectDescriptor,
};
use sqljit::storage::{MapContainer, Storage};
use sqljit::{ComparisonMode, DataType, Error, ObjectValue};

fn storage() -> Arc<Storage> {
    let mut storage = Storage::new();
    for name in ["points", "other_points"] {
        let mut map = MapContainer::with_partitions(name, 2);
        for i in 0..6 {
            map.put(i, ObjectValue::new("Point").with("c", i % 3).with("d", i * 2));
        }
        storage.register(map);
    }
    Arc::new(storage)
}

fn scan(map_name: &str) -> MapScanNode {
    MapScanNode {
        map_name: map_name.to_string(),
        key_descriptor: TopObjectDescriptor::Scalar(DataType::Int),
        value_descriptor: TopObjectDescriptor::class("Point"),
        field_paths: vec![QueryPath::value_field("c"), QueryPath::value_field("d")],
        field_types: vec![DataType::Int, DataType::Int],
        projects: vec![0, 1],
        filter: None,
    }
}

fn filtered_plan(map_name: &str, condition: Expression) -> PlanTree {
    let mut b = PlanBuilder::new();
    b.add(1, PlanNodeKind::MapScan(scan(map_name)), &[])
        .expect("scan");
    b.add(2, PlanNodeKind::Filter(FilterNode { condition }), &[1])
        .expect("filter");
    b.add(3, PlanNodeKind::Root, &[2]).expect("root");
    b.build(3).expect("build")
}

fn generate(tree: &PlanTree) -> GeneratedUnit {
    let fragments = partition(tree).expect("Partitioning failed");
    assert_eq!(fragments.len(), 1);
    fragments[0].generate().expect("Generation failed")
}

fn c() -> Expression {
    Expression::column(0, DataType::Int)
}

/// Map names and interpreted sub-expressions are bound at prepare time,
/// so they do not change the generated unit
#[test]
fn test_bound_state_does_not_change_unit_name() {
    let halves = |divisor: i32| {
        Expression::equals(
            Expression::divide(c(), Expression::constant(divisor), DataType::Int),
            Expression::constant(0),
        )
    };
    let a = generate(&filtered_plan("points", halves(2)));
    let b = generate(&filtered_plan("other_points", halves(3)));
    assert_eq!(a, b);

    // Inlined constants are part of the source
    let inlined = |value: i32| Expression::equals(c(), Expression::constant(value));
    let x = generate(&filtered_plan("points", inlined(1)));
    let y = generate(&filtered_plan("points", inlined(2)));
    assert_ne!(x.qualified_name, y.qualified_name);
    assert!(x.source.contains(": Int = 1;"));
}

#[test]
fn test_runner_reuses_cached_units() {
    let runner = QueryRunner::new(storage(), CompilerConfig::default());
    let condition = Expression::comparison(ComparisonMode::GreaterThan, c(), Expression::constant(0));

    let first = runner
        .run(&filtered_plan("points", condition.clone()))
        .expect("Run failed");
    let second = runner
        .run(&filtered_plan("other_points", condition))
        .expect("Run failed");
    assert_eq!(first.mode, ExecutionMode::Compiled);
    assert_eq!(second.mode, ExecutionMode::Compiled);
    assert_eq!(first.rows, second.rows);
    assert_eq!(first.rows.len(), 4);

    let stats = runner.manager().stats();
    assert_eq!((stats.hits, stats.misses, stats.entries), (1, 1, 1));
}

/// Each side of an interpreted join compiles into its own unit
#[test]
fn test_join_of_two_fragments() {
    let mut b = PlanBuilder::new();
    b.add(1, PlanNodeKind::MapScan(scan("points")), &[]).expect("scan");
    b.add(
        2,
        PlanNodeKind::Filter(FilterNode {
            condition: Expression::equals(c(), Expression::constant(0)),
        }),
        &[1],
    )
    .expect("filter");
    b.add(3, PlanNodeKind::MapScan(scan("other_points")), &[])
        .expect("scan");
    b.add(
        4,
        PlanNodeKind::NestedLoopJoin(JoinNode {
            condition: Some(Expression::comparison(
                ComparisonMode::LessThan,
                Expression::column(1, DataType::Int),
                Expression::column(3, DataType::Int),
            )),
        }),
        &[2, 3],
    )
    .expect("join");
    b.add(5, PlanNodeKind::Root, &[4]).expect("root");
    let tree = b.build(5).expect("build");

    let fragments = partition(&tree).expect("Partitioning failed");
    let mut primaries: Vec<i32> = fragments.iter().map(|f| f.primary_id()).collect();
    primaries.sort_unstable();
    assert_eq!(primaries, vec![2, 3]);

    let runner = QueryRunner::new(storage(), CompilerConfig::default());
    let compiled = runner.run(&tree).expect("Run failed");
    assert_eq!(compiled.mode, ExecutionMode::Compiled);
    let interpreted = runner
        .run_interpreted(&tree, &runner.context())
        .expect("Run failed");

    let mut compiled_rows = compiled.rows;
    let mut interpreted_rows = interpreted;
    compiled_rows.sort_by_key(|r| r.to_string());
    interpreted_rows.sort_by_key(|r| r.to_string());
    assert_eq!(compiled_rows, interpreted_rows);
    // Left d is 0 or 6, right d ranges over 0..=10 in steps of 2
    assert_eq!(compiled_rows.len(), 5 + 2);
}

#[test]
fn test_name_mismatch_is_a_compilation_error() {
    let mut generated = generate(&filtered_plan("points", Expression::is_null(c())));
    generated.qualified_name = "sql.compiled.Other".to_string();
    let err = compile_generated(&generated).expect_err("Mismatched name should fail");
    assert!(err.is_fallback());
    match err {
        Error::Compilation {
            unit, source_text, ..
        } => {
            assert_eq!(unit, "sql.compiled.Other");
            assert_eq!(source_text, generated.source);
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn test_manager_template_covers_fragments() {
    let manager = CompilerManager::default();
    let tree = filtered_plan("points", Expression::is_null(c()));
    let template = manager.template(&tree).expect("Plan should compile");
    assert_eq!(template.units().len(), 1);
    assert!(template.subsumes(1));
    assert!(template.subsumes(2));
    assert!(!template.subsumes(3));
}
