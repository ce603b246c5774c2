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

//! Fragment partitioning
//!
//! Splits a plan into maximal runs of compilable nodes. The plan is walked
//! post-order with a stack holding one generator per output that has not
//! been consumed yet:
//!
//! ```text
//! Root#4          Unsupported(4)
//!   Sort#3    =>    Unsupported(3)
//!     Filter#2        NonTerminal ─ Filter(2) ─ MapScan(1)   <- fragment
//!       MapScan#1
//! ```
//!
//! A compilable node whose consumer is interpreted ends a fragment. The
//! fragment is wrapped in a [`NonTerminalGenerator`] that hands finished
//! rows to the consumer through the batch.

use std::sync::Arc;

use super::codegen::{
    CodeGenerator, FilterGenerator, GeneratorNode, MapScanGenerator, NonTerminalGenerator,
    ProjectGenerator,
};
use super::driver::{CompilerResult, FragmentCompiler, GeneratedUnit};
use crate::core::{Error, Result};
use crate::plan::{PlanNode, PlanNodeKind, PlanTree};

/// A maximal compilable run of plan nodes
#[derive(Debug, Clone)]
pub struct Fragment {
    root: GeneratorNode,
    primary_id: i32,
    subsumed_ids: Vec<i32>,
}

impl Fragment {
    fn new(root: GeneratorNode) -> Self {
        let mut subsumed_ids = Vec::new();
        for node in root.post_order() {
            if !subsumed_ids.contains(&node.node_id()) {
                subsumed_ids.push(node.node_id());
            }
        }
        Self {
            primary_id: root.node_id(),
            root,
            subsumed_ids,
        }
    }

    /// Top generator of the fragment (the non-terminal adapter)
    pub fn root(&self) -> &GeneratorNode {
        &self.root
    }

    /// Plan node whose executor the compiled unit replaces
    pub fn node(&self) -> &Arc<PlanNode> {
        self.root.node()
    }

    pub fn primary_id(&self) -> i32 {
        self.primary_id
    }

    /// Every plan node id the fragment covers, upstream first
    pub fn subsumed_ids(&self) -> &[i32] {
        &self.subsumed_ids
    }

    pub fn contains(&self, node_id: i32) -> bool {
        self.subsumed_ids.contains(&node_id)
    }

    /// Emit the source of the fragment's unit
    pub fn generate(&self) -> Result<GeneratedUnit> {
        FragmentCompiler::new(self).generate()
    }

    /// Emit and compile the fragment's unit
    pub fn compile(&self) -> Result<CompilerResult> {
        FragmentCompiler::new(self).compile()
    }
}

/// Post-order partitioner over a [`PlanTree`]
#[derive(Debug, Default)]
pub struct FragmentPartitioner {
    stack: Vec<GeneratorNode>,
    fragments: Vec<Fragment>,
}

impl FragmentPartitioner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Partition a plan. Fragments are returned in completion order.
    pub fn partition(mut self, tree: &PlanTree) -> Result<Vec<Fragment>> {
        for node in tree.post_order() {
            self.visit(node)?;
        }
        if self.stack.len() != 1 {
            return Err(Error::plan_invariant(format!(
                "{} generators left after partitioning, expected 1",
                self.stack.len()
            )));
        }
        if let Some(last) = self.stack.pop() {
            self.finalize(last);
        }
        Ok(self.fragments)
    }

    fn visit(&mut self, node: &Arc<PlanNode>) -> Result<()> {
        let id = node.id();
        match node.kind() {
            PlanNodeKind::MapScan(scan) => {
                let generator = match MapScanGenerator::new(id, scan) {
                    Ok(g) => CodeGenerator::MapScan(g),
                    Err(Error::Unsupported(reason)) => {
                        tracing::debug!(node_id = id, %reason, "map scan stays interpreted");
                        CodeGenerator::Unsupported(id)
                    }
                    Err(e) => return Err(e),
                };
                self.stack.push(GeneratorNode::new(Arc::clone(node), generator, Vec::new()));
                Ok(())
            }
            PlanNodeKind::Filter(filter) if self.top_is_compilable() => {
                self.push_over_input(node, CodeGenerator::Filter(FilterGenerator::new(id, filter)))
            }
            PlanNodeKind::Project(project) if self.top_is_compilable() => self.push_over_input(
                node,
                CodeGenerator::Project(ProjectGenerator::new(id, project)),
            ),
            _ => {
                let inputs = self.pop_inputs(node)?;
                for input in inputs {
                    self.finalize(input);
                }
                self.stack.push(GeneratorNode::new(
                    Arc::clone(node),
                    CodeGenerator::Unsupported(id),
                    Vec::new(),
                ));
                Ok(())
            }
        }
    }

    fn top_is_compilable(&self) -> bool {
        self.stack.last().is_some_and(GeneratorNode::is_compilable)
    }

    /// Push a single-input generator on top of its compilable input
    fn push_over_input(&mut self, node: &Arc<PlanNode>, generator: CodeGenerator) -> Result<()> {
        let inputs = self.pop_inputs(node)?;
        self.stack
            .push(GeneratorNode::new(Arc::clone(node), generator, inputs));
        Ok(())
    }

    /// Pop the pending outputs a node consumes, in input order
    fn pop_inputs(&mut self, node: &PlanNode) -> Result<Vec<GeneratorNode>> {
        let count = node.input_count();
        if self.stack.len() < count {
            return Err(Error::plan_invariant(format!(
                "node {} consumes {} inputs but {} are pending",
                node,
                count,
                self.stack.len()
            )));
        }
        let inputs = self.stack.split_off(self.stack.len() - count);
        if let Some((expected, actual)) = node
            .inputs()
            .iter()
            .zip(&inputs)
            .find(|(expected, actual)| **expected != actual.node_id())
        {
            return Err(Error::plan_invariant(format!(
                "node {} expects input {}, found {}",
                node,
                expected,
                actual.node_id()
            )));
        }
        Ok(inputs)
    }

    /// Turn a compilable generator into a fragment
    fn finalize(&mut self, node: GeneratorNode) {
        if !node.is_compilable() {
            return;
        }
        let root = if node.is_terminal() {
            node
        } else {
            let plan = Arc::clone(node.node());
            let id = node.node_id();
            GeneratorNode::new(
                plan,
                CodeGenerator::NonTerminal(NonTerminalGenerator::new(id)),
                vec![node],
            )
        };
        self.fragments.push(Fragment::new(root));
    }
}

/// Partition a plan into compilable fragments
pub fn partition(tree: &PlanTree) -> Result<Vec<Fragment>> {
    FragmentPartitioner::new().partition(tree)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DataType;
    use crate::expression::Expression;
    use crate::plan::{
        FilterNode, JoinNode, MapScanNode, PlanBuilder, ProjectNode, QueryPath, SortNode,
        TopObjectDescriptor,
    };

    fn scan(paths: Vec<QueryPath>) -> PlanNodeKind {
        let count = paths.len();
        PlanNodeKind::MapScan(MapScanNode {
            map_name: "m".to_string(),
            key_descriptor: TopObjectDescriptor::Scalar(DataType::Int),
            value_descriptor: TopObjectDescriptor::class("Point"),
            field_types: vec![DataType::Int; count],
            field_paths: paths,
            projects: (0..count).collect(),
            filter: None,
        })
    }

    fn filter() -> PlanNodeKind {
        PlanNodeKind::Filter(FilterNode {
            condition: Expression::is_null(Expression::column(0, DataType::Int)),
        })
    }

    fn ids(fragments: &[Fragment]) -> Vec<(i32, Vec<i32>)> {
        fragments
            .iter()
            .map(|f| (f.primary_id(), f.subsumed_ids().to_vec()))
            .collect()
    }

    #[test]
    fn test_single_fragment_below_root() {
        let mut b = PlanBuilder::new();
        b.add(1, scan(vec![QueryPath::value_field("x")]), &[]).unwrap();
        b.add(2, filter(), &[1]).unwrap();
        b.add(
            3,
            PlanNodeKind::Project(ProjectNode {
                projects: vec![Expression::column(0, DataType::Int)],
            }),
            &[2],
        )
        .unwrap();
        b.add(4, PlanNodeKind::Root, &[3]).unwrap();
        let tree = b.build(4).unwrap();

        let fragments = partition(&tree).unwrap();
        assert_eq!(ids(&fragments), vec![(3, vec![1, 2, 3])]);
        assert!(fragments[0].root().is_terminal());
        assert_eq!(fragments[0].node().id(), 3);
    }

    #[test]
    fn test_interpreted_boundaries() {
        // Root <- Join(Filter <- Scan, Sort <- Filter <- Scan)
        let mut b = PlanBuilder::new();
        b.add(1, scan(vec![QueryPath::value_field("x")]), &[]).unwrap();
        b.add(2, filter(), &[1]).unwrap();
        b.add(3, scan(vec![QueryPath::value_field("y")]), &[]).unwrap();
        b.add(4, filter(), &[3]).unwrap();
        b.add(
            5,
            PlanNodeKind::Sort(SortNode {
                columns: vec![0],
                ascending: vec![true],
            }),
            &[4],
        )
        .unwrap();
        b.add(6, PlanNodeKind::NestedLoopJoin(JoinNode { condition: None }), &[2, 5])
            .unwrap();
        b.add(7, PlanNodeKind::Root, &[6]).unwrap();
        let tree = b.build(7).unwrap();

        let fragments = partition(&tree).unwrap();
        assert_eq!(ids(&fragments), vec![(4, vec![3, 4]), (2, vec![1, 2])]);

        // Every node is covered by at most one fragment
        for node in tree.post_order() {
            let owners = fragments.iter().filter(|f| f.contains(node.id())).count();
            assert!(owners <= 1);
        }
    }

    #[test]
    fn test_filter_over_interpreted_scan_is_interpreted() {
        let mut b = PlanBuilder::new();
        b.add(1, scan(vec![QueryPath::value_field("a.b")]), &[]).unwrap();
        b.add(2, filter(), &[1]).unwrap();
        b.add(3, PlanNodeKind::Root, &[2]).unwrap();
        let tree = b.build(3).unwrap();
        assert!(partition(&tree).unwrap().is_empty());
    }

    #[test]
    fn test_root_less_plan_is_finalized() {
        let mut b = PlanBuilder::new();
        b.add(1, scan(vec![QueryPath::value_field("x")]), &[]).unwrap();
        let tree = b.build(1).unwrap();
        let fragments = partition(&tree).unwrap();
        assert_eq!(ids(&fragments), vec![(1, vec![1])]);
    }

    #[test]
    fn test_stack_mismatch_fails_fast() {
        let mut b = PlanBuilder::new();
        b.add(1, scan(vec![QueryPath::value_field("x")]), &[]).unwrap();
        b.add(2, scan(vec![QueryPath::value_field("x")]), &[]).unwrap();
        b.add(3, PlanNodeKind::NestedLoopJoin(JoinNode { condition: None }), &[1, 2])
            .unwrap();
        let tree = b.build(3).unwrap();

        // Only one of the join's two inputs is pending
        let mut partitioner = FragmentPartitioner::new();
        partitioner.visit(tree.require(1).unwrap()).unwrap();
        let err = partitioner.visit(tree.root()).unwrap_err();
        assert!(matches!(err, Error::PlanInvariant(_)));
    }
}
