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

//! Plan nodes and the plan tree arena

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use super::path::{QueryPath, TopObjectDescriptor};
use crate::core::{DataType, Error, Result};
use crate::expression::Expression;

/// Scan over the entries of a partitioned map
#[derive(Debug, Clone, PartialEq)]
pub struct MapScanNode {
    pub map_name: String,
    pub key_descriptor: TopObjectDescriptor,
    pub value_descriptor: TopObjectDescriptor,
    pub field_paths: Vec<QueryPath>,
    pub field_types: Vec<DataType>,
    /// Indexes into the extracted fields, in output order
    pub projects: Vec<usize>,
    /// Filter over the extracted fields
    pub filter: Option<Expression>,
}

/// Filter over the input row
#[derive(Debug, Clone, PartialEq)]
pub struct FilterNode {
    pub condition: Expression,
}

/// Projection of the input row through expressions
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectNode {
    pub projects: Vec<Expression>,
}

/// Full sort of the input
#[derive(Debug, Clone, PartialEq)]
pub struct SortNode {
    pub columns: Vec<usize>,
    pub ascending: Vec<bool>,
}

/// Nested loop join; the condition sees the concatenated left and right row
#[derive(Debug, Clone, PartialEq)]
pub struct JoinNode {
    pub condition: Option<Expression>,
}

/// Operator-specific attributes of a plan node
#[derive(Debug, Clone, PartialEq)]
pub enum PlanNodeKind {
    Root,
    MapScan(MapScanNode),
    Filter(FilterNode),
    Project(ProjectNode),
    Sort(SortNode),
    NestedLoopJoin(JoinNode),
}

impl PlanNodeKind {
    /// Number of inputs a node of this kind consumes
    pub fn input_count(&self) -> usize {
        match self {
            PlanNodeKind::MapScan(_) => 0,
            PlanNodeKind::Root
            | PlanNodeKind::Filter(_)
            | PlanNodeKind::Project(_)
            | PlanNodeKind::Sort(_) => 1,
            PlanNodeKind::NestedLoopJoin(_) => 2,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PlanNodeKind::Root => "Root",
            PlanNodeKind::MapScan(_) => "MapScan",
            PlanNodeKind::Filter(_) => "Filter",
            PlanNodeKind::Project(_) => "Project",
            PlanNodeKind::Sort(_) => "Sort",
            PlanNodeKind::NestedLoopJoin(_) => "NestedLoopJoin",
        }
    }
}

/// Immutable node of a physical plan
#[derive(Debug, Clone, PartialEq)]
pub struct PlanNode {
    id: i32,
    inputs: Vec<i32>,
    kind: PlanNodeKind,
}

impl PlanNode {
    pub fn id(&self) -> i32 {
        self.id
    }

    /// Ids of the input nodes, in input order
    pub fn inputs(&self) -> &[i32] {
        &self.inputs
    }

    pub fn kind(&self) -> &PlanNodeKind {
        &self.kind
    }

    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }
}

impl fmt::Display for PlanNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.kind.name(), self.id)
    }
}

/// Arena of plan nodes addressed by id
#[derive(Debug, Clone)]
pub struct PlanTree {
    nodes: Vec<Arc<PlanNode>>,
    index: FxHashMap<i32, usize>,
    root: i32,
}

impl PlanTree {
    /// Node by id, O(1)
    pub fn node(&self, id: i32) -> Option<&Arc<PlanNode>> {
        self.index.get(&id).map(|&i| &self.nodes[i])
    }

    /// Node by id, failing with a plan invariant error
    pub fn require(&self, id: i32) -> Result<&Arc<PlanNode>> {
        self.node(id)
            .ok_or_else(|| Error::plan_invariant(format!("node {} not found", id)))
    }

    pub fn root(&self) -> &Arc<PlanNode> {
        &self.nodes[self.index[&self.root]]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes in post-order (inputs left to right, then the node)
    pub fn post_order(&self) -> Vec<&Arc<PlanNode>> {
        let mut out = Vec::with_capacity(self.nodes.len());
        // (node, next input to visit)
        let mut stack: Vec<(&Arc<PlanNode>, usize)> = vec![(self.root(), 0)];
        while let Some((node, next)) = stack.pop() {
            if next < node.inputs.len() {
                stack.push((node, next + 1));
                // inputs were validated by the builder
                if let Some(input) = self.node(node.inputs[next]) {
                    stack.push((input, 0));
                }
            } else {
                out.push(node);
            }
        }
        out
    }
}

/// Builds a validated [`PlanTree`]
///
/// Nodes are added bottom-up: a node's inputs must already be present and
/// not yet consumed by another node.
#[derive(Debug, Default)]
pub struct PlanBuilder {
    nodes: Vec<Arc<PlanNode>>,
    index: FxHashMap<i32, usize>,
    consumed: FxHashMap<i32, i32>,
}

impl PlanBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node and return its id
    pub fn add(&mut self, id: i32, kind: PlanNodeKind, inputs: &[i32]) -> Result<i32> {
        if id < 0 {
            return Err(Error::plan_invariant(format!("negative node id {}", id)));
        }
        if self.index.contains_key(&id) {
            return Err(Error::plan_invariant(format!("duplicate node id {}", id)));
        }
        if inputs.len() != kind.input_count() {
            return Err(Error::plan_invariant(format!(
                "{} node {} expects {} inputs, got {}",
                kind.name(),
                id,
                kind.input_count(),
                inputs.len()
            )));
        }
        for input in inputs {
            if !self.index.contains_key(input) {
                return Err(Error::plan_invariant(format!(
                    "input {} of node {} not found",
                    input, id
                )));
            }
            if let Some(owner) = self.consumed.insert(*input, id) {
                return Err(Error::plan_invariant(format!(
                    "node {} is consumed by both {} and {}",
                    input, owner, id
                )));
            }
        }
        if let PlanNodeKind::MapScan(scan) = &kind {
            validate_scan(id, scan)?;
        }

        self.index.insert(id, self.nodes.len());
        self.nodes.push(Arc::new(PlanNode {
            id,
            inputs: inputs.to_vec(),
            kind,
        }));
        Ok(id)
    }

    /// Finish the tree. Every node except the root must be consumed exactly once.
    pub fn build(self, root: i32) -> Result<PlanTree> {
        if !self.index.contains_key(&root) {
            return Err(Error::plan_invariant(format!("root {} not found", root)));
        }
        if self.consumed.contains_key(&root) {
            return Err(Error::plan_invariant(format!(
                "root {} is consumed by another node",
                root
            )));
        }
        if let Some(orphan) = self
            .nodes
            .iter()
            .find(|n| n.id != root && !self.consumed.contains_key(&n.id))
        {
            return Err(Error::plan_invariant(format!(
                "node {} is not connected to root {}",
                orphan.id, root
            )));
        }
        Ok(PlanTree {
            nodes: self.nodes,
            index: self.index,
            root,
        })
    }
}

fn validate_scan(id: i32, scan: &MapScanNode) -> Result<()> {
    if scan.field_paths.len() != scan.field_types.len() {
        return Err(Error::plan_invariant(format!(
            "scan {} has {} field paths but {} field types",
            id,
            scan.field_paths.len(),
            scan.field_types.len()
        )));
    }
    if let Some(bad) = scan.projects.iter().find(|&&p| p >= scan.field_paths.len()) {
        return Err(Error::plan_invariant(format!(
            "scan {} projects field {} of {}",
            id,
            bad,
            scan.field_paths.len()
        )));
    }
    Ok(())
}
