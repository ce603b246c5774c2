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

//! Executor graph construction
//!
//! Executors are built inputs first. When a [`CompiledFragment`] is attached,
//! each interpreted executor is offered to it for binding, and the executor
//! of a fragment's primary node is replaced by the compiled instance.
//! Interpreted executors below a replaced node are only used for binding and
//! are dropped with it.

use std::sync::Arc;

use super::exec::{Exec, FilterState, MapScanState, ProjectState};
use super::operators::{FilterExec, NestedLoopJoinExec, ProjectExec, RootExec, SortExec};
use super::scan::MapScanExec;
use crate::compiler::CompiledFragment;
use crate::core::{Error, Result};
use crate::plan::{MapScanNode, PlanNode, PlanNodeKind, PlanTree};
use crate::storage::Storage;

pub struct ExecBuilder<'a> {
    tree: &'a PlanTree,
    storage: &'a Storage,
    batch_size: usize,
    fragment: Option<CompiledFragment>,
}

impl<'a> ExecBuilder<'a> {
    pub fn new(tree: &'a PlanTree, storage: &'a Storage, batch_size: usize) -> Self {
        Self {
            tree,
            storage,
            batch_size: batch_size.max(1),
            fragment: None,
        }
    }

    /// Substitute compiled instances while building
    pub fn with_fragment(mut self, fragment: CompiledFragment) -> Self {
        self.fragment = Some(fragment);
        self
    }

    /// Build the executor graph. The plan root must be a `Root` node.
    pub fn build(mut self) -> Result<RootExec> {
        let tree = self.tree;
        let root = tree.root();
        if !matches!(root.kind(), PlanNodeKind::Root) {
            return Err(Error::plan_invariant(format!(
                "plan root {} is not a Root node",
                root
            )));
        }
        let input = root
            .inputs()
            .first()
            .ok_or_else(|| Error::plan_invariant(format!("plan root {} has no input", root)))?;
        let upstream = self.build_node(tree.require(*input)?)?;

        if let Some(fragment) = &self.fragment {
            if fragment.remaining() > 0 {
                return Err(Error::binding(format!(
                    "{} compiled unit(s) were not placed in the executor graph",
                    fragment.remaining()
                )));
            }
        }
        Ok(RootExec::new(root.id(), upstream))
    }

    fn build_node(&mut self, node: &Arc<PlanNode>) -> Result<Box<dyn Exec>> {
        let tree = self.tree;
        let mut inputs = Vec::with_capacity(node.input_count());
        for &input in node.inputs() {
            inputs.push(self.build_node(tree.require(input)?)?);
        }
        let mut inputs = inputs.into_iter();
        let mut next_input = || {
            inputs
                .next()
                .ok_or_else(|| Error::plan_invariant(format!("node {} is missing an input", node)))
        };

        let id = node.id();
        let exec: Box<dyn Exec> = match node.kind() {
            PlanNodeKind::MapScan(scan) => {
                Box::new(MapScanExec::new(id, self.scan_state(scan)?, self.batch_size))
            }
            PlanNodeKind::Filter(filter) => Box::new(FilterExec::new(
                id,
                FilterState {
                    condition: Arc::new(filter.condition.clone()),
                },
                next_input()?,
                self.batch_size,
            )),
            PlanNodeKind::Project(project) => Box::new(ProjectExec::new(
                id,
                ProjectState {
                    projects: project.projects.iter().cloned().map(Arc::new).collect(),
                },
                next_input()?,
                self.batch_size,
            )),
            PlanNodeKind::Sort(sort) => Box::new(SortExec::new(
                id,
                sort.columns.clone(),
                sort.ascending.clone(),
                next_input()?,
                self.batch_size,
            )),
            PlanNodeKind::NestedLoopJoin(join) => {
                let left = next_input()?;
                let right = next_input()?;
                Box::new(NestedLoopJoinExec::new(
                    id,
                    join.condition.clone(),
                    left,
                    right,
                    self.batch_size,
                ))
            }
            PlanNodeKind::Root => {
                return Err(Error::plan_invariant(format!(
                    "Root node {} below the plan root",
                    id
                )))
            }
        };

        if let Some(fragment) = &mut self.fragment {
            if fragment.prepare(exec.as_ref())? {
                if let Some(compiled) = fragment.take_top(id)? {
                    tracing::debug!(node_id = id, unit = compiled.name(), "compiled unit placed");
                    return Ok(compiled);
                }
            }
        }
        Ok(exec)
    }

    fn scan_state(&self, scan: &MapScanNode) -> Result<MapScanState> {
        let map = self.storage.map(&scan.map_name)?;
        let partitions = Arc::new(map.all_partitions());
        Ok(MapScanState {
            map,
            partitions,
            key_descriptor: scan.key_descriptor.clone(),
            value_descriptor: scan.value_descriptor.clone(),
            field_paths: scan.field_paths.clone().into(),
            field_types: scan.field_types.clone().into(),
            projects: scan.projects.clone().into(),
            filter: scan.filter.clone().map(Arc::new),
        })
    }
}
