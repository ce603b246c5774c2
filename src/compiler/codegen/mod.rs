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

//! Per-operator code generators
//!
//! A fragment is a tree of [`GeneratorNode`]s, one per subsumed plan node
//! plus a [`NonTerminalGenerator`] on top that flushes finished rows into the
//! output batch. Each generator:
//!
//! 1. declares the state fields its node needs ([`CodeGenerator::declare`])
//! 2. emits the code that produces its output row from the upstream locals
//!    ([`CodeGenerator::row_start`])
//! 3. closes whatever blocks `row_start` opened ([`CodeGenerator::row_end`])
//!
//! `row_start` runs upstream first and `row_end` downstream first, so the
//! code of later operators ends up nested in the loops of earlier ones.

pub mod advance;
pub mod filter;
pub mod map_scan;
pub mod non_terminal;
pub mod project;

use std::sync::Arc;

pub use advance::emit_advance;
pub use filter::FilterGenerator;
pub use map_scan::MapScanGenerator;
pub use non_terminal::NonTerminalGenerator;
pub use project::ProjectGenerator;

use super::emitter::EmitableRoutine;
use super::variable::{LocalVariable, StateRegistry};
use crate::core::{Error, Result};
use crate::plan::PlanNode;

/// Closed set of generators
#[derive(Debug, Clone)]
pub enum CodeGenerator {
    MapScan(MapScanGenerator),
    Filter(FilterGenerator),
    Project(ProjectGenerator),
    /// Adapter that turns the output row of a fragment into a batch entry
    NonTerminal(NonTerminalGenerator),
    /// Interpreted boundary inside the plan
    Unsupported(i32),
}

impl CodeGenerator {
    pub fn node_id(&self) -> i32 {
        match self {
            CodeGenerator::MapScan(g) => g.node_id(),
            CodeGenerator::Filter(g) => g.node_id(),
            CodeGenerator::Project(g) => g.node_id(),
            CodeGenerator::NonTerminal(g) => g.node_id(),
            CodeGenerator::Unsupported(id) => *id,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            CodeGenerator::MapScan(_) => "MapScan",
            CodeGenerator::Filter(_) => "Filter",
            CodeGenerator::Project(_) => "Project",
            CodeGenerator::NonTerminal(_) => "NonTerminal",
            CodeGenerator::Unsupported(_) => "Unsupported",
        }
    }

    pub fn is_compilable(&self) -> bool {
        !matches!(self, CodeGenerator::Unsupported(_))
    }

    /// True if no other generator of the fragment consumes this one's output
    pub fn is_terminal(&self) -> bool {
        matches!(self, CodeGenerator::NonTerminal(_))
    }

    /// Register the node and its state variables
    pub fn declare(&self, state: &mut StateRegistry) -> Result<()> {
        match self {
            CodeGenerator::MapScan(g) => g.declare(state),
            CodeGenerator::Filter(g) => g.declare(state),
            CodeGenerator::Project(g) => g.declare(state),
            CodeGenerator::NonTerminal(_) => Ok(()),
            CodeGenerator::Unsupported(id) => Err(unsupported_in_fragment(*id)),
        }
    }

    /// Emit the per-row code. Returns the output row locals, or `None` when
    /// the generator consumes the row itself.
    pub fn row_start(
        &self,
        routine: &mut EmitableRoutine,
        upstream: Option<&[LocalVariable]>,
    ) -> Result<Option<Vec<LocalVariable>>> {
        match self {
            CodeGenerator::MapScan(g) => {
                if upstream.is_some() {
                    return Err(Error::plan_invariant(format!(
                        "scan {} has an upstream row",
                        g.node_id()
                    )));
                }
                g.row_start(routine).map(Some)
            }
            CodeGenerator::Filter(g) => {
                let upstream = require_upstream(g.node_id(), upstream)?;
                g.row_start(routine, upstream).map(Some)
            }
            CodeGenerator::Project(g) => {
                let upstream = require_upstream(g.node_id(), upstream)?;
                g.row_start(routine, upstream).map(Some)
            }
            CodeGenerator::NonTerminal(g) => {
                g.row_start(routine, require_upstream(g.node_id(), upstream)?)?;
                Ok(None)
            }
            CodeGenerator::Unsupported(id) => Err(unsupported_in_fragment(*id)),
        }
    }

    pub fn row_end(&self, routine: &mut EmitableRoutine) {
        if let CodeGenerator::MapScan(g) = self {
            g.row_end(routine);
        }
    }
}

fn require_upstream(node_id: i32, upstream: Option<&[LocalVariable]>) -> Result<&[LocalVariable]> {
    upstream.ok_or_else(|| Error::plan_invariant(format!("node {} has no upstream row", node_id)))
}

fn unsupported_in_fragment(node_id: i32) -> Error {
    Error::internal(format!("interpreted node {} inside a compiled fragment", node_id))
}

/// A generator with its upstream generators
#[derive(Debug, Clone)]
pub struct GeneratorNode {
    node: Arc<PlanNode>,
    generator: CodeGenerator,
    children: Vec<GeneratorNode>,
}

impl GeneratorNode {
    pub fn new(node: Arc<PlanNode>, generator: CodeGenerator, children: Vec<GeneratorNode>) -> Self {
        Self {
            node,
            generator,
            children,
        }
    }

    /// Plan node the generator was created for
    pub fn node(&self) -> &Arc<PlanNode> {
        &self.node
    }

    pub fn generator(&self) -> &CodeGenerator {
        &self.generator
    }

    pub fn children(&self) -> &[GeneratorNode] {
        &self.children
    }

    pub fn node_id(&self) -> i32 {
        self.generator.node_id()
    }

    pub fn is_compilable(&self) -> bool {
        self.generator.is_compilable()
    }

    pub fn is_terminal(&self) -> bool {
        self.generator.is_terminal()
    }

    /// Generators upstream first
    pub fn post_order(&self) -> Vec<&GeneratorNode> {
        let mut out = Vec::new();
        self.collect_post_order(&mut out);
        out
    }

    fn collect_post_order<'a>(&'a self, out: &mut Vec<&'a GeneratorNode>) {
        for child in &self.children {
            child.collect_post_order(out);
        }
        out.push(self);
    }
}
