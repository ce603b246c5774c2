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

//! Query execution
//!
//! Runs a plan against storage. When the compiler manager produces a
//! template, the compiled graph is tried first; any compilation or binding
//! failure falls back to full interpretation of the same plan.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::builder::ExecBuilder;
use super::context::FragmentContext;
use crate::compiler::{CompiledFragmentTemplate, CompilerConfig, CompilerManager};
use crate::core::{Result, Row};
use crate::plan::PlanTree;
use crate::storage::Storage;

/// How a query was executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionMode {
    Compiled,
    Interpreted,
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionMode::Compiled => write!(f, "compiled"),
            ExecutionMode::Interpreted => write!(f, "interpreted"),
        }
    }
}

/// Rows of a finished query
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOutput {
    pub rows: Vec<Row>,
    pub mode: ExecutionMode,
}

pub struct QueryRunner {
    storage: Arc<Storage>,
    manager: Arc<CompilerManager>,
    next_query_id: AtomicU64,
}

impl QueryRunner {
    pub fn new(storage: Arc<Storage>, config: CompilerConfig) -> Self {
        Self::with_manager(storage, Arc::new(CompilerManager::new(config)))
    }

    /// Share a compiler manager (and its cache) between runners
    pub fn with_manager(storage: Arc<Storage>, manager: Arc<CompilerManager>) -> Self {
        Self {
            storage,
            manager,
            next_query_id: AtomicU64::new(1),
        }
    }

    pub fn manager(&self) -> &Arc<CompilerManager> {
        &self.manager
    }

    pub fn storage(&self) -> &Arc<Storage> {
        &self.storage
    }

    fn batch_size(&self) -> usize {
        self.manager.config().effective_batch_size()
    }

    /// Fresh context for one execution
    pub fn context(&self) -> FragmentContext {
        FragmentContext::new(self.next_query_id.fetch_add(1, Ordering::Relaxed))
    }

    pub fn run(&self, tree: &PlanTree) -> Result<QueryOutput> {
        self.run_with_context(tree, &self.context())
    }

    /// Run with a caller-owned context, e.g. to cancel from another thread
    pub fn run_with_context(&self, tree: &PlanTree, ctx: &FragmentContext) -> Result<QueryOutput> {
        if let Some(template) = self.manager.template(tree) {
            match self.run_compiled(tree, &template, ctx) {
                Ok(rows) => {
                    return Ok(QueryOutput {
                        rows,
                        mode: ExecutionMode::Compiled,
                    })
                }
                Err(e) if e.is_fallback() => {
                    tracing::warn!(
                        query_id = ctx.query_id(),
                        error = %e,
                        "compiled execution failed, falling back to interpretation"
                    );
                }
                Err(e) => return Err(e),
            }
        }
        let rows = self.run_interpreted(tree, ctx)?;
        Ok(QueryOutput {
            rows,
            mode: ExecutionMode::Interpreted,
        })
    }

    /// Run the plan with interpreted executors only
    pub fn run_interpreted(&self, tree: &PlanTree, ctx: &FragmentContext) -> Result<Vec<Row>> {
        ExecBuilder::new(tree, &self.storage, self.batch_size())
            .build()?
            .collect(ctx)
    }

    /// Run the plan with compiled instances from `template`
    pub fn run_compiled(
        &self,
        tree: &PlanTree,
        template: &CompiledFragmentTemplate,
        ctx: &FragmentContext,
    ) -> Result<Vec<Row>> {
        ExecBuilder::new(tree, &self.storage, template.batch_size())
            .with_fragment(template.instantiate())
            .build()?
            .collect(ctx)
    }
}

impl fmt::Debug for QueryRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryRunner")
            .field("manager", &self.manager)
            .finish()
    }
}
