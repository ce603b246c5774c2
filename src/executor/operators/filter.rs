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

//! Filter and projection executors

use std::sync::Arc;

use crate::core::{Result, Row};
use crate::executor::batch::{RowBatch, UpstreamCursor};
use crate::executor::context::FragmentContext;
use crate::executor::exec::{
    filter_passes, Exec, ExecState, FilterState, IterationResult, ProjectState,
};

/// Passes rows whose condition is TRUE
pub struct FilterExec {
    id: i32,
    state: Arc<FilterState>,
    input: UpstreamCursor,
    batch: RowBatch,
}

impl FilterExec {
    pub fn new(id: i32, state: FilterState, upstream: Box<dyn Exec>, batch_size: usize) -> Self {
        Self {
            id,
            state: Arc::new(state),
            input: UpstreamCursor::new(upstream),
            batch: RowBatch::new(batch_size),
        }
    }
}

impl Exec for FilterExec {
    fn id(&self) -> i32 {
        self.id
    }

    fn setup(&mut self, ctx: &FragmentContext) -> Result<()> {
        self.input.reset();
        self.input.upstream_mut().setup(ctx)
    }

    fn advance(&mut self) -> Result<IterationResult> {
        self.batch.clear();
        while let Some(row) = self.input.next_row()? {
            if filter_passes(&self.state.condition.eval(&row)?)? && !self.batch.add(row) {
                return Ok(IterationResult::Fetched);
            }
        }
        Ok(IterationResult::FetchedDone)
    }

    fn current_batch(&self) -> Option<&[Row]> {
        self.batch.as_current()
    }

    fn state(&self) -> ExecState {
        ExecState::Filter(Arc::clone(&self.state))
    }

    fn name(&self) -> &str {
        "FilterExec"
    }
}

/// Evaluates one expression per output column
pub struct ProjectExec {
    id: i32,
    state: Arc<ProjectState>,
    input: UpstreamCursor,
    batch: RowBatch,
}

impl ProjectExec {
    pub fn new(id: i32, state: ProjectState, upstream: Box<dyn Exec>, batch_size: usize) -> Self {
        Self {
            id,
            state: Arc::new(state),
            input: UpstreamCursor::new(upstream),
            batch: RowBatch::new(batch_size),
        }
    }
}

impl Exec for ProjectExec {
    fn id(&self) -> i32 {
        self.id
    }

    fn setup(&mut self, ctx: &FragmentContext) -> Result<()> {
        self.input.reset();
        self.input.upstream_mut().setup(ctx)
    }

    fn advance(&mut self) -> Result<IterationResult> {
        self.batch.clear();
        while let Some(row) = self.input.next_row()? {
            if !self.batch.add(self.state.project(&row)?) {
                return Ok(IterationResult::Fetched);
            }
        }
        Ok(IterationResult::FetchedDone)
    }

    fn current_batch(&self) -> Option<&[Row]> {
        self.batch.as_current()
    }

    fn state(&self) -> ExecState {
        ExecState::Project(Arc::clone(&self.state))
    }

    fn name(&self) -> &str {
        "ProjectExec"
    }
}
