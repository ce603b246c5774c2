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

//! Root executor: the consumer at the top of every plan

use crate::core::{Result, Row};
use crate::executor::context::FragmentContext;
use crate::executor::exec::{Exec, IterationResult};

/// Drains the upstream, checking for cancellation between batches
pub struct RootExec {
    id: i32,
    upstream: Box<dyn Exec>,
}

impl RootExec {
    pub fn new(id: i32, upstream: Box<dyn Exec>) -> Self {
        Self { id, upstream }
    }

    pub fn upstream(&self) -> &dyn Exec {
        self.upstream.as_ref()
    }

    /// Arm the plan and collect every output row.
    ///
    /// Cancellation is observed before each `advance()` call.
    pub fn collect(&mut self, ctx: &FragmentContext) -> Result<Vec<Row>> {
        self.upstream.setup(ctx)?;
        let mut rows = Vec::new();
        loop {
            ctx.check_cancelled()?;
            let result = self.upstream.advance()?;
            if let Some(batch) = self.upstream.current_batch() {
                rows.extend_from_slice(batch);
            }
            if result == IterationResult::FetchedDone {
                return Ok(rows);
            }
        }
    }
}

impl Exec for RootExec {
    fn id(&self) -> i32 {
        self.id
    }

    fn setup(&mut self, ctx: &FragmentContext) -> Result<()> {
        self.upstream.setup(ctx)
    }

    fn advance(&mut self) -> Result<IterationResult> {
        self.upstream.advance()
    }

    fn current_batch(&self) -> Option<&[Row]> {
        self.upstream.current_batch()
    }

    fn name(&self) -> &str {
        "RootExec"
    }
}
