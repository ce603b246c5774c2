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

//! Nested loop join executor (interpreted only)

use crate::core::{Result, Row};
use crate::executor::batch::{RowBatch, UpstreamCursor};
use crate::executor::context::FragmentContext;
use crate::executor::exec::{filter_passes, Exec, IterationResult};
use crate::expression::Expression;

/// Inner nested loop join.
///
/// The right side is materialized on the first `advance()`; the left side is
/// streamed. The condition sees the left columns followed by the right ones.
pub struct NestedLoopJoinExec {
    id: i32,
    condition: Option<Expression>,
    left: UpstreamCursor,
    right: UpstreamCursor,
    right_rows: Option<Vec<Row>>,
    /// Left row being joined and the next right index to try
    current: Option<(Row, usize)>,
    batch: RowBatch,
}

impl NestedLoopJoinExec {
    pub fn new(
        id: i32,
        condition: Option<Expression>,
        left: Box<dyn Exec>,
        right: Box<dyn Exec>,
        batch_size: usize,
    ) -> Self {
        Self {
            id,
            condition,
            left: UpstreamCursor::new(left),
            right: UpstreamCursor::new(right),
            right_rows: None,
            current: None,
            batch: RowBatch::new(batch_size),
        }
    }
}

impl Exec for NestedLoopJoinExec {
    fn id(&self) -> i32 {
        self.id
    }

    fn setup(&mut self, ctx: &FragmentContext) -> Result<()> {
        self.right_rows = None;
        self.current = None;
        self.left.reset();
        self.right.reset();
        self.left.upstream_mut().setup(ctx)?;
        self.right.upstream_mut().setup(ctx)
    }

    fn advance(&mut self) -> Result<IterationResult> {
        self.batch.clear();
        if self.right_rows.is_none() {
            self.right_rows = Some(self.right.collect_all()?);
        }
        let right_rows = self.right_rows.as_deref().unwrap_or(&[]);

        loop {
            let (left_row, start) = match self.current.take() {
                Some(current) => current,
                None => match self.left.next_row()? {
                    Some(row) => (row, 0),
                    None => return Ok(IterationResult::FetchedDone),
                },
            };
            for (offset, right_row) in right_rows[start..].iter().enumerate() {
                let joined = left_row.concat(right_row);
                let matched = match &self.condition {
                    Some(condition) => filter_passes(&condition.eval(&joined)?)?,
                    None => true,
                };
                if matched && !self.batch.add(joined) {
                    self.current = Some((left_row, start + offset + 1));
                    return Ok(IterationResult::Fetched);
                }
            }
        }
    }

    fn current_batch(&self) -> Option<&[Row]> {
        self.batch.as_current()
    }

    fn name(&self) -> &str {
        "NestedLoopJoinExec"
    }
}
