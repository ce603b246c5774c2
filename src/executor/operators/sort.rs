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

//! Sort executor (interpreted only)

use std::cmp::Ordering;

use crate::core::{ComparisonMode, Result, Row, Value};
use crate::executor::batch::{RowBatch, UpstreamCursor};
use crate::executor::context::FragmentContext;
use crate::executor::exec::{Exec, IterationResult};

/// Materializes its input, sorts it, then emits it batch by batch.
///
/// NULLs sort first in ascending order. Values that cannot be compared keep
/// their input order.
pub struct SortExec {
    id: i32,
    columns: Vec<usize>,
    ascending: Vec<bool>,
    input: UpstreamCursor,
    sorted: Option<std::vec::IntoIter<Row>>,
    batch: RowBatch,
}

impl SortExec {
    pub fn new(
        id: i32,
        columns: Vec<usize>,
        ascending: Vec<bool>,
        upstream: Box<dyn Exec>,
        batch_size: usize,
    ) -> Self {
        Self {
            id,
            columns,
            ascending,
            input: UpstreamCursor::new(upstream),
            sorted: None,
            batch: RowBatch::new(batch_size),
        }
    }

    fn compare_rows(&self, a: &Row, b: &Row) -> Ordering {
        for (i, &column) in self.columns.iter().enumerate() {
            let ord = compare_values(a.get(column), b.get(column));
            let ord = if self.ascending.get(i).copied().unwrap_or(true) {
                ord
            } else {
                ord.reverse()
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
        (None | Some(Value::Null), _) => Ordering::Less,
        (_, None | Some(Value::Null)) => Ordering::Greater,
        (Some(a), Some(b)) => {
            if a.compare(ComparisonMode::LessThan, b).unwrap_or(false) {
                Ordering::Less
            } else if a.compare(ComparisonMode::GreaterThan, b).unwrap_or(false) {
                Ordering::Greater
            } else {
                Ordering::Equal
            }
        }
    }
}

impl Exec for SortExec {
    fn id(&self) -> i32 {
        self.id
    }

    fn setup(&mut self, ctx: &FragmentContext) -> Result<()> {
        self.sorted = None;
        self.input.reset();
        self.input.upstream_mut().setup(ctx)
    }

    fn advance(&mut self) -> Result<IterationResult> {
        self.batch.clear();
        if self.sorted.is_none() {
            let mut rows = self.input.collect_all()?;
            rows.sort_by(|a, b| self.compare_rows(a, b));
            self.sorted = Some(rows.into_iter());
        }
        if let Some(sorted) = self.sorted.as_mut() {
            for row in sorted.by_ref() {
                if !self.batch.add(row) {
                    return Ok(if sorted.len() == 0 {
                        IterationResult::FetchedDone
                    } else {
                        IterationResult::Fetched
                    });
                }
            }
        }
        Ok(IterationResult::FetchedDone)
    }

    fn current_batch(&self) -> Option<&[Row]> {
        self.batch.as_current()
    }

    fn name(&self) -> &str {
        "SortExec"
    }
}
