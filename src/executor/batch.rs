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

//! Row batches and upstream cursors

use super::exec::{Exec, IterationResult};
use crate::core::{Result, Row};

/// Default batch capacity
pub const DEFAULT_BATCH_SIZE: usize = 1024;

/// Bounded buffer of output rows
///
/// `add` reports whether there is room for another row, so a producer
/// stops exactly when the batch reaches its capacity.
#[derive(Debug, Clone)]
pub struct RowBatch {
    rows: Vec<Row>,
    capacity: usize,
}

impl RowBatch {
    /// Create a batch; a zero capacity is raised to one
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            rows: Vec::with_capacity(capacity.min(DEFAULT_BATCH_SIZE)),
            capacity,
        }
    }

    pub fn clear(&mut self) {
        self.rows.clear();
    }

    /// Append a row. Returns false once the batch is full.
    #[inline]
    pub fn add(&mut self, row: Row) -> bool {
        self.rows.push(row);
        self.rows.len() < self.capacity
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Rows as returned by `Exec::current_batch`
    pub fn as_current(&self) -> Option<&[Row]> {
        if self.rows.is_empty() {
            None
        } else {
            Some(&self.rows)
        }
    }
}

/// Row-at-a-time view over an upstream executor's batches
pub struct UpstreamCursor {
    upstream: Box<dyn Exec>,
    pending: Vec<Row>,
    pos: usize,
    done: bool,
}

impl UpstreamCursor {
    pub fn new(upstream: Box<dyn Exec>) -> Self {
        Self {
            upstream,
            pending: Vec::new(),
            pos: 0,
            done: false,
        }
    }

    pub fn upstream(&self) -> &dyn Exec {
        self.upstream.as_ref()
    }

    pub fn upstream_mut(&mut self) -> &mut dyn Exec {
        self.upstream.as_mut()
    }

    /// Forget buffered rows; used when the upstream is re-armed
    pub fn reset(&mut self) {
        self.pending.clear();
        self.pos = 0;
        self.done = false;
    }

    /// Next upstream row, pulling new batches as needed
    pub fn next_row(&mut self) -> Result<Option<Row>> {
        loop {
            if self.pos < self.pending.len() {
                let row = std::mem::take(&mut self.pending[self.pos]);
                self.pos += 1;
                return Ok(Some(row));
            }
            if self.done {
                return Ok(None);
            }
            let result = self.upstream.advance()?;
            self.pending.clear();
            if let Some(rows) = self.upstream.current_batch() {
                self.pending.extend_from_slice(rows);
            }
            self.pos = 0;
            self.done = result == IterationResult::FetchedDone;
        }
    }

    /// Drain every remaining upstream row
    pub fn collect_all(&mut self) -> Result<Vec<Row>> {
        let mut rows = Vec::new();
        while let Some(row) = self.next_row()? {
            rows.push(row);
        }
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Value;

    #[test]
    fn test_batch_capacity() {
        let mut batch = RowBatch::new(2);
        assert!(batch.add(Row::from_values(vec![Value::Int(1)])));
        assert!(!batch.add(Row::from_values(vec![Value::Int(2)])));
        assert_eq!(batch.len(), 2);
        batch.clear();
        assert!(batch.as_current().is_none());
        assert_eq!(RowBatch::new(0).capacity(), 1);
    }
}
