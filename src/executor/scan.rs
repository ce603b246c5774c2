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

//! Interpreted map scan executor

use std::sync::Arc;

use super::batch::RowBatch;
use super::context::FragmentContext;
use super::exec::{Exec, ExecState, IterationResult, MapScanState};
use crate::core::{Error, Result, Row};
use crate::storage::MapScanIterator;

/// Scans map partitions, extracting fields, filtering and projecting each entry
pub struct MapScanExec {
    id: i32,
    state: Arc<MapScanState>,
    iterator: Option<MapScanIterator>,
    batch: RowBatch,
}

impl MapScanExec {
    pub fn new(id: i32, state: MapScanState, batch_size: usize) -> Self {
        Self {
            id,
            state: Arc::new(state),
            iterator: None,
            batch: RowBatch::new(batch_size),
        }
    }

    pub fn scan_state(&self) -> &Arc<MapScanState> {
        &self.state
    }
}

impl Exec for MapScanExec {
    fn id(&self) -> i32 {
        self.id
    }

    fn setup(&mut self, _ctx: &FragmentContext) -> Result<()> {
        self.iterator = Some(MapScanIterator::new(
            Arc::clone(&self.state.map),
            &self.state.partitions,
        ));
        Ok(())
    }

    fn advance(&mut self) -> Result<IterationResult> {
        self.batch.clear();
        let iterator = self
            .iterator
            .as_mut()
            .ok_or_else(|| Error::internal(format!("map scan {} advanced before setup", self.id)))?;

        while iterator.try_advance() {
            let key = iterator.key()?;
            let value = iterator.value()?;
            if let Some(row) = self.state.prepare_row(&key, &value)? {
                if !self.batch.add(row) {
                    return Ok(IterationResult::Fetched);
                }
            }
        }
        Ok(IterationResult::FetchedDone)
    }

    fn current_batch(&self) -> Option<&[Row]> {
        self.batch.as_current()
    }

    fn state(&self) -> ExecState {
        ExecState::MapScan(Arc::clone(&self.state))
    }

    fn name(&self) -> &str {
        "MapScanExec"
    }
}
