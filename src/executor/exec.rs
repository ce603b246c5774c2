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

//! Batched executor interface shared by interpreted and compiled operators.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐
//! │ RootExec     │ ← Calls advance() until FetchedDone
//! └──────┬───────┘
//!        │
//! ┌──────▼───────┐
//! │ CompiledExec │ ← Subsumes Project + Filter + MapScan
//! └──────────────┘
//! ```
//!
//! Every executor fills a bounded batch per `advance()` call. A full batch
//! returns [`IterationResult::Fetched`] so the caller drains it and calls
//! again; [`IterationResult::FetchedDone`] marks the last batch (which may be
//! empty).

use std::fmt;
use std::sync::Arc;

use super::context::FragmentContext;
use crate::core::{DataType, Error, Result, Row, Value};
use crate::expression::Expression;
use crate::plan::{QueryPath, TopObjectDescriptor};
use crate::storage::{MapContainer, PartitionIdSet};

/// Outcome of one `advance()` call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IterationResult {
    /// The batch is full and more rows may follow
    Fetched,
    /// Input is exhausted; the batch holds the final rows
    FetchedDone,
}

impl IterationResult {
    pub fn is_done(&self) -> bool {
        matches!(self, IterationResult::FetchedDone)
    }
}

impl fmt::Display for IterationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IterationResult::Fetched => write!(f, "FETCHED"),
            IterationResult::FetchedDone => write!(f, "FETCHED_DONE"),
        }
    }
}

/// Batched executor interface.
///
/// The lifecycle is `setup()` once per execution attempt, then `advance()`
/// repeatedly until it returns `FetchedDone`. After each `advance()` the rows
/// produced by that call are available from `current_batch()`.
///
/// # Thread Safety
///
/// Executors are `Send` so a query can run on any thread, but one executor is
/// driven by a single consumer and is never advanced concurrently.
pub trait Exec: Send {
    /// Plan node id this executor was created for
    fn id(&self) -> i32;

    /// Arm the executor for a new execution attempt.
    ///
    /// Upstream executors are armed first. Row sources such as map iterators
    /// are recreated here.
    fn setup(&mut self, ctx: &FragmentContext) -> Result<()>;

    /// Produce the next batch
    fn advance(&mut self) -> Result<IterationResult>;

    /// Rows produced by the last `advance()`, `None` when empty
    fn current_batch(&self) -> Option<&[Row]>;

    /// State handles exposed to compiled prepare code
    fn state(&self) -> ExecState {
        ExecState::Opaque
    }

    /// True for compiled units
    fn is_compiled(&self) -> bool {
        false
    }

    /// Descriptive name (for diagnostics)
    fn name(&self) -> &str;
}

/// Bindable state of an interpreted executor
///
/// Compiled prepare code casts an executor handle to its concrete kind and
/// copies these handles into the fields of the compiled unit.
#[derive(Debug, Clone)]
pub enum ExecState {
    /// Executor exposes nothing to compiled code
    Opaque,
    MapScan(Arc<MapScanState>),
    Filter(Arc<FilterState>),
    Project(Arc<ProjectState>),
}

impl ExecState {
    pub fn kind_name(&self) -> &'static str {
        match self {
            ExecState::Opaque => "Exec",
            ExecState::MapScan(_) => "MapScanExec",
            ExecState::Filter(_) => "FilterExec",
            ExecState::Project(_) => "ProjectExec",
        }
    }
}

/// Handles of a map scan
#[derive(Debug, Clone)]
pub struct MapScanState {
    pub map: Arc<MapContainer>,
    pub partitions: Arc<PartitionIdSet>,
    pub key_descriptor: TopObjectDescriptor,
    pub value_descriptor: TopObjectDescriptor,
    pub field_paths: Arc<[QueryPath]>,
    pub field_types: Arc<[DataType]>,
    pub projects: Arc<[usize]>,
    pub filter: Option<Arc<Expression>>,
}

impl MapScanState {
    /// Extract, filter and project one map entry.
    ///
    /// All declared fields are extracted and converted to their types, the
    /// filter sees the extracted row, and the projection selects from it.
    /// Returns `None` when the filter is NULL or FALSE.
    pub fn prepare_row(
        &self,
        key: &Value,
        value: &Value,
    ) -> Result<Option<Row>> {
        let mut fields = Vec::with_capacity(self.field_paths.len());
        for (path, data_type) in self.field_paths.iter().zip(self.field_types.iter()) {
            let raw = path.extract(key, value, &self.key_descriptor, &self.value_descriptor)?;
            fields.push(data_type.convert(&raw)?);
        }
        let row = Row::from_values(fields);

        if let Some(filter) = &self.filter {
            if !filter_passes(&filter.eval(&row)?)? {
                return Ok(None);
            }
        }

        let projected = self
            .projects
            .iter()
            .map(|&i| row.value(i).cloned())
            .collect::<Result<Vec<_>>>()?;
        Ok(Some(Row::from_values(projected)))
    }
}

/// Three-valued filter check: only TRUE passes, NULL and FALSE suppress
pub fn filter_passes(value: &Value) -> Result<bool> {
    match value {
        Value::Null => Ok(false),
        Value::Boolean(b) => Ok(*b),
        other => Err(Error::type_mismatch(
            "BOOLEAN",
            other.data_type().to_string(),
        )),
    }
}

/// Handles of a filter
#[derive(Debug, Clone)]
pub struct FilterState {
    pub condition: Arc<Expression>,
}

/// Handles of a projection
#[derive(Debug, Clone)]
pub struct ProjectState {
    pub projects: Arc<[Arc<Expression>]>,
}

impl ProjectState {
    pub fn project(&self, row: &Row) -> Result<Row> {
        self.projects
            .iter()
            .map(|e| e.eval(row))
            .collect::<Result<Vec<_>>>()
            .map(Row::from_values)
    }
}
