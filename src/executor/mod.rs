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

//! Batched Executors
//!
//! Interpreted operators and the machinery that swaps compiled units into
//! the executor graph.
//!
//! # Architecture
//!
//! Every operator pulls batches from its inputs:
//!
//! ```text
//! RootExec.collect()
//!   ↓ advance()
//! SortExec / NestedLoopJoinExec
//!   ↓ advance()
//! ProjectExec ─ FilterExec ─ MapScanExec     (or one CompiledExec)
//! ```
//!
//! # Components
//!
//! - [`Exec`]: batched executor contract shared with compiled units
//! - [`ExecBuilder`]: builds the graph from a plan, binding compiled units
//! - [`QueryRunner`]: compiled execution with interpreted fallback
//! - [`FragmentContext`]: query id and cancellation flag

pub mod batch;
pub mod builder;
pub mod context;
pub mod exec;
pub mod operators;
pub mod query;
pub mod scan;

pub use batch::{RowBatch, UpstreamCursor, DEFAULT_BATCH_SIZE};
pub use builder::ExecBuilder;
pub use context::{CancellationHandle, FragmentContext};
pub use exec::{
    filter_passes, Exec, ExecState, FilterState, IterationResult, MapScanState, ProjectState,
};
pub use operators::{FilterExec, NestedLoopJoinExec, ProjectExec, RootExec, SortExec};
pub use query::{ExecutionMode, QueryOutput, QueryRunner};
pub use scan::MapScanExec;
