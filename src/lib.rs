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

//! # sqljit - Fragment compiler for SQL plan trees
//!
//! sqljit replaces runs of interpreted plan operators with compiled units.
//! A plan is partitioned into maximal compilable fragments (map scan,
//! filter, projection); each fragment is emitted as source, compiled to
//! bytecode and bound back into the executor graph in place of the
//! interpreted operators it subsumes. Anything that cannot be compiled stays
//! interpreted, and any compilation or binding failure falls back to full
//! interpretation.
//!
//! ## Key Features
//!
//! - **Fragment partitioning** - Post-order pass producing maximal compilable runs
//! - **Inline expressions** - Three-valued inline code with an interpreted fallback
//! - **Content-addressed units** - Identical fragments produce identical source
//! - **Unit cache** - LRU cache of compiled unit types
//! - **Bounded batches** - Compiled and interpreted operators share batch semantics
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use sqljit::compiler::CompilerConfig;
//! use sqljit::executor::{ExecutionMode, QueryRunner};
//! use sqljit::expression::Expression;
//! use sqljit::plan::{MapScanNode, PlanBuilder, PlanNodeKind, QueryPath, TopObjectDescriptor};
//! use sqljit::storage::{MapContainer, Storage};
//! use sqljit::{DataType, ObjectValue};
//!
//! let mut points = MapContainer::new("points");
//! for i in 0..10 {
//!     points.put(i, ObjectValue::new("Point").with("c", i % 3).with("d", i));
//! }
//! let mut storage = Storage::new();
//! storage.register(points);
//!
//! // WHERE c + d = d
//! let c = Expression::column(0, DataType::Int);
//! let d = Expression::column(1, DataType::Int);
//! let filter = Expression::equals(Expression::plus(c, d.clone(), DataType::Int), d);
//!
//! let mut plan = PlanBuilder::new();
//! plan.add(
//!     1,
//!     PlanNodeKind::MapScan(MapScanNode {
//!         map_name: "points".to_string(),
//!         key_descriptor: TopObjectDescriptor::Scalar(DataType::Int),
//!         value_descriptor: TopObjectDescriptor::class("Point"),
//!         field_paths: vec![QueryPath::value_field("c"), QueryPath::value_field("d")],
//!         field_types: vec![DataType::Int, DataType::Int],
//!         projects: vec![0, 1],
//!         filter: Some(filter),
//!     }),
//!     &[],
//! )?;
//! plan.add(2, PlanNodeKind::Root, &[1])?;
//! let plan = plan.build(2)?;
//!
//! let runner = QueryRunner::new(Arc::new(storage), CompilerConfig::default());
//! let output = runner.run(&plan)?;
//! assert_eq!(output.mode, ExecutionMode::Compiled);
//! assert_eq!(output.rows.len(), 4);
//! # Ok::<(), sqljit::Error>(())
//! ```
//!
//! ## Modules
//!
//! - [`core`] - Values, types, rows and errors
//! - [`plan`] - Plan trees and map field paths
//! - [`expression`] - Interpreted expressions
//! - [`storage`] - Partitioned in-memory maps
//! - [`executor`] - Batched interpreted executors and query running
//! - [`compiler`] - Partitioning, code generation and compiled units

pub mod compiler;
pub mod core;
pub mod executor;
pub mod expression;
pub mod plan;
pub mod storage;

pub use core::{ComparisonMode, DataType, Error, ObjectValue, Result, Row, Value};

pub use plan::{PlanBuilder, PlanNode, PlanNodeKind, PlanTree, QueryPath, TopObjectDescriptor};

pub use expression::Expression;

pub use storage::{MapContainer, PartitionIdSet, Storage};

pub use executor::{Exec, ExecBuilder, ExecutionMode, FragmentContext, IterationResult, QueryRunner};

pub use compiler::{CompiledFragmentTemplate, CompilerConfig, CompilerManager, Fragment};
