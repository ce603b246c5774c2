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

//! Physical plan model
//!
//! The plan is produced by the optimizer and only read here. It is stored as
//! an arena of immutable nodes addressed by integer id, which gives the
//! partitioner and the executor builder O(1) lookups.

pub mod node;
pub mod path;

pub use node::{
    FilterNode, JoinNode, MapScanNode, PlanBuilder, PlanNode, PlanNodeKind, PlanTree,
    ProjectNode, SortNode,
};
pub use path::{QueryPath, TopObjectDescriptor, KEY_ATTRIBUTE, VALUE_ATTRIBUTE};
