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

//! Runtime values of the fragment VM

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::core::{DataType, Row, Value};
use crate::executor::{ExecState, FragmentContext, IterationResult};
use crate::expression::Expression;
use crate::plan::{QueryPath, TopObjectDescriptor};
use crate::storage::{MapContainer, MapScanIterator, PartitionIdSet};

/// One stack entry, local or field
#[derive(Debug, Clone, Default)]
pub enum Slot {
    /// Field that has not been assigned yet
    #[default]
    Unset,
    Value(Value),
    Row(Row),
    IntArray(Arc<[i32]>),
    Iteration(IterationResult),
    Handle(Handle),
}

impl Slot {
    pub fn null() -> Self {
        Slot::Value(Value::Null)
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Slot::Unset => "unset",
            Slot::Value(_) => "value",
            Slot::Row(_) => "row",
            Slot::IntArray(_) => "int array",
            Slot::Iteration(_) => "iteration result",
            Slot::Handle(handle) => handle.kind_name(),
        }
    }
}

impl From<Value> for Slot {
    fn from(value: Value) -> Self {
        Slot::Value(value)
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::Value(v) => write!(f, "{}", v),
            Slot::Row(r) => write!(f, "{}", r),
            Slot::Iteration(r) => write!(f, "{}", r),
            other => write!(f, "<{}>", other.kind_name()),
        }
    }
}

/// Engine object referenced from compiled code
#[derive(Debug, Clone)]
pub enum Handle {
    /// Interpreted executor passed to `prepare`
    Exec { id: i32, state: ExecState },
    Map(Arc<MapContainer>),
    Partitions(Arc<PartitionIdSet>),
    Descriptor(TopObjectDescriptor),
    Paths(Arc<[QueryPath]>),
    Types(Arc<[DataType]>),
    Indexes(Arc<[usize]>),
    Expression(Arc<Expression>),
    Expressions(Arc<[Arc<Expression>]>),
    /// Shared so a loaded copy advances the field's iterator
    Iterator(Arc<Mutex<MapScanIterator>>),
    Context(FragmentContext),
    QueryPath(QueryPath),
    DataType(DataType),
}

impl Handle {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Handle::Exec { state, .. } => state.kind_name(),
            Handle::Map(_) => "MapContainer",
            Handle::Partitions(_) => "PartitionIdSet",
            Handle::Descriptor(_) => "TopObjectDescriptor",
            Handle::Paths(_) => "List<QueryPath>",
            Handle::Types(_) => "List<DataType>",
            Handle::Indexes(_) => "List<Int>",
            Handle::Expression(_) => "Expression",
            Handle::Expressions(_) => "List<Expression>",
            Handle::Iterator(_) => "MapScanIterator",
            Handle::Context(_) => "FragmentContext",
            Handle::QueryPath(_) => "QueryPath",
            Handle::DataType(_) => "DataType",
        }
    }
}
