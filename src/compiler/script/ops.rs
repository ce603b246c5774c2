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

// Fragment VM Operations
//
// Instruction set of the stack machine that runs compiled units.
// Operands are resolved at lowering time:
// - locals, fields and constants are addressed by index
// - method calls carry a pre-resolved method id
// - jumps carry absolute instruction indexes

use std::sync::Arc;

use super::types::ExecKind;
use crate::core::DataType;

/// Engine method resolved at lowering time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MethodId {
    /// `Exec.id()`
    ExecId,
    /// `MapScanExec.map()`
    ScanMap,
    /// `MapScanExec.partitions()`
    ScanPartitions,
    /// `MapScanExec.keyDescriptor()`
    ScanKeyDescriptor,
    /// `MapScanExec.valueDescriptor()`
    ScanValueDescriptor,
    /// `MapScanExec.fieldPaths()`
    ScanFieldPaths,
    /// `MapScanExec.fieldTypes()`
    ScanFieldTypes,
    /// `MapScanExec.projects()`
    ScanProjects,
    /// `MapScanExec.filter()`, null when the scan has no filter
    ScanFilter,
    /// `FilterExec.condition()`
    FilterCondition,
    /// `ProjectExec.projects()`
    ProjectExpressions,
    /// `List<T>.get(i)`
    ListGet,
    /// `List<T>.size()`
    ListSize,
    /// `MapScanIterator.tryAdvance()`
    TryAdvance,
    /// `MapScanIterator.key()`
    IteratorKey,
    /// `MapScanIterator.value()`
    IteratorValue,
    /// `Expression.eval(row)`
    Eval,
    /// `Row.get(i)`
    RowGet,
    /// `Row.size()`
    RowSize,
}

impl MethodId {
    /// Method name as written in source
    pub fn name(&self) -> &'static str {
        match self {
            MethodId::ExecId => "id",
            MethodId::ScanMap => "map",
            MethodId::ScanPartitions => "partitions",
            MethodId::ScanKeyDescriptor => "keyDescriptor",
            MethodId::ScanValueDescriptor => "valueDescriptor",
            MethodId::ScanFieldPaths => "fieldPaths",
            MethodId::ScanFieldTypes => "fieldTypes",
            MethodId::ScanProjects | MethodId::ProjectExpressions => "projects",
            MethodId::ScanFilter => "filter",
            MethodId::FilterCondition => "condition",
            MethodId::ListGet | MethodId::RowGet => "get",
            MethodId::ListSize | MethodId::RowSize => "size",
            MethodId::TryAdvance => "tryAdvance",
            MethodId::IteratorKey => "key",
            MethodId::IteratorValue => "value",
            MethodId::Eval => "eval",
        }
    }
}

/// Target of a runtime cast
#[derive(Debug, Clone, PartialEq)]
pub enum CastTarget {
    /// Convert a SQL value with `DataType::convert`
    Scalar(DataType),
    /// Check for an object, of a given class when known
    Object(Option<Arc<str>>),
    /// Narrow a generic executor handle
    Exec(ExecKind),
}

/// Fragment VM Operation
///
/// Stack effects are noted as `[inputs] -> [outputs]`.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    // =========================================================================
    // LOAD / STORE
    // =========================================================================
    /// Push a constant from the unit's pool
    /// Stack: [] -> [value]
    Const(u32),
    /// Stack: [] -> [null]
    Null,
    /// Stack: [] -> [true]
    True,
    /// Stack: [] -> [false]
    False,
    /// Stack: [] -> [local]
    LoadLocal(u32),
    /// Stack: [value] -> []
    StoreLocal(u32),
    /// Stack: [] -> [field]
    LoadField(u32),
    /// Stack: [value] -> []
    StoreField(u32),
    /// Stack: [value] -> []
    Pop,

    // =========================================================================
    // ARITHMETIC (checked, same-typed operands)
    // =========================================================================
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    /// Stack: [a] -> [-a]
    Neg,
    /// Stack: [bool] -> [!bool]
    Not,

    // =========================================================================
    // COMPARISON
    // =========================================================================
    /// Null-aware equality: null == null is true
    Eq,
    /// Null-aware inequality
    Ne,
    Lt,
    Le,
    Gt,
    Ge,

    // =========================================================================
    // CONTROL FLOW
    // =========================================================================
    /// Unconditional jump to an instruction index
    Jump(u32),
    /// Stack: [bool] -> []
    JumpIfFalse(u32),
    /// Stack: [bool] -> []
    JumpIfTrue(u32),
    /// Stack: [value] -> [], ends the routine with a result
    Return,
    /// Ends a routine without a result
    ReturnVoid,
    /// Control reached the end of a routine that must return a value
    MissingReturn,

    // =========================================================================
    // ENGINE CALLS
    // =========================================================================
    /// Stack: [value] -> [converted]
    Cast(CastTarget),
    /// Stack: [target, arg1..argN] -> [result]
    Call(MethodId, u8),
    /// Object getter; operand is the name pool index of the field
    /// Stack: [object] -> [value]
    Getter(u32),
    /// `HeapRow.of(...)`
    /// Stack: [v1..vN] -> [row]
    NewRow(u32),
    /// `MapScanUtils.createIterator(map, parts)`
    /// Stack: [map, parts] -> [iterator]
    CreateIterator,
    /// `this.clearBatch()`
    ClearBatch,
    /// `this.addToBatch(row)`
    /// Stack: [row] -> [has_room]
    AddToBatch,
}
