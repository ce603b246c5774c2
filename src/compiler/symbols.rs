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

//! Names shared by the code generators and the fragment compiler
//!
//! Generated source refers to engine types and methods by these names. The
//! fragment compiler resolves the same constants, so a rename here changes
//! both sides at once.

/// Module every generated unit is declared in
pub const UNIT_MODULE: &str = "sql.compiled";
/// Base unit of every generated unit
pub const BASE_UNIT: &str = "CompiledExec";
/// Prefix of content-addressed unit names
pub const UNIT_NAME_PREFIX: &str = "CompiledExec_";

// Modules that provide engine symbols
pub const MODULE_EXEC: &str = "sql.exec";
pub const MODULE_ROW: &str = "sql.row";
pub const MODULE_EXPRESSION: &str = "sql.expression";
pub const MODULE_PLAN: &str = "sql.plan";
pub const MODULE_STORAGE: &str = "sql.storage";

/// Every importable module
pub const MODULES: &[&str] = &[
    MODULE_EXEC,
    MODULE_ROW,
    MODULE_EXPRESSION,
    MODULE_PLAN,
    MODULE_STORAGE,
];

// Routines of a compiled unit
pub const ROUTINE_PREPARE: &str = "prepare";
pub const ROUTINE_SETUP: &str = "setup";
pub const ROUTINE_ADVANCE: &str = "advance";
pub const PARAM_EXEC: &str = "exec";
pub const PARAM_CTX: &str = "ctx";

// Built-in types
pub const TYPE_BOOLEAN: &str = "Boolean";
pub const TYPE_INT: &str = "Int";
pub const TYPE_BIGINT: &str = "BigInt";
pub const TYPE_DOUBLE: &str = "Double";
pub const TYPE_VARCHAR: &str = "Varchar";
pub const TYPE_VALUE: &str = "Value";
pub const TYPE_OBJECT: &str = "Object";
pub const TYPE_INT_ARRAY: &str = "IntArray";
pub const TYPE_LIST: &str = "List";

// Engine types
pub const TYPE_EXEC: &str = "Exec";
pub const TYPE_MAP_SCAN_EXEC: &str = "MapScanExec";
pub const TYPE_FILTER_EXEC: &str = "FilterExec";
pub const TYPE_PROJECT_EXEC: &str = "ProjectExec";
pub const TYPE_MAP_SCAN_ITERATOR: &str = "MapScanIterator";
pub const TYPE_FRAGMENT_CONTEXT: &str = "FragmentContext";
pub const TYPE_ITERATION_RESULT: &str = "IterationResult";
pub const TYPE_ROW: &str = "Row";
pub const TYPE_EXPRESSION: &str = "Expression";
pub const TYPE_QUERY_PATH: &str = "QueryPath";
pub const TYPE_DATA_TYPE: &str = "DataType";
pub const TYPE_TOP_OBJECT_DESCRIPTOR: &str = "TopObjectDescriptor";
pub const TYPE_MAP_CONTAINER: &str = "MapContainer";
pub const TYPE_PARTITION_ID_SET: &str = "PartitionIdSet";

// Static owners and their members
pub const HEAP_ROW: &str = "HeapRow";
pub const HEAP_ROW_OF: &str = "of";
pub const MAP_SCAN_UTILS: &str = "MapScanUtils";
pub const MAP_SCAN_UTILS_CREATE_ITERATOR: &str = "createIterator";
pub const ITERATION_FETCHED: &str = "FETCHED";
pub const ITERATION_FETCHED_DONE: &str = "FETCHED_DONE";

// Methods on `this`
pub const METHOD_CLEAR_BATCH: &str = "clearBatch";
pub const METHOD_ADD_TO_BATCH: &str = "addToBatch";

// Methods on engine handles
pub const METHOD_ID: &str = "id";
pub const METHOD_MAP: &str = "map";
pub const METHOD_PARTITIONS: &str = "partitions";
pub const METHOD_KEY_DESCRIPTOR: &str = "keyDescriptor";
pub const METHOD_VALUE_DESCRIPTOR: &str = "valueDescriptor";
pub const METHOD_FIELD_PATHS: &str = "fieldPaths";
pub const METHOD_FIELD_TYPES: &str = "fieldTypes";
pub const METHOD_PROJECTS: &str = "projects";
pub const METHOD_FILTER: &str = "filter";
pub const METHOD_CONDITION: &str = "condition";
pub const METHOD_GET: &str = "get";
pub const METHOD_SIZE: &str = "size";
pub const METHOD_TRY_ADVANCE: &str = "tryAdvance";
pub const METHOD_KEY: &str = "key";
pub const METHOD_VALUE: &str = "value";
pub const METHOD_EVAL: &str = "eval";

/// Module that must be imported to use a symbol, `None` for built-ins
pub fn module_of(symbol: &str) -> Option<&'static str> {
    match symbol {
        TYPE_EXEC
        | TYPE_MAP_SCAN_EXEC
        | TYPE_FILTER_EXEC
        | TYPE_PROJECT_EXEC
        | TYPE_MAP_SCAN_ITERATOR
        | TYPE_FRAGMENT_CONTEXT
        | TYPE_ITERATION_RESULT
        | MAP_SCAN_UTILS
        | BASE_UNIT => Some(MODULE_EXEC),
        TYPE_ROW | HEAP_ROW => Some(MODULE_ROW),
        TYPE_EXPRESSION => Some(MODULE_EXPRESSION),
        TYPE_QUERY_PATH | TYPE_DATA_TYPE | TYPE_TOP_OBJECT_DESCRIPTOR => Some(MODULE_PLAN),
        TYPE_MAP_CONTAINER | TYPE_PARTITION_ID_SET => Some(MODULE_STORAGE),
        _ => None,
    }
}

/// Modules needed by a type name such as `List<QueryPath>`
pub fn modules_of_type(type_name: &str) -> impl Iterator<Item = &'static str> + '_ {
    type_name
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter_map(module_of)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_of() {
        assert_eq!(module_of(TYPE_MAP_SCAN_EXEC), Some(MODULE_EXEC));
        assert_eq!(module_of(HEAP_ROW), Some(MODULE_ROW));
        assert_eq!(module_of(TYPE_INT), None);
        let modules: Vec<_> = modules_of_type("List<QueryPath>").collect();
        assert_eq!(modules, vec![MODULE_PLAN]);
        assert_eq!(modules_of_type("Object<Person>").count(), 0);
    }
}
