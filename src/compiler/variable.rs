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

//! State variables and per-row locals
//!
//! A state variable is a field of the generated unit owned by one plan node.
//! It may carry *prepare* code (run once when the unit is bound to the live
//! executor) and *setup* code (rerun on every arm). Absence of either block is
//! `None`.
//!
//! Names are derived from the owning node id and the variable kind, e.g.
//! `_1_map_scan_record_iterator`, so repeated compilations of the same plan
//! shape produce identical source.

use std::fmt;

use super::emitter::{invoke, this_field, EmitableRoutine};
use super::symbols;
use crate::core::{DataType, Error, Result};

/// Emits prepare code: `(routine, field name, executor local)`
pub type PrepareCode = Box<dyn Fn(&mut EmitableRoutine, &str, &str)>;

/// Emits setup code: `(routine, field name)`
pub type SetupCode = Box<dyn Fn(&mut EmitableRoutine, &str)>;

/// Closed set of state variable kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateVariableKind {
    MapScanMap,
    MapScanParts,
    MapScanKeyDescriptor,
    MapScanValueDescriptor,
    MapScanFieldPaths,
    MapScanFieldTypes,
    MapScanProjects,
    MapScanFilter,
    MapScanRecordIterator,
    FilterCondition,
    ProjectExpressions,
}

impl StateVariableKind {
    /// Name suffix
    pub fn suffix(&self) -> &'static str {
        match self {
            StateVariableKind::MapScanMap => "map_scan_map",
            StateVariableKind::MapScanParts => "map_scan_parts",
            StateVariableKind::MapScanKeyDescriptor => "map_scan_key_descriptor",
            StateVariableKind::MapScanValueDescriptor => "map_scan_value_descriptor",
            StateVariableKind::MapScanFieldPaths => "map_scan_field_paths",
            StateVariableKind::MapScanFieldTypes => "map_scan_field_types",
            StateVariableKind::MapScanProjects => "map_scan_projects",
            StateVariableKind::MapScanFilter => "map_scan_filter",
            StateVariableKind::MapScanRecordIterator => "map_scan_record_iterator",
            StateVariableKind::FilterCondition => "filter_condition",
            StateVariableKind::ProjectExpressions => "project_expressions",
        }
    }

    /// Source type of the field
    pub fn type_name(&self) -> &'static str {
        match self {
            StateVariableKind::MapScanMap => symbols::TYPE_MAP_CONTAINER,
            StateVariableKind::MapScanParts => symbols::TYPE_PARTITION_ID_SET,
            StateVariableKind::MapScanKeyDescriptor
            | StateVariableKind::MapScanValueDescriptor => symbols::TYPE_TOP_OBJECT_DESCRIPTOR,
            StateVariableKind::MapScanFieldPaths => "List<QueryPath>",
            StateVariableKind::MapScanFieldTypes => "List<DataType>",
            StateVariableKind::MapScanProjects => "List<Int>",
            StateVariableKind::MapScanFilter | StateVariableKind::FilterCondition => {
                symbols::TYPE_EXPRESSION
            }
            StateVariableKind::MapScanRecordIterator => symbols::TYPE_MAP_SCAN_ITERATOR,
            StateVariableKind::ProjectExpressions => "List<Expression>",
        }
    }

    /// Field name for a node
    pub fn name_for(&self, node_id: i32) -> String {
        format!("_{}_{}", node_id, self.suffix())
    }
}

/// A declared piece of per-execution state
pub struct StateVariable {
    node_id: i32,
    kind: StateVariableKind,
    prepare: Option<PrepareCode>,
    setup: Option<SetupCode>,
}

impl StateVariable {
    pub fn new(node_id: i32, kind: StateVariableKind) -> Self {
        Self {
            node_id,
            kind,
            prepare: None,
            setup: None,
        }
    }

    /// Variable bound at prepare time from an executor accessor:
    /// `this.<field> = <exec>.<method>();`
    pub fn bound_from(node_id: i32, kind: StateVariableKind, method: &'static str) -> Self {
        Self::new(node_id, kind).with_prepare(Box::new(
            move |routine: &mut EmitableRoutine, field: &str, exec: &str| {
                routine.line(format!("{} = {};", this_field(field), invoke(exec, method, &[])));
            },
        ))
    }

    pub fn with_prepare(mut self, code: PrepareCode) -> Self {
        self.prepare = Some(code);
        self
    }

    pub fn with_setup(mut self, code: SetupCode) -> Self {
        self.setup = Some(code);
        self
    }

    pub fn node_id(&self) -> i32 {
        self.node_id
    }

    pub fn kind(&self) -> StateVariableKind {
        self.kind
    }

    pub fn name(&self) -> String {
        self.kind.name_for(self.node_id)
    }

    pub fn type_name(&self) -> &'static str {
        self.kind.type_name()
    }

    pub fn prepare(&self) -> Option<&PrepareCode> {
        self.prepare.as_ref()
    }

    pub fn setup(&self) -> Option<&SetupCode> {
        self.setup.as_ref()
    }
}

impl fmt::Debug for StateVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateVariable")
            .field("name", &self.name())
            .field("type", &self.type_name())
            .field("prepare", &self.prepare.is_some())
            .field("setup", &self.setup.is_some())
            .finish()
    }
}

/// State declared by the generators of one fragment, in declaration order
#[derive(Debug, Default)]
pub struct StateRegistry {
    /// Subsumed nodes and the executor type their prepare code casts to
    nodes: Vec<(i32, &'static str)>,
    variables: Vec<StateVariable>,
}

impl StateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a subsumed node and its executor type
    pub fn register_node(&mut self, node_id: i32, exec_type: &'static str) -> Result<()> {
        if self.nodes.iter().any(|(id, _)| *id == node_id) {
            return Err(Error::internal(format!(
                "node {} registered twice",
                node_id
            )));
        }
        self.nodes.push((node_id, exec_type));
        Ok(())
    }

    /// Declare a variable and return its field name
    pub fn declare(&mut self, variable: StateVariable) -> Result<String> {
        let name = variable.name();
        if self.variables.iter().any(|v| v.name() == name) {
            return Err(Error::internal(format!(
                "state variable {} declared twice",
                name
            )));
        }
        self.variables.push(variable);
        Ok(name)
    }

    pub fn nodes(&self) -> &[(i32, &'static str)] {
        &self.nodes
    }

    pub fn variables(&self) -> &[StateVariable] {
        &self.variables
    }

    /// Variables owned by one node
    pub fn variables_of(&self, node_id: i32) -> impl Iterator<Item = &StateVariable> {
        self.variables
            .iter()
            .filter(move |v| v.node_id() == node_id)
    }
}

/// Static type of a generated local
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LocalType {
    /// Typed SQL scalar
    Scalar(DataType),
    /// Value of unknown type
    Value,
    /// Domain object of a known class
    Object(String),
    /// Materialized row
    Row,
}

impl LocalType {
    pub fn source_name(&self) -> String {
        match self {
            LocalType::Scalar(DataType::Null) | LocalType::Value => symbols::TYPE_VALUE.to_string(),
            LocalType::Scalar(t) => scalar_type_name(*t).to_string(),
            LocalType::Object(class) => format!("{}<{}>", symbols::TYPE_OBJECT, class),
            LocalType::Row => symbols::TYPE_ROW.to_string(),
        }
    }

    /// SQL type, if the local holds a typed scalar
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            LocalType::Scalar(t) => Some(*t),
            LocalType::Object(_) => Some(DataType::Object),
            _ => None,
        }
    }
}

/// Source type name of a SQL type
pub fn scalar_type_name(data_type: DataType) -> &'static str {
    match data_type {
        DataType::Null => symbols::TYPE_VALUE,
        DataType::Boolean => symbols::TYPE_BOOLEAN,
        DataType::Int => symbols::TYPE_INT,
        DataType::BigInt => symbols::TYPE_BIGINT,
        DataType::Double => symbols::TYPE_DOUBLE,
        DataType::Varchar => symbols::TYPE_VARCHAR,
        DataType::Object => symbols::TYPE_OBJECT,
    }
}

/// A named per-row value in the advance routine
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LocalVariable {
    name: String,
    ty: LocalType,
}

impl LocalVariable {
    pub fn new(name: impl Into<String>, ty: LocalType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> &LocalType {
        &self.ty
    }

    pub fn type_name(&self) -> String {
        self.ty.source_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::emitter::EmitableRoutine;

    #[test]
    fn test_deterministic_names() {
        let var = StateVariable::new(4, StateVariableKind::MapScanRecordIterator);
        assert_eq!(var.name(), "_4_map_scan_record_iterator");
        assert_eq!(var.type_name(), "MapScanIterator");
        assert!(var.prepare().is_none());
        assert!(var.setup().is_none());
    }

    #[test]
    fn test_bound_from_emits_accessor() {
        let var = StateVariable::bound_from(1, StateVariableKind::MapScanMap, "map");
        let mut routine = EmitableRoutine::method("prepare", None);
        let prepare = var.prepare().unwrap();
        prepare(&mut routine, &var.name(), "exec_1");
        assert_eq!(
            routine.commands()[0],
            crate::compiler::emitter::EmitterCommand::Content(
                "this._1_map_scan_map = exec_1.map();".to_string()
            )
        );
    }

    #[test]
    fn test_registry_rejects_duplicates() {
        let mut registry = StateRegistry::new();
        registry.register_node(1, "MapScanExec").unwrap();
        assert!(registry.register_node(1, "MapScanExec").is_err());
        registry
            .declare(StateVariable::new(1, StateVariableKind::MapScanMap))
            .unwrap();
        assert!(registry
            .declare(StateVariable::new(1, StateVariableKind::MapScanMap))
            .is_err());
        assert_eq!(registry.variables_of(1).count(), 1);
    }

    #[test]
    fn test_local_type_names() {
        assert_eq!(LocalType::Scalar(DataType::BigInt).source_name(), "BigInt");
        assert_eq!(LocalType::Object("Person".into()).source_name(), "Object<Person>");
        assert_eq!(LocalType::Value.source_name(), "Value");
    }
}
