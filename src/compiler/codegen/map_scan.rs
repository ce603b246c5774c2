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

//! Map scan generator
//!
//! Emits the iterator loop of a scan leaf:
//!
//! ```text
//! while (this._1_map_scan_record_iterator.tryAdvance()) {
//!     let _1_top_value: Object<Person> = (this._1_map_scan_record_iterator.value() as Object<Person>);
//!     let _1_value_age: Int = (_1_top_value == null) ? null : (_1_top_value.getAge() as Int);
//!     ...filter, projection and downstream operators...
//! }
//! ```
//!
//! Top-level objects are read and checked against their descriptor once per
//! row, on first use, and shared by every path below them.

use rustc_hash::FxHashMap;

use crate::compiler::emitter::{cast, invoke, invoke_static, this_field, EmitableRoutine};
use crate::compiler::expression::compile_predicate;
use crate::compiler::script::token::is_keyword;
use crate::compiler::symbols;
use crate::compiler::variable::{
    LocalType, LocalVariable, StateRegistry, StateVariable, StateVariableKind,
};
use crate::core::{DataType, Error, ObjectValue, Result};
use crate::plan::{MapScanNode, QueryPath, TopObjectDescriptor};

#[derive(Debug, Clone)]
pub struct MapScanGenerator {
    node_id: i32,
    scan: MapScanNode,
}

impl MapScanGenerator {
    /// Create a generator, failing with [`Error::Unsupported`] when the scan
    /// cannot be compiled
    pub fn new(node_id: i32, scan: &MapScanNode) -> Result<Self> {
        check_compilable(scan)?;
        Ok(Self {
            node_id,
            scan: scan.clone(),
        })
    }

    pub fn node_id(&self) -> i32 {
        self.node_id
    }

    fn field_name(&self, kind: StateVariableKind) -> String {
        kind.name_for(self.node_id)
    }

    pub fn declare(&self, state: &mut StateRegistry) -> Result<()> {
        let id = self.node_id;
        state.register_node(id, symbols::TYPE_MAP_SCAN_EXEC)?;

        let bound = [
            (StateVariableKind::MapScanMap, symbols::METHOD_MAP),
            (StateVariableKind::MapScanParts, symbols::METHOD_PARTITIONS),
            (StateVariableKind::MapScanKeyDescriptor, symbols::METHOD_KEY_DESCRIPTOR),
            (StateVariableKind::MapScanValueDescriptor, symbols::METHOD_VALUE_DESCRIPTOR),
            (StateVariableKind::MapScanFieldPaths, symbols::METHOD_FIELD_PATHS),
            (StateVariableKind::MapScanFieldTypes, symbols::METHOD_FIELD_TYPES),
            (StateVariableKind::MapScanProjects, symbols::METHOD_PROJECTS),
            (StateVariableKind::MapScanFilter, symbols::METHOD_FILTER),
        ];
        for (kind, method) in bound {
            state.declare(StateVariable::bound_from(id, kind, method))?;
        }

        // The iterator is recreated on every arm
        let map = this_field(&self.field_name(StateVariableKind::MapScanMap));
        let parts = this_field(&self.field_name(StateVariableKind::MapScanParts));
        let iterator = StateVariable::new(id, StateVariableKind::MapScanRecordIterator).with_setup(
            Box::new(move |routine: &mut EmitableRoutine, field: &str| {
                let create = invoke_static(
                    routine,
                    symbols::MAP_SCAN_UTILS,
                    symbols::MAP_SCAN_UTILS_CREATE_ITERATOR,
                    &[&map, &parts],
                );
                routine.line(format!("{} = {};", this_field(field), create));
            }),
        );
        state.declare(iterator)?;
        Ok(())
    }

    pub fn row_start(&self, routine: &mut EmitableRoutine) -> Result<Vec<LocalVariable>> {
        let iterator = this_field(&self.field_name(StateVariableKind::MapScanRecordIterator));
        routine.line(format!(
            "while ({}) {{",
            invoke(&iterator, symbols::METHOD_TRY_ADVANCE, &[])
        ));
        routine.indent();

        let mut tops = TopLocals::default();
        let mut by_path: FxHashMap<(&QueryPath, DataType), LocalVariable> = FxHashMap::default();
        let mut fields = Vec::with_capacity(self.scan.field_paths.len());
        for (index, (path, data_type)) in self
            .scan
            .field_paths
            .iter()
            .zip(&self.scan.field_types)
            .enumerate()
        {
            if let Some(local) = by_path.get(&(path, *data_type)) {
                fields.push(local.clone());
                continue;
            }
            let local = self.emit_field(routine, &mut tops, &iterator, index, path, *data_type)?;
            by_path.insert((path, *data_type), local.clone());
            fields.push(local);
        }

        if let Some(filter) = &self.scan.filter {
            let source = this_field(&self.field_name(StateVariableKind::MapScanFilter));
            let passed = compile_predicate(routine, self.node_id, "filter", filter, &fields, &source)?;
            emit_skip_unless(routine, &passed);
        }

        self.scan
            .projects
            .iter()
            .map(|&i| {
                fields.get(i).cloned().ok_or_else(|| {
                    Error::plan_invariant(format!(
                        "scan {} projects field {} of {}",
                        self.node_id,
                        i,
                        fields.len()
                    ))
                })
            })
            .collect()
    }

    pub fn row_end(&self, routine: &mut EmitableRoutine) {
        routine.dedent();
        routine.line("}");
    }

    fn descriptor(&self, key: bool) -> &TopObjectDescriptor {
        if key {
            &self.scan.key_descriptor
        } else {
            &self.scan.value_descriptor
        }
    }

    fn emit_field(
        &self,
        routine: &mut EmitableRoutine,
        tops: &mut TopLocals,
        iterator: &str,
        index: usize,
        path: &QueryPath,
        data_type: DataType,
    ) -> Result<LocalVariable> {
        let side = if path.is_key() { "key" } else { "value" };
        let descriptor = self.descriptor(path.is_key());
        let top = tops.get_or_emit(routine, self.node_id, iterator, path.is_key(), descriptor)?;

        let (mut name, init) = match (path.path(), descriptor) {
            // Whole object of a class: the top local already has the field's value
            (None, TopObjectDescriptor::Class(_)) => return Ok(top),
            (None, TopObjectDescriptor::Scalar(_)) => (
                format!("_{}_{}", self.node_id, side),
                cast(top.name(), &LocalType::Scalar(data_type).source_name()),
            ),
            (Some(field), TopObjectDescriptor::Class(_)) => {
                let getter = invoke(top.name(), &ObjectValue::getter_name(field), &[]);
                (
                    format!("_{}_{}_{}", self.node_id, side, field),
                    format!(
                        "({} == null) ? null : {}",
                        top.name(),
                        cast(&getter, &LocalType::Scalar(data_type).source_name())
                    ),
                )
            }
            (Some(_), TopObjectDescriptor::Scalar(_)) => {
                return Err(Error::unsupported(format!("nested path {} below a scalar", path)))
            }
        };
        if routine.has_local(&name) {
            name = format!("{}_{}", name, index);
        }
        let local = LocalVariable::new(name, LocalType::Scalar(data_type));
        routine.declare_local(&local, &init)?;
        Ok(local)
    }
}

/// Top-level key and value locals of the current row
#[derive(Default)]
struct TopLocals {
    key: Option<LocalVariable>,
    value: Option<LocalVariable>,
}

impl TopLocals {
    fn get_or_emit(
        &mut self,
        routine: &mut EmitableRoutine,
        node_id: i32,
        iterator: &str,
        key: bool,
        descriptor: &TopObjectDescriptor,
    ) -> Result<LocalVariable> {
        let slot = if key { &mut self.key } else { &mut self.value };
        if let Some(local) = slot {
            return Ok(local.clone());
        }
        let (side, method) = if key {
            ("key", symbols::METHOD_KEY)
        } else {
            ("value", symbols::METHOD_VALUE)
        };
        let read = invoke(iterator, method, &[]);
        let name = format!("_{}_top_{}", node_id, side);
        let local = match descriptor {
            TopObjectDescriptor::Class(class) => {
                let ty = LocalType::Object(class.clone());
                let init = cast(&read, &ty.source_name());
                let local = LocalVariable::new(name, ty);
                routine.declare_local(&local, &init)?;
                local
            }
            TopObjectDescriptor::Scalar(_) => {
                let local = LocalVariable::new(name, LocalType::Value);
                routine.declare_local(&local, &read)?;
                local
            }
        };
        *slot = Some(local.clone());
        Ok(local)
    }
}

/// `if (p == null || !p) { continue; }`
pub(crate) fn emit_skip_unless(routine: &mut EmitableRoutine, passed: &LocalVariable) {
    routine.line(format!(
        "if ({0} == null || !{0}) {{",
        passed.name()
    ));
    routine.indent();
    routine.line("continue;");
    routine.dedent();
    routine.line("}");
}

/// Reject scans whose field extraction cannot be expressed inline
fn check_compilable(scan: &MapScanNode) -> Result<()> {
    if scan.field_paths.len() != scan.field_types.len() {
        return Err(Error::unsupported("field paths and types differ in length"));
    }
    if let Some(bad) = scan.projects.iter().find(|&&p| p >= scan.field_paths.len()) {
        return Err(Error::unsupported(format!("projection of missing field {}", bad)));
    }
    for descriptor in [&scan.key_descriptor, &scan.value_descriptor] {
        if let TopObjectDescriptor::Class(class) = descriptor {
            if !class.split('.').all(is_identifier) {
                return Err(Error::unsupported(format!("class name {}", class)));
            }
        }
    }
    for (path, data_type) in scan.field_paths.iter().zip(&scan.field_types) {
        if *data_type == DataType::Null {
            return Err(Error::unsupported(format!("field {} has no type", path)));
        }
        let descriptor = if path.is_key() {
            &scan.key_descriptor
        } else {
            &scan.value_descriptor
        };
        match (path.path(), descriptor) {
            (None, TopObjectDescriptor::Class(_)) if *data_type != DataType::Object => {
                return Err(Error::unsupported(format!(
                    "top-level object {} read as {}",
                    path, data_type
                )))
            }
            (None, _) => {}
            (Some(_), TopObjectDescriptor::Scalar(_)) => {
                return Err(Error::unsupported(format!("nested path {} below a scalar", path)))
            }
            (Some(field), TopObjectDescriptor::Class(_)) => {
                if path.depth() > 1 {
                    return Err(Error::unsupported(format!("path {} is nested too deep", path)));
                }
                // The getter must resolve back to the same field name
                let round_trip = ObjectValue::field_for_getter(&ObjectValue::getter_name(field));
                if !is_identifier(field) || round_trip.as_deref() != Some(field) {
                    return Err(Error::unsupported(format!("field name {}", field)));
                }
            }
        }
    }
    Ok(())
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };
    valid && !is_keyword(name)
}
