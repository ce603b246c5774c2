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

//! Emitable units

use std::collections::BTreeSet;

use super::command::Emitter;
use super::routine::EmitableRoutine;
use crate::compiler::symbols;
use crate::core::{Error, Result};

/// A state field of a unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmitableField {
    pub name: String,
    pub type_name: String,
}

/// A complete program unit under construction
///
/// ```text
/// module sql.compiled;
///
/// import sql.exec;
///
/// unit CompiledExec_0123456789abcdef extends CompiledExec {
///     field _1_map_scan_map: MapContainer;
///
///     new() { ... }
///     fn prepare(exec: Exec) { ... }
/// }
/// ```
#[derive(Debug, Clone)]
pub struct EmitableUnit {
    module: String,
    name: String,
    base: String,
    imports: BTreeSet<&'static str>,
    fields: Vec<EmitableField>,
    routines: Vec<EmitableRoutine>,
}

impl EmitableUnit {
    pub fn new(module: impl Into<String>, name: impl Into<String>, base: &str) -> Self {
        let mut imports = BTreeSet::new();
        imports.extend(symbols::module_of(base));
        Self {
            module: module.into(),
            name: name.into(),
            base: base.to_string(),
            imports,
            fields: Vec::new(),
            routines: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Module-qualified name, e.g. `sql.compiled.CompiledExec_...`
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.module, self.name)
    }

    pub fn add_import(&mut self, module: &'static str) {
        self.imports.insert(module);
    }

    /// Declare a state field; names must be unique
    pub fn add_field(&mut self, name: &str, type_name: &str) -> Result<()> {
        if self.fields.iter().any(|f| f.name == name) {
            return Err(Error::internal(format!("field {} already declared", name)));
        }
        self.imports.extend(symbols::modules_of_type(type_name));
        self.fields.push(EmitableField {
            name: name.to_string(),
            type_name: type_name.to_string(),
        });
        Ok(())
    }

    pub fn fields(&self) -> &[EmitableField] {
        &self.fields
    }

    pub fn add_routine(&mut self, routine: EmitableRoutine) {
        self.imports.extend(routine.imports());
        self.routines.push(routine);
    }

    pub fn routines(&self) -> &[EmitableRoutine] {
        &self.routines
    }

    /// Render the unit as source text
    pub fn emit(&self) -> String {
        let mut emitter = Emitter::new();
        emitter.line(&format!("module {};", self.module));
        emitter.new_line();
        if !self.imports.is_empty() {
            for import in &self.imports {
                emitter.line(&format!("import {};", import));
            }
            emitter.new_line();
        }

        emitter.line(&format!("unit {} extends {} {{", self.name, self.base));
        emitter.indent();
        for field in &self.fields {
            emitter.line(&format!("field {}: {};", field.name, field.type_name));
        }
        for routine in &self.routines {
            emitter.new_line();
            routine.emit(&mut emitter);
        }
        emitter.dedent();
        emitter.line("}");
        emitter.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_unit() {
        let mut unit = EmitableUnit::new("sql.compiled", "Sample", "CompiledExec");
        unit.add_field("_1_map_scan_map", "MapContainer").unwrap();
        assert!(unit.add_field("_1_map_scan_map", "MapContainer").is_err());

        let mut ctor = EmitableRoutine::constructor();
        ctor.line("super(1, [1]);");
        unit.add_routine(ctor);

        let expected = "\
module sql.compiled;

import sql.exec;
import sql.storage;

unit Sample extends CompiledExec {
    field _1_map_scan_map: MapContainer;

    new() {
        super(1, [1]);
    }
}
";
        assert_eq!(unit.emit(), expected);
        assert_eq!(unit.qualified_name(), "sql.compiled.Sample");
    }
}
