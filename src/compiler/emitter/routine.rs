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

//! Emitable routines

use std::collections::BTreeSet;

use rustc_hash::FxHashMap;

use super::command::{Emitter, EmitterCommand};
use crate::compiler::symbols;
use crate::compiler::variable::LocalVariable;
use crate::core::{Error, Result};

/// Constructor or named method
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutineKind {
    Constructor,
    Method {
        name: String,
        return_type: Option<String>,
    },
}

/// A routine of a unit under construction
///
/// Holds the routine body as emitter commands, a registry of the locals
/// declared so far (so generators can find and reuse cached locals) and the
/// modules the body refers to.
#[derive(Debug, Clone)]
pub struct EmitableRoutine {
    kind: RoutineKind,
    params: Vec<(String, String)>,
    commands: Vec<EmitterCommand>,
    locals: FxHashMap<String, LocalVariable>,
    /// Local names in declaration order
    local_order: Vec<String>,
    imports: BTreeSet<&'static str>,
}

/// Point in a routine body that later emission can be rolled back to
#[derive(Debug, Clone)]
pub struct RoutineMark {
    commands: usize,
    locals: usize,
    imports: BTreeSet<&'static str>,
}

impl EmitableRoutine {
    pub fn constructor() -> Self {
        Self::with_kind(RoutineKind::Constructor)
    }

    pub fn method(name: impl Into<String>, return_type: Option<&str>) -> Self {
        let mut routine = Self::with_kind(RoutineKind::Method {
            name: name.into(),
            return_type: return_type.map(str::to_string),
        });
        if let Some(ty) = return_type {
            routine.use_type(ty);
        }
        routine
    }

    fn with_kind(kind: RoutineKind) -> Self {
        Self {
            kind,
            params: Vec::new(),
            commands: Vec::new(),
            locals: FxHashMap::default(),
            local_order: Vec::new(),
            imports: BTreeSet::new(),
        }
    }

    /// Add a parameter, builder style
    pub fn with_param(mut self, name: &str, type_name: &str) -> Self {
        self.use_type(type_name);
        self.params.push((name.to_string(), type_name.to_string()));
        self
    }

    pub fn kind(&self) -> &RoutineKind {
        &self.kind
    }

    pub fn name(&self) -> &str {
        match &self.kind {
            RoutineKind::Constructor => "new",
            RoutineKind::Method { name, .. } => name,
        }
    }

    // =========================================================================
    // Imports
    // =========================================================================

    pub fn add_import(&mut self, module: &'static str) {
        self.imports.insert(module);
    }

    /// Import whatever module provides a symbol
    pub fn use_symbol(&mut self, symbol: &str) {
        if let Some(module) = symbols::module_of(symbol) {
            self.imports.insert(module);
        }
    }

    /// Import every module a type name refers to
    pub fn use_type(&mut self, type_name: &str) {
        self.imports.extend(symbols::modules_of_type(type_name));
    }

    pub fn imports(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.imports.iter().copied()
    }

    // =========================================================================
    // Body
    // =========================================================================

    pub fn content(&mut self, text: impl Into<String>) -> &mut Self {
        self.commands.push(EmitterCommand::Content(text.into()));
        self
    }

    pub fn new_line(&mut self) -> &mut Self {
        self.commands.push(EmitterCommand::NewLine);
        self
    }

    pub fn indent(&mut self) -> &mut Self {
        self.commands.push(EmitterCommand::Indent);
        self
    }

    pub fn dedent(&mut self) -> &mut Self {
        self.commands.push(EmitterCommand::Dedent);
        self
    }

    /// Content followed by a line break
    pub fn line(&mut self, text: impl Into<String>) -> &mut Self {
        self.content(text).new_line()
    }

    /// Append already-built commands
    pub fn extend(&mut self, commands: impl IntoIterator<Item = EmitterCommand>) {
        self.commands.extend(commands);
    }

    pub fn commands(&self) -> &[EmitterCommand] {
        &self.commands
    }

    /// Remember the current end of the body
    pub fn mark(&self) -> RoutineMark {
        RoutineMark {
            commands: self.commands.len(),
            locals: self.local_order.len(),
            imports: self.imports.clone(),
        }
    }

    /// Drop every command, local and import added since `mark`
    pub fn rollback(&mut self, mark: RoutineMark) {
        self.commands.truncate(mark.commands);
        if mark.locals < self.local_order.len() {
            for name in self.local_order.drain(mark.locals..) {
                self.locals.remove(&name);
            }
        }
        self.imports = mark.imports;
    }

    // =========================================================================
    // Locals
    // =========================================================================

    /// Register a local; a second local with the same name is a generator bug
    pub fn add_local(&mut self, local: LocalVariable) -> Result<()> {
        if self.locals.contains_key(local.name()) {
            return Err(Error::internal(format!(
                "local {} already declared in {}",
                local.name(),
                self.name()
            )));
        }
        self.use_type(&local.type_name());
        self.local_order.push(local.name().to_string());
        self.locals.insert(local.name().to_string(), local);
        Ok(())
    }

    /// Emit `let <name>: <type> = <init>;` and register the local
    pub fn declare_local(&mut self, local: &LocalVariable, init: &str) -> Result<()> {
        self.add_local(local.clone())?;
        self.line(format!(
            "let {}: {} = {};",
            local.name(),
            local.type_name(),
            init
        ));
        Ok(())
    }

    pub fn local(&self, name: &str) -> Option<&LocalVariable> {
        self.locals.get(name)
    }

    pub fn has_local(&self, name: &str) -> bool {
        self.locals.contains_key(name)
    }

    // =========================================================================
    // Emission
    // =========================================================================

    pub fn emit(&self, emitter: &mut Emitter) {
        let params = self
            .params
            .iter()
            .map(|(name, ty)| format!("{}: {}", name, ty))
            .collect::<Vec<_>>()
            .join(", ");
        match &self.kind {
            RoutineKind::Constructor => emitter.content(&format!("new({}) {{", params)),
            RoutineKind::Method {
                name,
                return_type: Some(ret),
            } => emitter.content(&format!("fn {}({}) -> {} {{", name, params, ret)),
            RoutineKind::Method {
                name,
                return_type: None,
            } => emitter.content(&format!("fn {}({}) {{", name, params)),
        }
        emitter.new_line();
        emitter.indent();
        for command in &self.commands {
            emitter.apply(command);
        }
        emitter.dedent();
        emitter.line("}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::variable::LocalType;
    use crate::core::DataType;

    #[test]
    fn test_emit_method() {
        let mut routine = EmitableRoutine::method("advance", Some("IterationResult"));
        routine.line("this.clearBatch();");
        let mut emitter = Emitter::new();
        routine.emit(&mut emitter);
        assert_eq!(
            emitter.finish(),
            "fn advance() -> IterationResult {\n    this.clearBatch();\n}\n"
        );
        assert_eq!(routine.imports().collect::<Vec<_>>(), vec!["sql.exec"]);
    }

    #[test]
    fn test_local_collision() {
        let mut routine = EmitableRoutine::method("advance", None);
        let local = LocalVariable::new("_1_a", LocalType::Scalar(DataType::Int));
        routine.declare_local(&local, "1").unwrap();
        assert!(routine.has_local("_1_a"));
        assert!(routine.add_local(local).is_err());
    }

    #[test]
    fn test_rollback_to_mark() {
        let mut routine = EmitableRoutine::method("advance", None);
        let kept = LocalVariable::new("_1_a", LocalType::Scalar(DataType::Int));
        routine.declare_local(&kept, "1").unwrap();
        let mark = routine.mark();

        let dropped = LocalVariable::new("_1_row", LocalType::Row);
        routine.declare_local(&dropped, "HeapRow.of(_1_a)").unwrap();
        routine.line("continue;");
        assert!(routine.imports().any(|m| m == "sql.row"));

        routine.rollback(mark);
        assert_eq!(routine.commands().len(), 2);
        assert!(routine.has_local("_1_a"));
        assert!(!routine.has_local("_1_row"));
        assert!(!routine.imports().any(|m| m == "sql.row"));

        // The name is free again
        routine.declare_local(&dropped, "HeapRow.of(_1_a)").unwrap();
    }
}
