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

//! Fragment compiler
//!
//! Generated fragment source is compiled in three steps:
//!
//! ```text
//! source ──lexer──► tokens ──parser──► syntax tree ──lower──► CompiledUnitType
//! ```
//!
//! Lowering checks types, imports and the compiled executor contract, then
//! emits bytecode for the [`Vm`]. Any rejection is reported as
//! [`Error::Compilation`] carrying the line, column and full source.

pub mod ast;
pub mod error;
pub mod lexer;
pub mod lower;
pub mod ops;
pub mod parser;
pub mod program;
pub mod slot;
pub mod token;
pub mod types;
pub mod vm;

pub use error::{ScriptError, ScriptResult};
pub use program::{CompiledUnitType, FieldInfo, Routine};
pub use slot::{Handle, Slot};
pub use vm::{InstanceState, Vm};

use crate::core::{Error, Result};

/// Compile one source unit. `qualified_name` must match the declared
/// module and unit name.
pub fn compile(source: &str, qualified_name: &str) -> Result<CompiledUnitType> {
    parser::parse(source)
        .and_then(|unit| lower::lower(&unit, qualified_name))
        .map_err(|e| e.into_error(qualified_name, source))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = "module sql.compiled;
import sql.exec;

unit CompiledExec_1 extends CompiledExec {
    new() { super(1, [1]); }
    fn prepare(exec: Exec) { }
    fn setup(ctx: FragmentContext) { }
    fn advance() -> IterationResult {
        return IterationResult.FETCHED_DONE;
    }
}
";

    #[test]
    fn test_compile() {
        let unit = compile(SOURCE, "sql.compiled.CompiledExec_1").unwrap();
        assert_eq!(unit.name(), "CompiledExec_1");
        assert_eq!(unit.qualified_name(), "sql.compiled.CompiledExec_1");
    }

    #[test]
    fn test_compile_error_carries_position_and_source() {
        let broken = SOURCE.replace("return IterationResult.FETCHED_DONE;", "return 1;");
        let err = compile(&broken, "sql.compiled.CompiledExec_1").unwrap_err();
        match &err {
            Error::Compilation {
                unit,
                line,
                column,
                source_text,
                ..
            } => {
                assert_eq!(unit, "sql.compiled.CompiledExec_1");
                assert_eq!(*line, 9);
                assert_eq!(*column, 16);
                assert_eq!(source_text, &broken);
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert!(err.is_fallback());
        assert_eq!(err.compilation_source(), Some(broken.as_str()));
    }
}
