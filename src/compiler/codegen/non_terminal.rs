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

//! Adapter at the top of a fragment: materializes the output row and adds it
//! to the batch, returning as soon as the batch is full.

use crate::compiler::emitter::{invoke, invoke_static, static_member, EmitableRoutine};
use crate::compiler::symbols;
use crate::compiler::variable::{LocalType, LocalVariable};
use crate::core::Result;

#[derive(Debug, Clone)]
pub struct NonTerminalGenerator {
    node_id: i32,
}

impl NonTerminalGenerator {
    /// Wrap the root of a fragment
    pub fn new(node_id: i32) -> Self {
        Self { node_id }
    }

    pub fn node_id(&self) -> i32 {
        self.node_id
    }

    pub fn row_start(&self, routine: &mut EmitableRoutine, upstream: &[LocalVariable]) -> Result<()> {
        let names: Vec<&str> = upstream.iter().map(LocalVariable::name).collect();
        let row = LocalVariable::new(format!("_{}_output_row", self.node_id), LocalType::Row);
        let init = invoke_static(routine, symbols::HEAP_ROW, symbols::HEAP_ROW_OF, &names);
        routine.declare_local(&row, &init)?;

        let fetched = static_member(routine, symbols::TYPE_ITERATION_RESULT, symbols::ITERATION_FETCHED);
        routine.line(format!(
            "if (!{}) {{",
            invoke("this", symbols::METHOD_ADD_TO_BATCH, &[row.name()])
        ));
        routine.indent();
        routine.line(format!("return {};", fetched));
        routine.dedent();
        routine.line("}");
        Ok(())
    }
}
