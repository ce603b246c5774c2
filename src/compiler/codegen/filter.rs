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

//! Filter generator: skips the rest of the row unless the condition is TRUE

use super::map_scan::emit_skip_unless;
use crate::compiler::emitter::{this_field, EmitableRoutine};
use crate::compiler::expression::compile_predicate;
use crate::compiler::symbols;
use crate::compiler::variable::{LocalVariable, StateRegistry, StateVariable, StateVariableKind};
use crate::core::Result;
use crate::plan::FilterNode;

#[derive(Debug, Clone)]
pub struct FilterGenerator {
    node_id: i32,
    filter: FilterNode,
}

impl FilterGenerator {
    pub fn new(node_id: i32, filter: &FilterNode) -> Self {
        Self {
            node_id,
            filter: filter.clone(),
        }
    }

    pub fn node_id(&self) -> i32 {
        self.node_id
    }

    pub fn declare(&self, state: &mut StateRegistry) -> Result<()> {
        state.register_node(self.node_id, symbols::TYPE_FILTER_EXEC)?;
        state.declare(StateVariable::bound_from(
            self.node_id,
            StateVariableKind::FilterCondition,
            symbols::METHOD_CONDITION,
        ))?;
        Ok(())
    }

    /// The output row is the input row
    pub fn row_start(
        &self,
        routine: &mut EmitableRoutine,
        upstream: &[LocalVariable],
    ) -> Result<Vec<LocalVariable>> {
        let source = this_field(&StateVariableKind::FilterCondition.name_for(self.node_id));
        let passed = compile_predicate(
            routine,
            self.node_id,
            "filter",
            &self.filter.condition,
            upstream,
            &source,
        )?;
        emit_skip_unless(routine, &passed);
        Ok(upstream.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::emitter::Emitter;
    use crate::compiler::variable::LocalType;
    use crate::core::DataType;
    use crate::expression::Expression;

    #[test]
    fn test_filter_passes_row_through() {
        let generator = FilterGenerator::new(
            2,
            &FilterNode {
                condition: Expression::divide(
                    Expression::column(0, DataType::Int),
                    Expression::constant(2),
                    DataType::Int,
                ),
            },
        );
        let mut state = StateRegistry::new();
        generator.declare(&mut state).unwrap();
        assert_eq!(state.nodes(), &[(2, "FilterExec")]);

        let upstream = vec![LocalVariable::new("_1_value", LocalType::Scalar(DataType::Int))];
        let mut routine = EmitableRoutine::method("advance", None);
        let out = generator.row_start(&mut routine, &upstream).unwrap();
        assert_eq!(out, upstream);

        let mut emitter = Emitter::new();
        for command in routine.commands() {
            emitter.apply(command);
        }
        assert_eq!(
            emitter.finish(),
            "\
let _2_filter_row: Row = HeapRow.of(_1_value);
let _2_filter: Value = this._2_filter_condition.eval(_2_filter_row);
let _2_filter_passed: Boolean = (_2_filter as Boolean);
if (_2_filter_passed == null || !_2_filter_passed) {
    continue;
}
"
        );
    }
}
