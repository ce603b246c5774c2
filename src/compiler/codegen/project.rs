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

//! Project generator: one local per output expression

use crate::compiler::emitter::{invoke, this_field, EmitableRoutine};
use crate::compiler::expression::compile_expression;
use crate::compiler::symbols;
use crate::compiler::variable::{LocalVariable, StateRegistry, StateVariable, StateVariableKind};
use crate::core::Result;
use crate::plan::ProjectNode;

#[derive(Debug, Clone)]
pub struct ProjectGenerator {
    node_id: i32,
    project: ProjectNode,
}

impl ProjectGenerator {
    pub fn new(node_id: i32, project: &ProjectNode) -> Self {
        Self {
            node_id,
            project: project.clone(),
        }
    }

    pub fn node_id(&self) -> i32 {
        self.node_id
    }

    pub fn declare(&self, state: &mut StateRegistry) -> Result<()> {
        state.register_node(self.node_id, symbols::TYPE_PROJECT_EXEC)?;
        state.declare(StateVariable::bound_from(
            self.node_id,
            StateVariableKind::ProjectExpressions,
            symbols::METHOD_PROJECTS,
        ))?;
        Ok(())
    }

    pub fn row_start(
        &self,
        routine: &mut EmitableRoutine,
        upstream: &[LocalVariable],
    ) -> Result<Vec<LocalVariable>> {
        let expressions = this_field(&StateVariableKind::ProjectExpressions.name_for(self.node_id));
        self.project
            .projects
            .iter()
            .enumerate()
            .map(|(i, expression)| {
                let index = i.to_string();
                let source = invoke(&expressions, symbols::METHOD_GET, &[&index]);
                compile_expression(
                    routine,
                    self.node_id,
                    &format!("project_{}", i),
                    expression,
                    upstream,
                    &source,
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::variable::LocalType;
    use crate::core::DataType;
    use crate::expression::Expression;

    #[test]
    fn test_project_locals() {
        let generator = ProjectGenerator::new(
            3,
            &ProjectNode {
                projects: vec![
                    Expression::column(1, DataType::BigInt),
                    Expression::plus(
                        Expression::column(0, DataType::Int),
                        Expression::constant(1),
                        DataType::Int,
                    ),
                    Expression::abs(Expression::column(0, DataType::Int)),
                ],
            },
        );
        let upstream = vec![
            LocalVariable::new("_1_value", LocalType::Scalar(DataType::Int)),
            LocalVariable::new("_1_key", LocalType::Scalar(DataType::BigInt)),
        ];
        let mut routine = EmitableRoutine::method("advance", None);
        let out = generator.row_start(&mut routine, &upstream).unwrap();
        let names: Vec<_> = out.iter().map(|l| l.name()).collect();
        assert_eq!(names, vec!["_1_key", "_3_project_1_1", "_3_project_2"]);
        assert_eq!(*out[2].ty(), LocalType::Value);
        assert!(routine.has_local("_3_project_2_row"));
    }
}
