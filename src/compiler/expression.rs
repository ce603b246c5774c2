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

//! Inline compilation of plan expressions
//!
//! An expression is emitted as a sequence of typed locals in the advance
//! routine, one per sub-expression, following the evaluation order of
//! [`Expression::eval`]:
//!
//! - operands are evaluated left to right before any conversion
//! - arithmetic and comparison yield NULL when either operand is NULL
//! - AND/OR/NOT apply three-valued logic and check each operand is boolean
//!   as soon as it is computed
//!
//! When any part of the tree cannot be inlined the whole expression is
//! evaluated through its state handle instead:
//!
//! ```text
//! let _2_filter_row: Row = HeapRow.of(_1_a, _1_b);
//! let _2_filter: Value = this._2_filter_condition.eval(_2_filter_row);
//! ```

use super::emitter::{cast, invoke, invoke_static, string_literal, EmitableRoutine};
use super::symbols;
use super::variable::{scalar_type_name, LocalType, LocalVariable};
use crate::core::{ComparisonMode, DataType, Error, Result, Value};
use crate::expression::{ArithmeticOp, Expression};

/// Emit `expression` and return the local holding its result.
///
/// `inputs` are the locals of the input row in column order, `source` is
/// the source text of a handle to the interpreted expression and `suffix`
/// names the locals, e.g. `filter` or `project_0`.
pub fn compile_expression(
    routine: &mut EmitableRoutine,
    node_id: i32,
    suffix: &str,
    expression: &Expression,
    inputs: &[LocalVariable],
    source: &str,
) -> Result<LocalVariable> {
    let mark = routine.mark();
    let mut inliner = Inliner {
        routine: &mut *routine,
        prefix: format!("_{}_{}", node_id, suffix),
        inputs,
        counter: 0,
    };
    match inliner.inline(expression) {
        Ok(result) => Ok(result),
        Err(Error::Unsupported(reason)) => {
            tracing::debug!(node_id, suffix, %reason, "expression evaluated through its handle");
            routine.rollback(mark);
            compile_fallback(routine, node_id, suffix, inputs, source)
        }
        Err(e) => Err(e),
    }
}

/// Emit a filter condition and return a `Boolean` local that is NULL, false
/// or true exactly when the interpreted filter sees NULL, FALSE or TRUE.
pub fn compile_predicate(
    routine: &mut EmitableRoutine,
    node_id: i32,
    suffix: &str,
    expression: &Expression,
    inputs: &[LocalVariable],
    source: &str,
) -> Result<LocalVariable> {
    let result = compile_expression(routine, node_id, suffix, expression, inputs, source)?;
    if *result.ty() == LocalType::Scalar(DataType::Boolean) {
        return Ok(result);
    }
    let passed = LocalVariable::new(
        format!("_{}_{}_passed", node_id, suffix),
        LocalType::Scalar(DataType::Boolean),
    );
    let operand = match result.ty() {
        LocalType::Object(_) => cast(result.name(), symbols::TYPE_VALUE),
        _ => result.name().to_string(),
    };
    routine.declare_local(&passed, &cast(&operand, symbols::TYPE_BOOLEAN))?;
    Ok(passed)
}

fn compile_fallback(
    routine: &mut EmitableRoutine,
    node_id: i32,
    suffix: &str,
    inputs: &[LocalVariable],
    source: &str,
) -> Result<LocalVariable> {
    let names: Vec<&str> = inputs.iter().map(LocalVariable::name).collect();
    let row = LocalVariable::new(format!("_{}_{}_row", node_id, suffix), LocalType::Row);
    let row_init = invoke_static(routine, symbols::HEAP_ROW, symbols::HEAP_ROW_OF, &names);
    routine.declare_local(&row, &row_init)?;

    routine.use_symbol(symbols::TYPE_EXPRESSION);
    let result = LocalVariable::new(format!("_{}_{}", node_id, suffix), LocalType::Value);
    routine.declare_local(&result, &invoke(source, symbols::METHOD_EVAL, &[row.name()]))?;
    Ok(result)
}

struct Inliner<'a> {
    routine: &'a mut EmitableRoutine,
    prefix: String,
    inputs: &'a [LocalVariable],
    counter: usize,
}

impl Inliner<'_> {
    fn declare(&mut self, ty: LocalType, init: &str) -> Result<LocalVariable> {
        let local = LocalVariable::new(format!("{}_{}", self.prefix, self.counter), ty);
        self.counter += 1;
        self.routine.declare_local(&local, init)?;
        Ok(local)
    }

    fn inline(&mut self, expression: &Expression) -> Result<LocalVariable> {
        match expression {
            Expression::Column { index, .. } => self.inputs.get(*index).cloned().ok_or_else(|| {
                Error::unsupported(format!(
                    "column {} of a {}-column row",
                    index,
                    self.inputs.len()
                ))
            }),

            Expression::Constant { value, data_type } => {
                let (ty, literal) = constant_literal(value, *data_type)?;
                self.declare(ty, &literal)
            }

            Expression::Arithmetic {
                op,
                left,
                right,
                data_type,
            } => {
                let symbol = match op {
                    ArithmeticOp::Plus | ArithmeticOp::Minus | ArithmeticOp::Multiply => op.symbol(),
                    other => {
                        return Err(Error::unsupported(format!("operator {}", other.symbol())))
                    }
                };
                if !data_type.is_numeric() {
                    return Err(Error::unsupported(format!("arithmetic on {}", data_type)));
                }
                let l = self.inline(left)?;
                let r = self.inline(right)?;
                let init = format!(
                    "({} == null || {} == null) ? null : ({} {} {})",
                    l.name(),
                    r.name(),
                    convert_to(&l, *data_type)?,
                    symbol,
                    convert_to(&r, *data_type)?
                );
                self.declare(LocalType::Scalar(*data_type), &init)
            }

            Expression::Comparison { mode, left, right } => {
                let common = DataType::comparison_type(left.data_type(), right.data_type())
                    .filter(|t| {
                        matches!(
                            t,
                            DataType::Boolean
                                | DataType::Int
                                | DataType::BigInt
                                | DataType::Double
                                | DataType::Varchar
                        )
                    })
                    .ok_or_else(|| {
                        Error::unsupported(format!(
                            "comparison of {} and {}",
                            left.data_type(),
                            right.data_type()
                        ))
                    })?;
                let l = self.inline(left)?;
                let r = self.inline(right)?;
                let init = format!(
                    "({} == null || {} == null) ? null : ({} {} {})",
                    l.name(),
                    r.name(),
                    convert_to(&l, common)?,
                    comparison_symbol(*mode),
                    convert_to(&r, common)?
                );
                self.declare(LocalType::Scalar(DataType::Boolean), &init)
            }

            Expression::And(left, right) => {
                let l = self.inline_boolean(left)?;
                let r = self.inline_boolean(right)?;
                let (l, r) = (l.name(), r.name());
                let init = format!(
                    "({l} == false || {r} == false) ? false : (({l} == null || {r} == null) ? null : true)"
                );
                self.declare(LocalType::Scalar(DataType::Boolean), &init)
            }

            Expression::Or(left, right) => {
                let l = self.inline_boolean(left)?;
                let r = self.inline_boolean(right)?;
                let (l, r) = (l.name(), r.name());
                let init = format!(
                    "({l} == true || {r} == true) ? true : (({l} == null || {r} == null) ? null : false)"
                );
                self.declare(LocalType::Scalar(DataType::Boolean), &init)
            }

            Expression::Not(operand) => {
                let x = self.inline_boolean(operand)?;
                let init = format!("({0} == null) ? null : !{0}", x.name());
                self.declare(LocalType::Scalar(DataType::Boolean), &init)
            }

            Expression::IsNull(operand) => {
                let x = self.inline(operand)?;
                self.declare(
                    LocalType::Scalar(DataType::Boolean),
                    &format!("{} == null", x.name()),
                )
            }

            other => Err(Error::unsupported(format!(
                "{} expression",
                other.kind_name()
            ))),
        }
    }

    /// Inline an operand of a logical operator as a `Boolean` local
    fn inline_boolean(&mut self, expression: &Expression) -> Result<LocalVariable> {
        let local = self.inline(expression)?;
        match local.ty() {
            LocalType::Scalar(DataType::Boolean) => Ok(local),
            LocalType::Object(_) | LocalType::Scalar(DataType::Object) | LocalType::Row => Err(
                Error::unsupported(format!("logical operand of type {}", local.type_name())),
            ),
            _ => self.declare(
                LocalType::Scalar(DataType::Boolean),
                &cast(local.name(), symbols::TYPE_BOOLEAN),
            ),
        }
    }
}

/// Source of `local` converted to `target`, without a cast when the local
/// already has that type
fn convert_to(local: &LocalVariable, target: DataType) -> Result<String> {
    match local.ty() {
        LocalType::Scalar(t) if *t == target => Ok(local.name().to_string()),
        LocalType::Object(_) | LocalType::Scalar(DataType::Object) | LocalType::Row => {
            Err(Error::unsupported(format!(
                "conversion of {} to {}",
                local.type_name(),
                target
            )))
        }
        _ => Ok(cast(local.name(), scalar_type_name(target))),
    }
}

fn comparison_symbol(mode: ComparisonMode) -> &'static str {
    match mode {
        ComparisonMode::Equals => "==",
        ComparisonMode::NotEquals => "!=",
        ComparisonMode::LessThan => "<",
        ComparisonMode::LessThanOrEqual => "<=",
        ComparisonMode::GreaterThan => ">",
        ComparisonMode::GreaterThanOrEqual => ">=",
    }
}

/// Local type and source literal of a constant
fn constant_literal(value: &Value, data_type: DataType) -> Result<(LocalType, String)> {
    let literal = match value {
        Value::Null => {
            let ty = match data_type {
                DataType::Object => LocalType::Value,
                t => LocalType::Scalar(t),
            };
            return Ok((ty, "null".to_string()));
        }
        Value::Boolean(b) => b.to_string(),
        Value::Int(v) => v.to_string(),
        Value::BigInt(v) => format!("{}L", v),
        Value::Double(v) if v.is_finite() => format!("{:?}", v),
        Value::Double(v) => return Err(Error::unsupported(format!("double literal {}", v))),
        Value::Varchar(s) => string_literal(s),
        Value::Object(_) => return Err(Error::unsupported("object literal")),
    };
    Ok((LocalType::Scalar(value.data_type()), literal))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::emitter::EmitterCommand;

    fn lines(routine: &EmitableRoutine) -> Vec<String> {
        routine
            .commands()
            .iter()
            .filter_map(|c| match c {
                EmitterCommand::Content(text) => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    fn inputs() -> Vec<LocalVariable> {
        vec![
            LocalVariable::new("_1_c", LocalType::Scalar(DataType::Int)),
            LocalVariable::new("_1_d", LocalType::Scalar(DataType::Int)),
            LocalVariable::new("_1_v", LocalType::Value),
        ]
    }

    #[test]
    fn test_inline_plus_with_constant() {
        let expr = Expression::plus(
            Expression::column(0, DataType::Int),
            Expression::constant(1),
            DataType::Int,
        );
        let mut routine = EmitableRoutine::method("advance", None);
        let result =
            compile_expression(&mut routine, 2, "project_0", &expr, &inputs(), "src").unwrap();
        assert_eq!(result.name(), "_2_project_0_1");
        assert_eq!(
            lines(&routine),
            vec![
                "let _2_project_0_0: Int = 1;",
                "let _2_project_0_1: Int = (_1_c == null || _2_project_0_0 == null) ? null : (_1_c + _2_project_0_0);",
            ]
        );
    }

    #[test]
    fn test_value_operand_is_converted() {
        let expr = Expression::comparison(
            ComparisonMode::GreaterThan,
            Expression::column(2, DataType::BigInt),
            Expression::column(0, DataType::Int),
        );
        let mut routine = EmitableRoutine::method("advance", None);
        compile_expression(&mut routine, 3, "filter", &expr, &inputs(), "src").unwrap();
        assert_eq!(
            lines(&routine),
            vec!["let _3_filter_0: Boolean = (_1_v == null || _1_c == null) ? null : ((_1_v as BigInt) > (_1_c as BigInt));"]
        );
    }

    #[test]
    fn test_unsupported_falls_back_as_a_whole() {
        let expr = Expression::plus(
            Expression::constant(1),
            Expression::divide(
                Expression::column(0, DataType::Int),
                Expression::column(1, DataType::Int),
                DataType::Int,
            ),
            DataType::Int,
        );
        let mut routine = EmitableRoutine::method("advance", None);
        let result = compile_expression(
            &mut routine,
            4,
            "project_1",
            &expr,
            &inputs(),
            "this._4_project_expressions.get(1)",
        )
        .unwrap();
        assert_eq!(result.name(), "_4_project_1");
        assert_eq!(*result.ty(), LocalType::Value);
        assert_eq!(
            lines(&routine),
            vec![
                "let _4_project_1_row: Row = HeapRow.of(_1_c, _1_d, _1_v);",
                "let _4_project_1: Value = this._4_project_expressions.get(1).eval(_4_project_1_row);",
            ]
        );
        assert!(!routine.has_local("_4_project_1_0"));
    }

    #[test]
    fn test_predicate_coerces_value_result() {
        let expr = Expression::column(2, DataType::Boolean);
        let mut routine = EmitableRoutine::method("advance", None);
        let passed = compile_predicate(&mut routine, 5, "filter", &expr, &inputs(), "src").unwrap();
        assert_eq!(passed.name(), "_5_filter_passed");
        assert_eq!(
            lines(&routine),
            vec!["let _5_filter_passed: Boolean = (_1_v as Boolean);"]
        );
    }

    #[test]
    fn test_constant_literals() {
        assert_eq!(
            constant_literal(&Value::Double(1.0), DataType::Double).unwrap().1,
            "1.0"
        );
        assert_eq!(
            constant_literal(&Value::BigInt(-3), DataType::BigInt).unwrap().1,
            "-3L"
        );
        assert_eq!(
            constant_literal(&Value::Null, DataType::Int).unwrap(),
            (LocalType::Scalar(DataType::Int), "null".to_string())
        );
        assert!(constant_literal(&Value::Double(f64::NAN), DataType::Double).is_err());
    }
}
