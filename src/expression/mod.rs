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

//! Interpreted SQL expressions
//!
//! Expressions are evaluated against a materialized [`Row`]. They are the
//! reference semantics for the fragment compiler: inline-compiled code must
//! produce the same value, nullability and error for every row.
//!
//! NULL handling follows SQL:
//! - arithmetic and comparison return NULL when any operand is NULL
//! - AND/OR use three-valued logic (FALSE AND NULL = FALSE, TRUE OR NULL = TRUE)
//! - IS NULL never returns NULL

use std::fmt;

use crate::core::{ComparisonMode, DataType, Error, Result, Row, Value};

/// Binary arithmetic operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArithmeticOp {
    Plus,
    Minus,
    Multiply,
    Divide,
    Remainder,
}

impl ArithmeticOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            ArithmeticOp::Plus => "+",
            ArithmeticOp::Minus => "-",
            ArithmeticOp::Multiply => "*",
            ArithmeticOp::Divide => "/",
            ArithmeticOp::Remainder => "%",
        }
    }

    /// Apply the operator to two non-null operands of the same type
    pub fn apply(&self, left: &Value, right: &Value) -> Result<Value> {
        match self {
            ArithmeticOp::Plus => left.add(right),
            ArithmeticOp::Minus => left.sub(right),
            ArithmeticOp::Multiply => left.mul(right),
            ArithmeticOp::Divide => left.div(right),
            ArithmeticOp::Remainder => left.rem(right),
        }
    }
}

/// An interpreted expression tree
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Reference to a column of the input row
    Column { index: usize, data_type: DataType },

    /// Literal value
    Constant { value: Value, data_type: DataType },

    /// Binary arithmetic; operands are converted to `data_type` first
    Arithmetic {
        op: ArithmeticOp,
        left: Box<Expression>,
        right: Box<Expression>,
        data_type: DataType,
    },

    /// Comparison; operands are converted to their common comparison type
    Comparison {
        mode: ComparisonMode,
        left: Box<Expression>,
        right: Box<Expression>,
    },

    And(Box<Expression>, Box<Expression>),
    Or(Box<Expression>, Box<Expression>),
    Not(Box<Expression>),
    IsNull(Box<Expression>),

    /// Explicit conversion
    Cast {
        operand: Box<Expression>,
        data_type: DataType,
    },

    /// ABS(x)
    Abs(Box<Expression>),
}

impl Expression {
    // =========================================================================
    // Constructors
    // =========================================================================

    pub fn column(index: usize, data_type: DataType) -> Self {
        Expression::Column { index, data_type }
    }

    /// Literal; the type is taken from the value
    pub fn constant(value: impl Into<Value>) -> Self {
        let value = value.into();
        let data_type = value.data_type();
        Expression::Constant { value, data_type }
    }

    /// Typed NULL literal
    pub fn null(data_type: DataType) -> Self {
        Expression::Constant {
            value: Value::Null,
            data_type,
        }
    }

    pub fn arithmetic(
        op: ArithmeticOp,
        left: Expression,
        right: Expression,
        data_type: DataType,
    ) -> Self {
        Expression::Arithmetic {
            op,
            left: Box::new(left),
            right: Box::new(right),
            data_type,
        }
    }

    pub fn plus(left: Expression, right: Expression, data_type: DataType) -> Self {
        Self::arithmetic(ArithmeticOp::Plus, left, right, data_type)
    }

    pub fn minus(left: Expression, right: Expression, data_type: DataType) -> Self {
        Self::arithmetic(ArithmeticOp::Minus, left, right, data_type)
    }

    pub fn multiply(left: Expression, right: Expression, data_type: DataType) -> Self {
        Self::arithmetic(ArithmeticOp::Multiply, left, right, data_type)
    }

    pub fn divide(left: Expression, right: Expression, data_type: DataType) -> Self {
        Self::arithmetic(ArithmeticOp::Divide, left, right, data_type)
    }

    pub fn comparison(mode: ComparisonMode, left: Expression, right: Expression) -> Self {
        Expression::Comparison {
            mode,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn equals(left: Expression, right: Expression) -> Self {
        Self::comparison(ComparisonMode::Equals, left, right)
    }

    pub fn and(left: Expression, right: Expression) -> Self {
        Expression::And(Box::new(left), Box::new(right))
    }

    pub fn or(left: Expression, right: Expression) -> Self {
        Expression::Or(Box::new(left), Box::new(right))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(operand: Expression) -> Self {
        Expression::Not(Box::new(operand))
    }

    pub fn is_null(operand: Expression) -> Self {
        Expression::IsNull(Box::new(operand))
    }

    pub fn cast(operand: Expression, data_type: DataType) -> Self {
        Expression::Cast {
            operand: Box::new(operand),
            data_type,
        }
    }

    pub fn abs(operand: Expression) -> Self {
        Expression::Abs(Box::new(operand))
    }

    // =========================================================================
    // Typing
    // =========================================================================

    /// Static result type of the expression
    pub fn data_type(&self) -> DataType {
        match self {
            Expression::Column { data_type, .. }
            | Expression::Constant { data_type, .. }
            | Expression::Arithmetic { data_type, .. }
            | Expression::Cast { data_type, .. } => *data_type,
            Expression::Comparison { .. }
            | Expression::And(..)
            | Expression::Or(..)
            | Expression::Not(_)
            | Expression::IsNull(_) => DataType::Boolean,
            Expression::Abs(operand) => operand.data_type(),
        }
    }

    /// Short name of the expression kind, used in diagnostics
    pub fn kind_name(&self) -> &'static str {
        match self {
            Expression::Column { .. } => "Column",
            Expression::Constant { .. } => "Constant",
            Expression::Arithmetic { .. } => "Arithmetic",
            Expression::Comparison { .. } => "Comparison",
            Expression::And(..) => "And",
            Expression::Or(..) => "Or",
            Expression::Not(_) => "Not",
            Expression::IsNull(_) => "IsNull",
            Expression::Cast { .. } => "Cast",
            Expression::Abs(_) => "Abs",
        }
    }

    // =========================================================================
    // Evaluation
    // =========================================================================

    /// Evaluate the expression against a row
    pub fn eval(&self, row: &Row) -> Result<Value> {
        match self {
            Expression::Column { index, .. } => row.value(*index).cloned(),

            Expression::Constant { value, .. } => Ok(value.clone()),

            Expression::Arithmetic {
                op,
                left,
                right,
                data_type,
            } => {
                if !data_type.is_numeric() {
                    return Err(Error::type_mismatch("numeric", data_type.to_string()));
                }
                let l = left.eval(row)?;
                let r = right.eval(row)?;
                if l.is_null() || r.is_null() {
                    return Ok(Value::Null);
                }
                let l = data_type.convert(&l)?;
                let r = data_type.convert(&r)?;
                op.apply(&l, &r)
            }

            Expression::Comparison { mode, left, right } => {
                let common = DataType::comparison_type(left.data_type(), right.data_type())
                    .ok_or_else(|| {
                        Error::type_mismatch(
                            left.data_type().to_string(),
                            right.data_type().to_string(),
                        )
                    })?;
                let l = left.eval(row)?;
                let r = right.eval(row)?;
                if l.is_null() || r.is_null() {
                    return Ok(Value::Null);
                }
                let l = common.convert(&l)?;
                let r = common.convert(&r)?;
                l.compare(*mode, &r).map(Value::Boolean)
            }

            Expression::And(left, right) => {
                let l = eval_boolean(left, row)?;
                let r = eval_boolean(right, row)?;
                Ok(match (l, r) {
                    (Some(false), _) | (_, Some(false)) => Value::Boolean(false),
                    (Some(true), Some(true)) => Value::Boolean(true),
                    _ => Value::Null,
                })
            }

            Expression::Or(left, right) => {
                let l = eval_boolean(left, row)?;
                let r = eval_boolean(right, row)?;
                Ok(match (l, r) {
                    (Some(true), _) | (_, Some(true)) => Value::Boolean(true),
                    (Some(false), Some(false)) => Value::Boolean(false),
                    _ => Value::Null,
                })
            }

            Expression::Not(operand) => Ok(match eval_boolean(operand, row)? {
                Some(b) => Value::Boolean(!b),
                None => Value::Null,
            }),

            Expression::IsNull(operand) => Ok(Value::Boolean(operand.eval(row)?.is_null())),

            Expression::Cast { operand, data_type } => data_type.convert(&operand.eval(row)?),

            Expression::Abs(operand) => operand.eval(row)?.abs(),
        }
    }
}

/// Evaluate an operand that must produce a nullable boolean
fn eval_boolean(expr: &Expression, row: &Row) -> Result<Option<bool>> {
    match expr.eval(row)? {
        Value::Null => Ok(None),
        Value::Boolean(b) => Ok(Some(b)),
        other => Err(Error::type_mismatch(
            "BOOLEAN",
            other.data_type().to_string(),
        )),
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Column { index, .. } => write!(f, "${}", index),
            Expression::Constant { value, .. } => write!(f, "{}", value),
            Expression::Arithmetic {
                op, left, right, ..
            } => write!(f, "({} {} {})", left, op.symbol(), right),
            Expression::Comparison { mode, left, right } => {
                write!(f, "({} {} {})", left, mode, right)
            }
            Expression::And(l, r) => write!(f, "({} AND {})", l, r),
            Expression::Or(l, r) => write!(f, "({} OR {})", l, r),
            Expression::Not(e) => write!(f, "(NOT {})", e),
            Expression::IsNull(e) => write!(f, "({} IS NULL)", e),
            Expression::Cast { operand, data_type } => {
                write!(f, "CAST({} AS {})", operand, data_type)
            }
            Expression::Abs(e) => write!(f, "ABS({})", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(values: Vec<Value>) -> Row {
        Row::from_values(values)
    }

    fn c_plus_d_equals_d() -> Expression {
        Expression::equals(
            Expression::plus(
                Expression::column(0, DataType::Int),
                Expression::column(1, DataType::Int),
                DataType::Int,
            ),
            Expression::column(1, DataType::Int),
        )
    }

    #[test]
    fn test_filter_expression() {
        let expr = c_plus_d_equals_d();
        assert_eq!(
            expr.eval(&row(vec![Value::Int(0), Value::Int(5)])).unwrap(),
            Value::Boolean(true)
        );
        assert_eq!(
            expr.eval(&row(vec![Value::Int(1), Value::Int(5)])).unwrap(),
            Value::Boolean(false)
        );
        assert_eq!(
            expr.eval(&row(vec![Value::Null, Value::Int(5)])).unwrap(),
            Value::Null
        );
    }

    #[test]
    fn test_arithmetic_widening() {
        let expr = Expression::plus(
            Expression::column(0, DataType::Int),
            Expression::constant(1),
            DataType::BigInt,
        );
        assert_eq!(
            expr.eval(&row(vec![Value::Int(i32::MAX)])).unwrap(),
            Value::BigInt(2_147_483_648)
        );

        let narrow = Expression::plus(
            Expression::column(0, DataType::Int),
            Expression::constant(1),
            DataType::Int,
        );
        assert!(matches!(
            narrow.eval(&row(vec![Value::Int(i32::MAX)])),
            Err(Error::ArithmeticOverflow(_))
        ));
    }

    #[test]
    fn test_three_valued_logic() {
        let t = Expression::constant(true);
        let f = Expression::constant(false);
        let n = Expression::null(DataType::Boolean);
        let empty = row(vec![]);

        assert_eq!(
            Expression::and(f.clone(), n.clone()).eval(&empty).unwrap(),
            Value::Boolean(false)
        );
        assert_eq!(
            Expression::and(t.clone(), n.clone()).eval(&empty).unwrap(),
            Value::Null
        );
        assert_eq!(
            Expression::or(t.clone(), n.clone()).eval(&empty).unwrap(),
            Value::Boolean(true)
        );
        assert_eq!(
            Expression::or(f, n.clone()).eval(&empty).unwrap(),
            Value::Null
        );
        assert_eq!(Expression::not(n.clone()).eval(&empty).unwrap(), Value::Null);
        assert_eq!(
            Expression::is_null(n).eval(&empty).unwrap(),
            Value::Boolean(true)
        );
    }

    #[test]
    fn test_comparison_common_type() {
        let expr = Expression::comparison(
            ComparisonMode::LessThan,
            Expression::column(0, DataType::Int),
            Expression::column(1, DataType::Double),
        );
        assert_eq!(
            expr.eval(&row(vec![Value::Int(1), Value::Double(1.5)]))
                .unwrap(),
            Value::Boolean(true)
        );
    }

    #[test]
    fn test_divide_and_cast() {
        let div = Expression::divide(
            Expression::column(0, DataType::Int),
            Expression::constant(0),
            DataType::Int,
        );
        assert_eq!(
            div.eval(&row(vec![Value::Int(4)])),
            Err(Error::DivisionByZero)
        );
        let cast = Expression::cast(Expression::column(0, DataType::Int), DataType::Varchar);
        assert_eq!(
            cast.eval(&row(vec![Value::Int(4)])).unwrap(),
            Value::varchar("4")
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(c_plus_d_equals_d().to_string(), "(($0 + $1) == $1)");
    }
}
