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

//! Core type definitions for sqljit
//!
//! This module defines the SQL data types carried by plan nodes and values,
//! and the comparison modes shared by the interpreted evaluator and the
//! compiled fragment code.

use std::fmt;
use std::str::FromStr;

use super::error::{Error, Result};
use super::value::Value;

/// SQL data types known to the fragment compiler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum DataType {
    /// Type of the NULL literal
    #[default]
    Null = 0,

    /// Boolean true/false
    Boolean = 1,

    /// 32-bit signed integer
    Int = 2,

    /// 64-bit signed integer
    BigInt = 3,

    /// 64-bit floating point number
    Double = 4,

    /// UTF-8 text string
    Varchar = 5,

    /// Domain object with named fields
    Object = 6,
}

impl DataType {
    /// Returns true if this type is numeric (INT, BIGINT or DOUBLE)
    pub fn is_numeric(&self) -> bool {
        matches!(self, DataType::Int | DataType::BigInt | DataType::Double)
    }

    /// Numeric widening rank, higher wins
    fn numeric_rank(&self) -> Option<u8> {
        match self {
            DataType::Int => Some(0),
            DataType::BigInt => Some(1),
            DataType::Double => Some(2),
            _ => None,
        }
    }

    /// Type both operands of a comparison are converted to before comparing.
    ///
    /// Identical types compare as themselves, NULL adopts the other side and
    /// numeric types widen INT < BIGINT < DOUBLE. Any other pair has no common
    /// type.
    pub fn comparison_type(left: DataType, right: DataType) -> Option<DataType> {
        if left == right {
            return Some(left);
        }
        match (left, right) {
            (DataType::Null, other) | (other, DataType::Null) => Some(other),
            (l, r) => match (l.numeric_rank(), r.numeric_rank()) {
                (Some(lr), Some(rr)) => Some(if lr >= rr { l } else { r }),
                _ => None,
            },
        }
    }

    /// Convert a value to this type.
    ///
    /// NULL converts to NULL for every type. Numeric narrowing is range
    /// checked and doubles truncate toward zero.
    pub fn convert(&self, value: &Value) -> Result<Value> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        let converted = match (self, value) {
            (DataType::Boolean, Value::Boolean(_))
            | (DataType::Int, Value::Int(_))
            | (DataType::BigInt, Value::BigInt(_))
            | (DataType::Double, Value::Double(_))
            | (DataType::Varchar, Value::Varchar(_))
            | (DataType::Object, Value::Object(_)) => value.clone(),

            (DataType::Int, Value::BigInt(v)) => Value::Int(
                i32::try_from(*v).map_err(|_| Error::overflow(format!("{} out of INT range", v)))?,
            ),
            (DataType::Int, Value::Double(v)) => {
                let t = v.trunc();
                if !t.is_finite() || t < i32::MIN as f64 || t > i32::MAX as f64 {
                    return Err(Error::overflow(format!("{} out of INT range", v)));
                }
                Value::Int(t as i32)
            }
            (DataType::BigInt, Value::Int(v)) => Value::BigInt(i64::from(*v)),
            (DataType::BigInt, Value::Double(v)) => {
                let t = v.trunc();
                if !t.is_finite() || t < -9.223_372_036_854_776e18 || t >= 9.223_372_036_854_776e18
                {
                    return Err(Error::overflow(format!("{} out of BIGINT range", v)));
                }
                Value::BigInt(t as i64)
            }
            (DataType::Double, Value::Int(v)) => Value::Double(f64::from(*v)),
            (DataType::Double, Value::BigInt(v)) => Value::Double(*v as f64),
            (DataType::Varchar, Value::Boolean(_) | Value::Int(_) | Value::BigInt(_) | Value::Double(_)) => {
                Value::varchar(value.to_string())
            }
            _ => {
                return Err(Error::type_mismatch(
                    self.to_string(),
                    value.data_type().to_string(),
                ))
            }
        };
        Ok(converted)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Null => write!(f, "NULL"),
            DataType::Boolean => write!(f, "BOOLEAN"),
            DataType::Int => write!(f, "INT"),
            DataType::BigInt => write!(f, "BIGINT"),
            DataType::Double => write!(f, "DOUBLE"),
            DataType::Varchar => write!(f, "VARCHAR"),
            DataType::Object => write!(f, "OBJECT"),
        }
    }
}

impl FromStr for DataType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "NULL" => Ok(DataType::Null),
            "BOOLEAN" | "BOOL" => Ok(DataType::Boolean),
            "INT" | "INTEGER" => Ok(DataType::Int),
            "BIGINT" => Ok(DataType::BigInt),
            "DOUBLE" | "FLOAT" => Ok(DataType::Double),
            "VARCHAR" | "TEXT" => Ok(DataType::Varchar),
            "OBJECT" => Ok(DataType::Object),
            other => Err(Error::type_mismatch("data type name", other)),
        }
    }
}

/// Comparison modes for comparison expressions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ComparisonMode {
    Equals = 0,
    NotEquals = 1,
    LessThan = 2,
    LessThanOrEqual = 3,
    GreaterThan = 4,
    GreaterThanOrEqual = 5,
}

impl ComparisonMode {
    /// Apply the comparison to two operands of the same Rust type.
    ///
    /// Uses `PartialOrd` directly so doubles follow IEEE semantics (NaN is
    /// unequal to everything).
    #[inline]
    pub fn test<T: PartialOrd + ?Sized>(&self, left: &T, right: &T) -> bool {
        match self {
            ComparisonMode::Equals => left == right,
            ComparisonMode::NotEquals => left != right,
            ComparisonMode::LessThan => left < right,
            ComparisonMode::LessThanOrEqual => left <= right,
            ComparisonMode::GreaterThan => left > right,
            ComparisonMode::GreaterThanOrEqual => left >= right,
        }
    }

    /// Returns true for `=` and `!=`
    pub fn is_equality(&self) -> bool {
        matches!(self, ComparisonMode::Equals | ComparisonMode::NotEquals)
    }

    /// Operator symbol
    pub fn symbol(&self) -> &'static str {
        match self {
            ComparisonMode::Equals => "==",
            ComparisonMode::NotEquals => "!=",
            ComparisonMode::LessThan => "<",
            ComparisonMode::LessThanOrEqual => "<=",
            ComparisonMode::GreaterThan => ">",
            ComparisonMode::GreaterThanOrEqual => ">=",
        }
    }
}

impl fmt::Display for ComparisonMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}
