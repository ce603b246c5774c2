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

//! Value type for sqljit - runtime values with type information
//!
//! The checked arithmetic and comparison helpers defined here are the single
//! implementation of SQL operator semantics. The interpreted evaluator and the
//! fragment VM both call them, which keeps inline-compiled and interpreted
//! results identical.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use super::error::{Error, Result};
use super::types::{ComparisonMode, DataType};

/// A runtime value with type information
///
/// Text and objects use `Arc` for cheap cloning during row operations.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// NULL value
    #[default]
    Null,

    /// Boolean value
    Boolean(bool),

    /// 32-bit signed integer
    Int(i32),

    /// 64-bit signed integer
    BigInt(i64),

    /// 64-bit floating point
    Double(f64),

    /// UTF-8 text string (Arc for cheap cloning)
    Varchar(Arc<str>),

    /// Domain object
    Object(Arc<ObjectValue>),
}

impl Value {
    // =========================================================================
    // Constructors
    // =========================================================================

    /// Create a text value
    pub fn varchar(value: impl AsRef<str>) -> Self {
        Value::Varchar(Arc::from(value.as_ref()))
    }

    /// Create an object value
    pub fn object(value: ObjectValue) -> Self {
        Value::Object(Arc::new(value))
    }

    // =========================================================================
    // Type information
    // =========================================================================

    /// Runtime type of this value
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Null => DataType::Null,
            Value::Boolean(_) => DataType::Boolean,
            Value::Int(_) => DataType::Int,
            Value::BigInt(_) => DataType::BigInt,
            Value::Double(_) => DataType::Double,
            Value::Varchar(_) => DataType::Varchar,
            Value::Object(_) => DataType::Object,
        }
    }

    /// Returns true if this is NULL
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Boolean payload, if this is a boolean
    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Object payload, if this is an object
    pub fn as_object(&self) -> Option<&Arc<ObjectValue>> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Validate that this value is NULL or an object of the given class
    pub fn expect_class(&self, class_name: &str) -> Result<()> {
        match self {
            Value::Null => Ok(()),
            Value::Object(o) if o.class_name() == class_name => Ok(()),
            Value::Object(o) => Err(Error::UnexpectedObjectType {
                expected: class_name.to_string(),
                actual: o.class_name().to_string(),
            }),
            other => Err(Error::UnexpectedObjectType {
                expected: class_name.to_string(),
                actual: other.data_type().to_string(),
            }),
        }
    }

    // =========================================================================
    // Arithmetic (operands must share one type and be non-null)
    // =========================================================================

    /// Checked addition
    pub fn add(&self, other: &Value) -> Result<Value> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a
                .checked_add(*b)
                .map(Value::Int)
                .ok_or_else(|| overflow("INT", '+', a, b)),
            (Value::BigInt(a), Value::BigInt(b)) => a
                .checked_add(*b)
                .map(Value::BigInt)
                .ok_or_else(|| overflow("BIGINT", '+', a, b)),
            (Value::Double(a), Value::Double(b)) => Ok(Value::Double(a + b)),
            _ => Err(operand_error("+", self, other)),
        }
    }

    /// Checked subtraction
    pub fn sub(&self, other: &Value) -> Result<Value> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a
                .checked_sub(*b)
                .map(Value::Int)
                .ok_or_else(|| overflow("INT", '-', a, b)),
            (Value::BigInt(a), Value::BigInt(b)) => a
                .checked_sub(*b)
                .map(Value::BigInt)
                .ok_or_else(|| overflow("BIGINT", '-', a, b)),
            (Value::Double(a), Value::Double(b)) => Ok(Value::Double(a - b)),
            _ => Err(operand_error("-", self, other)),
        }
    }

    /// Checked multiplication
    pub fn mul(&self, other: &Value) -> Result<Value> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a
                .checked_mul(*b)
                .map(Value::Int)
                .ok_or_else(|| overflow("INT", '*', a, b)),
            (Value::BigInt(a), Value::BigInt(b)) => a
                .checked_mul(*b)
                .map(Value::BigInt)
                .ok_or_else(|| overflow("BIGINT", '*', a, b)),
            (Value::Double(a), Value::Double(b)) => Ok(Value::Double(a * b)),
            _ => Err(operand_error("*", self, other)),
        }
    }

    /// Checked division. Integer division by zero is an error, doubles follow IEEE.
    pub fn div(&self, other: &Value) -> Result<Value> {
        match (self, other) {
            (Value::Int(_), Value::Int(0)) | (Value::BigInt(_), Value::BigInt(0)) => {
                Err(Error::DivisionByZero)
            }
            (Value::Int(a), Value::Int(b)) => a
                .checked_div(*b)
                .map(Value::Int)
                .ok_or_else(|| overflow("INT", '/', a, b)),
            (Value::BigInt(a), Value::BigInt(b)) => a
                .checked_div(*b)
                .map(Value::BigInt)
                .ok_or_else(|| overflow("BIGINT", '/', a, b)),
            (Value::Double(a), Value::Double(b)) => Ok(Value::Double(a / b)),
            _ => Err(operand_error("/", self, other)),
        }
    }

    /// Checked remainder
    pub fn rem(&self, other: &Value) -> Result<Value> {
        match (self, other) {
            (Value::Int(_), Value::Int(0)) | (Value::BigInt(_), Value::BigInt(0)) => {
                Err(Error::DivisionByZero)
            }
            (Value::Int(a), Value::Int(b)) => a
                .checked_rem(*b)
                .map(Value::Int)
                .ok_or_else(|| overflow("INT", '%', a, b)),
            (Value::BigInt(a), Value::BigInt(b)) => a
                .checked_rem(*b)
                .map(Value::BigInt)
                .ok_or_else(|| overflow("BIGINT", '%', a, b)),
            (Value::Double(a), Value::Double(b)) => Ok(Value::Double(a % b)),
            _ => Err(operand_error("%", self, other)),
        }
    }

    /// Checked negation
    pub fn neg(&self) -> Result<Value> {
        match self {
            Value::Int(a) => a
                .checked_neg()
                .map(Value::Int)
                .ok_or_else(|| Error::overflow(format!("-({}) overflows INT", a))),
            Value::BigInt(a) => a
                .checked_neg()
                .map(Value::BigInt)
                .ok_or_else(|| Error::overflow(format!("-({}) overflows BIGINT", a))),
            Value::Double(a) => Ok(Value::Double(-a)),
            Value::Null => Err(Error::null_operand("unary -")),
            other => Err(Error::type_mismatch("numeric", other.data_type().to_string())),
        }
    }

    /// Absolute value
    pub fn abs(&self) -> Result<Value> {
        match self {
            Value::Int(a) => a
                .checked_abs()
                .map(Value::Int)
                .ok_or_else(|| Error::overflow(format!("ABS({}) overflows INT", a))),
            Value::BigInt(a) => a
                .checked_abs()
                .map(Value::BigInt)
                .ok_or_else(|| Error::overflow(format!("ABS({}) overflows BIGINT", a))),
            Value::Double(a) => Ok(Value::Double(a.abs())),
            Value::Null => Ok(Value::Null),
            other => Err(Error::type_mismatch("numeric", other.data_type().to_string())),
        }
    }

    // =========================================================================
    // Comparison (operands must share one type and be non-null)
    // =========================================================================

    /// Compare two values of the same type
    pub fn compare(&self, mode: ComparisonMode, other: &Value) -> Result<bool> {
        match (self, other) {
            (Value::Boolean(a), Value::Boolean(b)) => Ok(mode.test(a, b)),
            (Value::Int(a), Value::Int(b)) => Ok(mode.test(a, b)),
            (Value::BigInt(a), Value::BigInt(b)) => Ok(mode.test(a, b)),
            (Value::Double(a), Value::Double(b)) => Ok(mode.test(a, b)),
            (Value::Varchar(a), Value::Varchar(b)) => Ok(mode.test(&**a, &**b)),
            (Value::Object(a), Value::Object(b)) if mode.is_equality() => {
                let equal = Arc::ptr_eq(a, b) || a == b;
                Ok(if mode == ComparisonMode::Equals {
                    equal
                } else {
                    !equal
                })
            }
            _ => Err(operand_error(mode.symbol(), self, other)),
        }
    }
}

fn overflow<T: fmt::Display>(type_name: &str, op: char, a: &T, b: &T) -> Error {
    Error::overflow(format!("{} {} {} overflows {}", a, op, b, type_name))
}

fn operand_error(op: &str, left: &Value, right: &Value) -> Error {
    if left.is_null() || right.is_null() {
        return Error::null_operand(format!("operator {}", op));
    }
    Error::type_mismatch(
        format!("{} {} {}", left.data_type(), op, left.data_type()),
        format!("{} {} {}", left.data_type(), op, right.data_type()),
    )
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Int(v) => write!(f, "{}", v),
            Value::BigInt(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::Varchar(s) => write!(f, "{}", s),
            Value::Object(o) => write!(f, "{}", o),
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Boolean(b) => b.hash(state),
            Value::Int(v) => v.hash(state),
            Value::BigInt(v) => v.hash(state),
            Value::Double(v) => v.to_bits().hash(state),
            Value::Varchar(s) => s.hash(state),
            Value::Object(o) => {
                o.class_name().hash(state);
                for (name, value) in o.fields() {
                    name.hash(state);
                    value.hash(state);
                }
            }
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::BigInt(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::varchar(v)
    }
}

impl From<ObjectValue> for Value {
    fn from(v: ObjectValue) -> Self {
        Value::object(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

/// A domain object stored as a map key or value
///
/// Fields are kept in declaration order. Lookup matches the exact name first
/// and then falls back to an ASCII case-insensitive match, so getter-derived
/// names (`getFieldC` -> `fieldC`) resolve against fields declared as `FieldC`.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectValue {
    class_name: Arc<str>,
    fields: Vec<(Arc<str>, Value)>,
}

impl ObjectValue {
    /// Create an object of the given class with no fields
    pub fn new(class_name: impl AsRef<str>) -> Self {
        Self {
            class_name: Arc::from(class_name.as_ref()),
            fields: Vec::new(),
        }
    }

    /// Add a field, builder style
    pub fn with(mut self, name: impl AsRef<str>, value: impl Into<Value>) -> Self {
        self.fields.push((Arc::from(name.as_ref()), value.into()));
        self
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(n, v)| (n.as_ref(), v))
    }

    /// Look up a field by name
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(n, _)| n.as_ref() == name)
            .or_else(|| {
                self.fields
                    .iter()
                    .find(|(n, _)| n.eq_ignore_ascii_case(name))
            })
            .map(|(_, v)| v)
    }

    /// Look up a field, failing with `FieldNotFound`
    pub fn require_field(&self, name: &str) -> Result<&Value> {
        self.field(name).ok_or_else(|| Error::FieldNotFound {
            class: self.class_name.to_string(),
            field: name.to_string(),
        })
    }

    /// Getter method name for a field: `fieldC` -> `getFieldC`
    pub fn getter_name(field: &str) -> String {
        let mut chars = field.chars();
        match chars.next() {
            Some(first) => format!("get{}{}", first.to_ascii_uppercase(), chars.as_str()),
            None => "get".to_string(),
        }
    }

    /// Field name addressed by a getter: `getFieldC` -> `fieldC`
    pub fn field_for_getter(getter: &str) -> Option<String> {
        let rest = getter.strip_prefix("get")?;
        let mut chars = rest.chars();
        let first = chars.next()?;
        Some(format!("{}{}", first.to_ascii_lowercase(), chars.as_str()))
    }
}

impl fmt::Display for ObjectValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{{", self.class_name)?;
        for (i, (name, value)) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}={}", name, value)?;
        }
        write!(f, "}}")
    }
}
