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

//! Row type for sqljit - an ordered collection of column values

use std::fmt;
use std::ops::{Deref, Index};

use super::error::{Error, Result};
use super::value::Value;

/// A materialized row flowing between executors
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    values: Vec<Value>,
}

impl Row {
    /// Create an empty row
    pub fn new() -> Self {
        Self { values: Vec::new() }
    }

    /// Create a row from values
    pub fn from_values(values: Vec<Value>) -> Self {
        Self { values }
    }

    /// Get a value by index
    #[inline]
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Get a value by index, failing with `ColumnOutOfBounds`
    #[inline]
    pub fn value(&self, index: usize) -> Result<&Value> {
        self.values.get(index).ok_or(Error::ColumnOutOfBounds {
            index,
            len: self.values.len(),
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// Append a value
    pub fn push(&mut self, value: Value) {
        self.values.push(value);
    }

    /// Concatenate two rows (left columns first)
    pub fn concat(&self, other: &Row) -> Row {
        let mut values = Vec::with_capacity(self.len() + other.len());
        values.extend_from_slice(&self.values);
        values.extend_from_slice(&other.values);
        Row { values }
    }
}

impl Deref for Row {
    type Target = [Value];

    fn deref(&self) -> &[Value] {
        &self.values
    }
}

impl Index<usize> for Row {
    type Output = Value;

    fn index(&self, index: usize) -> &Value {
        &self.values[index]
    }
}

impl From<Vec<Value>> for Row {
    fn from(values: Vec<Value>) -> Self {
        Row::from_values(values)
    }
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, v) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", v)?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_access() {
        let row = Row::from_values(vec![Value::Int(1), Value::Null]);
        assert_eq!(row.len(), 2);
        assert_eq!(row.get(0), Some(&Value::Int(1)));
        assert_eq!(row[1], Value::Null);
        assert_eq!(
            row.value(5),
            Err(Error::ColumnOutOfBounds { index: 5, len: 2 })
        );
        assert_eq!(row.to_string(), "[1, NULL]");
    }

    #[test]
    fn test_row_concat() {
        let left = Row::from_values(vec![Value::Int(1)]);
        let right = Row::from_values(vec![Value::varchar("x"), Value::Boolean(true)]);
        let joined = left.concat(&right);
        assert_eq!(
            joined.into_values(),
            vec![Value::Int(1), Value::varchar("x"), Value::Boolean(true)]
        );
    }
}
