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

//! Core types and definitions for sqljit
//!
//! This module contains the fundamental types used throughout the crate:
//!
//! - [`DataType`] - SQL data types (INT, BIGINT, VARCHAR, etc.)
//! - [`ComparisonMode`] - Comparison operators (=, !=, >, <, etc.)
//! - [`Value`] - Runtime values with type information
//! - [`ObjectValue`] - Domain objects stored in maps
//! - [`Row`] - A materialized row (collection of values)
//! - [`Error`] - Error types for planning, compilation and execution

pub mod error;
pub mod row;
pub mod types;
pub mod value;

// Re-export main types for convenience
pub use error::{Error, Result};
pub use row::Row;
pub use types::{ComparisonMode, DataType};
pub use value::{ObjectValue, Value};

#[cfg(test)]
mod integration_tests {
    use super::*;

    /// Values converted to a column type can be compared after conversion
    #[test]
    fn test_convert_then_compare() {
        let common = DataType::comparison_type(DataType::Int, DataType::BigInt).unwrap();
        let left = common.convert(&Value::Int(5)).unwrap();
        let right = common.convert(&Value::BigInt(5)).unwrap();
        assert!(left.compare(ComparisonMode::Equals, &right).unwrap());
    }

    /// Objects nested in rows keep their fields
    #[test]
    fn test_object_row_integration() {
        let person = ObjectValue::new("Person").with("age", 41);
        let row = Row::from_values(vec![Value::object(person), Value::Int(1)]);
        let age = row[0].as_object().and_then(|o| o.field("age")).cloned();
        assert_eq!(age, Some(Value::Int(41)));
    }
}
