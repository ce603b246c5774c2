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

//! Field paths and top-level object descriptors for map scans

use std::fmt;
use std::str::FromStr;

use crate::core::{DataType, Error, Result, Value};

/// Name of the key attribute in field paths
pub const KEY_ATTRIBUTE: &str = "__key";

/// Name of the value attribute in field paths
pub const VALUE_ATTRIBUTE: &str = "this";

/// Path to a field of a map entry
///
/// A path either addresses the whole key or value (a *top-level* access) or a
/// named field below it (a *nested* access):
///
/// - `__key`      whole key
/// - `this`       whole value
/// - `__key.id`   field `id` of the key
/// - `name`       field `name` of the value
/// - `a.b`        field `b` of field `a` of the value
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryPath {
    key: bool,
    path: Option<String>,
}

impl QueryPath {
    /// Whole key
    pub fn key() -> Self {
        Self {
            key: true,
            path: None,
        }
    }

    /// Whole value
    pub fn value() -> Self {
        Self {
            key: false,
            path: None,
        }
    }

    /// Field of the key
    pub fn key_field(path: impl Into<String>) -> Self {
        Self {
            key: true,
            path: Some(path.into()),
        }
    }

    /// Field of the value
    pub fn value_field(path: impl Into<String>) -> Self {
        Self {
            key: false,
            path: Some(path.into()),
        }
    }

    pub fn is_key(&self) -> bool {
        self.key
    }

    /// True if the path addresses the whole key or value
    pub fn is_top(&self) -> bool {
        self.path.is_none()
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Number of segments below the top-level object
    pub fn depth(&self) -> usize {
        self.path.as_ref().map_or(0, |p| p.split('.').count())
    }

    /// Extract the addressed value from a map entry.
    ///
    /// The top-level object is validated against its descriptor first. A path
    /// below a NULL object yields NULL.
    pub fn extract(
        &self,
        key: &Value,
        value: &Value,
        key_descriptor: &TopObjectDescriptor,
        value_descriptor: &TopObjectDescriptor,
    ) -> Result<Value> {
        let (target, descriptor) = if self.key {
            (key, key_descriptor)
        } else {
            (value, value_descriptor)
        };
        descriptor.validate(target)?;

        let Some(path) = &self.path else {
            return Ok(target.clone());
        };
        let mut current = target.clone();
        for segment in path.split('.') {
            current = match &current {
                Value::Null => return Ok(Value::Null),
                Value::Object(object) => object.require_field(segment)?.clone(),
                other => {
                    return Err(Error::type_mismatch(
                        "OBJECT",
                        other.data_type().to_string(),
                    ))
                }
            };
        }
        Ok(current)
    }
}

impl FromStr for QueryPath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.is_empty() || s.split('.').any(str::is_empty) {
            return Err(Error::plan_invariant(format!("invalid field path '{}'", s)));
        }
        if s == KEY_ATTRIBUTE {
            return Ok(QueryPath::key());
        }
        if s == VALUE_ATTRIBUTE {
            return Ok(QueryPath::value());
        }
        if let Some(rest) = s.strip_prefix("__key.") {
            return Ok(QueryPath::key_field(rest));
        }
        if let Some(rest) = s.strip_prefix("this.") {
            return Ok(QueryPath::value_field(rest));
        }
        Ok(QueryPath::value_field(s))
    }
}

impl fmt::Display for QueryPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.path, self.key) {
            (None, true) => write!(f, "{}", KEY_ATTRIBUTE),
            (None, false) => write!(f, "{}", VALUE_ATTRIBUTE),
            (Some(p), true) => write!(f, "{}.{}", KEY_ATTRIBUTE, p),
            (Some(p), false) => write!(f, "{}", p),
        }
    }
}

/// Describes the shape of a map key or value
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TopObjectDescriptor {
    /// Domain object of the named class
    Class(String),
    /// Plain scalar of the given type
    Scalar(DataType),
}

impl TopObjectDescriptor {
    pub fn class(name: impl Into<String>) -> Self {
        TopObjectDescriptor::Class(name.into())
    }

    pub fn class_name(&self) -> Option<&str> {
        match self {
            TopObjectDescriptor::Class(name) => Some(name),
            TopObjectDescriptor::Scalar(_) => None,
        }
    }

    /// Check that a top-level value matches this descriptor
    pub fn validate(&self, value: &Value) -> Result<()> {
        match self {
            TopObjectDescriptor::Class(name) => value.expect_class(name),
            TopObjectDescriptor::Scalar(_) => Ok(()),
        }
    }
}

impl fmt::Display for TopObjectDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TopObjectDescriptor::Class(name) => write!(f, "{}", name),
            TopObjectDescriptor::Scalar(t) => write!(f, "{}", t),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ObjectValue;

    #[test]
    fn test_parse_paths() {
        assert_eq!("__key".parse::<QueryPath>().unwrap(), QueryPath::key());
        assert_eq!("this".parse::<QueryPath>().unwrap(), QueryPath::value());
        assert_eq!(
            "__key.id".parse::<QueryPath>().unwrap(),
            QueryPath::key_field("id")
        );
        let nested: QueryPath = "address.city".parse().unwrap();
        assert!(!nested.is_key());
        assert_eq!(nested.depth(), 2);
        assert!("a..b".parse::<QueryPath>().is_err());
        assert_eq!(nested.to_string(), "address.city");
    }

    #[test]
    fn test_extract() {
        let key = Value::Int(7);
        let value = Value::object(ObjectValue::new("Person").with("age", 30));
        let key_desc = TopObjectDescriptor::Scalar(DataType::Int);
        let value_desc = TopObjectDescriptor::class("Person");

        assert_eq!(
            QueryPath::key()
                .extract(&key, &value, &key_desc, &value_desc)
                .unwrap(),
            Value::Int(7)
        );
        assert_eq!(
            QueryPath::value_field("age")
                .extract(&key, &value, &key_desc, &value_desc)
                .unwrap(),
            Value::Int(30)
        );
        assert_eq!(
            QueryPath::value_field("age")
                .extract(&key, &Value::Null, &key_desc, &value_desc)
                .unwrap(),
            Value::Null
        );
        assert!(matches!(
            QueryPath::value_field("age").extract(
                &key,
                &value,
                &key_desc,
                &TopObjectDescriptor::class("Order")
            ),
            Err(Error::UnexpectedObjectType { .. })
        ));
    }
}
