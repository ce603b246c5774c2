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

//! Static types of the fragment language

use std::fmt;
use std::sync::Arc;

use crate::compiler::symbols;
use crate::core::DataType;

/// Element type of a `List<T>`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListElement {
    QueryPath,
    DataType,
    Int,
    Expression,
}

impl ListElement {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            symbols::TYPE_QUERY_PATH => Some(ListElement::QueryPath),
            symbols::TYPE_DATA_TYPE => Some(ListElement::DataType),
            symbols::TYPE_INT => Some(ListElement::Int),
            symbols::TYPE_EXPRESSION => Some(ListElement::Expression),
            _ => None,
        }
    }

    /// Type of `get(i)`
    pub fn item_type(&self) -> ScriptType {
        match self {
            ListElement::QueryPath => ScriptType::QueryPath,
            ListElement::DataType => ScriptType::DataType,
            ListElement::Int => ScriptType::Int,
            ListElement::Expression => ScriptType::Expression,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            ListElement::QueryPath => symbols::TYPE_QUERY_PATH,
            ListElement::DataType => symbols::TYPE_DATA_TYPE,
            ListElement::Int => symbols::TYPE_INT,
            ListElement::Expression => symbols::TYPE_EXPRESSION,
        }
    }
}

/// Executor kinds a generic `Exec` can be cast to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecKind {
    MapScan,
    Filter,
    Project,
}

impl ExecKind {
    pub fn name(&self) -> &'static str {
        match self {
            ExecKind::MapScan => symbols::TYPE_MAP_SCAN_EXEC,
            ExecKind::Filter => symbols::TYPE_FILTER_EXEC,
            ExecKind::Project => symbols::TYPE_PROJECT_EXEC,
        }
    }
}

/// Static type of an expression, local, parameter or field
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ScriptType {
    Void,
    /// Type of the `null` literal
    Null,
    Boolean,
    Int,
    BigInt,
    Double,
    Varchar,
    /// Any SQL value
    Value,
    /// Domain object, optionally of a known class
    Object(Option<Arc<str>>),
    Row,
    IntArray,
    Exec,
    SpecificExec(ExecKind),
    MapContainer,
    PartitionIdSet,
    TopObjectDescriptor,
    QueryPath,
    DataType,
    Expression,
    MapScanIterator,
    FragmentContext,
    IterationResult,
    List(ListElement),
}

impl ScriptType {
    /// Resolve a type name as written in source. `argument` is the part
    /// between angle brackets.
    pub fn resolve(name: &str, argument: Option<&str>) -> Option<ScriptType> {
        let ty = match (name, argument) {
            (symbols::TYPE_OBJECT, class) => ScriptType::Object(class.map(Arc::from)),
            (symbols::TYPE_LIST, Some(element)) => {
                ScriptType::List(ListElement::from_name(element)?)
            }
            (_, Some(_)) => return None,
            (symbols::TYPE_BOOLEAN, None) => ScriptType::Boolean,
            (symbols::TYPE_INT, None) => ScriptType::Int,
            (symbols::TYPE_BIGINT, None) => ScriptType::BigInt,
            (symbols::TYPE_DOUBLE, None) => ScriptType::Double,
            (symbols::TYPE_VARCHAR, None) => ScriptType::Varchar,
            (symbols::TYPE_VALUE, None) => ScriptType::Value,
            (symbols::TYPE_ROW, None) => ScriptType::Row,
            (symbols::TYPE_INT_ARRAY, None) => ScriptType::IntArray,
            (symbols::TYPE_EXEC, None) => ScriptType::Exec,
            (symbols::TYPE_MAP_SCAN_EXEC, None) => ScriptType::SpecificExec(ExecKind::MapScan),
            (symbols::TYPE_FILTER_EXEC, None) => ScriptType::SpecificExec(ExecKind::Filter),
            (symbols::TYPE_PROJECT_EXEC, None) => ScriptType::SpecificExec(ExecKind::Project),
            (symbols::TYPE_MAP_CONTAINER, None) => ScriptType::MapContainer,
            (symbols::TYPE_PARTITION_ID_SET, None) => ScriptType::PartitionIdSet,
            (symbols::TYPE_TOP_OBJECT_DESCRIPTOR, None) => ScriptType::TopObjectDescriptor,
            (symbols::TYPE_QUERY_PATH, None) => ScriptType::QueryPath,
            (symbols::TYPE_DATA_TYPE, None) => ScriptType::DataType,
            (symbols::TYPE_EXPRESSION, None) => ScriptType::Expression,
            (symbols::TYPE_MAP_SCAN_ITERATOR, None) => ScriptType::MapScanIterator,
            (symbols::TYPE_FRAGMENT_CONTEXT, None) => ScriptType::FragmentContext,
            (symbols::TYPE_ITERATION_RESULT, None) => ScriptType::IterationResult,
            _ => return None,
        };
        Some(ty)
    }

    /// SQL scalar type, for types that hold one
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            ScriptType::Boolean => Some(DataType::Boolean),
            ScriptType::Int => Some(DataType::Int),
            ScriptType::BigInt => Some(DataType::BigInt),
            ScriptType::Double => Some(DataType::Double),
            ScriptType::Varchar => Some(DataType::Varchar),
            _ => None,
        }
    }

    /// Types whose runtime representation is a SQL value (and may be null)
    pub fn is_value_type(&self) -> bool {
        matches!(
            self,
            ScriptType::Null
                | ScriptType::Boolean
                | ScriptType::Int
                | ScriptType::BigInt
                | ScriptType::Double
                | ScriptType::Varchar
                | ScriptType::Value
                | ScriptType::Object(_)
        )
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, ScriptType::Int | ScriptType::BigInt | ScriptType::Double)
    }

    pub fn is_orderable(&self) -> bool {
        self.is_numeric() || matches!(self, ScriptType::Boolean | ScriptType::Varchar)
    }

    /// Can a value of type `self` be stored where `target` is expected
    pub fn is_assignable_to(&self, target: &ScriptType) -> bool {
        if self == target {
            return *target != ScriptType::Void;
        }
        match (self, target) {
            (ScriptType::Null, t) => *t != ScriptType::Void,
            (s, ScriptType::Value) => s.is_value_type(),
            (ScriptType::Object(Some(_)), ScriptType::Object(None)) => true,
            (ScriptType::SpecificExec(_), ScriptType::Exec) => true,
            _ => false,
        }
    }

    /// Can `==`/`!=` compare these two types
    pub fn is_equatable_with(&self, other: &ScriptType) -> bool {
        if *self == ScriptType::Null || *other == ScriptType::Null {
            return *self != ScriptType::Void && *other != ScriptType::Void;
        }
        if !self.is_value_type() || !other.is_value_type() {
            return *self == ScriptType::IterationResult && *other == ScriptType::IterationResult;
        }
        self == other
            || *self == ScriptType::Value
            || *other == ScriptType::Value
            || matches!((self, other), (ScriptType::Object(_), ScriptType::Object(_)))
    }

    /// Is `operand as self` a legal cast from `from`
    pub fn is_castable_from(&self, from: &ScriptType) -> bool {
        if from == self || *from == ScriptType::Null {
            return self.is_value_type() || matches!(self, ScriptType::SpecificExec(_));
        }
        match (from, self) {
            (ScriptType::Value, t) => t.data_type().is_some() || matches!(t, ScriptType::Object(_)),
            (f, t) if f.data_type().is_some() => {
                t.data_type().is_some() || *t == ScriptType::Value
            }
            (ScriptType::Object(_), ScriptType::Object(_) | ScriptType::Value) => true,
            (ScriptType::Exec, ScriptType::SpecificExec(_)) => true,
            _ => false,
        }
    }

    /// Common type of the two branches of a ternary
    pub fn unify(&self, other: &ScriptType) -> Option<ScriptType> {
        if self == other {
            return Some(self.clone());
        }
        match (self, other) {
            (ScriptType::Null, t) | (t, ScriptType::Null) => Some(t.clone()),
            (ScriptType::Object(_), ScriptType::Object(_)) => Some(ScriptType::Object(None)),
            (a, b) if a.is_value_type() && b.is_value_type() => Some(ScriptType::Value),
            _ => None,
        }
    }
}

impl fmt::Display for ScriptType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptType::Void => write!(f, "Void"),
            ScriptType::Null => write!(f, "null"),
            ScriptType::Boolean => write!(f, "{}", symbols::TYPE_BOOLEAN),
            ScriptType::Int => write!(f, "{}", symbols::TYPE_INT),
            ScriptType::BigInt => write!(f, "{}", symbols::TYPE_BIGINT),
            ScriptType::Double => write!(f, "{}", symbols::TYPE_DOUBLE),
            ScriptType::Varchar => write!(f, "{}", symbols::TYPE_VARCHAR),
            ScriptType::Value => write!(f, "{}", symbols::TYPE_VALUE),
            ScriptType::Object(None) => write!(f, "{}", symbols::TYPE_OBJECT),
            ScriptType::Object(Some(class)) => write!(f, "{}<{}>", symbols::TYPE_OBJECT, class),
            ScriptType::Row => write!(f, "{}", symbols::TYPE_ROW),
            ScriptType::IntArray => write!(f, "{}", symbols::TYPE_INT_ARRAY),
            ScriptType::Exec => write!(f, "{}", symbols::TYPE_EXEC),
            ScriptType::SpecificExec(kind) => write!(f, "{}", kind.name()),
            ScriptType::MapContainer => write!(f, "{}", symbols::TYPE_MAP_CONTAINER),
            ScriptType::PartitionIdSet => write!(f, "{}", symbols::TYPE_PARTITION_ID_SET),
            ScriptType::TopObjectDescriptor => {
                write!(f, "{}", symbols::TYPE_TOP_OBJECT_DESCRIPTOR)
            }
            ScriptType::QueryPath => write!(f, "{}", symbols::TYPE_QUERY_PATH),
            ScriptType::DataType => write!(f, "{}", symbols::TYPE_DATA_TYPE),
            ScriptType::Expression => write!(f, "{}", symbols::TYPE_EXPRESSION),
            ScriptType::MapScanIterator => write!(f, "{}", symbols::TYPE_MAP_SCAN_ITERATOR),
            ScriptType::FragmentContext => write!(f, "{}", symbols::TYPE_FRAGMENT_CONTEXT),
            ScriptType::IterationResult => write!(f, "{}", symbols::TYPE_ITERATION_RESULT),
            ScriptType::List(element) => write!(f, "{}<{}>", symbols::TYPE_LIST, element.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve() {
        assert_eq!(ScriptType::resolve("Int", None), Some(ScriptType::Int));
        assert_eq!(
            ScriptType::resolve("List", Some("QueryPath")),
            Some(ScriptType::List(ListElement::QueryPath))
        );
        assert_eq!(
            ScriptType::resolve("Object", Some("Person")).unwrap().to_string(),
            "Object<Person>"
        );
        assert_eq!(ScriptType::resolve("List", None), None);
        assert_eq!(ScriptType::resolve("Int", Some("X")), None);
        assert_eq!(ScriptType::resolve("Person", None), None);
    }

    #[test]
    fn test_assignability() {
        assert!(ScriptType::Null.is_assignable_to(&ScriptType::Int));
        assert!(ScriptType::Int.is_assignable_to(&ScriptType::Value));
        assert!(!ScriptType::Int.is_assignable_to(&ScriptType::BigInt));
        assert!(!ScriptType::Value.is_assignable_to(&ScriptType::Int));
        let person = ScriptType::Object(Some(Arc::from("Person")));
        assert!(person.is_assignable_to(&ScriptType::Object(None)));
        assert!(!ScriptType::Object(None).is_assignable_to(&person));
    }

    #[test]
    fn test_casts_and_equality() {
        assert!(ScriptType::Int.is_castable_from(&ScriptType::Value));
        assert!(ScriptType::BigInt.is_castable_from(&ScriptType::Int));
        assert!(ScriptType::SpecificExec(ExecKind::Filter).is_castable_from(&ScriptType::Exec));
        assert!(!ScriptType::Row.is_castable_from(&ScriptType::Value));
        assert!(!ScriptType::Int.is_castable_from(&ScriptType::Object(None)));

        assert!(ScriptType::Boolean.is_equatable_with(&ScriptType::Null));
        assert!(ScriptType::Value.is_equatable_with(&ScriptType::Int));
        assert!(!ScriptType::Int.is_equatable_with(&ScriptType::Varchar));
        assert_eq!(
            ScriptType::Null.unify(&ScriptType::BigInt),
            Some(ScriptType::BigInt)
        );
    }
}
