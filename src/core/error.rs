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

//! Error types for sqljit
//!
//! A single error enum covers plan validation, fragment compilation,
//! binding of compiled units and row-level evaluation. Row-level errors are
//! shared by the interpreted and the compiled execution paths so both report
//! identical failures for identical input.

use thiserror::Error;

/// Result type alias for sqljit operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for sqljit
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // =========================================================================
    // Plan errors
    // =========================================================================
    /// Structural invariant violated by a plan tree or by the partitioner
    #[error("plan invariant violated: {0}")]
    PlanInvariant(String),

    /// Map referenced by a scan node is not registered
    #[error("map '{0}' not found")]
    MapNotFound(String),

    // =========================================================================
    // Compilation errors
    // =========================================================================
    /// Construct that cannot be compiled inline
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// Generated source was rejected by the fragment compiler
    #[error("failed to compile {unit} at line {line}, column {column}: {message}")]
    Compilation {
        unit: String,
        message: String,
        line: usize,
        column: usize,
        source_text: String,
    },

    // =========================================================================
    // Binding errors
    // =========================================================================
    /// Compiled unit could not be bound to the executor graph
    #[error("binding failed: {0}")]
    Binding(String),

    // =========================================================================
    // Evaluation errors
    // =========================================================================
    /// Value has a type the operation cannot accept
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    /// Integer overflow or out-of-range conversion
    #[error("arithmetic overflow: {0}")]
    ArithmeticOverflow(String),

    /// Integer division or remainder by zero
    #[error("division by zero")]
    DivisionByZero,

    /// Top-level object does not match its descriptor
    #[error("unexpected object type: expected {expected}, got {actual}")]
    UnexpectedObjectType { expected: String, actual: String },

    /// Object has no field with the requested name
    #[error("field '{field}' not found in {class}")]
    FieldNotFound { class: String, field: String },

    /// Null passed where a non-null value is required
    #[error("null operand: {0}")]
    NullOperand(String),

    /// Row access past the last column
    #[error("column index {index} out of bounds for row of {len} columns")]
    ColumnOutOfBounds { index: usize, len: usize },

    // =========================================================================
    // Execution errors
    // =========================================================================
    /// Query execution was cancelled between two advance calls
    #[error("query cancelled")]
    Cancelled,

    /// Internal error that indicates a bug
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a plan invariant error
    pub fn plan_invariant(message: impl Into<String>) -> Self {
        Error::PlanInvariant(message.into())
    }

    /// Create an unsupported construct error
    pub fn unsupported(message: impl Into<String>) -> Self {
        Error::Unsupported(message.into())
    }

    /// Create a binding error
    pub fn binding(message: impl Into<String>) -> Self {
        Error::Binding(message.into())
    }

    /// Create a type mismatch error
    pub fn type_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Error::TypeMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create an arithmetic overflow error
    pub fn overflow(message: impl Into<String>) -> Self {
        Error::ArithmeticOverflow(message.into())
    }

    /// Create a null operand error
    pub fn null_operand(message: impl Into<String>) -> Self {
        Error::NullOperand(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Error::Internal(message.into())
    }

    /// Returns true if the error should make the engine fall back to the
    /// interpreted plan instead of failing the query
    pub fn is_fallback(&self) -> bool {
        matches!(
            self,
            Error::Compilation { .. } | Error::Binding(_) | Error::Unsupported(_)
        )
    }

    /// Generated source attached to a compilation failure
    pub fn compilation_source(&self) -> Option<&str> {
        match self {
            Error::Compilation { source_text, .. } => Some(source_text),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            Error::plan_invariant("stack size 2").to_string(),
            "plan invariant violated: stack size 2"
        );
        assert_eq!(Error::DivisionByZero.to_string(), "division by zero");
        assert_eq!(
            Error::ColumnOutOfBounds { index: 3, len: 2 }.to_string(),
            "column index 3 out of bounds for row of 2 columns"
        );
    }

    #[test]
    fn test_compilation_error_keeps_source() {
        let err = Error::Compilation {
            unit: "sql.compiled.X".to_string(),
            message: "unexpected token".to_string(),
            line: 3,
            column: 7,
            source_text: "unit X {".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "failed to compile sql.compiled.X at line 3, column 7: unexpected token"
        );
        assert_eq!(err.compilation_source(), Some("unit X {"));
        assert!(err.is_fallback());
    }

    #[test]
    fn test_error_classification() {
        assert!(Error::binding("unbound").is_fallback());
        assert!(!Error::plan_invariant("x").is_fallback());
        assert!(!Error::DivisionByZero.is_fallback());
    }
}
