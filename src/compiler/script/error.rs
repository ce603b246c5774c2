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

//! Fragment compiler diagnostics

use std::fmt;

use super::token::Position;
use crate::core::Error;

/// A syntax or semantic error in a source unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptError {
    pub message: String,
    pub position: Position,
}

impl ScriptError {
    pub fn new(message: impl Into<String>, position: Position) -> Self {
        Self {
            message: message.into(),
            position,
        }
    }

    /// Render the error with the offending line and a caret pointer
    pub fn format_error(&self, source: &str) -> String {
        let line = match self.position.line {
            0 => None,
            n => source.lines().nth(n - 1),
        };
        match line {
            Some(line) => {
                let pointer = " ".repeat(self.position.column.saturating_sub(1)) + "^";
                format!("{}\n{}\n{}", self, line, pointer)
            }
            None => self.to_string(),
        }
    }

    /// Convert into the crate error, attaching the full source
    pub fn into_error(self, unit: &str, source: &str) -> Error {
        Error::Compilation {
            unit: unit.to_string(),
            message: self.message,
            line: self.position.line,
            column: self.position.column,
            source_text: source.to_string(),
        }
    }
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.message, self.position)
    }
}

impl std::error::Error for ScriptError {}

pub type ScriptResult<T> = std::result::Result<T, ScriptError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_error_points_at_column() {
        let err = ScriptError::new("expected ';'", Position::new(2, 5));
        let rendered = err.format_error("module a;\nlet x\n");
        assert_eq!(rendered, "expected ';' at line 2, column 5\nlet x\n    ^");
    }

    #[test]
    fn test_into_error_keeps_source() {
        let err = ScriptError::new("bad", Position::new(1, 1)).into_error("sql.compiled.X", "src");
        assert_eq!(err.compilation_source(), Some("src"));
        assert!(err.is_fallback());
    }
}
