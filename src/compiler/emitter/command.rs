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

//! Emitter commands and the text emitter

/// Indentation unit of generated source
pub const INDENT: &str = "    ";

/// One primitive emission step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmitterCommand {
    /// Raw source text on the current line
    Content(String),
    /// Line break
    NewLine,
    /// Increase indentation for following lines
    Indent,
    /// Decrease indentation for following lines
    Dedent,
}

/// Assembles emitter commands into source text
#[derive(Debug, Default)]
pub struct Emitter {
    out: String,
    indent: usize,
    line_start: bool,
}

impl Emitter {
    pub fn new() -> Self {
        Self {
            out: String::new(),
            indent: 0,
            line_start: true,
        }
    }

    pub fn apply(&mut self, command: &EmitterCommand) {
        match command {
            EmitterCommand::Content(text) => self.content(text),
            EmitterCommand::NewLine => self.new_line(),
            EmitterCommand::Indent => self.indent += 1,
            EmitterCommand::Dedent => self.indent = self.indent.saturating_sub(1),
        }
    }

    /// Write text, indenting first if at the start of a line
    pub fn content(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if self.line_start {
            for _ in 0..self.indent {
                self.out.push_str(INDENT);
            }
            self.line_start = false;
        }
        self.out.push_str(text);
    }

    pub fn new_line(&mut self) {
        self.out.push('\n');
        self.line_start = true;
    }

    pub fn indent(&mut self) {
        self.indent += 1;
    }

    pub fn dedent(&mut self) {
        self.indent = self.indent.saturating_sub(1);
    }

    /// Write a full line
    pub fn line(&mut self, text: &str) {
        self.content(text);
        self.new_line();
    }

    pub fn finish(self) -> String {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indentation() {
        let mut emitter = Emitter::new();
        for command in [
            EmitterCommand::Content("while (x) {".to_string()),
            EmitterCommand::NewLine,
            EmitterCommand::Indent,
            EmitterCommand::Content("continue;".to_string()),
            EmitterCommand::NewLine,
            EmitterCommand::Dedent,
            EmitterCommand::Content("}".to_string()),
            EmitterCommand::NewLine,
        ] {
            emitter.apply(&command);
        }
        assert_eq!(emitter.finish(), "while (x) {\n    continue;\n}\n");
    }

    #[test]
    fn test_blank_lines_are_not_indented() {
        let mut emitter = Emitter::new();
        emitter.indent();
        emitter.new_line();
        emitter.line("a;");
        assert_eq!(emitter.finish(), "\n    a;\n");
    }
}
