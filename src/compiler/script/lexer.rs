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

//! Fragment language lexer
//!
//! Produces the whole token stream up front. `//` starts a comment that runs
//! to the end of the line.

use super::error::{ScriptError, ScriptResult};
use super::token::{is_keyword, is_punctuator, Position, Token, TokenType, OPERATORS};

pub struct Lexer {
    input: Vec<char>,
    /// Index of the current character
    position: usize,
    ch: char,
    pos: Position,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        let input: Vec<char> = input.chars().collect();
        let ch = input.first().copied().unwrap_or('\0');
        Self {
            input,
            position: 0,
            ch,
            pos: Position::new(1, 1),
        }
    }

    fn read_char(&mut self) {
        if self.ch == '\n' {
            self.pos.line += 1;
            self.pos.column = 1;
        } else if self.ch != '\0' {
            self.pos.column += 1;
        }
        self.position += 1;
        self.ch = self.input.get(self.position).copied().unwrap_or('\0');
    }

    fn peek_char(&self) -> char {
        self.input.get(self.position + 1).copied().unwrap_or('\0')
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            while self.ch.is_whitespace() {
                self.read_char();
            }
            if self.ch == '/' && self.peek_char() == '/' {
                while self.ch != '\n' && self.ch != '\0' {
                    self.read_char();
                }
                continue;
            }
            return;
        }
    }

    /// Tokenize the whole input
    pub fn tokenize(mut self) -> ScriptResult<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let eof = token.is_eof();
            tokens.push(token);
            if eof {
                return Ok(tokens);
            }
        }
    }

    pub fn next_token(&mut self) -> ScriptResult<Token> {
        self.skip_whitespace_and_comments();
        let pos = self.pos;

        match self.ch {
            '\0' => Ok(Token::eof(pos)),

            '"' => {
                let literal = self.read_string(pos)?;
                Ok(Token::new(TokenType::String, literal, pos))
            }

            c if c.is_ascii_digit() => self.read_number(pos),

            c if c.is_alphabetic() || c == '_' => {
                let word = self.read_identifier();
                let token_type = if is_keyword(&word) {
                    TokenType::Keyword
                } else {
                    TokenType::Identifier
                };
                Ok(Token::new(token_type, word, pos))
            }

            c if is_punctuator(c) => {
                self.read_char();
                Ok(Token::new(TokenType::Punctuator, c.to_string(), pos))
            }

            c => {
                let next = self.peek_char();
                for op in OPERATORS {
                    let mut chars = op.chars();
                    let first = chars.next();
                    let second = chars.next();
                    let matched = match second {
                        Some(s) => first == Some(c) && s == next,
                        None => first == Some(c),
                    };
                    if matched {
                        for _ in 0..op.len() {
                            self.read_char();
                        }
                        return Ok(Token::new(TokenType::Operator, *op, pos));
                    }
                }
                Err(ScriptError::new(
                    format!("unexpected character '{}'", c),
                    pos,
                ))
            }
        }
    }

    fn read_identifier(&mut self) -> String {
        let mut word = String::new();
        while self.ch.is_alphanumeric() || self.ch == '_' {
            word.push(self.ch);
            self.read_char();
        }
        word
    }

    /// Digits with optional fraction, exponent and `L`/`D` suffix
    fn read_number(&mut self, pos: Position) -> ScriptResult<Token> {
        let mut literal = String::new();
        let mut float = false;
        while self.ch.is_ascii_digit() {
            literal.push(self.ch);
            self.read_char();
        }
        if self.ch == '.' && self.peek_char().is_ascii_digit() {
            float = true;
            literal.push('.');
            self.read_char();
            while self.ch.is_ascii_digit() {
                literal.push(self.ch);
                self.read_char();
            }
        }
        if self.ch == 'e' || self.ch == 'E' {
            float = true;
            literal.push('e');
            self.read_char();
            if self.ch == '+' || self.ch == '-' {
                literal.push(self.ch);
                self.read_char();
            }
            if !self.ch.is_ascii_digit() {
                return Err(ScriptError::new("malformed exponent", pos));
            }
            while self.ch.is_ascii_digit() {
                literal.push(self.ch);
                self.read_char();
            }
        }
        match self.ch {
            'L' if !float => {
                literal.push('L');
                self.read_char();
            }
            'D' => {
                float = true;
                self.read_char();
            }
            _ => {}
        }
        if self.ch.is_alphanumeric() || self.ch == '_' {
            return Err(ScriptError::new(
                format!("invalid suffix '{}' on numeric literal", self.ch),
                pos,
            ));
        }
        let token_type = if float {
            TokenType::Float
        } else {
            TokenType::Integer
        };
        Ok(Token::new(token_type, literal, pos))
    }

    fn read_string(&mut self, pos: Position) -> ScriptResult<String> {
        let mut out = String::new();
        self.read_char();
        loop {
            match self.ch {
                '"' => {
                    self.read_char();
                    return Ok(out);
                }
                '\0' if self.at_end() => {
                    return Err(ScriptError::new("unterminated string literal", pos))
                }
                '\n' => return Err(ScriptError::new("unterminated string literal", pos)),
                '\\' => {
                    self.read_char();
                    let escaped = match self.ch {
                        'n' => '\n',
                        'r' => '\r',
                        't' => '\t',
                        '0' => '\0',
                        '"' => '"',
                        '\\' => '\\',
                        'u' => self.read_unicode_escape()?,
                        other => {
                            return Err(ScriptError::new(
                                format!("unknown escape '\\{}'", other),
                                self.pos,
                            ))
                        }
                    };
                    out.push(escaped);
                    self.read_char();
                }
                c => {
                    out.push(c);
                    self.read_char();
                }
            }
        }
    }

    fn at_end(&self) -> bool {
        self.position >= self.input.len()
    }

    /// `\u{hex}` with the lexer on the `u`; leaves the lexer on the `}`
    fn read_unicode_escape(&mut self) -> ScriptResult<char> {
        let start = self.pos;
        self.read_char();
        if self.ch != '{' {
            return Err(ScriptError::new("expected '{' after '\\u'", self.pos));
        }
        self.read_char();
        let mut digits = String::new();
        while self.ch.is_ascii_hexdigit() && digits.len() < 6 {
            digits.push(self.ch);
            self.read_char();
        }
        if self.ch != '}' || digits.is_empty() {
            return Err(ScriptError::new("malformed unicode escape", start));
        }
        u32::from_str_radix(&digits, 16)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(|| ScriptError::new(format!("invalid code point '{}'", digits), start))
    }
}

/// Tokenize a source unit
pub fn tokenize(source: &str) -> ScriptResult<Vec<Token>> {
    Lexer::new(source).tokenize()
}
