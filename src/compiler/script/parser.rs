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

//! Recursive-descent parser for the fragment language
//!
//! Expression precedence, lowest first: ternary, `||`, `&&`, equality,
//! relational, additive, multiplicative, unary, then postfix member access,
//! calls and `as` casts.

use super::ast::*;
use super::error::{ScriptError, ScriptResult};
use super::lexer::tokenize;
use super::token::{Position, Token, TokenType};

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    // =========================================================================
    // Token cursor
    // =========================================================================

    fn current(&self) -> &Token {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[self.pos.min(last)]
    }

    fn peek(&self) -> &Token {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[(self.pos + 1).min(last)]
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if !token.is_eof() {
            self.pos += 1;
        }
        token
    }

    fn unexpected(&self, expected: &str) -> ScriptError {
        let token = self.current();
        ScriptError::new(
            format!("expected {}, found {}", expected, token),
            token.position,
        )
    }

    fn expect_punct(&mut self, punct: &str) -> ScriptResult<Position> {
        if self.current().is_punctuator(punct) {
            Ok(self.advance().position)
        } else {
            Err(self.unexpected(&format!("'{}'", punct)))
        }
    }

    fn expect_operator(&mut self, op: &str) -> ScriptResult<Position> {
        if self.current().is_operator(op) {
            Ok(self.advance().position)
        } else {
            Err(self.unexpected(&format!("'{}'", op)))
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> ScriptResult<Position> {
        if self.current().is_keyword(keyword) {
            Ok(self.advance().position)
        } else {
            Err(self.unexpected(&format!("'{}'", keyword)))
        }
    }

    fn expect_identifier(&mut self) -> ScriptResult<(String, Position)> {
        if self.current().token_type == TokenType::Identifier {
            let token = self.advance();
            Ok((token.literal, token.position))
        } else {
            Err(self.unexpected("identifier"))
        }
    }

    /// `a.b.c`
    fn parse_qualified_name(&mut self) -> ScriptResult<(String, Position)> {
        let (mut name, position) = self.expect_identifier()?;
        while self.current().is_punctuator(".") {
            self.advance();
            let (segment, _) = self.expect_identifier()?;
            name.push('.');
            name.push_str(&segment);
        }
        Ok((name, position))
    }

    // =========================================================================
    // Declarations
    // =========================================================================

    pub fn parse_source_unit(&mut self) -> ScriptResult<SourceUnit> {
        self.expect_keyword("module")?;
        let (module, _) = self.parse_qualified_name()?;
        self.expect_punct(";")?;

        let mut imports = Vec::new();
        while self.current().is_keyword("import") {
            self.advance();
            let (module, position) = self.parse_qualified_name()?;
            self.expect_punct(";")?;
            imports.push(Import { module, position });
        }

        let unit = self.parse_unit()?;
        if !self.current().is_eof() {
            return Err(self.unexpected("end of input"));
        }
        Ok(SourceUnit {
            module,
            imports,
            unit,
        })
    }

    fn parse_unit(&mut self) -> ScriptResult<UnitDecl> {
        let position = self.expect_keyword("unit")?;
        let (name, _) = self.expect_identifier()?;
        self.expect_keyword("extends")?;
        let (base, _) = self.expect_identifier()?;
        self.expect_punct("{")?;

        let mut unit = UnitDecl {
            name,
            base,
            fields: Vec::new(),
            constructors: Vec::new(),
            routines: Vec::new(),
            position,
        };
        loop {
            let token = self.current();
            if token.is_punctuator("}") {
                self.advance();
                return Ok(unit);
            } else if token.is_keyword("field") {
                let position = self.advance().position;
                let (name, _) = self.expect_identifier()?;
                self.expect_punct(":")?;
                let ty = self.parse_type()?;
                self.expect_punct(";")?;
                unit.fields.push(FieldDecl { name, ty, position });
            } else if token.is_keyword("new") {
                let position = self.advance().position;
                self.expect_punct("(")?;
                self.expect_punct(")")?;
                let body = self.parse_block()?;
                unit.constructors.push(ConstructorDecl { body, position });
            } else if token.is_keyword("fn") {
                unit.routines.push(self.parse_routine()?);
            } else {
                return Err(self.unexpected("'field', 'new', 'fn' or '}'"));
            }
        }
    }

    fn parse_routine(&mut self) -> ScriptResult<RoutineDecl> {
        let position = self.expect_keyword("fn")?;
        let (name, _) = self.expect_identifier()?;
        self.expect_punct("(")?;
        let mut params = Vec::new();
        if !self.current().is_punctuator(")") {
            loop {
                let (name, position) = self.expect_identifier()?;
                self.expect_punct(":")?;
                let ty = self.parse_type()?;
                params.push(Param { name, ty, position });
                if self.current().is_punctuator(",") {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.expect_punct(")")?;
        let return_type = if self.current().is_operator("->") {
            self.advance();
            Some(self.parse_type()?)
        } else {
            None
        };
        let body = self.parse_block()?;
        Ok(RoutineDecl {
            name,
            params,
            return_type,
            body,
            position,
        })
    }

    fn parse_type(&mut self) -> ScriptResult<TypeExpr> {
        let (name, position) = self.expect_identifier()?;
        let argument = if self.current().is_operator("<") {
            self.advance();
            let (argument, _) = self.parse_qualified_name()?;
            self.expect_operator(">")?;
            Some(argument)
        } else {
            None
        };
        Ok(TypeExpr {
            name,
            argument,
            position,
        })
    }

    // =========================================================================
    // Statements
    // =========================================================================

    fn parse_block(&mut self) -> ScriptResult<Vec<Stmt>> {
        self.expect_punct("{")?;
        let mut stmts = Vec::new();
        while !self.current().is_punctuator("}") {
            if self.current().is_eof() {
                return Err(self.unexpected("'}'"));
            }
            stmts.push(self.parse_statement()?);
        }
        self.advance();
        Ok(stmts)
    }

    fn parse_statement(&mut self) -> ScriptResult<Stmt> {
        let position = self.current().position;
        let token = self.current().clone();

        let kind = if token.is_keyword("let") {
            self.advance();
            let (name, _) = self.expect_identifier()?;
            self.expect_punct(":")?;
            let ty = self.parse_type()?;
            self.expect_operator("=")?;
            let init = self.parse_expression()?;
            self.expect_punct(";")?;
            StmtKind::Let { name, ty, init }
        } else if token.is_keyword("if") {
            return self.parse_if();
        } else if token.is_keyword("while") {
            self.advance();
            let condition = self.parse_expression()?;
            let body = self.parse_block()?;
            StmtKind::While { condition, body }
        } else if token.is_keyword("continue") {
            self.advance();
            self.expect_punct(";")?;
            StmtKind::Continue
        } else if token.is_keyword("break") {
            self.advance();
            self.expect_punct(";")?;
            StmtKind::Break
        } else if token.is_keyword("return") {
            self.advance();
            let value = if self.current().is_punctuator(";") {
                None
            } else {
                Some(self.parse_expression()?)
            };
            self.expect_punct(";")?;
            StmtKind::Return(value)
        } else if token.is_keyword("super") {
            self.advance();
            let args = self.parse_arguments()?;
            self.expect_punct(";")?;
            StmtKind::SuperCall(args)
        } else {
            let expr = self.parse_expression()?;
            if self.current().is_operator("=") {
                self.advance();
                let value = self.parse_expression()?;
                self.expect_punct(";")?;
                match expr.kind {
                    ExprKind::Member { target, name } if target.kind == ExprKind::This => {
                        StmtKind::AssignField { field: name, value }
                    }
                    ExprKind::Ident(name) => StmtKind::AssignLocal { name, value },
                    _ => {
                        return Err(ScriptError::new(
                            "invalid assignment target",
                            expr.position,
                        ))
                    }
                }
            } else {
                self.expect_punct(";")?;
                StmtKind::Expr(expr)
            }
        };
        Ok(Stmt { kind, position })
    }

    fn parse_if(&mut self) -> ScriptResult<Stmt> {
        let position = self.expect_keyword("if")?;
        let condition = self.parse_expression()?;
        let then_branch = self.parse_block()?;
        let else_branch = if self.current().is_keyword("else") {
            self.advance();
            if self.current().is_keyword("if") {
                Some(vec![self.parse_if()?])
            } else {
                Some(self.parse_block()?)
            }
        } else {
            None
        };
        Ok(Stmt {
            kind: StmtKind::If {
                condition,
                then_branch,
                else_branch,
            },
            position,
        })
    }

    fn parse_arguments(&mut self) -> ScriptResult<Vec<Expr>> {
        self.expect_punct("(")?;
        let mut args = Vec::new();
        if !self.current().is_punctuator(")") {
            loop {
                args.push(self.parse_expression()?);
                if self.current().is_punctuator(",") {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.expect_punct(")")?;
        Ok(args)
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    pub fn parse_expression(&mut self) -> ScriptResult<Expr> {
        let condition = self.parse_or()?;
        if !self.current().is_operator("?") {
            return Ok(condition);
        }
        let position = self.advance().position;
        let then_value = self.parse_expression()?;
        self.expect_punct(":")?;
        let else_value = self.parse_expression()?;
        Ok(Expr::new(
            ExprKind::Ternary {
                condition: Box::new(condition),
                then_value: Box::new(then_value),
                else_value: Box::new(else_value),
            },
            position,
        ))
    }

    /// One left-associative binary precedence level
    fn parse_binary_level(
        &mut self,
        ops: &[(&str, BinaryOp)],
        next: fn(&mut Self) -> ScriptResult<Expr>,
    ) -> ScriptResult<Expr> {
        let mut left = next(self)?;
        'outer: loop {
            for (symbol, op) in ops {
                if self.current().is_operator(symbol) {
                    let position = self.advance().position;
                    let right = next(self)?;
                    left = Expr::new(
                        ExprKind::Binary {
                            op: *op,
                            left: Box::new(left),
                            right: Box::new(right),
                        },
                        position,
                    );
                    continue 'outer;
                }
            }
            return Ok(left);
        }
    }

    fn parse_or(&mut self) -> ScriptResult<Expr> {
        self.parse_binary_level(&[("||", BinaryOp::Or)], Self::parse_and)
    }

    fn parse_and(&mut self) -> ScriptResult<Expr> {
        self.parse_binary_level(&[("&&", BinaryOp::And)], Self::parse_equality)
    }

    fn parse_equality(&mut self) -> ScriptResult<Expr> {
        self.parse_binary_level(
            &[("==", BinaryOp::Eq), ("!=", BinaryOp::Ne)],
            Self::parse_relational,
        )
    }

    fn parse_relational(&mut self) -> ScriptResult<Expr> {
        self.parse_binary_level(
            &[
                ("<", BinaryOp::Lt),
                ("<=", BinaryOp::Le),
                (">", BinaryOp::Gt),
                (">=", BinaryOp::Ge),
            ],
            Self::parse_additive,
        )
    }

    fn parse_additive(&mut self) -> ScriptResult<Expr> {
        self.parse_binary_level(
            &[("+", BinaryOp::Add), ("-", BinaryOp::Sub)],
            Self::parse_multiplicative,
        )
    }

    fn parse_multiplicative(&mut self) -> ScriptResult<Expr> {
        self.parse_binary_level(
            &[
                ("*", BinaryOp::Mul),
                ("/", BinaryOp::Div),
                ("%", BinaryOp::Rem),
            ],
            Self::parse_unary,
        )
    }

    fn parse_unary(&mut self) -> ScriptResult<Expr> {
        let token = self.current().clone();
        if token.is_operator("!") {
            self.advance();
            let operand = self.parse_unary()?;
            return Ok(Expr::new(
                ExprKind::Unary {
                    op: UnaryOp::Not,
                    operand: Box::new(operand),
                },
                token.position,
            ));
        }
        if token.is_operator("-") {
            self.advance();
            // Fold the sign into a numeric literal so MIN values are expressible
            if matches!(
                self.current().token_type,
                TokenType::Integer | TokenType::Float
            ) {
                let literal = self.advance();
                let expr = parse_number(&literal, true, token.position)?;
                return self.parse_postfix(expr);
            }
            let operand = self.parse_unary()?;
            return Ok(Expr::new(
                ExprKind::Unary {
                    op: UnaryOp::Neg,
                    operand: Box::new(operand),
                },
                token.position,
            ));
        }
        let primary = self.parse_primary()?;
        self.parse_postfix(primary)
    }

    fn parse_postfix(&mut self, mut expr: Expr) -> ScriptResult<Expr> {
        loop {
            if self.current().is_punctuator(".") {
                let position = self.advance().position;
                let (name, _) = self.expect_identifier()?;
                expr = if self.current().is_punctuator("(") {
                    let args = self.parse_arguments()?;
                    Expr::new(
                        ExprKind::Call {
                            target: Box::new(expr),
                            method: name,
                            args,
                        },
                        position,
                    )
                } else {
                    Expr::new(
                        ExprKind::Member {
                            target: Box::new(expr),
                            name,
                        },
                        position,
                    )
                };
            } else if self.current().is_keyword("as") {
                let position = self.advance().position;
                let ty = self.parse_type()?;
                expr = Expr::new(
                    ExprKind::Cast {
                        operand: Box::new(expr),
                        ty,
                    },
                    position,
                );
            } else {
                return Ok(expr);
            }
        }
    }

    fn parse_primary(&mut self) -> ScriptResult<Expr> {
        let token = self.current().clone();
        let position = token.position;
        let kind = match token.token_type {
            TokenType::Integer | TokenType::Float => {
                self.advance();
                return parse_number(&token, false, position);
            }
            TokenType::String => {
                self.advance();
                ExprKind::Str(token.literal)
            }
            TokenType::Identifier => {
                self.advance();
                ExprKind::Ident(token.literal)
            }
            TokenType::Keyword => match token.literal.as_str() {
                "true" => {
                    self.advance();
                    ExprKind::Bool(true)
                }
                "false" => {
                    self.advance();
                    ExprKind::Bool(false)
                }
                "null" => {
                    self.advance();
                    ExprKind::Null
                }
                "this" => {
                    self.advance();
                    ExprKind::This
                }
                _ => return Err(self.unexpected("expression")),
            },
            TokenType::Punctuator if token.literal == "(" => {
                self.advance();
                let inner = self.parse_expression()?;
                self.expect_punct(")")?;
                return Ok(inner);
            }
            TokenType::Punctuator if token.literal == "[" => {
                self.advance();
                ExprKind::IntArray(self.parse_int_array()?)
            }
            _ => return Err(self.unexpected("expression")),
        };
        Ok(Expr::new(kind, position))
    }

    /// Elements of `[1, 2, -3]`; the opening bracket is consumed
    fn parse_int_array(&mut self) -> ScriptResult<Vec<i32>> {
        let mut values = Vec::new();
        if self.current().is_punctuator("]") {
            self.advance();
            return Ok(values);
        }
        loop {
            let negative = if self.current().is_operator("-") {
                self.advance();
                true
            } else {
                false
            };
            let token = self.current().clone();
            if token.token_type != TokenType::Integer {
                return Err(self.unexpected("integer"));
            }
            self.advance();
            match parse_number(&token, negative, token.position)?.kind {
                ExprKind::Int(v) => values.push(v),
                _ => {
                    return Err(ScriptError::new(
                        "array elements must be Int literals",
                        token.position,
                    ))
                }
            }
            if self.current().is_punctuator(",") {
                self.advance();
            } else {
                break;
            }
        }
        self.expect_punct("]")?;
        Ok(values)
    }
}

/// Parse a numeric literal token, with its sign already folded in
fn parse_number(token: &Token, negative: bool, position: Position) -> ScriptResult<Expr> {
    let sign = if negative { "-" } else { "" };
    let kind = match token.token_type {
        TokenType::Float => {
            let text = format!("{}{}", sign, token.literal);
            let value: f64 = text
                .parse()
                .map_err(|_| ScriptError::new(format!("invalid Double literal {}", text), position))?;
            ExprKind::Double(value)
        }
        _ => match token.literal.strip_suffix('L') {
            Some(digits) => {
                let text = format!("{}{}", sign, digits);
                let value: i64 = text.parse().map_err(|_| {
                    ScriptError::new(format!("BigInt literal {} out of range", text), position)
                })?;
                ExprKind::BigInt(value)
            }
            None => {
                let text = format!("{}{}", sign, token.literal);
                let value: i32 = text.parse().map_err(|_| {
                    ScriptError::new(format!("Int literal {} out of range", text), position)
                })?;
                ExprKind::Int(value)
            }
        },
    };
    Ok(Expr::new(kind, position))
}

/// Parse a complete source unit
pub fn parse(source: &str) -> ScriptResult<SourceUnit> {
    Parser::new(tokenize(source)?).parse_source_unit()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expr(source: &str) -> Expr {
        Parser::new(tokenize(source).unwrap())
            .parse_expression()
            .unwrap()
    }

    #[test]
    fn test_precedence() {
        let e = expr("a == null || b + c * d > 1");
        let ExprKind::Binary { op, left, right } = e.kind else {
            panic!("expected binary");
        };
        assert_eq!(op, BinaryOp::Or);
        assert!(matches!(left.kind, ExprKind::Binary { op: BinaryOp::Eq, .. }));
        let ExprKind::Binary { op, left, .. } = right.kind else {
            panic!("expected comparison");
        };
        assert_eq!(op, BinaryOp::Gt);
        assert!(matches!(left.kind, ExprKind::Binary { op: BinaryOp::Add, .. }));
    }

    #[test]
    fn test_ternary_and_cast() {
        let e = expr("(x == null) ? null : (x.getA() as Int)");
        let ExprKind::Ternary { else_value, .. } = e.kind else {
            panic!("expected ternary");
        };
        let ExprKind::Cast { operand, ty } = else_value.kind else {
            panic!("expected cast");
        };
        assert_eq!(ty.name, "Int");
        assert!(matches!(operand.kind, ExprKind::Call { ref method, .. } if method == "getA"));
    }

    #[test]
    fn test_negative_literal_folding() {
        assert_eq!(expr("-2147483648").kind, ExprKind::Int(i32::MIN));
        assert_eq!(expr("-9223372036854775808L").kind, ExprKind::BigInt(i64::MIN));
        assert_eq!(expr("-0.5").kind, ExprKind::Double(-0.5));
        assert!(Parser::new(tokenize("2147483648").unwrap())
            .parse_expression()
            .is_err());
        assert!(matches!(
            expr("-x").kind,
            ExprKind::Unary { op: UnaryOp::Neg, .. }
        ));
    }

    #[test]
    fn test_parse_unit() {
        let source = "module sql.compiled;\n\
                      import sql.exec;\n\
                      unit U extends CompiledExec {\n\
                          field _1_a: Object<com.acme.Person>;\n\
                          new() { super(1, [1, 2]); }\n\
                          fn advance() -> IterationResult {\n\
                              this._1_a = null;\n\
                              return IterationResult.FETCHED_DONE;\n\
                          }\n\
                      }\n";
        let unit = parse(source).unwrap();
        assert_eq!(unit.module, "sql.compiled");
        assert_eq!(unit.imports[0].module, "sql.exec");
        assert_eq!(unit.unit.fields[0].ty.argument.as_deref(), Some("com.acme.Person"));
        let StmtKind::SuperCall(args) = &unit.unit.constructors[0].body[0].kind else {
            panic!("expected super call");
        };
        assert_eq!(args[1].kind, ExprKind::IntArray(vec![1, 2]));
        assert!(matches!(
            unit.unit.routines[0].body[0].kind,
            StmtKind::AssignField { .. }
        ));
    }

    #[test]
    fn test_syntax_error_position() {
        let err = parse("module a;\nunit U extends B {\n  field x Int;\n}").unwrap_err();
        assert_eq!(err.position, Position::new(3, 11));
        assert!(err.message.contains("expected ':'"));
    }
}
