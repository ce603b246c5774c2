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

//! Syntax tree of a fragment source unit

use super::token::Position;

/// A parsed source unit: module declaration, imports and one unit
#[derive(Debug, Clone, PartialEq)]
pub struct SourceUnit {
    pub module: String,
    pub imports: Vec<Import>,
    pub unit: UnitDecl,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Import {
    pub module: String,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnitDecl {
    pub name: String,
    pub base: String,
    pub fields: Vec<FieldDecl>,
    pub constructors: Vec<ConstructorDecl>,
    pub routines: Vec<RoutineDecl>,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    pub name: String,
    pub ty: TypeExpr,
    pub position: Position,
}

/// Type as written: `Int`, `Object<Person>`, `List<QueryPath>`
#[derive(Debug, Clone, PartialEq)]
pub struct TypeExpr {
    pub name: String,
    pub argument: Option<String>,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConstructorDecl {
    pub body: Vec<Stmt>,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: TypeExpr,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoutineDecl {
    pub name: String,
    pub params: Vec<Param>,
    pub return_type: Option<TypeExpr>,
    pub body: Vec<Stmt>,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Let {
        name: String,
        ty: TypeExpr,
        init: Expr,
    },
    AssignField {
        field: String,
        value: Expr,
    },
    AssignLocal {
        name: String,
        value: Expr,
    },
    If {
        condition: Expr,
        then_branch: Vec<Stmt>,
        else_branch: Option<Vec<Stmt>>,
    },
    While {
        condition: Expr,
        body: Vec<Stmt>,
    },
    Continue,
    Break,
    Return(Option<Expr>),
    SuperCall(Vec<Expr>),
    Expr(Expr),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Or => "||",
            BinaryOp::And => "&&",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub position: Position,
}

impl Expr {
    pub fn new(kind: ExprKind, position: Position) -> Self {
        Self { kind, position }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Int(i32),
    BigInt(i64),
    Double(f64),
    Str(String),
    Bool(bool),
    Null,
    IntArray(Vec<i32>),
    Ident(String),
    This,
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Ternary {
        condition: Box<Expr>,
        then_value: Box<Expr>,
        else_value: Box<Expr>,
    },
    /// `target.name` without a call
    Member {
        target: Box<Expr>,
        name: String,
    },
    /// `target.method(args)`
    Call {
        target: Box<Expr>,
        method: String,
        args: Vec<Expr>,
    },
    Cast {
        operand: Box<Expr>,
        ty: TypeExpr,
    },
}
