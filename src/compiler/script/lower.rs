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

//! Static checking and lowering to VM bytecode
//!
//! One pass over the syntax tree both type-checks and emits code. A unit is
//! accepted only if:
//!
//! - its qualified name matches the requested one and it extends the
//!   compiled executor base
//! - every engine symbol it names is imported
//! - it has exactly one constructor consisting of a literal
//!   `super(<primary id>, [<subsumed ids>]);` call
//! - it defines exactly the `prepare`, `setup` and `advance` routines with
//!   their fixed signatures
//! - no field or visible local is declared twice

use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};

use super::ast::*;
use super::error::{ScriptError, ScriptResult};
use super::ops::{CastTarget, MethodId, Op};
use super::program::{CompiledUnitType, FieldInfo, Routine};
use super::slot::Slot;
use super::token::Position;
use super::types::{ExecKind, ListElement, ScriptType};
use crate::compiler::symbols;
use crate::core::{ObjectValue, Value};
use crate::executor::IterationResult;

fn error<T>(message: impl Into<String>, position: Position) -> ScriptResult<T> {
    Err(ScriptError::new(message, position))
}

/// Instruction operand for a slot or pool index. Indexes that do not fit
/// fail the unit rather than aliasing another slot.
fn operand(index: usize, what: &str, position: Position) -> ScriptResult<u32> {
    u32::try_from(index)
        .map_err(|_| ScriptError::new(format!("too many {} in one unit", what), position))
}

/// Lower a parsed source unit into a loadable unit type
pub fn lower(source: &SourceUnit, qualified_name: &str) -> ScriptResult<CompiledUnitType> {
    let decl = &source.unit;
    let declared = format!("{}.{}", source.module, decl.name);
    if declared != qualified_name {
        return error(
            format!("unit declares {} but {} was requested", declared, qualified_name),
            decl.position,
        );
    }

    let mut unit = UnitCompiler::new(source)?;
    if decl.base != symbols::BASE_UNIT {
        return error(
            format!("unit must extend {}, not {}", symbols::BASE_UNIT, decl.base),
            decl.position,
        );
    }
    unit.require_import(&decl.base, decl.position)?;

    for field in &decl.fields {
        unit.declare_field(field)?;
    }
    let (primary_id, subsumed_ids) = unit.check_constructor(decl)?;

    let mut prepare = None;
    let mut setup = None;
    let mut advance = None;
    for routine in &decl.routines {
        let (slot, params, return_type) = match routine.name.as_str() {
            symbols::ROUTINE_PREPARE => (
                &mut prepare,
                vec![(symbols::PARAM_EXEC, ScriptType::Exec)],
                ScriptType::Void,
            ),
            symbols::ROUTINE_SETUP => (
                &mut setup,
                vec![(symbols::PARAM_CTX, ScriptType::FragmentContext)],
                ScriptType::Void,
            ),
            symbols::ROUTINE_ADVANCE => (&mut advance, vec![], ScriptType::IterationResult),
            other => {
                return error(
                    format!("unexpected routine '{}'", other),
                    routine.position,
                )
            }
        };
        if slot.is_some() {
            return error(
                format!("duplicate routine '{}'", routine.name),
                routine.position,
            );
        }
        *slot = Some(unit.lower_routine(routine, &params, return_type)?);
    }

    let missing = |name: &str| ScriptError::new(format!("missing routine '{}'", name), decl.position);
    let prepare = prepare.ok_or_else(|| missing(symbols::ROUTINE_PREPARE))?;
    let setup = setup.ok_or_else(|| missing(symbols::ROUTINE_SETUP))?;
    let advance = advance.ok_or_else(|| missing(symbols::ROUTINE_ADVANCE))?;

    Ok(CompiledUnitType {
        name: decl.name.clone(),
        qualified_name: qualified_name.to_string(),
        primary_id,
        subsumed_ids: Arc::from(subsumed_ids),
        fields: unit.fields,
        constants: unit.constants,
        names: unit.names,
        prepare,
        setup,
        advance,
    })
}

// =============================================================================
// Unit level
// =============================================================================

struct UnitCompiler {
    imports: FxHashSet<String>,
    fields: Vec<FieldInfo>,
    field_index: FxHashMap<String, usize>,
    constants: Vec<Slot>,
    names: Vec<Arc<str>>,
}

impl UnitCompiler {
    fn new(source: &SourceUnit) -> ScriptResult<Self> {
        let mut imports = FxHashSet::default();
        for import in &source.imports {
            if !symbols::MODULES.contains(&import.module.as_str()) {
                return error(format!("unknown module {}", import.module), import.position);
            }
            if !imports.insert(import.module.clone()) {
                return error(format!("duplicate import {}", import.module), import.position);
            }
        }
        Ok(Self {
            imports,
            fields: Vec::new(),
            field_index: FxHashMap::default(),
            constants: Vec::new(),
            names: Vec::new(),
        })
    }

    fn require_import(&self, symbol: &str, position: Position) -> ScriptResult<()> {
        match symbols::module_of(symbol) {
            Some(module) if !self.imports.contains(module) => error(
                format!("{} requires 'import {};'", symbol, module),
                position,
            ),
            _ => Ok(()),
        }
    }

    fn resolve_type(&self, ty: &TypeExpr) -> ScriptResult<ScriptType> {
        let resolved = ScriptType::resolve(&ty.name, ty.argument.as_deref()).ok_or_else(|| {
            let written = match &ty.argument {
                Some(arg) => format!("{}<{}>", ty.name, arg),
                None => ty.name.clone(),
            };
            ScriptError::new(format!("unknown type {}", written), ty.position)
        })?;
        self.require_import(&ty.name, ty.position)?;
        if let (ScriptType::List(_), Some(arg)) = (&resolved, &ty.argument) {
            self.require_import(arg, ty.position)?;
        }
        Ok(resolved)
    }

    fn declare_field(&mut self, field: &FieldDecl) -> ScriptResult<()> {
        let ty = self.resolve_type(&field.ty)?;
        if self.field_index.contains_key(&field.name) {
            return error(format!("duplicate field '{}'", field.name), field.position);
        }
        self.field_index.insert(field.name.clone(), self.fields.len());
        self.fields.push(FieldInfo {
            name: field.name.clone(),
            ty,
        });
        Ok(())
    }

    /// The single constructor must be `super(<int>, [<ints>]);`
    fn check_constructor(&self, decl: &UnitDecl) -> ScriptResult<(i32, Vec<i32>)> {
        let ctor = match decl.constructors.as_slice() {
            [ctor] => ctor,
            [] => return error("missing constructor", decl.position),
            [_, second, ..] => return error("duplicate constructor", second.position),
        };
        let [stmt] = ctor.body.as_slice() else {
            return error(
                "constructor must consist of a single super call",
                ctor.position,
            );
        };
        let StmtKind::SuperCall(args) = &stmt.kind else {
            return error("expected super call", stmt.position);
        };
        let (primary, subsumed) = match args.as_slice() {
            [Expr {
                kind: ExprKind::Int(primary),
                ..
            }, Expr {
                kind: ExprKind::IntArray(subsumed),
                ..
            }] => (*primary, subsumed.clone()),
            _ => {
                return error(
                    "super call takes an Int literal and an Int array literal",
                    stmt.position,
                )
            }
        };
        let mut seen = FxHashSet::default();
        if let Some(dup) = subsumed.iter().find(|id| !seen.insert(**id)) {
            return error(format!("node {} subsumed twice", dup), stmt.position);
        }
        if !subsumed.contains(&primary) {
            return error(
                format!("primary node {} is not in the subsumed list", primary),
                stmt.position,
            );
        }
        Ok((primary, subsumed))
    }

    fn add_constant(&mut self, slot: Slot, position: Position) -> ScriptResult<u32> {
        let index = operand(self.constants.len(), "constants", position)?;
        self.constants.push(slot);
        Ok(index)
    }

    fn add_name(&mut self, name: &str, position: Position) -> ScriptResult<u32> {
        if let Some(i) = self.names.iter().position(|n| n.as_ref() == name) {
            return operand(i, "names", position);
        }
        let index = operand(self.names.len(), "names", position)?;
        self.names.push(Arc::from(name));
        Ok(index)
    }

    fn lower_routine(
        &mut self,
        decl: &RoutineDecl,
        expected_params: &[(&str, ScriptType)],
        return_type: ScriptType,
    ) -> ScriptResult<Routine> {
        let declared_return = match &decl.return_type {
            Some(ty) => self.resolve_type(ty)?,
            None => ScriptType::Void,
        };
        if declared_return != return_type {
            return error(
                format!(
                    "routine '{}' must return {}, declared {}",
                    decl.name, return_type, declared_return
                ),
                decl.position,
            );
        }
        if decl.params.len() != expected_params.len() {
            return error(
                format!(
                    "routine '{}' takes {} parameter(s), declared {}",
                    decl.name,
                    expected_params.len(),
                    decl.params.len()
                ),
                decl.position,
            );
        }

        let mut compiler = RoutineCompiler::new(self, return_type.clone());
        for (param, (expected_name, expected_ty)) in decl.params.iter().zip(expected_params) {
            let ty = compiler.unit.resolve_type(&param.ty)?;
            if ty != *expected_ty || param.name != *expected_name {
                return error(
                    format!(
                        "expected parameter '{}: {}', found '{}: {}'",
                        expected_name, expected_ty, param.name, ty
                    ),
                    param.position,
                );
            }
            compiler.declare_local(&param.name, ty, param.position)?;
        }

        compiler.lower_block(&decl.body)?;
        if return_type == ScriptType::Void {
            compiler.ops.push(Op::ReturnVoid);
        } else {
            if !block_returns(&decl.body) {
                return error(
                    format!("routine '{}' may end without returning a value", decl.name),
                    decl.position,
                );
            }
            compiler.ops.push(Op::MissingReturn);
        }

        operand(compiler.ops.len(), "instructions", decl.position)?;
        let local_count = compiler.local_types.len();
        Ok(Routine::new(
            decl.name.clone(),
            compiler.ops,
            decl.params.len(),
            local_count,
        ))
    }
}

/// Does every path through the block end in a return
fn block_returns(block: &[Stmt]) -> bool {
    match block.last().map(|s| &s.kind) {
        Some(StmtKind::Return(_)) => true,
        Some(StmtKind::If {
            then_branch,
            else_branch: Some(else_branch),
            ..
        }) => block_returns(then_branch) && block_returns(else_branch),
        _ => false,
    }
}

// =============================================================================
// Routine level
// =============================================================================

struct LoopContext {
    start: usize,
    breaks: Vec<usize>,
}

struct RoutineCompiler<'u> {
    unit: &'u mut UnitCompiler,
    ops: Vec<Op>,
    /// Visible locals by name. Shadowing is rejected, so names are unique.
    visible: FxHashMap<String, usize>,
    /// Names declared per block, innermost last
    scopes: Vec<Vec<String>>,
    local_types: Vec<ScriptType>,
    loops: Vec<LoopContext>,
    return_type: ScriptType,
}

impl<'u> RoutineCompiler<'u> {
    fn new(unit: &'u mut UnitCompiler, return_type: ScriptType) -> Self {
        Self {
            unit,
            ops: Vec::new(),
            visible: FxHashMap::default(),
            scopes: vec![Vec::new()],
            local_types: Vec::new(),
            loops: Vec::new(),
            return_type,
        }
    }

    fn lookup(&self, name: &str) -> Option<(usize, &ScriptType)> {
        self.visible
            .get(name)
            .map(|&slot| (slot, &self.local_types[slot]))
    }

    fn declare_local(&mut self, name: &str, ty: ScriptType, position: Position) -> ScriptResult<u32> {
        if self.lookup(name).is_some() {
            return error(format!("duplicate local '{}'", name), position);
        }
        let slot = self.local_types.len();
        let index = operand(slot, "locals", position)?;
        self.local_types.push(ty);
        self.visible.insert(name.to_string(), slot);
        if let Some(scope) = self.scopes.last_mut() {
            scope.push(name.to_string());
        }
        Ok(index)
    }

    fn emit(&mut self, op: Op) -> usize {
        self.ops.push(op);
        self.ops.len() - 1
    }

    /// Index of the next instruction, saturating. Routines longer than
    /// `u32::MAX` instructions are rejected once lowered.
    fn here(&self) -> u32 {
        u32::try_from(self.ops.len()).unwrap_or(u32::MAX)
    }

    /// Point the jump at `at` to the next instruction
    fn patch(&mut self, at: usize) {
        let target = self.here();
        match &mut self.ops[at] {
            Op::Jump(t) | Op::JumpIfFalse(t) | Op::JumpIfTrue(t) => *t = target,
            _ => {}
        }
    }

    fn lower_scoped_block(&mut self, block: &[Stmt]) -> ScriptResult<()> {
        self.scopes.push(Vec::new());
        let result = self.lower_block(block);
        for name in self.scopes.pop().unwrap_or_default() {
            self.visible.remove(&name);
        }
        result
    }

    fn lower_block(&mut self, block: &[Stmt]) -> ScriptResult<()> {
        for stmt in block {
            self.lower_statement(stmt)?;
        }
        Ok(())
    }

    // =========================================================================
    // Statements
    // =========================================================================

    fn lower_statement(&mut self, stmt: &Stmt) -> ScriptResult<()> {
        match &stmt.kind {
            StmtKind::Let { name, ty, init } => {
                let declared = self.unit.resolve_type(ty)?;
                let actual = self.lower_expr(init)?;
                self.expect_assignable(&actual, &declared, init.position)?;
                let slot = self.declare_local(name, declared, stmt.position)?;
                self.emit(Op::StoreLocal(slot));
            }

            StmtKind::AssignField { field, value } => {
                let Some(&index) = self.unit.field_index.get(field) else {
                    return error(format!("unknown field '{}'", field), stmt.position);
                };
                let declared = self.unit.fields[index].ty.clone();
                let actual = self.lower_expr(value)?;
                self.expect_assignable(&actual, &declared, value.position)?;
                self.emit(Op::StoreField(operand(index, "fields", stmt.position)?));
            }

            StmtKind::AssignLocal { name, value } => {
                let Some((slot, declared)) = self.lookup(name).map(|(s, t)| (s, t.clone())) else {
                    return error(format!("unknown local '{}'", name), stmt.position);
                };
                let actual = self.lower_expr(value)?;
                self.expect_assignable(&actual, &declared, value.position)?;
                self.emit(Op::StoreLocal(operand(slot, "locals", stmt.position)?));
            }

            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.lower_condition(condition)?;
                let to_else = self.emit(Op::JumpIfFalse(0));
                self.lower_scoped_block(then_branch)?;
                match else_branch {
                    Some(else_branch) => {
                        let to_end = self.emit(Op::Jump(0));
                        self.patch(to_else);
                        self.lower_scoped_block(else_branch)?;
                        self.patch(to_end);
                    }
                    None => self.patch(to_else),
                }
            }

            StmtKind::While { condition, body } => {
                let start = self.ops.len();
                self.lower_condition(condition)?;
                let to_end = self.emit(Op::JumpIfFalse(0));
                self.loops.push(LoopContext {
                    start,
                    breaks: Vec::new(),
                });
                let body_result = self.lower_scoped_block(body);
                let context = self.loops.pop();
                body_result?;
                self.emit(Op::Jump(operand(start, "instructions", stmt.position)?));
                self.patch(to_end);
                if let Some(context) = context {
                    for at in context.breaks {
                        self.patch(at);
                    }
                }
            }

            StmtKind::Continue => {
                let Some(start) = self.loops.last().map(|l| l.start) else {
                    return error("continue outside of a loop", stmt.position);
                };
                self.emit(Op::Jump(operand(start, "instructions", stmt.position)?));
            }

            StmtKind::Break => {
                if self.loops.is_empty() {
                    return error("break outside of a loop", stmt.position);
                }
                let at = self.emit(Op::Jump(0));
                if let Some(context) = self.loops.last_mut() {
                    context.breaks.push(at);
                }
            }

            StmtKind::Return(value) => match (value, self.return_type.clone()) {
                (None, ScriptType::Void) => {
                    self.emit(Op::ReturnVoid);
                }
                (None, expected) => {
                    return error(format!("missing return value of type {}", expected), stmt.position)
                }
                (Some(value), ScriptType::Void) => {
                    return error("routine does not return a value", value.position)
                }
                (Some(value), expected) => {
                    let actual = self.lower_expr(value)?;
                    self.expect_assignable(&actual, &expected, value.position)?;
                    self.emit(Op::Return);
                }
            },

            StmtKind::SuperCall(_) => {
                return error("super call outside of the constructor", stmt.position)
            }

            StmtKind::Expr(expr) => {
                if !matches!(expr.kind, ExprKind::Call { .. }) {
                    return error("expression statement must be a call", expr.position);
                }
                if self.lower_expr(expr)? != ScriptType::Void {
                    self.emit(Op::Pop);
                }
            }
        }
        Ok(())
    }

    fn lower_condition(&mut self, condition: &Expr) -> ScriptResult<()> {
        let ty = self.lower_expr(condition)?;
        self.expect_type(&ty, &ScriptType::Boolean, condition.position)
    }

    fn expect_assignable(
        &self,
        actual: &ScriptType,
        expected: &ScriptType,
        position: Position,
    ) -> ScriptResult<()> {
        if actual.is_assignable_to(expected) {
            Ok(())
        } else {
            error(format!("cannot assign {} to {}", actual, expected), position)
        }
    }

    fn expect_type(
        &self,
        actual: &ScriptType,
        expected: &ScriptType,
        position: Position,
    ) -> ScriptResult<()> {
        if actual == expected {
            Ok(())
        } else {
            error(format!("expected {}, found {}", expected, actual), position)
        }
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    fn lower_expr(&mut self, expr: &Expr) -> ScriptResult<ScriptType> {
        let position = expr.position;
        match &expr.kind {
            ExprKind::Int(v) => self.constant(Value::Int(*v), ScriptType::Int, position),
            ExprKind::BigInt(v) => self.constant(Value::BigInt(*v), ScriptType::BigInt, position),
            ExprKind::Double(v) => self.constant(Value::Double(*v), ScriptType::Double, position),
            ExprKind::Str(s) => self.constant(Value::varchar(s), ScriptType::Varchar, position),
            ExprKind::Bool(true) => {
                self.emit(Op::True);
                Ok(ScriptType::Boolean)
            }
            ExprKind::Bool(false) => {
                self.emit(Op::False);
                Ok(ScriptType::Boolean)
            }
            ExprKind::Null => {
                self.emit(Op::Null);
                Ok(ScriptType::Null)
            }
            ExprKind::IntArray(values) => {
                let index = self
                    .unit
                    .add_constant(Slot::IntArray(Arc::from(values.as_slice())), position)?;
                self.emit(Op::Const(index));
                Ok(ScriptType::IntArray)
            }

            ExprKind::Ident(name) => match self.lookup(name) {
                Some((slot, ty)) => {
                    let ty = ty.clone();
                    self.emit(Op::LoadLocal(operand(slot, "locals", position)?));
                    Ok(ty)
                }
                None => error(format!("unknown identifier '{}'", name), position),
            },

            ExprKind::This => error("'this' is not a value", position),

            ExprKind::Unary { op, operand } => {
                let ty = self.lower_expr(operand)?;
                match op {
                    UnaryOp::Not => {
                        self.expect_type(&ty, &ScriptType::Boolean, operand.position)?;
                        self.emit(Op::Not);
                    }
                    UnaryOp::Neg => {
                        if !ty.is_numeric() {
                            return error(format!("cannot negate {}", ty), position);
                        }
                        self.emit(Op::Neg);
                    }
                }
                Ok(ty)
            }

            ExprKind::Binary { op, left, right } => self.lower_binary(*op, left, right, position),

            ExprKind::Ternary {
                condition,
                then_value,
                else_value,
            } => {
                self.lower_condition(condition)?;
                let to_else = self.emit(Op::JumpIfFalse(0));
                let then_ty = self.lower_expr(then_value)?;
                let to_end = self.emit(Op::Jump(0));
                self.patch(to_else);
                let else_ty = self.lower_expr(else_value)?;
                self.patch(to_end);
                then_ty.unify(&else_ty).ok_or_else(|| {
                    ScriptError::new(
                        format!("branches have incompatible types {} and {}", then_ty, else_ty),
                        position,
                    )
                })
            }

            ExprKind::Member { target, name } => self.lower_member(target, name, position),

            ExprKind::Call {
                target,
                method,
                args,
            } => self.lower_call(target, method, args, position),

            ExprKind::Cast { operand, ty } => {
                let target = self.unit.resolve_type(ty)?;
                let from = self.lower_expr(operand)?;
                if !target.is_castable_from(&from) {
                    return error(format!("cannot cast {} to {}", from, target), position);
                }
                if from != target && from != ScriptType::Null {
                    let cast = match &target {
                        ScriptType::SpecificExec(kind) => Some(CastTarget::Exec(*kind)),
                        ScriptType::Object(class) => Some(CastTarget::Object(class.clone())),
                        ScriptType::Value => None,
                        t => t.data_type().map(CastTarget::Scalar),
                    };
                    if let Some(cast) = cast {
                        self.emit(Op::Cast(cast));
                    }
                }
                Ok(target)
            }
        }
    }

    fn constant(&mut self, value: Value, ty: ScriptType, position: Position) -> ScriptResult<ScriptType> {
        let index = self.unit.add_constant(Slot::Value(value), position)?;
        self.emit(Op::Const(index));
        Ok(ty)
    }

    fn lower_binary(
        &mut self,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
        position: Position,
    ) -> ScriptResult<ScriptType> {
        if matches!(op, BinaryOp::And | BinaryOp::Or) {
            // Short circuit: the right operand runs only when it decides the result
            self.lower_condition(left)?;
            let to_short = self.emit(if op == BinaryOp::And {
                Op::JumpIfFalse(0)
            } else {
                Op::JumpIfTrue(0)
            });
            self.lower_condition(right)?;
            let to_end = self.emit(Op::Jump(0));
            self.patch(to_short);
            self.emit(if op == BinaryOp::And { Op::False } else { Op::True });
            self.patch(to_end);
            return Ok(ScriptType::Boolean);
        }

        let left_ty = self.lower_expr(left)?;
        let right_ty = self.lower_expr(right)?;
        let mismatch = || {
            ScriptError::new(
                format!(
                    "operator {} cannot be applied to {} and {}",
                    op.symbol(),
                    left_ty,
                    right_ty
                ),
                position,
            )
        };
        let (instruction, result) = match op {
            BinaryOp::Eq | BinaryOp::Ne => {
                if !left_ty.is_equatable_with(&right_ty) {
                    return Err(mismatch());
                }
                let instruction = if op == BinaryOp::Eq { Op::Eq } else { Op::Ne };
                (instruction, ScriptType::Boolean)
            }
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                if left_ty != right_ty || !left_ty.is_orderable() {
                    return Err(mismatch());
                }
                let instruction = match op {
                    BinaryOp::Lt => Op::Lt,
                    BinaryOp::Le => Op::Le,
                    BinaryOp::Gt => Op::Gt,
                    _ => Op::Ge,
                };
                (instruction, ScriptType::Boolean)
            }
            _ => {
                if left_ty != right_ty || !left_ty.is_numeric() {
                    return Err(mismatch());
                }
                let instruction = match op {
                    BinaryOp::Add => Op::Add,
                    BinaryOp::Sub => Op::Sub,
                    BinaryOp::Mul => Op::Mul,
                    BinaryOp::Div => Op::Div,
                    _ => Op::Rem,
                };
                (instruction, left_ty.clone())
            }
        };
        self.emit(instruction);
        Ok(result)
    }

    /// Name of a static owner, if `target` is a bare identifier that is not a local
    fn static_owner<'e>(&self, target: &'e Expr) -> Option<&'e str> {
        match &target.kind {
            ExprKind::Ident(name) if self.lookup(name).is_none() => Some(name),
            _ => None,
        }
    }

    fn lower_member(&mut self, target: &Expr, name: &str, position: Position) -> ScriptResult<ScriptType> {
        if target.kind == ExprKind::This {
            let Some(&index) = self.unit.field_index.get(name) else {
                return error(format!("unknown field '{}'", name), position);
            };
            self.emit(Op::LoadField(operand(index, "fields", position)?));
            return Ok(self.unit.fields[index].ty.clone());
        }
        if let Some(owner) = self.static_owner(target) {
            if owner == symbols::TYPE_ITERATION_RESULT {
                self.unit.require_import(owner, target.position)?;
                let result = match name {
                    symbols::ITERATION_FETCHED => IterationResult::Fetched,
                    symbols::ITERATION_FETCHED_DONE => IterationResult::FetchedDone,
                    other => {
                        return error(
                            format!("unknown member {}.{}", owner, other),
                            position,
                        )
                    }
                };
                let index = self.unit.add_constant(Slot::Iteration(result), position)?;
                self.emit(Op::Const(index));
                return Ok(ScriptType::IterationResult);
            }
            return error(format!("unknown identifier '{}'", owner), target.position);
        }
        error(format!("unknown member '{}'", name), position)
    }

    fn lower_args(&mut self, args: &[Expr], params: &[ScriptType], method: &str, position: Position) -> ScriptResult<()> {
        if args.len() != params.len() {
            return error(
                format!(
                    "{} takes {} argument(s), {} given",
                    method,
                    params.len(),
                    args.len()
                ),
                position,
            );
        }
        for (arg, param) in args.iter().zip(params) {
            let ty = self.lower_expr(arg)?;
            self.expect_assignable(&ty, param, arg.position)?;
        }
        Ok(())
    }

    fn lower_call(
        &mut self,
        target: &Expr,
        method: &str,
        args: &[Expr],
        position: Position,
    ) -> ScriptResult<ScriptType> {
        if target.kind == ExprKind::This {
            return match method {
                symbols::METHOD_CLEAR_BATCH => {
                    self.lower_args(args, &[], method, position)?;
                    self.emit(Op::ClearBatch);
                    Ok(ScriptType::Void)
                }
                symbols::METHOD_ADD_TO_BATCH => {
                    self.lower_args(args, &[ScriptType::Row], method, position)?;
                    self.emit(Op::AddToBatch);
                    Ok(ScriptType::Boolean)
                }
                other => error(format!("unknown method this.{}()", other), position),
            };
        }

        if let Some(owner) = self.static_owner(target) {
            self.unit.require_import(owner, target.position)?;
            return match (owner, method) {
                (symbols::HEAP_ROW, symbols::HEAP_ROW_OF) => {
                    for arg in args {
                        let ty = self.lower_expr(arg)?;
                        if !ty.is_value_type() {
                            return error(format!("row values must be values, found {}", ty), arg.position);
                        }
                    }
                    self.emit(Op::NewRow(operand(args.len(), "row values", position)?));
                    Ok(ScriptType::Row)
                }
                (symbols::MAP_SCAN_UTILS, symbols::MAP_SCAN_UTILS_CREATE_ITERATOR) => {
                    self.lower_args(
                        args,
                        &[ScriptType::MapContainer, ScriptType::PartitionIdSet],
                        method,
                        position,
                    )?;
                    self.emit(Op::CreateIterator);
                    Ok(ScriptType::MapScanIterator)
                }
                _ => error(format!("unknown static method {}.{}()", owner, method), position),
            };
        }

        let target_ty = self.lower_expr(target)?;
        if let ScriptType::Object(_) = target_ty {
            return match ObjectValue::field_for_getter(method) {
                Some(field) if args.is_empty() => {
                    let index = self.unit.add_name(&field, position)?;
                    self.emit(Op::Getter(index));
                    Ok(ScriptType::Value)
                }
                _ => error(format!("unknown method {}.{}()", target_ty, method), position),
            };
        }

        let Some((id, params, result)) = method_signature(&target_ty, method) else {
            return error(format!("unknown method {}.{}()", target_ty, method), position);
        };
        self.lower_args(args, &params, method, position)?;
        let argc = u8::try_from(args.len())
            .map_err(|_| ScriptError::new(format!("too many arguments to {}()", method), position))?;
        self.emit(Op::Call(id, argc));
        Ok(result)
    }
}

/// Engine methods callable on a value of the given type
fn method_signature(target: &ScriptType, method: &str) -> Option<(MethodId, Vec<ScriptType>, ScriptType)> {
    use ScriptType as T;
    let signature = match (target, method) {
        (T::Exec | T::SpecificExec(_), symbols::METHOD_ID) => (MethodId::ExecId, vec![], T::Int),

        (T::SpecificExec(ExecKind::MapScan), name) => match name {
            symbols::METHOD_MAP => (MethodId::ScanMap, vec![], T::MapContainer),
            symbols::METHOD_PARTITIONS => (MethodId::ScanPartitions, vec![], T::PartitionIdSet),
            symbols::METHOD_KEY_DESCRIPTOR => {
                (MethodId::ScanKeyDescriptor, vec![], T::TopObjectDescriptor)
            }
            symbols::METHOD_VALUE_DESCRIPTOR => {
                (MethodId::ScanValueDescriptor, vec![], T::TopObjectDescriptor)
            }
            symbols::METHOD_FIELD_PATHS => {
                (MethodId::ScanFieldPaths, vec![], T::List(ListElement::QueryPath))
            }
            symbols::METHOD_FIELD_TYPES => {
                (MethodId::ScanFieldTypes, vec![], T::List(ListElement::DataType))
            }
            symbols::METHOD_PROJECTS => (MethodId::ScanProjects, vec![], T::List(ListElement::Int)),
            symbols::METHOD_FILTER => (MethodId::ScanFilter, vec![], T::Expression),
            _ => return None,
        },
        (T::SpecificExec(ExecKind::Filter), symbols::METHOD_CONDITION) => {
            (MethodId::FilterCondition, vec![], T::Expression)
        }
        (T::SpecificExec(ExecKind::Project), symbols::METHOD_PROJECTS) => (
            MethodId::ProjectExpressions,
            vec![],
            T::List(ListElement::Expression),
        ),

        (T::List(element), symbols::METHOD_GET) => {
            (MethodId::ListGet, vec![T::Int], element.item_type())
        }
        (T::List(_), symbols::METHOD_SIZE) => (MethodId::ListSize, vec![], T::Int),

        (T::MapScanIterator, symbols::METHOD_TRY_ADVANCE) => (MethodId::TryAdvance, vec![], T::Boolean),
        (T::MapScanIterator, symbols::METHOD_KEY) => (MethodId::IteratorKey, vec![], T::Value),
        (T::MapScanIterator, symbols::METHOD_VALUE) => (MethodId::IteratorValue, vec![], T::Value),

        (T::Expression, symbols::METHOD_EVAL) => (MethodId::Eval, vec![T::Row], T::Value),

        (T::Row, symbols::METHOD_GET) => (MethodId::RowGet, vec![T::Int], T::Value),
        (T::Row, symbols::METHOD_SIZE) => (MethodId::RowSize, vec![], T::Int),

        _ => return None,
    };
    Some(signature)
}
