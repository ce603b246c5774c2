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

//! Stack machine that runs lowered routines
//!
//! Values on the stack are [`Slot`]s. Arithmetic, comparison and conversion
//! delegate to [`Value`] and [`DataType`], so compiled code raises exactly
//! the errors the interpreted operators raise for the same input.

use std::sync::Arc;

use parking_lot::Mutex;
use smallvec::SmallVec;

use super::ops::{CastTarget, MethodId, Op};
use super::program::{CompiledUnitType, Routine};
use super::slot::{Handle, Slot};
use crate::core::{ComparisonMode, DataType, Error, Result, Row, Value};
use crate::executor::{ExecState, RowBatch};
use crate::storage::MapScanIterator;

/// Per-instance storage of a compiled unit
#[derive(Debug)]
pub struct InstanceState {
    fields: Vec<Slot>,
    batch: RowBatch,
}

impl InstanceState {
    pub fn new(unit: &CompiledUnitType, batch_size: usize) -> Self {
        Self {
            fields: vec![Slot::Unset; unit.fields().len()],
            batch: RowBatch::new(batch_size),
        }
    }

    pub fn batch(&self) -> &RowBatch {
        &self.batch
    }

    pub fn field(&self, index: usize) -> Option<&Slot> {
        self.fields.get(index)
    }
}

/// Interpreter for the routines of one unit
pub struct Vm<'a> {
    unit: &'a CompiledUnitType,
    state: &'a mut InstanceState,
}

type Stack = SmallVec<[Slot; 16]>;

impl<'a> Vm<'a> {
    pub fn new(unit: &'a CompiledUnitType, state: &'a mut InstanceState) -> Self {
        Self { unit, state }
    }

    /// Run a routine to completion. Void routines return [`Slot::Unset`].
    pub fn run(&mut self, routine: &Routine, args: Vec<Slot>) -> Result<Slot> {
        if args.len() != routine.param_count() {
            return Err(Error::internal(format!(
                "{} expects {} argument(s), got {}",
                routine.name(),
                routine.param_count(),
                args.len()
            )));
        }
        let mut locals = args;
        locals.resize(routine.local_count().max(routine.param_count()), Slot::Unset);

        let ops = routine.ops();
        let mut stack = Stack::new();
        let mut pc = 0usize;

        while let Some(op) = ops.get(pc) {
            pc += 1;
            match op {
                Op::Const(index) => {
                    let constant = self
                        .unit
                        .constant(*index)
                        .ok_or_else(|| Error::internal(format!("constant {} out of range", index)))?;
                    stack.push(constant.clone());
                }
                Op::Null => stack.push(Slot::null()),
                Op::True => stack.push(Slot::Value(Value::Boolean(true))),
                Op::False => stack.push(Slot::Value(Value::Boolean(false))),

                Op::LoadLocal(index) => {
                    let slot = locals
                        .get(*index as usize)
                        .ok_or_else(|| Error::internal(format!("local {} out of range", index)))?;
                    stack.push(slot.clone());
                }
                Op::StoreLocal(index) => {
                    let value = pop(&mut stack)?;
                    let slot = locals
                        .get_mut(*index as usize)
                        .ok_or_else(|| Error::internal(format!("local {} out of range", index)))?;
                    *slot = value;
                }
                Op::LoadField(index) => {
                    let slot = self.load_field(*index as usize)?;
                    stack.push(slot);
                }
                Op::StoreField(index) => {
                    let value = pop(&mut stack)?;
                    let slot = self
                        .state
                        .fields
                        .get_mut(*index as usize)
                        .ok_or_else(|| Error::internal(format!("field {} out of range", index)))?;
                    *slot = value;
                }
                Op::Pop => {
                    pop(&mut stack)?;
                }

                Op::Add | Op::Sub | Op::Mul | Op::Div | Op::Rem => {
                    let right = pop_value(&mut stack)?;
                    let left = pop_value(&mut stack)?;
                    let result = match op {
                        Op::Add => left.add(&right),
                        Op::Sub => left.sub(&right),
                        Op::Mul => left.mul(&right),
                        Op::Div => left.div(&right),
                        _ => left.rem(&right),
                    }?;
                    stack.push(Slot::Value(result));
                }
                Op::Neg => {
                    let operand = pop_value(&mut stack)?;
                    stack.push(Slot::Value(operand.neg()?));
                }
                Op::Not => {
                    let operand = pop_bool(&mut stack, "operator !")?;
                    stack.push(Slot::Value(Value::Boolean(!operand)));
                }

                Op::Eq | Op::Ne => {
                    let right = pop(&mut stack)?;
                    let left = pop(&mut stack)?;
                    let equal = slots_equal(&left, &right)?;
                    stack.push(Slot::Value(Value::Boolean(equal == (*op == Op::Eq))));
                }
                Op::Lt | Op::Le | Op::Gt | Op::Ge => {
                    let mode = match op {
                        Op::Lt => ComparisonMode::LessThan,
                        Op::Le => ComparisonMode::LessThanOrEqual,
                        Op::Gt => ComparisonMode::GreaterThan,
                        _ => ComparisonMode::GreaterThanOrEqual,
                    };
                    let right = pop_value(&mut stack)?;
                    let left = pop_value(&mut stack)?;
                    stack.push(Slot::Value(Value::Boolean(left.compare(mode, &right)?)));
                }

                Op::Jump(target) => pc = *target as usize,
                Op::JumpIfFalse(target) => {
                    if !pop_bool(&mut stack, "condition")? {
                        pc = *target as usize;
                    }
                }
                Op::JumpIfTrue(target) => {
                    if pop_bool(&mut stack, "condition")? {
                        pc = *target as usize;
                    }
                }
                Op::Return => return pop(&mut stack),
                Op::ReturnVoid => return Ok(Slot::Unset),
                Op::MissingReturn => {
                    return Err(Error::internal(format!(
                        "{} ended without returning a value",
                        routine.name()
                    )))
                }

                Op::Cast(target) => {
                    let operand = pop(&mut stack)?;
                    stack.push(cast(operand, target)?);
                }
                Op::Call(method, argc) => {
                    let split = stack
                        .len()
                        .checked_sub(*argc as usize)
                        .ok_or_else(|| Error::internal("stack underflow"))?;
                    let args: Stack = stack.drain(split..).collect();
                    let receiver = pop(&mut stack)?;
                    stack.push(call(*method, receiver, &args)?);
                }
                Op::Getter(name) => {
                    let field = self
                        .unit
                        .name_at(*name)
                        .ok_or_else(|| Error::internal(format!("name {} out of range", name)))?;
                    let target = pop_value(&mut stack)?;
                    let value = match &target {
                        Value::Object(object) => object.require_field(field)?.clone(),
                        Value::Null => {
                            return Err(Error::null_operand(format!("getter for '{}'", field)))
                        }
                        other => {
                            return Err(Error::type_mismatch(
                                "OBJECT",
                                other.data_type().to_string(),
                            ))
                        }
                    };
                    stack.push(Slot::Value(value));
                }
                Op::NewRow(count) => {
                    let split = stack
                        .len()
                        .checked_sub(*count as usize)
                        .ok_or_else(|| Error::internal("stack underflow"))?;
                    let values = stack
                        .drain(split..)
                        .map(into_value)
                        .collect::<Result<Vec<_>>>()?;
                    stack.push(Slot::Row(Row::from_values(values)));
                }
                Op::CreateIterator => {
                    let partitions = pop(&mut stack)?;
                    let map = pop(&mut stack)?;
                    match (map, partitions) {
                        (Slot::Handle(Handle::Map(map)), Slot::Handle(Handle::Partitions(parts))) => {
                            let iterator = MapScanIterator::new(map, &parts);
                            stack.push(Slot::Handle(Handle::Iterator(Arc::new(Mutex::new(iterator)))));
                        }
                        (map, parts) => {
                            return Err(null_or_internal(
                                &[&map, &parts],
                                "MapScanUtils.createIterator",
                            ))
                        }
                    }
                }
                Op::ClearBatch => self.state.batch.clear(),
                Op::AddToBatch => match pop(&mut stack)? {
                    Slot::Row(row) => {
                        let has_room = self.state.batch.add(row);
                        stack.push(Slot::Value(Value::Boolean(has_room)));
                    }
                    other => return Err(null_or_internal(&[&other], "addToBatch")),
                },
            }
        }

        Err(Error::internal(format!("{} ran past its last instruction", routine.name())))
    }

    fn load_field(&self, index: usize) -> Result<Slot> {
        match self.state.fields.get(index) {
            Some(Slot::Unset) => {
                let name = self
                    .unit
                    .fields()
                    .get(index)
                    .map(|f| f.name.as_str())
                    .unwrap_or("?");
                Err(Error::binding(format!(
                    "field '{}' of {} read before it was bound",
                    name,
                    self.unit.name()
                )))
            }
            Some(slot) => Ok(slot.clone()),
            None => Err(Error::internal(format!("field {} out of range", index))),
        }
    }
}

fn pop(stack: &mut Stack) -> Result<Slot> {
    stack.pop().ok_or_else(|| Error::internal("stack underflow"))
}

fn into_value(slot: Slot) -> Result<Value> {
    match slot {
        Slot::Value(value) => Ok(value),
        other => Err(Error::internal(format!("expected a value, found {}", other.kind_name()))),
    }
}

fn pop_value(stack: &mut Stack) -> Result<Value> {
    into_value(pop(stack)?)
}

fn pop_bool(stack: &mut Stack, what: &str) -> Result<bool> {
    match pop_value(stack)? {
        Value::Boolean(b) => Ok(b),
        Value::Null => Err(Error::null_operand(what.to_string())),
        other => Err(Error::type_mismatch("BOOLEAN", other.data_type().to_string())),
    }
}

fn is_null(slot: &Slot) -> bool {
    matches!(slot, Slot::Value(Value::Null))
}

/// Null receivers surface as null operands, anything else is a lowering bug
fn null_or_internal(slots: &[&Slot], what: &str) -> Error {
    if slots.iter().any(|s| is_null(s)) {
        Error::null_operand(what.to_string())
    } else {
        let kinds: Vec<_> = slots.iter().map(|s| s.kind_name()).collect();
        Error::internal(format!("{} applied to {}", what, kinds.join(", ")))
    }
}

/// Reference equality for handles, value equality for SQL values
fn slots_equal(left: &Slot, right: &Slot) -> Result<bool> {
    match (left, right) {
        (Slot::Value(Value::Null), Slot::Value(Value::Null)) => Ok(true),
        (Slot::Value(Value::Null), _) | (_, Slot::Value(Value::Null)) => Ok(false),
        (Slot::Value(l), Slot::Value(r)) => {
            if l.data_type() != r.data_type() {
                return Ok(false);
            }
            l.compare(ComparisonMode::Equals, r)
        }
        (Slot::Iteration(l), Slot::Iteration(r)) => Ok(l == r),
        (l, r) => Err(Error::internal(format!(
            "cannot compare {} with {}",
            l.kind_name(),
            r.kind_name()
        ))),
    }
}

fn cast(operand: Slot, target: &CastTarget) -> Result<Slot> {
    match (target, operand) {
        (CastTarget::Scalar(data_type), Slot::Value(value)) => {
            Ok(Slot::Value(data_type.convert(&value)?))
        }
        (CastTarget::Object(Some(class)), Slot::Value(value)) => {
            value.expect_class(class)?;
            Ok(Slot::Value(value))
        }
        (CastTarget::Object(None), Slot::Value(value)) => match value {
            Value::Null | Value::Object(_) => Ok(Slot::Value(value)),
            other => Err(Error::type_mismatch(
                DataType::Object.to_string(),
                other.data_type().to_string(),
            )),
        },
        (CastTarget::Exec(kind), Slot::Handle(Handle::Exec { id, state })) => {
            if state.kind_name() != kind.name() {
                return Err(Error::binding(format!(
                    "executor {} is a {}, not a {}",
                    id,
                    state.kind_name(),
                    kind.name()
                )));
            }
            Ok(Slot::Handle(Handle::Exec { id, state }))
        }
        (CastTarget::Exec(_), slot) if is_null(&slot) => Ok(slot),
        (target, slot) => Err(Error::internal(format!(
            "cannot cast {} to {:?}",
            slot.kind_name(),
            target
        ))),
    }
}

fn int_arg(args: &[Slot], what: &str) -> Result<i32> {
    match args.first() {
        Some(Slot::Value(Value::Int(i))) => Ok(*i),
        Some(Slot::Value(Value::Null)) => Err(Error::null_operand(what.to_string())),
        _ => Err(Error::internal(format!("{} expects an Int argument", what))),
    }
}

fn list_get<T: Clone>(items: &[T], index: i32) -> Result<T> {
    usize::try_from(index)
        .ok()
        .and_then(|i| items.get(i))
        .cloned()
        .ok_or(Error::ColumnOutOfBounds {
            index: index.max(0) as usize,
            len: items.len(),
        })
}

fn size_of(len: usize) -> Result<Slot> {
    let size = i32::try_from(len).map_err(|_| Error::overflow(format!("size {} exceeds INT", len)))?;
    Ok(Slot::Value(Value::Int(size)))
}

fn call(method: MethodId, receiver: Slot, args: &[Slot]) -> Result<Slot> {
    let what = method.name();
    if is_null(&receiver) {
        return Err(Error::null_operand(format!("receiver of {}()", what)));
    }

    let result = match (method, &receiver) {
        (MethodId::ExecId, Slot::Handle(Handle::Exec { id, .. })) => Slot::Value(Value::Int(*id)),

        (_, Slot::Handle(Handle::Exec { state: ExecState::MapScan(scan), .. })) => {
            let handle = match method {
                MethodId::ScanMap => Handle::Map(scan.map.clone()),
                MethodId::ScanPartitions => Handle::Partitions(scan.partitions.clone()),
                MethodId::ScanKeyDescriptor => Handle::Descriptor(scan.key_descriptor.clone()),
                MethodId::ScanValueDescriptor => Handle::Descriptor(scan.value_descriptor.clone()),
                MethodId::ScanFieldPaths => Handle::Paths(scan.field_paths.clone()),
                MethodId::ScanFieldTypes => Handle::Types(scan.field_types.clone()),
                MethodId::ScanProjects => Handle::Indexes(scan.projects.clone()),
                MethodId::ScanFilter => match &scan.filter {
                    Some(filter) => Handle::Expression(filter.clone()),
                    None => return Ok(Slot::null()),
                },
                _ => return Err(null_or_internal(&[&receiver], what)),
            };
            Slot::Handle(handle)
        }
        (MethodId::FilterCondition, Slot::Handle(Handle::Exec { state: ExecState::Filter(filter), .. })) => {
            Slot::Handle(Handle::Expression(filter.condition.clone()))
        }
        (
            MethodId::ProjectExpressions,
            Slot::Handle(Handle::Exec { state: ExecState::Project(project), .. }),
        ) => Slot::Handle(Handle::Expressions(project.projects.clone())),

        (MethodId::ListGet, Slot::Handle(list)) => {
            let index = int_arg(args, what)?;
            match list {
                Handle::Paths(paths) => Slot::Handle(Handle::QueryPath(list_get(paths, index)?)),
                Handle::Types(types) => Slot::Handle(Handle::DataType(list_get(types, index)?)),
                Handle::Indexes(indexes) => {
                    let i = list_get(indexes, index)?;
                    let i = i32::try_from(i)
                        .map_err(|_| Error::overflow(format!("index {} exceeds INT", i)))?;
                    Slot::Value(Value::Int(i))
                }
                Handle::Expressions(exprs) => {
                    Slot::Handle(Handle::Expression(list_get(exprs, index)?))
                }
                _ => return Err(null_or_internal(&[&receiver], what)),
            }
        }
        (MethodId::ListSize, Slot::Handle(list)) => match list {
            Handle::Paths(paths) => size_of(paths.len())?,
            Handle::Types(types) => size_of(types.len())?,
            Handle::Indexes(indexes) => size_of(indexes.len())?,
            Handle::Expressions(exprs) => size_of(exprs.len())?,
            _ => return Err(null_or_internal(&[&receiver], what)),
        },

        (MethodId::TryAdvance, Slot::Handle(Handle::Iterator(iterator))) => {
            Slot::Value(Value::Boolean(iterator.lock().try_advance()))
        }
        (MethodId::IteratorKey, Slot::Handle(Handle::Iterator(iterator))) => {
            Slot::Value(iterator.lock().key()?)
        }
        (MethodId::IteratorValue, Slot::Handle(Handle::Iterator(iterator))) => {
            Slot::Value(iterator.lock().value()?)
        }

        (MethodId::Eval, Slot::Handle(Handle::Expression(expression))) => match args.first() {
            Some(Slot::Row(row)) => Slot::Value(expression.eval(row)?),
            Some(other) => return Err(null_or_internal(&[other], what)),
            None => return Err(Error::internal("eval expects a row")),
        },

        (MethodId::RowGet, Slot::Row(row)) => {
            let index = int_arg(args, what)?;
            let value = usize::try_from(index)
                .ok()
                .and_then(|i| row.get(i))
                .cloned()
                .ok_or(Error::ColumnOutOfBounds {
                    index: index.max(0) as usize,
                    len: row.len(),
                })?;
            Slot::Value(value)
        }
        (MethodId::RowSize, Slot::Row(row)) => size_of(row.len())?,

        _ => return Err(null_or_internal(&[&receiver], what)),
    };
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::script::{lower::lower, parser::parse};
    use crate::executor::{FilterState, IterationResult};
    use crate::expression::Expression;

    fn unit_with(fields: &str, prepare: &str, advance: &str) -> CompiledUnitType {
        let source = format!(
            "module sql.compiled;\n\
             import sql.exec;\n\
             import sql.row;\n\
             import sql.expression;\n\
             unit U extends CompiledExec {{\n\
             {}\n\
             new() {{ super(3, [3]); }}\n\
             fn prepare(exec: Exec) {{\n{}\n}}\n\
             fn setup(ctx: FragmentContext) {{ }}\n\
             fn advance() -> IterationResult {{\n{}\n}}\n}}\n",
            fields, prepare, advance
        );
        lower(&parse(&source).unwrap(), "sql.compiled.U").unwrap()
    }

    fn run_advance(unit: &CompiledUnitType, state: &mut InstanceState) -> Result<Slot> {
        Vm::new(unit, state).run(unit.advance_routine(), vec![])
    }

    #[test]
    fn test_loop_fills_batch() {
        let unit = unit_with(
            "",
            "",
            "this.clearBatch();\n\
             let i: Int = 0;\n\
             while (i < 5) {\n\
               i = i + 1;\n\
               if (i % 2 == 0) { continue; }\n\
               if (!this.addToBatch(HeapRow.of(i, (i as BigInt) * 10L))) { return IterationResult.FETCHED; }\n\
             }\n\
             return IterationResult.FETCHED_DONE;",
        );
        let mut state = InstanceState::new(&unit, 16);
        let result = run_advance(&unit, &mut state).unwrap();
        assert!(matches!(result, Slot::Iteration(IterationResult::FetchedDone)));
        let firsts: Vec<_> = state.batch().rows().iter().map(|r| r[0].clone()).collect();
        assert_eq!(firsts, vec![Value::Int(1), Value::Int(3), Value::Int(5)]);
    }

    #[test]
    fn test_batch_full_returns_fetched() {
        let unit = unit_with(
            "",
            "",
            "let i: Int = 0;\n\
             while (true) {\n\
               i = i + 1;\n\
               if (!this.addToBatch(HeapRow.of(i))) { return IterationResult.FETCHED; }\n\
             }\n\
             return IterationResult.FETCHED_DONE;",
        );
        let mut state = InstanceState::new(&unit, 2);
        let result = run_advance(&unit, &mut state).unwrap();
        assert!(matches!(result, Slot::Iteration(IterationResult::Fetched)));
        assert_eq!(state.batch().len(), 2);
    }

    #[test]
    fn test_locals_past_u16_range_stay_distinct() {
        let mut body = String::new();
        for i in 0..70_000 {
            body.push_str(&format!("let v{}: Int = {};\n", i, i));
        }
        body.push_str(
            "this.addToBatch(HeapRow.of(v0, v65536, v69999));\n\
             return IterationResult.FETCHED_DONE;",
        );
        let unit = unit_with("", "", &body);
        let mut state = InstanceState::new(&unit, 4);
        run_advance(&unit, &mut state).unwrap();
        assert_eq!(
            state.batch().rows()[0].values(),
            &[Value::Int(0), Value::Int(65_536), Value::Int(69_999)]
        );
    }

    #[test]
    fn test_null_aware_equality_and_ternary() {
        let unit = unit_with(
            "",
            "",
            "let a: Int = null;\n\
             let b: Int = 4;\n\
             let c: Int = (a == null || b == null) ? null : (a + b);\n\
             let d: Boolean = (a == null) ? null : true;\n\
             this.addToBatch(HeapRow.of(c, d, a == b, b == 4));\n\
             return IterationResult.FETCHED_DONE;",
        );
        let mut state = InstanceState::new(&unit, 4);
        run_advance(&unit, &mut state).unwrap();
        let row = &state.batch().rows()[0];
        assert_eq!(
            row.values(),
            &[Value::Null, Value::Null, Value::Boolean(false), Value::Boolean(true)]
        );
    }

    #[test]
    fn test_runtime_errors() {
        let overflow = unit_with(
            "",
            "",
            "let a: Int = 2147483647;\nlet b: Int = a + 1;\nreturn IterationResult.FETCHED_DONE;",
        );
        let mut state = InstanceState::new(&overflow, 1);
        assert!(matches!(
            run_advance(&overflow, &mut state),
            Err(Error::ArithmeticOverflow(_))
        ));

        let cast = unit_with(
            "",
            "",
            "let v: Value = 3;\nlet b: Boolean = (v as Boolean);\nreturn IterationResult.FETCHED_DONE;",
        );
        let mut state = InstanceState::new(&cast, 1);
        assert_eq!(
            run_advance(&cast, &mut state).unwrap_err(),
            Error::type_mismatch("BOOLEAN", "INT")
        );
    }

    #[test]
    fn test_unbound_field_is_binding_error() {
        let unit = unit_with(
            "field cond: Expression;",
            "",
            "let r: Row = HeapRow.of(1);\nlet v: Value = this.cond.eval(r);\nreturn IterationResult.FETCHED_DONE;",
        );
        let mut state = InstanceState::new(&unit, 1);
        assert!(matches!(run_advance(&unit, &mut state), Err(Error::Binding(_))));
    }

    #[test]
    fn test_prepare_binds_exec_state() {
        let unit = unit_with(
            "field cond: Expression;",
            "if (exec.id() == 7) {\n\
               let f: FilterExec = (exec as FilterExec);\n\
               this.cond = f.condition();\n\
             }",
            "let v: Value = this.cond.eval(HeapRow.of(5));\n\
             this.addToBatch(HeapRow.of(v));\n\
             return IterationResult.FETCHED_DONE;",
        );
        let condition = Expression::is_null(Expression::column(0, DataType::Int));
        let exec = Slot::Handle(Handle::Exec {
            id: 7,
            state: ExecState::Filter(Arc::new(FilterState {
                condition: Arc::new(condition),
            })),
        });
        let mut state = InstanceState::new(&unit, 1);
        Vm::new(&unit, &mut state)
            .run(unit.prepare_routine(), vec![exec])
            .unwrap();
        run_advance(&unit, &mut state).unwrap();
        assert_eq!(state.batch().rows()[0][0], Value::Boolean(false));

        let wrong = Slot::Handle(Handle::Exec {
            id: 7,
            state: ExecState::Opaque,
        });
        let mut state = InstanceState::new(&unit, 1);
        let err = Vm::new(&unit, &mut state)
            .run(unit.prepare_routine(), vec![wrong])
            .unwrap_err();
        assert!(matches!(err, Error::Binding(_)));
    }
}
