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

//! Executor instance of a compiled unit

use std::sync::Arc;

use rustc_hash::FxHashSet;

use crate::compiler::script::{CompiledUnitType, Handle, InstanceState, Routine, Slot, Vm};
use crate::core::{Error, Result, Row};
use crate::executor::{Exec, FragmentContext, IterationResult};

/// One execution's instance of a compiled unit.
///
/// Lifecycle: `prepare` once for every subsumed node, then `setup` per
/// execution attempt, then `advance` until it returns `FetchedDone`. Calls
/// out of order fail with [`Error::Binding`], so a partially bound unit never
/// processes rows.
pub struct CompiledExec {
    unit: Arc<CompiledUnitType>,
    state: InstanceState,
    bound: FxHashSet<i32>,
    armed: bool,
}

impl CompiledExec {
    pub fn new(unit: Arc<CompiledUnitType>, batch_size: usize) -> Self {
        let state = InstanceState::new(&unit, batch_size);
        Self {
            unit,
            state,
            bound: FxHashSet::default(),
            armed: false,
        }
    }

    pub fn unit(&self) -> &Arc<CompiledUnitType> {
        &self.unit
    }

    pub fn primary_id(&self) -> i32 {
        self.unit.primary_id()
    }

    pub fn subsumes(&self, node_id: i32) -> bool {
        self.unit.subsumed_ids().contains(&node_id)
    }

    /// True once every subsumed node has been prepared
    pub fn is_bound(&self) -> bool {
        self.unit
            .subsumed_ids()
            .iter()
            .all(|id| self.bound.contains(id))
    }

    /// Bind the state of one subsumed interpreted executor
    pub fn prepare(&mut self, exec: &dyn Exec) -> Result<()> {
        let id = exec.id();
        if !self.subsumes(id) {
            return Err(Error::binding(format!(
                "node {} is not subsumed by {}",
                id,
                self.unit.name()
            )));
        }
        if self.bound.contains(&id) {
            return Err(Error::binding(format!(
                "node {} already bound to {}",
                id,
                self.unit.name()
            )));
        }
        let handle = Handle::Exec {
            id,
            state: exec.state(),
        };
        self.run(RoutineKind::Prepare, vec![Slot::Handle(handle)])?;
        self.bound.insert(id);
        Ok(())
    }

    fn run(&mut self, kind: RoutineKind, args: Vec<Slot>) -> Result<Slot> {
        let unit = Arc::clone(&self.unit);
        let routine: &Routine = match kind {
            RoutineKind::Prepare => unit.prepare_routine(),
            RoutineKind::Setup => unit.setup_routine(),
            RoutineKind::Advance => unit.advance_routine(),
        };
        Vm::new(&unit, &mut self.state).run(routine, args)
    }
}

#[derive(Clone, Copy)]
enum RoutineKind {
    Prepare,
    Setup,
    Advance,
}

impl Exec for CompiledExec {
    fn id(&self) -> i32 {
        self.unit.primary_id()
    }

    fn setup(&mut self, ctx: &FragmentContext) -> Result<()> {
        if let Some(missing) = self
            .unit
            .subsumed_ids()
            .iter()
            .find(|id| !self.bound.contains(id))
        {
            return Err(Error::binding(format!(
                "node {} of {} was never prepared",
                missing,
                self.unit.name()
            )));
        }
        ctx.check_cancelled()?;
        self.armed = false;
        self.run(RoutineKind::Setup, vec![Slot::Handle(Handle::Context(ctx.clone()))])?;
        self.armed = true;
        Ok(())
    }

    fn advance(&mut self) -> Result<IterationResult> {
        if !self.armed {
            return Err(Error::binding(format!(
                "{} advanced before setup",
                self.unit.name()
            )));
        }
        match self.run(RoutineKind::Advance, Vec::new())? {
            Slot::Iteration(result) => Ok(result),
            other => Err(Error::internal(format!(
                "advance of {} returned {}",
                self.unit.name(),
                other.kind_name()
            ))),
        }
    }

    fn current_batch(&self) -> Option<&[Row]> {
        self.state.batch().as_current()
    }

    fn is_compiled(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        self.unit.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::script;
    use crate::core::{DataType, Value};
    use crate::executor::{MapScanExec, MapScanState};
    use crate::plan::{QueryPath, TopObjectDescriptor};
    use crate::storage::MapContainer;

    const SOURCE: &str = "module sql.compiled;

import sql.exec;
import sql.row;
import sql.storage;

unit CompiledExec_1 extends CompiledExec {
    field _1_map_scan_map: MapContainer;
    field _1_map_scan_parts: PartitionIdSet;
    field _1_map_scan_record_iterator: MapScanIterator;

    new() {
        super(1, [1]);
    }

    fn prepare(exec: Exec) {
        if (exec.id() == 1) {
            let exec_1: MapScanExec = (exec as MapScanExec);
            this._1_map_scan_map = exec_1.map();
            this._1_map_scan_parts = exec_1.partitions();
        }
    }

    fn setup(ctx: FragmentContext) {
        this._1_map_scan_record_iterator = MapScanUtils.createIterator(this._1_map_scan_map, this._1_map_scan_parts);
    }

    fn advance() -> IterationResult {
        this.clearBatch();
        while (this._1_map_scan_record_iterator.tryAdvance()) {
            let _1_value: Value = this._1_map_scan_record_iterator.value();
            let _1_row: Row = HeapRow.of(_1_value);
            if (!this.addToBatch(_1_row)) {
                return IterationResult.FETCHED;
            }
        }
        return IterationResult.FETCHED_DONE;
    }
}
";

    fn scan_exec(id: i32, entries: i32) -> MapScanExec {
        let mut map = MapContainer::with_partitions("m", 4);
        for i in 0..entries {
            map.put(i, i * 2);
        }
        let map = Arc::new(map);
        let partitions = Arc::new(map.all_partitions());
        MapScanExec::new(
            id,
            MapScanState {
                map,
                partitions,
                key_descriptor: TopObjectDescriptor::Scalar(DataType::Int),
                value_descriptor: TopObjectDescriptor::Scalar(DataType::Int),
                field_paths: vec![QueryPath::value()].into(),
                field_types: vec![DataType::Int].into(),
                projects: vec![0].into(),
                filter: None,
            },
            16,
        )
    }

    fn compiled(batch_size: usize) -> CompiledExec {
        let unit = script::compile(SOURCE, "sql.compiled.CompiledExec_1").unwrap();
        CompiledExec::new(Arc::new(unit), batch_size)
    }

    #[test]
    fn test_lifecycle() {
        let mut exec = compiled(2);
        assert!(exec.is_compiled());
        assert!(!exec.is_bound());
        exec.prepare(&scan_exec(1, 3)).unwrap();
        assert!(exec.is_bound());

        let ctx = FragmentContext::new(1);
        exec.setup(&ctx).unwrap();
        assert_eq!(exec.advance().unwrap(), IterationResult::Fetched);
        assert_eq!(exec.current_batch().unwrap().len(), 2);
        assert_eq!(exec.advance().unwrap(), IterationResult::FetchedDone);
        assert_eq!(exec.current_batch().unwrap().len(), 1);

        // Re-arming restarts the scan
        exec.setup(&ctx).unwrap();
        assert_eq!(exec.advance().unwrap(), IterationResult::Fetched);
        let mut values: Vec<Value> = exec.current_batch().unwrap().iter().map(|r| r[0].clone()).collect();
        values.sort_by_key(|v| v.to_string());
        assert_eq!(values.len(), 2);
    }

    #[test]
    fn test_out_of_order_calls_fail() {
        let mut exec = compiled(4);
        let ctx = FragmentContext::new(1);
        assert!(matches!(exec.setup(&ctx), Err(Error::Binding(_))));
        assert!(matches!(exec.advance(), Err(Error::Binding(_))));

        assert!(matches!(exec.prepare(&scan_exec(2, 1)), Err(Error::Binding(_))));
        exec.prepare(&scan_exec(1, 1)).unwrap();
        assert!(matches!(exec.prepare(&scan_exec(1, 1)), Err(Error::Binding(_))));
    }

    #[test]
    fn test_setup_observes_cancellation() {
        let mut exec = compiled(4);
        exec.prepare(&scan_exec(1, 1)).unwrap();
        let ctx = FragmentContext::new(1);
        ctx.cancel();
        assert!(matches!(exec.setup(&ctx), Err(Error::Cancelled)));
        assert!(matches!(exec.advance(), Err(Error::Binding(_))));
    }
}
