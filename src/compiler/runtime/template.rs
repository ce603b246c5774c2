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

//! Templates and per-execution fragment instances

use std::sync::Arc;

use rustc_hash::FxHashMap;

use super::compiled_exec::CompiledExec;
use crate::compiler::script::CompiledUnitType;
use crate::core::{Error, Result};
use crate::executor::Exec;

/// Compiled unit types of one plan, shared by all of its executions
#[derive(Debug)]
pub struct CompiledFragmentTemplate {
    units: Vec<Arc<CompiledUnitType>>,
    batch_size: usize,
}

impl CompiledFragmentTemplate {
    /// Fails if two units subsume the same node
    pub fn new(units: Vec<Arc<CompiledUnitType>>, batch_size: usize) -> Result<Self> {
        let mut owners: FxHashMap<i32, usize> = FxHashMap::default();
        for (index, unit) in units.iter().enumerate() {
            for &id in unit.subsumed_ids().iter() {
                if let Some(other) = owners.insert(id, index) {
                    return Err(Error::binding(format!(
                        "node {} is subsumed by both {} and {}",
                        id,
                        units[other].name(),
                        unit.name()
                    )));
                }
            }
        }
        Ok(Self {
            units,
            batch_size: batch_size.max(1),
        })
    }

    pub fn units(&self) -> &[Arc<CompiledUnitType>] {
        &self.units
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// True if some unit covers the node
    pub fn subsumes(&self, node_id: i32) -> bool {
        self.units
            .iter()
            .any(|u| u.subsumed_ids().contains(&node_id))
    }

    /// Fresh instances for one execution
    pub fn instantiate(&self) -> CompiledFragment {
        let mut instances = Vec::with_capacity(self.units.len());
        let mut by_primary = FxHashMap::default();
        let mut by_subsumed = FxHashMap::default();
        for (index, unit) in self.units.iter().enumerate() {
            by_primary.insert(unit.primary_id(), index);
            for &id in unit.subsumed_ids().iter() {
                if id != unit.primary_id() {
                    by_subsumed.insert(id, index);
                }
            }
            instances.push(Some(CompiledExec::new(Arc::clone(unit), self.batch_size)));
        }
        CompiledFragment {
            instances,
            by_primary,
            by_subsumed,
        }
    }
}

/// Compiled instances of one execution
pub struct CompiledFragment {
    /// `None` once handed to the executor graph
    instances: Vec<Option<CompiledExec>>,
    /// Primary node id to the instance replacing it
    by_primary: FxHashMap<i32, usize>,
    /// Other subsumed node ids to the instance owning their prepare code
    by_subsumed: FxHashMap<i32, usize>,
}

impl CompiledFragment {
    fn instance_of(&self, node_id: i32) -> Option<usize> {
        self.by_primary
            .get(&node_id)
            .or_else(|| self.by_subsumed.get(&node_id))
            .copied()
    }

    /// True if a compiled instance covers the node
    pub fn subsumes(&self, node_id: i32) -> bool {
        self.instance_of(node_id).is_some()
    }

    /// True if the node's executor is replaced by a compiled instance
    pub fn is_primary(&self, node_id: i32) -> bool {
        self.by_primary.contains_key(&node_id)
    }

    /// Offer an interpreted executor to the instance subsuming it.
    /// Returns false if no instance covers the executor's node.
    pub fn prepare(&mut self, exec: &dyn Exec) -> Result<bool> {
        let Some(index) = self.instance_of(exec.id()) else {
            return Ok(false);
        };
        let instance = self.instances[index].as_mut().ok_or_else(|| {
            Error::binding(format!(
                "node {} prepared after its compiled unit was taken",
                exec.id()
            ))
        })?;
        instance.prepare(exec)?;
        Ok(true)
    }

    /// Take the instance replacing `node_id`, if the node is a primary id.
    /// The instance must be fully bound.
    pub fn take_top(&mut self, node_id: i32) -> Result<Option<Box<dyn Exec>>> {
        let Some(&index) = self.by_primary.get(&node_id) else {
            return Ok(None);
        };
        let instance = self.instances[index].take().ok_or_else(|| {
            Error::binding(format!("compiled unit for node {} taken twice", node_id))
        })?;
        if !instance.is_bound() {
            return Err(Error::binding(format!(
                "compiled unit {} taken before all of its nodes were prepared",
                instance.name()
            )));
        }
        Ok(Some(Box::new(instance)))
    }

    /// Instances not yet handed out
    pub fn remaining(&self) -> usize {
        self.instances.iter().filter(|i| i.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::script;

    fn unit(name: &str, primary: i32, ids: &[i32]) -> Arc<CompiledUnitType> {
        let ids = ids.iter().map(i32::to_string).collect::<Vec<_>>().join(", ");
        let source = format!(
            "module sql.compiled;

import sql.exec;

unit {name} extends CompiledExec {{
    new() {{
        super({primary}, [{ids}]);
    }}

    fn prepare(exec: Exec) {{
    }}

    fn setup(ctx: FragmentContext) {{
    }}

    fn advance() -> IterationResult {{
        return IterationResult.FETCHED_DONE;
    }}
}}
"
        );
        Arc::new(script::compile(&source, &format!("sql.compiled.{}", name)).unwrap())
    }

    struct Stub(i32);

    impl Exec for Stub {
        fn id(&self) -> i32 {
            self.0
        }
        fn setup(&mut self, _ctx: &crate::executor::FragmentContext) -> Result<()> {
            Ok(())
        }
        fn advance(&mut self) -> Result<crate::executor::IterationResult> {
            Ok(crate::executor::IterationResult::FetchedDone)
        }
        fn current_batch(&self) -> Option<&[crate::core::Row]> {
            None
        }
        fn name(&self) -> &str {
            "Stub"
        }
    }

    #[test]
    fn test_rejects_overlapping_units() {
        let result = CompiledFragmentTemplate::new(vec![unit("A", 2, &[1, 2]), unit("B", 3, &[2, 3])], 8);
        assert!(matches!(result, Err(Error::Binding(_))));
    }

    #[test]
    fn test_instances_are_per_execution() {
        let template = CompiledFragmentTemplate::new(vec![unit("A", 2, &[1, 2])], 0).unwrap();
        assert_eq!(template.batch_size(), 1);
        assert!(template.subsumes(1));
        assert!(!template.subsumes(3));

        let mut fragment = template.instantiate();
        assert!(fragment.subsumes(1));
        assert!(!fragment.is_primary(1));
        assert!(fragment.is_primary(2));
        assert!(!fragment.prepare(&Stub(3)).unwrap());

        // Not bound yet
        assert!(fragment.prepare(&Stub(1)).unwrap());
        assert!(matches!(fragment.take_top(2), Err(Error::Binding(_))));

        let mut fragment = template.instantiate();
        assert!(fragment.take_top(1).unwrap().is_none());
        fragment.prepare(&Stub(1)).unwrap();
        fragment.prepare(&Stub(2)).unwrap();
        let top = fragment.take_top(2).unwrap().unwrap();
        assert!(top.is_compiled());
        assert_eq!(top.id(), 2);
        assert_eq!(fragment.remaining(), 0);
        assert!(matches!(fragment.take_top(2), Err(Error::Binding(_))));
    }
}
