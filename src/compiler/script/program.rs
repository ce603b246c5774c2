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

// Compiled Unit Program
//
// A CompiledUnitType is the loaded form of one source unit:
// - field layout of every instance
// - constant and name pools shared by all routines
// - the three routines of the compiled executor contract

use std::fmt;
use std::sync::Arc;

use super::ops::Op;
use super::slot::Slot;
use super::types::ScriptType;

/// Declared instance field
#[derive(Debug, Clone, PartialEq)]
pub struct FieldInfo {
    pub name: String,
    pub ty: ScriptType,
}

/// Bytecode of one routine
#[derive(Debug, Clone)]
pub struct Routine {
    name: String,
    ops: Vec<Op>,
    /// Parameters occupy the first local slots
    param_count: usize,
    local_count: usize,
}

impl Routine {
    pub fn new(name: impl Into<String>, ops: Vec<Op>, param_count: usize, local_count: usize) -> Self {
        Self {
            name: name.into(),
            ops,
            param_count,
            local_count,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    pub fn param_count(&self) -> usize {
        self.param_count
    }

    pub fn local_count(&self) -> usize {
        self.local_count
    }
}

/// A loaded compiled unit, shared by every instance created from it
#[derive(Debug)]
pub struct CompiledUnitType {
    pub(crate) name: String,
    pub(crate) qualified_name: String,
    pub(crate) primary_id: i32,
    pub(crate) subsumed_ids: Arc<[i32]>,
    pub(crate) fields: Vec<FieldInfo>,
    pub(crate) constants: Vec<Slot>,
    pub(crate) names: Vec<Arc<str>>,
    pub(crate) prepare: Routine,
    pub(crate) setup: Routine,
    pub(crate) advance: Routine,
}

impl CompiledUnitType {
    /// Simple unit name
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn qualified_name(&self) -> &str {
        &self.qualified_name
    }

    /// Id of the plan node the unit replaces
    pub fn primary_id(&self) -> i32 {
        self.primary_id
    }

    /// Every plan node id the unit subsumes, primary included
    pub fn subsumed_ids(&self) -> &Arc<[i32]> {
        &self.subsumed_ids
    }

    pub fn fields(&self) -> &[FieldInfo] {
        &self.fields
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn prepare_routine(&self) -> &Routine {
        &self.prepare
    }

    pub fn setup_routine(&self) -> &Routine {
        &self.setup
    }

    pub fn advance_routine(&self) -> &Routine {
        &self.advance
    }

    pub(crate) fn constant(&self, index: u32) -> Option<&Slot> {
        self.constants.get(index as usize)
    }

    pub(crate) fn name_at(&self, index: u32) -> Option<&Arc<str>> {
        self.names.get(index as usize)
    }
}

impl fmt::Display for CompiledUnitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (primary {}, subsumes {:?})", self.qualified_name, self.primary_id, self.subsumed_ids)
    }
}
