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

//! Compiled-unit runtime
//!
//! A [`CompiledFragmentTemplate`] owns the loaded unit types of one plan.
//! Each execution instantiates a [`CompiledFragment`]: a fresh
//! [`CompiledExec`] per unit, addressable by every node id the unit
//! subsumes.

pub mod compiled_exec;
pub mod template;

pub use compiled_exec::CompiledExec;
pub use template::{CompiledFragment, CompiledFragmentTemplate};

pub use super::script::CompiledUnitType;
