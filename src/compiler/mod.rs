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

//! Fragment compiler
//!
//! Turns runs of compilable plan operators into specialized units:
//!
//! ```text
//! PlanTree ─► FragmentPartitioner ─► Fragment ─► FragmentCompiler ─► source
//!                                                                      │
//! CompiledFragment ◄─ CompiledFragmentTemplate ◄─ CompiledUnitType ◄─ script
//! ```
//!
//! - [`partition`]: splits the plan into maximal compilable fragments
//! - [`codegen`]: one generator per operator kind, emitting declared state
//!   and per-row code
//! - [`expression`]: inline expression code with an interpreted fallback
//! - [`driver`]: assembles a complete unit and names it by content hash
//! - [`script`]: compiles unit source to bytecode and runs it
//! - [`runtime`]: templates and per-execution instances
//! - [`manager`]: cache of compiled unit types and template creation

pub mod codegen;
pub mod config;
pub mod driver;
pub mod emitter;
pub mod expression;
pub mod manager;
pub mod partition;
pub mod runtime;
pub mod script;
pub mod symbols;
pub mod variable;

pub use config::CompilerConfig;
pub use driver::{CompilerResult, FragmentCompiler, GeneratedUnit};
pub use manager::{CacheStats, CompilerManager};
pub use partition::{partition, Fragment, FragmentPartitioner};
pub use runtime::{CompiledExec, CompiledFragment, CompiledFragmentTemplate, CompiledUnitType};
