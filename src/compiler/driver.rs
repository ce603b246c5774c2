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

//! Compiler driver
//!
//! Turns one [`Fragment`] into a complete unit:
//!
//! ```text
//! module sql.compiled;
//!
//! import sql.exec;
//! ...
//!
//! unit CompiledExec_<hash> extends CompiledExec {
//!     field _1_map_scan_map: MapContainer;
//!     ...
//!     new() { super(<primary>, [<subsumed>]); }
//!     fn prepare(exec: Exec) { ...one guarded block per subsumed node... }
//!     fn setup(ctx: FragmentContext) { ...setup code... }
//!     fn advance() -> IterationResult { ...row loop... }
//! }
//! ```
//!
//! The unit name is the FxHash of the source emitted under a placeholder
//! name, so structurally identical fragments produce identical text.

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use rustc_hash::FxHasher;

use super::codegen::emit_advance;
use super::emitter::{cast, invoke, static_member, EmitableRoutine, EmitableUnit};
use super::partition::Fragment;
use super::script::{self, CompiledUnitType};
use super::symbols;
use super::variable::StateRegistry;
use crate::core::Result;
use crate::plan::PlanNode;

const PLACEHOLDER_NAME: &str = "CompiledExec_0000000000000000";

/// Source text of a generated unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedUnit {
    pub name: String,
    pub qualified_name: String,
    pub source: String,
}

/// Output of compiling one fragment
#[derive(Debug, Clone)]
pub struct CompilerResult {
    /// Plan node the unit replaces
    pub node: Arc<PlanNode>,
    pub unit: Arc<CompiledUnitType>,
    /// Generated source, kept for diagnostics
    pub source: String,
}

pub struct FragmentCompiler<'a> {
    fragment: &'a Fragment,
    log_source: bool,
}

impl<'a> FragmentCompiler<'a> {
    pub fn new(fragment: &'a Fragment) -> Self {
        Self {
            fragment,
            log_source: false,
        }
    }

    /// Trace generated source at `TRACE` level
    pub fn with_log_source(mut self, log_source: bool) -> Self {
        self.log_source = log_source;
        self
    }

    /// Emit the unit source
    pub fn generate(&self) -> Result<GeneratedUnit> {
        let mut unit = self.build_unit()?;
        let placeholder = unit.emit();

        let mut hasher = FxHasher::default();
        placeholder.hash(&mut hasher);
        unit.set_name(format!("{}{:016x}", symbols::UNIT_NAME_PREFIX, hasher.finish()));

        let source = unit.emit();
        if self.log_source {
            tracing::trace!(unit = %unit.qualified_name(), "generated source:\n{}", source);
        }
        Ok(GeneratedUnit {
            name: unit.name().to_string(),
            qualified_name: unit.qualified_name(),
            source,
        })
    }

    /// Emit and compile the unit
    #[tracing::instrument(level = "debug", skip(self), fields(primary_id = self.fragment.primary_id()))]
    pub fn compile(&self) -> Result<CompilerResult> {
        let generated = self.generate()?;
        let unit = compile_generated(&generated)?;
        Ok(CompilerResult {
            node: Arc::clone(self.fragment.node()),
            unit,
            source: generated.source,
        })
    }

    fn build_unit(&self) -> Result<EmitableUnit> {
        let root = self.fragment.root();
        let nodes = root.post_order();

        let mut state = StateRegistry::new();
        for node in &nodes {
            node.generator().declare(&mut state)?;
        }

        let mut unit = EmitableUnit::new(symbols::UNIT_MODULE, PLACEHOLDER_NAME, symbols::BASE_UNIT);
        for variable in state.variables() {
            unit.add_field(&variable.name(), variable.type_name())?;
        }
        unit.add_routine(self.constructor());
        unit.add_routine(prepare_routine(&state));
        unit.add_routine(setup_routine(&state));

        let mut advance = EmitableRoutine::method(
            symbols::ROUTINE_ADVANCE,
            Some(symbols::TYPE_ITERATION_RESULT),
        );
        advance.line(format!("{};", invoke("this", symbols::METHOD_CLEAR_BATCH, &[])));
        emit_advance(&mut advance, root)?;
        let done = static_member(
            &mut advance,
            symbols::TYPE_ITERATION_RESULT,
            symbols::ITERATION_FETCHED_DONE,
        );
        advance.line(format!("return {};", done));
        unit.add_routine(advance);
        Ok(unit)
    }

    fn constructor(&self) -> EmitableRoutine {
        let ids = self
            .fragment
            .subsumed_ids()
            .iter()
            .map(i32::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        let mut routine = EmitableRoutine::constructor();
        routine.line(format!("super({}, [{}]);", self.fragment.primary_id(), ids));
        routine
    }
}

/// One `if (exec.id() == N)` block per subsumed node, each binding only the
/// fields that node owns
fn prepare_routine(state: &StateRegistry) -> EmitableRoutine {
    let mut routine = EmitableRoutine::method(symbols::ROUTINE_PREPARE, None)
        .with_param(symbols::PARAM_EXEC, symbols::TYPE_EXEC);
    for &(node_id, exec_type) in state.nodes() {
        let exec_local = format!("exec_{}", node_id);
        routine.line(format!(
            "if ({} == {}) {{",
            invoke(symbols::PARAM_EXEC, symbols::METHOD_ID, &[]),
            node_id
        ));
        routine.indent();
        routine.use_type(exec_type);
        routine.line(format!(
            "let {}: {} = {};",
            exec_local,
            exec_type,
            cast(symbols::PARAM_EXEC, exec_type)
        ));
        for variable in state.variables_of(node_id) {
            if let Some(prepare) = variable.prepare() {
                prepare(&mut routine, &variable.name(), &exec_local);
            }
        }
        routine.dedent();
        routine.line("}");
    }
    routine
}

fn setup_routine(state: &StateRegistry) -> EmitableRoutine {
    let mut routine = EmitableRoutine::method(symbols::ROUTINE_SETUP, None)
        .with_param(symbols::PARAM_CTX, symbols::TYPE_FRAGMENT_CONTEXT);
    for variable in state.variables() {
        if let Some(setup) = variable.setup() {
            setup(&mut routine, &variable.name());
        }
    }
    routine
}

/// Run the embedded compiler over generated source
pub fn compile_generated(generated: &GeneratedUnit) -> Result<Arc<CompiledUnitType>> {
    let unit = script::compile(&generated.source, &generated.qualified_name)?;
    tracing::debug!(unit = %generated.qualified_name, "compiled fragment unit");
    Ok(Arc::new(unit))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::partition::partition;
    use crate::core::DataType;
    use crate::expression::Expression;
    use crate::plan::{
        FilterNode, MapScanNode, PlanBuilder, PlanNodeKind, PlanTree, QueryPath,
        TopObjectDescriptor,
    };

    fn plan() -> PlanTree {
        let mut b = PlanBuilder::new();
        b.add(
            1,
            PlanNodeKind::MapScan(MapScanNode {
                map_name: "m".to_string(),
                key_descriptor: TopObjectDescriptor::Scalar(DataType::Int),
                value_descriptor: TopObjectDescriptor::class("Point"),
                field_paths: vec![QueryPath::key(), QueryPath::value_field("x")],
                field_types: vec![DataType::Int, DataType::Int],
                projects: vec![1],
                filter: None,
            }),
            &[],
        )
        .unwrap();
        b.add(
            2,
            PlanNodeKind::Filter(FilterNode {
                condition: Expression::not(Expression::is_null(Expression::column(
                    0,
                    DataType::Int,
                ))),
            }),
            &[1],
        )
        .unwrap();
        b.add(3, PlanNodeKind::Root, &[2]).unwrap();
        b.build(3).unwrap()
    }

    #[test]
    fn test_generated_unit() {
        let fragments = partition(&plan()).unwrap();
        let generated = fragments[0].generate().unwrap();
        assert!(generated.name.starts_with("CompiledExec_"));
        assert_eq!(generated.name.len(), "CompiledExec_".len() + 16);
        assert_eq!(
            generated.qualified_name,
            format!("sql.compiled.{}", generated.name)
        );

        let source = &generated.source;
        assert!(source.contains("super(2, [1, 2]);"));
        assert!(source.contains("    fn prepare(exec: Exec) {\n        if (exec.id() == 1) {\n            let exec_1: MapScanExec = (exec as MapScanExec);\n            this._1_map_scan_map = exec_1.map();"));
        assert!(source.contains("if (exec.id() == 2) {"));
        assert!(source.contains("this._2_filter_condition = exec_2.condition();"));
        assert!(source.contains("// NODE START: 1 (MapScan)"));
        assert!(source.contains("// NODE START: 2 (NonTerminal)"));
        assert!(source.contains("return IterationResult.FETCHED_DONE;\n    }\n}\n"));
    }

    #[test]
    fn test_generation_is_deterministic() {
        let first = partition(&plan()).unwrap()[0].generate().unwrap();
        let second = partition(&plan()).unwrap()[0].generate().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_generated_source_compiles() {
        let fragments = partition(&plan()).unwrap();
        let result = fragments[0].compile().unwrap();
        assert_eq!(result.node.id(), 2);
        assert_eq!(result.unit.primary_id(), 2);
        assert_eq!(&result.unit.subsumed_ids()[..], &[1, 2]);
        assert!(result.source.contains(result.unit.name()));
    }
}
