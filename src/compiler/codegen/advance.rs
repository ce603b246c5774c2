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

// Body of the advance routine
//
// The fragment is a chain: one scan leaf, then filters and projections, then
// the non-terminal adapter. Row starts are emitted leaf first so each
// generator sees its upstream's locals; row ends close the scopes in reverse.

use super::GeneratorNode;
use crate::compiler::emitter::EmitableRoutine;
use crate::core::{Error, Result};

pub fn emit_advance(routine: &mut EmitableRoutine, root: &GeneratorNode) -> Result<()> {
    let nodes = root.post_order();
    if let Some(branch) = nodes.iter().find(|n| n.children().len() > 1) {
        return Err(Error::plan_invariant(format!(
            "compiled fragment branches at node {}",
            branch.node_id()
        )));
    }

    let mut locals = None;
    for node in &nodes {
        let generator = node.generator();
        routine.line(format!(
            "// NODE START: {} ({})",
            node.node_id(),
            generator.kind_name()
        ));
        locals = generator.row_start(routine, locals.as_deref())?;
    }
    if locals.is_some() {
        return Err(Error::internal("fragment output row was not consumed"));
    }

    for node in nodes.iter().rev() {
        node.generator().row_end(routine);
        routine.line(format!("// NODE END  : {}", node.node_id()));
    }
    Ok(())
}
