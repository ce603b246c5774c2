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

//! Source emission model
//!
//! Generated units are assembled from primitive commands (content, line
//! breaks, indentation) collected per routine. Routines and fields track the
//! modules they refer to so the unit can emit its import list.
//!
//! The free functions below build the recurring source snippets.

pub mod command;
pub mod routine;
pub mod unit;

pub use command::{Emitter, EmitterCommand, INDENT};
pub use routine::{EmitableRoutine, RoutineKind, RoutineMark};
pub use unit::{EmitableField, EmitableUnit};

/// `this.<field>`
pub fn this_field(name: &str) -> String {
    format!("this.{}", name)
}

/// `<target>.<method>(<args>)`
pub fn invoke(target: &str, method: &str, args: &[&str]) -> String {
    format!("{}.{}({})", target, method, args.join(", "))
}

/// `(<expr> as <type>)`
pub fn cast(expr: &str, type_name: &str) -> String {
    format!("({} as {})", expr, type_name)
}

/// `<Owner>.<method>(<args>)`, importing the owner's module
pub fn invoke_static(
    routine: &mut EmitableRoutine,
    owner: &str,
    method: &str,
    args: &[&str],
) -> String {
    routine.use_symbol(owner);
    invoke(owner, method, args)
}

/// `<Owner>.<MEMBER>`, importing the owner's module
pub fn static_member(routine: &mut EmitableRoutine, owner: &str, member: &str) -> String {
    routine.use_symbol(owner);
    format!("{}.{}", owner, member)
}

/// Source literal for a string
pub fn string_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\0' => out.push_str("\\0"),
            c if c.is_control() => out.push_str(&format!("\\u{{{:x}}}", u32::from(c))),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snippets() {
        assert_eq!(invoke("exec", "map", &[]), "exec.map()");
        assert_eq!(invoke("a", "get", &["0"]), "a.get(0)");
        assert_eq!(cast("x", "Int"), "(x as Int)");
        assert_eq!(this_field("_1_x"), "this._1_x");
        assert_eq!(string_literal("a\"b\\"), "\"a\\\"b\\\\\"");
        assert_eq!(string_literal("a\0b"), "\"a\\0b\"");
        assert_eq!(string_literal("\u{1b}x"), "\"\\u{1b}x\"");

        let mut routine = EmitableRoutine::method("advance", None);
        assert_eq!(
            static_member(&mut routine, "IterationResult", "FETCHED"),
            "IterationResult.FETCHED"
        );
        assert_eq!(routine.imports().collect::<Vec<_>>(), vec!["sql.exec"]);
    }
}
