// CCScript - A compiler for the CCScript event-scripting language
// Copyright (C) 2026  The CCScript Authors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! The pre-typecheck pass.
//!
//! Runs over a module's AST before any lowering. It builds the root
//! symbol table (constants, commands, labels), enforces the root-only
//! rules, and evaluates `count`/`setcount` so counter reads reflect
//! source order rather than evaluation order. Block bodies are not
//! descended into here; each block runs the pass over its own statements
//! just before it is lowered, against its freshly created scope.

pub mod symbol_table;

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::ast::{Expr, Program, Stmt};
use crate::codegen::anchor::Anchor;
use crate::codegen::buffer::CodeBuffer;
use crate::codegen::value::{MacroRef, Value};
use crate::error::ErrorCode;
use crate::module::Module;
use symbol_table::{ScopeRef, SymbolTable};

/// Named counters backing `count`/`setcount`.
///
/// Counters are read and bumped strictly during pre-typecheck passes, in
/// source order. Because the bank is shared across a whole compilation,
/// counter values depend on the order in which modules are loaded and
/// evaluated; that ordering dependency is inherent to the feature.
#[derive(Debug, Default)]
pub struct CounterBank {
    counters: RefCell<HashMap<String, i32>>,
}

impl CounterBank {
    /// The current value of a counter (0 if never set).
    pub fn get(&self, id: &str) -> i32 {
        self.counters.borrow().get(id).copied().unwrap_or(0)
    }

    /// Store a counter value.
    pub fn set(&self, id: &str, value: i32) {
        self.counters.borrow_mut().insert(id.to_string(), value);
    }
}

/// Run the pre-typecheck pass over a whole program against its root table.
pub fn check_program(program: &Program, root: &ScopeRef, module: &Module, counters: &CounterBank) {
    for stmt in &program.stmts {
        stmt.pre_typecheck(root, true, module, counters);
    }
}

impl Stmt {
    /// Pre-typecheck a statement against `table`. `at_root` is true only
    /// at the program's top level.
    pub fn pre_typecheck(
        &self,
        table: &ScopeRef,
        at_root: bool,
        module: &Module,
        counters: &CounterBank,
    ) {
        match self {
            // Blocks have their own lexical scopes, which are not built
            // until just before evaluation.
            Stmt::Block(_) => {}

            Stmt::Expr(stmt) => stmt.expr.pre_typecheck(table, at_root, module, counters),

            Stmt::ConstDef(def) => {
                if !at_root {
                    module.error(
                        def.line,
                        ErrorCode::NotAtRoot,
                        "constants can only be defined at global scope",
                    );
                    return;
                }
                if table.borrow().lookup(&def.name).is_some() {
                    module.error(
                        def.line,
                        ErrorCode::RepeatDefinition,
                        format!("repeat definition of identifier '{}'", def.name),
                    );
                    return;
                }
                table
                    .borrow_mut()
                    .define(&def.name, Value::Macro(MacroRef::Const(Rc::clone(def))));

                def.value.pre_typecheck(table, false, module, counters);
            }

            Stmt::CommandDef(def) => {
                if !at_root {
                    module.error(
                        def.line,
                        ErrorCode::NotAtRoot,
                        "commands can only be defined at global scope",
                    );
                    return;
                }
                if table.borrow().lookup(&def.name).is_some() {
                    module.error(
                        def.line,
                        ErrorCode::RepeatDefinition,
                        format!("repeat definition of identifier '{}'", def.name),
                    );
                    return;
                }
                table
                    .borrow_mut()
                    .define(&def.name, Value::Macro(MacroRef::Command(Rc::clone(def))));

                *def.parent_scope.borrow_mut() = Some(Rc::clone(table));

                // A throwaway scope, just to check for repeat parameters.
                let scope = SymbolTable::with_parent(table);
                for param in &def.params {
                    if scope.borrow_mut().define(param, Value::Null) {
                        module.error(
                            def.line,
                            ErrorCode::RepeatDefinition,
                            format!("repeat definition of parameter '{}'", param),
                        );
                    }
                }
            }

            // Deferred writes are checked when they are evaluated.
            Stmt::RomWrite(_) => {}
        }
    }
}

impl Expr {
    /// Pre-typecheck an expression against `table`.
    pub fn pre_typecheck(
        &self,
        table: &ScopeRef,
        at_root: bool,
        module: &Module,
        counters: &CounterBank,
    ) {
        match self {
            Expr::If(e) => {
                e.condition.pre_typecheck(table, false, module, counters);
                e.then_expr.pre_typecheck(table, false, module, counters);
                if let Some(else_expr) = &e.else_expr {
                    else_expr.pre_typecheck(table, false, module, counters);
                }
            }

            Expr::Menu(e) => {
                for option in &e.options {
                    option.pre_typecheck(table, false, module, counters);
                }
                for result in &e.results {
                    result.pre_typecheck(table, false, module, counters);
                }
            }

            Expr::Label(e) => {
                let defined = {
                    let t = table.borrow();
                    t.get(&e.name).is_some() || t.get_anchor(&e.name).is_some()
                };
                if defined {
                    module.error(
                        e.line,
                        ErrorCode::RepeatDefinition,
                        format!("repeat definition of identifier '{}'", e.name),
                    );
                    return;
                }
                let anchor = Anchor::new(e.name.clone());
                anchor.set_external(true);
                table.borrow_mut().define_anchor(&e.name, &anchor);
            }

            Expr::And(e) | Expr::Or(e) => {
                e.a.pre_typecheck(table, at_root, module, counters);
                e.b.pre_typecheck(table, at_root, module, counters);
            }

            Expr::Not(e) => e.a.pre_typecheck(table, at_root, module, counters),
            Expr::Flag(e) => e.expr.pre_typecheck(table, at_root, module, counters),
            Expr::Bounded(e) => e.expr.pre_typecheck(table, at_root, module, counters),

            Expr::Ident(e) => {
                for arg in &e.args {
                    arg.pre_typecheck(table, at_root, module, counters);
                }
            }

            Expr::Count(e) => {
                if e.set {
                    counters.set(&e.id, e.value);
                    *e.cached.borrow_mut() = Value::buffer(CodeBuffer::new());
                } else {
                    let value = counters.get(&e.id);
                    counters.set(&e.id, value + 1);
                    *e.cached.borrow_mut() =
                        Value::Number(value.wrapping_mul(e.multiple).wrapping_add(e.offset));
                }
            }

            // Literals and inner blocks hold nothing to register here.
            Expr::Int(_) | Expr::Str(_) | Expr::Block(_) | Expr::Error(_) => {}
        }
    }
}
