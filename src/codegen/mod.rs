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

//! The evaluator: lowering the AST into code buffers.
//!
//! Every expression yields a [`Value`]; statements append their code form
//! to the context's current output buffer. Control-flow constructs emit
//! their fixed opcode sequences with `FF FF FF FF` placeholder operands
//! and register references to freshly synthesized anchors, which the
//! linker patches once module base addresses are known.
//!
//! Evaluation errors are recorded on the module and yield
//! [`Value::Null`], so one run surfaces as many problems as it can.

pub mod anchor;
pub mod buffer;
pub mod strings;
pub mod value;

use std::cell::RefCell;
use std::rc::Rc;

use crate::analyzer::symbol_table::{ScopeRef, SymbolTable};
use crate::ast::{
    BoundedExpr, CommandDef, ConstDef, Expr, FlagExpr, IdentExpr, IfExpr, LabelExpr, MenuExpr,
    RomWrite, Stmt,
};
use crate::error::ErrorCode;
use crate::linker::romwrite::RomAccess;
use crate::module::{Module, Project};
use anchor::Anchor;
use buffer::CodeBuffer;
use strings::StringParser;
use value::{MacroRef, Value};

/// The context a node is evaluated in: which module is being lowered,
/// where labels are registered, and where statement output goes.
///
/// Separate from the node's scope (the lexical environment).
pub struct EvalContext {
    pub project: Rc<Project>,
    pub module: Rc<Module>,
    /// The symbol table in which labels are scoped. Module evaluation
    /// points this at the module root; a deferred ROM write points it at
    /// the write's own internal table.
    pub labels: ScopeRef,
    /// Buffer receiving statement output.
    pub output: Rc<RefCell<CodeBuffer>>,
    /// When set, identifier references to anchors emit only placeholder
    /// bytes, without registering a patch.
    pub norefs: bool,
}

impl EvalContext {
    /// The evaluation context for a module's top-level program.
    pub fn for_module(project: &Rc<Project>, module: &Rc<Module>) -> Self {
        Self {
            project: Rc::clone(project),
            module: Rc::clone(module),
            labels: module.root(),
            output: module.code(),
            norefs: false,
        }
    }

    /// A label name unique within the current module.
    pub fn unique_label(&self) -> String {
        self.module.unique_label_name()
    }
}

impl Stmt {
    /// Execute a statement: evaluate and write output where applicable.
    pub fn execute(&self, scope: &ScopeRef, ctx: &mut EvalContext) {
        match self {
            Stmt::Block(block) => block.execute(scope, ctx),

            Stmt::Expr(stmt) => {
                // The expression statement is where expression values are
                // finally written out to the current output.
                let value = stmt.expr.evaluate(scope, ctx, false);
                let code = value.to_code_buffer();
                ctx.output.borrow_mut().append(&code.borrow());
            }

            // Definitions do nothing at execution time; their symbols were
            // installed by the pre-typecheck pass, and their bodies are
            // evaluated at each use site.
            Stmt::ConstDef(_) | Stmt::CommandDef(_) => {}

            Stmt::RomWrite(write) => write.execute(scope, ctx),
        }
    }
}

impl crate::ast::Block {
    /// Execute a block's statements, in a fresh child scope unless the
    /// block is marked to run in its enclosing scope.
    pub fn execute(&self, env: &ScopeRef, ctx: &mut EvalContext) {
        let scope = if self.no_scope.get() {
            Rc::clone(env)
        } else {
            SymbolTable::with_parent(env)
        };

        for stmt in &self.stmts {
            stmt.pre_typecheck(&scope, false, &ctx.module, &ctx.project.counters);
        }

        // Abort early if the pre-pass failed, to avoid follow-on errors.
        if ctx.module.failed() {
            return;
        }

        for stmt in &self.stmts {
            stmt.execute(&scope, ctx);
        }
    }
}

impl Expr {
    /// Evaluate an expression to a value.
    ///
    /// `as_bool` marks boolean position (an `if` condition or an operand
    /// of `and`/`or`/`not`); only `flag` expressions change shape for it.
    pub fn evaluate(&self, scope: &ScopeRef, ctx: &mut EvalContext, as_bool: bool) -> Value {
        match self {
            Expr::Int(e) => Value::Number(e.value),

            Expr::Str(e) => {
                let mut parser = StringParser::new(&e.value, e.line);
                parser.evaluate(scope, ctx)
            }

            Expr::Ident(e) => e.evaluate(scope, ctx, as_bool),
            Expr::Label(e) => e.evaluate(scope, ctx),

            Expr::Block(e) => {
                // Collect the block's output into a fresh buffer.
                let output = Rc::new(RefCell::new(CodeBuffer::new()));
                let old = Rc::clone(&ctx.output);
                ctx.output = Rc::clone(&output);
                e.block.execute(scope, ctx);
                ctx.output = old;
                Value::Buffer(output)
            }

            Expr::If(e) => e.evaluate(scope, ctx),
            Expr::Menu(e) => e.evaluate(scope, ctx),

            Expr::And(e) => {
                // [a] [iffalse goto end] [b] end:
                let mut value = CodeBuffer::new();
                let base = ctx.unique_label();
                let end = Anchor::new(format!("{}.end", base));

                let a = e.a.evaluate(scope, ctx, true);
                value.append(&a.to_code_buffer().borrow());
                value.append_hex("1B 02 FF FF FF FF");
                let loc = value.len() as i64 - 4;
                value.add_reference(loc, &end);
                let b = e.b.evaluate(scope, ctx, true);
                value.append(&b.to_code_buffer().borrow());
                value.add_anchor(&end);

                Value::buffer(value)
            }

            Expr::Or(e) => {
                // [a] [iftrue goto end] [b] end:
                let mut value = CodeBuffer::new();
                let base = ctx.unique_label();
                let end = Anchor::new(format!("{}.end", base));

                let a = e.a.evaluate(scope, ctx, true);
                value.append(&a.to_code_buffer().borrow());
                value.append_hex("1B 03 FF FF FF FF");
                let loc = value.len() as i64 - 4;
                value.add_reference(loc, &end);
                let b = e.b.evaluate(scope, ctx, true);
                value.append(&b.to_code_buffer().borrow());
                value.add_anchor(&end);

                Value::buffer(value)
            }

            Expr::Not(e) => {
                // [a] [0B 00], assuming [a] leaves its truth in W.
                let mut value = CodeBuffer::new();
                let a = e.a.evaluate(scope, ctx, true);
                value.append(&a.to_code_buffer().borrow());
                value.append_hex("0B 00");
                Value::buffer(value)
            }

            Expr::Flag(e) => e.evaluate(scope, ctx, as_bool),
            Expr::Bounded(e) => e.evaluate(scope, ctx),

            Expr::Count(e) => e.cached.borrow().clone(),

            Expr::Error(_) => Value::Null,
        }
    }
}

impl IfExpr {
    /// Lowering an if expression:
    ///
    /// ```text
    ///   [condition]
    ///   [iffalse goto falselbl]
    ///   [then]
    ///   [goto endlbl]
    /// falselbl:
    ///   [else]
    /// endlbl:
    /// ```
    fn evaluate(&self, scope: &ScopeRef, ctx: &mut EvalContext) -> Value {
        let mut value = CodeBuffer::new();

        let base = ctx.unique_label();
        let end_anchor = Anchor::new(format!("{}.end", base));
        let false_anchor = Anchor::new(format!("{}.false", base));

        let cond = self.condition.evaluate(scope, ctx, true);
        value.append(&cond.to_code_buffer().borrow());

        value.append_hex("1B 02 FF FF FF FF");
        let loc = value.len() as i64 - 4;
        value.add_reference(loc, &false_anchor);

        let then_val = self.then_expr.evaluate(scope, ctx, false);
        value.append(&then_val.to_code_buffer().borrow());

        value.append_hex("0A FF FF FF FF");
        let loc = value.len() as i64 - 4;
        value.add_reference(loc, &end_anchor);

        value.add_anchor(&false_anchor);

        if let Some(else_expr) = &self.else_expr {
            let else_val = else_expr.evaluate(scope, ctx, false);
            value.append(&else_val.to_code_buffer().borrow());
        }

        value.add_anchor(&end_anchor);

        Value::buffer(value)
    }
}

impl MenuExpr {
    /// Lowering a menu expression:
    ///
    /// ```text
    ///   [19 02][option][02]      for each option
    ///   [1C 0C $cols][11][12]    (1C 07 for a plain two-option menu)
    ///   [09 $num (optionjmps)]
    ///   [goto default-or-end]
    ///   [result][goto end]       for each result
    /// end:
    /// ```
    fn evaluate(&self, scope: &ScopeRef, ctx: &mut EvalContext) -> Value {
        let mut value = CodeBuffer::new();

        let base = ctx.unique_label();
        let anchors: Vec<_> = (0..self.options.len())
            .map(|i| Anchor::new(format!("{}.opt{}", base, i)))
            .collect();
        let end_anchor = Anchor::new(format!("{}.end", base));

        for option in &self.options {
            value.append_hex("19 02");
            let opt = option.evaluate(scope, ctx, false);
            value.append(&opt.to_code_buffer().borrow());
            value.append_hex("02");
        }

        // Two options with no explicit column count use the compact
        // display command.
        if self.options.len() == 2 && self.default_columns {
            value.append_hex("1C 07");
        } else {
            value.append_hex("1C 0C");
        }
        value.append_byte(self.columns);
        value.append_hex("11 12");

        // The multi-jump.
        value.append_hex("09");
        value.append_byte(self.results.len() as u32);
        for anchor in &anchors {
            value.append_hex("FF FF FF FF");
            let loc = value.len() as i64 - 4;
            value.add_reference(loc, anchor);
        }

        // Fall through to the default option, or past the menu.
        value.append_hex("0A FF FF FF FF");
        let loc = value.len() as i64 - 4;
        if self.default_option != -1 {
            value.add_reference(loc, &anchors[self.default_option as usize]);
        } else {
            value.add_reference(loc, &end_anchor);
        }

        for (i, result) in self.results.iter().enumerate() {
            value.add_anchor(&anchors[i]);
            let res = result.evaluate(scope, ctx, false);
            value.append(&res.to_code_buffer().borrow());

            // Jump past the menu in case the result falls through.
            value.append_hex("0A FF FF FF FF");
            let loc = value.len() as i64 - 4;
            value.add_reference(loc, &end_anchor);
        }

        value.add_anchor(&end_anchor);

        Value::buffer(value)
    }
}

impl FlagExpr {
    /// A flag is the first two bytes of its inner value; in boolean
    /// position it is prefixed with the load-flag opcode so `if someflag`
    /// tests the flag rather than its number.
    fn evaluate(&self, scope: &ScopeRef, ctx: &mut EvalContext, as_bool: bool) -> Value {
        let mut value = CodeBuffer::new();

        if as_bool {
            value.append_hex("07");
        }

        let flag_val = self.expr.evaluate(scope, ctx, false);
        let code = flag_val.to_code_buffer();
        let sliced = code.borrow().substring(0, 2);
        match sliced {
            Ok(s) => value.append(&s),
            Err(e) => {
                ctx.module.error(self.line, e.code, &e.message);
                return Value::Null;
            }
        }

        Value::buffer(value)
    }
}

impl BoundedExpr {
    /// Keep `size` bytes of the inner value starting at `size * index`
    /// (0 when no index), zero-filled where the inner value runs short.
    fn evaluate(&self, scope: &ScopeRef, ctx: &mut EvalContext) -> Value {
        let mut value = CodeBuffer::new();

        let expr_val = self.expr.evaluate(scope, ctx, false);

        let pos = if self.index < 0 {
            0
        } else {
            (self.size * self.index) as i64
        };

        let code = expr_val.to_code_buffer();
        let inner_len = code.borrow().len() as i64;
        let over = (pos + self.size as i64 - inner_len).max(0);
        let valid = (self.size as i64 - over).max(0);

        if valid > 0 {
            match code.borrow().substring(pos as usize, valid as usize) {
                Ok(s) => value.append(&s),
                Err(e) => {
                    ctx.module.error(self.line, e.code, &e.message);
                    return Value::buffer(value);
                }
            }
        }
        for _ in 0..(self.size as i64 - valid) {
            value.append_byte(0);
        }

        Value::buffer(value)
    }
}

impl LabelExpr {
    /// The value of a label expression is an empty buffer containing the
    /// anchor that pre-typecheck registered under this name; appending it
    /// pins the anchor at the append position.
    fn evaluate(&self, scope: &ScopeRef, ctx: &mut EvalContext) -> Value {
        let anchor = scope.borrow().lookup_anchor(&self.name);
        let Some(anchor) = anchor else {
            ctx.module.error(
                self.line,
                ErrorCode::InternalLookupFailed,
                format!(
                    "label evaluation lookup failed for '{}' - probable internal compiler error!",
                    self.name
                ),
            );
            return Value::Null;
        };

        let mut value = CodeBuffer::new();
        value.add_anchor(&anchor);
        Value::buffer(value)
    }
}

impl IdentExpr {
    fn evaluate(&self, scope: &ScopeRef, ctx: &mut EvalContext, as_bool: bool) -> Value {
        // Resolve the lookup scope: a module qualifier looks in that
        // module's root table instead of the current scope chain.
        let lookup_scope = if self.module.is_empty() {
            Rc::clone(scope)
        } else {
            match ctx.project.module(&self.module) {
                Some(sibling) => sibling.root(),
                None => {
                    ctx.module.error(
                        self.line,
                        ErrorCode::NonexistentModule,
                        format!("reference to nonexistent module '{}'", self.module),
                    );
                    return Value::Null;
                }
            }
        };

        let found = lookup_scope.borrow().lookup(&self.name);

        if let Some(value) = found {
            let binding = match value {
                Value::Macro(binding) => binding,
                other => {
                    // Plain values are not importable across modules.
                    if !Rc::ptr_eq(&lookup_scope, scope) {
                        ctx.module.error(
                            self.line,
                            ErrorCode::CrossModuleLocal,
                            format!(
                                "cannot access local variable declaration '{}' in module '{}'",
                                self.name, self.module
                            ),
                        );
                        return Value::Null;
                    }
                    return other;
                }
            };

            return match binding {
                MacroRef::Const(def) => {
                    if self.has_parens {
                        ctx.module.error(
                            self.line,
                            ErrorCode::ConstWithParens,
                            format!(
                                "'{}' refers to a constant; cannot use parentheses",
                                self.full_name()
                            ),
                        );
                        return Value::Null;
                    }
                    def.evaluate_expr(scope, ctx, as_bool)
                }

                MacroRef::Command(def) => {
                    if def.params.len() != self.args.len() {
                        ctx.module.error(
                            self.line,
                            ErrorCode::WrongArgumentCount,
                            format!(
                                "incorrect number of parameters to command '{}'",
                                self.full_name()
                            ),
                        );
                        return Value::Null;
                    }
                    def.invoke(ctx, &self.args, scope)
                }

                MacroRef::Ambiguous(ambiguous) => {
                    ctx.module
                        .error(self.line, ErrorCode::AmbiguousIdentifier, ambiguous.describe());
                    Value::Null
                }

                // A command argument: re-evaluate the bound expression in
                // the scope it was captured in.
                MacroRef::Arg { expr, scope: captured } => expr.evaluate(&captured, ctx, as_bool),
            };
        }

        // No value bound; check for a label.
        let anchor = lookup_scope.borrow().lookup_anchor(&self.name);
        if let Some(anchor) = anchor {
            if self.has_parens {
                ctx.module.error(
                    self.line,
                    ErrorCode::LabelWithParens,
                    format!(
                        "'{}' refers to a label; cannot use parentheses",
                        self.full_name()
                    ),
                );
                return Value::Null;
            }

            // The label's address might not be known yet, so emit its
            // current target as a placeholder and register a reference.
            let mut value = CodeBuffer::new();
            value.append_long(anchor.target());
            if !ctx.norefs {
                let loc = value.len() as i64 - 4;
                value.add_reference(loc, &anchor);
            }
            return Value::buffer(value);
        }

        ctx.module.error(
            self.line,
            ErrorCode::UndefinedIdentifier,
            format!("use of undefined identifier '{}'", self.full_name()),
        );
        Value::Null
    }
}

impl ConstDef {
    /// Evaluate the constant's sub-expression in the scope of use.
    ///
    /// The guard flag turns self-referential definitions into an error
    /// instead of a hang.
    pub fn evaluate_expr(&self, scope: &ScopeRef, ctx: &mut EvalContext, as_bool: bool) -> Value {
        if self.evaluating.get() {
            ctx.module.error(
                self.line,
                ErrorCode::RecursionDetected,
                format!("recursion detected in evaluation of constant '{}'", self.name),
            );
            return Value::Null;
        }
        self.evaluating.set(true);
        let result = self.value.evaluate(scope, ctx, as_bool);
        self.evaluating.set(false);
        result
    }
}

impl CommandDef {
    /// Invoke the command with the given argument expressions.
    ///
    /// Arguments are bound by reference together with the caller's scope,
    /// so each use of a parameter re-evaluates its expression there. The
    /// body itself runs in a fresh child of the command's lexical parent.
    ///
    /// The `executing` guard also rejects composition of a command with
    /// itself, `foo(foo(x))`: the inner call happens while the outer body
    /// is being lowered, even though it would terminate. Known limitation.
    pub fn invoke(
        self: &Rc<Self>,
        ctx: &mut EvalContext,
        args: &[Rc<Expr>],
        caller_scope: &ScopeRef,
    ) -> Value {
        if self.executing.get() {
            ctx.module.error(
                self.line,
                ErrorCode::RecursionDetected,
                format!("recursion detected in evaluation of command '{}'", self.name),
            );
            return Value::Null;
        }
        self.executing.set(true);

        let parent = self
            .parent_scope
            .borrow()
            .clone()
            .expect("command parent scope is set during pre-typecheck");
        let scope = SymbolTable::with_parent(&parent);

        for (param, arg) in self.params.iter().zip(args) {
            scope.borrow_mut().define(
                param,
                Value::Macro(MacroRef::Arg {
                    expr: Rc::clone(arg),
                    scope: Rc::clone(caller_scope),
                }),
            );
        }

        // Build the command scope, then lower the body in it.
        self.body
            .pre_typecheck(&scope, false, &ctx.module, &ctx.project.counters);
        let result = self.body.evaluate(&scope, ctx, false);

        self.executing.set(false);
        result
    }
}

impl RomWrite {
    /// Evaluate a deferred write's sub-expressions now, caching their code
    /// forms; the linker applies the write after primary layout.
    ///
    /// The caches are evaluated in a context whose label scope is the
    /// write's own internal table, kept apart from module labels: the
    /// write's anchors are measured from its final write address, not from
    /// the module base.
    fn execute(&self, scope: &ScopeRef, ctx: &mut EvalContext) {
        let labels = SymbolTable::new();
        let mut sub = EvalContext {
            project: Rc::clone(&ctx.project),
            module: Rc::clone(&ctx.module),
            labels: Rc::clone(&labels),
            output: Rc::new(RefCell::new(CodeBuffer::new())),
            norefs: false,
        };

        let mut cache = |expr: &Rc<Expr>| {
            let value = expr.evaluate(scope, &mut sub, false);
            let copy = value.to_code_buffer().borrow().duplicate();
            Rc::new(RefCell::new(copy))
        };

        let base = cache(&self.base);
        let size = self.size.as_ref().map(&mut cache);
        let index = self.index.as_ref().map(&mut cache);
        let value = cache(&self.value);

        ctx.project.register_rom_write(RomAccess {
            labels,
            base,
            size,
            index,
            value,
        });
    }
}
