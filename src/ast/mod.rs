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

//! Abstract Syntax Tree definitions.
//!
//! The AST is a pair of closed sum types: [`Stmt`] for statements and
//! [`Expr`] for expressions. Definition nodes (`define`, `command`) live
//! behind `Rc` because the symbol tables bind macro values that point
//! back at them; everything the evaluator may re-enter carries `Cell`
//! state for its recursion guard.
//!
//! Pre-typecheck lives in [`crate::analyzer`]; lowering lives in
//! [`crate::codegen`].

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::analyzer::symbol_table::ScopeRef;

/// A parsed source module: import names plus top-level statements.
#[derive(Debug, Default)]
pub struct Program {
    /// Import file names, e.g. `town.ccs`, in declaration order.
    pub imports: Vec<String>,
    /// Top-level statements.
    pub stmts: Vec<Stmt>,
}

/// A statement.
#[derive(Debug)]
pub enum Stmt {
    /// A braced block of statements.
    Block(Block),
    /// An expression in statement position; its code value is written to
    /// the current output.
    Expr(ExprStmt),
    /// A `define` constant definition.
    ConstDef(Rc<ConstDef>),
    /// A `command` definition.
    CommandDef(Rc<CommandDef>),
    /// A `ROM[...]`/`ROMTBL[...]` deferred write.
    RomWrite(RomWrite),
}

/// A braced statement block.
#[derive(Debug)]
pub struct Block {
    pub line: i32,
    pub stmts: Vec<Stmt>,
    /// When set, the block runs directly in its enclosing scope. Used for
    /// command bodies so parameter bindings stay visible.
    pub no_scope: Cell<bool>,
}

/// An expression used as a statement.
#[derive(Debug)]
pub struct ExprStmt {
    pub line: i32,
    pub expr: Rc<Expr>,
}

/// A `define name = expr` constant.
///
/// The sub-expression is re-evaluated at every use site; `evaluating`
/// guards against self-reference.
#[derive(Debug)]
pub struct ConstDef {
    pub line: i32,
    pub name: String,
    pub value: Rc<Expr>,
    pub evaluating: Cell<bool>,
}

/// A `command name(params) body` definition.
#[derive(Debug)]
pub struct CommandDef {
    pub line: i32,
    pub name: String,
    pub params: Vec<String>,
    pub body: Rc<Expr>,
    /// The lexical parent scope, filled in by pre-typecheck.
    pub parent_scope: RefCell<Option<ScopeRef>>,
    /// Set while the body is being lowered; re-entry is a recursion error.
    pub executing: Cell<bool>,
}

/// A deferred write: `ROM[base] = value` or `ROMTBL[base, size, index] = value`.
#[derive(Debug)]
pub struct RomWrite {
    pub line: i32,
    pub base: Rc<Expr>,
    pub size: Option<Rc<Expr>>,
    pub index: Option<Rc<Expr>>,
    pub value: Rc<Expr>,
}

/// An expression.
#[derive(Debug)]
pub enum Expr {
    /// An integer literal.
    Int(IntLiteral),
    /// A string literal, interpreted by the string parser at lowering time.
    Str(StringLiteral),
    /// A possibly-qualified identifier, with or without arguments.
    Ident(IdentExpr),
    /// A label definition, `name:`.
    Label(LabelExpr),
    /// A block in expression position; evaluates to its collected output.
    Block(BlockExpr),
    /// `if cond then-expr [else else-expr]`.
    If(IfExpr),
    /// `menu [cols] { option: result ... }`.
    Menu(MenuExpr),
    /// Short-circuit `a and b`.
    And(BinaryExpr),
    /// Short-circuit `a or b`.
    Or(BinaryExpr),
    /// `not a`.
    Not(NotExpr),
    /// `flag expr`.
    Flag(FlagExpr),
    /// `byte`/`short`/`long` size restriction, optionally indexed.
    Bounded(BoundedExpr),
    /// `count(...)` / `setcount(...)`.
    Count(CountExpr),
    /// Placeholder for a construct the parser could not make sense of.
    Error(ErrorExpr),
}

impl Expr {
    /// The source line on which this expression begins.
    pub fn line(&self) -> i32 {
        match self {
            Expr::Int(e) => e.line,
            Expr::Str(e) => e.line,
            Expr::Ident(e) => e.line,
            Expr::Label(e) => e.line,
            Expr::Block(e) => e.line,
            Expr::If(e) => e.line,
            Expr::Menu(e) => e.line,
            Expr::And(e) | Expr::Or(e) => e.line,
            Expr::Not(e) => e.line,
            Expr::Flag(e) => e.line,
            Expr::Bounded(e) => e.line,
            Expr::Count(e) => e.line,
            Expr::Error(e) => e.line,
        }
    }
}

/// An integer literal.
#[derive(Debug)]
pub struct IntLiteral {
    pub line: i32,
    pub value: i32,
}

/// A string literal.
#[derive(Debug)]
pub struct StringLiteral {
    pub line: i32,
    pub value: String,
}

/// A usage of an identifier, optionally qualified by a module name and
/// optionally carrying an argument list.
#[derive(Debug)]
pub struct IdentExpr {
    pub line: i32,
    /// Module qualifier, empty for an unqualified reference.
    pub module: String,
    pub name: String,
    pub args: Vec<Rc<Expr>>,
    /// True if parentheses were used, even with no arguments.
    pub has_parens: bool,
}

impl IdentExpr {
    /// The identifier as written, including any module qualifier.
    pub fn full_name(&self) -> String {
        if self.module.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.module, self.name)
        }
    }
}

/// A label definition in expression position.
///
/// Its value is an empty buffer containing the anchor that pre-typecheck
/// registered under this name, so enclosing block expressions collect the
/// anchor at the right position.
#[derive(Debug)]
pub struct LabelExpr {
    pub line: i32,
    pub name: String,
}

/// A block interpreted as an expression.
#[derive(Debug)]
pub struct BlockExpr {
    pub line: i32,
    pub block: Block,
}

/// An `if` expression.
#[derive(Debug)]
pub struct IfExpr {
    pub line: i32,
    pub condition: Rc<Expr>,
    pub then_expr: Rc<Expr>,
    pub else_expr: Option<Rc<Expr>>,
}

/// A `menu` expression.
#[derive(Debug)]
pub struct MenuExpr {
    pub line: i32,
    pub options: Vec<Rc<Expr>>,
    pub results: Vec<Rc<Expr>>,
    /// Column count: the number of options unless overridden.
    pub columns: u32,
    /// True if the column count was not explicitly overridden.
    pub default_columns: bool,
    /// Index of the `default` option, or -1 for none.
    pub default_option: i32,
}

/// Operands of `and`/`or`.
#[derive(Debug)]
pub struct BinaryExpr {
    pub line: i32,
    pub a: Rc<Expr>,
    pub b: Rc<Expr>,
}

/// Operand of `not`.
#[derive(Debug)]
pub struct NotExpr {
    pub line: i32,
    pub a: Rc<Expr>,
}

/// Operand of `flag`.
#[derive(Debug)]
pub struct FlagExpr {
    pub line: i32,
    pub expr: Rc<Expr>,
}

/// A size-restricted expression: `byte`, `short`, or `long`, optionally
/// with an `[index]` selecting which slice of the inner value to keep.
#[derive(Debug)]
pub struct BoundedExpr {
    pub line: i32,
    pub size: i32,
    /// Element index, or -1 for none.
    pub index: i32,
    pub expr: Rc<Expr>,
}

/// A `count`/`setcount` expression.
///
/// The result is computed during pre-typecheck (so counter reads reflect
/// source order) and cached here for lowering.
#[derive(Debug)]
pub struct CountExpr {
    pub line: i32,
    pub id: String,
    pub offset: i32,
    pub multiple: i32,
    /// True for `setcount`.
    pub set: bool,
    /// The value given to `setcount`.
    pub value: i32,
    pub cached: RefCell<crate::codegen::value::Value>,
}

/// A placeholder recorded where parsing failed.
#[derive(Debug)]
pub struct ErrorExpr {
    pub line: i32,
    pub message: String,
}

/// Marker installed in an import table when two imported modules define
/// the same name. Using the identifier reports which modules it could
/// have come from.
#[derive(Debug)]
pub struct AmbiguousId {
    pub name: String,
    pub modules: RefCell<Vec<String>>,
}

impl AmbiguousId {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            modules: RefCell::new(Vec::new()),
        }
    }

    /// Record another module defining this name.
    pub fn add_module(&self, module: &str) {
        self.modules.borrow_mut().push(module.to_string());
    }

    /// The error message listing every candidate.
    pub fn describe(&self) -> String {
        let mut out = format!("identifier '{}' is ambiguous; could be ", self.name);
        let modules = self.modules.borrow();
        for (i, m) in modules.iter().enumerate() {
            if i + 1 == modules.len() {
                out.push_str(&format!("or {}.{}", m, self.name));
            } else {
                out.push_str(&format!("{}.{}, ", m, self.name));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ambiguous_id_describe() {
        let a = AmbiguousId::new("door");
        a.add_module("town");
        a.add_module("cave");
        a.add_module("castle");
        assert_eq!(
            a.describe(),
            "identifier 'door' is ambiguous; could be town.door, cave.door, or castle.door"
        );
    }

    #[test]
    fn test_full_name() {
        let id = IdentExpr {
            line: 1,
            module: "town".into(),
            name: "door".into(),
            args: Vec::new(),
            has_parens: false,
        };
        assert_eq!(id.full_name(), "town.door");
    }
}
