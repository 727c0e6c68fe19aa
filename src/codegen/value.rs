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

//! Values produced by expression evaluation.
//!
//! A [`Value`] is a tagged variant over the kinds the evaluator produces:
//! numbers, shared code buffers, and macro bindings (pointers back into
//! definition nodes). Buffer values share ownership; cloning a value
//! clones the handle, not the bytes.

use std::cell::RefCell;
use std::rc::Rc;

use super::buffer::CodeBuffer;
use crate::analyzer::symbol_table::ScopeRef;
use crate::ast::{AmbiguousId, CommandDef, ConstDef, Expr};

/// A binding that defers to an AST node when the bound name is used.
#[derive(Debug, Clone)]
pub enum MacroRef {
    /// A `define` constant; its sub-expression is re-evaluated per use.
    Const(Rc<ConstDef>),
    /// A `command`; invoked with arguments at the use site.
    Command(Rc<CommandDef>),
    /// A name that collided across imports; use is an error.
    Ambiguous(Rc<AmbiguousId>),
    /// A command argument, bound by reference together with the caller's
    /// scope so the expression re-evaluates there on every use.
    Arg { expr: Rc<Expr>, scope: ScopeRef },
}

/// A value in CCScript.
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// The result of a failed or empty evaluation.
    #[default]
    Null,
    /// An unbound name.
    Undefined,
    /// A signed 32-bit number.
    Number(i32),
    /// A shared code buffer.
    Buffer(Rc<RefCell<CodeBuffer>>),
    /// A macro binding.
    Macro(MacroRef),
}

impl Value {
    /// Wrap a buffer in a freshly shared value.
    pub fn buffer(buf: CodeBuffer) -> Self {
        Value::Buffer(Rc::new(RefCell::new(buf)))
    }

    /// True for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The value's code form: the bytes an output statement would write.
    ///
    /// Numbers encode as little-endian 32-bit; buffers are shared as-is.
    /// Anything else yields an empty buffer (such values only arise after
    /// an error has already been recorded).
    pub fn to_code_buffer(&self) -> Rc<RefCell<CodeBuffer>> {
        match self {
            Value::Number(n) => {
                let mut buf = CodeBuffer::new();
                buf.append_long(*n as u32);
                Rc::new(RefCell::new(buf))
            }
            Value::Buffer(buf) => Rc::clone(buf),
            _ => Rc::new(RefCell::new(CodeBuffer::new())),
        }
    }
}
