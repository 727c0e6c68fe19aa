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

//! The string parser: interprets string literals into code bytes.
//!
//! Text mode maps characters into the game's character page and expands
//! the pause shorthands; `[`..`]` switches to code mode, where pairs of
//! hex digits are emitted raw; `{`..`}` splices in the code form of an
//! arbitrary expression, parsed and evaluated on the spot against the
//! enclosing scope.

use super::buffer::CodeBuffer;
use super::value::Value;
use super::EvalContext;
use crate::analyzer::symbol_table::ScopeRef;
use crate::error::ErrorCode;
use crate::parser::Parser;

/// Parser state over one string literal's text.
pub struct StringParser {
    chars: Vec<char>,
    pos: usize,
    current: char,
    /// Source line of the literal, for error reporting.
    line: i32,
}

const END: char = '\0';

impl StringParser {
    /// Construct a parser over a string literal's text.
    pub fn new(text: &str, line: i32) -> Self {
        Self {
            chars: text.chars().collect(),
            pos: 0,
            current: END,
            line,
        }
    }

    /// Interpret the string, yielding its code buffer.
    pub fn evaluate(&mut self, scope: &ScopeRef, ctx: &mut EvalContext) -> Value {
        let mut output = CodeBuffer::new();
        let mut code_mode = false;
        self.next();

        while self.current != END {
            if self.current == '{' {
                let spliced = self.expression(scope, ctx);
                output.append(&spliced.to_code_buffer().borrow());
                continue;
            }

            if code_mode {
                if self.current == ']' {
                    self.next();
                    code_mode = false;
                    continue;
                }
                if self.current == ' ' || self.current == '\t' || self.current == '\n' {
                    self.next();
                    continue;
                }
                match self.accept_byte() {
                    Some(b) => output.append_byte(b as u32),
                    None => ctx.module.warning(
                        self.line,
                        ErrorCode::InvalidControlCode,
                        "invalid control code bytes ignored inside string",
                    ),
                }
                self.next();
            } else {
                match self.current {
                    '/' => {
                        output.append_byte(0x10);
                        output.append_byte(0x05);
                    }
                    '|' => {
                        output.append_byte(0x10);
                        output.append_byte(0x0F);
                    }
                    '[' => {
                        code_mode = true;
                    }
                    c => {
                        output.append_char(c as u32);
                    }
                }
                self.next();
            }
        }

        Value::buffer(output)
    }

    fn next(&mut self) {
        if self.pos < self.chars.len() {
            self.current = self.chars[self.pos];
            self.pos += 1;
        } else {
            self.current = END;
        }
    }

    /// Read a pair of hex digits as a byte. On failure the offending
    /// character is left for the caller to skip.
    fn accept_byte(&mut self) -> Option<u8> {
        if !self.current.is_ascii_hexdigit() {
            return None;
        }
        let mut s = String::new();
        s.push(self.current);
        self.next();
        if !self.current.is_ascii_hexdigit() {
            return None;
        }
        s.push(self.current);
        u8::from_str_radix(&s, 16).ok()
    }

    /// Parse and evaluate the expression between the current `{` and its
    /// closing `}`.
    fn expression(&mut self, scope: &ScopeRef, ctx: &mut EvalContext) -> Value {
        let close = self.chars[self.pos..]
            .iter()
            .position(|c| *c == '}')
            .map(|i| self.pos + i);

        let Some(close) = close else {
            ctx.module.error(
                self.line,
                ErrorCode::UnterminatedExpression,
                "unterminated expression block inside string",
            );
            self.pos = self.chars.len();
            self.next();
            return Value::Null;
        };

        let source: String = self.chars[self.pos..close].iter().collect();

        let mut parser = Parser::new_at(
            &source,
            ctx.module.file_display(),
            self.line,
            ctx.module.diag(),
        );
        let expr = parser.parse_expression();
        let result = expr.evaluate(scope, ctx, false);

        // Skip past the expression block.
        self.pos = close + 1;
        self.next();

        result
    }
}
