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

//! Lexical analysis.
//!
//! A stateful scanner producing one token at a time, with a single-token
//! [`peek`](Lexer::peek) that the parser uses to disambiguate labels from
//! identifier expressions. Lexical problems are recorded as diagnostics
//! and scanning continues wherever possible.

mod tokens;

pub use tokens::{keyword, Token, TokenKind};

use std::rc::Rc;

use crate::error::{Diagnostics, ErrorCode};

const EOB: char = '\0';

/// The lexer state.
pub struct Lexer {
    source: Vec<char>,
    pos: usize,
    current: char,
    /// Current line being scanned (1-based, plus any base offset).
    pub line: i32,
    column: i32,

    kind: TokenKind,
    ival: i32,
    sval: String,
    stype: char,

    diag: Rc<Diagnostics>,
    file: String,
}

impl Lexer {
    /// Construct a lexer over the given input.
    pub fn new(source: &str, file: &str, diag: &Rc<Diagnostics>) -> Self {
        Self::new_at(source, file, 1, diag)
    }

    /// Construct a lexer whose line numbering starts at `line`. Used when
    /// lexing an expression spliced out of a string literal, so errors
    /// report the line of the enclosing string.
    pub fn new_at(source: &str, file: &str, line: i32, diag: &Rc<Diagnostics>) -> Self {
        let mut lexer = Self {
            source: source.chars().collect(),
            pos: 0,
            current: EOB,
            line,
            column: 0,
            kind: TokenKind::Error,
            ival: 0,
            sval: String::new(),
            stype: ' ',
            diag: Rc::clone(diag),
            file: file.to_string(),
        };
        lexer.advance();
        lexer
    }

    /// Read the next token from the input.
    pub fn lex(&mut self) -> TokenKind {
        self.kind = self.lex_symbol();
        self.kind
    }

    /// Check the next token's kind without advancing or modifying the
    /// current token value.
    pub fn peek(&mut self) -> TokenKind {
        let saved_ival = self.ival;
        let saved_sval = self.sval.clone();
        let saved_stype = self.stype;
        let saved_line = self.line;
        let saved_column = self.column;
        let saved_pos = self.pos;
        let saved_current = self.current;

        let kind = self.lex_symbol();

        if kind != TokenKind::Error {
            self.ival = saved_ival;
            self.sval = saved_sval;
            self.stype = saved_stype;
            self.line = saved_line;
            self.column = saved_column;
            self.pos = saved_pos;
            self.current = saved_current;
        }
        kind
    }

    /// The most recently lexed token.
    pub fn token(&self) -> Token {
        Token {
            kind: self.kind,
            line: self.line,
            ival: self.ival,
            sval: self.sval.clone(),
            stype: self.stype,
        }
    }

    fn advance(&mut self) {
        if self.pos >= self.source.len() {
            self.current = EOB;
        } else {
            self.current = self.source[self.pos];
            self.pos += 1;
            self.column += 1;
        }
    }

    fn error(&self, code: ErrorCode, msg: impl AsRef<str>) {
        self.diag.error_at(&self.file, self.line, code, msg);
    }

    fn warning(&self, code: ErrorCode, msg: impl AsRef<str>) {
        self.diag.warning_at(&self.file, self.line, code, msg);
    }

    fn lex_symbol(&mut self) -> TokenKind {
        while self.current != EOB {
            match self.current {
                '\t' | '\r' | ' ' => {
                    self.advance();
                }
                '\n' => {
                    self.line += 1;
                    self.column = 1;
                    self.advance();
                }
                '/' => {
                    self.advance();
                    match self.current {
                        '/' => self.line_comment(),
                        '*' => {
                            if !self.block_comment() {
                                return TokenKind::Error;
                            }
                        }
                        _ => {
                            self.error(ErrorCode::UnexpectedCharacter, "unexpected character '/'");
                        }
                    }
                }
                '!' | '~' => {
                    self.stype = self.current;
                    self.advance();
                    if self.current != '"' {
                        self.error(ErrorCode::UnexpectedCharacter, "string expected");
                        return TokenKind::Error;
                    }
                    self.advance();
                    return self.lex_string_literal();
                }
                '"' => {
                    self.stype = ' ';
                    self.advance();
                    return self.lex_string_literal();
                }
                '=' => return self.punct(TokenKind::Equals),
                '(' => return self.punct(TokenKind::LeftParen),
                ')' => return self.punct(TokenKind::RightParen),
                '{' => return self.punct(TokenKind::LeftBrace),
                '}' => return self.punct(TokenKind::RightBrace),
                '[' => return self.punct(TokenKind::LeftBracket),
                ']' => return self.punct(TokenKind::RightBracket),
                '.' => return self.punct(TokenKind::Period),
                ':' => return self.punct(TokenKind::Colon),
                ',' => return self.punct(TokenKind::Comma),
                c if c.is_ascii_alphabetic() || c == '_' => return self.lex_identifier(),
                c if c.is_ascii_digit() || c == '-' => return self.lex_number(),
                c => {
                    self.error(
                        ErrorCode::UnexpectedCharacter,
                        format!("unexpected character '{}'", c),
                    );
                    self.advance();
                }
            }
        }
        TokenKind::Finished
    }

    fn punct(&mut self, kind: TokenKind) -> TokenKind {
        self.advance();
        kind
    }

    fn line_comment(&mut self) {
        loop {
            self.advance();
            if self.current == '\n' || self.current == EOB {
                break;
            }
        }
    }

    fn block_comment(&mut self) -> bool {
        self.advance();
        loop {
            match self.current {
                '*' => {
                    self.advance();
                    if self.current == '/' {
                        self.advance();
                        return true;
                    }
                }
                '\n' => {
                    self.line += 1;
                    self.advance();
                }
                EOB => {
                    self.error(ErrorCode::UnterminatedComment, "unexpected end of file in comment");
                    return false;
                }
                _ => self.advance(),
            }
        }
    }

    fn lex_string_literal(&mut self) -> TokenKind {
        self.sval.clear();

        while self.current != '"' {
            match self.current {
                EOB => {
                    self.error(
                        ErrorCode::UnterminatedString,
                        "unexpected end of file in string literal",
                    );
                    return TokenKind::Error;
                }
                '\n' => {
                    self.error(ErrorCode::NewlineInString, "newline in string");
                    self.line += 1;
                    return TokenKind::Error;
                }
                '\\' => {
                    self.advance();
                    match self.current {
                        '"' => {
                            self.sval.push('"');
                            self.advance();
                        }
                        '\\' => {
                            self.sval.push('\\');
                            self.advance();
                        }
                        _ => {
                            self.warning(
                                ErrorCode::UnrecognizedEscape,
                                "unrecognized escape character ignored",
                            );
                            self.advance();
                        }
                    }
                }
                c => {
                    self.sval.push(c);
                    self.advance();
                }
            }
        }

        self.advance();
        TokenKind::StringLiteral
    }

    fn lex_identifier(&mut self) -> TokenKind {
        self.sval.clear();
        loop {
            self.sval.push(self.current);
            self.advance();
            if !(self.current.is_ascii_alphanumeric() || self.current == '_') {
                break;
            }
        }
        keyword(&self.sval).unwrap_or(TokenKind::Identifier)
    }

    fn lex_number(&mut self) -> TokenKind {
        let mut first = self.current;
        let mut negate = false;
        self.sval.clear();

        if self.current == '-' {
            negate = true;
            self.advance();
            first = self.current;
        }
        self.advance();

        let radix;
        let mut digits = String::new();
        if first == '0' && self.current.eq_ignore_ascii_case(&'x') {
            self.sval.push(first);
            self.sval.push(self.current);
            radix = 16;
            self.advance();
            while self.current.is_ascii_hexdigit() {
                self.sval.push(self.current);
                digits.push(self.current);
                self.advance();
            }
        } else {
            radix = 10;
            self.sval.push(first);
            digits.push(first);
            while self.current.is_ascii_digit() {
                self.sval.push(self.current);
                digits.push(self.current);
                self.advance();
            }
        }

        if self.current.is_ascii_alphanumeric() {
            self.error(ErrorCode::InvalidNumberSuffix, "number has invalid suffix");
        }

        let value = match u32::from_str_radix(&digits, radix) {
            Ok(n) => n,
            Err(_) => {
                self.warning(
                    ErrorCode::IntegerOverflow,
                    "integer constant capped at 0xffffffff",
                );
                0xFFFFFFFF
            }
        };

        self.ival = value as i32;
        if negate {
            self.ival = self.ival.wrapping_neg();
        }

        TokenKind::IntLiteral
    }
}
