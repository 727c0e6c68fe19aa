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

//! Parsing.
//!
//! A recursive descent parser for CCScript's LL(2) grammar; the single
//! point of two-token lookahead (telling a label `name:` apart from an
//! identifier expression) goes through the lexer's `peek`.
//!
//! The parser is error-tolerant: problems are recorded as diagnostics,
//! an error-expression node takes the place of whatever could not be
//! parsed, and parsing continues.

use std::cell::Cell;
use std::cell::RefCell;
use std::rc::Rc;

use crate::ast::{
    BinaryExpr, Block, BlockExpr, BoundedExpr, CommandDef, ConstDef, CountExpr, ErrorExpr, Expr,
    ExprStmt, FlagExpr, IdentExpr, IfExpr, IntLiteral, LabelExpr, MenuExpr, NotExpr, Program,
    RomWrite, Stmt, StringLiteral,
};
use crate::codegen::value::Value;
use crate::error::{Diagnostics, ErrorCode};
use crate::lexer::{Lexer, Token, TokenKind};

/// The parser state.
pub struct Parser {
    lexer: Lexer,
    /// The previously accepted token.
    last: Token,
    /// The current lookahead kind.
    sym: TokenKind,
    /// The line the lexer has reached.
    pub line: i32,
    diag: Rc<Diagnostics>,
    file: String,
}

impl Parser {
    /// Construct a parser over the given source.
    pub fn new(source: &str, file: &str, diag: &Rc<Diagnostics>) -> Self {
        Self::new_at(source, file, 1, diag)
    }

    /// Construct a parser whose line numbering starts at `line`; used for
    /// expressions spliced out of string literals.
    pub fn new_at(source: &str, file: &str, line: i32, diag: &Rc<Diagnostics>) -> Self {
        Self {
            lexer: Lexer::new_at(source, file, line, diag),
            last: Token::default(),
            sym: TokenKind::Error,
            line,
            diag: Rc::clone(diag),
            file: file.to_string(),
        }
    }

    /// Parse a whole program.
    pub fn parse(&mut self) -> Program {
        self.program()
    }

    /// Parse a single expression (used for string splices).
    pub fn parse_expression(&mut self) -> Rc<Expr> {
        self.getsym();
        self.expression()
    }

    fn getsym(&mut self) {
        self.last = self.lexer.token();
        self.sym = self.lexer.lex();
        self.line = self.lexer.line;
    }

    fn accept(&mut self, kind: TokenKind) -> bool {
        if self.sym == kind {
            self.getsym();
            return true;
        }
        false
    }

    fn expect(&mut self, kind: TokenKind) -> bool {
        if self.accept(kind) {
            return true;
        }
        self.error(
            format!(
                "expected '{}', found '{}'",
                kind.describe(),
                self.sym.describe()
            ),
            self.line,
        );
        false
    }

    fn error(&self, msg: impl AsRef<str>, line: i32) {
        self.diag
            .error_at(&self.file, line, ErrorCode::ExpectedToken, msg);
    }

    //
    // Production rules
    //

    /// `program := ( import | stmt )* EOF`
    fn program(&mut self) -> Program {
        self.getsym();

        let mut program = Program::default();
        while self.sym != TokenKind::Finished {
            if self.accept(TokenKind::Import) {
                if self.accept(TokenKind::Identifier) {
                    program.imports.push(format!("{}.ccs", self.last.sval));
                } else {
                    self.expect(TokenKind::StringLiteral);
                    program.imports.push(self.last.sval.clone());
                }
            } else {
                program.stmts.push(self.statement());
            }
        }
        program
    }

    /// `stmt := block | command-def | const-def | rom-write | expr`
    fn statement(&mut self) -> Stmt {
        // Blocks first: they can also be read as expressions, and the
        // expression rule relies on statement() handling the brace.
        if self.accept(TokenKind::LeftBrace) {
            return Stmt::Block(self.block_body());
        }
        if self.accept(TokenKind::Command) {
            return Stmt::CommandDef(Rc::new(self.command_def()));
        }
        if self.accept(TokenKind::Define) {
            return Stmt::ConstDef(Rc::new(self.const_def()));
        }
        if self.accept(TokenKind::Rom) {
            let line = self.last.line;
            self.expect(TokenKind::LeftBracket);
            let base = self.expression();
            self.expect(TokenKind::RightBracket);
            self.expect(TokenKind::Equals);
            let value = self.expression();
            return Stmt::RomWrite(RomWrite {
                line,
                base,
                size: None,
                index: None,
                value,
            });
        }
        if self.accept(TokenKind::RomTbl) {
            let line = self.last.line;
            self.expect(TokenKind::LeftBracket);
            let base = self.expression();
            self.expect(TokenKind::Comma);
            let size = self.expression();
            self.expect(TokenKind::Comma);
            let index = self.expression();
            self.expect(TokenKind::RightBracket);
            self.expect(TokenKind::Equals);
            let value = self.expression();
            return Stmt::RomWrite(RomWrite {
                line,
                base,
                size: Some(size),
                index: Some(index),
                value,
            });
        }

        // If all else fails, try it as an expression statement.
        Stmt::Expr(ExprStmt {
            line: self.last.line,
            expr: self.expression(),
        })
    }

    /// The inside of a `{ ... }`, with the opening brace already accepted.
    fn block_body(&mut self) -> Block {
        let line = self.last.line;
        let mut stmts = Vec::new();
        while self.sym != TokenKind::RightBrace && self.sym != TokenKind::Finished {
            stmts.push(self.statement());
        }
        self.expect(TokenKind::RightBrace);
        Block {
            line,
            stmts,
            no_scope: Cell::new(false),
        }
    }

    /// `expr := if-expr | menu-expr | label | block-expr | bounded-expr
    ///        | fac ('and'|'or') expr | fac`
    fn expression(&mut self) -> Rc<Expr> {
        if self.accept(TokenKind::If) {
            return Rc::new(Expr::If(self.if_expr()));
        }
        if self.accept(TokenKind::Menu) {
            return Rc::new(Expr::Menu(self.menu_expr()));
        }

        // A label is an identifier followed by a colon.
        if self.sym == TokenKind::Identifier && self.lexer.peek() == TokenKind::Colon {
            self.accept(TokenKind::Identifier);
            let line = self.last.line;
            let name = self.last.sval.clone();
            self.accept(TokenKind::Colon);
            return Rc::new(Expr::Label(LabelExpr { line, name }));
        }

        if self.sym == TokenKind::LeftBrace {
            self.accept(TokenKind::LeftBrace);
            let block = self.block_body();
            return Rc::new(Expr::Block(BlockExpr {
                line: self.last.line,
                block,
            }));
        }

        if matches!(self.sym, TokenKind::Byte | TokenKind::Short | TokenKind::Long) {
            return Rc::new(Expr::Bounded(self.bounded_expr()));
        }

        let line = self.last.line;
        let first = self.factor();
        if self.accept(TokenKind::And) {
            let second = self.expression();
            return Rc::new(Expr::And(BinaryExpr {
                line,
                a: first,
                b: second,
            }));
        }
        if self.accept(TokenKind::Or) {
            let second = self.expression();
            return Rc::new(Expr::Or(BinaryExpr {
                line,
                a: first,
                b: second,
            }));
        }
        first
    }

    /// `if-expr := 'if' cond-expr then-expr [ 'else' else-expr ]`
    fn if_expr(&mut self) -> IfExpr {
        let line = self.last.line;
        let condition = self.expression();
        let then_expr = self.expression();
        let else_expr = if self.accept(TokenKind::Else) {
            Some(self.expression())
        } else {
            None
        };
        IfExpr {
            line,
            condition,
            then_expr,
            else_expr,
        }
    }

    /// `menu-expr := 'menu' [ INT ] '{' ( ['default'] opt ':' result )* '}'`
    fn menu_expr(&mut self) -> MenuExpr {
        let line = self.last.line;

        let mut override_columns = -1;
        if self.accept(TokenKind::IntLiteral) {
            override_columns = self.last.ival;
        }

        let mut options = Vec::new();
        let mut results = Vec::new();
        let mut default_option = -1;

        self.expect(TokenKind::LeftBrace);
        while self.sym != TokenKind::RightBrace && self.sym != TokenKind::Finished {
            if self.accept(TokenKind::Default) {
                if default_option != -1 {
                    self.diag.warning_at(
                        &self.file,
                        line,
                        ErrorCode::UnexpectedSymbol,
                        "menu has more than one default option",
                    );
                }
                default_option = options.len() as i32;
            }
            options.push(self.expression());
            self.expect(TokenKind::Colon);
            results.push(self.expression());
        }
        self.expect(TokenKind::RightBrace);

        let (columns, default_columns) = if override_columns != -1 {
            (override_columns as u32, false)
        } else {
            (options.len() as u32, true)
        };

        MenuExpr {
            line,
            options,
            results,
            columns,
            default_columns,
            default_option,
        }
    }

    /// `bounded-expr := ('byte'|'short'|'long') [ '[' INT ']' ] expr`
    fn bounded_expr(&mut self) -> BoundedExpr {
        let size = if self.accept(TokenKind::Byte) {
            1
        } else if self.accept(TokenKind::Short) {
            2
        } else {
            self.expect(TokenKind::Long);
            4
        };
        let line = self.last.line;

        let mut index = -1;
        if self.accept(TokenKind::LeftBracket) {
            self.expect(TokenKind::IntLiteral);
            index = self.last.ival;
            self.expect(TokenKind::RightBracket);
        }

        BoundedExpr {
            line,
            size,
            index,
            expr: self.expression(),
        }
    }

    /// `count-expr := 'count' '(' STRING [ ',' INT [ ',' INT ] ] ')'`
    fn count_expr(&mut self) -> CountExpr {
        let line = self.last.line;
        let mut offset = 0;
        let mut multiple = 1;

        self.expect(TokenKind::LeftParen);
        self.expect(TokenKind::StringLiteral);
        let id = self.last.sval.clone();

        if self.accept(TokenKind::Comma) {
            self.expect(TokenKind::IntLiteral);
            offset = self.last.ival;
            if self.accept(TokenKind::Comma) {
                self.expect(TokenKind::IntLiteral);
                multiple = self.last.ival;
            }
        }
        self.expect(TokenKind::RightParen);

        CountExpr {
            line,
            id,
            offset,
            multiple,
            set: false,
            value: 0,
            cached: RefCell::new(Value::Null),
        }
    }

    /// `setcount-expr := 'setcount' '(' STRING ',' INT ')'`
    fn setcount_expr(&mut self) -> CountExpr {
        let line = self.last.line;

        self.expect(TokenKind::LeftParen);
        self.expect(TokenKind::StringLiteral);
        let id = self.last.sval.clone();
        self.expect(TokenKind::Comma);
        self.expect(TokenKind::IntLiteral);
        let value = self.last.ival;
        self.expect(TokenKind::RightParen);

        CountExpr {
            line,
            id,
            offset: 0,
            multiple: 1,
            set: true,
            value,
            cached: RefCell::new(Value::Null),
        }
    }

    /// `command-def := 'command' ident [ '(' params ')' ] expr`
    fn command_def(&mut self) -> CommandDef {
        let line = self.last.line;
        self.expect(TokenKind::Identifier);
        let name = self.last.sval.clone();

        let mut params = Vec::new();
        if self.accept(TokenKind::LeftParen) {
            if self.sym != TokenKind::RightParen {
                self.expect(TokenKind::Identifier);
                params.push(self.last.sval.clone());
            }
            while self.sym != TokenKind::RightParen && self.sym != TokenKind::Finished {
                if !self.expect(TokenKind::Comma) {
                    break;
                }
                if !self.expect(TokenKind::Identifier) {
                    break;
                }
                params.push(self.last.sval.clone());
            }
            self.expect(TokenKind::RightParen);
        }

        let body = self.expression();

        // A block body runs in the invocation scope directly, so that the
        // argument bindings are visible to it.
        if let Expr::Block(block_expr) = body.as_ref() {
            block_expr.block.no_scope.set(true);
        }

        CommandDef {
            line,
            name,
            params,
            body,
            parent_scope: RefCell::new(None),
            executing: Cell::new(false),
        }
    }

    /// `const-def := 'define' ident '=' expr`
    fn const_def(&mut self) -> ConstDef {
        let line = self.last.line;
        self.expect(TokenKind::Identifier);
        let name = self.last.sval.clone();
        self.expect(TokenKind::Equals);
        ConstDef {
            line,
            name,
            value: self.expression(),
            evaluating: Cell::new(false),
        }
    }

    /// `fac := 'flag' primary | '(' expr ')' | 'not' fac | primary`
    fn factor(&mut self) -> Rc<Expr> {
        if self.accept(TokenKind::Flag) {
            let line = self.last.line;
            return Rc::new(Expr::Flag(FlagExpr {
                line,
                expr: self.primary_expr(),
            }));
        }

        if self.accept(TokenKind::LeftParen) {
            let expr = self.expression();
            self.expect(TokenKind::RightParen);
            return expr;
        }

        // 'not' associates tightly.
        if self.accept(TokenKind::Not) {
            return Rc::new(Expr::Not(NotExpr {
                line: self.last.line,
                a: self.factor(),
            }));
        }

        self.primary_expr()
    }

    /// `primary := count-expr | setcount-expr | INT | STRING
    ///           | ident [ '.' ident ] [ '(' args ')' ]`
    fn primary_expr(&mut self) -> Rc<Expr> {
        if self.accept(TokenKind::Count) {
            return Rc::new(Expr::Count(self.count_expr()));
        }
        if self.accept(TokenKind::SetCount) {
            return Rc::new(Expr::Count(self.setcount_expr()));
        }
        if self.accept(TokenKind::IntLiteral) {
            return Rc::new(Expr::Int(IntLiteral {
                line: self.last.line,
                value: self.last.ival,
            }));
        }
        if self.accept(TokenKind::StringLiteral) {
            return Rc::new(Expr::Str(StringLiteral {
                line: self.last.line,
                value: self.last.sval.clone(),
            }));
        }

        if self.accept(TokenKind::Identifier) {
            let line = self.last.line;
            let mut module = String::new();
            let mut name = self.last.sval.clone();

            // A module-qualified reference.
            if self.accept(TokenKind::Period) {
                module = name;
                self.expect(TokenKind::Identifier);
                name = self.last.sval.clone();
            }

            let mut args = Vec::new();
            let mut has_parens = false;
            if self.accept(TokenKind::LeftParen) {
                has_parens = true;
                if self.sym != TokenKind::RightParen {
                    args.push(self.expression());
                }
                while self.sym != TokenKind::RightParen && self.sym != TokenKind::Finished {
                    self.expect(TokenKind::Comma);
                    args.push(self.expression());
                }
                self.expect(TokenKind::RightParen);
            }

            return Rc::new(Expr::Ident(IdentExpr {
                line,
                module,
                name,
                args,
                has_parens,
            }));
        }

        // Nothing fits; consume the offending token and keep going.
        self.getsym();
        let message = format!("unexpected symbol '{}'", self.last.describe());
        self.diag
            .error_at(&self.file, self.last.line, ErrorCode::UnexpectedSymbol, &message);
        Rc::new(Expr::Error(ErrorExpr {
            line: self.last.line,
            message,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> (Program, Rc<Diagnostics>) {
        let diag = Diagnostics::new();
        let mut parser = Parser::new(source, "test.ccs", &diag);
        (parser.parse(), diag)
    }

    #[test]
    fn test_imports() {
        let (program, diag) = parse("import town\nimport \"extra.lib\"\n\"x\"");
        assert!(!diag.has_errors());
        assert_eq!(program.imports, vec!["town.ccs", "extra.lib"]);
        assert_eq!(program.stmts.len(), 1);
    }

    #[test]
    fn test_const_and_command() {
        let (program, diag) = parse("define greeting = \"hi\"\ncommand twice(a) { a a }");
        assert!(!diag.has_errors());
        assert_eq!(program.stmts.len(), 2);
        match &program.stmts[0] {
            Stmt::ConstDef(c) => assert_eq!(c.name, "greeting"),
            other => panic!("expected const, got {:?}", other),
        }
        match &program.stmts[1] {
            Stmt::CommandDef(c) => {
                assert_eq!(c.name, "twice");
                assert_eq!(c.params, vec!["a"]);
                // Block bodies keep the invocation scope.
                match c.body.as_ref() {
                    Expr::Block(b) => assert!(b.block.no_scope.get()),
                    other => panic!("expected block body, got {:?}", other),
                }
            }
            other => panic!("expected command, got {:?}", other),
        }
    }

    #[test]
    fn test_label_vs_identifier() {
        let (program, diag) = parse("start: start");
        assert!(!diag.has_errors());
        assert_eq!(program.stmts.len(), 2);
        match &program.stmts[0] {
            Stmt::Expr(e) => assert!(matches!(e.expr.as_ref(), Expr::Label(_))),
            other => panic!("expected label stmt, got {:?}", other),
        }
        match &program.stmts[1] {
            Stmt::Expr(e) => assert!(matches!(e.expr.as_ref(), Expr::Ident(_))),
            other => panic!("expected ident stmt, got {:?}", other),
        }
    }

    #[test]
    fn test_rom_statements() {
        let (program, diag) = parse("ROM[0xF00000] = \"a\"\nROMTBL[0xF10000, 4, 2] = 9");
        assert!(!diag.has_errors());
        match &program.stmts[0] {
            Stmt::RomWrite(w) => {
                assert!(w.size.is_none());
                assert!(w.index.is_none());
            }
            other => panic!("expected ROM write, got {:?}", other),
        }
        match &program.stmts[1] {
            Stmt::RomWrite(w) => {
                assert!(w.size.is_some());
                assert!(w.index.is_some());
            }
            other => panic!("expected ROMTBL write, got {:?}", other),
        }
    }

    #[test]
    fn test_menu_with_default_and_columns() {
        let (program, diag) = parse("menu 3 { \"a\": \"x\" default \"b\": \"y\" }");
        assert!(!diag.has_errors());
        match &program.stmts[0] {
            Stmt::Expr(e) => match e.expr.as_ref() {
                Expr::Menu(m) => {
                    assert_eq!(m.columns, 3);
                    assert!(!m.default_columns);
                    assert_eq!(m.default_option, 1);
                    assert_eq!(m.options.len(), 2);
                }
                other => panic!("expected menu, got {:?}", other),
            },
            other => panic!("expected expr stmt, got {:?}", other),
        }
    }

    #[test]
    fn test_and_or_not_nesting() {
        let (program, diag) = parse("not flag 1 and flag 2");
        assert!(!diag.has_errors());
        match &program.stmts[0] {
            Stmt::Expr(e) => match e.expr.as_ref() {
                Expr::And(a) => {
                    assert!(matches!(a.a.as_ref(), Expr::Not(_)));
                    assert!(matches!(a.b.as_ref(), Expr::Flag(_)));
                }
                other => panic!("expected and, got {:?}", other),
            },
            other => panic!("expected expr stmt, got {:?}", other),
        }
    }

    #[test]
    fn test_bounded_with_index() {
        let (program, diag) = parse("byte[1] 0x1234");
        assert!(!diag.has_errors());
        match &program.stmts[0] {
            Stmt::Expr(e) => match e.expr.as_ref() {
                Expr::Bounded(b) => {
                    assert_eq!(b.size, 1);
                    assert_eq!(b.index, 1);
                }
                other => panic!("expected bounded, got {:?}", other),
            },
            other => panic!("expected expr stmt, got {:?}", other),
        }
    }

    #[test]
    fn test_error_recovery() {
        let (program, diag) = parse(") \"ok\"");
        assert!(diag.has_errors());
        // The bad token becomes an error expression; parsing continues.
        assert_eq!(program.stmts.len(), 2);
    }
}
