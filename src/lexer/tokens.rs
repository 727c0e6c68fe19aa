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

//! Token definitions.

/// The kind of a lexed token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// End of input.
    Finished,
    Identifier,
    IntLiteral,
    StringLiteral,
    If,
    Else,
    Menu,
    Default,
    Define,
    Command,
    And,
    Or,
    Not,
    Flag,
    Byte,
    Short,
    Long,
    Rom,
    RomTbl,
    Import,
    Count,
    SetCount,
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    LeftBracket,
    RightBracket,
    Period,
    Colon,
    Comma,
    Equals,
    /// A token the lexer could not form.
    Error,
}

impl TokenKind {
    /// Human-readable name, used in "expected X, found Y" messages.
    pub fn describe(&self) -> &'static str {
        match self {
            TokenKind::Finished => "end of file",
            TokenKind::Identifier => "identifier",
            TokenKind::IntLiteral => "int literal",
            TokenKind::StringLiteral => "string literal",
            TokenKind::If => "if",
            TokenKind::Else => "else",
            TokenKind::Menu => "menu",
            TokenKind::Default => "default",
            TokenKind::Define => "define",
            TokenKind::Command => "command",
            TokenKind::And => "and",
            TokenKind::Or => "or",
            TokenKind::Not => "not",
            TokenKind::Flag => "flag",
            TokenKind::Byte => "byte",
            TokenKind::Short => "short",
            TokenKind::Long => "long",
            TokenKind::Rom => "ROM",
            TokenKind::RomTbl => "ROMTBL",
            TokenKind::Import => "import",
            TokenKind::Count => "count",
            TokenKind::SetCount => "setcount",
            TokenKind::LeftParen => "(",
            TokenKind::RightParen => ")",
            TokenKind::LeftBrace => "{",
            TokenKind::RightBrace => "}",
            TokenKind::LeftBracket => "[",
            TokenKind::RightBracket => "]",
            TokenKind::Period => ".",
            TokenKind::Colon => ":",
            TokenKind::Comma => ",",
            TokenKind::Equals => "=",
            TokenKind::Error => "INVALID SYMBOL",
        }
    }
}

/// Map an identifier to its keyword kind, if it is one.
pub fn keyword(ident: &str) -> Option<TokenKind> {
    Some(match ident {
        "if" => TokenKind::If,
        "else" => TokenKind::Else,
        "menu" => TokenKind::Menu,
        "default" => TokenKind::Default,
        "define" => TokenKind::Define,
        "command" => TokenKind::Command,
        "or" => TokenKind::Or,
        "and" => TokenKind::And,
        "not" => TokenKind::Not,
        "flag" => TokenKind::Flag,
        "byte" => TokenKind::Byte,
        "short" => TokenKind::Short,
        "long" => TokenKind::Long,
        "ROM" => TokenKind::Rom,
        "ROMTBL" => TokenKind::RomTbl,
        "import" => TokenKind::Import,
        "count" => TokenKind::Count,
        "setcount" => TokenKind::SetCount,
        _ => return None,
    })
}

/// A lexed token with its source line and payload.
#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub line: i32,
    /// Integer payload for int literals.
    pub ival: i32,
    /// String payload for identifiers and string literals.
    pub sval: String,
    /// String-type tag: `!` or `~` for tagged strings, space otherwise.
    pub stype: char,
}

impl Default for Token {
    fn default() -> Self {
        Self {
            kind: TokenKind::Error,
            line: 0,
            ival: 0,
            sval: String::new(),
            stype: ' ',
        }
    }
}

impl Token {
    /// Render the token as it appeared in source, for error messages.
    pub fn describe(&self) -> String {
        match self.kind {
            TokenKind::StringLiteral => {
                if self.stype == ' ' {
                    format!("\"{}\"", self.sval)
                } else {
                    format!("{}\"{}\"", self.stype, self.sval)
                }
            }
            TokenKind::Identifier | TokenKind::IntLiteral => self.sval.clone(),
            TokenKind::Finished | TokenKind::Error => "INVALID_TOKEN".to_string(),
            kind => kind.describe().to_string(),
        }
    }
}
