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

//! Error types for the CCScript compiler.
//!
//! This module defines all error types used throughout the compiler,
//! plus the shared [`Diagnostics`] collector. Most of the pipeline is
//! error-tolerant: the lexer, parser, and evaluator record diagnostics
//! and keep going so that one run surfaces as many problems as possible.
//! Fatal conditions (layout, I/O, bad buffer slices) are carried as
//! [`CompileError`] values instead.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use thiserror::Error;

/// Error codes for the compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Lexical errors (E001-E007)
    UnexpectedCharacter,
    UnterminatedString,
    NewlineInString,
    UnrecognizedEscape,
    InvalidNumberSuffix,
    IntegerOverflow,
    UnterminatedComment,

    // Syntax errors (E100-E103)
    ExpectedToken,
    UnexpectedSymbol,
    UnterminatedExpression,
    InvalidControlCode,

    // Name errors (E200-E207)
    UndefinedIdentifier,
    RepeatDefinition,
    AmbiguousIdentifier,
    ModuleNameCollision,
    InvalidModuleName,
    NonexistentModule,
    MissingModule,
    ModuleFailed,

    // Scope errors (E210-E211)
    NotAtRoot,
    CrossModuleLocal,

    // Recursion and arity errors (E220-E221)
    RecursionDetected,
    WrongArgumentCount,

    // Type errors (E230-E232)
    ConstWithParens,
    LabelWithParens,
    InternalLookupFailed,

    // Buffer errors (E300-E301)
    SubstringOutOfRange,
    TruncatedAnchor,

    // Layout errors (E400-E405)
    ModuleTooLarge,
    PastEndAddress,
    OutOfBanks,
    BadVirtualAddress,
    WritePastEndOfRom,
    BadRomSize,

    // I/O errors (E500-E501)
    FileOpen,
    FileWrite,
}

impl ErrorCode {
    /// Get the stable code string for this error.
    pub fn code(&self) -> &'static str {
        match self {
            ErrorCode::UnexpectedCharacter => "E001",
            ErrorCode::UnterminatedString => "E002",
            ErrorCode::NewlineInString => "E003",
            ErrorCode::UnrecognizedEscape => "E004",
            ErrorCode::InvalidNumberSuffix => "E005",
            ErrorCode::IntegerOverflow => "E006",
            ErrorCode::UnterminatedComment => "E007",

            ErrorCode::ExpectedToken => "E100",
            ErrorCode::UnexpectedSymbol => "E101",
            ErrorCode::UnterminatedExpression => "E102",
            ErrorCode::InvalidControlCode => "E103",

            ErrorCode::UndefinedIdentifier => "E200",
            ErrorCode::RepeatDefinition => "E201",
            ErrorCode::AmbiguousIdentifier => "E202",
            ErrorCode::ModuleNameCollision => "E203",
            ErrorCode::InvalidModuleName => "E204",
            ErrorCode::NonexistentModule => "E205",
            ErrorCode::MissingModule => "E206",
            ErrorCode::ModuleFailed => "E207",

            ErrorCode::NotAtRoot => "E210",
            ErrorCode::CrossModuleLocal => "E211",

            ErrorCode::RecursionDetected => "E220",
            ErrorCode::WrongArgumentCount => "E221",

            ErrorCode::ConstWithParens => "E230",
            ErrorCode::LabelWithParens => "E231",
            ErrorCode::InternalLookupFailed => "E232",

            ErrorCode::SubstringOutOfRange => "E300",
            ErrorCode::TruncatedAnchor => "E301",

            ErrorCode::ModuleTooLarge => "E400",
            ErrorCode::PastEndAddress => "E401",
            ErrorCode::OutOfBanks => "E402",
            ErrorCode::BadVirtualAddress => "E403",
            ErrorCode::WritePastEndOfRom => "E404",
            ErrorCode::BadRomSize => "E405",

            ErrorCode::FileOpen => "E500",
            ErrorCode::FileWrite => "E501",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// A fatal compiler error.
///
/// Used for conditions that abort the current pipeline step: bad buffer
/// slices, layout failures, and I/O problems. Recoverable problems go
/// through [`Diagnostics`] instead.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct CompileError {
    /// The error code.
    pub code: ErrorCode,
    /// The error message.
    pub message: String,
}

impl CompileError {
    /// Create a new compile error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Result type for fallible compiler operations.
pub type Result<T> = std::result::Result<T, CompileError>;

/// A single recorded diagnostic, already formatted for display.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// The error code.
    pub code: ErrorCode,
    /// The formatted message, including any file/line prefix.
    pub message: String,
    /// True for warnings, false for errors.
    pub warning: bool,
}

/// Shared collector for compiler diagnostics.
///
/// Module-level entries are formatted as `<file>, line <n>: [warning: ]<msg>`;
/// linker-level entries have no location prefix. Entries are kept in emission
/// order so the final report reads like the compilation ran.
#[derive(Debug, Default)]
pub struct Diagnostics {
    entries: RefCell<Vec<Diagnostic>>,
    errors: Cell<usize>,
    warnings: Cell<usize>,
}

impl Diagnostics {
    /// Create a new shared diagnostics collector.
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Record an error at a source location.
    pub fn error_at(&self, file: &str, line: i32, code: ErrorCode, message: impl AsRef<str>) {
        self.push(
            code,
            format!("{}, line {}: {}", file, line, message.as_ref()),
            false,
        );
    }

    /// Record a warning at a source location.
    pub fn warning_at(&self, file: &str, line: i32, code: ErrorCode, message: impl AsRef<str>) {
        self.push(
            code,
            format!("{}, line {}: warning: {}", file, line, message.as_ref()),
            true,
        );
    }

    /// Record an error with no source location (linker-level).
    pub fn error(&self, code: ErrorCode, message: impl AsRef<str>) {
        self.push(code, format!("error: {}", message.as_ref()), false);
    }

    /// Record a warning with no source location.
    pub fn warning(&self, code: ErrorCode, message: impl AsRef<str>) {
        self.push(code, format!("warning: {}", message.as_ref()), true);
    }

    fn push(&self, code: ErrorCode, message: String, warning: bool) {
        if warning {
            self.warnings.set(self.warnings.get() + 1);
        } else {
            self.errors.set(self.errors.get() + 1);
        }
        self.entries.borrow_mut().push(Diagnostic {
            code,
            message,
            warning,
        });
    }

    /// Number of errors recorded so far.
    pub fn error_count(&self) -> usize {
        self.errors.get()
    }

    /// Number of warnings recorded so far.
    pub fn warning_count(&self) -> usize {
        self.warnings.get()
    }

    /// True if any error has been recorded.
    pub fn has_errors(&self) -> bool {
        self.errors.get() > 0
    }

    /// A snapshot of all recorded diagnostics, in emission order.
    pub fn entries(&self) -> Vec<Diagnostic> {
        self.entries.borrow().clone()
    }

    /// True if any recorded diagnostic carries the given code.
    pub fn has_code(&self, code: ErrorCode) -> bool {
        self.entries.borrow().iter().any(|d| d.code == code)
    }

    /// The final tally line.
    pub fn tally(&self) -> String {
        format!(
            "{} error(s), {} warning(s)",
            self.errors.get(),
            self.warnings.get()
        )
    }
}
