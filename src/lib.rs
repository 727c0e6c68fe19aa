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

//! CCScript Compiler Library
//!
//! CCScript is a small event-scripting language compiled to native
//! game-machine bytecode, patched directly into a ROM image at
//! caller-chosen virtual addresses.
//!
//! # Modules
//!
//! - [`error`] - Error types, error codes, and the diagnostics collector
//! - [`lexer`] - Tokenization of source code
//! - [`parser`] - Parsing tokens into an AST
//! - [`ast`] - Abstract Syntax Tree definitions
//! - [`analyzer`] - Pre-typecheck pass and symbol tables
//! - [`codegen`] - Lowering the AST into code buffers
//! - [`module`] - Source modules and the project registry
//! - [`linker`] - Import resolution, bank layout, and ROM patching
//!
//! # Example
//!
//! ```no_run
//! use ccscript::error::Diagnostics;
//! use ccscript::linker::Linker;
//! use std::path::Path;
//!
//! let diag = Diagnostics::new();
//! let mut linker = Linker::new(Path::new("game.smc"), 0xF00000, 0, &diag)?;
//! linker.no_stdlibs = true;
//! linker.load_module(Path::new("town.ccs"));
//! linker.compile();
//! linker.write_output();
//!
//! for entry in diag.entries() {
//!     eprintln!("{}", entry.message);
//! }
//! # Ok::<(), ccscript::error::CompileError>(())
//! ```

pub mod analyzer;
pub mod ast;
pub mod codegen;
pub mod error;
pub mod lexer;
pub mod linker;
pub mod module;
pub mod parser;

// Re-export commonly used types
pub use codegen::anchor::{Anchor, AnchorRef};
pub use codegen::buffer::{CodeBuffer, Reference};
pub use codegen::value::Value;
pub use error::{CompileError, Diagnostics, ErrorCode};
pub use linker::Linker;
pub use module::{Module, Project};

/// The version of the CCScript compiler.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The name of the compiler.
pub const NAME: &str = "CCScript";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_name() {
        assert_eq!(NAME, "CCScript");
    }
}
