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

//! Modules and the project registry.
//!
//! A [`Module`] owns one parsed source file: its AST, its root symbol
//! table, the import table sitting above the root, its emitted code
//! buffer, and its base virtual address once layout has assigned one.
//!
//! A [`Project`] is the compilation-wide state shared by every module:
//! the diagnostics sink, the loaded-module registry (which import
//! resolution deduplicates by module name), the `count` counter bank,
//! and the deferred ROM writes registered during evaluation.

use std::cell::{Cell, RefCell};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::analyzer::symbol_table::{ScopeRef, SymbolTable};
use crate::analyzer::{check_program, CounterBank};
use crate::ast::{AmbiguousId, Program};
use crate::codegen::buffer::CodeBuffer;
use crate::codegen::value::{MacroRef, Value};
use crate::codegen::EvalContext;
use crate::error::{CompileError, Diagnostics, ErrorCode, Result};
use crate::linker::romwrite::RomAccess;
use crate::parser::Parser;

/// Compilation-wide shared state.
#[derive(Debug)]
pub struct Project {
    pub diag: Rc<Diagnostics>,
    pub counters: CounterBank,
    modules: RefCell<Vec<Rc<Module>>>,
    rom_writes: RefCell<Vec<RomAccess>>,
}

impl Project {
    /// Create a project around a diagnostics sink.
    pub fn new(diag: &Rc<Diagnostics>) -> Rc<Self> {
        Rc::new(Self {
            diag: Rc::clone(diag),
            counters: CounterBank::default(),
            modules: RefCell::new(Vec::new()),
            rom_writes: RefCell::new(Vec::new()),
        })
    }

    /// The loaded module with the given name, if any.
    pub fn module(&self, name: &str) -> Option<Rc<Module>> {
        self.modules
            .borrow()
            .iter()
            .find(|m| m.name() == name)
            .map(Rc::clone)
    }

    /// Register a loaded module.
    pub fn add_module(&self, module: &Rc<Module>) {
        self.modules.borrow_mut().push(Rc::clone(module));
    }

    /// All loaded modules, in load order.
    pub fn modules(&self) -> Vec<Rc<Module>> {
        self.modules.borrow().clone()
    }

    /// Register a deferred ROM write.
    pub fn register_rom_write(&self, write: RomAccess) {
        self.rom_writes.borrow_mut().push(write);
    }

    /// The registered deferred writes, in registration order.
    pub fn rom_writes(&self) -> std::cell::Ref<'_, Vec<RomAccess>> {
        self.rom_writes.borrow()
    }
}

/// One source module.
#[derive(Debug)]
pub struct Module {
    filename: PathBuf,
    /// Cached display form of the filename, used in diagnostics.
    display: String,
    name: String,
    program: RefCell<Program>,
    root: ScopeRef,
    imports_table: ScopeRef,
    imports: RefCell<Vec<String>>,
    code: Rc<RefCell<CodeBuffer>>,
    base_address: Cell<u32>,
    failed: Cell<bool>,
    label_counter: Cell<u32>,
    diag: Rc<Diagnostics>,
}

impl Module {
    /// Load, parse, and pre-typecheck a module from a source file.
    ///
    /// Name and open failures are returned as errors; parse and
    /// pre-typecheck problems are recorded as diagnostics and leave the
    /// module marked failed.
    pub fn load(
        filename: &Path,
        diag: &Rc<Diagnostics>,
        counters: &CounterBank,
    ) -> Result<Rc<Module>> {
        let name = Self::name_from_filename(filename);
        if !Self::check_name(&name) {
            return Err(CompileError::new(
                ErrorCode::InvalidModuleName,
                format!(
                    "module name '{}' invalid. Module names can only contain alphanumeric characters and underscores.",
                    name
                ),
            ));
        }

        let source = std::fs::read_to_string(filename).map_err(|_| {
            CompileError::new(
                ErrorCode::FileOpen,
                format!("couldn't open {}", filename.display()),
            )
        })?;

        Ok(Self::from_source(filename, &source, diag, counters))
    }

    /// Build a module from in-memory source. The filename is used for
    /// module naming and diagnostics only.
    pub fn from_source(
        filename: &Path,
        source: &str,
        diag: &Rc<Diagnostics>,
        counters: &CounterBank,
    ) -> Rc<Module> {
        let display = filename.display().to_string();
        let name = Self::name_from_filename(filename);

        let root = SymbolTable::new();
        let imports_table = SymbolTable::new();
        root.borrow_mut().set_parent(Some(Rc::clone(&imports_table)));

        let module = Rc::new(Module {
            filename: filename.to_path_buf(),
            display: display.clone(),
            name,
            program: RefCell::new(Program::default()),
            root,
            imports_table,
            imports: RefCell::new(Vec::new()),
            code: Rc::new(RefCell::new(CodeBuffer::new())),
            base_address: Cell::new(0),
            failed: Cell::new(false),
            label_counter: Cell::new(0),
            diag: Rc::clone(diag),
        });

        let errors_before = diag.error_count();
        let mut parser = Parser::new(source, &display, diag);
        let program = parser.parse();
        if diag.error_count() > errors_before {
            module.failed.set(true);
            return module;
        }

        *module.imports.borrow_mut() = program.imports.clone();
        check_program(&program, &module.root, &module, counters);
        *module.program.borrow_mut() = program;

        module
    }

    /// Derive a module name from a filename: the basename up to the
    /// first `.`.
    pub fn name_from_filename(filename: &Path) -> String {
        let base = filename
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        match base.find('.') {
            Some(dot) => base[..dot].to_string(),
            None => base,
        }
    }

    /// Check that a module name is valid: alphanumeric and underscores
    /// only, not starting with a digit.
    pub fn check_name(name: &str) -> bool {
        let mut chars = name.chars();
        match chars.next() {
            None => false,
            Some(c) if c.is_ascii_digit() => false,
            Some(c) if !(c.is_ascii_alphanumeric() || c == '_') => false,
            Some(_) => name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'),
        }
    }

    /// The module's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The module's source filename.
    pub fn filename(&self) -> &Path {
        &self.filename
    }

    /// The filename as shown in diagnostics.
    pub fn file_display(&self) -> &str {
        &self.display
    }

    /// The shared diagnostics sink.
    pub fn diag(&self) -> &Rc<Diagnostics> {
        &self.diag
    }

    /// True if parsing or evaluation of the module has failed.
    pub fn failed(&self) -> bool {
        self.failed.get()
    }

    /// Record an error against this module and mark it failed.
    pub fn error(&self, line: i32, code: ErrorCode, message: impl AsRef<str>) {
        self.diag.error_at(&self.display, line, code, message);
        self.failed.set(true);
    }

    /// Record a warning against this module.
    pub fn warning(&self, line: i32, code: ErrorCode, message: impl AsRef<str>) {
        self.diag.warning_at(&self.display, line, code, message);
    }

    /// The module's root symbol table.
    pub fn root(&self) -> ScopeRef {
        Rc::clone(&self.root)
    }

    /// The module's import list.
    pub fn imports(&self) -> Vec<String> {
        self.imports.borrow().clone()
    }

    /// Prepend an implicit import if it is not already present.
    pub fn add_import(&self, name: &str) {
        let mut imports = self.imports.borrow_mut();
        if !imports.iter().any(|i| i == name) {
            imports.insert(0, name.to_string());
        }
    }

    /// Merge another module's root table into this module's import table.
    ///
    /// Colliding names become ambiguous-identifier markers listing every
    /// importing module that defines them; using such a name reports the
    /// candidates.
    pub fn include(&self, other: &Rc<Module>, project: &Project) {
        let mut collisions = Vec::new();
        {
            let other_root = other.root.borrow();
            self.imports_table
                .borrow_mut()
                .merge(&other_root, &mut collisions);
        }

        for name in collisions {
            let existing = self.imports_table.borrow().get(&name);
            if let Some(Value::Macro(MacroRef::Ambiguous(ambiguous))) = existing {
                ambiguous.add_module(other.name());
                continue;
            }

            let ambiguous = Rc::new(AmbiguousId::new(&name));
            for module_name in self.imports_defining(&name, project) {
                ambiguous.add_module(&module_name);
            }
            self.imports_table
                .borrow_mut()
                .define(&name, Value::Macro(MacroRef::Ambiguous(ambiguous)));
        }
    }

    /// Which of this module's imports define the given name.
    fn imports_defining(&self, id: &str, project: &Project) -> Vec<String> {
        let mut result = Vec::new();
        for import in self.imports.borrow().iter() {
            let name = Self::name_from_filename(Path::new(import));
            let Some(module) = project.module(&name) else {
                continue;
            };
            let defines = {
                let root = module.root.borrow();
                root.get(id).is_some() || root.get_anchor(id).is_some()
            };
            if defines && !result.contains(&name) {
                result.push(name);
            }
        }
        result
    }

    /// Evaluate the module's program, collecting output in its code
    /// buffer.
    pub fn execute(self: &Rc<Self>, project: &Rc<Project>) {
        if self.failed.get() {
            self.diag.error(
                ErrorCode::ModuleFailed,
                "There were compilation errors. Cannot execute module.",
            );
            return;
        }
        let mut ctx = EvalContext::for_module(project, self);
        let program = self.program.borrow();
        for stmt in &program.stmts {
            stmt.execute(&self.root, &mut ctx);
        }
    }

    /// The module's emitted code buffer.
    pub fn code(&self) -> Rc<RefCell<CodeBuffer>> {
        Rc::clone(&self.code)
    }

    /// The emitted code size in bytes. Valid after evaluation.
    pub fn code_size(&self) -> usize {
        self.code.borrow().len()
    }

    /// Assign the module's base virtual address: every label anchor is
    /// shifted by it and the code buffer's anchors pick up their final
    /// targets.
    pub fn set_base_address(&self, address: u32) {
        self.base_address.set(address);
        self.root.borrow_mut().add_base_address(address);
        self.code.borrow_mut().set_base_address(address);
    }

    /// The module's assigned base virtual address.
    pub fn base_address(&self) -> u32 {
        self.base_address.get()
    }

    /// Patch every pending reference in the module's code buffer. Valid
    /// once all anchor addresses are computed.
    pub fn resolve_references(&self) {
        self.code.borrow_mut().resolve_references();
    }

    /// A label name unique within this module, for synthesized anchors.
    pub fn unique_label_name(&self) -> String {
        let n = self.label_counter.get();
        self.label_counter.set(n + 1);
        n.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_from_filename() {
        assert_eq!(
            Module::name_from_filename(Path::new("scripts/town.ccs")),
            "town"
        );
        assert_eq!(
            Module::name_from_filename(Path::new("town.v2.ccs")),
            "town"
        );
        assert_eq!(Module::name_from_filename(Path::new("town")), "town");
    }

    #[test]
    fn test_check_name() {
        assert!(Module::check_name("town"));
        assert!(Module::check_name("_hidden2"));
        assert!(!Module::check_name("2town"));
        assert!(!Module::check_name("town-square"));
        assert!(!Module::check_name(""));
    }

    #[test]
    fn test_unique_label_names() {
        let diag = Diagnostics::new();
        let counters = CounterBank::default();
        let module = Module::from_source(Path::new("m.ccs"), "", &diag, &counters);
        assert_eq!(module.unique_label_name(), "0");
        assert_eq!(module.unique_label_name(), "1");
    }

    #[test]
    fn test_parse_failure_marks_module() {
        let diag = Diagnostics::new();
        let counters = CounterBank::default();
        let module = Module::from_source(Path::new("m.ccs"), "define = ", &diag, &counters);
        assert!(module.failed());
    }
}
