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

//! The linker: the top-level compilation pipeline.
//!
//! Drives the whole run against one ROM image:
//!
//! 1. undo the previous run via the reset file,
//! 2. resolve imports over a work list (adding the standard libraries),
//! 3. evaluate every module,
//! 4. pack modules into 64 KiB banks, largest first,
//! 5. resolve references and write module code into the image,
//! 6. apply deferred ROM writes, snapshotting prior contents,
//! 7. emit the new reset file, and
//! 8. write the patched image back to disk.
//!
//! Layout problems are fatal: they surface as a recorded error and mark
//! the whole compilation failed, after which output steps are skipped.

pub mod reset;
pub mod rom;
pub mod romwrite;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::error::{CompileError, Diagnostics, ErrorCode, Result};
use crate::module::{Module, Project};
use reset::WriteRecord;
use rom::RomImage;

/// The top-level compiler state.
#[derive(Debug)]
pub struct Linker {
    project: Rc<Project>,
    rom: RomImage,
    rom_path: PathBuf,
    out_adr: u32,
    end_adr: u32,

    /// Directory searched for libraries and implicit imports.
    pub lib_dir: PathBuf,
    /// Skip reset-file handling entirely.
    pub no_reset: bool,
    /// Do not implicitly import the standard libraries.
    pub no_stdlibs: bool,
    /// Narrate progress on stderr.
    pub verbose: bool,

    actual_start: Option<u32>,
    actual_end: Option<u32>,
    total_frag: u32,
    write_records: Vec<WriteRecord>,
}

impl Linker {
    /// Create a linker targeting the given ROM image and output address
    /// range. `end_adr` of zero means no limit.
    pub fn new(rom_path: &Path, out_adr: u32, end_adr: u32, diag: &Rc<Diagnostics>) -> Result<Self> {
        let rom = RomImage::load(rom_path)?;

        if rom.map_virtual(out_adr).is_none() {
            return Err(CompileError::new(
                ErrorCode::BadVirtualAddress,
                format!("bad virtual address for start: {:x}", out_adr),
            ));
        }
        if end_adr != 0 && rom.map_virtual(end_adr).is_none() {
            return Err(CompileError::new(
                ErrorCode::BadVirtualAddress,
                format!("bad virtual address for end: {:x}", end_adr),
            ));
        }

        Ok(Self {
            project: Project::new(diag),
            rom,
            rom_path: rom_path.to_path_buf(),
            out_adr,
            end_adr,
            lib_dir: PathBuf::from("lib"),
            no_reset: false,
            no_stdlibs: false,
            verbose: false,
            actual_start: None,
            actual_end: None,
            total_frag: 0,
            write_records: Vec::new(),
        })
    }

    /// The shared project state.
    pub fn project(&self) -> &Rc<Project> {
        &self.project
    }

    /// True once any error has been recorded.
    pub fn failed(&self) -> bool {
        self.project.diag.has_errors()
    }

    /// Load, parse, and pre-typecheck one source file, registering it in
    /// the project. Returns None (with diagnostics recorded) on failure.
    pub fn load_module(&mut self, path: &Path) -> Option<Rc<Module>> {
        let diag = Rc::clone(&self.project.diag);
        let module = match Module::load(path, &diag, &self.project.counters) {
            Ok(module) => module,
            Err(e) => {
                diag.error(e.code, &e.message);
                return None;
            }
        };

        if module.failed() {
            return None;
        }

        if self.project.module(module.name()).is_some() {
            diag.error(
                ErrorCode::ModuleNameCollision,
                format!(
                    "attempt to redefine module {}; module names must be unique",
                    module.name()
                ),
            );
            return None;
        }

        self.project.add_module(&module);
        Some(module)
    }

    /// Run the compilation pipeline. Errors are recorded as diagnostics;
    /// check [`failed`](Self::failed) afterwards.
    pub fn compile(&mut self) {
        if self.failed() {
            return;
        }

        if self.verbose {
            eprintln!("Compiling modules...");
        }

        let reset_path = PathBuf::from(format!("{}.reset.txt", self.rom_path.display()));

        if let Err(e) = self.run_pipeline(&reset_path) {
            self.project.diag.error(e.code, &e.message);
        }
    }

    fn run_pipeline(&mut self, reset_path: &Path) -> Result<()> {
        if !self.no_reset {
            reset::apply(reset_path, &mut self.rom, self.verbose);
        }

        self.process_imports()?;
        self.evaluate_modules()?;
        self.assign_addresses()?;
        self.output_modules()?;
        self.apply_rom_writes()?;

        if !self.failed() && !self.no_reset {
            let range = match (self.actual_start, self.actual_end) {
                (Some(start), Some(end)) => Some((start, end)),
                _ => None,
            };
            reset::write(reset_path, range, &self.write_records)?;
        }

        Ok(())
    }

    /// Write the patched image back to the output file.
    pub fn write_output(&self) {
        if self.failed() {
            return;
        }
        if std::fs::write(&self.rom_path, self.rom.data()).is_err() {
            self.project.diag.error(
                ErrorCode::FileWrite,
                format!("failed to open file {} for writing.", self.rom_path.display()),
            );
        }
    }

    //
    // Import resolution
    //

    /// Work-list traversal of the import graph.
    ///
    /// Each module's imports are searched relative to the importing file,
    /// then the working directory, then the library directory. Loaded
    /// modules are deduplicated by name; a second import of a loaded name
    /// is valid only when it resolves to the same file.
    fn process_imports(&mut self) -> Result<()> {
        let mut remaining = self.project.modules();

        while let Some(module) = remaining.pop() {
            if !self.no_stdlibs {
                module.add_import(&self.lib_dir.join("std.ccs").to_string_lossy());
                module.add_import(&self.lib_dir.join("stdarg.ccs").to_string_lossy());
            }

            let module_dir = module
                .filename()
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default();

            for import in module.imports() {
                let name = Module::name_from_filename(Path::new(&import));

                let imported = match self.project.module(&name) {
                    Some(existing) => {
                        // Re-importing a loaded module is fine only when
                        // the import resolves to the very same file.
                        let new_path = self.find_module(&import, &module_dir);
                        let same = new_path
                            .as_deref()
                            .map(|p| paths_equivalent(p, existing.filename()))
                            .unwrap_or(false);
                        if !same {
                            return Err(CompileError::new(
                                ErrorCode::ModuleNameCollision,
                                format!(
                                    "attempted to import {}; module name collides with {}",
                                    import,
                                    existing.filename().display()
                                ),
                            ));
                        }
                        existing
                    }
                    None => match self.find_and_load(&import, &module_dir) {
                        Some(loaded) => {
                            remaining.push(Rc::clone(&loaded));
                            loaded
                        }
                        None => {
                            return Err(CompileError::new(
                                ErrorCode::MissingModule,
                                format!("couldn't find module '{}'", import),
                            ));
                        }
                    },
                };

                module.include(&imported, &self.project);
            }
        }

        Ok(())
    }

    /// Search the include paths for a module file.
    pub fn find_module(&self, name: &str, file_dir: &Path) -> Option<PathBuf> {
        let path = Path::new(name);
        if path.is_absolute() {
            return path.exists().then(|| path.to_path_buf());
        }

        let in_file_dir = file_dir.join(name);
        if in_file_dir.exists() {
            return Some(in_file_dir);
        }
        if path.exists() {
            return Some(path.to_path_buf());
        }
        let in_lib = self.lib_dir.join(name);
        if in_lib.exists() {
            return Some(in_lib);
        }
        None
    }

    fn find_and_load(&mut self, name: &str, file_dir: &Path) -> Option<Rc<Module>> {
        let found = self.find_module(name, file_dir)?;
        self.load_module(&found)
    }

    //
    // Evaluation and layout
    //

    fn evaluate_modules(&mut self) -> Result<()> {
        for module in self.project.modules() {
            if self.verbose && !module.name().starts_with("std") {
                eprintln!("Evaluating {}...", module.filename().display());
            }
            module.execute(&self.project);

            if module.code_size() > 0x10000 {
                return Err(CompileError::new(
                    ErrorCode::ModuleTooLarge,
                    format!("module '{}' exceeds 64KB", module.name()),
                ));
            }
        }
        Ok(())
    }

    /// Pack modules into banks and assign base addresses.
    ///
    /// Repeatedly places the largest remaining module that still fits
    /// before the next 64 KiB bank boundary; when nothing fits, skips to
    /// the next bank (accumulating the gap as fragmentation).
    fn assign_addresses(&mut self) -> Result<()> {
        if self.failed() {
            return Ok(());
        }

        let mut sorted = self.project.modules();
        sorted.sort_by(|a, b| b.code_size().cmp(&a.code_size()));

        let mut base = self.out_adr;
        self.total_frag = 0;
        self.actual_start = None;
        self.actual_end = None;

        while !sorted.is_empty() {
            let mut placed = None;
            for (i, module) in sorted.iter().enumerate() {
                let size = module.code_size() as u32;
                if (base & 0xFFFF) + size <= 0x10000 {
                    if self.end_adr > 0 && base + size >= self.end_adr {
                        return Err(CompileError::new(
                            ErrorCode::PastEndAddress,
                            format!(
                                "module {} exceeded specified end address -- aborting",
                                module.name()
                            ),
                        ));
                    }

                    if self.actual_start.is_none() {
                        self.actual_start = Some(base);
                    }
                    if sorted.len() == 1 {
                        self.actual_end = Some(base + size);
                    }

                    module.set_base_address(base);
                    base += size;
                    placed = Some(i);
                    break;
                }
            }

            match placed {
                Some(i) => {
                    sorted.remove(i);
                }
                None => {
                    let next = RomImage::next_bank(base).ok_or_else(|| {
                        CompileError::new(
                            ErrorCode::OutOfBanks,
                            format!(
                                "ran out of space writing module {}",
                                sorted[0].name()
                            ),
                        )
                    })?;
                    self.total_frag += next - base;
                    base = next;
                }
            }
        }

        Ok(())
    }

    //
    // Output
    //

    fn output_modules(&mut self) -> Result<()> {
        if self.failed() {
            return Ok(());
        }

        if self.verbose {
            eprintln!("Writing output to ROM...");
        }

        for module in self.project.modules() {
            module.resolve_references();

            let offset = self.rom.map_virtual(module.base_address()).ok_or_else(|| {
                CompileError::new(
                    ErrorCode::BadVirtualAddress,
                    format!(
                        "module has bad virtual address ({:x}), aborting",
                        module.base_address()
                    ),
                )
            })?;

            if !self.rom.write_buffer(&module.code().borrow(), offset) {
                return Err(CompileError::new(
                    ErrorCode::WritePastEndOfRom,
                    "attempt to write past end of ROM",
                ));
            }
        }

        Ok(())
    }

    /// Resolve and apply every deferred ROM write, capturing the prior
    /// contents of each site for the reset file.
    fn apply_rom_writes(&mut self) -> Result<()> {
        if self.failed() {
            return Ok(());
        }

        for write in self.project.rom_writes().iter() {
            write.resolve_references();

            let vadr = write.virtual_address();
            let offset = self.rom.map_virtual(vadr).ok_or_else(|| {
                CompileError::new(
                    ErrorCode::BadVirtualAddress,
                    format!("error in ROM write statement: bad virtual address: {:x}", vadr),
                )
            })?;

            let len = write.value.borrow().len();
            let prior = self.rom.snapshot(offset, len);

            if !self.rom.write_buffer(&write.value.borrow(), offset) {
                return Err(CompileError::new(
                    ErrorCode::WritePastEndOfRom,
                    "attempt to write past end of ROM",
                ));
            }

            self.write_records.push(WriteRecord { vadr, prior });
        }

        if self.verbose {
            if let (Some(start), Some(end)) = (self.actual_start, self.actual_end) {
                eprintln!("Final output written from {:x} to {:x}", start, end);
            }
        }

        Ok(())
    }

    //
    // Reporting
    //

    /// Write a human-readable compilation summary.
    pub fn write_summary(&self, out: &mut dyn Write) -> std::io::Result<()> {
        writeln!(out, "{}", self.rom_path.display())?;
        writeln!(out, "CCScript Compilation Summary")?;
        writeln!(out, "============================")?;
        writeln!(out)?;
        writeln!(out)?;

        if self.failed() {
            write!(out, "COMPILATION FAILED")?;
            return Ok(());
        }

        let start = self.actual_start.unwrap_or(0);
        let end = self.actual_end.unwrap_or(start);

        writeln!(out, "Compilation statistics")?;
        writeln!(out, "=================================================================")?;
        writeln!(out, "Compilation start:           ${:x}", start)?;
        writeln!(out, "Compilation end:             ${:x}", end)?;
        writeln!(out, "Total compiled size:         {} bytes", end - start)?;
        writeln!(out, "Fragmented space:            {} bytes", self.total_frag)?;
        writeln!(out, "-----------------------------------------------------------------")?;
        writeln!(out)?;
        writeln!(out)?;

        writeln!(out, "Module information")?;
        writeln!(out, "=================================================================")?;
        writeln!(out, "Name                         Address     Size")?;
        writeln!(out, "-----------------------------------------------------------------")?;
        for module in self.project.modules() {
            writeln!(
                out,
                "{:<29}${:<12x}{:<6} bytes",
                module.name(),
                module.base_address(),
                module.code_size()
            )?;
        }
        writeln!(out, "-----------------------------------------------------------------")?;
        writeln!(out)?;
        writeln!(out)?;

        writeln!(out, "Label locations")?;
        writeln!(out, "=================================================================")?;
        writeln!(out)?;
        for module in self.project.modules() {
            writeln!(out, "Labels in module {}", module.name())?;
            writeln!(out, "Name                         Address")?;
            writeln!(out, "-----------------------------------------------------------------")?;
            for (name, anchor) in module.root().borrow().anchor_entries() {
                // Skip synthesized internal labels.
                if !name.chars().next().map(|c| c.is_ascii_alphabetic()).unwrap_or(false) {
                    continue;
                }
                writeln!(out, "{:<28} ${:x}", name, anchor.target())?;
            }
            writeln!(out, "-----------------------------------------------------------------")?;
            writeln!(out)?;
            writeln!(out)?;
        }

        Ok(())
    }
}

/// Two paths name the same file. Falls back to literal comparison when
/// canonicalization fails.
fn paths_equivalent(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(ca), Ok(cb)) => ca == cb,
        _ => a == b,
    }
}
