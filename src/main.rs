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

//! CCScript Compiler CLI
//!
//! Compiles CCScript source modules and patches the result into a ROM
//! image.

use clap::Parser;
use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;

use ccscript::error::Diagnostics;
use ccscript::linker::Linker;

/// ccsc - the CCScript compiler
#[derive(Parser, Debug)]
#[command(name = "ccsc")]
#[command(version)]
#[command(about = "Compiles CCScript source modules into a game ROM image")]
#[command(long_about = r#"
ccsc compiles one or more CCScript source modules together and patches
the compiled text directly into a ROM image at the given virtual
address.

Addresses are given as hex HiROM offsets, e.g. F00000.

Example:

  ccsc -o game.smc -s F20000 town.ccs cave.ccs castle.ccs

This compiles the three modules together and places the resulting text
starting at $F20000 in game.smc. A reset file written next to the ROM
makes recompilation against the same image idempotent.
"#)]
struct Cli {
    /// Source files to compile (.ccs)
    #[arg(required = true)]
    source_files: Vec<PathBuf>,

    /// ROM image to patch
    #[arg(short, long)]
    output: PathBuf,

    /// Virtual address at which output begins (hex)
    #[arg(short, long)]
    start: Option<String>,

    /// Do not write at or past this virtual address (hex)
    #[arg(short, long)]
    end: Option<String>,

    /// Do not use a reset file to refresh the ROM image
    #[arg(short = 'n', long = "no-reset")]
    no_reset: bool,

    /// Directory searched for libraries
    #[arg(long)]
    libs: Option<PathBuf>,

    /// Do not include the default standard libraries
    #[arg(long)]
    nostdlibs: bool,

    /// Write a compilation summary to a file
    #[arg(long)]
    summary: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn parse_address(text: &str) -> Option<u32> {
    let trimmed = text.trim_start_matches("0x").trim_start_matches('$');
    u32::from_str_radix(trimmed, 16).ok()
}

/// The default library directory: `lib` beside the compiler binary.
fn default_lib_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("lib")))
        .unwrap_or_else(|| PathBuf::from("lib"))
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let out_adr = match &cli.start {
        Some(text) => match parse_address(text) {
            Some(adr) => adr,
            None => {
                eprintln!("argument error: bad start address '{}'", text);
                return ExitCode::from(2);
            }
        },
        // Default to the start of the HiROM file.
        None => 0xC00000,
    };

    let end_adr = match &cli.end {
        Some(text) => match parse_address(text) {
            Some(adr) => adr,
            None => {
                eprintln!("argument error: bad end address '{}'", text);
                return ExitCode::from(2);
            }
        },
        None => 0,
    };

    let diag = Diagnostics::new();

    let mut linker = match Linker::new(&cli.output, out_adr, end_adr, &diag) {
        Ok(linker) => linker,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::from(1);
        }
    };

    linker.lib_dir = cli.libs.unwrap_or_else(default_lib_dir);
    linker.no_reset = cli.no_reset;
    linker.no_stdlibs = cli.nostdlibs;
    linker.verbose = cli.verbose;

    for file in &cli.source_files {
        linker.load_module(file);
    }

    linker.compile();
    linker.write_output();

    for entry in diag.entries() {
        eprintln!("{}", entry.message);
    }
    if cli.verbose || diag.error_count() > 0 || diag.warning_count() > 0 {
        eprintln!();
        eprintln!("{}", diag.tally());
    }

    if let Some(summary_path) = &cli.summary {
        match File::create(summary_path) {
            Ok(mut file) => {
                if let Err(e) = linker.write_summary(&mut file) {
                    eprintln!("Couldn't write summary file: {}", e);
                    return ExitCode::from(1);
                }
            }
            Err(_) => {
                eprintln!(
                    "Couldn't open {} to write summary file.",
                    summary_path.display()
                );
                return ExitCode::from(1);
            }
        }
    }

    if linker.failed() {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    }
}
