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

//! Lowering contracts: the exact byte sequences the evaluator emits for
//! each construct, before and after reference resolution.

use std::path::Path;
use std::rc::Rc;

use ccscript::error::Diagnostics;
use ccscript::{Module, Project};

/// Evaluate a single module from source; return its raw emitted bytes.
fn emit(source: &str) -> Vec<u8> {
    let (bytes, diag) = emit_with_diag(source);
    assert!(
        !diag.has_errors(),
        "unexpected errors: {:?}",
        diag.entries()
    );
    bytes
}

fn emit_with_diag(source: &str) -> (Vec<u8>, Rc<Diagnostics>) {
    let diag = Diagnostics::new();
    let project = Project::new(&diag);
    let module = Module::from_source(Path::new("test.ccs"), source, &diag, &project.counters);
    project.add_module(&module);
    module.execute(&project);
    let bytes = module.code().borrow().bytes().to_vec();
    (bytes, diag)
}

/// Evaluate, assign a base address, and resolve references.
fn emit_resolved(source: &str, base: u32) -> Vec<u8> {
    let diag = Diagnostics::new();
    let project = Project::new(&diag);
    let module = Module::from_source(Path::new("test.ccs"), source, &diag, &project.counters);
    project.add_module(&module);
    module.execute(&project);
    assert!(
        !diag.has_errors(),
        "unexpected errors: {:?}",
        diag.entries()
    );
    module.set_base_address(base);
    module.resolve_references();
    let bytes = module.code().borrow().bytes().to_vec();
    bytes
}

#[test]
fn test_empty_program_emits_nothing() {
    assert!(emit("").is_empty());
}

#[test]
fn test_number_statement_emits_long() {
    assert_eq!(emit("1"), vec![0x01, 0x00, 0x00, 0x00]);
    assert_eq!(emit("-1"), vec![0xFF, 0xFF, 0xFF, 0xFF]);
}

#[test]
fn test_string_characters_are_shifted() {
    assert_eq!(emit("\"A\""), vec![0x71]);
    assert_eq!(emit("\"hi\""), vec![0x98, 0x99]);
}

#[test]
fn test_string_pause_shorthands() {
    assert_eq!(emit("\"/\""), vec![0x10, 0x05]);
    assert_eq!(emit("\"|\""), vec![0x10, 0x0F]);
}

#[test]
fn test_string_code_mode() {
    assert_eq!(emit("\"[1A 2b]\""), vec![0x1A, 0x2B]);
    assert_eq!(emit("\"a[02]b\""), vec![0x91, 0x02, 0x92]);
}

#[test]
fn test_string_expression_splice() {
    assert_eq!(
        emit("\"a{3}b\""),
        vec![0x91, 0x03, 0x00, 0x00, 0x00, 0x92]
    );
}

#[test]
fn test_string_splice_sees_scope() {
    assert_eq!(
        emit("define n = 3 \"a{n}b\""),
        vec![0x91, 0x03, 0x00, 0x00, 0x00, 0x92]
    );
}

#[test]
fn test_if_lowering() {
    // [cond][1B 02 ->false][then][0A ->end] false: end:
    assert_eq!(
        emit_resolved("if 1 { \"A\" }", 0xC00000),
        vec![
            0x01, 0x00, 0x00, 0x00, // condition
            0x1B, 0x02, 0x10, 0x00, 0xC0, 0x00, // iffalse goto .false
            0x71, // then: "A"
            0x0A, 0x10, 0x00, 0xC0, 0x00, // goto .end
                  // .false/.end at offset 16 -> 0xC00010
        ]
    );
}

#[test]
fn test_if_else_lowering() {
    assert_eq!(
        emit_resolved("if 0 { \"A\" } else { \"B\" }", 0xC00000),
        vec![
            0x00, 0x00, 0x00, 0x00, // condition
            0x1B, 0x02, 0x10, 0x00, 0xC0, 0x00, // iffalse goto .false (16)
            0x71, // then: "A"
            0x0A, 0x11, 0x00, 0xC0, 0x00, // goto .end (17)
            0x72, // .false: "B"
        ]
    );
}

#[test]
fn test_menu_lowering() {
    // 19 02 'a' 02 19 02 'b' 02 1C 07 02 11 12 09 02 <opt0> <opt1>
    // 0A <end> opt0: 'x' 0A <end> opt1: 'y' 0A <end> end:
    assert_eq!(
        emit_resolved("menu { \"a\": \"x\" \"b\": \"y\" }", 0xC00000),
        vec![
            0x19, 0x02, 0x91, 0x02, // option "a"
            0x19, 0x02, 0x92, 0x02, // option "b"
            0x1C, 0x07, 0x02, // two-option display, 2 columns
            0x11, 0x12, //
            0x09, 0x02, // multi-jump over 2 options
            0x1C, 0x00, 0xC0, 0x00, // -> .opt0 (28)
            0x22, 0x00, 0xC0, 0x00, // -> .opt1 (34)
            0x0A, 0x28, 0x00, 0xC0, 0x00, // no default: -> .end (40)
            0xA8, // .opt0: "x"
            0x0A, 0x28, 0x00, 0xC0, 0x00, // -> .end
            0xA9, // .opt1: "y"
            0x0A, 0x28, 0x00, 0xC0, 0x00, // -> .end
        ]
    );
}

#[test]
fn test_menu_default_option_and_columns() {
    let bytes = emit_resolved("menu 1 { default \"a\": \"x\" \"b\": \"y\" }", 0xC00000);
    // Overridden column count forces the 1C 0C display command with one
    // column, and the fall-through jump targets .opt0 rather than .end.
    assert_eq!(&bytes[8..11], &[0x1C, 0x0C, 0x01]);
    assert_eq!(&bytes[23..28], &[0x0A, 0x1C, 0x00, 0xC0, 0x00]);
}

#[test]
fn test_and_lowering() {
    assert_eq!(
        emit_resolved("\"a\" and \"b\"", 0xC00000),
        vec![
            0x91, // a
            0x1B, 0x02, 0x08, 0x00, 0xC0, 0x00, // iffalse goto .end (8)
            0x92, // b
        ]
    );
}

#[test]
fn test_or_lowering() {
    assert_eq!(
        emit_resolved("\"a\" or \"b\"", 0xC00000),
        vec![
            0x91, // a
            0x1B, 0x03, 0x08, 0x00, 0xC0, 0x00, // iftrue goto .end (8)
            0x92, // b
        ]
    );
}

#[test]
fn test_not_lowering() {
    assert_eq!(emit("not \"a\""), vec![0x91, 0x0B, 0x00]);
}

#[test]
fn test_flag_keeps_two_bytes() {
    assert_eq!(emit("flag 0x1234"), vec![0x34, 0x12]);
}

#[test]
fn test_flag_in_boolean_position_prepends_load() {
    // As an if condition, the flag value is prefixed with 07.
    let bytes = emit_resolved("if flag 0x1234 { \"A\" }", 0xC00000);
    assert_eq!(&bytes[..3], &[0x07, 0x34, 0x12]);
}

#[test]
fn test_bounded_expressions() {
    assert_eq!(emit("byte 0x1234"), vec![0x34]);
    assert_eq!(emit("short 0x12345678"), vec![0x78, 0x56]);
    assert_eq!(emit("long 5"), vec![0x05, 0x00, 0x00, 0x00]);
    assert_eq!(emit("byte[1] 0x1234"), vec![0x12]);
    // Out-of-range slices are zero-filled.
    assert_eq!(emit("short[3] 0x12345678"), vec![0x00, 0x00]);
    assert_eq!(emit("byte \"\""), vec![0x00]);
}

#[test]
fn test_constant_reevaluates_per_use() {
    assert_eq!(
        emit("define x = \"hi\" x x"),
        vec![0x98, 0x99, 0x98, 0x99]
    );
}

#[test]
fn test_command_invocation_binds_arguments() {
    assert_eq!(emit("command pad(a) { a a } pad(\"x\")"), vec![0xA8, 0xA8]);
}

#[test]
fn test_command_arguments_rebind_per_call() {
    assert_eq!(
        emit("command wrap(a) { \"[02]\" a \"[02]\" } wrap(\"h\") wrap(\"i\")"),
        vec![0x02, 0x98, 0x02, 0x02, 0x99, 0x02]
    );
}

#[test]
fn test_zero_argument_command() {
    assert_eq!(emit("command brk { \"[02]\" } brk"), vec![0x02]);
}

#[test]
fn test_label_reference_resolves() {
    // A label use emits a 4-byte placeholder patched to the label's
    // final address.
    assert_eq!(
        emit_resolved("start: \"A\" start", 0xC00000),
        vec![0x71, 0x00, 0x00, 0xC0, 0x00]
    );
}

#[test]
fn test_forward_label_reference_resolves() {
    assert_eq!(
        emit_resolved("done \"A\" done:", 0xC00000),
        vec![0x05, 0x00, 0xC0, 0x00, 0x71]
    );
}

#[test]
fn test_label_inside_block_expression() {
    // The label's anchor rides along in the block's collected buffer.
    assert_eq!(
        emit_resolved("{ top: \"A\" top }", 0xC00000),
        vec![0x71, 0x00, 0x00, 0xC0, 0x00]
    );
}

#[test]
fn test_count_setcount_ordering() {
    // Counter reads happen in source order during pre-typecheck.
    assert_eq!(
        emit("setcount(\"x\", 5) count(\"x\") count(\"x\", 10, 2)"),
        vec![0x05, 0x00, 0x00, 0x00, 0x16, 0x00, 0x00, 0x00]
    );
}

#[test]
fn test_count_consecutive_values() {
    assert_eq!(
        emit("count(\"q\") count(\"q\")"),
        vec![0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00]
    );
}

#[test]
fn test_count_caches_through_constant() {
    // The count is read once, at pre-typecheck; every use of the
    // constant sees the same cached value.
    assert_eq!(
        emit("define c = count(\"k\") c c"),
        vec![0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]
    );
}

#[test]
fn test_block_expression_value() {
    assert_eq!(emit("define b = { \"A\" \"B\" } b"), vec![0x71, 0x72]);
}

#[test]
fn test_nested_if_through_command() {
    // A command whose body lowers control flow still resolves; the
    // synthesized anchors are unique per invocation.
    let bytes = emit_resolved(
        "command maybe(c, t) { if c { t } } maybe(1, \"A\") maybe(1, \"B\")",
        0xC00000,
    );
    assert_eq!(bytes.len(), 32);
    // First invocation's jumps land at 16; second's at 32.
    assert_eq!(&bytes[4..10], &[0x1B, 0x02, 0x10, 0x00, 0xC0, 0x00]);
    assert_eq!(&bytes[20..26], &[0x1B, 0x02, 0x20, 0x00, 0xC0, 0x00]);
}

#[test]
fn test_rom_write_registers_deferred_write() {
    let diag = Diagnostics::new();
    let project = Project::new(&diag);
    let module = Module::from_source(
        Path::new("test.ccs"),
        "ROM[0xF00000] = \"A\"",
        &diag,
        &project.counters,
    );
    project.add_module(&module);
    module.execute(&project);
    assert!(!diag.has_errors());

    // Nothing lands in the module's own output.
    assert!(module.code().borrow().is_empty());

    let writes = project.rom_writes();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].virtual_address(), 0xF00000);
    assert_eq!(writes[0].value.borrow().bytes(), &[0x71]);
}

#[test]
fn test_romtbl_write_address_arithmetic() {
    let diag = Diagnostics::new();
    let project = Project::new(&diag);
    let module = Module::from_source(
        Path::new("test.ccs"),
        "ROMTBL[0xF00000, 8, 3] = 1",
        &diag,
        &project.counters,
    );
    project.add_module(&module);
    module.execute(&project);
    assert!(!diag.has_errors());

    let writes = project.rom_writes();
    assert_eq!(writes[0].virtual_address(), 0xF00018);
}

#[test]
fn test_rom_write_inside_command_registers_per_invocation() {
    let diag = Diagnostics::new();
    let project = Project::new(&diag);
    let module = Module::from_source(
        Path::new("test.ccs"),
        "command link(n) { ROM[n] = \"A\" } link(0xF00000) link(0xF10000)",
        &diag,
        &project.counters,
    );
    project.add_module(&module);
    module.execute(&project);
    assert!(!diag.has_errors());

    let writes = project.rom_writes();
    assert_eq!(writes.len(), 2);
    assert_eq!(writes[0].virtual_address(), 0xF00000);
    assert_eq!(writes[1].virtual_address(), 0xF10000);
}
