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

//! Error-path tests: invalid programs are rejected with the right
//! diagnostics, and evaluation keeps going to surface more of them.

use std::path::Path;
use std::rc::Rc;

use ccscript::error::{Diagnostics, ErrorCode};
use ccscript::{Module, Project};
use test_case::test_case;

/// Compile a single module from source, through evaluation.
fn check(source: &str) -> Rc<Diagnostics> {
    let diag = Diagnostics::new();
    let project = Project::new(&diag);
    let module = Module::from_source(Path::new("test.ccs"), source, &diag, &project.counters);
    project.add_module(&module);
    if !module.failed() {
        module.execute(&project);
    }
    diag
}

// ============================================================================
// Lexical errors
// ============================================================================

#[test_case("\"open", ErrorCode::UnterminatedString; "eof_in_string")]
#[test_case("\"line\nbreak\"", ErrorCode::NewlineInString; "newline_in_string")]
#[test_case("12abc", ErrorCode::InvalidNumberSuffix; "number_suffix")]
#[test_case("@", ErrorCode::UnexpectedCharacter; "stray_at_sign")]
#[test_case("/* never closed", ErrorCode::UnterminatedComment; "unterminated_comment")]
#[test_case("! 5", ErrorCode::UnexpectedCharacter; "bang_without_string")]
fn test_lexical_errors(source: &str, expected: ErrorCode) {
    let diag = check(source);
    assert!(diag.has_code(expected), "entries: {:?}", diag.entries());
}

#[test]
fn test_integer_overflow_warns_and_caps() {
    let diag = check("0x100000000");
    assert!(diag.has_code(ErrorCode::IntegerOverflow));
    assert_eq!(diag.error_count(), 0);
}

// ============================================================================
// Syntax errors
// ============================================================================

#[test_case("define x 1", ErrorCode::ExpectedToken; "define_missing_equals")]
#[test_case("menu { \"a\" \"x\" }", ErrorCode::ExpectedToken; "menu_missing_colon")]
#[test_case("command (a) { a }", ErrorCode::ExpectedToken; "command_missing_name")]
#[test_case("ROM 0xF00000 = 1", ErrorCode::ExpectedToken; "rom_missing_bracket")]
#[test_case(")", ErrorCode::UnexpectedSymbol; "stray_paren")]
fn test_syntax_errors(source: &str, expected: ErrorCode) {
    let diag = check(source);
    assert!(diag.has_code(expected), "entries: {:?}", diag.entries());
}

#[test]
fn test_unterminated_string_splice() {
    let diag = check("\"a{1 b\"");
    assert!(diag.has_code(ErrorCode::UnterminatedExpression));
}

#[test]
fn test_invalid_control_code_warns() {
    let diag = check("\"[zz]\"");
    assert!(diag.has_code(ErrorCode::InvalidControlCode));
    assert_eq!(diag.error_count(), 0);
}

#[test]
fn test_multiple_menu_defaults_warn() {
    let diag = check("menu { default \"a\": \"x\" default \"b\": \"y\" }");
    assert_eq!(diag.warning_count(), 1);
    assert_eq!(diag.error_count(), 0);
}

// ============================================================================
// Name and scope errors
// ============================================================================

#[test_case("nope", ErrorCode::UndefinedIdentifier; "undefined_identifier")]
#[test_case("define x = 1 define x = 2", ErrorCode::RepeatDefinition; "repeat_constant")]
#[test_case("define x = 1 command x { \"a\" }", ErrorCode::RepeatDefinition; "constant_then_command")]
#[test_case("lbl: lbl: \"a\"", ErrorCode::RepeatDefinition; "repeat_label")]
#[test_case("command f(a, a) { a }", ErrorCode::RepeatDefinition; "repeat_parameter")]
#[test_case("{ define x = 1 }", ErrorCode::NotAtRoot; "constant_in_block")]
#[test_case("{ command f { \"a\" } }", ErrorCode::NotAtRoot; "command_in_block")]
#[test_case("q.z", ErrorCode::NonexistentModule; "unknown_module_qualifier")]
fn test_name_errors(source: &str, expected: ErrorCode) {
    let diag = check(source);
    assert!(diag.has_code(expected), "entries: {:?}", diag.entries());
}

// ============================================================================
// Recursion, arity, and type errors
// ============================================================================

#[test_case("define x = x x", ErrorCode::RecursionDetected; "self_referential_constant")]
#[test_case("command f { f } f", ErrorCode::RecursionDetected; "self_invoking_command")]
#[test_case("command f(a) { a } f(f(\"x\"))", ErrorCode::RecursionDetected; "composition_reported_as_recursion")]
#[test_case("command f(a) { a } f()", ErrorCode::WrongArgumentCount; "too_few_arguments")]
#[test_case("command f(a) { a } f(1, 2)", ErrorCode::WrongArgumentCount; "too_many_arguments")]
#[test_case("command f { \"a\" } f(1)", ErrorCode::WrongArgumentCount; "args_for_nullary")]
#[test_case("define k = 1 k()", ErrorCode::ConstWithParens; "parens_on_constant")]
#[test_case("l: l()", ErrorCode::LabelWithParens; "parens_on_label")]
fn test_use_errors(source: &str, expected: ErrorCode) {
    let diag = check(source);
    assert!(diag.has_code(expected), "entries: {:?}", diag.entries());
}

// ============================================================================
// Error tolerance
// ============================================================================

#[test]
fn test_evaluation_continues_after_errors() {
    // Both undefined identifiers are reported in one run.
    let diag = check("first_missing second_missing");
    let undefined = diag
        .entries()
        .iter()
        .filter(|d| d.code == ErrorCode::UndefinedIdentifier)
        .count();
    assert_eq!(undefined, 2);
}

#[test]
fn test_module_name_validation() {
    let diag = Diagnostics::new();
    let project = Project::new(&diag);
    let result = Module::load(
        Path::new("bad-name.ccs"),
        &diag,
        &project.counters,
    );
    assert!(result.is_err());
    assert_eq!(result.unwrap_err().code, ErrorCode::InvalidModuleName);
}
