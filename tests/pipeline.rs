//! End-to-end checks through the public library API

use pretty_assertions::assert_eq;

use rxc::frontend::ast::{ExprKind, Item};
use rxc::semantic::SymbolKind;
use rxc::types::Type;
use rxc::utils::{Error, ErrorCategory, ErrorMode};
use rxc::{check_source, render, Analysis, CompileOptions};

fn collect() -> CompileOptions {
    CompileOptions {
        mode: ErrorMode::Collect,
    }
}

fn ok(source: &str) -> Analysis {
    match check_source(source, &collect()) {
        Ok(analysis) => analysis,
        Err(errors) => panic!("unexpected errors: {:?}", errors),
    }
}

fn errors_in(source: &str) -> Vec<Error> {
    match check_source(source, &collect()) {
        Ok(_) => panic!("expected errors for {}", source),
        Err(errors) => errors,
    }
}

fn local_type(analysis: &Analysis, name: &str) -> Option<Type> {
    analysis
        .table
        .symbols()
        .find(|(_, s)| s.name == name && s.kind == SymbolKind::LocalVariable)
        .and_then(|(_, s)| s.ty.clone())
}

#[test]
fn scenario_add_function() {
    let analysis = ok("fn add(a: i32, b: i32) -> i32 { a + b }");
    assert_eq!(analysis.program.items.len(), 1);
    let Item::Function(f) = &analysis.program.items[0] else {
        panic!("expected a function item");
    };
    let tail = f.body.as_ref().and_then(|b| b.tail.as_deref()).unwrap();
    assert_eq!(analysis.type_of(tail.id), Some(&Type::I32));

    let ExprKind::Binary { left, right, .. } = &tail.kind else {
        panic!("expected a binary expression");
    };
    for operand in [left, right] {
        let ExprKind::Path(path) = &operand.kind else {
            panic!("expected a path");
        };
        let symbol = analysis.resolutions.symbol(path.first.id).unwrap();
        assert_eq!(analysis.table.symbol(symbol).kind, SymbolKind::Parameter);
    }
}

#[test]
fn scenario_incompatible_branches() {
    let source = "fn f() -> bool { if true { 1 } else { false } }";
    for mode in [ErrorMode::Throw, ErrorMode::Collect] {
        let errors = check_source(source, &CompileOptions { mode }).unwrap_err();
        assert_eq!(errors.len(), 1, "{:?}", errors);
        assert!(matches!(errors[0], Error::IncompatibleBranches { .. }));
        assert_eq!(errors[0].category(), ErrorCategory::Type);
        let message = errors[0].to_string();
        assert!(message.contains("i32") && message.contains("bool"), "{}", message);
    }
}

#[test]
fn scenario_missing_struct_field() {
    let errors = errors_in("struct P { x: i32, y: i32 } fn main() { let p = P { x: 1 }; }");
    assert_eq!(errors.len(), 1, "{:?}", errors);
    assert!(matches!(
        errors[0],
        Error::FieldCountMismatch {
            expected: 2,
            got: 1,
            ..
        }
    ));
    assert!(errors[0].is_semantic());
}

#[test]
fn ambiguous_block_resolution() {
    ok("fn f() {} fn main() { let u: () = { f() }; }");
    let errors = errors_in("fn f() {} fn main() { let b: bool = { f() }; }");
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].category(), ErrorCategory::Type);
}

#[test]
fn array_sizes() {
    let analysis = ok("fn main() { let a = [0; 3]; }");
    assert_eq!(local_type(&analysis, "a"), Some(Type::array(Type::I32, 3)));

    let errors = errors_in("fn main() { let n: usize = 3; let a = [0; n]; }");
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].category(), ErrorCategory::ConstEval);

    let errors = errors_in("fn main() { let a = [0; 0 - 1]; }");
    assert!(matches!(errors.as_slice(), [Error::NegativeArraySize { size: -1, .. }]));
}

#[test]
fn wide_constant_shifts() {
    let analysis = ok("const A: usize = 1 << 40; fn main() { let a = [0; 1 << 33]; }");
    assert_eq!(local_type(&analysis, "a"), Some(Type::array(Type::I32, 1 << 33)));

    let errors = errors_in("const A: u32 = 1u32 << 32;");
    assert!(matches!(errors.as_slice(), [Error::ShiftOverflow { .. }]), "{:?}", errors);
    assert_eq!(errors[0].category(), ErrorCategory::ConstEval);
}

#[test]
fn shadowing_and_constant_conflicts() {
    ok("fn main() { let x = 1; let x = 2; }");
    for source in [
        "fn main() { let x = 1; const x: i32 = 2; }",
        "fn main() { const x: i32 = 2; let x = 1; }",
    ] {
        let errors = errors_in(source);
        assert_eq!(errors.len(), 1, "{}: {:?}", source, errors);
        assert!(
            matches!(
                errors[0],
                Error::ConstantConflict { .. } | Error::DuplicateDefinition { .. }
            ),
            "{:?}",
            errors[0]
        );
    }
}

#[test]
fn scope_tree_is_rewalked() {
    let source = "
        trait Area { fn area(&self) -> i32; }
        enum Kind { Square, Line }
        struct Shape { side: i32, kind: Kind }
        impl Area for Shape {
            fn area(&self) -> i32 {
                let mut total = 0;
                let mut i = 0;
                while i < self.side {
                    if i % 2 == 0 { total += self.side; } else { total += 1; }
                    i += 1;
                }
                { let inner = total; inner }
            }
        }
        fn main() {
            let s = Shape { side: 3, kind: Kind::Square };
            let n = loop { break s.area(); };
            printlnInt(n);
        }
    ";
    let analysis = ok(source);
    // global, trait, enum, impl, area, its body, while body, then, else,
    // inner block, main, main body, loop body
    assert!(analysis.table.scope_count() >= 13, "{}", analysis.table.scope_count());
    assert_eq!(local_type(&analysis, "n"), Some(Type::I32));
}

#[test]
fn throw_mode_stops_at_first_error() {
    let source = "fn main() { a; b; }";
    let thrown = check_source(source, &CompileOptions::default()).unwrap_err();
    assert_eq!(thrown.len(), 1);
    assert_eq!(errors_in(source).len(), 2);
}

#[test]
fn lex_and_parse_errors_are_fatal() {
    let lexed = errors_in("fn main() { let s = \"open; }");
    assert_eq!(lexed.len(), 1);
    assert_eq!(lexed[0].category(), ErrorCategory::Lex);

    let parsed = errors_in("fn main( {");
    assert_eq!(parsed.len(), 1);
    assert_eq!(parsed[0].category(), ErrorCategory::Parse);
}

#[test]
fn control_flow_targets_are_recorded() {
    let analysis = ok("fn f() -> i32 { loop { break 1; } }");
    assert_eq!(analysis.targets.len(), 1);
}

#[test]
fn diagnostics_carry_positions() {
    let source = "fn main() {\n    let x: bool = 1;\n}";
    let errors = errors_in(source);
    let rendered = render(&errors, source);
    assert_eq!(rendered.len(), 1);
    assert_eq!(rendered[0].line, Some(2));
    assert_eq!(rendered[0].category, ErrorCategory::Type);
}
