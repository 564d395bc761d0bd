use skein_ast::{BinOp, ExprKind, Stmt};
use skein_parse::{compile_chunk, parse_expr, parse_source};

#[test]
fn chained_comparisons_are_rejected() {
    let err = parse_source("let a = 1 < 2 < 3\n", "t").expect_err("expected parse error");
    assert!(
        err.message().contains("chained comparisons"),
        "unexpected error message: {}",
        err.message()
    );
}

#[test]
fn concat_is_right_associative_and_binds_looser_than_add() {
    let expr = parse_expr("a .. b + 1 .. c").expect("expr should parse");
    let ExprKind::Binary { left, op, right } = expr.kind else {
        panic!("expected binary expression");
    };
    assert_eq!(op, BinOp::Concat);
    assert!(matches!(left.kind, ExprKind::Ident(_)));
    let ExprKind::Binary { left: mid, op: inner, .. } = right.kind else {
        panic!("expected nested concat");
    };
    assert_eq!(inner, BinOp::Concat);
    assert!(matches!(mid.kind, ExprKind::Binary { op: BinOp::Add, .. }));
}

#[test]
fn functions_lists_and_maps_parse_across_lines() {
    let src = r#"
fn pair(a, b, ...) {
    return a, b
}
let conf = {
    name: "worker",
    "max depth": 4,
}
let xs = [
    1, 2,
    pair(3, 4),
]
if len(xs) > 2 {
    print("long")
} else if len(xs) == 2 {
    print("two")
}
else {
    print("short")
}
"#;
    let program = parse_source(src, "multi").expect("program should parse");
    assert_eq!(program.stmts.len(), 4);
    let Stmt::FnDef(def) = &program.stmts[0] else {
        panic!("expected function definition");
    };
    assert_eq!(def.name.node, "pair");
    assert!(def.proto.variadic);
    assert_eq!(def.proto.params.len(), 2);
    assert_eq!(def.proto.chunk, "multi");
    assert_eq!(def.proto.span.line, 2);
}

#[test]
fn parenthesized_call_is_marked_single_valued() {
    let expr = parse_expr("(f())").expect("expr should parse");
    assert!(matches!(expr.kind, ExprKind::Paren(_)));
    assert!(!expr.kind.is_multi());
}

#[test]
fn invalid_assignment_target_is_reported_with_line() {
    let err = parse_source("let a = 1\nf() = 2\n", "t").expect_err("expected parse error");
    assert_eq!(err.message(), "invalid assignment target");
    assert_eq!(err.line(), 2);
}

#[test]
fn compiled_chunk_is_a_variadic_main_function() {
    let proto = compile_chunk("return 42", "=task").expect("chunk should compile");
    assert!(proto.main);
    assert!(proto.variadic);
    assert!(proto.name.is_none());
    assert!(matches!(proto.body.stmts.as_slice(), [Stmt::Return(_)]));
}

#[test]
fn unterminated_block_is_an_error() {
    let err = parse_source("while true {\n  print(1)\n", "t").expect_err("expected parse error");
    assert!(err.message().contains("expected '}'"), "{}", err.message());
}

fn parse_on_large_stack(src: String) -> Result<(), String> {
    std::thread::Builder::new()
        .stack_size(64 * 1024 * 1024)
        .spawn(move || parse_source(&src, "t").map(drop).map_err(|e| e.message().to_string()))
        .expect("spawn parser thread")
        .join()
        .expect("parser thread panicked")
}

#[test]
fn deep_nesting_is_a_syntax_error() {
    let parens = format!("return {}1{}\n", "(".repeat(10_000), ")".repeat(10_000));
    let err = parse_on_large_stack(parens).expect_err("expected nesting error");
    assert!(err.contains("nested too deeply"), "{err}");

    let negations = format!("return {}1\n", "-".repeat(10_000));
    let err = parse_on_large_stack(negations).expect_err("expected nesting error");
    assert!(err.contains("nested too deeply"), "{err}");

    let blocks = format!("{}{}", "if true {\n".repeat(1_000), "}\n".repeat(1_000));
    let err = parse_on_large_stack(blocks).expect_err("expected nesting error");
    assert!(err.contains("nested too deeply"), "{err}");
}

#[test]
fn moderate_nesting_parses() {
    let src = format!("return {}1{}\n", "(".repeat(50), ")".repeat(50));
    parse_on_large_stack(src).expect("50 levels should parse");
    let src = format!("let s = {}\n", vec!["'a'"; 100].join(" .. "));
    parse_on_large_stack(src).expect("concat chain should parse");
}
