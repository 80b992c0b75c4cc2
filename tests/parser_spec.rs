/// Spec tests for the flip parser.
///
/// Each test verifies that a specific source snippet produces the expected
/// declaration or expression structure, or is rejected with a syntax
/// diagnostic.
use flip::ast::*;
use flip::error::{Diagnostic, DiagnosticKind};
use flip::lexer::Lexer;
use flip::parser::Parser;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse(src: &str) -> Program {
    let tokens = Lexer::new(src).tokenize().expect("lex failed");
    Parser::new(tokens).parse().expect("parse failed")
}

fn parse_err(src: &str) -> Diagnostic {
    let tokens = Lexer::new(src).tokenize().expect("lex failed");
    Parser::new(tokens).parse().unwrap_err()
}

/// Parse a single zero-parameter function and return its body.
fn body(src: &str) -> Expr {
    let program = parse(&format!("main = {};", src));
    program.fns.into_iter().next().expect("no function").body
}

// ---------------------------------------------------------------------------
// Enum declarations
// ---------------------------------------------------------------------------

#[test]
fn enum_with_mixed_constructors() {
    let program = parse("enum List = Nil, Cons(Int, List);");
    assert_eq!(program.enums.len(), 1);
    let def = &program.enums[0];
    assert_eq!(def.name, "List");
    assert_eq!(def.ctors.len(), 2);
    assert_eq!(def.ctors[0].name, "Nil");
    assert!(def.ctors[0].fields.is_empty());
    assert_eq!(def.ctors[1].name, "Cons");
    assert_eq!(def.ctors[1].fields.len(), 2);
    assert_eq!(def.ctors[1].fields[0], TypeExpr::Int);
}

#[test]
fn enum_missing_semicolon_rejected() {
    assert_eq!(
        parse_err("enum List = Nil").kind(),
        DiagnosticKind::Syntax
    );
}

// ---------------------------------------------------------------------------
// Function declarations
// ---------------------------------------------------------------------------

#[test]
fn function_with_signature_and_params() {
    let program = parse("(List, List):List reverseHelper(l, acc) = acc;");
    let def = &program.fns[0];
    assert!(!def.is_fip);
    assert_eq!(def.name, "reverseHelper");
    assert_eq!(def.params, vec!["l".to_string(), "acc".to_string()]);
    let sig = def.signature.as_ref().unwrap();
    assert_eq!(sig.params.len(), 2);
    assert_eq!(sig.results.len(), 1);
}

#[test]
fn fip_flag_is_parsed() {
    let program = parse("fip List:List id l = l;");
    assert!(program.fns[0].is_fip);
}

#[test]
fn single_unparenthesized_param() {
    let program = parse("Int:Int inc x = x + 1;");
    assert_eq!(program.fns[0].params, vec!["x".to_string()]);
}

#[test]
fn zero_param_function_without_signature() {
    let program = parse("main = 42;");
    let def = &program.fns[0];
    assert!(def.signature.is_none());
    assert!(def.params.is_empty());
}

#[test]
fn zero_param_function_with_unit_signature() {
    let program = parse("():Int answer = 42;");
    let def = &program.fns[0];
    assert!(def.signature.as_ref().unwrap().params.is_empty());
}

#[test]
fn params_without_signature_rejected() {
    let diag = parse_err("double x = x + x;");
    assert!(diag.message().contains("no signature"));
}

// ---------------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------------

#[test]
fn multiplication_binds_tighter_than_addition() {
    let expr = body("2 + 3 * 4");
    let ExprKind::BinOp(BinOp::Add, _, rhs) = expr.kind else {
        panic!("expected addition at the root, got {:?}", expr.kind);
    };
    assert!(matches!(rhs.kind, ExprKind::BinOp(BinOp::Mul, _, _)));
}

#[test]
fn parentheses_override_precedence() {
    let expr = body("(2 + 3) * 4");
    assert!(matches!(expr.kind, ExprKind::BinOp(BinOp::Mul, _, _)));
}

#[test]
fn modulo_is_multiplicative() {
    let expr = body("1 + 6 % 4");
    let ExprKind::BinOp(BinOp::Add, _, rhs) = expr.kind else {
        panic!("expected addition at the root");
    };
    assert!(matches!(rhs.kind, ExprKind::BinOp(BinOp::Mod, _, _)));
}

#[test]
fn unary_minus_on_literal_folds() {
    assert!(matches!(body("-5").kind, ExprKind::Int(-5)));
}

#[test]
fn unary_minus_on_expression_subtracts_from_zero() {
    let expr = body("-(1 + 2)");
    let ExprKind::BinOp(BinOp::Sub, lhs, _) = expr.kind else {
        panic!("expected subtraction");
    };
    assert!(matches!(lhs.kind, ExprKind::Int(0)));
}

#[test]
fn call_with_arguments() {
    let expr = body("f(1, 2)");
    let ExprKind::Call(name, args) = expr.kind else {
        panic!("expected a call");
    };
    assert_eq!(name, "f");
    assert_eq!(args.len(), 2);
}

#[test]
fn bare_constructor_is_a_call() {
    let expr = body("Nil");
    assert!(matches!(expr.kind, ExprKind::Call(ref name, ref args) if name == "Nil" && args.is_empty()));
}

#[test]
fn constructor_with_fields() {
    let expr = body("Cons(1, Nil)");
    let ExprKind::Call(name, args) = expr.kind else {
        panic!("expected a constructor application");
    };
    assert_eq!(name, "Cons");
    assert_eq!(args.len(), 2);
}

#[test]
fn tuple_expression() {
    let expr = body("(1, 2, 3)");
    assert!(matches!(expr.kind, ExprKind::Tuple(ref elems) if elems.len() == 3));
}

#[test]
fn unit_expression() {
    assert!(matches!(body("()").kind, ExprKind::Tuple(ref elems) if elems.is_empty()));
}

#[test]
fn let_single_binding() {
    let expr = body("let x = 1 in x + 1");
    let ExprKind::Let(binders, _, _) = expr.kind else {
        panic!("expected let");
    };
    assert_eq!(binders, vec![Binder::Name("x".to_string())]);
}

#[test]
fn let_tuple_destructuring() {
    let expr = body("let (d, m) = divmod(17, 5) in d");
    let ExprKind::Let(binders, bound, _) = expr.kind else {
        panic!("expected let");
    };
    assert_eq!(binders.len(), 2);
    assert!(matches!(bound.kind, ExprKind::Call(_, _)));
}

// ---------------------------------------------------------------------------
// Match expressions
// ---------------------------------------------------------------------------

#[test]
fn match_with_constructor_patterns() {
    let expr = body("match l { Nil: 0, Cons(x, xs): 1 }");
    let ExprKind::Match(_, arms) = expr.kind else {
        panic!("expected match");
    };
    assert_eq!(arms.len(), 2);
    assert_eq!(arms[0].pattern, Pattern::Ctor("Nil".to_string(), vec![]));
    assert_eq!(
        arms[1].pattern,
        Pattern::Ctor(
            "Cons".to_string(),
            vec![Binder::Name("x".to_string()), Binder::Name("xs".to_string())]
        )
    );
}

#[test]
fn match_on_integer_literals_with_catchall() {
    let expr = body("match n { 0: 1, 1: 1, m: 2 }");
    let ExprKind::Match(_, arms) = expr.kind else {
        panic!("expected match");
    };
    assert_eq!(arms[0].pattern, Pattern::Int(0));
    assert_eq!(arms[2].pattern, Pattern::Binder(Binder::Name("m".to_string())));
}

#[test]
fn negative_integer_pattern() {
    let expr = body("match n { -1: 0, x: 1 }");
    let ExprKind::Match(_, arms) = expr.kind else {
        panic!("expected match");
    };
    assert_eq!(arms[0].pattern, Pattern::Int(-1));
}

#[test]
fn wildcard_pattern() {
    let expr = body("match n { 0: 1, _: 2 }");
    let ExprKind::Match(_, arms) = expr.kind else {
        panic!("expected match");
    };
    assert_eq!(arms[1].pattern, Pattern::Binder(Binder::Wildcard));
}

#[test]
fn tuple_pattern_in_match() {
    let expr = body("match p { (a, b): a }");
    let ExprKind::Match(_, arms) = expr.kind else {
        panic!("expected match");
    };
    assert!(matches!(arms[0].pattern, Pattern::Tuple(ref binders) if binders.len() == 2));
}

#[test]
fn trailing_comma_in_match_is_allowed() {
    let expr = body("match n { 0: 1, _: 2, }");
    assert!(matches!(expr.kind, ExprKind::Match(_, ref arms) if arms.len() == 2));
}

#[test]
fn wildcard_binder_in_constructor_pattern() {
    let expr = body("match l { Cons(_, xs): xs, Nil: Nil }");
    let ExprKind::Match(_, arms) = expr.kind else {
        panic!("expected match");
    };
    assert_eq!(
        arms[0].pattern,
        Pattern::Ctor(
            "Cons".to_string(),
            vec![Binder::Wildcard, Binder::Name("xs".to_string())]
        )
    );
}

// ---------------------------------------------------------------------------
// Error reporting
// ---------------------------------------------------------------------------

#[test]
fn missing_expression_reports_span() {
    let diag = parse_err("main = ;");
    assert_eq!(diag.kind(), DiagnosticKind::Syntax);
    assert!(diag.has_source_span());
}

#[test]
fn diagnostic_display_includes_location() {
    let diag = parse_err("main = ;");
    assert!(diag.to_string().contains("Occurred at 1:8"));
}

#[test]
fn missing_match_colon_rejected() {
    assert_eq!(
        parse_err("main = match n { 0 1 };").kind(),
        DiagnosticKind::Syntax
    );
}
