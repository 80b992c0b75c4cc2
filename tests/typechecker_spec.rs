/// Spec tests for the flip static checks: resolution, type checking and the
/// fip uniqueness analysis.
///
/// Tests are grouped into:
///   - accepted programs
///   - call-site diagnostics (the exact message shapes are load-bearing)
///   - match validation
///   - fip proof obligations
use flip::error::{Diagnostic, DiagnosticKind};
use flip::lexer::Lexer;
use flip::parser::Parser;
use flip::resolver;
use flip::reuse;
use flip::typechecker::{self, TypedProgram};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn check(src: &str) -> Result<TypedProgram, Diagnostic> {
    let tokens = Lexer::new(src).tokenize()?;
    let program = Parser::new(tokens).parse()?;
    let resolved = resolver::resolve(program)?;
    let typed = typechecker::type_check(resolved)?;
    reuse::validate_fip(&typed)?;
    Ok(typed)
}

fn check_err(src: &str) -> Diagnostic {
    match check(src) {
        Ok(_) => panic!("expected a diagnostic for:\n{}", src),
        Err(diag) => diag,
    }
}

const LIST: &str = "enum List = Nil, Cons(Int, List);\n";

// ---------------------------------------------------------------------------
// Accepted programs
// ---------------------------------------------------------------------------

#[test]
fn accepts_list_reverse() {
    let src = format!(
        "{}fip (List, List):List reverseHelper(l, acc) =\n\
         \x20   match l {{ Nil: acc, Cons(x, xs): reverseHelper(xs, Cons(x, acc)) }};\n\
         fip List:List reverseList l = reverseHelper(l, Nil);\n\
         main = reverseList(Cons(1, Nil));",
        LIST
    );
    assert!(check(&src).is_ok());
}

#[test]
fn accepts_match_on_int_literals() {
    let src = "Int:Int fib n = match n { 0: 1, 1: 1, m: fib(m - 1) + fib(m - 2) };\n\
               main = fib(10);";
    assert!(check(src).is_ok());
}

#[test]
fn accepts_tuple_destructuring_of_multi_return() {
    let src = "(Int, Int):(Int, Int) divmod(a, b) = (a / b, a % b);\n\
               main = let (d, m) = divmod(17, 5) in d * 10 + m;";
    assert!(check(src).is_ok());
}

#[test]
fn infers_result_type_of_signatureless_main() {
    let src = format!("{}main = Cons(1, Nil);", LIST);
    let typed = check(&src).unwrap();
    let main = typed.fns.iter().find(|f| f.name == "main").unwrap();
    assert_eq!(main.results.to_string(), "List");
}

// ---------------------------------------------------------------------------
// Call-site diagnostics
// ---------------------------------------------------------------------------

#[test]
fn wrong_argument_type_has_exact_message() {
    let src = "enum Animal = Dog, Cat;\n\
               Int:Int inc x = x + 1;\n\
               main = inc(Dog);";
    let diag = check_err(src);
    assert_eq!(diag.kind(), DiagnosticKind::TypeMismatch);
    assert_eq!(
        diag.message(),
        "Wrong argument type for function call of 'inc'. Expected (Int), but got (Animal)"
    );
    assert!(diag.has_source_span());
    let span = diag.source_span().unwrap();
    assert_eq!(span.start_line, 3);
}

#[test]
fn wrong_argument_type_lists_all_types() {
    let src = format!(
        "{}(Int, List):List push(x, l) = Cons(x, l);\nmain = push(Nil, 1);",
        LIST
    );
    let diag = check_err(&src);
    assert_eq!(
        diag.message(),
        "Wrong argument type for function call of 'push'. Expected (Int, List), but got (List, Int)"
    );
}

#[test]
fn wrong_arity_reports_counts() {
    let src = "Int:Int inc x = x + 1;\nmain = inc(1, 2);";
    let diag = check_err(src);
    assert_eq!(diag.kind(), DiagnosticKind::Arity);
    assert_eq!(
        diag.message(),
        "Wrong variable count for function call of 'inc'. Expected 1, but got 2"
    );
}

#[test]
fn constructor_arity_is_checked() {
    let src = format!("{}main = Cons(1);", LIST);
    let diag = check_err(&src);
    assert_eq!(diag.kind(), DiagnosticKind::Arity);
}

#[test]
fn operators_require_integers() {
    let src = format!("{}main = Nil + 1;", LIST);
    let diag = check_err(&src);
    assert_eq!(
        diag.message(),
        "Wrong argument type for function call of '+'. Expected (Int, Int), but got (List, Int)"
    );
}

#[test]
fn unknown_function_is_reported() {
    let diag = check_err("main = nope(1);");
    assert_eq!(diag.kind(), DiagnosticKind::UnboundName);
    assert!(diag.message().contains("Unknown function 'nope'"));
}

#[test]
fn unknown_variable_is_reported() {
    let diag = check_err("main = x;");
    assert_eq!(diag.kind(), DiagnosticKind::UnboundName);
    assert!(diag.message().contains("Unknown variable 'x'"));
}

#[test]
fn unknown_constructor_is_reported() {
    let diag = check_err("main = Mystery;");
    assert!(diag.message().contains("Unknown constructor 'Mystery'"));
}

#[test]
fn unknown_enum_in_signature_is_reported() {
    let diag = check_err("Ghost:Int f x = 0;\nmain = 0;");
    assert!(diag.message().contains("Use of undeclared enum 'Ghost'"));
}

#[test]
fn duplicate_function_names_rejected() {
    let diag = check_err("main = 1;\nmain = 2;");
    assert!(diag.message().contains("Multiple definitions"));
}

#[test]
fn signature_param_count_must_match_definition() {
    let diag = check_err("(Int, Int):Int add x = x;\nmain = 0;");
    assert_eq!(
        diag.message(),
        "Inconsistent variable count in function 'add'. Signature suggests 2, and definition suggests 1"
    );
}

#[test]
fn wrong_return_type_is_reported() {
    let src = format!("{}Int:List bad n = n + 1;\nmain = 0;", LIST);
    let diag = check_err(&src);
    assert_eq!(
        diag.message(),
        "Wrong return type for function 'bad'. Expected (List), but got (Int)"
    );
}

#[test]
fn let_binder_count_must_match() {
    let diag = check_err("main = let (a, b) = 5 in a;");
    assert_eq!(
        diag.message(),
        "Wrong variable count in let statement. Expected 1, but got 2"
    );
}

// ---------------------------------------------------------------------------
// Match validation
// ---------------------------------------------------------------------------

#[test]
fn non_exhaustive_enum_match_rejected() {
    let src = format!(
        "{}List:Int first l = match l {{ Cons(x, xs): x }};\nmain = 0;",
        LIST
    );
    let diag = check_err(&src);
    assert_eq!(diag.kind(), DiagnosticKind::NonExhaustiveMatch);
    assert_eq!(diag.message(), "Match statement is non exhaustive");
}

#[test]
fn int_match_requires_wildcard() {
    let diag = check_err("Int:Int f n = match n { 0: 1, 1: 2 };\nmain = 0;");
    assert_eq!(diag.kind(), DiagnosticKind::NonExhaustiveMatch);
}

#[test]
fn wildcard_makes_enum_match_exhaustive() {
    let src = format!(
        "{}List:Int first l = match l {{ Cons(x, xs): x, _: 0 }};\nmain = 0;",
        LIST
    );
    assert!(check(&src).is_ok());
}

#[test]
fn duplicate_int_pattern_rejected() {
    let diag = check_err("Int:Int f n = match n { 0: 1, 0: 2, _: 3 };\nmain = 0;");
    assert_eq!(
        diag.message(),
        "Integer 0 is matched on in multiple cases in match statement"
    );
}

#[test]
fn duplicate_constructor_pattern_rejected() {
    let src = format!(
        "{}List:Int f l = match l {{ Nil: 0, Nil: 1, Cons(x, xs): 2 }};\nmain = 0;",
        LIST
    );
    let diag = check_err(&src);
    assert_eq!(
        diag.message(),
        "Constructor 'Nil' is matched on in multiple cases in match statement"
    );
}

#[test]
fn case_after_wildcard_rejected() {
    let diag = check_err("Int:Int f n = match n { 0: 1, x: 2, 1: 3 };\nmain = 0;");
    assert!(diag.message().contains("after a wildcard"));
}

#[test]
fn multiple_wildcards_rejected() {
    let diag = check_err("Int:Int f n = match n { x: 1, y: 2 };\nmain = 0;");
    assert_eq!(diag.message(), "Match statement has multiple wild cards");
}

#[test]
fn constructor_pattern_on_int_rejected() {
    let src = format!(
        "{}Int:Int f n = match n {{ Nil: 0, _: 1 }};\nmain = 0;",
        LIST
    );
    let diag = check_err(&src);
    assert!(diag.message().contains("Invalid pattern in match statement"));
}

#[test]
fn match_case_binder_count_checked() {
    let src = format!(
        "{}List:Int f l = match l {{ Nil: 0, Cons(x): 1 }};\nmain = 0;",
        LIST
    );
    let diag = check_err(&src);
    assert_eq!(
        diag.message(),
        "Wrong variable count for constructor 'Cons' in match case. Expected 2, but got 1"
    );
}

#[test]
fn match_arms_must_share_a_type() {
    let src = format!(
        "{}Int:Int f n = match n {{ 0: Nil, _: 1 }};\nmain = 0;",
        LIST
    );
    let diag = check_err(&src);
    assert_eq!(diag.message(), "Mismatched return types of match statement");
}

#[test]
fn tuple_match_requires_single_tuple_pattern() {
    let diag = check_err("main = match (1, 2) { (a, b): a, (c, d): d };");
    assert_eq!(
        diag.message(),
        "Match on a tuple must have a single tuple pattern"
    );
}

// ---------------------------------------------------------------------------
// fip proof obligations
// ---------------------------------------------------------------------------

#[test]
fn fip_rejects_duplicated_heap_variable() {
    let src = format!("{}fip List:(List, List) dup l = (l, l);\nmain = 0;", LIST);
    let diag = check_err(&src);
    assert_eq!(diag.kind(), DiagnosticKind::FipIneligible);
    assert_eq!(
        diag.message(),
        "Fip function 'dup' uses variable 'l' more than once"
    );
    assert!(diag.has_source_span());
}

#[test]
fn fip_rejects_unused_heap_binder() {
    let src = format!(
        "{}enum Pair = P(List, List);\n\
         fip Pair:List left p = match p {{ P(a, b): a }};\nmain = 0;",
        LIST
    );
    let diag = check_err(&src);
    assert_eq!(diag.kind(), DiagnosticKind::FipIneligible);
    assert_eq!(diag.message(), "Fip function 'left' never uses variable 'b'");
}

#[test]
fn fip_rejects_discarded_heap_field() {
    let src = format!(
        "{}enum Pair = P(List, List);\n\
         fip Pair:List left p = match p {{ P(a, _): a }};\nmain = 0;",
        LIST
    );
    let diag = check_err(&src);
    assert_eq!(
        diag.message(),
        "Fip function 'left' discards a heap field of constructor 'P'"
    );
}

#[test]
fn fip_requires_a_signature() {
    let diag = check_err("fip main = 0;");
    assert_eq!(diag.kind(), DiagnosticKind::FipIneligible);
    assert_eq!(diag.message(), "Fip function 'main' is missing a signature");
}

#[test]
fn fip_rejects_branchwise_inconsistent_consumption() {
    // `keep` holds on to l in one branch and drops it in the other.
    let src = format!(
        "{}fip (List, List):List keep(l, acc) =\n\
         \x20   match l {{ Nil: acc, Cons(x, xs): Cons(x, xs) }};\nmain = 0;",
        LIST
    );
    let diag = check_err(&src);
    assert_eq!(diag.kind(), DiagnosticKind::FipIneligible);
}

#[test]
fn plain_functions_may_duplicate_freely() {
    let src = format!("{}List:(List, List) dup l = (l, l);\nmain = 0;", LIST);
    assert!(check(&src).is_ok());
}

#[test]
fn fip_accepts_tree_flip() {
    let src = "enum Tree = Leaf, Node(Tree, Int, Tree);\n\
               fip Tree:Tree flip t = match t { Leaf: Leaf, Node(l, v, r): Node(flip(r), v, flip(l)) };\n\
               main = 0;";
    assert!(check(src).is_ok());
}
