/// Spec tests for the reuse pass: reset/reuse insertion in fip functions,
/// observed through the intermediate dumps.
use flip::session::{self, Stage};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const REVERSE: &str = "\
enum List = Nil, Cons(Int, List);

fip (List, List):List reverseHelper(l, acc) =
    match l {
        Nil: acc,
        Cons(x, xs): reverseHelper(xs, Cons(x, acc))
    };

fip List:List reverseList l = reverseHelper(l, Nil);

main = reverseList(Cons(1, Cons(2, Cons(3, Nil))));
";

const REVERSE_PLAIN: &str = "\
enum List = Nil, Cons(Int, List);

(List, List):List reverseHelper(l, acc) =
    match l {
        Nil: acc,
        Cons(x, xs): reverseHelper(xs, Cons(x, acc))
    };

List:List reverseList l = reverseHelper(l, Nil);

main = reverseList(Cons(1, Cons(2, Cons(3, Nil))));
";

fn dump(src: &str, stage: Stage) -> String {
    session::compile(src)
        .expect("compile failed")
        .intermediate_dump(stage)
        .to_string()
}

// ---------------------------------------------------------------------------
// Reset/reuse insertion
// ---------------------------------------------------------------------------

#[test]
fn fip_match_arm_claims_the_scrutinee_cell() {
    let reuse = dump(REVERSE, Stage::Reuse);
    assert!(reuse.contains("reset l@"), "missing reset in:\n{}", reuse);
    assert!(reuse.contains("reuse cell"), "missing reuse in:\n{}", reuse);
}

#[test]
fn reuse_rewrites_the_matching_constructor() {
    let reuse = dump(REVERSE, Stage::Reuse);
    // The Cons construction inside the fip arm must build into the claimed
    // cell, not allocate.
    assert!(reuse.contains("in Ctor(1,"), "expected a reused Cons in:\n{}", reuse);
}

#[test]
fn pre_reuse_stage_has_no_reuse_nodes() {
    let anf = dump(REVERSE, Stage::Anf);
    assert!(!anf.contains("reset"));
    assert!(!anf.contains("reuse"));
}

#[test]
fn non_fip_functions_are_untouched() {
    let reuse = dump(REVERSE_PLAIN, Stage::Reuse);
    assert!(!reuse.contains("reset"));
    assert!(!reuse.contains("reuse"));
}

#[test]
fn zero_arity_arms_claim_nothing() {
    // fib destructures no cells; its dump must stay allocation-shaped.
    let src = "Int:Int fib n = match n { 0: 1, 1: 1, m: fib(m - 1) + fib(m - 2) };\n\
               main = fib(5);";
    let reuse = dump(src, Stage::Reuse);
    assert!(!reuse.contains("reset"));
}

#[test]
fn tree_flip_reuses_nodes() {
    let src = "enum Tree = Leaf, Node(Tree, Int, Tree);\n\
               fip Tree:Tree flip t = match t { Leaf: Leaf, Node(l, v, r): Node(flip(r), v, flip(l)) };\n\
               ():Tree build = Node(Leaf, 1, Node(Leaf, 2, Leaf));\n\
               main = flip(build);";
    let reuse = dump(src, Stage::Reuse);
    assert!(reuse.contains("reset t@"));
    assert!(reuse.contains("reuse cell"));
}

#[test]
fn generated_code_contains_reuse_runtime() {
    let compiled = session::compile(REVERSE).expect("compile failed");
    let code = compiled.generated_code();
    assert!(code.contains("drop_reuse"));
    assert!(code.contains("typedef long long Value;"));
}

#[test]
fn disabling_reuse_removes_reuse_nodes() {
    let opts = session::CompileOptions {
        insert_reuse: false,
        infer_ownership: true,
    };
    let compiled = session::compile_with(REVERSE, opts).expect("compile failed");
    assert!(!compiled.intermediate_dump(Stage::Reuse).contains("reuse"));
}
