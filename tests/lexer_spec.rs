/// Spec tests for the flip lexer.
///
/// Each test verifies that specific source text tokenises to the expected
/// sequence of token kinds, or that a malformed lexeme is rejected with a
/// syntax diagnostic carrying the offending span.
use flip::error::DiagnosticKind;
use flip::lexer::{Lexer, TokenKind};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn lex(src: &str) -> Vec<TokenKind> {
    Lexer::new(src)
        .tokenize()
        .unwrap()
        .into_iter()
        .map(|t| t.kind)
        .filter(|k| !matches!(k, TokenKind::Eof))
        .collect()
}

fn lex_err(src: &str) -> flip::error::Diagnostic {
    Lexer::new(src).tokenize().unwrap_err()
}

// ---------------------------------------------------------------------------
// Integer literals
// ---------------------------------------------------------------------------

#[test]
fn int_decimal() {
    assert_eq!(lex("42"), vec![TokenKind::Int(42)]);
}

#[test]
fn int_zero() {
    assert_eq!(lex("0"), vec![TokenKind::Int(0)]);
}

#[test]
fn int_hex_lowercase() {
    assert_eq!(lex("0x1f"), vec![TokenKind::Int(31)]);
}

#[test]
fn int_hex_mixed_case() {
    assert_eq!(lex("0XFF"), vec![TokenKind::Int(255)]);
}

#[test]
fn int_exponent_form() {
    // The highlighter's numeric grammar admits exponents; integral values
    // are accepted.
    assert_eq!(lex("1e3"), vec![TokenKind::Int(1000)]);
}

#[test]
fn int_trailing_point_zero() {
    assert_eq!(lex("25.0"), vec![TokenKind::Int(25)]);
}

#[test]
fn fractional_literal_rejected() {
    let diag = lex_err("1.5");
    assert_eq!(diag.kind(), DiagnosticKind::Syntax);
    assert!(diag.message().contains("does not denote an integer"));
}

#[test]
fn empty_hex_rejected() {
    assert_eq!(lex_err("0x").kind(), DiagnosticKind::Syntax);
}

// ---------------------------------------------------------------------------
// Names and keywords
// ---------------------------------------------------------------------------

#[test]
fn lower_identifier() {
    assert_eq!(lex("acc"), vec![TokenKind::Ident("acc".to_string())]);
}

#[test]
fn dollar_identifier() {
    assert_eq!(lex("$tmp1"), vec![TokenKind::Ident("$tmp1".to_string())]);
}

#[test]
fn underscore_is_an_identifier() {
    assert_eq!(lex("_"), vec![TokenKind::Ident("_".to_string())]);
}

#[test]
fn upper_identifier() {
    assert_eq!(lex("Cons"), vec![TokenKind::Upper("Cons".to_string())]);
}

#[test]
fn keywords() {
    assert_eq!(
        lex("fip match enum let in Int"),
        vec![
            TokenKind::Fip,
            TokenKind::Match,
            TokenKind::Enum,
            TokenKind::Let,
            TokenKind::In,
            TokenKind::IntType,
        ]
    );
}

#[test]
fn keyword_prefix_is_identifier() {
    assert_eq!(lex("fipper"), vec![TokenKind::Ident("fipper".to_string())]);
}

// ---------------------------------------------------------------------------
// Operators and punctuation
// ---------------------------------------------------------------------------

#[test]
fn arithmetic_operators() {
    assert_eq!(
        lex("+ - * / %"),
        vec![
            TokenKind::Plus,
            TokenKind::Minus,
            TokenKind::Star,
            TokenKind::Slash,
            TokenKind::Percent,
        ]
    );
}

#[test]
fn punctuation() {
    assert_eq!(
        lex(": = , ; ( ) { }"),
        vec![
            TokenKind::Colon,
            TokenKind::Equals,
            TokenKind::Comma,
            TokenKind::Semicolon,
            TokenKind::LParen,
            TokenKind::RParen,
            TokenKind::LBrace,
            TokenKind::RBrace,
        ]
    );
}

#[test]
fn unknown_character_rejected() {
    let diag = lex_err("a ? b");
    assert_eq!(diag.kind(), DiagnosticKind::Syntax);
    assert!(diag.message().contains("Unknown character"));
}

// ---------------------------------------------------------------------------
// Comments
// ---------------------------------------------------------------------------

#[test]
fn line_comment_skipped() {
    assert_eq!(
        lex("1 // the rest is ignored\n2"),
        vec![TokenKind::Int(1), TokenKind::Int(2)]
    );
}

#[test]
fn block_comment_skipped() {
    assert_eq!(
        lex("1 /* anything\n at all */ 2"),
        vec![TokenKind::Int(1), TokenKind::Int(2)]
    );
}

#[test]
fn block_comments_do_not_nest() {
    // The first `*/` closes the comment; `ignored` must lex as a name.
    assert_eq!(
        lex("/* a /* b */ ignored"),
        vec![TokenKind::Ident("ignored".to_string())]
    );
}

#[test]
fn unterminated_block_comment_rejected() {
    let diag = lex_err("1 /* never closed");
    assert!(diag.message().contains("Unterminated block comment"));
}

// ---------------------------------------------------------------------------
// Spans
// ---------------------------------------------------------------------------

#[test]
fn token_spans_are_one_based() {
    let tokens = Lexer::new("let x").tokenize().unwrap();
    assert_eq!(tokens[0].span.start_line, 1);
    assert_eq!(tokens[0].span.start_col, 1);
    assert_eq!(tokens[0].span.end_col, 3);
    assert_eq!(tokens[1].span.start_col, 5);
}

#[test]
fn spans_track_lines() {
    let tokens = Lexer::new("a\n  b").tokenize().unwrap();
    assert_eq!(tokens[1].span.start_line, 2);
    assert_eq!(tokens[1].span.start_col, 3);
}
