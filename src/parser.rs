use crate::ast::*;
use crate::error::{CompileError, Diagnostic, Span};
use crate::lexer::{Token, TokenKind};

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser { tokens, pos: 0 }
    }

    fn error(&self, msg: impl Into<String>) -> Diagnostic {
        CompileError::Syntax(msg.into()).at(self.current().span)
    }

    fn current(&self) -> &Token {
        if self.pos < self.tokens.len() {
            &self.tokens[self.pos]
        } else {
            self.tokens.last().unwrap()
        }
    }

    #[allow(dead_code)]
    fn peek(&self, offset: usize) -> &Token {
        let idx = self.pos + offset;
        if idx < self.tokens.len() {
            &self.tokens[idx]
        } else {
            self.tokens.last().unwrap()
        }
    }

    fn advance(&mut self) -> Token {
        let tok = self.current().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn check(&self, kind: &TokenKind) -> bool {
        &self.current().kind == kind
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind, what: &str) -> Result<Token, Diagnostic> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.error(format!("Expected {}, found {:?}", what, self.current().kind)))
        }
    }

    fn is_eof(&self) -> bool {
        matches!(self.current().kind, TokenKind::Eof)
    }

    // -----------------------------------------------------------------------
    // Declarations
    // -----------------------------------------------------------------------

    pub fn parse(&mut self) -> Result<Program, Diagnostic> {
        let mut enums = Vec::new();
        let mut fns = Vec::new();

        while !self.is_eof() {
            if self.check(&TokenKind::Enum) {
                enums.push(self.parse_enum()?);
            } else {
                fns.push(self.parse_fn()?);
            }
        }

        Ok(Program { enums, fns })
    }

    fn parse_enum(&mut self) -> Result<EnumDef, Diagnostic> {
        let start = self.expect(&TokenKind::Enum, "'enum'")?.span;
        let name = self.expect_upper("an enum name")?;
        self.expect(&TokenKind::Equals, "'='")?;

        let mut ctors = vec![self.parse_ctor()?];
        while self.eat(&TokenKind::Comma) {
            ctors.push(self.parse_ctor()?);
        }
        let end = self.expect(&TokenKind::Semicolon, "';'")?.span;

        Ok(EnumDef {
            name: name.0,
            ctors,
            span: start.merge(end),
        })
    }

    fn parse_ctor(&mut self) -> Result<CtorDef, Diagnostic> {
        let (name, span) = self.expect_upper("a constructor name")?;
        let mut fields = Vec::new();
        let mut end = span;

        if self.eat(&TokenKind::LParen) {
            fields.push(self.parse_type()?);
            while self.eat(&TokenKind::Comma) {
                fields.push(self.parse_type()?);
            }
            end = self.expect(&TokenKind::RParen, "')'")?.span;
        }

        Ok(CtorDef {
            name,
            fields,
            span: span.merge(end),
        })
    }

    fn parse_type(&mut self) -> Result<TypeExpr, Diagnostic> {
        match self.current().kind.clone() {
            TokenKind::IntType => {
                self.advance();
                Ok(TypeExpr::Int)
            }
            TokenKind::Upper(name) => {
                let span = self.advance().span;
                Ok(TypeExpr::Named(name, span))
            }
            _ => Err(self.error(format!(
                "Expected a type, found {:?}",
                self.current().kind
            ))),
        }
    }

    /// A type list is a single type or a parenthesized tuple of types;
    /// `()` is the empty list.
    fn parse_type_list(&mut self) -> Result<Vec<TypeExpr>, Diagnostic> {
        if self.eat(&TokenKind::LParen) {
            if self.eat(&TokenKind::RParen) {
                return Ok(Vec::new());
            }
            let mut types = vec![self.parse_type()?];
            while self.eat(&TokenKind::Comma) {
                types.push(self.parse_type()?);
            }
            self.expect(&TokenKind::RParen, "')'")?;
            Ok(types)
        } else {
            Ok(vec![self.parse_type()?])
        }
    }

    fn parse_fn(&mut self) -> Result<FnDef, Diagnostic> {
        let start = self.current().span;
        let is_fip = self.eat(&TokenKind::Fip);

        // The signature is argument types ':' result types, and is present
        // whenever the declaration starts with a type rather than a name.
        let signature = if matches!(
            self.current().kind,
            TokenKind::LParen | TokenKind::IntType | TokenKind::Upper(_)
        ) {
            let params = self.parse_type_list()?;
            self.expect(&TokenKind::Colon, "':'")?;
            let results = self.parse_type_list()?;
            Some(Signature { params, results })
        } else {
            None
        };

        let name = self.expect_ident("a function name")?;
        // A declared empty parameter list means the identifier after the
        // name already belongs to the body.
        let params = match &signature {
            Some(sig) if sig.params.is_empty() => Vec::new(),
            _ => self.parse_params()?,
        };

        if signature.is_none() && !params.is_empty() {
            return Err(self.error(format!(
                "Function '{}' has parameters but no signature",
                name
            )));
        }

        self.expect(&TokenKind::Equals, "'='")?;
        let body = self.parse_expr()?;
        let end = self.expect(&TokenKind::Semicolon, "';'")?.span;

        Ok(FnDef {
            name,
            is_fip,
            signature,
            params,
            body,
            span: start.merge(end),
        })
    }

    fn parse_params(&mut self) -> Result<Vec<String>, Diagnostic> {
        if self.eat(&TokenKind::LParen) {
            if self.eat(&TokenKind::RParen) {
                return Ok(Vec::new());
            }
            let mut params = vec![self.expect_ident("a parameter name")?];
            while self.eat(&TokenKind::Comma) {
                params.push(self.expect_ident("a parameter name")?);
            }
            self.expect(&TokenKind::RParen, "')'")?;
            Ok(params)
        } else if matches!(self.current().kind, TokenKind::Ident(_)) {
            Ok(vec![self.expect_ident("a parameter name")?])
        } else {
            Ok(Vec::new())
        }
    }

    fn expect_ident(&mut self, what: &str) -> Result<String, Diagnostic> {
        match self.current().kind.clone() {
            TokenKind::Ident(name) => {
                self.advance();
                Ok(name)
            }
            other => Err(self.error(format!("Expected {}, found {:?}", what, other))),
        }
    }

    fn expect_upper(&mut self, what: &str) -> Result<(String, Span), Diagnostic> {
        match self.current().kind.clone() {
            TokenKind::Upper(name) => {
                let span = self.advance().span;
                Ok((name, span))
            }
            other => Err(self.error(format!("Expected {}, found {:?}", what, other))),
        }
    }

    // -----------------------------------------------------------------------
    // Expressions
    // -----------------------------------------------------------------------

    fn parse_expr(&mut self) -> Result<Expr, Diagnostic> {
        if self.check(&TokenKind::Let) {
            return self.parse_let();
        }
        self.parse_arith()
    }

    fn parse_let(&mut self) -> Result<Expr, Diagnostic> {
        let start = self.expect(&TokenKind::Let, "'let'")?.span;
        let binders = self.parse_binder_list()?;
        self.expect(&TokenKind::Equals, "'='")?;
        let bound = self.parse_expr()?;
        self.expect(&TokenKind::In, "'in'")?;
        let body = self.parse_expr()?;
        let span = start.merge(body.span);
        Ok(Expr::new(
            ExprKind::Let(binders, Box::new(bound), Box::new(body)),
            span,
        ))
    }

    fn parse_binder_list(&mut self) -> Result<Vec<Binder>, Diagnostic> {
        if self.eat(&TokenKind::LParen) {
            let mut binders = vec![self.parse_binder()?];
            while self.eat(&TokenKind::Comma) {
                binders.push(self.parse_binder()?);
            }
            self.expect(&TokenKind::RParen, "')'")?;
            Ok(binders)
        } else {
            Ok(vec![self.parse_binder()?])
        }
    }

    fn parse_binder(&mut self) -> Result<Binder, Diagnostic> {
        let name = self.expect_ident("a binding name")?;
        if name == "_" {
            Ok(Binder::Wildcard)
        } else {
            Ok(Binder::Name(name))
        }
    }

    fn parse_arith(&mut self) -> Result<Expr, Diagnostic> {
        let mut lhs = self.parse_mul()?;
        loop {
            let op = match self.current().kind {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_mul()?;
            let span = lhs.span.merge(rhs.span);
            lhs = Expr::new(ExprKind::BinOp(op, Box::new(lhs), Box::new(rhs)), span);
        }
        Ok(lhs)
    }

    fn parse_mul(&mut self) -> Result<Expr, Diagnostic> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.current().kind {
                TokenKind::Star => BinOp::Mul,
                TokenKind::Slash => BinOp::Div,
                TokenKind::Percent => BinOp::Mod,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_unary()?;
            let span = lhs.span.merge(rhs.span);
            lhs = Expr::new(ExprKind::BinOp(op, Box::new(lhs), Box::new(rhs)), span);
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, Diagnostic> {
        if self.check(&TokenKind::Minus) {
            let start = self.advance().span;
            let operand = self.parse_unary()?;
            let span = start.merge(operand.span);
            // `-lit` folds; `-expr` is 0 - expr.
            if let ExprKind::Int(i) = operand.kind {
                return Ok(Expr::new(ExprKind::Int(-i), span));
            }
            let zero = Expr::new(ExprKind::Int(0), start);
            return Ok(Expr::new(
                ExprKind::BinOp(BinOp::Sub, Box::new(zero), Box::new(operand)),
                span,
            ));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, Diagnostic> {
        let tok = self.current().clone();
        match tok.kind {
            TokenKind::Int(i) => {
                self.advance();
                Ok(Expr::new(ExprKind::Int(i), tok.span))
            }
            TokenKind::Ident(name) => {
                self.advance();
                if self.check(&TokenKind::LParen) {
                    let (args, end) = self.parse_call_args()?;
                    Ok(Expr::new(ExprKind::Call(name, args), tok.span.merge(end)))
                } else {
                    Ok(Expr::new(ExprKind::Var(name), tok.span))
                }
            }
            TokenKind::Upper(name) => {
                self.advance();
                if self.check(&TokenKind::LParen) {
                    let (args, end) = self.parse_call_args()?;
                    Ok(Expr::new(ExprKind::Call(name, args), tok.span.merge(end)))
                } else {
                    // Zero-arity constructor used bare.
                    Ok(Expr::new(ExprKind::Call(name, Vec::new()), tok.span))
                }
            }
            TokenKind::LParen => {
                let start = self.advance().span;
                if self.check(&TokenKind::RParen) {
                    let end = self.advance().span;
                    return Ok(Expr::new(ExprKind::Tuple(Vec::new()), start.merge(end)));
                }
                let first = self.parse_expr()?;
                if self.eat(&TokenKind::Comma) {
                    let mut elems = vec![first, self.parse_expr()?];
                    while self.eat(&TokenKind::Comma) {
                        elems.push(self.parse_expr()?);
                    }
                    let end = self.expect(&TokenKind::RParen, "')'")?.span;
                    Ok(Expr::new(ExprKind::Tuple(elems), start.merge(end)))
                } else {
                    let end = self.expect(&TokenKind::RParen, "')'")?.span;
                    Ok(Expr::new(first.kind, start.merge(end)))
                }
            }
            TokenKind::Match => self.parse_match(),
            other => Err(self.error(format!("Expected an expression, found {:?}", other))),
        }
    }

    fn parse_call_args(&mut self) -> Result<(Vec<Expr>, Span), Diagnostic> {
        self.expect(&TokenKind::LParen, "'('")?;
        if self.check(&TokenKind::RParen) {
            let end = self.advance().span;
            return Ok((Vec::new(), end));
        }
        let mut args = vec![self.parse_expr()?];
        while self.eat(&TokenKind::Comma) {
            args.push(self.parse_expr()?);
        }
        let end = self.expect(&TokenKind::RParen, "')'")?.span;
        Ok((args, end))
    }

    fn parse_match(&mut self) -> Result<Expr, Diagnostic> {
        let start = self.expect(&TokenKind::Match, "'match'")?.span;
        let scrutinee = self.parse_expr()?;
        self.expect(&TokenKind::LBrace, "'{'")?;

        let mut arms = vec![self.parse_arm()?];
        while self.eat(&TokenKind::Comma) {
            if self.check(&TokenKind::RBrace) {
                break; // trailing comma
            }
            arms.push(self.parse_arm()?);
        }
        let end = self.expect(&TokenKind::RBrace, "'}'")?.span;

        Ok(Expr::new(
            ExprKind::Match(Box::new(scrutinee), arms),
            start.merge(end),
        ))
    }

    fn parse_arm(&mut self) -> Result<MatchArm, Diagnostic> {
        let start = self.current().span;
        let pattern = self.parse_pattern()?;
        let pattern_span = start.merge(self.peek_prev_span(start));
        self.expect(&TokenKind::Colon, "':'")?;
        let body = self.parse_expr()?;
        Ok(MatchArm {
            pattern,
            pattern_span,
            body,
        })
    }

    fn peek_prev_span(&self, fallback: Span) -> Span {
        if self.pos == 0 {
            fallback
        } else {
            self.tokens[self.pos - 1].span
        }
    }

    fn parse_pattern(&mut self) -> Result<Pattern, Diagnostic> {
        let tok = self.current().clone();
        match tok.kind {
            TokenKind::Int(i) => {
                self.advance();
                Ok(Pattern::Int(i))
            }
            TokenKind::Minus => {
                self.advance();
                let kind = self.current().kind.clone();
                match kind {
                    TokenKind::Int(i) => {
                        self.advance();
                        Ok(Pattern::Int(-i))
                    }
                    _ => Err(self.error("Expected an integer after '-' in pattern")),
                }
            }
            TokenKind::Ident(name) => {
                self.advance();
                if name == "_" {
                    Ok(Pattern::Binder(Binder::Wildcard))
                } else {
                    Ok(Pattern::Binder(Binder::Name(name)))
                }
            }
            TokenKind::Upper(name) => {
                self.advance();
                let mut binders = Vec::new();
                if self.eat(&TokenKind::LParen) {
                    binders.push(self.parse_binder()?);
                    while self.eat(&TokenKind::Comma) {
                        binders.push(self.parse_binder()?);
                    }
                    self.expect(&TokenKind::RParen, "')'")?;
                }
                Ok(Pattern::Ctor(name, binders))
            }
            TokenKind::LParen => {
                self.advance();
                let mut binders = vec![self.parse_binder()?];
                while self.eat(&TokenKind::Comma) {
                    binders.push(self.parse_binder()?);
                }
                self.expect(&TokenKind::RParen, "')'")?;
                Ok(Pattern::Tuple(binders))
            }
            other => Err(self.error(format!("Expected a pattern, found {:?}", other))),
        }
    }
}
