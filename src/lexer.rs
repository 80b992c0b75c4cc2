use crate::error::{CompileError, Diagnostic, Span};

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals
    Int(i64),
    // Names
    Ident(String),
    Upper(String),
    // Keywords
    Fip,
    Match,
    Enum,
    Let,
    In,
    IntType,
    // Punctuation
    Colon,     // :
    Equals,    // =
    Comma,     // ,
    Semicolon, // ;
    LParen,    // (
    RParen,    // )
    LBrace,    // {
    RBrace,    // }
    // Operators
    Plus,    // +
    Minus,   // -
    Star,    // *
    Slash,   // /
    Percent, // %
    Eof,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

fn keyword(s: &str) -> Option<TokenKind> {
    match s {
        "fip" => Some(TokenKind::Fip),
        "match" => Some(TokenKind::Match),
        "enum" => Some(TokenKind::Enum),
        "let" => Some(TokenKind::Let),
        "in" => Some(TokenKind::In),
        _ => None,
    }
}

pub struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    col: usize,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Lexer {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            col: 1,
        }
    }

    fn error_at(&self, msg: impl Into<String>, span: Span) -> Diagnostic {
        CompileError::Syntax(msg.into()).at(span)
    }

    fn peek(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn current(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.chars.get(self.pos).copied()?;
        self.pos += 1;
        if ch == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(ch)
    }

    /// Span from a recorded start up to the last consumed character.
    fn span_from(&self, start_line: usize, start_col: usize) -> Span {
        Span::new(start_line, start_col, self.line, self.col.max(2) - 1)
    }

    pub fn tokenize(&mut self) -> Result<Vec<Token>, Diagnostic> {
        let mut tokens = Vec::new();

        while let Some(ch) = self.current() {
            // Whitespace
            if ch == ' ' || ch == '\t' || ch == '\r' || ch == '\n' {
                self.advance();
                continue;
            }

            // Line comments
            if ch == '/' && self.peek(1) == Some('/') {
                while self.current().is_some() && self.current() != Some('\n') {
                    self.advance();
                }
                continue;
            }

            // Block comments (non-nesting)
            if ch == '/' && self.peek(1) == Some('*') {
                self.skip_block_comment()?;
                continue;
            }

            if ch.is_ascii_digit() {
                tokens.push(self.scan_number()?);
                continue;
            }

            if ch.is_lowercase() || ch == '$' || ch == '_' {
                tokens.push(self.scan_ident());
                continue;
            }

            if ch.is_uppercase() {
                tokens.push(self.scan_upper());
                continue;
            }

            tokens.push(self.scan_punct()?);
        }

        tokens.push(Token {
            kind: TokenKind::Eof,
            span: Span::point(self.line, self.col),
        });

        Ok(tokens)
    }

    fn skip_block_comment(&mut self) -> Result<(), Diagnostic> {
        let line = self.line;
        let col = self.col;
        self.advance(); // '/'
        self.advance(); // '*'
        loop {
            match self.current() {
                None => {
                    return Err(self.error_at(
                        "Unterminated block comment",
                        Span::new(line, col, self.line, self.col.max(2) - 1),
                    ))
                }
                Some('*') if self.peek(1) == Some('/') => {
                    self.advance();
                    self.advance();
                    return Ok(());
                }
                Some(_) => {
                    self.advance();
                }
            }
        }
    }

    /// Integer literals: decimal or `0x` hex, plus the fraction/exponent forms
    /// the highlighter accepts - those must still denote an exact integer.
    fn scan_number(&mut self) -> Result<Token, Diagnostic> {
        let line = self.line;
        let col = self.col;

        if self.current() == Some('0') && matches!(self.peek(1), Some('x') | Some('X')) {
            self.advance();
            self.advance();
            let mut digits = String::new();
            while let Some(c) = self.current() {
                if c.is_ascii_hexdigit() {
                    digits.push(c);
                    self.advance();
                } else {
                    break;
                }
            }
            let span = self.span_from(line, col);
            if digits.is_empty() {
                return Err(self.error_at("Malformed hex literal", span));
            }
            let value = i64::from_str_radix(&digits, 16)
                .map_err(|_| self.error_at("Integer literal out of range", span))?;
            return Ok(Token {
                kind: TokenKind::Int(value),
                span,
            });
        }

        let mut text = String::new();
        let mut is_plain = true;

        while let Some(c) = self.current() {
            if c.is_ascii_digit() {
                text.push(c);
                self.advance();
            } else {
                break;
            }
        }

        if self.current() == Some('.') && self.peek(1).map(|c| c.is_ascii_digit()).unwrap_or(false)
        {
            is_plain = false;
            text.push('.');
            self.advance();
            while let Some(c) = self.current() {
                if c.is_ascii_digit() {
                    text.push(c);
                    self.advance();
                } else {
                    break;
                }
            }
        }

        if matches!(self.current(), Some('e') | Some('E')) {
            let mut lookahead = 1;
            if matches!(self.peek(1), Some('+') | Some('-')) {
                lookahead = 2;
            }
            if self
                .peek(lookahead)
                .map(|c| c.is_ascii_digit())
                .unwrap_or(false)
            {
                is_plain = false;
                for _ in 0..lookahead {
                    text.push(self.advance().unwrap());
                }
                while let Some(c) = self.current() {
                    if c.is_ascii_digit() {
                        text.push(c);
                        self.advance();
                    } else {
                        break;
                    }
                }
            }
        }

        let span = self.span_from(line, col);

        let value = if is_plain {
            text.parse::<i64>()
                .map_err(|_| self.error_at("Integer literal out of range", span))?
        } else {
            let f: f64 = text
                .parse()
                .map_err(|_| self.error_at("Malformed number literal", span))?;
            if f.fract() != 0.0 || f.abs() > 9_007_199_254_740_992.0 {
                return Err(self.error_at("Literal does not denote an integer", span));
            }
            f as i64
        };

        Ok(Token {
            kind: TokenKind::Int(value),
            span,
        })
    }

    fn scan_ident(&mut self) -> Token {
        let line = self.line;
        let col = self.col;
        let mut ident = String::new();

        while let Some(c) = self.current() {
            if c.is_alphanumeric() || c == '_' || c == '$' {
                ident.push(c);
                self.advance();
            } else {
                break;
            }
        }

        let span = self.span_from(line, col);
        let kind = keyword(&ident).unwrap_or(TokenKind::Ident(ident));
        Token { kind, span }
    }

    fn scan_upper(&mut self) -> Token {
        let line = self.line;
        let col = self.col;
        let mut name = String::new();

        while let Some(c) = self.current() {
            if c.is_alphanumeric() || c == '_' {
                name.push(c);
                self.advance();
            } else {
                break;
            }
        }

        let span = self.span_from(line, col);
        let kind = if name == "Int" {
            TokenKind::IntType
        } else {
            TokenKind::Upper(name)
        };
        Token { kind, span }
    }

    fn scan_punct(&mut self) -> Result<Token, Diagnostic> {
        let line = self.line;
        let col = self.col;
        let ch = self.advance().unwrap();

        let kind = match ch {
            ':' => TokenKind::Colon,
            '=' => TokenKind::Equals,
            ',' => TokenKind::Comma,
            ';' => TokenKind::Semicolon,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            other => {
                return Err(self.error_at(
                    format!("Unknown character: {:?}", other),
                    Span::point(line, col),
                ))
            }
        };

        Ok(Token {
            kind,
            span: self.span_from(line, col),
        })
    }
}
