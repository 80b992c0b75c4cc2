use crate::error::Span;

/// Surface syntax tree. Every node carries the span of the source text it was
/// parsed from; spans survive through resolution and typing so diagnostics can
/// always point at real source.

#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub enums: Vec<EnumDef>,
    pub fns: Vec<FnDef>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumDef {
    pub name: String,
    pub ctors: Vec<CtorDef>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CtorDef {
    pub name: String,
    pub fields: Vec<TypeExpr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeExpr {
    Int,
    Named(String, Span),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    pub params: Vec<TypeExpr>,
    pub results: Vec<TypeExpr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FnDef {
    pub name: String,
    pub is_fip: bool,
    pub signature: Option<Signature>,
    pub params: Vec<String>,
    pub body: Expr,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl BinOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
        }
    }
}

/// A pattern position that either binds a name or discards the value.
#[derive(Debug, Clone, PartialEq)]
pub enum Binder {
    Name(String),
    Wildcard,
}

impl Binder {
    pub fn name(&self) -> Option<&str> {
        match self {
            Binder::Name(n) => Some(n),
            Binder::Wildcard => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    Int(i64),
    Binder(Binder),
    Ctor(String, Vec<Binder>),
    Tuple(Vec<Binder>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchArm {
    pub pattern: Pattern,
    pub pattern_span: Span,
    pub body: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Int(i64),
    Var(String),
    /// Function or constructor application; the resolver tells them apart.
    Call(String, Vec<Expr>),
    Tuple(Vec<Expr>),
    BinOp(BinOp, Box<Expr>, Box<Expr>),
    Match(Box<Expr>, Vec<MatchArm>),
    Let(Vec<Binder>, Box<Expr>, Box<Expr>),
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Expr { kind, span }
    }
}

impl Pattern {
    /// Rendering used inside diagnostics ("invalid pattern is Cons(x, xs)").
    pub fn display(&self) -> String {
        match self {
            Pattern::Int(i) => i.to_string(),
            Pattern::Binder(Binder::Name(n)) => n.clone(),
            Pattern::Binder(Binder::Wildcard) => "_".to_string(),
            Pattern::Ctor(name, binders) => {
                if binders.is_empty() {
                    name.clone()
                } else {
                    format!("{}({})", name, binder_list(binders))
                }
            }
            Pattern::Tuple(binders) => format!("({})", binder_list(binders)),
        }
    }
}

fn binder_list(binders: &[Binder]) -> String {
    binders
        .iter()
        .map(|b| b.name().unwrap_or("_").to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
