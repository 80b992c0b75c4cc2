/// flip static type checker.
///
/// Two-phase analysis over the resolved program:
///   Phase 1 - the resolver has already built the signature table for every
///              declared function and constructor.
///   Phase 2 - each function body is typed bottom-up and validated: call-site
///              arity and argument types, match shape and exhaustiveness,
///              let arity, and the declared return type.
///
/// The checker is strict and monomorphic; the first violation aborts
/// compilation with a `Diagnostic` carrying the offending span. Functions
/// without a signature (zero-parameter only) have their result type inferred
/// and registered in source order, so later functions may call them.
use std::collections::{HashMap, HashSet};

use crate::ast::{BinOp, Binder, Expr, ExprKind, FnDef, Pattern, Program};
use crate::error::{CompileError, Diagnostic, Span};
use crate::resolver::{FnSig, Resolved, SymbolTable};
use crate::types::{Type, TypeList, ValueType};

#[derive(Debug, Clone)]
pub struct TypedProgram {
    pub symbols: SymbolTable,
    pub fns: Vec<TypedFn>,
}

#[derive(Debug, Clone)]
pub struct TypedFn {
    pub name: String,
    pub is_fip: bool,
    pub params: Vec<(String, Type)>,
    pub results: ValueType,
    pub body: TypedExpr,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct TypedExpr {
    pub kind: TypedExprKind,
    pub ty: ValueType,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum TypedExprKind {
    Int(i64),
    Var(String),
    CallFn(String, Vec<TypedExpr>),
    CallCtor(String, Vec<TypedExpr>),
    Tuple(Vec<TypedExpr>),
    BinOp(BinOp, Box<TypedExpr>, Box<TypedExpr>),
    Match(Box<TypedExpr>, Vec<TypedArm>),
    Let(Vec<Binder>, Box<TypedExpr>, Box<TypedExpr>),
}

#[derive(Debug, Clone)]
pub struct TypedArm {
    pub pattern: Pattern,
    pub pattern_span: Span,
    pub body: TypedExpr,
}

pub fn type_check(resolved: Resolved) -> Result<TypedProgram, Diagnostic> {
    let Resolved {
        program: Program { fns, .. },
        symbols,
    } = resolved;

    let mut checker = TypeChecker { symbols };
    let mut typed_fns = Vec::with_capacity(fns.len());
    for def in fns {
        typed_fns.push(checker.check_fn(def)?);
    }

    Ok(TypedProgram {
        symbols: checker.symbols,
        fns: typed_fns,
    })
}

struct TypeChecker {
    symbols: SymbolTable,
}

type Env = HashMap<String, Type>;

impl TypeChecker {
    fn check_fn(&mut self, def: FnDef) -> Result<TypedFn, Diagnostic> {
        if def.is_fip && def.signature.is_none() {
            return Err(CompileError::FipMissingSignature {
                fid: def.name.clone(),
            }
            .at(def.span));
        }

        let declared = self.symbols.fn_sigs.get(&def.name).cloned();

        let mut env = Env::new();
        let mut params = Vec::with_capacity(def.params.len());
        if let Some(sig) = &declared {
            for (name, tp) in def.params.iter().zip(sig.params.iter()) {
                env.insert(name.clone(), tp.clone());
                params.push((name.clone(), tp.clone()));
            }
        }

        let body = self.check_expr(&def.body, &env)?;

        let results = match &declared {
            Some(sig) => {
                if body.ty.components() != sig.results.components() {
                    return Err(CompileError::WrongReturnType {
                        fid: def.name.clone(),
                        expected: sig.results.type_list(),
                        actual: body.ty.type_list(),
                    }
                    .at(body.span));
                }
                sig.results.clone()
            }
            None => {
                // Signature-less zero-parameter function: register the
                // inferred type so later declarations may call it.
                let inferred = body.ty.clone();
                self.symbols.fn_sigs.insert(
                    def.name.clone(),
                    FnSig {
                        params: Vec::new(),
                        results: inferred.clone(),
                        is_fip: def.is_fip,
                    },
                );
                inferred
            }
        };

        Ok(TypedFn {
            name: def.name,
            is_fip: def.is_fip,
            params,
            results,
            body,
            span: def.span,
        })
    }

    fn check_expr(&mut self, expr: &Expr, env: &Env) -> Result<TypedExpr, Diagnostic> {
        let span = expr.span;
        match &expr.kind {
            ExprKind::Int(i) => Ok(TypedExpr {
                kind: TypedExprKind::Int(*i),
                ty: ValueType::Single(Type::Int),
                span,
            }),

            ExprKind::Var(name) => {
                let tp = env
                    .get(name)
                    .cloned()
                    .ok_or_else(|| CompileError::UnknownVariable(name.clone()).at(span))?;
                Ok(TypedExpr {
                    kind: TypedExprKind::Var(name.clone()),
                    ty: ValueType::Single(tp),
                    span,
                })
            }

            ExprKind::Call(name, args) => self.check_call(name, args, env, span),

            ExprKind::Tuple(elems) => {
                let typed: Vec<TypedExpr> = elems
                    .iter()
                    .map(|e| self.check_expr(e, env))
                    .collect::<Result<_, _>>()?;
                let mut tps = Vec::with_capacity(typed.len());
                for e in &typed {
                    tps.push(self.expect_single(e)?);
                }
                Ok(TypedExpr {
                    kind: TypedExprKind::Tuple(typed),
                    ty: ValueType::Tuple(tps),
                    span,
                })
            }

            ExprKind::BinOp(op, lhs, rhs) => {
                let lhs = self.check_expr(lhs, env)?;
                let rhs = self.check_expr(rhs, env)?;
                let lt = self.expect_single(&lhs)?;
                let rt = self.expect_single(&rhs)?;
                if lt != Type::Int || rt != Type::Int {
                    return Err(CompileError::WrongArgumentType {
                        fid: op.symbol().to_string(),
                        expected: TypeList(vec![Type::Int, Type::Int]),
                        actual: TypeList(vec![lt, rt]),
                    }
                    .at(span));
                }
                Ok(TypedExpr {
                    kind: TypedExprKind::BinOp(*op, Box::new(lhs), Box::new(rhs)),
                    ty: ValueType::Single(Type::Int),
                    span,
                })
            }

            ExprKind::Let(binders, bound, body) => {
                let bound = self.check_expr(bound, env)?;
                let components = bound.ty.components();
                if binders.len() != components.len() {
                    return Err(CompileError::WrongVariableCountInLet {
                        expected: components.len(),
                        actual: binders.len(),
                    }
                    .at(span));
                }
                let mut inner = env.clone();
                for (binder, tp) in binders.iter().zip(components.iter()) {
                    if let Binder::Name(name) = binder {
                        inner.insert(name.clone(), tp.clone());
                    }
                }
                let body = self.check_expr(body, &inner)?;
                let ty = body.ty.clone();
                Ok(TypedExpr {
                    kind: TypedExprKind::Let(binders.clone(), Box::new(bound), Box::new(body)),
                    ty,
                    span,
                })
            }

            ExprKind::Match(scrutinee, arms) => self.check_match(scrutinee, arms, env, span),
        }
    }

    fn check_call(
        &mut self,
        name: &str,
        args: &[Expr],
        env: &Env,
        span: Span,
    ) -> Result<TypedExpr, Diagnostic> {
        let is_ctor = self.symbols.is_ctor(name);
        let sig = match self.symbols.fn_sigs.get(name) {
            Some(sig) => sig.clone(),
            None => {
                let err = if name.chars().next().map_or(false, |c| c.is_uppercase()) {
                    CompileError::UnknownConstructor(name.to_string())
                } else {
                    CompileError::UnknownFunction(name.to_string())
                };
                return Err(err.at(span));
            }
        };

        let typed_args: Vec<TypedExpr> = args
            .iter()
            .map(|a| self.check_expr(a, env))
            .collect::<Result<_, _>>()?;

        if typed_args.len() != sig.params.len() {
            return Err(CompileError::WrongVariableCountInCall {
                fid: name.to_string(),
                expected: sig.params.len(),
                actual: typed_args.len(),
            }
            .at(span));
        }

        let mut arg_types = Vec::with_capacity(typed_args.len());
        for arg in &typed_args {
            arg_types.push(self.expect_single(arg)?);
        }
        if arg_types != sig.params {
            return Err(CompileError::WrongArgumentType {
                fid: name.to_string(),
                expected: TypeList(sig.params.clone()),
                actual: TypeList(arg_types),
            }
            .at(span));
        }

        let kind = if is_ctor {
            TypedExprKind::CallCtor(name.to_string(), typed_args)
        } else {
            TypedExprKind::CallFn(name.to_string(), typed_args)
        };
        Ok(TypedExpr {
            kind,
            ty: sig.results,
            span,
        })
    }

    fn check_match(
        &mut self,
        scrutinee: &Expr,
        arms: &[crate::ast::MatchArm],
        env: &Env,
        span: Span,
    ) -> Result<TypedExpr, Diagnostic> {
        let scrutinee = self.check_expr(scrutinee, env)?;

        // Matching on a tuple is destructuring sugar: one tuple-pattern arm.
        if let ValueType::Tuple(tps) = &scrutinee.ty {
            let tps = tps.clone();
            if arms.len() != 1 {
                return Err(CompileError::BadTupleMatch.at(span));
            }
            let arm = &arms[0];
            let Pattern::Tuple(binders) = &arm.pattern else {
                return Err(CompileError::BadTupleMatch.at(arm.pattern_span));
            };
            if binders.len() != tps.len() {
                return Err(CompileError::WrongVariableCountInLet {
                    expected: tps.len(),
                    actual: binders.len(),
                }
                .at(arm.pattern_span));
            }
            let mut inner = env.clone();
            for (binder, tp) in binders.iter().zip(tps.iter()) {
                if let Binder::Name(n) = binder {
                    inner.insert(n.clone(), tp.clone());
                }
            }
            let body = self.check_expr(&arm.body, &inner)?;
            let ty = body.ty.clone();
            let typed_arm = TypedArm {
                pattern: arm.pattern.clone(),
                pattern_span: arm.pattern_span,
                body,
            };
            return Ok(TypedExpr {
                kind: TypedExprKind::Match(Box::new(scrutinee), vec![typed_arm]),
                ty,
                span,
            });
        }

        let scrutinee_tp = scrutinee.ty.single().cloned().unwrap();

        // Wildcard placement rules are shared by Int and enum matches.
        let mut has_wildcard = false;
        for arm in arms {
            let is_wildcard = matches!(arm.pattern, Pattern::Binder(_));
            if has_wildcard {
                let err = if is_wildcard {
                    CompileError::MultipleWildcards
                } else {
                    CompileError::CaseAfterWildcard(arm.pattern.display())
                };
                return Err(err.at(arm.pattern_span));
            }
            has_wildcard |= is_wildcard;
        }

        let mut typed_arms = Vec::with_capacity(arms.len());
        match &scrutinee_tp {
            Type::Int => {
                let mut used_ints = HashSet::new();
                for arm in arms {
                    let mut inner = env.clone();
                    match &arm.pattern {
                        Pattern::Int(i) => {
                            if !used_ints.insert(*i) {
                                return Err(
                                    CompileError::DuplicateIntInMatch(*i).at(arm.pattern_span)
                                );
                            }
                        }
                        Pattern::Binder(Binder::Name(n)) => {
                            inner.insert(n.clone(), Type::Int);
                        }
                        Pattern::Binder(Binder::Wildcard) => {}
                        other => {
                            return Err(CompileError::InvalidPatternInMatchCase {
                                match_on: scrutinee_tp.to_string(),
                                pattern: other.display(),
                            }
                            .at(arm.pattern_span));
                        }
                    }
                    let body = self.check_expr(&arm.body, &inner)?;
                    typed_arms.push(TypedArm {
                        pattern: arm.pattern.clone(),
                        pattern_span: arm.pattern_span,
                        body,
                    });
                }
                if !has_wildcard {
                    return Err(CompileError::NonExhaustiveMatch.at(span));
                }
            }
            Type::Enum(enum_name) => {
                let mut used_ctors = HashSet::new();
                for arm in arms {
                    let mut inner = env.clone();
                    match &arm.pattern {
                        Pattern::Ctor(ctor_name, binders) => {
                            let info =
                                self.symbols.ctors.get(ctor_name).cloned().ok_or_else(|| {
                                    CompileError::UnknownConstructor(ctor_name.clone())
                                        .at(arm.pattern_span)
                                })?;
                            if &info.enum_name != enum_name {
                                return Err(CompileError::InvalidPatternInMatchCase {
                                    match_on: scrutinee_tp.to_string(),
                                    pattern: arm.pattern.display(),
                                }
                                .at(arm.pattern_span));
                            }
                            if binders.len() != info.fields.len() {
                                return Err(CompileError::WrongVariableCountInMatchCase {
                                    fid: ctor_name.clone(),
                                    expected: info.fields.len(),
                                    actual: binders.len(),
                                }
                                .at(arm.pattern_span));
                            }
                            if !used_ctors.insert(ctor_name.clone()) {
                                return Err(CompileError::DuplicateConstructorInMatch(
                                    ctor_name.clone(),
                                )
                                .at(arm.pattern_span));
                            }
                            for (binder, tp) in binders.iter().zip(info.fields.iter()) {
                                if let Binder::Name(n) = binder {
                                    inner.insert(n.clone(), tp.clone());
                                }
                            }
                        }
                        Pattern::Binder(Binder::Name(n)) => {
                            inner.insert(n.clone(), scrutinee_tp.clone());
                        }
                        Pattern::Binder(Binder::Wildcard) => {}
                        other => {
                            return Err(CompileError::InvalidPatternInMatchCase {
                                match_on: scrutinee_tp.to_string(),
                                pattern: other.display(),
                            }
                            .at(arm.pattern_span));
                        }
                    }
                    let body = self.check_expr(&arm.body, &inner)?;
                    typed_arms.push(TypedArm {
                        pattern: arm.pattern.clone(),
                        pattern_span: arm.pattern_span,
                        body,
                    });
                }
                let ctor_count = self.symbols.enums.get(enum_name).map_or(0, |cs| cs.len());
                if !has_wildcard && used_ctors.len() < ctor_count {
                    return Err(CompileError::NonExhaustiveMatch.at(span));
                }
            }
        }

        // Every arm must produce the same type.
        let first_ty = typed_arms[0].body.ty.clone();
        for arm in &typed_arms[1..] {
            if arm.body.ty.components() != first_ty.components() {
                return Err(CompileError::MismatchedTypesInMatchCases.at(span));
            }
        }

        Ok(TypedExpr {
            kind: TypedExprKind::Match(Box::new(scrutinee), typed_arms),
            ty: first_ty,
            span,
        })
    }

    fn expect_single(&self, expr: &TypedExpr) -> Result<Type, Diagnostic> {
        expr.ty
            .single()
            .cloned()
            .ok_or_else(|| CompileError::UnexpectedTuple.at(expr.span))
    }
}

// ---------------------------------------------------------------------------
// Stage dump
// ---------------------------------------------------------------------------

pub fn dump(program: &TypedProgram) -> String {
    use crate::resolver::display_name;
    use std::fmt::Write;

    fn render(expr: &TypedExpr, indent: usize, out: &mut String) {
        let tab = "  ".repeat(indent);
        match &expr.kind {
            TypedExprKind::Int(i) => {
                let _ = write!(out, "{}", i);
            }
            TypedExprKind::Var(name) => {
                let _ = write!(out, "{}", display_name(name));
            }
            TypedExprKind::CallFn(name, args) | TypedExprKind::CallCtor(name, args) => {
                let _ = write!(out, "{}", name);
                if !args.is_empty() {
                    let _ = write!(out, "(");
                    for (i, arg) in args.iter().enumerate() {
                        if i > 0 {
                            let _ = write!(out, ", ");
                        }
                        render(arg, indent, out);
                    }
                    let _ = write!(out, ")");
                }
            }
            TypedExprKind::Tuple(elems) => {
                let _ = write!(out, "(");
                for (i, elem) in elems.iter().enumerate() {
                    if i > 0 {
                        let _ = write!(out, ", ");
                    }
                    render(elem, indent, out);
                }
                let _ = write!(out, ")");
            }
            TypedExprKind::BinOp(op, lhs, rhs) => {
                let _ = write!(out, "(");
                render(lhs, indent, out);
                let _ = write!(out, " {} ", op.symbol());
                render(rhs, indent, out);
                let _ = write!(out, ")");
            }
            TypedExprKind::Let(binders, bound, body) => {
                let names: Vec<&str> = binders
                    .iter()
                    .map(|b| b.name().map(display_name).unwrap_or("_"))
                    .collect();
                if names.len() == 1 {
                    let _ = write!(out, "let {} = ", names[0]);
                } else {
                    let _ = write!(out, "let ({}) = ", names.join(", "));
                }
                render(bound, indent, out);
                let _ = write!(out, " in\n{}", tab);
                render(body, indent, out);
            }
            TypedExprKind::Match(scrutinee, arms) => {
                let _ = write!(out, "match ");
                render(scrutinee, indent, out);
                let _ = writeln!(out, " {{");
                for arm in arms {
                    let _ = write!(out, "{}  {}: ", tab, display_pattern(&arm.pattern));
                    render(&arm.body, indent + 1, out);
                    let _ = writeln!(out, ",");
                }
                let _ = write!(out, "{}}}", tab);
            }
        }
    }

    fn display_pattern(pattern: &Pattern) -> String {
        match pattern {
            Pattern::Int(i) => i.to_string(),
            Pattern::Binder(Binder::Name(n)) => display_name(n).to_string(),
            Pattern::Binder(Binder::Wildcard) => "_".to_string(),
            Pattern::Ctor(name, binders) => {
                if binders.is_empty() {
                    name.clone()
                } else {
                    let names: Vec<&str> = binders
                        .iter()
                        .map(|b| b.name().map(display_name).unwrap_or("_"))
                        .collect();
                    format!("{}({})", name, names.join(", "))
                }
            }
            Pattern::Tuple(binders) => {
                let names: Vec<&str> = binders
                    .iter()
                    .map(|b| b.name().map(display_name).unwrap_or("_"))
                    .collect();
                format!("({})", names.join(", "))
            }
        }
    }

    let mut out = String::new();
    for func in &program.fns {
        let fip = if func.is_fip { "fip " } else { "" };
        let params = TypeList(func.params.iter().map(|(_, tp)| tp.clone()).collect());
        let names: Vec<&str> = func
            .params
            .iter()
            .map(|(name, _)| display_name(name))
            .collect();
        let _ = writeln!(
            out,
            "{}{}{} {}({}) =",
            fip,
            if func.params.is_empty() {
                String::new()
            } else {
                format!("{}:", params)
            },
            func.results,
            func.name,
            names.join(", ")
        );
        let mut body = String::new();
        render(&func.body, 1, &mut body);
        let _ = writeln!(out, "  {};", body);
        let _ = writeln!(out);
    }
    out
}
