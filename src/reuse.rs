/// Reuse analysis for `fip` functions.
///
/// Two halves:
///
/// 1. `validate_fip` proves uniqueness on the typed AST: inside a fip
///    function no heap-typed value may be consumed twice on any execution
///    path, every heap-typed binding (parameter, let binding, constructor
///    field) must be consumed on every path, and no heap field may be
///    discarded. `fip` is a proof obligation - a function the analysis
///    cannot validate is rejected, naming the offending binding.
///
/// 2. `add_reuse` rewrites the ANF of fip functions: for each match arm
///    over a boxed constructor, once the scrutinee can no longer be
///    referenced, `let t = reset scrutinee` claims its cell, and the first
///    constructor application of the same arity is rewritten to build into
///    that cell (`reuse`). Availability is keyed by cell shape; the tag is
///    rewritten at the reuse site. Constructions with no available cell
///    fall back to ordinary allocation.
use std::collections::HashSet;

use crate::anf::{Anf, Body, Cond, Exp, Function};
use crate::ast::{Binder, Pattern};
use crate::error::{CompileError, Diagnostic, Span};
use crate::resolver::display_name;
use crate::typechecker::{TypedExpr, TypedExprKind, TypedFn, TypedProgram};
use crate::types::{Type, ValueType};

// ---------------------------------------------------------------------------
// Uniqueness validation
// ---------------------------------------------------------------------------

pub fn validate_fip(program: &TypedProgram) -> Result<(), Diagnostic> {
    for func in &program.fns {
        if func.is_fip {
            Validator { program, func }.run()?;
        }
    }
    Ok(())
}

struct Validator<'a> {
    program: &'a TypedProgram,
    func: &'a TypedFn,
}

/// Heap-typed variable names consumed along every path of a subexpression.
type UseSet = HashSet<String>;

impl<'a> Validator<'a> {
    fn run(&self) -> Result<(), Diagnostic> {
        let mut used = self.check(&self.func.body)?;
        for (name, tp) in &self.func.params {
            if is_heap(tp) && !used.remove(name) {
                return Err(self.unused(name, self.func.span));
            }
        }
        Ok(())
    }

    fn reused(&self, var: &str, span: Span) -> Diagnostic {
        CompileError::FipVariableReused {
            fid: self.func.name.clone(),
            var: display_name(var).to_string(),
        }
        .at(span)
    }

    fn unused(&self, var: &str, span: Span) -> Diagnostic {
        CompileError::FipVariableUnused {
            fid: self.func.name.clone(),
            var: display_name(var).to_string(),
        }
        .at(span)
    }

    fn merge(&self, mut acc: UseSet, child: UseSet, span: Span) -> Result<UseSet, Diagnostic> {
        if let Some(var) = acc.intersection(&child).next() {
            return Err(self.reused(var, span));
        }
        acc.extend(child);
        Ok(acc)
    }

    fn check(&self, node: &TypedExpr) -> Result<UseSet, Diagnostic> {
        match &node.kind {
            TypedExprKind::Int(_) => Ok(UseSet::new()),

            TypedExprKind::Var(name) => {
                let mut set = UseSet::new();
                if matches!(node.ty, ValueType::Single(Type::Enum(_)) | ValueType::Tuple(_)) {
                    set.insert(name.clone());
                }
                Ok(set)
            }

            TypedExprKind::CallFn(_, args)
            | TypedExprKind::CallCtor(_, args)
            | TypedExprKind::Tuple(args) => {
                let mut acc = UseSet::new();
                for arg in args {
                    let child = self.check(arg)?;
                    acc = self.merge(acc, child, node.span)?;
                }
                Ok(acc)
            }

            TypedExprKind::BinOp(_, lhs, rhs) => {
                let acc = self.check(lhs)?;
                self.merge(acc, self.check(rhs)?, node.span)
            }

            TypedExprKind::Let(binders, bound, body) => {
                let bound_set = self.check(bound)?;
                let mut body_set = self.check(body)?;
                let components = bound.ty.components();
                for (binder, tp) in binders.iter().zip(components.iter()) {
                    if !is_heap(tp) {
                        continue;
                    }
                    match binder {
                        Binder::Name(name) => {
                            if !body_set.remove(name) {
                                return Err(self.unused(name, node.span));
                            }
                        }
                        Binder::Wildcard => return Err(self.unused("_", node.span)),
                    }
                }
                self.merge(bound_set, body_set, node.span)
            }

            TypedExprKind::Match(scrutinee, arms) => {
                let scrut_set = self.check(scrutinee)?;
                let mut common: Option<UseSet> = None;

                for arm in arms {
                    let mut arm_set = self.check(&arm.body)?;
                    match &arm.pattern {
                        Pattern::Int(_) => {}
                        Pattern::Binder(Binder::Wildcard) => {
                            // A wildcard over an enum with boxed constructors
                            // would silently drop a cell.
                            if let ValueType::Single(Type::Enum(name)) = &scrutinee.ty {
                                if self.enum_has_boxed_ctor(name) {
                                    return Err(self.unused("_", arm.pattern_span));
                                }
                            }
                        }
                        Pattern::Binder(Binder::Name(name)) => {
                            if heap_value(&scrutinee.ty) && !arm_set.remove(name) {
                                return Err(self.unused(name, arm.pattern_span));
                            }
                        }
                        Pattern::Ctor(ctor_name, binders) => {
                            let info = &self.program.symbols.ctors[ctor_name];
                            for (binder, tp) in binders.iter().zip(info.fields.iter()) {
                                if !is_heap(tp) {
                                    continue;
                                }
                                match binder {
                                    Binder::Name(name) => {
                                        if !arm_set.remove(name) {
                                            return Err(self.unused(name, arm.pattern_span));
                                        }
                                    }
                                    Binder::Wildcard => {
                                        return Err(CompileError::FipFieldDiscarded {
                                            fid: self.func.name.clone(),
                                            ctor: ctor_name.clone(),
                                        }
                                        .at(arm.pattern_span));
                                    }
                                }
                            }
                        }
                        Pattern::Tuple(binders) => {
                            let components = scrutinee.ty.components();
                            for (binder, tp) in binders.iter().zip(components.iter()) {
                                if !is_heap(tp) {
                                    continue;
                                }
                                match binder {
                                    Binder::Name(name) => {
                                        if !arm_set.remove(name) {
                                            return Err(self.unused(name, arm.pattern_span));
                                        }
                                    }
                                    Binder::Wildcard => {
                                        return Err(self.unused("_", arm.pattern_span));
                                    }
                                }
                            }
                        }
                    }

                    if let Some(var) = arm_set.intersection(&scrut_set).next() {
                        return Err(self.reused(var, arm.body.span));
                    }

                    // Each arm must consume the same outer bindings, otherwise
                    // a value is live in one branch and dropped in another.
                    match &common {
                        None => common = Some(arm_set),
                        Some(prev) => {
                            if let Some(var) = prev.symmetric_difference(&arm_set).next() {
                                return Err(self.unused(var, arm.body.span));
                            }
                        }
                    }
                }

                let mut acc = scrut_set;
                if let Some(common) = common {
                    acc.extend(common);
                }
                Ok(acc)
            }
        }
    }

    fn enum_has_boxed_ctor(&self, enum_name: &str) -> bool {
        self.program
            .symbols
            .enums
            .get(enum_name)
            .map(|ctors| {
                ctors
                    .iter()
                    .any(|c| !self.program.symbols.ctors[c].fields.is_empty())
            })
            .unwrap_or(false)
    }
}

fn is_heap(tp: &Type) -> bool {
    matches!(tp, Type::Enum(_))
}

fn heap_value(ty: &ValueType) -> bool {
    matches!(ty, ValueType::Single(Type::Enum(_)) | ValueType::Tuple(_))
}

// ---------------------------------------------------------------------------
// Reset/reuse insertion
// ---------------------------------------------------------------------------

pub fn add_reuse(prog: &Anf) -> Anf {
    let mut pass = ReusePass { counter: 0 };
    prog.iter()
        .map(|func| Function {
            id: func.id.clone(),
            is_fip: func.is_fip,
            args: func.args.clone(),
            body: if func.is_fip {
                pass.rewrite_matches(&func.body)
            } else {
                func.body.clone()
            },
        })
        .collect()
}

struct ReusePass {
    counter: usize,
}

impl ReusePass {
    fn fresh(&mut self) -> String {
        self.counter += 1;
        format!("cell{}", self.counter)
    }

    /// Walk every match bottom-up, offering each boxed scrutinee cell for
    /// reuse within its own arm.
    fn rewrite_matches(&mut self, body: &Body) -> Body {
        match body {
            Body::Ret(var) => Body::Ret(var.clone()),
            Body::Let(var, exp, next) => {
                Body::Let(var.clone(), exp.clone(), self.rewrite_matches(next).into())
            }
            Body::Match(var, branches) => {
                let mut rewritten = Vec::with_capacity(branches.len());
                for (cond, branch) in branches {
                    let branch = self.rewrite_matches(branch);
                    let branch = match cond {
                        Cond::Ctor { arity, .. } if *arity > 0 => {
                            self.claim_in_arm(var, *arity, &branch)
                        }
                        _ => branch,
                    };
                    rewritten.push((*cond, branch));
                }
                Body::Match(var.clone(), rewritten)
            }
            Body::Inc(var, next) => Body::Inc(var.clone(), self.rewrite_matches(next).into()),
            Body::Dec(var, next) => Body::Dec(var.clone(), self.rewrite_matches(next).into()),
        }
    }

    /// Insert `reset` at the first point the scrutinee is dead, then rewrite
    /// the first same-arity constructor below it into a `reuse`.
    fn claim_in_arm(&mut self, scrutinee: &crate::anf::Var, arity: u8, body: &Body) -> Body {
        match body {
            Body::Ret(var) => Body::Ret(var.clone()),
            Body::Match(var, branches) => Body::Match(
                var.clone(),
                branches
                    .iter()
                    .map(|(cond, branch)| (*cond, self.claim_in_arm(scrutinee, arity, branch)))
                    .collect(),
            ),
            Body::Let(var, exp, next) if exp.mentions(scrutinee) || next.mentions(scrutinee) => {
                Body::Let(
                    var.clone(),
                    exp.clone(),
                    self.claim_in_arm(scrutinee, arity, next).into(),
                )
            }
            Body::Inc(var, next) if var == scrutinee || next.mentions(scrutinee) => Body::Inc(
                var.clone(),
                self.claim_in_arm(scrutinee, arity, next).into(),
            ),
            Body::Dec(var, next) if var == scrutinee || next.mentions(scrutinee) => Body::Dec(
                var.clone(),
                self.claim_in_arm(scrutinee, arity, next).into(),
            ),
            _ => {
                let cell = (self.fresh(), crate::anf::Kind::Heap);
                let rewritten = insert_reuse(&cell, arity, body);
                if rewritten != *body {
                    Body::Let(cell, Exp::Reset(scrutinee.clone()), rewritten.into())
                } else {
                    rewritten
                }
            }
        }
    }
}

/// Rewrite the first constructor application of matching arity into a reuse
/// of `cell`. Returns the body unchanged when no construction matches.
fn insert_reuse(cell: &crate::anf::Var, arity: u8, body: &Body) -> Body {
    match body {
        Body::Ret(var) => Body::Ret(var.clone()),
        Body::Let(var, exp, next) => match exp {
            Exp::Ctor(tag, vars) if vars.len() as u8 == arity => Body::Let(
                var.clone(),
                Exp::Reuse(cell.clone(), *tag, vars.clone()),
                next.clone(),
            ),
            _ => Body::Let(
                var.clone(),
                exp.clone(),
                insert_reuse(cell, arity, next).into(),
            ),
        },
        Body::Match(var, branches) => Body::Match(
            var.clone(),
            branches
                .iter()
                .map(|(cond, branch)| (*cond, insert_reuse(cell, arity, branch)))
                .collect(),
        ),
        Body::Inc(var, next) => Body::Inc(var.clone(), insert_reuse(cell, arity, next).into()),
        Body::Dec(var, next) => Body::Dec(var.clone(), insert_reuse(cell, arity, next).into()),
    }
}
