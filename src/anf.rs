/// A-normal-form intermediate representation.
///
/// Every intermediate value is bound to a named variable, so the reuse and
/// refcount passes can reason about lifetimes as plain name sets. Bodies are
/// sequences of `let` bindings ending in `ret`, with `match` branching on a
/// scrutinee variable; `inc`/`dec` nodes are inserted by the refcount pass
/// and `reset`/`reuse` by the reuse pass.
///
/// Variables carry a value kind: `Int` values are immediates and never touch
/// the heap; `Heap` values are either boxed cells (constructors with fields,
/// tuples) or unboxed zero-arity constructor tags - refcount operations on
/// the latter are runtime no-ops.
use std::cell::Cell;
use std::collections::HashSet;
use std::fmt::{Display, Formatter};

use crate::ast::{BinOp, Binder, Pattern};
use crate::resolver::SymbolTable;
use crate::typechecker::{TypedExpr, TypedExprKind, TypedFn, TypedProgram};
use crate::types::{Type, ValueType};

pub type Anf = Vec<Function>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Kind {
    Int,
    Heap,
}

pub type Var = (String, Kind);

#[derive(Debug, Clone)]
pub struct Function {
    pub id: String,
    pub is_fip: bool,
    pub args: Vec<Var>,
    pub body: Body,
}

/// Branch condition of a `match`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cond {
    Ctor { tag: u8, arity: u8 },
    Int(i64),
    Default,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    Ret(Var),
    Let(Var, Exp, Box<Body>),
    Match(Var, Vec<(Cond, Body)>),
    Inc(Var, Box<Body>),
    Dec(Var, Box<Body>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exp {
    App(String, Vec<Var>),
    Ctor(u8, Vec<Var>),
    Proj(u8, Var),
    Tuple(Vec<Var>),
    Int(i64),
    Op(BinOp, Var, Var),
    Reset(Var),
    Reuse(Var, u8, Vec<Var>),
}

impl Exp {
    pub fn mentions(&self, var: &Var) -> bool {
        match self {
            Exp::App(_, vars) | Exp::Ctor(_, vars) | Exp::Tuple(vars) => {
                vars.iter().any(|v| v == var)
            }
            Exp::Proj(_, v) => v == var,
            Exp::Op(_, v1, v2) => v1 == var || v2 == var,
            Exp::Int(_) => false,
            Exp::Reset(v) => v == var,
            Exp::Reuse(v, _, vars) => v == var || vars.iter().any(|x| x == var),
        }
    }
}

impl Body {
    pub fn mentions(&self, var: &Var) -> bool {
        match self {
            Body::Ret(v) => v == var,
            Body::Let(_, exp, next) => exp.mentions(var) || next.mentions(var),
            Body::Match(v, branches) => {
                v == var || branches.iter().any(|(_, b)| b.mentions(var))
            }
            Body::Inc(v, next) | Body::Dec(v, next) => v == var || next.mentions(var),
        }
    }
}

pub fn kind_of(ty: &ValueType) -> Kind {
    match ty {
        ValueType::Single(Type::Int) => Kind::Int,
        ValueType::Single(Type::Enum(_)) => Kind::Heap,
        ValueType::Tuple(_) => Kind::Heap,
    }
}

fn kind_of_type(tp: &Type) -> Kind {
    match tp {
        Type::Int => Kind::Int,
        Type::Enum(_) => Kind::Heap,
    }
}

// ---------------------------------------------------------------------------
// Lowering from the typed AST
// ---------------------------------------------------------------------------

pub fn from_typed(program: &TypedProgram) -> Anf {
    let lowering = Lowering {
        symbols: &program.symbols,
        counter: Cell::new(0),
    };
    program
        .fns
        .iter()
        .map(|func| lowering.lower_fn(func))
        .collect()
}

struct Lowering<'a> {
    symbols: &'a SymbolTable,
    counter: Cell<usize>,
}

impl<'a> Lowering<'a> {
    fn fresh(&self) -> String {
        let next = self.counter.get() + 1;
        self.counter.set(next);
        format!("fresh{}", next)
    }

    fn lower_fn(&self, func: &TypedFn) -> Function {
        let args: Vec<Var> = func
            .params
            .iter()
            .map(|(name, tp)| (name.clone(), kind_of_type(tp)))
            .collect();
        let body = self.lower(&func.body, &|var| Body::Ret(var));
        Function {
            id: func.name.clone(),
            is_fip: func.is_fip,
            args,
            body: remove_dead_bindings(body),
        }
    }

    fn lower(&self, expr: &TypedExpr, k: &dyn Fn(Var) -> Body) -> Body {
        let kind = kind_of(&expr.ty);
        match &expr.kind {
            TypedExprKind::Var(name) => k((name.clone(), kind)),

            TypedExprKind::Int(i) => {
                let binding = (self.fresh(), kind);
                Body::Let(binding.clone(), Exp::Int(*i), k(binding).into())
            }

            TypedExprKind::BinOp(op, lhs, rhs) => self.lower(lhs, &move |v1| {
                self.lower(rhs, &move |v2: Var| {
                    let binding = (self.fresh(), Kind::Int);
                    Body::Let(
                        binding.clone(),
                        Exp::Op(*op, v1.clone(), v2),
                        k(binding).into(),
                    )
                })
            }),

            TypedExprKind::CallFn(name, args) => self.lower_list(args, &move |vars| {
                let binding = (self.fresh(), kind);
                Body::Let(
                    binding.clone(),
                    Exp::App(name.clone(), vars),
                    k(binding).into(),
                )
            }),

            TypedExprKind::CallCtor(name, args) => {
                let tag = self.symbols.ctors[name].tag as u8;
                if args.is_empty() {
                    // Zero-arity constructors are unboxed: the value is the tag.
                    let binding = (self.fresh(), kind);
                    Body::Let(binding.clone(), Exp::Int(tag as i64), k(binding).into())
                } else {
                    self.lower_list(args, &move |vars| {
                        let binding = (self.fresh(), kind);
                        Body::Let(binding.clone(), Exp::Ctor(tag, vars), k(binding).into())
                    })
                }
            }

            TypedExprKind::Tuple(elems) => self.lower_list(elems, &move |vars| {
                let binding = (self.fresh(), kind);
                Body::Let(binding.clone(), Exp::Tuple(vars), k(binding).into())
            }),

            TypedExprKind::Let(binders, bound, body) => {
                if binders.len() == 1 {
                    let binder = &binders[0];
                    self.lower(bound, &move |v1| match binder {
                        Binder::Name(name) => {
                            let target = (name.clone(), kind_of(&bound.ty));
                            replace_var_body(v1.clone(), &target, self.lower(body, k))
                        }
                        Binder::Wildcard => {
                            // The binding is unreferenced; dead-binding removal
                            // will drop the computation.
                            self.lower(body, k)
                        }
                    })
                } else {
                    let components = bound.ty.components();
                    self.lower(bound, &move |v1| {
                        let inner = self.lower(body, k);
                        binders.iter().enumerate().rev().fold(
                            inner,
                            |acc, (i, binder)| match binder {
                                Binder::Name(name) => Body::Let(
                                    (name.clone(), kind_of_type(&components[i])),
                                    Exp::Proj(i as u8, v1.clone()),
                                    acc.into(),
                                ),
                                Binder::Wildcard => acc,
                            },
                        )
                    })
                }
            }

            TypedExprKind::Match(scrutinee, arms) => {
                // Tuple destructuring: a single tuple-pattern arm.
                if let ValueType::Tuple(components) = &scrutinee.ty {
                    let arm = &arms[0];
                    let Pattern::Tuple(binders) = &arm.pattern else {
                        unreachable!("validated tuple match");
                    };
                    return self.lower(scrutinee, &move |v| {
                        let inner = self.lower(&arm.body, k);
                        binders.iter().enumerate().rev().fold(
                            inner,
                            |acc, (i, binder)| match binder {
                                Binder::Name(name) => Body::Let(
                                    (name.clone(), kind_of_type(&components[i])),
                                    Exp::Proj(i as u8, v.clone()),
                                    acc.into(),
                                ),
                                Binder::Wildcard => acc,
                            },
                        )
                    });
                }

                let scrutinee_kind = kind_of(&scrutinee.ty);
                self.lower(scrutinee, &move |v| {
                    let mut branches: Vec<(Cond, Body)> = Vec::with_capacity(arms.len());
                    for arm in arms {
                        match &arm.pattern {
                            Pattern::Int(i) => {
                                branches.push((Cond::Int(*i), self.lower(&arm.body, k)));
                            }
                            Pattern::Binder(Binder::Wildcard) => {
                                branches.push((Cond::Default, self.lower(&arm.body, k)));
                            }
                            Pattern::Binder(Binder::Name(name)) => {
                                let body = self.lower(&arm.body, k);
                                let target = (name.clone(), scrutinee_kind);
                                branches.push((
                                    Cond::Default,
                                    replace_var_body(v.clone(), &target, body),
                                ));
                            }
                            Pattern::Ctor(ctor_name, binders) => {
                                let info = &self.symbols.ctors[ctor_name];
                                let mut body = self.lower(&arm.body, k);
                                for i in (0..binders.len()).rev() {
                                    if let Binder::Name(name) = &binders[i] {
                                        body = Body::Let(
                                            (name.clone(), kind_of_type(&info.fields[i])),
                                            Exp::Proj(i as u8, v.clone()),
                                            body.into(),
                                        );
                                    }
                                }
                                branches.push((
                                    Cond::Ctor {
                                        tag: info.tag as u8,
                                        arity: binders.len() as u8,
                                    },
                                    body,
                                ));
                            }
                            Pattern::Tuple(_) => unreachable!("validated tuple match"),
                        }
                    }
                    Body::Match(v, branches)
                })
            }
        }
    }

    fn lower_list(&self, exprs: &[TypedExpr], k: &dyn Fn(Vec<Var>) -> Body) -> Body {
        if exprs.is_empty() {
            k(Vec::new())
        } else {
            let first = &exprs[0];
            let rest = &exprs[1..];
            self.lower(first, &move |var_first| {
                self.lower_list(rest, &move |vars_rest| {
                    let mut all = vec![var_first.clone()];
                    all.extend(vars_rest);
                    k(all)
                })
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Variable substitution and cleanup
// ---------------------------------------------------------------------------

fn replace_var(var: Var, replacing: &Var, replacee: &Var) -> Var {
    if var == *replacee {
        replacing.clone()
    } else {
        var
    }
}

fn replace_var_exp(replacing: &Var, replacee: &Var, exp: Exp) -> Exp {
    let sub = |v: Var| replace_var(v, replacing, replacee);
    match exp {
        Exp::App(id, args) => Exp::App(id, args.into_iter().map(sub).collect()),
        Exp::Ctor(tag, args) => Exp::Ctor(tag, args.into_iter().map(sub).collect()),
        Exp::Tuple(args) => Exp::Tuple(args.into_iter().map(sub).collect()),
        Exp::Proj(i, v) => Exp::Proj(i, sub(v)),
        Exp::Int(i) => Exp::Int(i),
        Exp::Op(op, v1, v2) => Exp::Op(op, sub(v1), sub(v2)),
        Exp::Reset(v) => Exp::Reset(sub(v)),
        Exp::Reuse(v, tag, args) => Exp::Reuse(sub(v), tag, args.into_iter().map(sub).collect()),
    }
}

pub fn replace_var_body(replacing: Var, replacee: &Var, body: Body) -> Body {
    match body {
        Body::Ret(var) => Body::Ret(replace_var(var, &replacing, replacee)),
        Body::Let(var, exp, next) => Body::Let(
            replace_var(var, &replacing, replacee),
            replace_var_exp(&replacing, replacee, exp),
            replace_var_body(replacing, replacee, *next).into(),
        ),
        Body::Match(var, branches) => Body::Match(
            replace_var(var, &replacing, replacee),
            branches
                .into_iter()
                .map(|(cond, branch)| (cond, replace_var_body(replacing.clone(), replacee, branch)))
                .collect(),
        ),
        Body::Inc(var, next) => Body::Inc(
            replace_var(var, &replacing, replacee),
            replace_var_body(replacing, replacee, *next).into(),
        ),
        Body::Dec(var, next) => Body::Dec(
            replace_var(var, &replacing, replacee),
            replace_var_body(replacing, replacee, *next).into(),
        ),
    }
}

/// Bindings whose variable is never referenced downstream are dropped;
/// the language is pure, so the computation goes with them.
pub fn remove_dead_bindings(body: Body) -> Body {
    match body {
        Body::Ret(var) => Body::Ret(var),
        Body::Let(var, exp, next) => {
            if free_vars(&next).contains(&var) {
                Body::Let(var, exp, remove_dead_bindings(*next).into())
            } else {
                remove_dead_bindings(*next)
            }
        }
        Body::Match(var, branches) => Body::Match(
            var,
            branches
                .into_iter()
                .map(|(cond, branch)| (cond, remove_dead_bindings(branch)))
                .collect(),
        ),
        Body::Inc(var, next) => Body::Inc(var, remove_dead_bindings(*next).into()),
        Body::Dec(var, next) => Body::Dec(var, remove_dead_bindings(*next).into()),
    }
}

fn free_vars_exp(exp: &Exp, bound: &HashSet<Var>) -> HashSet<Var> {
    let mut set = HashSet::new();
    let mut add = |v: &Var| {
        if !bound.contains(v) {
            set.insert(v.clone());
        }
    };
    match exp {
        Exp::App(_, args) | Exp::Ctor(_, args) | Exp::Tuple(args) => {
            args.iter().for_each(&mut add)
        }
        Exp::Proj(_, v) | Exp::Reset(v) => add(v),
        Exp::Op(_, v1, v2) => {
            add(v1);
            add(v2);
        }
        Exp::Int(_) => {}
        Exp::Reuse(v, _, args) => {
            add(v);
            args.iter().for_each(&mut add);
        }
    }
    set
}

fn free_vars_helper(body: &Body, mut bound: HashSet<Var>) -> HashSet<Var> {
    match body {
        Body::Ret(var) => {
            let mut set = HashSet::new();
            if !bound.contains(var) {
                set.insert(var.clone());
            }
            set
        }
        Body::Let(var, exp, next) => {
            let exp_set = free_vars_exp(exp, &bound);
            bound.insert(var.clone());
            let mut set = free_vars_helper(next, bound);
            set.extend(exp_set);
            set
        }
        Body::Match(var, branches) => {
            let mut set = HashSet::new();
            for (_, branch) in branches {
                set.extend(free_vars_helper(branch, bound.clone()));
            }
            if !bound.contains(var) {
                set.insert(var.clone());
            }
            set
        }
        Body::Inc(var, next) | Body::Dec(var, next) => {
            let mut set = free_vars_helper(next, bound.clone());
            if !bound.contains(var) {
                set.insert(var.clone());
            }
            set
        }
    }
}

pub fn free_vars(body: &Body) -> HashSet<Var> {
    free_vars_helper(body, HashSet::new())
}

// ---------------------------------------------------------------------------
// Pretty printing (stage dumps)
// ---------------------------------------------------------------------------

pub fn dump(prog: &Anf) -> String {
    prog.iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

impl Display for Function {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let args = self
            .args
            .iter()
            .map(|(name, _)| name.clone())
            .collect::<Vec<_>>()
            .join(" ");
        let fip = if self.is_fip { "fip " } else { "" };
        if args.is_empty() {
            write!(f, "{}{} =\n{}", fip, self.id, self.body.pretty(2))
        } else {
            write!(f, "{}{} {} =\n{}", fip, self.id, args, self.body.pretty(2))
        }
    }
}

impl Body {
    fn pretty(&self, indent: usize) -> String {
        let tab = " ".repeat(indent);
        match self {
            Body::Ret(var) => format!("{}ret {}\n", tab, var.0),
            Body::Let(var, exp, next) => {
                format!("{}let {} = {};\n{}", tab, var.0, exp, next.pretty(indent))
            }
            Body::Match(var, branches) => {
                let mut out = format!("{}match {}\n", tab, var.0);
                for (cond, branch) in branches {
                    out.push_str(&format!("{}{} ->\n", " ".repeat(indent + 2), cond));
                    out.push_str(&branch.pretty(indent + 4));
                }
                out
            }
            Body::Inc(var, next) => format!("{}inc {};\n{}", tab, var.0, next.pretty(indent)),
            Body::Dec(var, next) => format!("{}dec {};\n{}", tab, var.0, next.pretty(indent)),
        }
    }
}

impl Display for Cond {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Cond::Ctor { tag, arity } => write!(f, "ctor {}/{}", tag, arity),
            Cond::Int(i) => write!(f, "{}", i),
            Cond::Default => write!(f, "_"),
        }
    }
}

impl Display for Exp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let names = |vars: &[Var]| {
            vars.iter()
                .map(|v| v.0.clone())
                .collect::<Vec<_>>()
                .join(", ")
        };
        match self {
            Exp::App(id, args) => write!(f, "{}({})", id, names(args)),
            Exp::Ctor(tag, args) => write!(f, "Ctor({}, {})", tag, names(args)),
            Exp::Proj(i, v) => write!(f, "Proj({}, {})", i, v.0),
            Exp::Tuple(args) => write!(f, "Tuple({})", names(args)),
            Exp::Int(i) => write!(f, "{}", i),
            Exp::Op(op, v1, v2) => write!(f, "{} {} {}", v1.0, op.symbol(), v2.0),
            Exp::Reset(v) => write!(f, "reset {}", v.0),
            Exp::Reuse(v, tag, args) => {
                write!(f, "reuse {} in Ctor({}, {})", v.0, tag, names(args))
            }
        }
    }
}
