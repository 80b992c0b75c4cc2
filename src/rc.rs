/// Reference-count insertion.
///
/// First an ownership fixpoint over the whole program decides, per function
/// parameter, whether the callee consumes the argument (Owned) or only reads
/// it (Borrowed). Then a single compositional pass inserts `inc`/`dec`
/// instructions so that every heap cell's lifetime is fully accounted for:
/// a reference is retained whenever it is duplicated and released exactly
/// once on every path where it dies. `Int`-kind variables never participate.
///
/// The pass is strictly per-function: the only global state is the inferred
/// per-parameter ownership table.
use std::collections::{HashMap, HashSet};

use crate::anf::{free_vars, Anf, Body, Exp, Function, Kind, Var};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Ownership {
    Owned,
    Borrowed,
}

pub type OwnershipMap = HashMap<String, Vec<Ownership>>;

// ---------------------------------------------------------------------------
// Ownership inference
// ---------------------------------------------------------------------------

/// Fixpoint: a parameter becomes Owned as soon as any path consumes it -
/// resets it, passes it to an Owned position, or projects it into a binding
/// that is itself consumed.
pub fn infer_ownership(prog: &Anf) -> OwnershipMap {
    let mut map = OwnershipMap::new();
    for func in prog {
        map.insert(func.id.clone(), vec![Ownership::Borrowed; func.args.len()]);
    }

    let mut changed = true;
    while changed {
        changed = false;
        let mut next_map = map.clone();
        for func in prog {
            let consumed = consumed_vars(&func.body, &next_map);
            for (i, arg) in func.args.iter().enumerate() {
                if consumed.contains(arg) {
                    let ownership = next_map.get_mut(&func.id).unwrap();
                    if ownership[i] != Ownership::Owned {
                        ownership[i] = Ownership::Owned;
                    }
                }
            }
        }
        if map != next_map {
            map = next_map;
            changed = true;
        }
    }
    map
}

/// All parameters Owned - used when the borrowed-parameter optimization is
/// disabled so refcounts match naive in-degree exactly.
pub fn all_owned(prog: &Anf) -> OwnershipMap {
    prog.iter()
        .map(|func| (func.id.clone(), vec![Ownership::Owned; func.args.len()]))
        .collect()
}

fn consumed_vars(body: &Body, map: &OwnershipMap) -> HashSet<Var> {
    match body {
        Body::Ret(_) => HashSet::new(),
        Body::Match(_, branches) => {
            let mut combined = HashSet::new();
            for (_, branch) in branches {
                combined.extend(consumed_vars(branch, map));
            }
            combined
        }
        Body::Let(var, exp, next) => match exp {
            Exp::Reset(reset_var) => {
                let mut set = consumed_vars(next, map);
                set.insert(reset_var.clone());
                set
            }
            Exp::App(fid, args) => {
                let mut set = consumed_vars(next, map);
                if let Some(ownership) = map.get(fid) {
                    for (i, arg) in args.iter().enumerate() {
                        if ownership[i] == Ownership::Owned {
                            set.insert(arg.clone());
                        }
                    }
                }
                set
            }
            Exp::Proj(_, src) => {
                let mut set = consumed_vars(next, map);
                if set.contains(var) {
                    set.insert(src.clone());
                }
                set
            }
            Exp::Int(_) | Exp::Ctor(_, _) | Exp::Tuple(_) | Exp::Op(_, _, _)
            | Exp::Reuse(_, _, _) => consumed_vars(next, map),
        },
        Body::Inc(_, next) | Body::Dec(_, next) => consumed_vars(next, map),
    }
}

// ---------------------------------------------------------------------------
// Insertion
// ---------------------------------------------------------------------------

type Locals = HashMap<Var, Ownership>;

pub fn insert_rc(prog: &Anf, ownership: &OwnershipMap) -> Anf {
    prog.iter().map(|func| rc_function(func, ownership)).collect()
}

fn rc_function(func: &Function, ownership: &OwnershipMap) -> Function {
    let mut locals = Locals::new();
    for (i, status) in ownership.get(&func.id).unwrap().iter().enumerate() {
        locals.insert(func.args[i].clone(), *status);
    }
    Function {
        id: func.id.clone(),
        is_fip: func.is_fip,
        args: func.args.clone(),
        body: release_all(
            func.args.clone(),
            &rc_body(&func.body, &locals, ownership),
            &locals,
        ),
    }
}

fn rc_body(body: &Body, locals: &Locals, ownership: &OwnershipMap) -> Body {
    match body {
        Body::Ret(var) => retain(var.clone(), &HashSet::new(), body, locals),

        Body::Match(var, branches) => {
            // Everything live at the match dies in some branch; release the
            // casualties at the top of each branch. Sorted for determinism.
            let mut vars: Vec<Var> = free_vars(body).into_iter().collect();
            vars.sort();
            Body::Match(
                var.clone(),
                branches
                    .iter()
                    .map(|(cond, branch)| {
                        (
                            *cond,
                            release_all(
                                vars.clone(),
                                &rc_body(branch, locals, ownership),
                                locals,
                            ),
                        )
                    })
                    .collect(),
            )
        }

        Body::Let(var, exp, next) => match exp {
            Exp::Proj(_, src) if status_of(src, locals) == Ownership::Owned => {
                // Owned source: the new binding retains the field, and the
                // source cell is released after its last projection.
                let rest = release(src, &rc_body(next, locals, ownership), locals);
                if var.1 == Kind::Heap {
                    Body::Let(var.clone(), exp.clone(), Body::Inc(var.clone(), rest.into()).into())
                } else {
                    Body::Let(var.clone(), exp.clone(), rest.into())
                }
            }
            Exp::Proj(_, _) => {
                // Borrowed source: projections are borrowed views.
                let mut inner = locals.clone();
                inner.insert(var.clone(), Ownership::Borrowed);
                Body::Let(
                    var.clone(),
                    exp.clone(),
                    rc_body(next, &inner, ownership).into(),
                )
            }
            Exp::Reset(_) => Body::Let(
                var.clone(),
                exp.clone(),
                rc_body(next, locals, ownership).into(),
            ),
            Exp::App(fid, args) => retain_args(
                args.clone(),
                ownership.get(fid).cloned().unwrap_or_default(),
                &Body::Let(
                    var.clone(),
                    exp.clone(),
                    rc_body(next, locals, ownership).into(),
                ),
                locals,
            ),
            Exp::Ctor(_, args) | Exp::Tuple(args) => retain_args(
                args.clone(),
                vec![Ownership::Owned; args.len()],
                &Body::Let(
                    var.clone(),
                    exp.clone(),
                    rc_body(next, locals, ownership).into(),
                ),
                locals,
            ),
            Exp::Reuse(_, _, args) => retain_args(
                args.clone(),
                vec![Ownership::Owned; args.len()],
                &Body::Let(
                    var.clone(),
                    exp.clone(),
                    rc_body(next, locals, ownership).into(),
                ),
                locals,
            ),
            Exp::Int(_) | Exp::Op(_, _, _) => Body::Let(
                var.clone(),
                exp.clone(),
                rc_body(next, locals, ownership).into(),
            ),
        },

        // Inc/Dec only exist after this pass.
        Body::Inc(var, next) => {
            Body::Inc(var.clone(), rc_body(next, locals, ownership).into())
        }
        Body::Dec(var, next) => {
            Body::Dec(var.clone(), rc_body(next, locals, ownership).into())
        }
    }
}

/// Retain arguments about to be stored or passed to Owned positions.
/// Processed right to left so each retain sees what remains live after it.
fn retain_args(mut vars: Vec<Var>, mut statuses: Vec<Ownership>, body: &Body, locals: &Locals) -> Body {
    let Body::Let(var, exp, next) = body else {
        return body.clone();
    };
    if vars.is_empty() {
        return body.clone();
    }
    let top = vars.pop().unwrap();
    let top_status = statuses.pop().unwrap();

    if top_status == Ownership::Owned {
        let mut live = free_vars(next);
        live.extend(vars.iter().cloned());
        retain(top, &live, &retain_args(vars, statuses, body, locals), locals)
    } else {
        // The callee only borrows it; release here if this was its last use.
        retain_args(
            vars,
            statuses,
            &Body::Let(var.clone(), exp.clone(), release(&top, next, locals).into()),
            locals,
        )
    }
}

fn status_of(var: &Var, locals: &Locals) -> Ownership {
    locals.get(var).copied().unwrap_or(Ownership::Owned)
}

/// Retain `var` unless we own it and this is its last use (move).
fn retain(var: Var, live: &HashSet<Var>, body: &Body, locals: &Locals) -> Body {
    if status_of(&var, locals) == Ownership::Owned && !live.contains(&var) {
        body.clone()
    } else if var.1 == Kind::Heap {
        Body::Inc(var, body.clone().into())
    } else {
        body.clone()
    }
}

/// Release `var` if we own it and the continuation no longer needs it.
fn release(var: &Var, body: &Body, locals: &Locals) -> Body {
    if status_of(var, locals) == Ownership::Owned
        && !free_vars(body).contains(var)
        && var.1 != Kind::Int
    {
        Body::Dec(var.clone(), body.clone().into())
    } else {
        body.clone()
    }
}

fn release_all(vars: Vec<Var>, body: &Body, locals: &Locals) -> Body {
    let mut out = body.clone();
    for var in vars {
        out = release(&var, &out, locals);
    }
    out
}
