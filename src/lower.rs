/// Lowering from ANF to an imperative statement IR.
///
/// This is the last shared stage: the C emitter renders these statements as
/// source text and the interpreter executes them directly. Heap cells follow
/// a fixed protocol - `[Tag, Size, Refs, field0, field1, ...]` - header at
/// indices 0-2, data fields from index 3. Tuples are ordinary cells with
/// tag 0; the empty tuple is the immediate 0. `main` prints its result and
/// returns 0.
use std::fmt::{Display, Formatter};

use crate::anf::{Anf, Body, Cond, Exp, Var};
use crate::ast::BinOp;

pub const HEADER_FIELDS: i64 = 3;
pub const TAG_FIELD: i64 = 0;
pub const SIZE_FIELD: i64 = 1;
pub const REFS_FIELD: i64 = 2;

#[derive(Debug, Clone)]
pub struct Def {
    pub id: String,
    pub args: Vec<String>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Var(String),
    /// A language-level integer; the C emitter tags it.
    Int(i64),
    /// Cell metadata (sizes, refcounts, the literal truth value of an
    /// unconditional branch); emitted as-is.
    Raw(i64),
    /// Null test of a reuse cell.
    Not(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// Condition/body chain; the final arm of a lowered match is
    /// unconditional (`Raw(1)`).
    IfElse(Vec<(Operand, Vec<Stmt>)>),
    Return(Operand),
    Print(Operand),
    /// `var = malloc(3 + n)` - fields zeroed.
    AllocCell(String, u8),
    Assign(String, Operand),
    SetField(String, i64, Operand),
    GetField(String, i64, Operand),
    BinOp(String, BinOp, Operand, Operand),
    /// `dst = <heap? is-pointer && tag matches : value equals>`.
    TagCheck(String, bool, Operand, i64),
    CallAssign(String, String, Vec<Operand>),
    /// `dst = drop_reuse(src)` - unique cell is kept for rebuilding,
    /// shared cell is released and dst becomes null.
    DropReuse(String, String),
    Inc(String),
    Dec(String),
}

pub fn translate(prog: &Anf) -> Vec<Def> {
    let mut translator = Translator { counter: 0 };
    prog.iter()
        .map(|func| Def {
            id: func.id.clone(),
            args: func.args.iter().map(|(name, _)| name.clone()).collect(),
            body: translator.body(&func.body, Vec::new(), &func.id),
        })
        .collect()
}

struct Translator {
    counter: usize,
}

impl Translator {
    fn fresh_cond(&mut self) -> String {
        self.counter += 1;
        format!("cond{}", self.counter)
    }

    fn body(&mut self, body: &Body, mut stmts: Vec<Stmt>, fid: &str) -> Vec<Stmt> {
        match body {
            Body::Ret(var) => {
                if fid == "main" {
                    stmts.push(Stmt::Print(Operand::Var(var.0.clone())));
                    stmts.push(Stmt::Return(Operand::Raw(0)));
                } else {
                    stmts.push(Stmt::Return(Operand::Var(var.0.clone())));
                }
                stmts
            }

            Body::Let(var, exp, next) => {
                self.exp(var, exp, &mut stmts);
                self.body(next, stmts, fid)
            }

            Body::Match(var, branches) => {
                let mut conds = Vec::with_capacity(branches.len());
                for (i, (cond, _)) in branches.iter().enumerate() {
                    // The final branch is unconditional: the type checker has
                    // proven the match exhaustive.
                    if i == branches.len() - 1 {
                        conds.push(Operand::Raw(1));
                        continue;
                    }
                    match cond {
                        Cond::Ctor { tag, arity } => {
                            let dst = self.fresh_cond();
                            stmts.push(Stmt::TagCheck(
                                dst.clone(),
                                *arity > 0,
                                Operand::Var(var.0.clone()),
                                *tag as i64,
                            ));
                            conds.push(Operand::Var(dst));
                        }
                        Cond::Int(value) => {
                            let dst = self.fresh_cond();
                            stmts.push(Stmt::TagCheck(
                                dst.clone(),
                                false,
                                Operand::Var(var.0.clone()),
                                *value,
                            ));
                            conds.push(Operand::Var(dst));
                        }
                        Cond::Default => conds.push(Operand::Raw(1)),
                    }
                }

                let chain = branches
                    .iter()
                    .zip(conds)
                    .map(|((_, branch), cond)| (cond, self.body(branch, Vec::new(), fid)))
                    .collect();
                stmts.push(Stmt::IfElse(chain));
                stmts
            }

            Body::Inc(var, next) => {
                stmts.push(Stmt::Inc(var.0.clone()));
                self.body(next, stmts, fid)
            }

            Body::Dec(var, next) => {
                stmts.push(Stmt::Dec(var.0.clone()));
                self.body(next, stmts, fid)
            }
        }
    }

    fn exp(&mut self, var: &Var, exp: &Exp, stmts: &mut Vec<Stmt>) {
        let dst = var.0.clone();
        match exp {
            Exp::Int(i) => stmts.push(Stmt::Assign(dst, Operand::Int(*i))),

            Exp::App(fid, args) => stmts.push(Stmt::CallAssign(
                dst,
                fid.clone(),
                args.iter().map(|a| Operand::Var(a.0.clone())).collect(),
            )),

            Exp::Ctor(tag, args) => self.build_cell(&dst, *tag, args, stmts),

            Exp::Tuple(args) => {
                if args.is_empty() {
                    // Unit is the immediate 0.
                    stmts.push(Stmt::Assign(dst, Operand::Int(0)));
                } else {
                    self.build_cell(&dst, 0, args, stmts);
                }
            }

            Exp::Op(op, lhs, rhs) => stmts.push(Stmt::BinOp(
                dst,
                *op,
                Operand::Var(lhs.0.clone()),
                Operand::Var(rhs.0.clone()),
            )),

            Exp::Proj(field, src) => stmts.push(Stmt::GetField(
                dst,
                *field as i64 + HEADER_FIELDS,
                Operand::Var(src.0.clone()),
            )),

            Exp::Reset(src) => stmts.push(Stmt::DropReuse(dst, src.0.clone())),

            Exp::Reuse(cell, tag, args) => {
                // A shared cell was released at the reset; allocate a fresh
                // one in that case, then build in place.
                stmts.push(Stmt::IfElse(vec![(
                    Operand::Not(cell.0.clone()),
                    vec![
                        Stmt::AllocCell(cell.0.clone(), args.len() as u8),
                        Stmt::SetField(cell.0.clone(), SIZE_FIELD, Operand::Raw(args.len() as i64)),
                        Stmt::SetField(cell.0.clone(), REFS_FIELD, Operand::Raw(1)),
                    ],
                )]));
                stmts.push(Stmt::SetField(
                    cell.0.clone(),
                    TAG_FIELD,
                    Operand::Int(*tag as i64),
                ));
                for (i, arg) in args.iter().enumerate() {
                    stmts.push(Stmt::SetField(
                        cell.0.clone(),
                        i as i64 + HEADER_FIELDS,
                        Operand::Var(arg.0.clone()),
                    ));
                }
                stmts.push(Stmt::Assign(dst, Operand::Var(cell.0.clone())));
            }
        }
    }

    fn build_cell(&mut self, dst: &str, tag: u8, args: &[Var], stmts: &mut Vec<Stmt>) {
        stmts.push(Stmt::AllocCell(dst.to_string(), args.len() as u8));
        stmts.push(Stmt::SetField(
            dst.to_string(),
            TAG_FIELD,
            Operand::Int(tag as i64),
        ));
        stmts.push(Stmt::SetField(
            dst.to_string(),
            SIZE_FIELD,
            Operand::Raw(args.len() as i64),
        ));
        stmts.push(Stmt::SetField(dst.to_string(), REFS_FIELD, Operand::Raw(1)));
        for (i, arg) in args.iter().enumerate() {
            stmts.push(Stmt::SetField(
                dst.to_string(),
                i as i64 + HEADER_FIELDS,
                Operand::Var(arg.0.clone()),
            ));
        }
    }
}

impl Display for Operand {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Operand::Var(name) => write!(f, "{}", name),
            Operand::Int(i) => write!(f, "{}", i),
            Operand::Raw(i) => write!(f, "raw {}", i),
            Operand::Not(name) => write!(f, "!{}", name),
        }
    }
}
