/// Name resolution pass.
///
/// Runs between parsing and type checking. Builds the program-wide symbol
/// table (enums, constructors with their tags, function signatures), rejects
/// duplicate and unknown top-level names, and rewrites every local variable
/// to a program-unique name (`x@7`) so that the later IR passes can key
/// ownership and liveness on plain strings without shadowing hazards.
///
/// A bare lowercase identifier that is not a local binding but names a
/// zero-parameter function is rewritten into a call of that function.
use std::collections::HashMap;

use crate::ast::*;
use crate::error::{CompileError, Diagnostic, Span};
use crate::types::{Type, ValueType};

#[derive(Debug, Clone)]
pub struct CtorInfo {
    pub enum_name: String,
    /// Position among the siblings of its enum; doubles as the runtime tag.
    pub tag: usize,
    pub fields: Vec<Type>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct FnSig {
    pub params: Vec<Type>,
    pub results: ValueType,
    pub is_fip: bool,
}

#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    /// Enum name → constructor names in declaration order.
    pub enums: HashMap<String, Vec<String>>,
    pub enum_order: Vec<String>,
    pub ctors: HashMap<String, CtorInfo>,
    /// Declared signatures for functions and constructors. Functions without
    /// a signature are absent until the type checker infers them.
    pub fn_sigs: HashMap<String, FnSig>,
}

impl SymbolTable {
    pub fn is_ctor(&self, name: &str) -> bool {
        self.ctors.contains_key(name)
    }
}

/// Strip the uniquing suffix for user-facing messages.
pub fn display_name(unique: &str) -> &str {
    match unique.find('@') {
        Some(idx) => &unique[..idx],
        None => unique,
    }
}

pub struct Resolved {
    pub program: Program,
    pub symbols: SymbolTable,
}

pub fn resolve(program: Program) -> Result<Resolved, Diagnostic> {
    let mut symbols = SymbolTable::default();

    // Top-level tables and duplicate checks.
    for def in &program.enums {
        if symbols.enums.contains_key(&def.name) {
            return Err(CompileError::MultipleEnumDefinitions(def.name.clone()).at(def.span));
        }
        symbols.enums.insert(
            def.name.clone(),
            def.ctors.iter().map(|c| c.name.clone()).collect(),
        );
        symbols.enum_order.push(def.name.clone());
        for (tag, ctor) in def.ctors.iter().enumerate() {
            if symbols.ctors.contains_key(&ctor.name) {
                return Err(
                    CompileError::MultipleFunctionDefinitions(ctor.name.clone()).at(ctor.span)
                );
            }
            symbols.ctors.insert(
                ctor.name.clone(),
                CtorInfo {
                    enum_name: def.name.clone(),
                    tag,
                    fields: Vec::new(), // filled below, after all enums are known
                    span: ctor.span,
                },
            );
        }
    }

    // Constructor field types may mention any enum, so convert in a second
    // sweep once every enum name is registered.
    for def in &program.enums {
        for ctor in &def.ctors {
            let fields = convert_types(&ctor.fields, &symbols)?;
            symbols.ctors.get_mut(&ctor.name).unwrap().fields = fields;
        }
    }

    let mut declared = std::collections::HashSet::new();
    for def in &program.fns {
        if symbols.ctors.contains_key(&def.name) || !declared.insert(def.name.clone()) {
            return Err(CompileError::MultipleFunctionDefinitions(def.name.clone()).at(def.span));
        }
        if let Some(sig) = &def.signature {
            if sig.params.len() != def.params.len() {
                return Err(CompileError::InconsistentVariableCount {
                    fid: def.name.clone(),
                    signature: sig.params.len(),
                    definition: def.params.len(),
                }
                .at(def.span));
            }
            let params = convert_types(&sig.params, &symbols)?;
            let results = ValueType::from_components(convert_types(&sig.results, &symbols)?);
            symbols.fn_sigs.insert(
                def.name.clone(),
                FnSig {
                    params,
                    results,
                    is_fip: def.is_fip,
                },
            );
        }
    }

    // Constructors share the call namespace; register their signatures too.
    let ctor_sigs: Vec<(String, FnSig)> = symbols
        .ctors
        .iter()
        .map(|(name, info)| {
            (
                name.clone(),
                FnSig {
                    params: info.fields.clone(),
                    results: ValueType::Single(Type::Enum(info.enum_name.clone())),
                    is_fip: false,
                },
            )
        })
        .collect();
    for (name, sig) in ctor_sigs {
        symbols.fn_sigs.insert(name, sig);
    }

    // Rename locals and resolve bare zero-parameter function references.
    let mut renamer = Renamer {
        symbols: &symbols,
        counter: 0,
    };
    let mut fns = Vec::with_capacity(program.fns.len());
    for def in program.fns {
        fns.push(renamer.resolve_fn(def)?);
    }

    Ok(Resolved {
        program: Program {
            enums: program.enums,
            fns,
        },
        symbols,
    })
}

fn convert_types(types: &[TypeExpr], symbols: &SymbolTable) -> Result<Vec<Type>, Diagnostic> {
    types
        .iter()
        .map(|tp| match tp {
            TypeExpr::Int => Ok(Type::Int),
            TypeExpr::Named(name, span) => {
                if symbols.enums.contains_key(name) {
                    Ok(Type::Enum(name.clone()))
                } else {
                    Err(CompileError::UnknownEnumInType(name.clone()).at(*span))
                }
            }
        })
        .collect()
}

struct Renamer<'a> {
    symbols: &'a SymbolTable,
    counter: usize,
}

type Scope = HashMap<String, String>;

impl<'a> Renamer<'a> {
    fn fresh(&mut self, name: &str) -> String {
        self.counter += 1;
        format!("{}@{}", name, self.counter)
    }

    fn resolve_fn(&mut self, def: FnDef) -> Result<FnDef, Diagnostic> {
        let mut scope = Scope::new();
        let mut params = Vec::with_capacity(def.params.len());
        for param in &def.params {
            let unique = self.fresh(param);
            scope.insert(param.clone(), unique.clone());
            params.push(unique);
        }
        let body = self.resolve_expr(def.body, &scope)?;
        Ok(FnDef {
            params,
            body,
            ..def
        })
    }

    fn resolve_expr(&mut self, expr: Expr, scope: &Scope) -> Result<Expr, Diagnostic> {
        let span = expr.span;
        let kind = match expr.kind {
            ExprKind::Int(i) => ExprKind::Int(i),
            ExprKind::Var(name) => {
                if let Some(unique) = scope.get(&name) {
                    ExprKind::Var(unique.clone())
                } else if matches!(self.symbols.fn_sigs.get(&name), Some(sig) if sig.params.is_empty())
                {
                    ExprKind::Call(name, Vec::new())
                } else {
                    return Err(CompileError::UnknownVariable(name).at(span));
                }
            }
            ExprKind::Call(name, args) => {
                let args = args
                    .into_iter()
                    .map(|arg| self.resolve_expr(arg, scope))
                    .collect::<Result<Vec<_>, _>>()?;
                ExprKind::Call(name, args)
            }
            ExprKind::Tuple(elems) => {
                let elems = elems
                    .into_iter()
                    .map(|e| self.resolve_expr(e, scope))
                    .collect::<Result<Vec<_>, _>>()?;
                ExprKind::Tuple(elems)
            }
            ExprKind::BinOp(op, lhs, rhs) => ExprKind::BinOp(
                op,
                Box::new(self.resolve_expr(*lhs, scope)?),
                Box::new(self.resolve_expr(*rhs, scope)?),
            ),
            ExprKind::Let(binders, bound, body) => {
                let bound = self.resolve_expr(*bound, scope)?;
                let mut inner = scope.clone();
                let binders = self.rename_binders(binders, &mut inner);
                let body = self.resolve_expr(*body, &inner)?;
                ExprKind::Let(binders, Box::new(bound), Box::new(body))
            }
            ExprKind::Match(scrutinee, arms) => {
                let scrutinee = self.resolve_expr(*scrutinee, scope)?;
                let arms = arms
                    .into_iter()
                    .map(|arm| {
                        let mut inner = scope.clone();
                        let pattern = match arm.pattern {
                            Pattern::Int(i) => Pattern::Int(i),
                            Pattern::Binder(b) => {
                                Pattern::Binder(self.rename_binder(b, &mut inner))
                            }
                            Pattern::Ctor(name, binders) => {
                                Pattern::Ctor(name, self.rename_binders(binders, &mut inner))
                            }
                            Pattern::Tuple(binders) => {
                                Pattern::Tuple(self.rename_binders(binders, &mut inner))
                            }
                        };
                        let body = self.resolve_expr(arm.body, &inner)?;
                        Ok(MatchArm {
                            pattern,
                            pattern_span: arm.pattern_span,
                            body,
                        })
                    })
                    .collect::<Result<Vec<_>, Diagnostic>>()?;
                ExprKind::Match(Box::new(scrutinee), arms)
            }
        };
        Ok(Expr::new(kind, span))
    }

    fn rename_binder(&mut self, binder: Binder, scope: &mut Scope) -> Binder {
        match binder {
            Binder::Wildcard => Binder::Wildcard,
            Binder::Name(name) => {
                let unique = self.fresh(&name);
                scope.insert(name, unique.clone());
                Binder::Name(unique)
            }
        }
    }

    fn rename_binders(&mut self, binders: Vec<Binder>, scope: &mut Scope) -> Vec<Binder> {
        binders
            .into_iter()
            .map(|b| self.rename_binder(b, scope))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::display_name;

    #[test]
    fn display_name_strips_uniquing_suffix() {
        assert_eq!(display_name("acc@12"), "acc");
        assert_eq!(display_name("plain"), "plain");
    }
}
