/// Static types for flip values.
///
/// The language is monomorphic: a type is `Int`, a declared enum, or a tuple
/// of those. `ValueType` distinguishes single values from tuples because a
/// function may return several values at once; `TypeList` is the parenthesized
/// rendering used verbatim inside diagnostics ("Expected (Int), but got ...").
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    Int,
    Enum(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueType {
    Single(Type),
    Tuple(Vec<Type>),
}

impl ValueType {
    /// View as a flat list of component types (a single type is a 1-list).
    pub fn components(&self) -> Vec<Type> {
        match self {
            ValueType::Single(tp) => vec![tp.clone()],
            ValueType::Tuple(tps) => tps.clone(),
        }
    }

    pub fn single(&self) -> Option<&Type> {
        match self {
            ValueType::Single(tp) => Some(tp),
            ValueType::Tuple(_) => None,
        }
    }

    pub fn from_components(tps: Vec<Type>) -> ValueType {
        if tps.len() == 1 {
            ValueType::Single(tps.into_iter().next().unwrap())
        } else {
            ValueType::Tuple(tps)
        }
    }

    pub fn type_list(&self) -> TypeList {
        TypeList(self.components())
    }
}

/// Ordered list of types rendered as `(T1, T2, ...)` - empty renders as `()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeList(pub Vec<Type>);

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => write!(f, "Int"),
            Type::Enum(name) => write!(f, "{}", name),
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Single(tp) => write!(f, "{}", tp),
            ValueType::Tuple(tps) => write!(f, "{}", TypeList(tps.clone())),
        }
    }
}

impl fmt::Display for TypeList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, tp) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", tp)?;
        }
        write!(f, ")")
    }
}
