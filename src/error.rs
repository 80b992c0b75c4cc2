use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::types::TypeList;

/// Source span with 1-based start/end line and column, inclusive.
/// Displays as `L:C-L:C`, the convention the host uses for highlighting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Span {
    pub start_line: usize,
    pub start_col: usize,
    pub end_line: usize,
    pub end_col: usize,
}

impl Span {
    pub fn new(start_line: usize, start_col: usize, end_line: usize, end_col: usize) -> Self {
        Span {
            start_line,
            start_col,
            end_line,
            end_col,
        }
    }

    pub fn point(line: usize, col: usize) -> Self {
        Span::new(line, col, line, col)
    }

    /// Smallest span covering both.
    pub fn merge(self, other: Span) -> Span {
        let (start_line, start_col) =
            if (self.start_line, self.start_col) <= (other.start_line, other.start_col) {
                (self.start_line, self.start_col)
            } else {
                (other.start_line, other.start_col)
            };
        let (end_line, end_col) = if (self.end_line, self.end_col) >= (other.end_line, other.end_col)
        {
            (self.end_line, self.end_col)
        } else {
            (other.end_line, other.end_col)
        };
        Span {
            start_line,
            start_col,
            end_line,
            end_col,
        }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}-{}:{}",
            self.start_line, self.start_col, self.end_line, self.end_col
        )
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum CompileError {
    #[error("Syntax error: {0}")]
    Syntax(String),
    #[error("Unknown function '{0}'")]
    UnknownFunction(String),
    #[error("Unknown variable '{0}'")]
    UnknownVariable(String),
    #[error("Unknown constructor '{0}'")]
    UnknownConstructor(String),
    #[error("Use of undeclared enum '{0}'")]
    UnknownEnumInType(String),
    #[error("Multiple definitions for function '{0}'")]
    MultipleFunctionDefinitions(String),
    #[error("Multiple definitions for enum '{0}'")]
    MultipleEnumDefinitions(String),
    #[error("Inconsistent variable count in function '{fid}'. Signature suggests {signature}, and definition suggests {definition}")]
    InconsistentVariableCount {
        fid: String,
        signature: usize,
        definition: usize,
    },
    #[error("Wrong variable count in let statement. Expected {expected}, but got {actual}")]
    WrongVariableCountInLet { expected: usize, actual: usize },
    #[error("Wrong variable count for constructor '{fid}' in match case. Expected {expected}, but got {actual}")]
    WrongVariableCountInMatchCase {
        fid: String,
        expected: usize,
        actual: usize,
    },
    #[error("Wrong variable count for function call of '{fid}'. Expected {expected}, but got {actual}")]
    WrongVariableCountInCall {
        fid: String,
        expected: usize,
        actual: usize,
    },
    #[error(
        "Wrong argument type for function call of '{fid}'. Expected {expected}, but got {actual}"
    )]
    WrongArgumentType {
        fid: String,
        expected: TypeList,
        actual: TypeList,
    },
    #[error("Wrong return type for function '{fid}'. Expected {expected}, but got {actual}")]
    WrongReturnType {
        fid: String,
        expected: TypeList,
        actual: TypeList,
    },
    #[error("Mismatched return types of match statement")]
    MismatchedTypesInMatchCases,
    #[error("Invalid pattern in match statement. Matching on a {match_on}, and invalid pattern is {pattern}")]
    InvalidPatternInMatchCase { match_on: String, pattern: String },
    #[error("Constructor '{0}' is matched on in multiple cases in match statement")]
    DuplicateConstructorInMatch(String),
    #[error("Integer {0} is matched on in multiple cases in match statement")]
    DuplicateIntInMatch(i64),
    #[error("Match statement is non exhaustive")]
    NonExhaustiveMatch,
    #[error("Match statement has multiple wild cards")]
    MultipleWildcards,
    #[error("Match statement has pattern {0} after a wildcard")]
    CaseAfterWildcard(String),
    #[error("Match on a tuple must have a single tuple pattern")]
    BadTupleMatch,
    #[error("Unexpected tuple expression")]
    UnexpectedTuple,
    #[error("Fip function '{fid}' is missing a signature")]
    FipMissingSignature { fid: String },
    #[error("Fip function '{fid}' uses variable '{var}' more than once")]
    FipVariableReused { fid: String, var: String },
    #[error("Fip function '{fid}' never uses variable '{var}'")]
    FipVariableUnused { fid: String, var: String },
    #[error("Fip function '{fid}' discards a heap field of constructor '{ctor}'")]
    FipFieldDiscarded { fid: String, ctor: String },
}

/// Coarse classification of a diagnostic; the host keys highlighting off it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    Syntax,
    UnboundName,
    TypeMismatch,
    Arity,
    NonExhaustiveMatch,
    FipIneligible,
    DivisionByZero,
    InternalInvariant,
}

impl CompileError {
    pub fn kind(&self) -> DiagnosticKind {
        use CompileError::*;
        match self {
            Syntax(_) => DiagnosticKind::Syntax,
            UnknownFunction(_) | UnknownVariable(_) | UnknownConstructor(_)
            | UnknownEnumInType(_) | MultipleFunctionDefinitions(_) | MultipleEnumDefinitions(_) => {
                DiagnosticKind::UnboundName
            }
            InconsistentVariableCount { .. }
            | WrongVariableCountInLet { .. }
            | WrongVariableCountInMatchCase { .. }
            | WrongVariableCountInCall { .. } => DiagnosticKind::Arity,
            WrongArgumentType { .. }
            | WrongReturnType { .. }
            | MismatchedTypesInMatchCases
            | InvalidPatternInMatchCase { .. }
            | DuplicateConstructorInMatch(_)
            | DuplicateIntInMatch(_)
            | MultipleWildcards
            | CaseAfterWildcard(_)
            | BadTupleMatch
            | UnexpectedTuple => DiagnosticKind::TypeMismatch,
            NonExhaustiveMatch => DiagnosticKind::NonExhaustiveMatch,
            FipMissingSignature { .. }
            | FipVariableReused { .. }
            | FipVariableUnused { .. }
            | FipFieldDiscarded { .. } => DiagnosticKind::FipIneligible,
        }
    }

    pub fn at(self, span: Span) -> Diagnostic {
        Diagnostic {
            kind: self.kind(),
            message: self.to_string(),
            span: Some(span),
        }
    }

    pub fn no_span(self) -> Diagnostic {
        Diagnostic {
            kind: self.kind(),
            message: self.to_string(),
            span: None,
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum RuntimeError {
    #[error("Division by zero")]
    DivisionByZero,
    #[error("Modulo by zero")]
    ModuloByZero,
    #[error("Internal invariant violated: {0}")]
    InvariantViolation(String),
    #[error("Step limit exceeded")]
    StepLimit,
    #[error("No program loaded")]
    NoProgram,
}

impl RuntimeError {
    pub fn kind(&self) -> DiagnosticKind {
        match self {
            RuntimeError::DivisionByZero | RuntimeError::ModuloByZero => {
                DiagnosticKind::DivisionByZero
            }
            RuntimeError::InvariantViolation(_)
            | RuntimeError::StepLimit
            | RuntimeError::NoProgram => DiagnosticKind::InternalInvariant,
        }
    }
}

/// The single error shape crossing the crate boundary. Immutable once built.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    kind: DiagnosticKind,
    message: String,
    span: Option<Span>,
}

impl Diagnostic {
    pub fn kind(&self) -> DiagnosticKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn has_source_span(&self) -> bool {
        self.span.is_some()
    }

    pub fn source_span(&self) -> Option<Span> {
        self.span
    }
}

impl From<RuntimeError> for Diagnostic {
    fn from(err: RuntimeError) -> Self {
        Diagnostic {
            kind: err.kind(),
            message: err.to_string(),
            span: None,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(span) = self.span {
            write!(f, "\nOccurred at {}", span)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::Span;

    #[test]
    fn merge_covers_both_spans() {
        let a = Span::new(1, 5, 1, 9);
        let b = Span::new(2, 1, 3, 4);
        assert_eq!(a.merge(b), Span::new(1, 5, 3, 4));
        assert_eq!(b.merge(a), Span::new(1, 5, 3, 4));
    }

    #[test]
    fn display_uses_host_convention() {
        assert_eq!(Span::new(2, 3, 2, 8).to_string(), "2:3-2:8");
    }
}
