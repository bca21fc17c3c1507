//! Bytecode compilation errors.

use thiserror::Error;

use crate::constant_pool::TooManyConstants;
use crate::symbol_table::SymbolError;

/// Why a single method failed to compile.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileErrorKind {
    #[error(transparent)]
    Symbol(SymbolError),
    /// A node kind outside the modeled subset.
    #[error("unsupported construct: {0}")]
    UnsupportedConstruct(String),
    #[error("`{method}` takes {expected} argument(s) but {found} were supplied")]
    ArityMismatch {
        method: String,
        expected: usize,
        found: usize,
    },
    #[error("missing return statement")]
    MissingReturn,
    #[error("too many local variables (limit: {limit})")]
    TooManyLocals { limit: u16 },
    #[error("too many constants (limit: {})", u16::MAX)]
    TooManyConstants,
    /// Branch distance does not fit the 16-bit offset operand.
    #[error("branch offset {offset} is out of range")]
    JumpTooFar { offset: isize },
    #[error("operand stack deeper than {} values", u16::MAX)]
    StackTooDeep,
}

impl From<SymbolError> for CompileErrorKind {
    fn from(err: SymbolError) -> Self {
        match err {
            SymbolError::TooManyLocals { limit } => CompileErrorKind::TooManyLocals { limit },
            other => CompileErrorKind::Symbol(other),
        }
    }
}

impl From<TooManyConstants> for CompileErrorKind {
    fn from(_: TooManyConstants) -> Self {
        CompileErrorKind::TooManyConstants
    }
}

/// The first failure met while compiling one method. No partial output is
/// kept for that method.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("in method `{method}`: {kind}")]
pub struct CompileError {
    pub method: String,
    pub kind: CompileErrorKind,
}

impl CompileError {
    pub fn new(method: &str, kind: CompileErrorKind) -> Self {
        Self {
            method: method.to_string(),
            kind,
        }
    }
}

/// Class-level problems found while collecting signatures, before any
/// method body is compiled.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassError {
    #[error("field `{name}` is already defined in class `{class}`")]
    DuplicateField { class: String, name: String },
    #[error("method `{name}` is already defined in class `{class}`")]
    DuplicateMethod { class: String, name: String },
    #[error("class `{class}` has more than {} methods", u16::MAX as usize + 1)]
    TooManyMethods { class: String },
}
