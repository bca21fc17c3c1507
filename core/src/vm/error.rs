//! Errors raised while executing bytecode.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutionError {
    /// Integer division or remainder by zero.
    #[error("division by zero in `{method}`")]
    DivisionByZero { method: String },

    #[error("unknown method `{name}`")]
    UnknownMethod { name: String },

    /// The method exists but failed to compile.
    #[error("method `{name}` has no compiled code")]
    NotCompiled { name: String },

    #[error("`{method}` takes {expected} argument(s) but {found} were supplied")]
    ArityMismatch {
        method: String,
        expected: usize,
        found: usize,
    },

    /// Resource limit: nested calls.
    #[error("call depth exceeds maximum of {limit}")]
    CallDepthExceeded { limit: usize },

    /// Resource limit: executed instructions.
    #[error("step limit of {limit} instructions exceeded")]
    StepLimitExceeded { limit: u64 },

    // Malformed bytecode. The compiler never produces these.
    #[error("operand stack underflow in `{method}`")]
    StackUnderflow { method: String },

    #[error("operand stack overflow in `{method}`")]
    StackOverflow { method: String },

    #[error("invalid constant #{index} in `{method}`")]
    InvalidConstant { method: String, index: u16 },

    #[error("invalid local slot {slot} in `{method}`")]
    InvalidLocal { method: String, slot: u16 },

    #[error("jump to invalid instruction {target} in `{method}`")]
    InvalidJump { method: String, target: isize },
}
