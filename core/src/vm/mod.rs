//! Bytecode model and the reference VM that executes it.

mod code;
pub mod codec;
mod error;
mod instruction_set;
mod runtime;
mod stack;

pub use code::CompiledMethod;
pub use codec::DecodeError;
pub use error::ExecutionError;
pub use instruction_set::{ComparisonOp, Instruction, opcode};
pub use runtime::{VM, VmOptions};

pub(crate) use stack::Stack;
