//! Bytecode compiler for Duck classes.
//!
//! This module lowers the AST of a class into VM bytecode, one self-contained
//! [`CompiledMethod`](crate::vm::CompiledMethod) per method.
//!
//! ## Design
//!
//! - Two phases per class: signatures first, then independent method bodies
//! - One [`BytecodeCompiler`] per method owns its symbol table and constant pool
//! - Tracks stack depth precisely to set exact `max_stack`
//! - Branches are emitted against labels and patched in a final pass

mod bytecode;
mod class;
mod error;
mod expr;
mod jumps;
mod stmt;

#[cfg(test)]
mod bytecode_test;


pub use bytecode::BytecodeCompiler;
pub use class::{
    ClassSignatures, CompiledClass, CompilerOptions, MethodSignature, compile_class,
};
pub use error::{ClassError, CompileError, CompileErrorKind};
