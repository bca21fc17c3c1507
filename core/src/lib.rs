//! Duck compiler core: parser, symbol table, constant pool, bytecode
//! compiler and the reference VM.

pub mod ast;
pub mod compiler;
pub mod constant_pool;
pub mod parser;
pub mod symbol_table;
pub mod vm;

pub use ast::{BinaryOp, Class, Expr, FieldDecl, MethodDecl, Stmt, UnaryOp};
pub use compiler::{
    ClassError, CompileError, CompileErrorKind, CompiledClass, CompilerOptions, compile_class,
};
pub use parser::{ParseError, parse};
pub use vm::{CompiledMethod, ExecutionError, Instruction, VM};
