//! Duck - a compiler for an int-only subset of Java classes
//!
//! # Overview
//!
//! Duck turns class declarations with `int` fields and `int` methods into
//! bytecode for a small stack VM. Each method compiles to a self-contained
//! [`CompiledMethod`] with its own constant pool, exact `max_stack` and
//! `max_locals`, and resolved relative branches.
//!
//! # Quick Start
//!
//! ```ignore
//! use duck::{VM, compile_source};
//!
//! let classes = compile_source("class A { int twice(int a) { return a * 2; } }").unwrap();
//! let vm = VM::new(&classes[0]);
//! assert_eq!(vm.invoke("twice", &[21]), Ok(42));
//! ```

mod error_renderer;

use thiserror::Error;

pub use duck_core::{
    ast, compiler, constant_pool, parser, symbol_table, vm,
    compiler::{ClassError, CompileError, CompileErrorKind, CompiledClass, CompilerOptions},
    parser::ParseError,
    vm::{CompiledMethod, ExecutionError, Instruction, VM, VmOptions},
};
pub use error_renderer::{render_error, render_error_to, render_error_to_string_no_color};

/// Anything that can go wrong turning source text into bytecode.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Class(#[from] ClassError),
    /// Every method that failed, across all classes.
    #[error("{} method(s) failed to compile", .0.len())]
    Compile(Vec<CompileError>),
}

/// Parse `source` and compile every class in it.
pub fn compile_source(source: &str) -> Result<Vec<CompiledClass>, Error> {
    compile_source_with(source, &CompilerOptions::default())
}

pub fn compile_source_with(
    source: &str,
    options: &CompilerOptions,
) -> Result<Vec<CompiledClass>, Error> {
    let classes = duck_core::parse(source)?;
    let compiled = classes
        .iter()
        .map(|class| duck_core::compile_class(class, options))
        .collect::<Result<Vec<_>, _>>()?;

    let errors: Vec<CompileError> = compiled
        .iter()
        .flat_map(|class| class.errors().cloned())
        .collect();
    if !errors.is_empty() {
        return Err(Error::Compile(errors));
    }
    Ok(compiled)
}
