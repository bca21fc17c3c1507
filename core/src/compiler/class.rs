//! Whole-class compilation in two phases.
//!
//! Phase 1 collects every field and method signature. Phase 2 compiles
//! method bodies against those read-only signatures, one independent
//! [`BytecodeCompiler`] per method, optionally in parallel.

use hashbrown::HashMap;
use rayon::prelude::*;
use tracing::debug;

use crate::ast::{Class, FieldDecl, MethodDecl};
use crate::compiler::{BytecodeCompiler, ClassError, CompileError};
use crate::vm::CompiledMethod;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerOptions {
    /// Compile method bodies on the rayon thread pool.
    pub parallel: bool,
    /// Upper bound on simultaneously live locals per method, parameters
    /// included.
    pub max_locals: u16,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            parallel: true,
            max_locals: 256,
        }
    }
}

/// What a call site needs to know about its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodSignature {
    /// Position in the class, used as the `Call` operand.
    pub index: u16,
    pub arity: usize,
}

/// Signatures of one class, built before any body is compiled.
#[derive(Debug, Clone, Default)]
pub struct ClassSignatures {
    methods: HashMap<String, MethodSignature>,
    fields: Vec<FieldDecl>,
}

impl ClassSignatures {
    pub fn collect(class: &Class) -> Result<Self, ClassError> {
        let mut signatures = ClassSignatures::default();

        for field in &class.fields {
            if signatures.fields.iter().any(|f| f.name == field.name) {
                return Err(ClassError::DuplicateField {
                    class: class.name.clone(),
                    name: field.name.clone(),
                });
            }
            signatures.fields.push(field.clone());
        }

        for (position, method) in class.methods.iter().enumerate() {
            let index = u16::try_from(position).map_err(|_| ClassError::TooManyMethods {
                class: class.name.clone(),
            })?;
            if signatures.methods.contains_key(&method.name) {
                return Err(ClassError::DuplicateMethod {
                    class: class.name.clone(),
                    name: method.name.clone(),
                });
            }
            signatures.methods.insert(
                method.name.clone(),
                MethodSignature {
                    index,
                    arity: method.params.len(),
                },
            );
        }

        Ok(signatures)
    }

    pub fn method(&self, name: &str) -> Option<MethodSignature> {
        self.methods.get(name).copied()
    }

    pub fn fields(&self) -> &[FieldDecl] {
        &self.fields
    }
}

/// Result of compiling a class. Methods keep declaration order, so
/// `methods[i]` is the target of `Call(i)`.
#[derive(Debug, Clone)]
pub struct CompiledClass {
    pub name: String,
    pub methods: Vec<Result<CompiledMethod, CompileError>>,
}

impl CompiledClass {
    /// The compiled method called `name`, if it compiled.
    pub fn method(&self, name: &str) -> Option<&CompiledMethod> {
        self.methods
            .iter()
            .filter_map(|method| method.as_ref().ok())
            .find(|method| method.name == name)
    }

    pub fn errors(&self) -> impl Iterator<Item = &CompileError> {
        self.methods.iter().filter_map(|method| method.as_ref().err())
    }

    /// All methods, or every per-method error if any failed.
    pub fn into_result(self) -> Result<Vec<CompiledMethod>, Vec<CompileError>> {
        let (ok, errors): (Vec<_>, Vec<_>) = self.methods.into_iter().partition(Result::is_ok);
        if errors.is_empty() {
            Ok(ok.into_iter().filter_map(Result::ok).collect())
        } else {
            Err(errors.into_iter().filter_map(Result::err).collect())
        }
    }
}

/// Compile every method of `class`. A failing method does not stop its
/// siblings; its error takes its place in [`CompiledClass::methods`].
pub fn compile_class(class: &Class, options: &CompilerOptions) -> Result<CompiledClass, ClassError> {
    let signatures = ClassSignatures::collect(class)?;
    let compile = |method: &MethodDecl| BytecodeCompiler::compile(method, &signatures, options);

    let methods: Vec<_> = if options.parallel {
        class.methods.par_iter().map(compile).collect()
    } else {
        class.methods.iter().map(compile).collect()
    };

    debug!(
        class = %class.name,
        methods = methods.len(),
        failed = methods.iter().filter(|m| m.is_err()).count(),
        "Compiled class"
    );

    Ok(CompiledClass {
        name: class.name.clone(),
        methods,
    })
}
