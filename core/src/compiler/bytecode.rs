//! Per-method bytecode compiler state.

use tracing::debug;

use crate::ast::MethodDecl;
use crate::compiler::jumps::{JumpTable, Label};
use crate::compiler::{ClassSignatures, CompileError, CompileErrorKind, CompilerOptions};
use crate::constant_pool::{ConstantPoolBuilder, Width};
use crate::symbol_table::SymbolTable;
use crate::vm::{CompiledMethod, Instruction};

/// Compiles one method body into a [`CompiledMethod`].
///
/// Every instance owns its symbol table, constant pool and instruction
/// buffer; the only shared input is the read-only class signatures, so
/// methods can be compiled on separate threads.
pub struct BytecodeCompiler<'a> {
    pub(super) signatures: &'a ClassSignatures,
    pub(super) symbols: SymbolTable,
    pub(super) constants: ConstantPoolBuilder,
    instructions: Vec<Instruction>,
    jumps: JumpTable,

    /// Current stack depth during compilation
    current_stack_depth: usize,

    /// Maximum stack depth observed
    max_stack_size: usize,

    /// Whether execution can reach the next emitted instruction.
    pub(super) reachable: bool,
}

impl<'a> BytecodeCompiler<'a> {
    pub fn new(signatures: &'a ClassSignatures, options: &CompilerOptions) -> Self {
        Self {
            signatures,
            symbols: SymbolTable::new(options.max_locals),
            constants: ConstantPoolBuilder::new(),
            instructions: Vec::new(),
            jumps: JumpTable::default(),
            current_stack_depth: 0,
            max_stack_size: 0,
            reachable: true,
        }
    }

    /// Convenience method to compile a method in one call.
    pub fn compile(
        method: &MethodDecl,
        signatures: &'a ClassSignatures,
        options: &CompilerOptions,
    ) -> Result<CompiledMethod, CompileError> {
        let compiler = Self::new(signatures, options);
        compiler
            .compile_method(method)
            .map_err(|kind| CompileError::new(&method.name, kind))
    }

    fn compile_method(mut self, method: &MethodDecl) -> Result<CompiledMethod, CompileErrorKind> {
        for field in self.signatures.fields() {
            self.symbols.declare_field(&field.name, field.value)?;
        }
        // No receiver slot: parameters take slots 0..k-1.
        for param in &method.params {
            self.symbols.declare_local(param)?;
        }

        for stmt in &method.body {
            self.compile_stmt(stmt)?;
        }
        if self.reachable {
            return Err(CompileErrorKind::MissingReturn);
        }

        self.finalize(method)
    }

    /// Resolve branches and package the result.
    fn finalize(mut self, method: &MethodDecl) -> Result<CompiledMethod, CompileErrorKind> {
        self.jumps.resolve(&mut self.instructions)?;

        let max_locals = self.symbols.max_locals();
        let param_count = u16::try_from(method.params.len())
            .map_err(|_| CompileErrorKind::TooManyLocals { limit: max_locals })?;
        let max_stack =
            u16::try_from(self.max_stack_size).map_err(|_| CompileErrorKind::StackTooDeep)?;

        debug!(
            method = %method.name,
            code_len = self.instructions.len(),
            max_stack,
            max_locals,
            constants = self.constants.len(),
            "Compiled method"
        );

        Ok(CompiledMethod {
            name: method.name.clone(),
            param_count,
            max_stack,
            max_locals,
            constants: self.constants.finish(),
            instructions: self.instructions,
        })
    }

    // === Stack Management ===

    /// Push a value onto the stack (increases depth by 1).
    fn push_stack(&mut self) {
        self.current_stack_depth += 1;
        if self.current_stack_depth > self.max_stack_size {
            self.max_stack_size = self.current_stack_depth;
        }
    }

    /// Pop N values from the stack.
    fn pop_stack_n(&mut self, n: usize) {
        debug_assert!(
            self.reachable || self.current_stack_depth >= n,
            "Stack underflow: trying to pop {} but depth is {}",
            n,
            self.current_stack_depth
        );
        self.current_stack_depth = self.current_stack_depth.saturating_sub(n);
    }

    pub(super) fn stack_depth(&self) -> usize {
        self.current_stack_depth
    }

    /// Only one of two merging paths runs, so they share stack space.
    pub(super) fn set_stack_depth(&mut self, depth: usize) {
        self.current_stack_depth = depth;
    }

    // === Instruction Emission ===

    /// Emit an instruction and apply its stack effect.
    pub(super) fn emit(&mut self, instruction: Instruction) -> usize {
        if let Some((pops, pushes)) = instruction.stack_effect() {
            self.pop_stack_n(pops as usize);
            for _ in 0..pushes {
                self.push_stack();
            }
        }
        if instruction.is_terminator() {
            self.reachable = false;
        }
        let index = self.instructions.len();
        self.instructions.push(instruction);
        index
    }

    /// Emit a call to the method at `index`, which takes `arity` arguments.
    pub(super) fn emit_call(&mut self, index: u16, arity: usize) {
        self.pop_stack_n(arity);
        self.push_stack();
        self.instructions.push(Instruction::Call(index));
    }

    /// Push `value` through the constant pool, with the load matching its width.
    pub(super) fn emit_const(&mut self, value: i32) -> Result<(), CompileErrorKind> {
        let index = self.constants.intern(value)?;
        let width = self
            .constants
            .width_of(index)
            .unwrap_or_else(|| Width::of(value));
        self.emit(Instruction::load_const(width, index));
        Ok(())
    }

    // === Jump Patching Infrastructure ===

    pub(super) fn new_label(&mut self) -> Label {
        self.jumps.new_label()
    }

    /// Bind `label` to the next instruction. Code after an unconditional
    /// jump becomes reachable again if some reachable branch lands here.
    pub(super) fn bind_label(&mut self, label: Label) {
        self.jumps.bind(label, self.instructions.len());
        self.reachable = self.reachable || self.jumps.is_targeted(label);
    }

    /// Emit `make_branch` with a placeholder offset, patched later.
    pub(super) fn emit_branch<F>(&mut self, make_branch: F, target: Label)
    where
        F: FnOnce(i16) -> Instruction,
    {
        let live = self.reachable;
        let index = self.emit(make_branch(0));
        self.jumps.add_patch(index, target, live);
    }
}
