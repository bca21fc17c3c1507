//! Expression lowering.
//!
//! Every expression leaves exactly one value on the stack. Children are
//! compiled strictly left to right in the shape the parser built; nothing
//! is re-associated or reordered.

use crate::ast::{BinaryOp, Expr, UnaryOp};
use crate::compiler::jumps::Label;
use crate::compiler::{BytecodeCompiler, CompileErrorKind};
use crate::symbol_table::{Symbol, SymbolError};
use crate::vm::{ComparisonOp, Instruction};

impl BytecodeCompiler<'_> {
    pub(super) fn compile_expr(&mut self, expr: &Expr) -> Result<(), CompileErrorKind> {
        match expr {
            Expr::Literal(value) => self.emit_const(*value),

            Expr::Var(name) => self.emit_load(self.symbols.resolve(name)?),

            Expr::FieldAccess(name) => self.emit_load(self.symbols.resolve_field(name)?),

            Expr::Unary { op, expr } => {
                self.compile_expr(expr)?;
                match op {
                    // Single opcode so that -MIN wraps to MIN.
                    UnaryOp::Neg => {
                        self.emit(Instruction::Neg);
                    }
                    UnaryOp::Not => {
                        self.emit(Instruction::Not);
                    }
                    UnaryOp::Plus => {}
                }
                Ok(())
            }

            Expr::Binary {
                op: BinaryOp::And | BinaryOp::Or,
                ..
            } => self.compile_logical_value(expr),

            Expr::Binary { op, left, right } => {
                self.compile_expr(left)?;
                self.compile_expr(right)?;
                let instruction = match op {
                    BinaryOp::Add => Instruction::Add,
                    BinaryOp::Sub => Instruction::Sub,
                    BinaryOp::Mul => Instruction::Mul,
                    BinaryOp::Div => Instruction::Div,
                    BinaryOp::Rem => Instruction::Rem,
                    comparison => match ComparisonOp::from_binary(*comparison) {
                        Some(cmp) => Instruction::IntCmp(cmp),
                        None => {
                            return Err(CompileErrorKind::UnsupportedConstruct(format!(
                                "operator `{}`",
                                comparison.symbol()
                            )));
                        }
                    },
                };
                self.emit(instruction);
                Ok(())
            }

            // The stored value stays on the stack as the expression's value.
            Expr::Assign { target, value } => {
                let slot = self.assignment_slot(target)?;
                self.compile_expr(value)?;
                self.emit(Instruction::Dup);
                self.emit(Instruction::StoreLocal(slot));
                Ok(())
            }

            Expr::Call { method, args } => self.compile_call(method, args),

            Expr::Unsupported(what) => Err(CompileErrorKind::UnsupportedConstruct(what.clone())),
        }
    }

    fn emit_load(&mut self, symbol: Symbol) -> Result<(), CompileErrorKind> {
        match symbol {
            Symbol::Local { slot } => {
                self.emit(Instruction::LoadLocal(slot));
                Ok(())
            }
            Symbol::Field { value } => self.emit_const(value),
        }
    }

    /// Slot written by `target = ...`. Fields are constants and can't be
    /// assigned.
    pub(super) fn assignment_slot(&self, target: &str) -> Result<u16, CompileErrorKind> {
        match self.symbols.resolve(target)? {
            Symbol::Local { slot } => Ok(slot),
            Symbol::Field { .. } => Err(CompileErrorKind::UnsupportedConstruct(format!(
                "assignment to field `{}`",
                target
            ))),
        }
    }

    fn compile_call(&mut self, method: &str, args: &[Expr]) -> Result<(), CompileErrorKind> {
        let signature =
            self.signatures
                .method(method)
                .ok_or_else(|| SymbolError::UnresolvedSymbol {
                    name: method.to_string(),
                })?;
        if args.len() != signature.arity {
            return Err(CompileErrorKind::ArityMismatch {
                method: method.to_string(),
                expected: signature.arity,
                found: args.len(),
            });
        }

        for arg in args {
            self.compile_expr(arg)?;
        }
        self.emit_call(signature.index, signature.arity);
        Ok(())
    }

    /// `a && b` / `a || b` as a value: `1` or `0`, with short-circuit.
    fn compile_logical_value(&mut self, expr: &Expr) -> Result<(), CompileErrorKind> {
        let on_false = self.new_label();
        let end = self.new_label();
        let depth_before = self.stack_depth();

        self.compile_condition(expr, on_false, false)?;
        self.emit_const(1)?;
        self.emit_branch(Instruction::Jump, end);

        self.bind_label(on_false);
        self.set_stack_depth(depth_before);
        self.emit_const(0)?;

        self.bind_label(end);
        self.set_stack_depth(depth_before + 1);
        Ok(())
    }

    /// Compile `expr` as a branch condition: jump to `target` when its
    /// truth (non-zero) equals `jump_on_true`, fall through otherwise.
    /// Leaves nothing on the stack.
    pub(super) fn compile_condition(
        &mut self,
        expr: &Expr,
        target: Label,
        jump_on_true: bool,
    ) -> Result<(), CompileErrorKind> {
        match expr {
            Expr::Binary {
                op: BinaryOp::And,
                left,
                right,
            } => {
                if jump_on_true {
                    let skip = self.new_label();
                    self.compile_condition(left, skip, false)?;
                    self.compile_condition(right, target, true)?;
                    self.bind_label(skip);
                } else {
                    self.compile_condition(left, target, false)?;
                    self.compile_condition(right, target, false)?;
                }
                Ok(())
            }
            Expr::Binary {
                op: BinaryOp::Or,
                left,
                right,
            } => {
                if jump_on_true {
                    self.compile_condition(left, target, true)?;
                    self.compile_condition(right, target, true)?;
                } else {
                    let skip = self.new_label();
                    self.compile_condition(left, skip, true)?;
                    self.compile_condition(right, target, false)?;
                    self.bind_label(skip);
                }
                Ok(())
            }
            Expr::Unary {
                op: UnaryOp::Not,
                expr,
            } => self.compile_condition(expr, target, !jump_on_true),
            _ => {
                self.compile_expr(expr)?;
                if jump_on_true {
                    self.emit_branch(Instruction::JumpIfTrue, target);
                } else {
                    self.emit_branch(Instruction::JumpIfFalse, target);
                }
                Ok(())
            }
        }
    }
}
