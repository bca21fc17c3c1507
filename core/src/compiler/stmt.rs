//! Statement lowering and control flow.
//!
//! Statements start and end with an empty operand stack.

use crate::ast::{Expr, Stmt};
use crate::compiler::{BytecodeCompiler, CompileErrorKind};
use crate::vm::Instruction;

impl BytecodeCompiler<'_> {
    pub(super) fn compile_stmt(&mut self, stmt: &Stmt) -> Result<(), CompileErrorKind> {
        match stmt {
            Stmt::Block(stmts) => {
                self.symbols.push_scope();
                for stmt in stmts {
                    self.compile_stmt(stmt)?;
                }
                self.symbols.pop_scope();
                Ok(())
            }

            // Slots are reused across sibling blocks, so a declaration
            // without initializer still stores 0.
            Stmt::LocalVarDecl { name, init } => {
                let slot = self.symbols.declare_local(name)?;
                match init {
                    Some(init) => self.compile_expr(init)?,
                    None => self.emit_const(0)?,
                }
                self.emit(Instruction::StoreLocal(slot));
                Ok(())
            }

            Stmt::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let else_label = self.new_label();
                self.compile_condition(cond, else_label, false)?;
                self.compile_scoped(then_branch)?;

                match else_branch {
                    Some(else_branch) => {
                        let end = self.new_label();
                        // A then-branch that returns needs no jump over the else.
                        if self.reachable {
                            self.emit_branch(Instruction::Jump, end);
                        }
                        self.bind_label(else_label);
                        self.compile_scoped(else_branch)?;
                        self.bind_label(end);
                    }
                    None => self.bind_label(else_label),
                }
                Ok(())
            }

            Stmt::While { cond, body } => {
                let head = self.new_label();
                let end = self.new_label();

                self.bind_label(head);
                self.compile_condition(cond, end, false)?;
                self.compile_scoped(body)?;
                if self.reachable {
                    self.emit_branch(Instruction::Jump, head);
                }
                self.bind_label(end);
                Ok(())
            }

            Stmt::Return(expr) => {
                self.compile_expr(expr)?;
                self.emit(Instruction::Return);
                Ok(())
            }

            // A top-level assignment stores without keeping a copy.
            Stmt::Expr(Expr::Assign { target, value }) => {
                let slot = self.assignment_slot(target)?;
                self.compile_expr(value)?;
                self.emit(Instruction::StoreLocal(slot));
                Ok(())
            }

            Stmt::Expr(expr) => {
                self.compile_expr(expr)?;
                self.emit(Instruction::Pop);
                Ok(())
            }
        }
    }

    /// Bodies of `if` and `while` get their own scope, braces or not.
    fn compile_scoped(&mut self, stmt: &Stmt) -> Result<(), CompileErrorKind> {
        self.symbols.push_scope();
        self.compile_stmt(stmt)?;
        self.symbols.pop_scope();
        Ok(())
    }
}
