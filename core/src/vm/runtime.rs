//! Reference executor for compiled classes.
//!
//! Runs [`CompiledMethod`] bodies one instruction at a time. Calls push a
//! new frame instead of recursing on the host stack, so guest recursion is
//! bounded only by [`VmOptions::max_call_depth`].

use tracing::{debug, trace};

use super::instruction_set::Instruction;

use crate::compiler::CompiledClass;
use crate::vm::{CompiledMethod, ExecutionError, Stack};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmOptions {
    /// Maximum number of simultaneously active frames.
    pub max_call_depth: usize,
    /// Abort after this many executed instructions.
    pub max_steps: Option<u64>,
}

impl Default for VmOptions {
    fn default() -> Self {
        Self {
            max_call_depth: 1024,
            max_steps: None,
        }
    }
}

struct Frame<'c> {
    method: &'c CompiledMethod,
    ip: usize,
    locals: Vec<i32>,
    stack: Stack<i32>,
}

impl<'c> Frame<'c> {
    fn new(method: &'c CompiledMethod, args: &[i32]) -> Self {
        let mut locals = vec![0; (method.max_locals as usize).max(args.len())];
        locals[..args.len()].copy_from_slice(args);
        Frame {
            method,
            ip: 0,
            locals,
            stack: Stack::new(method.max_stack as usize),
        }
    }

    fn push(&mut self, value: i32) -> Result<(), ExecutionError> {
        if self.stack.is_full() {
            return Err(ExecutionError::StackOverflow {
                method: self.method.name.clone(),
            });
        }
        self.stack.push(value);
        Ok(())
    }

    fn pop(&mut self) -> Result<i32, ExecutionError> {
        self.stack.pop().ok_or_else(|| ExecutionError::StackUnderflow {
            method: self.method.name.clone(),
        })
    }

    fn local(&self, slot: u16) -> Result<i32, ExecutionError> {
        self.locals
            .get(slot as usize)
            .copied()
            .ok_or_else(|| ExecutionError::InvalidLocal {
                method: self.method.name.clone(),
                slot,
            })
    }

    fn store(&mut self, slot: u16, value: i32) -> Result<(), ExecutionError> {
        match self.locals.get_mut(slot as usize) {
            Some(local) => {
                *local = value;
                Ok(())
            }
            None => Err(ExecutionError::InvalidLocal {
                method: self.method.name.clone(),
                slot,
            }),
        }
    }

    fn constant(&self, index: u16) -> Result<i32, ExecutionError> {
        self.method
            .constants
            .get(index as usize)
            .map(|entry| entry.value)
            .ok_or_else(|| ExecutionError::InvalidConstant {
                method: self.method.name.clone(),
                index,
            })
    }

    /// Move to the target of the branch at the current instruction.
    fn jump(&mut self, offset: i16) -> Result<(), ExecutionError> {
        let target = self.ip as isize + offset as isize;
        if target < 0 || target as usize >= self.method.instructions.len() {
            return Err(ExecutionError::InvalidJump {
                method: self.method.name.clone(),
                target,
            });
        }
        self.ip = target as usize;
        Ok(())
    }

    fn binary(&mut self, op: impl FnOnce(i32, i32) -> i32) -> Result<(), ExecutionError> {
        let b = self.pop()?;
        let a = self.pop()?;
        self.push(op(a, b))
    }

    fn divide(&mut self, op: impl FnOnce(i32, i32) -> i32) -> Result<(), ExecutionError> {
        let b = self.pop()?;
        let a = self.pop()?;
        if b == 0 {
            return Err(ExecutionError::DivisionByZero {
                method: self.method.name.clone(),
            });
        }
        self.push(op(a, b))
    }
}

enum Flow {
    Continue,
    Call(u16),
    Return(i32),
}

pub struct VM<'c> {
    class: &'c CompiledClass,
    options: VmOptions,
}

impl<'c> VM<'c> {
    pub fn new(class: &'c CompiledClass) -> Self {
        Self::with_options(class, VmOptions::default())
    }

    pub fn with_options(class: &'c CompiledClass, options: VmOptions) -> Self {
        VM { class, options }
    }

    /// Run the method called `name` with `args` and return its result.
    pub fn invoke(&self, name: &str, args: &[i32]) -> Result<i32, ExecutionError> {
        let index = self
            .class
            .methods
            .iter()
            .position(|method| match method {
                Ok(method) => method.name == name,
                Err(err) => err.method == name,
            })
            .ok_or_else(|| ExecutionError::UnknownMethod {
                name: name.to_string(),
            })?;
        let method = self.method_at(index as u16)?;
        if args.len() != method.param_count as usize {
            return Err(ExecutionError::ArityMismatch {
                method: name.to_string(),
                expected: method.param_count as usize,
                found: args.len(),
            });
        }

        debug!(class = %self.class.name, method = name, ?args, "Invoking method");
        let result = self.run(Frame::new(method, args));
        debug!(method = name, ?result, "Invocation finished");
        result
    }

    fn method_at(&self, index: u16) -> Result<&'c CompiledMethod, ExecutionError> {
        match self.class.methods.get(index as usize) {
            Some(Ok(method)) => Ok(method),
            Some(Err(err)) => Err(ExecutionError::NotCompiled {
                name: err.method.clone(),
            }),
            None => Err(ExecutionError::UnknownMethod {
                name: format!("#{}", index),
            }),
        }
    }

    fn run(&self, entry: Frame<'c>) -> Result<i32, ExecutionError> {
        let mut frames = vec![entry];
        let mut steps: u64 = 0;

        loop {
            steps += 1;
            if let Some(limit) = self.options.max_steps
                && steps > limit
            {
                return Err(ExecutionError::StepLimitExceeded { limit });
            }

            let Some(frame) = frames.last_mut() else {
                unreachable!("the entry frame returns before the frame stack empties");
            };

            match Self::step(frame)? {
                Flow::Continue => {}
                Flow::Call(index) => {
                    let callee = self.method_at(index)?;
                    let mut args = vec![0; callee.param_count as usize];
                    for arg in args.iter_mut().rev() {
                        *arg = frame.pop()?;
                    }
                    if frames.len() >= self.options.max_call_depth {
                        return Err(ExecutionError::CallDepthExceeded {
                            limit: self.options.max_call_depth,
                        });
                    }
                    trace!(callee = %callee.name, ?args, depth = frames.len(), "Call");
                    frames.push(Frame::new(callee, &args));
                }
                Flow::Return(value) => {
                    frames.pop();
                    let depth = frames.len();
                    match frames.last_mut() {
                        Some(caller) => {
                            trace!(value, depth, "Return");
                            caller.push(value)?;
                        }
                        None => return Ok(value),
                    }
                }
            }
        }
    }

    /// Execute the instruction at `frame.ip`.
    fn step(frame: &mut Frame<'c>) -> Result<Flow, ExecutionError> {
        let Some(&instruction) = frame.method.instructions.get(frame.ip) else {
            return Err(ExecutionError::InvalidJump {
                method: frame.method.name.clone(),
                target: frame.ip as isize,
            });
        };

        use Instruction::*;
        match instruction {
            LoadConstByte(index) | LoadConstShort(index) | LoadConstInt(index) => {
                let value = frame.constant(index)?;
                frame.push(value)?;
            }
            LoadLocal(slot) => {
                let value = frame.local(slot)?;
                frame.push(value)?;
            }
            StoreLocal(slot) => {
                let value = frame.pop()?;
                frame.store(slot, value)?;
            }
            Dup => {
                let value = frame.pop()?;
                frame.push(value)?;
                frame.push(value)?;
            }
            Pop => {
                frame.pop()?;
            }
            Add => frame.binary(i32::wrapping_add)?,
            Sub => frame.binary(i32::wrapping_sub)?,
            Mul => frame.binary(i32::wrapping_mul)?,
            Div => frame.divide(i32::wrapping_div)?,
            Rem => frame.divide(i32::wrapping_rem)?,
            Neg => {
                let value = frame.pop()?;
                frame.push(value.wrapping_neg())?;
            }
            Not => {
                let value = frame.pop()?;
                frame.push((value == 0) as i32)?;
            }
            IntCmp(op) => frame.binary(|a, b| op.apply(a, b) as i32)?,
            Jump(offset) => return frame.jump(offset).map(|()| Flow::Continue),
            JumpIfFalse(offset) => {
                if frame.pop()? == 0 {
                    return frame.jump(offset).map(|()| Flow::Continue);
                }
            }
            JumpIfTrue(offset) => {
                if frame.pop()? != 0 {
                    return frame.jump(offset).map(|()| Flow::Continue);
                }
            }
            Call(index) => {
                frame.ip += 1;
                return Ok(Flow::Call(index));
            }
            Return => return frame.pop().map(Flow::Return),
        }

        frame.ip += 1;
        Ok(Flow::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{CompilerOptions, compile_class};
    use crate::constant_pool::{PoolEntry, Width};
    use crate::parser::parse;
    use crate::vm::ComparisonOp;
    use pretty_assertions::assert_eq;

    fn compile(source: &str) -> CompiledClass {
        let classes = parse(source).unwrap();
        compile_class(&classes[0], &CompilerOptions::default()).unwrap()
    }

    fn single(method: CompiledMethod) -> CompiledClass {
        CompiledClass {
            name: "T".to_string(),
            methods: vec![Ok(method)],
        }
    }

    #[test]
    fn test_hand_written_countdown() {
        // while (n > 0) n = n - 1; return n;
        let method = CompiledMethod {
            name: "countdown".to_string(),
            param_count: 1,
            max_stack: 2,
            max_locals: 1,
            constants: vec![
                PoolEntry {
                    value: 0,
                    width: Width::Byte,
                },
                PoolEntry {
                    value: 1,
                    width: Width::Byte,
                },
            ],
            instructions: vec![
                Instruction::LoadLocal(0),
                Instruction::LoadConstByte(0),
                Instruction::IntCmp(ComparisonOp::Gt),
                Instruction::JumpIfFalse(6),
                Instruction::LoadLocal(0),
                Instruction::LoadConstByte(1),
                Instruction::Sub,
                Instruction::StoreLocal(0),
                Instruction::Jump(-8),
                Instruction::LoadLocal(0),
                Instruction::Return,
            ],
        };
        let class = single(method);
        assert_eq!(VM::new(&class).invoke("countdown", &[5]), Ok(0));
    }

    #[test]
    fn test_recursive_calls() {
        let class = compile(
            "class F { int fib(int n) { if (n < 2) return n; return fib(n - 1) + fib(n - 2); } }",
        );
        let vm = VM::new(&class);
        assert_eq!(vm.invoke("fib", &[10]), Ok(55));
        assert_eq!(vm.invoke("fib", &[1]), Ok(1));
    }

    #[test]
    fn test_wrapping_arithmetic() {
        let class = compile(
            "class W { int inc(int a) { return a + 1; } int neg(int a) { return -a; } int div(int a, int b) { return a / b; } }",
        );
        let vm = VM::new(&class);
        assert_eq!(vm.invoke("inc", &[i32::MAX]), Ok(i32::MIN));
        assert_eq!(vm.invoke("neg", &[i32::MIN]), Ok(i32::MIN));
        assert_eq!(vm.invoke("div", &[i32::MIN, -1]), Ok(i32::MIN));
        assert_eq!(vm.invoke("div", &[-7, 2]), Ok(-3));
    }

    #[test]
    fn test_division_by_zero() {
        let class = compile("class D { int f(int a) { return a % 0; } }");
        assert_eq!(
            VM::new(&class).invoke("f", &[3]),
            Err(ExecutionError::DivisionByZero {
                method: "f".to_string()
            })
        );
    }

    #[test]
    fn test_unknown_method_and_arity() {
        let class = compile("class A { int f(int a) { return a; } }");
        let vm = VM::new(&class);
        assert_eq!(
            vm.invoke("g", &[]),
            Err(ExecutionError::UnknownMethod {
                name: "g".to_string()
            })
        );
        assert_eq!(
            vm.invoke("f", &[1, 2]),
            Err(ExecutionError::ArityMismatch {
                method: "f".to_string(),
                expected: 1,
                found: 2
            })
        );
    }

    #[test]
    fn test_failed_method_is_not_callable() {
        let class = compile("class A { int f() { return g(); } int g() { return x; } }");
        assert_eq!(
            VM::new(&class).invoke("f", &[]),
            Err(ExecutionError::NotCompiled {
                name: "g".to_string()
            })
        );
    }

    #[test]
    fn test_call_depth_limit() {
        let class = compile("class R { int f(int n) { return f(n + 1); } }");
        let vm = VM::with_options(
            &class,
            VmOptions {
                max_call_depth: 64,
                max_steps: None,
            },
        );
        assert_eq!(
            vm.invoke("f", &[0]),
            Err(ExecutionError::CallDepthExceeded { limit: 64 })
        );
    }

    #[test]
    fn test_step_limit() {
        let class = compile("class L { int f() { while (1) { } return 0; } }");
        let vm = VM::with_options(
            &class,
            VmOptions {
                max_call_depth: 16,
                max_steps: Some(1000),
            },
        );
        assert_eq!(
            vm.invoke("f", &[]),
            Err(ExecutionError::StepLimitExceeded { limit: 1000 })
        );
    }

    #[test]
    fn test_invalid_jump() {
        let method = CompiledMethod {
            name: "bad".to_string(),
            param_count: 0,
            max_stack: 0,
            max_locals: 0,
            constants: vec![],
            instructions: vec![Instruction::Jump(5)],
        };
        let class = single(method);
        assert_eq!(
            VM::new(&class).invoke("bad", &[]),
            Err(ExecutionError::InvalidJump {
                method: "bad".to_string(),
                target: 5
            })
        );
    }
}
