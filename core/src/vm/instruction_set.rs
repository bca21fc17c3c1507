//! Duck VM instructions.
//!
//! The VM is stack based: operations consume their operands from the
//! evaluation stack and push their result. Every value is a 32-bit int.
//!
//! # Encoding
//!
//! In memory an instruction is a plain enum value. On the wire it is one
//! opcode byte followed by big-endian operands (see [`super::codec`]).
//! Opcode values follow the JVM numbering for the equivalent operation.
//!
//! Slot and pool operands are one byte, or two bytes behind the `WIDE`
//! prefix when the value does not fit:
//! ```text
//! LOAD_LOCAL 7            15 07
//! LOAD_LOCAL 300          C4 15 01 2C
//! ```
//!
//! # Branches
//!
//! Branch offsets count instructions, not bytes, and are relative to the
//! branch itself: `Jump(0)` loops on itself and `Jump(1)` is a no-op.
//!
//! # Stack Discipline
//!
//! Stack effect notation: `[..., operand1, operand2] -> [..., result]`

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::ast::BinaryOp;
use crate::constant_pool::Width;

/// Opcode bytes.
pub mod opcode {
    pub const LOAD_CONST_BYTE: u8 = 0x10;
    pub const LOAD_CONST_SHORT: u8 = 0x11;
    pub const LOAD_CONST_INT: u8 = 0x12;
    pub const LOAD_LOCAL: u8 = 0x15;
    pub const STORE_LOCAL: u8 = 0x36;
    pub const POP: u8 = 0x57;
    pub const DUP: u8 = 0x59;
    pub const ADD: u8 = 0x60;
    pub const SUB: u8 = 0x64;
    pub const MUL: u8 = 0x68;
    pub const DIV: u8 = 0x6C;
    pub const REM: u8 = 0x70;
    pub const NEG: u8 = 0x74;
    pub const NOT: u8 = 0x82;
    pub const JUMP_IF_FALSE: u8 = 0x99;
    pub const JUMP_IF_TRUE: u8 = 0x9A;
    pub const INT_CMP: u8 = 0x9F;
    pub const JUMP: u8 = 0xA7;
    pub const RETURN: u8 = 0xAC;
    pub const CALL: u8 = 0xB8;
    /// Prefix: the next instruction's slot or pool operand is two bytes.
    pub const WIDE: u8 = 0xC4;
}

/// Integer comparison performed by [`Instruction::IntCmp`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComparisonOp {
    Eq,
    Ne,
    Lt,
    Ge,
    Gt,
    Le,
}

impl ComparisonOp {
    pub const fn code(self) -> u8 {
        match self {
            ComparisonOp::Eq => 0,
            ComparisonOp::Ne => 1,
            ComparisonOp::Lt => 2,
            ComparisonOp::Ge => 3,
            ComparisonOp::Gt => 4,
            ComparisonOp::Le => 5,
        }
    }

    pub const fn from_code(code: u8) -> Option<ComparisonOp> {
        match code {
            0 => Some(ComparisonOp::Eq),
            1 => Some(ComparisonOp::Ne),
            2 => Some(ComparisonOp::Lt),
            3 => Some(ComparisonOp::Ge),
            4 => Some(ComparisonOp::Gt),
            5 => Some(ComparisonOp::Le),
            _ => None,
        }
    }

    pub fn from_binary(op: BinaryOp) -> Option<ComparisonOp> {
        match op {
            BinaryOp::Eq => Some(ComparisonOp::Eq),
            BinaryOp::Ne => Some(ComparisonOp::Ne),
            BinaryOp::Lt => Some(ComparisonOp::Lt),
            BinaryOp::Ge => Some(ComparisonOp::Ge),
            BinaryOp::Gt => Some(ComparisonOp::Gt),
            BinaryOp::Le => Some(ComparisonOp::Le),
            _ => None,
        }
    }

    pub fn apply(self, a: i32, b: i32) -> bool {
        match self {
            ComparisonOp::Eq => a == b,
            ComparisonOp::Ne => a != b,
            ComparisonOp::Lt => a < b,
            ComparisonOp::Ge => a >= b,
            ComparisonOp::Gt => a > b,
            ComparisonOp::Le => a <= b,
        }
    }
}

/// A single VM instruction.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instruction {
    // ========================================================================
    // Constants & Locals
    // ========================================================================
    /// Push a byte-width pool entry.
    /// Operand: pool index | Stack: [...] -> [..., value]
    LoadConstByte(u16),

    /// Push a short-width pool entry.
    /// Operand: pool index | Stack: [...] -> [..., value]
    LoadConstShort(u16),

    /// Push an int-width pool entry.
    /// Operand: pool index | Stack: [...] -> [..., value]
    LoadConstInt(u16),

    /// Operand: slot | Stack: [...] -> [..., value]
    LoadLocal(u16),

    /// Operand: slot | Stack: [..., value] -> [...]
    StoreLocal(u16),

    /// Stack: [..., a] -> [..., a, a]
    Dup,

    /// Stack: [..., a] -> [...]
    Pop,

    // ========================================================================
    // Arithmetic (32-bit two's complement, wrapping)
    // ========================================================================
    /// Stack: [..., a, b] -> [..., a + b]
    Add,
    /// Stack: [..., a, b] -> [..., a - b]
    Sub,
    /// Stack: [..., a, b] -> [..., a * b]
    Mul,
    /// Truncates toward zero. Fails on a zero divisor.
    /// Stack: [..., a, b] -> [..., a / b]
    Div,
    /// Sign of the dividend. Fails on a zero divisor.
    /// Stack: [..., a, b] -> [..., a % b]
    Rem,
    /// `Neg` of `i32::MIN` is `i32::MIN`.
    /// Stack: [..., a] -> [..., -a]
    Neg,
    /// Stack: [..., a] -> [..., a == 0]
    Not,

    /// Stack: [..., a, b] -> [..., (a op b) as 1 / 0]
    IntCmp(ComparisonOp),

    // ========================================================================
    // Control Flow
    // ========================================================================
    /// Operand: offset | Stack: [...] -> [...]
    Jump(i16),

    /// Operand: offset | Stack: [..., cond] -> [...]
    /// Branches when `cond == 0`.
    JumpIfFalse(i16),

    /// Operand: offset | Stack: [..., cond] -> [...]
    /// Branches when `cond != 0`.
    JumpIfTrue(i16),

    /// Call a method of the same class.
    /// Operand: method index | Stack: [..., arg0, ..., argN] -> [..., result]
    Call(u16),

    /// Stack: [..., retval] -> (caller) [..., retval]
    Return,
}

impl Instruction {
    pub fn opcode(&self) -> u8 {
        use Instruction::*;
        match self {
            LoadConstByte(_) => opcode::LOAD_CONST_BYTE,
            LoadConstShort(_) => opcode::LOAD_CONST_SHORT,
            LoadConstInt(_) => opcode::LOAD_CONST_INT,
            LoadLocal(_) => opcode::LOAD_LOCAL,
            StoreLocal(_) => opcode::STORE_LOCAL,
            Dup => opcode::DUP,
            Pop => opcode::POP,
            Add => opcode::ADD,
            Sub => opcode::SUB,
            Mul => opcode::MUL,
            Div => opcode::DIV,
            Rem => opcode::REM,
            Neg => opcode::NEG,
            Not => opcode::NOT,
            IntCmp(_) => opcode::INT_CMP,
            Jump(_) => opcode::JUMP,
            JumpIfFalse(_) => opcode::JUMP_IF_FALSE,
            JumpIfTrue(_) => opcode::JUMP_IF_TRUE,
            Call(_) => opcode::CALL,
            Return => opcode::RETURN,
        }
    }

    /// The load instruction matching a pool entry's width.
    pub fn load_const(width: Width, index: u16) -> Instruction {
        match width {
            Width::Byte => Instruction::LoadConstByte(index),
            Width::Short => Instruction::LoadConstShort(index),
            Width::Int => Instruction::LoadConstInt(index),
        }
    }

    /// Values popped and pushed. `None` for `Call`, whose effect depends on
    /// the callee's arity.
    pub fn stack_effect(&self) -> Option<(u16, u16)> {
        use Instruction::*;
        match self {
            LoadConstByte(_) | LoadConstShort(_) | LoadConstInt(_) | LoadLocal(_) => Some((0, 1)),
            StoreLocal(_) | Pop | JumpIfFalse(_) | JumpIfTrue(_) | Return => Some((1, 0)),
            Dup => Some((1, 2)),
            Add | Sub | Mul | Div | Rem | IntCmp(_) => Some((2, 1)),
            Neg | Not => Some((1, 1)),
            Jump(_) => Some((0, 0)),
            Call(_) => None,
        }
    }

    pub fn branch_offset(&self) -> Option<i16> {
        match self {
            Self::Jump(offset) | Self::JumpIfFalse(offset) | Self::JumpIfTrue(offset) => {
                Some(*offset)
            }
            _ => None,
        }
    }

    /// Same branch with a new offset. Other instructions are returned as is.
    pub fn with_offset(self, offset: i16) -> Instruction {
        match self {
            Self::Jump(_) => Self::Jump(offset),
            Self::JumpIfFalse(_) => Self::JumpIfFalse(offset),
            Self::JumpIfTrue(_) => Self::JumpIfTrue(offset),
            other => other,
        }
    }

    /// Execution never continues with the next instruction.
    pub const fn is_terminator(&self) -> bool {
        matches!(self, Self::Jump(_) | Self::Return)
    }
}

impl fmt::Debug for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LoadConstByte(idx) => write!(f, "LoadConstByte(#{})", idx),
            Self::LoadConstShort(idx) => write!(f, "LoadConstShort(#{})", idx),
            Self::LoadConstInt(idx) => write!(f, "LoadConstInt(#{})", idx),
            Self::LoadLocal(slot) => write!(f, "LoadLocal({})", slot),
            Self::StoreLocal(slot) => write!(f, "StoreLocal({})", slot),
            Self::Dup => write!(f, "Dup"),
            Self::Pop => write!(f, "Pop"),
            Self::Add => write!(f, "Add"),
            Self::Sub => write!(f, "Sub"),
            Self::Mul => write!(f, "Mul"),
            Self::Div => write!(f, "Div"),
            Self::Rem => write!(f, "Rem"),
            Self::Neg => write!(f, "Neg"),
            Self::Not => write!(f, "Not"),
            Self::IntCmp(op) => write!(f, "IntCmp({:?})", op),
            Self::Jump(offset) => write!(f, "Jump({:+})", offset),
            Self::JumpIfFalse(offset) => write!(f, "JumpIfFalse({:+})", offset),
            Self::JumpIfTrue(offset) => write!(f, "JumpIfTrue({:+})", offset),
            Self::Call(method) => write!(f, "Call({})", method),
            Self::Return => write!(f, "Return"),
        }
    }
}
