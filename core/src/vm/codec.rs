//! Byte encoding of instructions, constant pools and compiled methods.
//!
//! Method layout, all integers big-endian:
//! ```text
//! name         u16 length + UTF-8 bytes
//! param_count  u16
//! max_stack    u16
//! max_locals   u16
//! pool         u16 count, then per entry: width tag (1, 2 or 4) + value bytes
//! code         u32 byte length + encoded instructions
//! ```
//! Decoding only accepts canonical input: pool values must use their
//! narrowest width and `WIDE` is only used for operands above 255, so
//! `encode(decode(bytes)) == bytes` whenever decoding succeeds.

use thiserror::Error;

use crate::constant_pool::{PoolEntry, Width};
use crate::vm::instruction_set::opcode;
use crate::vm::{CompiledMethod, ComparisonOp, Instruction};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("unexpected end of input at byte {offset}")]
    UnexpectedEof { offset: usize },
    #[error("unknown opcode 0x{opcode:02X} at byte {offset}")]
    UnknownOpcode { opcode: u8, offset: usize },
    #[error("unknown comparison code {code} at byte {offset}")]
    UnknownComparison { code: u8, offset: usize },
    #[error("`WIDE` prefix at byte {offset} is not followed by a slot or pool operand above 255")]
    InvalidWide { offset: usize },
    #[error("invalid constant width tag {tag}")]
    InvalidWidth { tag: u8 },
    #[error("constant {value} is stored as {width} but fits a narrower width")]
    NonCanonicalWidth { value: i32, width: Width },
    #[error("method name is not valid UTF-8")]
    InvalidName,
    #[error("{remaining} trailing bytes after the method")]
    TrailingBytes { remaining: usize },
}

// === Writing ===

fn write_u8(out: &mut Vec<u8>, v: u8) {
    out.push(v);
}
fn write_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_be_bytes());
}
fn write_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_be_bytes());
}
fn write_str(out: &mut Vec<u8>, s: &str) {
    let bytes = &s.as_bytes()[..s.len().min(u16::MAX as usize)];
    write_u16(out, bytes.len() as u16);
    out.extend_from_slice(bytes);
}

/// Slot and pool operands: one byte, or `WIDE` + opcode + two bytes.
fn write_indexed(out: &mut Vec<u8>, op: u8, operand: u16) {
    match u8::try_from(operand) {
        Ok(narrow) => {
            write_u8(out, op);
            write_u8(out, narrow);
        }
        Err(_) => {
            write_u8(out, opcode::WIDE);
            write_u8(out, op);
            write_u16(out, operand);
        }
    }
}

pub fn encode_instruction(instr: &Instruction, out: &mut Vec<u8>) {
    use Instruction::*;
    let op = instr.opcode();
    match instr {
        LoadConstByte(index) | LoadConstShort(index) | LoadConstInt(index) => {
            write_indexed(out, op, *index)
        }
        LoadLocal(slot) | StoreLocal(slot) => write_indexed(out, op, *slot),
        IntCmp(cmp) => {
            write_u8(out, op);
            write_u8(out, cmp.code());
        }
        Jump(offset) | JumpIfFalse(offset) | JumpIfTrue(offset) => {
            write_u8(out, op);
            out.extend_from_slice(&offset.to_be_bytes());
        }
        Call(method) => {
            write_u8(out, op);
            write_u16(out, *method);
        }
        Dup | Pop | Add | Sub | Mul | Div | Rem | Neg | Not | Return => write_u8(out, op),
    }
}

pub fn encode_instructions(instructions: &[Instruction]) -> Vec<u8> {
    let mut out = Vec::with_capacity(instructions.len() * 2);
    for instr in instructions {
        encode_instruction(instr, &mut out);
    }
    out
}

pub fn encode_pool(entries: &[PoolEntry], out: &mut Vec<u8>) {
    write_u16(out, entries.len() as u16);
    for entry in entries {
        write_u8(out, entry.width.size());
        match entry.width {
            Width::Byte => out.extend_from_slice(&(entry.value as i8).to_be_bytes()),
            Width::Short => out.extend_from_slice(&(entry.value as i16).to_be_bytes()),
            Width::Int => out.extend_from_slice(&entry.value.to_be_bytes()),
        }
    }
}

impl CompiledMethod {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        write_str(&mut out, &self.name);
        write_u16(&mut out, self.param_count);
        write_u16(&mut out, self.max_stack);
        write_u16(&mut out, self.max_locals);
        encode_pool(&self.constants, &mut out);
        let code = encode_instructions(&self.instructions);
        write_u32(&mut out, code.len() as u32);
        out.extend_from_slice(&code);
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<CompiledMethod, DecodeError> {
        let mut rd = Reader { bytes, idx: 0 };
        let name = rd.read_str()?;
        let param_count = rd.read_u16()?;
        let max_stack = rd.read_u16()?;
        let max_locals = rd.read_u16()?;
        let constants = decode_pool(&mut rd)?;
        let code_len = rd.read_u32()? as usize;
        let code = rd.read_exact(code_len)?;
        let instructions = decode_instructions(code)?;
        if rd.idx != bytes.len() {
            return Err(DecodeError::TrailingBytes {
                remaining: bytes.len() - rd.idx,
            });
        }
        Ok(CompiledMethod {
            name,
            param_count,
            max_stack,
            max_locals,
            constants,
            instructions,
        })
    }
}

// === Reading ===

struct Reader<'a> {
    bytes: &'a [u8],
    idx: usize,
}

impl<'a> Reader<'a> {
    fn is_empty(&self) -> bool {
        self.idx >= self.bytes.len()
    }
    fn read_exact(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        if self.idx + n > self.bytes.len() {
            return Err(DecodeError::UnexpectedEof {
                offset: self.bytes.len(),
            });
        }
        let s = &self.bytes[self.idx..self.idx + n];
        self.idx += n;
        Ok(s)
    }
    fn read_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.read_exact(1)?[0])
    }
    fn read_u16(&mut self) -> Result<u16, DecodeError> {
        let b = self.read_exact(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }
    fn read_i16(&mut self) -> Result<i16, DecodeError> {
        let b = self.read_exact(2)?;
        Ok(i16::from_be_bytes([b[0], b[1]]))
    }
    fn read_u32(&mut self) -> Result<u32, DecodeError> {
        let b = self.read_exact(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }
    fn read_i32(&mut self) -> Result<i32, DecodeError> {
        let b = self.read_exact(4)?;
        Ok(i32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }
    fn read_str(&mut self) -> Result<String, DecodeError> {
        let n = self.read_u16()? as usize;
        let b = self.read_exact(n)?;
        String::from_utf8(b.to_vec()).map_err(|_| DecodeError::InvalidName)
    }
}

fn decode_pool(rd: &mut Reader<'_>) -> Result<Vec<PoolEntry>, DecodeError> {
    let count = rd.read_u16()? as usize;
    let mut entries = Vec::with_capacity(count);
    for _ in 0..count {
        let tag = rd.read_u8()?;
        let width = Width::from_size(tag).ok_or(DecodeError::InvalidWidth { tag })?;
        let value = match width {
            Width::Byte => rd.read_u8()? as i8 as i32,
            Width::Short => rd.read_i16()? as i32,
            Width::Int => rd.read_i32()?,
        };
        if Width::of(value) != width {
            return Err(DecodeError::NonCanonicalWidth { value, width });
        }
        entries.push(PoolEntry { value, width });
    }
    Ok(entries)
}

fn read_indexed(rd: &mut Reader<'_>, wide: bool, offset: usize) -> Result<u16, DecodeError> {
    if !wide {
        return Ok(rd.read_u8()? as u16);
    }
    let operand = rd.read_u16()?;
    if operand <= u8::MAX as u16 {
        return Err(DecodeError::InvalidWide { offset });
    }
    Ok(operand)
}

fn decode_instruction(rd: &mut Reader<'_>) -> Result<Instruction, DecodeError> {
    let offset = rd.idx;
    let mut op = rd.read_u8()?;
    let wide = op == opcode::WIDE;
    if wide {
        op = rd.read_u8()?;
    }

    let instr = match op {
        opcode::LOAD_CONST_BYTE => Instruction::LoadConstByte(read_indexed(rd, wide, offset)?),
        opcode::LOAD_CONST_SHORT => Instruction::LoadConstShort(read_indexed(rd, wide, offset)?),
        opcode::LOAD_CONST_INT => Instruction::LoadConstInt(read_indexed(rd, wide, offset)?),
        opcode::LOAD_LOCAL => Instruction::LoadLocal(read_indexed(rd, wide, offset)?),
        opcode::STORE_LOCAL => Instruction::StoreLocal(read_indexed(rd, wide, offset)?),
        _ if wide => return Err(DecodeError::InvalidWide { offset }),
        opcode::DUP => Instruction::Dup,
        opcode::POP => Instruction::Pop,
        opcode::ADD => Instruction::Add,
        opcode::SUB => Instruction::Sub,
        opcode::MUL => Instruction::Mul,
        opcode::DIV => Instruction::Div,
        opcode::REM => Instruction::Rem,
        opcode::NEG => Instruction::Neg,
        opcode::NOT => Instruction::Not,
        opcode::INT_CMP => {
            let code = rd.read_u8()?;
            let cmp = ComparisonOp::from_code(code).ok_or(DecodeError::UnknownComparison {
                code,
                offset: offset + 1,
            })?;
            Instruction::IntCmp(cmp)
        }
        opcode::JUMP => Instruction::Jump(rd.read_i16()?),
        opcode::JUMP_IF_FALSE => Instruction::JumpIfFalse(rd.read_i16()?),
        opcode::JUMP_IF_TRUE => Instruction::JumpIfTrue(rd.read_i16()?),
        opcode::CALL => Instruction::Call(rd.read_u16()?),
        opcode::RETURN => Instruction::Return,
        opcode => return Err(DecodeError::UnknownOpcode { opcode, offset }),
    };
    Ok(instr)
}

pub fn decode_instructions(bytes: &[u8]) -> Result<Vec<Instruction>, DecodeError> {
    let mut rd = Reader { bytes, idx: 0 };
    let mut instructions = Vec::new();
    while !rd.is_empty() {
        instructions.push(decode_instruction(&mut rd)?);
    }
    Ok(instructions)
}
