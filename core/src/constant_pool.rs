//! Per-method constant pool with narrowest-width entries.

use core::fmt;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::trace;

/// Encoded size of a pool entry.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Width {
    Byte,
    Short,
    Int,
}

impl Width {
    /// Smallest signed width whose range contains `value`.
    pub const fn of(value: i32) -> Width {
        if value >= i8::MIN as i32 && value <= i8::MAX as i32 {
            Width::Byte
        } else if value >= i16::MIN as i32 && value <= i16::MAX as i32 {
            Width::Short
        } else {
            Width::Int
        }
    }

    /// Size in bytes, also used as the width tag in serialized pools.
    pub const fn size(self) -> u8 {
        match self {
            Width::Byte => 1,
            Width::Short => 2,
            Width::Int => 4,
        }
    }

    pub const fn from_size(size: u8) -> Option<Width> {
        match size {
            1 => Some(Width::Byte),
            2 => Some(Width::Short),
            4 => Some(Width::Int),
            _ => None,
        }
    }
}

impl fmt::Display for Width {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Width::Byte => write!(f, "byte"),
            Width::Short => write!(f, "short"),
            Width::Int => write!(f, "int"),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolEntry {
    pub value: i32,
    pub width: Width,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("too many constants (limit: {})", u16::MAX)]
pub struct TooManyConstants;

/// Deduplicating builder for one method's constants.
///
/// Indices follow first-seen order, so compiling the same body twice gives
/// the same pool.
#[derive(Debug, Default)]
pub struct ConstantPoolBuilder {
    entries: Vec<PoolEntry>,
    index: HashMap<i32, u16>,
}

impl ConstantPoolBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the index of `value`, adding an entry on first sight.
    pub fn intern(&mut self, value: i32) -> Result<u16, TooManyConstants> {
        if let Some(&existing) = self.index.get(&value) {
            return Ok(existing);
        }

        // The encoded pool stores its entry count as a u16.
        if self.entries.len() >= u16::MAX as usize {
            return Err(TooManyConstants);
        }
        let index = self.entries.len() as u16;
        let width = Width::of(value);
        self.entries.push(PoolEntry { value, width });
        self.index.insert(value, index);
        trace!(index, value, %width, "Interned constant");
        Ok(index)
    }

    pub fn width_of(&self, index: u16) -> Option<Width> {
        self.get(index).map(|entry| entry.width)
    }

    pub fn get(&self, index: u16) -> Option<&PoolEntry> {
        self.entries.get(index as usize)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn finish(self) -> Vec<PoolEntry> {
        self.entries
    }
}
