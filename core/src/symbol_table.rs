//! Names visible while compiling one method.
//!
//! Fields are class-level and resolve to their initializer literal. Locals
//! (parameters first) live in a stack of block scopes and resolve to a slot
//! index. Popping a scope hands its slots back, so sibling blocks reuse them.

use hashbrown::HashMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SymbolError {
    #[error("`{name}` is already defined")]
    DuplicateSymbol { name: String },
    #[error("cannot find `{name}` in this scope")]
    UnresolvedSymbol { name: String },
    #[error("too many local variables (limit: {limit})")]
    TooManyLocals { limit: u16 },
}

/// What a name resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Symbol {
    Local { slot: u16 },
    /// A field is a compile-time constant: its initializer, or `0`.
    Field { value: i32 },
}

struct Scope {
    names: HashMap<String, u16>,
    /// First slot allocated by this scope; `next_slot` rewinds here on pop.
    base_slot: u16,
}

impl Scope {
    fn new(base_slot: u16) -> Self {
        Self {
            names: HashMap::new(),
            base_slot,
        }
    }
}

pub struct SymbolTable {
    fields: HashMap<String, i32>,
    /// Innermost scope last. The first entry is the method scope holding
    /// the parameters and is never popped.
    scopes: Vec<Scope>,
    next_slot: u16,
    max_locals: u16,
    limit: u16,
}

impl SymbolTable {
    /// Creates a table that accepts at most `limit` simultaneously live
    /// locals.
    pub fn new(limit: u16) -> Self {
        Self {
            fields: HashMap::new(),
            scopes: vec![Scope::new(0)],
            next_slot: 0,
            max_locals: 0,
            limit,
        }
    }

    pub fn declare_field(&mut self, name: &str, value: Option<i32>) -> Result<(), SymbolError> {
        if self.fields.contains_key(name) {
            return Err(SymbolError::DuplicateSymbol {
                name: name.to_string(),
            });
        }
        self.fields.insert(name.to_string(), value.unwrap_or(0));
        Ok(())
    }

    /// Allocates the next free slot for `name` in the innermost scope.
    ///
    /// A local may not shadow another local of any enclosing active scope,
    /// but it may shadow a field.
    pub fn declare_local(&mut self, name: &str) -> Result<u16, SymbolError> {
        if self.scopes.iter().any(|scope| scope.names.contains_key(name)) {
            return Err(SymbolError::DuplicateSymbol {
                name: name.to_string(),
            });
        }
        if self.next_slot >= self.limit {
            return Err(SymbolError::TooManyLocals { limit: self.limit });
        }

        let slot = self.next_slot;
        self.next_slot += 1;
        self.max_locals = self.max_locals.max(self.next_slot);
        if let Some(scope) = self.scopes.last_mut() {
            scope.names.insert(name.to_string(), slot);
        }
        Ok(slot)
    }

    /// Looks `name` up from the innermost scope outward, then among fields.
    pub fn resolve(&self, name: &str) -> Result<Symbol, SymbolError> {
        for scope in self.scopes.iter().rev() {
            if let Some(&slot) = scope.names.get(name) {
                return Ok(Symbol::Local { slot });
            }
        }
        self.resolve_field(name)
    }

    /// Looks `name` up among fields only, skipping locals (`this.name`).
    pub fn resolve_field(&self, name: &str) -> Result<Symbol, SymbolError> {
        self.fields
            .get(name)
            .map(|&value| Symbol::Field { value })
            .ok_or_else(|| SymbolError::UnresolvedSymbol {
                name: name.to_string(),
            })
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(Scope::new(self.next_slot));
    }

    /// Leaves the innermost block scope. The method scope stays.
    pub fn pop_scope(&mut self) {
        debug_assert!(self.scopes.len() > 1, "Cannot pop the method scope");
        if self.scopes.len() > 1 {
            if let Some(scope) = self.scopes.pop() {
                self.next_slot = scope.base_slot;
            }
        }
    }

    /// Highest number of locals live at the same time so far.
    pub fn max_locals(&self) -> u16 {
        self.max_locals
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parameters_take_first_slots() {
        let mut table = SymbolTable::new(256);
        assert_eq!(table.declare_local("a"), Ok(0));
        assert_eq!(table.declare_local("b"), Ok(1));
        assert_eq!(table.resolve("b"), Ok(Symbol::Local { slot: 1 }));
        assert_eq!(table.max_locals(), 2);
    }

    #[test]
    fn test_duplicate_local() {
        let mut table = SymbolTable::new(256);
        table.declare_local("a").unwrap();
        assert_eq!(
            table.declare_local("a"),
            Err(SymbolError::DuplicateSymbol {
                name: "a".to_string()
            })
        );

        // Redeclaring a local of an enclosing scope is rejected too.
        table.push_scope();
        assert!(matches!(
            table.declare_local("a"),
            Err(SymbolError::DuplicateSymbol { .. })
        ));
    }

    #[test]
    fn test_duplicate_field() {
        let mut table = SymbolTable::new(256);
        table.declare_field("x", Some(1)).unwrap();
        assert_eq!(
            table.declare_field("x", None),
            Err(SymbolError::DuplicateSymbol {
                name: "x".to_string()
            })
        );
    }

    #[test]
    fn test_unresolved() {
        let table = SymbolTable::new(256);
        assert_eq!(
            table.resolve("nope"),
            Err(SymbolError::UnresolvedSymbol {
                name: "nope".to_string()
            })
        );
    }

    #[test]
    fn test_locals_shadow_fields() {
        let mut table = SymbolTable::new(256);
        table.declare_field("x", Some(69)).unwrap();
        table.declare_field("zero", None).unwrap();
        assert_eq!(table.resolve("x"), Ok(Symbol::Field { value: 69 }));
        assert_eq!(table.resolve("zero"), Ok(Symbol::Field { value: 0 }));

        table.declare_local("x").unwrap();
        assert_eq!(table.resolve("x"), Ok(Symbol::Local { slot: 0 }));
        assert_eq!(table.resolve_field("x"), Ok(Symbol::Field { value: 69 }));
    }

    #[test]
    fn test_block_scopes_reuse_slots() {
        let mut table = SymbolTable::new(256);
        table.declare_local("n").unwrap();

        table.push_scope();
        assert_eq!(table.declare_local("a"), Ok(1));
        assert_eq!(table.declare_local("b"), Ok(2));
        table.pop_scope();
        assert!(table.resolve("a").is_err());

        table.push_scope();
        assert_eq!(table.declare_local("c"), Ok(1));
        // A name from a closed sibling scope is free again.
        assert_eq!(table.declare_local("a"), Ok(2));
        table.pop_scope();

        assert_eq!(table.max_locals(), 3);
        assert_eq!(table.depth(), 1);
    }

    #[test]
    fn test_local_limit() {
        let mut table = SymbolTable::new(2);
        table.declare_local("a").unwrap();
        table.declare_local("b").unwrap();
        assert_eq!(
            table.declare_local("c"),
            Err(SymbolError::TooManyLocals { limit: 2 })
        );
    }
}
