//! Models and functionality for a function's variables.
//!
//! The CFG pipeline never reads the variable table; it's carried alongside
//! each function for the stages before and after it.

use indexmap::IndexMap;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use tac_support::UniqueId;
use thiserror::Error;

/// Errors that can occur when populating a variable table.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VariableError {
    /// A variable with the same ID is already in the table.
    #[error("duplicate variable ID: {0}")]
    Duplicate(UniqueId),
}

/// How a variable is used at the function boundary.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum VariableRole {
    /// A parameter.
    Input,
    /// A value handed back to the caller.
    Output,
    /// A local.
    Local,
}

/// Whether a variable comes from the original program or was introduced later.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum VariableOrigin {
    /// Present in the original program.
    Original,
    /// Introduced by a transformation; has no counterpart in the original program.
    Fake,
}

/// The storage width of a variable, in bytes.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum VariableSize {
    /// 1 byte.
    Byte = 1,
    /// 2 bytes.
    Word = 2,
    /// 4 bytes.
    Dword = 4,
    /// 8 bytes.
    Qword = 8,
}

/// A single variable.
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Variable {
    /// The variable's unique ID.
    pub id: UniqueId,
    /// The variable's name.
    pub name: String,
    /// The variable's storage width.
    pub size: VariableSize,
    /// Whether the variable holds a pointer.
    pub pointer: bool,
    /// How the variable is used at the function boundary.
    pub role: VariableRole,
    /// Where the variable comes from.
    pub origin: VariableOrigin,
    /// A constant value this (input) variable is known to take, if any.
    pub const_value_in_param: Option<i64>,
}

impl Variable {
    /// Create a new, non-pointer, original variable.
    pub fn new(id: UniqueId, name: impl Into<String>, size: VariableSize, role: VariableRole) -> Self {
        Self {
            id: id,
            name: name.into(),
            size: size,
            pointer: false,
            role: role,
            origin: VariableOrigin::Original,
            const_value_in_param: None,
        }
    }

    /// Mark this variable as holding a pointer.
    pub fn pointer(mut self) -> Self {
        self.pointer = true;
        self
    }

    /// Mark this variable as introduced by a transformation.
    pub fn fake(mut self) -> Self {
        self.origin = VariableOrigin::Fake;
        self
    }

    /// Record a constant value this variable is known to take.
    pub fn with_const_value(mut self, value: i64) -> Self {
        self.const_value_in_param = Some(value);
        self
    }
}

/// A function's variables, in insertion order.
#[derive(Clone, Debug, Default)]
pub struct VariableTable(IndexMap<UniqueId, Variable>);

impl VariableTable {
    /// Add a variable to the table.
    ///
    /// Returns an error if a variable with the same ID is already present.
    pub fn insert(&mut self, variable: Variable) -> Result<(), VariableError> {
        if self.0.contains_key(&variable.id) {
            return Err(VariableError::Duplicate(variable.id));
        }

        self.0.insert(variable.id, variable);
        Ok(())
    }

    /// Returns the variable with the given ID, if any.
    pub fn get(&self, id: &UniqueId) -> Option<&Variable> {
        self.0.get(id)
    }

    /// Returns the first variable with the given name, if any.
    pub fn by_name(&self, name: &str) -> Option<&Variable> {
        self.0.values().find(|var| var.name == name)
    }

    /// Returns an iterator over all variables with the given role, in insertion order.
    pub fn with_role(&self, role: VariableRole) -> impl Iterator<Item = &Variable> + '_ {
        self.0.values().filter(move |var| var.role == role)
    }

    /// Returns an iterator over all variables, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Variable> + '_ {
        self.0.values()
    }

    /// Returns the number of variables in the table.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use tac_support::LabelAllocator;

    use super::*;

    #[test]
    fn test_variable_size_codes() {
        assert_eq!(u8::from(VariableSize::Dword), 4);
        assert_eq!(VariableSize::try_from(8).unwrap(), VariableSize::Qword);
        assert!(VariableSize::try_from(3).is_err());
    }

    #[test]
    fn test_variable_builders() {
        let var = Variable::new(UniqueId::from(1), "p", VariableSize::Qword, VariableRole::Input)
            .pointer()
            .fake()
            .with_const_value(-4);

        assert!(var.pointer);
        assert_eq!(var.origin, VariableOrigin::Fake);
        assert_eq!(var.const_value_in_param, Some(-4));
    }

    #[test]
    fn test_variable_table() {
        let ids = LabelAllocator::new();
        let mut table = VariableTable::default();
        assert!(table.is_empty());

        let a = Variable::new(ids.next_id(), "a", VariableSize::Dword, VariableRole::Input);
        let b = Variable::new(ids.next_id(), "b", VariableSize::Dword, VariableRole::Local);
        let c = Variable::new(ids.next_id(), "c", VariableSize::Byte, VariableRole::Output);
        table.insert(a.clone()).unwrap();
        table.insert(b.clone()).unwrap();
        table.insert(c.clone()).unwrap();

        assert_eq!(table.len(), 3);
        assert_eq!(table.get(&b.id), Some(&b));
        assert_eq!(table.by_name("c"), Some(&c));
        assert!(table.by_name("d").is_none());
        assert_eq!(
            table.with_role(VariableRole::Input).collect::<Vec<_>>(),
            vec![&a]
        );
        assert_eq!(
            table.iter().map(|v| v.name.as_str()).collect::<Vec<_>>(),
            vec!["a", "b", "c"]
        );

        assert_eq!(table.insert(a.clone()), Err(VariableError::Duplicate(a.id)));
    }
}
