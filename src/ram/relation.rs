//! IR relation schemas.

use datalog_ast::RelationRepresentation;
use std::fmt;

/// Schema of one IR relation, keyed in the program table by its mangled name.
///
/// Every variant of a base relation (delta, diff_plus, ...) gets its own
/// entry sharing arity, attribute names, and attribute types with the base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RamRelation {
    pub name: String,
    pub arity: usize,
    /// Trailing height-parameter columns (provenance mode).
    pub height_parameters: usize,
    pub attribute_names: Vec<String>,
    /// Type qualifier per attribute, e.g. `i` / `s`, as produced by the
    /// type environment. Empty when the schema came from a bare atom
    /// reference rather than a declared relation.
    pub attribute_types: Vec<String>,
    pub representation: RelationRepresentation,
}

impl RamRelation {
    pub fn new(name: impl Into<String>, arity: usize) -> Self {
        RamRelation {
            name: name.into(),
            arity,
            height_parameters: 0,
            attribute_names: Vec::new(),
            attribute_types: Vec::new(),
            representation: RelationRepresentation::default(),
        }
    }
}

impl fmt::Display for RamRelation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for i in 0..self.arity {
            if i > 0 {
                write!(f, ", ")?;
            }
            match (self.attribute_names.get(i), self.attribute_types.get(i)) {
                (Some(name), Some(ty)) => write!(f, "{}:{}", name, ty)?,
                (Some(name), None) => write!(f, "{}", name)?,
                _ => write!(f, "c{}", i)?,
            }
        }
        write!(f, ")")
    }
}
