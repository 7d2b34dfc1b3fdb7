//! The top-level IR program value.

use super::{RamRelation, RamStatement};
use std::collections::BTreeMap;
use std::fmt;

/// A complete translated program: relation schema table, main statement
/// tree, and named subroutines. Relation and subroutine tables are ordered
/// maps so rendering and iteration are deterministic.
#[derive(Debug, Clone, PartialEq)]
pub struct RamProgram {
    relations: BTreeMap<String, RamRelation>,
    main: RamStatement,
    subroutines: BTreeMap<String, RamStatement>,
}

impl RamProgram {
    pub fn new() -> Self {
        RamProgram {
            relations: BTreeMap::new(),
            main: RamStatement::Sequence(Vec::new()),
            subroutines: BTreeMap::new(),
        }
    }

    /// Register a relation schema on first reference. Later calls with the
    /// same name keep the first (fully specified) schema.
    pub fn add_relation(&mut self, relation: RamRelation) {
        self.relations
            .entry(relation.name.clone())
            .or_insert(relation);
    }

    pub fn relation(&self, name: &str) -> Option<&RamRelation> {
        self.relations.get(name)
    }

    pub fn relations(&self) -> impl Iterator<Item = &RamRelation> {
        self.relations.values()
    }

    pub fn set_main(&mut self, main: RamStatement) {
        self.main = main;
    }

    pub fn main(&self) -> &RamStatement {
        &self.main
    }

    pub fn add_subroutine(&mut self, name: impl Into<String>, body: RamStatement) {
        self.subroutines.insert(name.into(), body);
    }

    pub fn subroutine(&self, name: &str) -> Option<&RamStatement> {
        self.subroutines.get(name)
    }

    pub fn subroutines(&self) -> impl Iterator<Item = (&String, &RamStatement)> {
        self.subroutines.iter()
    }
}

impl Default for RamProgram {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RamProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "relations:")?;
        for relation in self.relations.values() {
            writeln!(f, "  {}", relation)?;
        }
        writeln!(f, "main:")?;
        write!(f, "{}", self.main)?;
        for (name, body) in &self.subroutines {
            writeln!(f, "subroutine {}:", name)?;
            write!(f, "{}", body)?;
        }
        Ok(())
    }
}
