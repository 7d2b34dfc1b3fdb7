//! Clause-scoped value index.
//!
//! Records where every variable, nested record, and aggregator of one
//! clause is bound during the index pass. The index lives exactly as long
//! as one clause translation; all later references read from it.

use datalog_ast::Aggregator;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// A binding point: tuple nesting `level` and `column` within that tuple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub level: usize,
    pub column: usize,
    /// Relation the tuple at `level` ranges over, when known.
    pub relation: Option<String>,
}

impl Location {
    pub fn new(level: usize, column: usize) -> Self {
        Location {
            level,
            column,
            relation: None,
        }
    }

    pub fn with_relation(level: usize, column: usize, relation: String) -> Self {
        Location {
            level,
            column,
            relation: Some(relation),
        }
    }

    /// Same binding point, ignoring the relation annotation.
    pub fn same_point(&self, other: &Location) -> bool {
        self.level == other.level && self.column == other.column
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.relation {
            Some(relation) => write!(f, "t{}.{} in {}", self.level, self.column, relation),
            None => write!(f, "t{}.{}", self.level, self.column),
        }
    }
}

/// The index itself.
#[derive(Debug, Default)]
pub struct ValueIndex {
    /// Variable name -> locations in insertion order. The first entry is
    /// the definition point; later entries become equality constraints.
    variable_references: BTreeMap<String, Vec<Location>>,
    /// Unpack level of a record -> where its packed value was first seen.
    record_definitions: BTreeMap<usize, Location>,
    /// One entry per distinct aggregator, with the level holding its
    /// result.
    aggregator_locations: Vec<(Aggregator, Location)>,
    /// Levels allocated to aggregators.
    aggregator_levels: BTreeSet<usize>,
}

impl ValueIndex {
    pub fn new() -> Self {
        ValueIndex::default()
    }

    pub fn add_var_reference(&mut self, variable: &str, location: Location) {
        let references = self
            .variable_references
            .entry(variable.to_string())
            .or_default();
        if !references.contains(&location) {
            references.push(location);
        }
    }

    pub fn is_defined(&self, variable: &str) -> bool {
        self.variable_references.contains_key(variable)
    }

    /// The first recorded location of a variable.
    pub fn definition_point(&self, variable: &str) -> Option<&Location> {
        self.variable_references
            .get(variable)
            .and_then(|refs| refs.first())
    }

    pub fn variable_references(&self) -> &BTreeMap<String, Vec<Location>> {
        &self.variable_references
    }

    pub fn references_of(&self, variable: &str) -> &[Location] {
        self.variable_references
            .get(variable)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn set_record_definition(&mut self, unpack_level: usize, location: Location) {
        self.record_definitions.insert(unpack_level, location);
    }

    pub fn record_definition(&self, unpack_level: usize) -> Option<&Location> {
        self.record_definitions.get(&unpack_level)
    }

    pub fn set_aggregator_location(&mut self, aggregator: Aggregator, location: Location) {
        self.aggregator_levels.insert(location.level);
        self.aggregator_locations.push((aggregator, location));
    }

    /// Location of an aggregator's result, matching by structural equality
    /// (identical aggregators share one level).
    pub fn aggregator_location(&self, aggregator: &Aggregator) -> Option<&Location> {
        self.aggregator_locations
            .iter()
            .find(|(known, _)| known == aggregator)
            .map(|(_, loc)| loc)
    }

    pub fn has_aggregator(&self, aggregator: &Aggregator) -> bool {
        self.aggregator_location(aggregator).is_some()
    }

    /// Whether a level belongs to an aggregator. Equality chains skip such
    /// locations; the aggregate wires its own bindings.
    pub fn is_aggregator_level(&self, level: usize) -> bool {
        self.aggregator_levels.contains(&level)
    }
}
