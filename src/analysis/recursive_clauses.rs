//! Recursive-clause classification.

use super::SccGraph;
use datalog_ast::Clause;

/// Classifies clauses as recursive or not.
///
/// A clause is recursive when some positive body atom's relation lives in
/// the same SCC as the head: deriving the head can feed its own body.
/// Probe atoms on mangled variant names added by rewrites are not part of
/// the precedence graph and never make a clause recursive.
#[derive(Debug)]
pub struct RecursiveClauses<'a> {
    scc_graph: &'a SccGraph,
}

impl<'a> RecursiveClauses<'a> {
    pub fn new(scc_graph: &'a SccGraph) -> Self {
        RecursiveClauses { scc_graph }
    }

    pub fn recursive(&self, clause: &Clause) -> bool {
        clause
            .atoms()
            .iter()
            .any(|atom| self.scc_graph.same_scc(&clause.head, atom))
    }
}
