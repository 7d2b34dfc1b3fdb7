//! Precedence graph, SCC decomposition, and the relation expiry schedule.
//!
//! The precedence graph has one node per relation and an edge `B -> R`
//! whenever `B` appears in the body of a clause of `R` (positively, negated,
//! or inside an aggregate). Strongly connected components of this graph are
//! the units of fixpoint computation; their condensation is walked in
//! topological order (dependencies before dependents).

use datalog_ast::{Argument, Atom, Literal, Program};
use petgraph::algo;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{BTreeMap, BTreeSet};

/// SCC decomposition of the precedence graph.
///
/// SCC indices are topological positions: scc 0 has no predecessors outside
/// itself, and every edge in the condensation goes from a lower to a higher
/// index.
#[derive(Debug)]
pub struct SccGraph {
    /// Members of each SCC, name-sorted for deterministic iteration.
    members: Vec<Vec<String>>,
    /// Relation name -> SCC index.
    scc_of: BTreeMap<String, usize>,
    /// SCC -> predecessor relations outside the SCC (body dependencies).
    external_predecessors: Vec<BTreeSet<String>>,
    /// SCC -> members that some later SCC reads.
    with_external_successors: Vec<BTreeSet<String>>,
    /// SCCs with an internal cycle (self-loop or multiple members).
    recursive: Vec<bool>,
    /// Input / output flags per relation.
    inputs: BTreeSet<String>,
    outputs: BTreeSet<String>,
}

fn body_relations(atom_acc: &mut BTreeSet<String>, literal: &Literal) {
    match literal {
        Literal::Atom(atom)
        | Literal::Negation(atom)
        | Literal::PositiveNegation(atom)
        | Literal::SubsumptionNegation { atom, .. }
        | Literal::ExistenceCheck(atom) => {
            atom_acc.insert(atom.name.clone());
            for arg in &atom.arguments {
                argument_relations(atom_acc, arg);
            }
        }
        Literal::BinaryConstraint { lhs, rhs, .. } => {
            argument_relations(atom_acc, lhs);
            argument_relations(atom_acc, rhs);
        }
        Literal::Conjunction(lhs, rhs) | Literal::Disjunction(lhs, rhs) => {
            body_relations(atom_acc, lhs);
            body_relations(atom_acc, rhs);
        }
    }
}

fn argument_relations(atom_acc: &mut BTreeSet<String>, argument: &Argument) {
    match argument {
        Argument::Aggregator(agg) => {
            for lit in &agg.body {
                body_relations(atom_acc, lit);
            }
        }
        Argument::Record(record) => {
            for arg in &record.arguments {
                argument_relations(atom_acc, arg);
            }
        }
        Argument::IntrinsicFunctor { arguments, .. }
        | Argument::UserDefinedFunctor { arguments, .. } => {
            for arg in arguments {
                argument_relations(atom_acc, arg);
            }
        }
        _ => {}
    }
}

impl SccGraph {
    pub fn build(program: &Program) -> Self {
        let mut graph: DiGraph<String, ()> = DiGraph::new();
        let mut nodes: BTreeMap<String, NodeIndex> = BTreeMap::new();

        for relation in &program.relations {
            let idx = graph.add_node(relation.name.clone());
            nodes.insert(relation.name.clone(), idx);
        }

        // Dependency edges: body relation -> head relation. Aggregators in
        // head arguments read relations too.
        for relation in &program.relations {
            let head = nodes[&relation.name];
            for clause in &relation.clauses {
                let mut deps = BTreeSet::new();
                for literal in &clause.body {
                    body_relations(&mut deps, literal);
                }
                for arg in &clause.head.arguments {
                    argument_relations(&mut deps, arg);
                }
                for dep in deps {
                    if let Some(&source) = nodes.get(&dep) {
                        graph.update_edge(source, head, ());
                    }
                }
            }
        }

        // Strongly connected components. Kosaraju emits successor SCCs
        // first; reversing gives the dependencies-first evaluation order.
        let mut sccs = algo::kosaraju_scc(&graph);
        sccs.reverse();

        let mut members = Vec::with_capacity(sccs.len());
        let mut scc_of = BTreeMap::new();
        let mut recursive = Vec::with_capacity(sccs.len());
        for (index, scc) in sccs.iter().enumerate() {
            let mut names: Vec<String> = scc.iter().map(|&n| graph[n].clone()).collect();
            names.sort();
            for name in &names {
                scc_of.insert(name.clone(), index);
            }
            let is_recursive = scc.len() > 1
                || scc
                    .first()
                    .is_some_and(|&n| graph.find_edge(n, n).is_some());
            recursive.push(is_recursive);
            members.push(names);
        }

        // Cross-SCC read sets.
        let mut external_predecessors = vec![BTreeSet::new(); members.len()];
        let mut with_external_successors = vec![BTreeSet::new(); members.len()];
        for edge in graph.edge_indices() {
            let (source, target) = graph.edge_endpoints(edge).expect("edge endpoints");
            let source_scc = scc_of[&graph[source]];
            let target_scc = scc_of[&graph[target]];
            if source_scc != target_scc {
                external_predecessors[target_scc].insert(graph[source].clone());
                with_external_successors[source_scc].insert(graph[source].clone());
            }
        }

        let inputs = program
            .relations
            .iter()
            .filter(|rel| rel.is_input)
            .map(|rel| rel.name.clone())
            .collect();
        let outputs = program
            .relations
            .iter()
            .filter(|rel| rel.is_output)
            .map(|rel| rel.name.clone())
            .collect();

        SccGraph {
            members,
            scc_of,
            external_predecessors,
            with_external_successors,
            recursive,
            inputs,
            outputs,
        }
    }

    pub fn num_sccs(&self) -> usize {
        self.members.len()
    }

    /// Topological order over SCC indices. Indices are already assigned in
    /// topological positions, so this is simply `0..n`.
    pub fn order(&self) -> impl Iterator<Item = usize> {
        0..self.num_sccs()
    }

    pub fn scc_of(&self, relation: &str) -> Option<usize> {
        self.scc_of.get(relation).copied()
    }

    pub fn is_recursive(&self, scc: usize) -> bool {
        self.recursive[scc]
    }

    pub fn internal_relations(&self, scc: usize) -> &[String] {
        &self.members[scc]
    }

    /// True when `relation` lives in `scc`. Unknown relation names (e.g.
    /// mangled variant probes added by rewrites) are never internal.
    pub fn is_internal(&self, scc: usize, relation: &str) -> bool {
        self.scc_of(relation) == Some(scc)
    }

    /// Both atoms in the same SCC; used for clause recursiveness and delta
    /// pivoting.
    pub fn same_scc(&self, head: &Atom, body: &Atom) -> bool {
        match (self.scc_of(&head.name), self.scc_of(&body.name)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    pub fn internal_input_relations(&self, scc: usize) -> Vec<&str> {
        self.members[scc]
            .iter()
            .filter(|name| self.inputs.contains(*name))
            .map(String::as_str)
            .collect()
    }

    pub fn internal_output_relations(&self, scc: usize) -> Vec<&str> {
        self.members[scc]
            .iter()
            .filter(|name| self.outputs.contains(*name))
            .map(String::as_str)
            .collect()
    }

    pub fn external_output_predecessor_relations(&self, scc: usize) -> Vec<&str> {
        self.external_predecessors[scc]
            .iter()
            .filter(|name| self.outputs.contains(*name))
            .map(String::as_str)
            .collect()
    }

    pub fn external_non_output_predecessor_relations(&self, scc: usize) -> Vec<&str> {
        self.external_predecessors[scc]
            .iter()
            .filter(|name| !self.outputs.contains(*name))
            .map(String::as_str)
            .collect()
    }

    pub fn internal_non_output_relations_with_external_successors(
        &self,
        scc: usize,
    ) -> Vec<&str> {
        self.with_external_successors[scc]
            .iter()
            .filter(|name| !self.outputs.contains(*name))
            .map(String::as_str)
            .collect()
    }
}

/// For each position of the topological order, the relations whose last use
/// is that position and which can therefore be dropped.
#[derive(Debug)]
pub struct RelationSchedule {
    expired: Vec<Vec<String>>,
}

impl RelationSchedule {
    pub fn build(graph: &SccGraph) -> Self {
        let mut last_use: BTreeMap<String, usize> = BTreeMap::new();

        for scc in graph.order() {
            for relation in graph.internal_relations(scc) {
                last_use.insert(relation.clone(), scc);
            }
        }
        // A predecessor read extends the lifetime to the reading SCC.
        for scc in graph.order() {
            for relation in graph.external_predecessors[scc].iter() {
                let entry = last_use.entry(relation.clone()).or_insert(scc);
                if *entry < scc {
                    *entry = scc;
                }
            }
        }

        let mut expired = vec![Vec::new(); graph.num_sccs()];
        for (relation, scc) in last_use {
            expired[scc].push(relation);
        }
        for list in &mut expired {
            list.sort();
        }
        RelationSchedule { expired }
    }

    pub fn expired(&self, scc: usize) -> &[String] {
        &self.expired[scc]
    }
}
