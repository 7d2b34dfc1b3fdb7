//! # AST-to-RAM Translator
//!
//! Compiles a typed, normalized Datalog program into the RAM IR.
//!
//! ## Pipeline Position
//!
//! ```text
//! typed AST -> [Incremental Annotator] -> [Translator] -> RamProgram
//!                   (incremental only)        |
//!                                             +- analyses: SCC graph,
//!                                                topological order,
//!                                                recursive clauses,
//!                                                type environment
//! ```
//!
//! The translator is single threaded and deterministic: the only state it
//! mutates is the `RamProgram` under construction, and all iteration runs
//! over ordered containers. Two runs over the same translation unit render
//! byte-identical IR.

pub(crate) mod clause;
pub(crate) mod driver;
pub mod io;
pub mod naming;
pub(crate) mod non_recursive;
pub(crate) mod recursive;
pub(crate) mod subroutines;
pub(crate) mod value_index;
pub(crate) mod values;

use crate::analysis::{RecursiveClauses, RelationSchedule, SccGraph, TypeEnvironment};
use crate::config::Config;
use crate::ram::{RamProgram, RamRelation, RamStatement};
use datalog_ast::{Aggregator, Argument, Atom, Clause, Program, RecordInit, Relation};
use naming::RelationVariant;

/// The translator. Owns the RAM program being built and borrows the typed
/// AST plus the analyses computed on it.
pub struct AstTranslator<'a> {
    pub(crate) config: &'a Config,
    pub(crate) program: &'a Program,
    pub(crate) scc_graph: &'a SccGraph,
    pub(crate) recursive_clauses: &'a RecursiveClauses<'a>,
    pub(crate) type_env: &'a TypeEnvironment,
    pub(crate) schedule: &'a RelationSchedule,
    pub(crate) ram: RamProgram,
}

impl<'a> AstTranslator<'a> {
    pub fn new(
        config: &'a Config,
        program: &'a Program,
        scc_graph: &'a SccGraph,
        recursive_clauses: &'a RecursiveClauses<'a>,
        type_env: &'a TypeEnvironment,
        schedule: &'a RelationSchedule,
    ) -> Self {
        AstTranslator {
            config,
            program,
            scc_graph,
            recursive_clauses,
            type_env,
            schedule,
            ram: RamProgram::new(),
        }
    }

    /// Register (on first reference) and name the given variant of a
    /// declared relation. Every variant shares the base schema.
    pub(crate) fn translate_relation(
        &mut self,
        relation: &Relation,
        variant: RelationVariant,
    ) -> String {
        let name = naming::mangled_name(&relation.name, variant);
        let attribute_types = relation
            .attributes
            .iter()
            .map(|attr| self.type_env.qualifier(&attr.type_name).to_string())
            .collect();
        self.ram.add_relation(RamRelation {
            name: name.clone(),
            arity: relation.arity(),
            height_parameters: relation.height_parameters,
            attribute_names: relation.attribute_names(),
            attribute_types,
            representation: relation.representation,
        });
        name
    }

    /// Resolve the relation an atom refers to. Atoms rewritten to variant
    /// names fall back to a bare schema; the fully specified entry has
    /// normally been registered by the stratum's `Create` statements first.
    pub(crate) fn translate_atom_relation(&mut self, atom: &Atom) -> String {
        let program = self.program;
        if let Some(relation) = program.relation(&atom.name) {
            self.translate_relation(relation, RelationVariant::Base)
        } else {
            self.ram
                .add_relation(RamRelation::new(atom.name.clone(), atom.arity()));
            atom.name.clone()
        }
    }

    /// Variant shorthand used throughout the orchestrators.
    pub(crate) fn variant_name(&mut self, relation: &Relation, variant: RelationVariant) -> String {
        self.translate_relation(relation, variant)
    }

    /// Number of trailing height-parameter columns for an atom's relation;
    /// zero for variant probes without a declaration.
    pub(crate) fn number_of_heights(&self, atom: &Atom) -> usize {
        self.program
            .relation(&atom.name)
            .map(|rel| rel.height_parameters)
            .unwrap_or(0)
    }

    /// Finished program.
    pub fn into_ram(self) -> RamProgram {
        self.ram
    }
}

/// Assign names to unnamed variables inside the positive atoms of a clause
/// so that cloned guard atoms keep variable identity across copies.
pub(crate) fn name_unnamed_variables(clause: &mut Clause) {
    let mut counter = 0usize;
    for atom in clause.atoms_mut() {
        for arg in &mut atom.arguments {
            name_unnamed_in_argument(arg, &mut counter);
        }
    }
}

fn name_unnamed_in_argument(argument: &mut Argument, counter: &mut usize) {
    match argument {
        Argument::UnnamedVariable => {
            *counter += 1;
            *argument = Argument::Variable(format!(" _unnamed_var{}", counter));
        }
        Argument::Record(RecordInit { arguments })
        | Argument::IntrinsicFunctor { arguments, .. }
        | Argument::UserDefinedFunctor { arguments, .. } => {
            for arg in arguments {
                name_unnamed_in_argument(arg, counter);
            }
        }
        Argument::Aggregator(Aggregator { target, .. }) => {
            // Aggregate bodies keep their wildcards; only the target
            // expression participates in outer bindings.
            if let Some(target) = target {
                name_unnamed_in_argument(target, counter);
            }
        }
        _ => {}
    }
}

/// Wrap a compiled rule with debug info and, under profiling, a relation
/// timer. `timer_relation` is the relation whose growth the timer samples.
pub(crate) fn wrap_rule(
    config: &Config,
    rule: RamStatement,
    timer_message: String,
    timer_relation: &str,
    clause_text: &str,
    src_loc: &datalog_ast::SrcLocation,
) -> RamStatement {
    let mut rule = rule;
    if config.profile {
        rule = RamStatement::LogRelationTimer {
            body: Box::new(rule),
            message: timer_message,
            relation: timer_relation.to_string(),
        };
    }
    RamStatement::DebugInfo {
        body: Box::new(rule),
        message: format!("{}\nin file {}", clause_text, src_loc),
    }
}

/// Profiling log statement texts. Shapes follow the downstream profiler's
/// parser: a tag, then semicolon-separated fields.
pub(crate) mod log_statement {
    use datalog_ast::SrcLocation;

    pub fn t_nonrecursive_rule(relation: &str, loc: &SrcLocation, clause: &str) -> String {
        format!("@t-nonrecursive-rule;{};{};{};", relation, loc, clause)
    }

    pub fn n_nonrecursive_relation(relation: &str, loc: &SrcLocation) -> String {
        format!("@n-nonrecursive-relation;{};{};", relation, loc)
    }

    pub fn t_nonrecursive_relation(relation: &str, loc: &SrcLocation) -> String {
        format!("@t-nonrecursive-relation;{};{};", relation, loc)
    }

    pub fn t_recursive_rule(
        relation: &str,
        version: usize,
        loc: &SrcLocation,
        clause: &str,
    ) -> String {
        format!("@t-recursive-rule;{};{};{};{};", relation, version, loc, clause)
    }

    pub fn t_recursive_relation(relation: &str, loc: &SrcLocation) -> String {
        format!("@t-recursive-relation;{};{};", relation, loc)
    }

    pub fn c_recursive_relation(relation: &str, loc: &SrcLocation) -> String {
        format!("@c-recursive-relation;{};{};", relation, loc)
    }

    pub fn t_relation_load_time(relation: &str, loc: &SrcLocation) -> String {
        format!("@t-relation-load-time;{};{};", relation, loc)
    }

    pub fn t_relation_save_time(relation: &str, loc: &SrcLocation) -> String {
        format!("@t-relation-save-time;{};{};", relation, loc)
    }

    pub fn runtime() -> String {
        "@runtime;".to_string()
    }
}
