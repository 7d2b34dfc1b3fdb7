//! # Incremental Annotator
//!
//! AST rewrite preparing a program for incremental view maintenance.
//!
//! Every relation schema and every body atom is extended with three
//! annotation columns:
//!
//! ```text
//! (@iteration, @prev_count, @current_count)
//! ```
//!
//! `@iteration` records the semi-naive iteration a tuple was derived in;
//! the two counts carry the tuple's multiplicity in the previous and the
//! current epoch. A tuple exists in an epoch iff its count there is
//! positive.
//!
//! Each original rule is then expanded into a family of update rules whose
//! joint fixpoint maintains the materialization after fact insertions and
//! deletions:
//!
//! | head `(prev, cur)` | category  | fires when                            |
//! |--------------------|-----------|---------------------------------------|
//! | `(0, 1)`           | insertion | all body counts positive, some body tuple newly true |
//! | `(1, -1)`          | deletion  | all body tuples previously true, some body count gone non-positive |
//! | `(1, 1)`           | generation| body already stable in this epoch     |
//!
//! The update clauses land on the program; the generation clause replaces
//! the original rule on its relation. Facts simply gain `(0, 0, 1)`.
//!
//! ## Pipeline Position
//!
//! ```text
//! typed AST -> [Incremental Annotator] -> annotated AST -> translator
//! ```

use crate::analysis::{RecursiveClauses, SccGraph};
use datalog_ast::{
    Aggregator, Argument, Atom, Attribute, BinaryConstraintOp, Clause, FunctorOp, Literal, Program,
};
use log::debug;

/// Names of the three annotation columns, in schema order.
pub const ITERATION_COLUMN: &str = "@iteration";
pub const PREV_COUNT_COLUMN: &str = "@prev_count";
pub const CURRENT_COUNT_COLUMN: &str = "@current_count";

/// Number of annotation columns appended to every relation and atom.
pub const ANNOTATION_ARITY: usize = 3;

/// Combine a list of arguments with a binary functor, left to right.
/// Empty lists collapse to `0`, singletons pass through.
fn fold_functor(arguments: Vec<Argument>, op: FunctorOp) -> Argument {
    let mut iter = arguments.into_iter();
    let Some(first) = iter.next() else {
        return Argument::NumberConstant(0);
    };
    iter.fold(first, |combined, arg| Argument::IntrinsicFunctor {
        op,
        arguments: vec![combined, arg],
    })
}

/// `IterationNumber - 1`.
fn previous_iteration() -> Argument {
    Argument::IntrinsicFunctor {
        op: FunctorOp::Sub,
        arguments: vec![Argument::IterationNumber, Argument::NumberConstant(1)],
    }
}

/// Append unnamed-variable padding for the annotation columns to every atom
/// nested inside arguments or negations. Top-level body atoms get named
/// annotation variables instead.
fn pad_nested_atoms_in_literal(literal: &mut Literal) {
    match literal {
        Literal::Atom(atom) => pad_nested_atoms_in_arguments(&mut atom.arguments),
        Literal::Negation(atom)
        | Literal::PositiveNegation(atom)
        | Literal::SubsumptionNegation { atom, .. }
        | Literal::ExistenceCheck(atom) => pad_atom(atom),
        Literal::BinaryConstraint { lhs, rhs, .. } => {
            pad_nested_atoms_in_argument(lhs);
            pad_nested_atoms_in_argument(rhs);
        }
        Literal::Conjunction(lhs, rhs) | Literal::Disjunction(lhs, rhs) => {
            pad_nested_atoms_in_literal(lhs);
            pad_nested_atoms_in_literal(rhs);
        }
    }
}

fn pad_atom(atom: &mut Atom) {
    pad_nested_atoms_in_arguments(&mut atom.arguments);
    for _ in 0..ANNOTATION_ARITY {
        atom.add_argument(Argument::UnnamedVariable);
    }
}

fn pad_nested_atoms_in_arguments(arguments: &mut [Argument]) {
    for arg in arguments {
        pad_nested_atoms_in_argument(arg);
    }
}

fn pad_nested_atoms_in_argument(argument: &mut Argument) {
    match argument {
        Argument::Record(record) => pad_nested_atoms_in_arguments(&mut record.arguments),
        Argument::IntrinsicFunctor { arguments, .. }
        | Argument::UserDefinedFunctor { arguments, .. } => {
            pad_nested_atoms_in_arguments(arguments)
        }
        Argument::Aggregator(Aggregator { body, .. }) => {
            for lit in body.iter_mut() {
                match lit {
                    Literal::Atom(atom) => pad_atom(atom),
                    other => pad_nested_atoms_in_literal(other),
                }
            }
        }
        _ => {}
    }
}

/// Per-clause instrumentation state collected while annotating body atoms.
struct BodyAnnotations {
    /// `@iteration_i` for body atoms in the head's SCC.
    levels: Vec<Argument>,
    /// `@prev_count_i` for every body atom.
    prev_counts: Vec<Argument>,
    /// `@current_count_i` for every body atom.
    current_counts: Vec<Argument>,
}

/// The annotator itself. Holds the analyses it consults; the rewrite is
/// `transform`.
pub struct IncrementalAnnotator<'a> {
    scc_graph: &'a SccGraph,
    recursive_clauses: &'a RecursiveClauses<'a>,
}

impl<'a> IncrementalAnnotator<'a> {
    pub fn new(scc_graph: &'a SccGraph, recursive_clauses: &'a RecursiveClauses<'a>) -> Self {
        IncrementalAnnotator {
            scc_graph,
            recursive_clauses,
        }
    }

    /// Annotate body atoms of `clause` in place and collect the variables
    /// needed to build head arguments and guards.
    fn annotate_body(&self, clause: &mut Clause, head: &Atom) -> BodyAnnotations {
        let mut annotations = BodyAnnotations {
            levels: Vec::new(),
            prev_counts: Vec::new(),
            current_counts: Vec::new(),
        };

        for (i, literal) in clause.body.iter_mut().enumerate() {
            pad_nested_atoms_in_literal(literal);

            if let Literal::Atom(atom) = literal {
                let iteration = format!("@iteration_{}", i);
                let prev_count = format!("@prev_count_{}", i);
                let current_count = format!("@current_count_{}", i);
                atom.add_argument(Argument::Variable(iteration.clone()));
                atom.add_argument(Argument::Variable(prev_count.clone()));
                atom.add_argument(Argument::Variable(current_count.clone()));

                if self.scc_graph.same_scc(head, atom) {
                    annotations.levels.push(Argument::Variable(iteration));
                }
                annotations
                    .prev_counts
                    .push(Argument::Variable(prev_count));
                annotations
                    .current_counts
                    .push(Argument::Variable(current_count));
            }
        }
        annotations
    }

    /// Head iteration argument: counted inside the SCC for recursive
    /// clauses, constant zero otherwise.
    fn head_iteration(&self, original: &Clause) -> Argument {
        if self.recursive_clauses.recursive(original) {
            Argument::IterationNumber
        } else {
            Argument::NumberConstant(0)
        }
    }

    /// Constraint that at least one body atom was derived in the previous
    /// iteration. Only meaningful when the clause joins same-SCC atoms.
    fn add_iteration_pivot(&self, clause: &mut Clause, levels: &[Argument]) {
        if !levels.is_empty() {
            clause.add_to_body(Literal::BinaryConstraint {
                op: BinaryConstraintOp::Eq,
                lhs: fold_functor(levels.to_vec(), FunctorOp::Max),
                rhs: previous_iteration(),
            });
        }
    }

    /// Deletion variant: body tuples all existed before, at least one count
    /// has gone non-positive, head count decremented.
    fn make_negative_update_clause(&self, original: &Clause) -> Clause {
        let mut clause = original.clone();
        let head = original.head.clone();
        let annotations = self.annotate_body(&mut clause, &head);

        clause.head.add_argument(self.head_iteration(original));
        clause.head.add_argument(Argument::NumberConstant(1));
        clause.head.add_argument(Argument::NumberConstant(-1));

        clause.add_to_body(Literal::BinaryConstraint {
            op: BinaryConstraintOp::Gt,
            lhs: fold_functor(annotations.prev_counts.clone(), FunctorOp::Min),
            rhs: Argument::NumberConstant(0),
        });
        self.add_iteration_pivot(&mut clause, &annotations.levels);
        clause.add_to_body(Literal::BinaryConstraint {
            op: BinaryConstraintOp::Le,
            lhs: fold_functor(annotations.current_counts, FunctorOp::Min),
            rhs: Argument::NumberConstant(0),
        });
        clause
    }

    /// Insertion variant: body tuples all currently true, at least one was
    /// absent before, head count incremented.
    fn make_positive_update_clause(&self, original: &Clause) -> Clause {
        let mut clause = original.clone();
        let head = original.head.clone();
        let annotations = self.annotate_body(&mut clause, &head);

        clause.head.add_argument(self.head_iteration(original));
        clause.head.add_argument(Argument::NumberConstant(0));
        clause.head.add_argument(Argument::NumberConstant(1));

        clause.add_to_body(Literal::BinaryConstraint {
            op: BinaryConstraintOp::Gt,
            lhs: fold_functor(annotations.current_counts.clone(), FunctorOp::Min),
            rhs: Argument::NumberConstant(0),
        });
        self.add_iteration_pivot(&mut clause, &annotations.levels);
        clause.add_to_body(Literal::BinaryConstraint {
            op: BinaryConstraintOp::Le,
            lhs: fold_functor(annotations.prev_counts, FunctorOp::Min),
            rhs: Argument::NumberConstant(0),
        });
        clause
    }

    /// Generation variant: the body stabilized earlier in this epoch; the
    /// head tuple should exist in both epochs. Propagates inside the SCC
    /// fixpoint only.
    fn make_positive_generation_clause(&self, original: &Clause) -> Clause {
        let mut clause = original.clone();
        let head = original.head.clone();
        let annotations = self.annotate_body(&mut clause, &head);

        clause.head.add_argument(self.head_iteration(original));
        clause.head.add_argument(Argument::NumberConstant(1));
        clause.head.add_argument(Argument::NumberConstant(1));

        clause.add_to_body(Literal::BinaryConstraint {
            op: BinaryConstraintOp::Gt,
            lhs: fold_functor(annotations.current_counts, FunctorOp::Min),
            rhs: Argument::NumberConstant(0),
        });
        self.add_iteration_pivot(&mut clause, &annotations.levels);
        clause
    }

    /// Rewrite the whole program in place.
    pub fn transform(&self, program: &mut Program) {
        debug!("incremental annotation, before:\n{}", program);

        for relation in &mut program.relations {
            relation.add_attribute(Attribute::new(ITERATION_COLUMN, "number"));
            relation.add_attribute(Attribute::new(PREV_COUNT_COLUMN, "number"));
            relation.add_attribute(Attribute::new(CURRENT_COUNT_COLUMN, "number"));
        }

        for index in 0..program.relations.len() {
            let clauses = std::mem::take(&mut program.relations[index].clauses);
            let mut rewritten = Vec::with_capacity(clauses.len() * 3);

            for mut clause in clauses {
                pad_nested_atoms_in_arguments(&mut clause.head.arguments);

                if clause.is_fact() {
                    clause.head.add_argument(Argument::NumberConstant(0));
                    clause.head.add_argument(Argument::NumberConstant(0));
                    clause.head.add_argument(Argument::NumberConstant(1));
                    rewritten.push(clause);
                } else {
                    rewritten.push(self.make_negative_update_clause(&clause));
                    rewritten.push(self.make_positive_update_clause(&clause));
                    rewritten.push(self.make_positive_generation_clause(&clause));
                }
            }
            program.relations[index].clauses = rewritten;
        }

        debug!("incremental annotation, after:\n{}", program);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{RecursiveClauses, SccGraph};
    use datalog_ast::builders::{AtomBuilder, ClauseBuilder};
    use datalog_ast::{Attribute, Program, Relation};

    fn annotated_tc() -> Program {
        let columns = || vec![Attribute::new("x", "number"), Attribute::new("y", "number")];
        let mut program = Program::new();
        let mut edge = Relation::new("edge", columns());
        edge.is_input = true;
        program.add_relation(edge);
        let mut tc = Relation::new("tc", columns());
        tc.add_clause(
            ClauseBuilder::new(AtomBuilder::new("tc").var("x").var("y").build())
                .atom(AtomBuilder::new("edge").var("x").var("y").build())
                .build(),
        );
        tc.add_clause(
            ClauseBuilder::new(AtomBuilder::new("tc").var("x").var("y").build())
                .atom(AtomBuilder::new("edge").var("x").var("z").build())
                .atom(AtomBuilder::new("tc").var("z").var("y").build())
                .build(),
        );
        program.add_relation(tc);

        let scc_graph = SccGraph::build(&program);
        let recursive = RecursiveClauses::new(&scc_graph);
        IncrementalAnnotator::new(&scc_graph, &recursive).transform(&mut program);
        program
    }

    #[test]
    fn relations_gain_three_columns() {
        let program = annotated_tc();
        for relation in &program.relations {
            assert_eq!(relation.arity(), 5);
            let names = relation.attribute_names();
            assert_eq!(&names[2..], &["@iteration", "@prev_count", "@current_count"]);
        }
    }

    #[test]
    fn each_rule_expands_to_three_clauses() {
        let program = annotated_tc();
        let tc = program.relation("tc").unwrap();
        // Two original clauses, each expanded into deletion + insertion +
        // generation.
        assert_eq!(tc.clauses.len(), 6);
    }

    #[test]
    fn body_atoms_carry_annotation_variables() {
        let program = annotated_tc();
        let clause = &program.relation("tc").unwrap().clauses[0];
        let atom = clause.atoms()[0];
        assert_eq!(atom.arity(), 5);
        assert_eq!(atom.arguments[2].as_variable(), Some("@iteration_0"));
        assert_eq!(atom.arguments[3].as_variable(), Some("@prev_count_0"));
        assert_eq!(atom.arguments[4].as_variable(), Some("@current_count_0"));
    }

    #[test]
    fn head_count_pairs_follow_category() {
        let program = annotated_tc();
        let clauses = &program.relation("tc").unwrap().clauses;
        // deletion, insertion, generation for the first original clause
        let tail =
            |clause: &Clause| -> Vec<Option<i64>> {
                let n = clause.head.arity();
                clause.head.arguments[n - 2..]
                    .iter()
                    .map(Argument::as_number)
                    .collect()
            };
        assert_eq!(tail(&clauses[0]), vec![Some(1), Some(-1)]);
        assert_eq!(tail(&clauses[1]), vec![Some(0), Some(1)]);
        assert_eq!(tail(&clauses[2]), vec![Some(1), Some(1)]);
    }

    #[test]
    fn recursive_clause_heads_use_iteration_number() {
        let program = annotated_tc();
        let clauses = &program.relation("tc").unwrap().clauses;
        // Clauses 3..6 come from the recursive step rule.
        let iteration_arg = |clause: &Clause| {
            let n = clause.head.arity();
            clause.head.arguments[n - 3].clone()
        };
        assert_eq!(iteration_arg(&clauses[0]), Argument::NumberConstant(0));
        assert_eq!(iteration_arg(&clauses[3]), Argument::IterationNumber);
    }

    #[test]
    fn facts_get_zero_zero_one() {
        let mut program = Program::new();
        let mut edge = Relation::new(
            "edge",
            vec![Attribute::new("x", "number"), Attribute::new("y", "number")],
        );
        edge.add_clause(Clause::fact(
            AtomBuilder::new("edge").number(1).number(2).build(),
        ));
        program.add_relation(edge);

        let scc_graph = SccGraph::build(&program);
        let recursive = RecursiveClauses::new(&scc_graph);
        IncrementalAnnotator::new(&scc_graph, &recursive).transform(&mut program);

        let fact = &program.relation("edge").unwrap().clauses[0];
        assert!(fact.is_fact());
        let args: Vec<Option<i64>> = fact.head.arguments[2..]
            .iter()
            .map(Argument::as_number)
            .collect();
        assert_eq!(args, vec![Some(0), Some(0), Some(1)]);
    }

    #[test]
    fn negation_atoms_get_unnamed_padding() {
        let mut program = Program::new();
        let columns = || vec![Attribute::new("x", "number")];
        program.add_relation(Relation::new("q", columns()));
        program.add_relation(Relation::new("r", columns()));
        let mut p = Relation::new("p", columns());
        p.add_clause(
            ClauseBuilder::new(AtomBuilder::new("p").var("x").build())
                .atom(AtomBuilder::new("q").var("x").build())
                .negation(AtomBuilder::new("r").var("x").build())
                .build(),
        );
        program.add_relation(p);

        let scc_graph = SccGraph::build(&program);
        let recursive = RecursiveClauses::new(&scc_graph);
        IncrementalAnnotator::new(&scc_graph, &recursive).transform(&mut program);

        let clause = &program.relation("p").unwrap().clauses[0];
        let negated = clause.negations()[0];
        assert_eq!(negated.arity(), 4);
        assert!(negated.arguments[1..].iter().all(Argument::is_unnamed));
    }
}
