//! Recursive SCC compilation.
//!
//! Emits, for one strongly connected component, the semi-naive fixpoint:
//!
//! ```text
//! preamble   seed delta/applied/count variants, non-recursive rules,
//!            max-iteration singleton
//! loop:
//!   parallel per-relation rule bodies (delta-pivot clause versions)
//!   clear    per-iteration delta variants
//!   exit     when nothing new was derived (and, incrementally, the
//!            previous epoch's iterations are exhausted)
//!   update   merge/swap/clear schedule moving new rows into the stable
//!            and delta variants
//! postamble  drop SCC-scoped variants
//! ```
//!
//! Under incremental mode the loop body carries insertion, deletion, and
//! re-derivation clause versions; each joins exactly one delta variant and
//! simulates the delta for later same-SCC atoms with an iteration bound
//! (`@iteration_k < iteration() - 1`) instead of materializing more
//! variants.

use super::clause::ClauseTranslator;
use super::naming::RelationVariant;
use super::non_recursive::{set_annotation_args, UpdateCategory};
use super::{log_statement, name_unnamed_variables, wrap_rule, AstTranslator};
use crate::error::Result;
use crate::ram::{
    AggregateFunction, RamCondition, RamExpression, RamOperation, RamRelation, RamStatement,
};
use datalog_ast::{
    Argument, Atom, BinaryConstraintOp, Clause, FunctorOp, Literal, Relation,
    RelationRepresentation,
};
use log::{debug, warn};

/// `iteration() - 1` as an AST argument.
fn previous_iteration() -> Argument {
    Argument::IntrinsicFunctor {
        op: FunctorOp::Sub,
        arguments: vec![Argument::IterationNumber, Argument::NumberConstant(1)],
    }
}

/// How the delta pivot rewrites the positive atoms of an update rule.
#[derive(Clone, Copy)]
enum DeltaChoice {
    /// Insertion rule with count pivot at `pivot`.
    Insertion { pivot: usize },
    /// Deletion rule with count pivot at `pivot`.
    Deletion { pivot: usize },
    /// Every delta pivot uses the same variant (negation mirrors and
    /// re-derivation).
    Uniform(RelationVariant),
}

impl DeltaChoice {
    fn variant_for(self, j: usize) -> RelationVariant {
        match self {
            DeltaChoice::Insertion { pivot } => {
                if j == pivot {
                    RelationVariant::DeltaDiffPlusCount
                } else {
                    RelationVariant::DeltaDiffApplied
                }
            }
            DeltaChoice::Deletion { pivot } => {
                if j < pivot {
                    RelationVariant::Delta
                } else if j == pivot {
                    RelationVariant::DeltaDiffMinusCount
                } else {
                    RelationVariant::DeltaDiffMinusApplied
                }
            }
            DeltaChoice::Uniform(variant) => variant,
        }
    }
}

impl AstTranslator<'_> {
    /// Compile one recursive SCC into its fixpoint statement.
    pub(crate) fn translate_recursive_relation(
        &mut self,
        scc: usize,
    ) -> Result<Option<RamStatement>> {
        let program = self.program;
        let scc_graph = self.scc_graph;
        let members: Vec<&Relation> = scc_graph
            .internal_relations(scc)
            .iter()
            .filter_map(|name| program.relation(name))
            .collect();
        let incremental = self.config.incremental;

        let mut preamble: Option<RamStatement> = None;
        let mut clear_table: Vec<RamStatement> = Vec::new();
        let mut update_table: Vec<RamStatement> = Vec::new();
        let mut postamble: Option<RamStatement> = None;

        for &rel in &members {
            let base = self.variant_name(rel, RelationVariant::Base);
            let delta = self.variant_name(rel, RelationVariant::Delta);
            let new = self.variant_name(rel, RelationVariant::New);

            let mut update_rel = Some(RamStatement::Sequence(vec![
                RamStatement::Merge {
                    target: base.clone(),
                    source: new.clone(),
                },
                RamStatement::Swap {
                    first: delta.clone(),
                    second: new.clone(),
                },
                RamStatement::Clear {
                    relation: new.clone(),
                },
            ]));

            if incremental {
                clear_table.push(self.iteration_clear_block(rel));
                RamStatement::append(&mut update_rel, self.iteration_update_block(rel));
            }

            if self.config.profile {
                update_rel = update_rel.map(|body| RamStatement::LogRelationTimer {
                    body: Box::new(body),
                    message: log_statement::c_recursive_relation(&rel.name, &Default::default()),
                    relation: new.clone(),
                });
            }

            RamStatement::append(
                &mut postamble,
                RamStatement::Sequence(vec![
                    RamStatement::Drop {
                        relation: delta.clone(),
                    },
                    RamStatement::Drop {
                        relation: new.clone(),
                    },
                ]),
            );
            if incremental {
                let drops = [
                    RelationVariant::PreviousIndexed,
                    RelationVariant::TempDeltaDiffApplied,
                    RelationVariant::DeltaDiffApplied,
                    RelationVariant::DeltaDiffMinusApplied,
                    RelationVariant::DeltaDiffPlusCount,
                    RelationVariant::DeltaDiffMinusCount,
                    RelationVariant::NewDiffPlus,
                    RelationVariant::NewDiffMinus,
                ]
                .iter()
                .map(|&variant| RamStatement::Drop {
                    relation: self.variant_name(rel, variant),
                })
                .collect();
                RamStatement::append(&mut postamble, RamStatement::Sequence(drops));
            }

            // Non-recursive rules of the relation seed the fixpoint.
            if let Some(stmt) = self.translate_non_recursive_relation(rel)? {
                RamStatement::append(&mut preamble, stmt);
            }

            if incremental {
                for stmt in self.incremental_preamble_block(rel) {
                    RamStatement::append(&mut preamble, stmt);
                }
            }

            // Classic semi-naive delta seed.
            RamStatement::append(
                &mut preamble,
                RamStatement::Merge {
                    target: delta,
                    source: base,
                },
            );

            update_table.push(update_rel.expect("update table built above"));
        }

        // Singleton relation holding the maximum iteration over the SCC's
        // relations; the exit subroutine consults it so a shrunken epoch
        // still replays every iteration of the previous one.
        let max_iter_name = format!("scc_{}_@max_iter", scc);
        if incremental {
            self.ram.add_relation(RamRelation {
                name: max_iter_name.clone(),
                arity: 1,
                height_parameters: 1,
                attribute_names: vec!["max_iter".to_string()],
                attribute_types: vec!["s".to_string()],
                representation: RelationRepresentation::Default,
            });
            RamStatement::append(
                &mut preamble,
                RamStatement::Create {
                    relation: max_iter_name.clone(),
                },
            );
            RamStatement::append(&mut preamble, self.max_iteration_query(&members, &max_iter_name));
        }

        // --- loop body, parallel over SCC members ---
        let mut loop_seq: Vec<RamStatement> = Vec::new();
        for &rel in &members {
            let mut loop_rel: Option<RamStatement> = None;

            for clause in &rel.clauses {
                if !self.recursive_clauses.recursive(clause) {
                    continue;
                }
                let mut version = 0usize;
                if incremental {
                    self.compile_incremental_loop_clause(scc, rel, clause, &mut loop_rel, &mut version)?;
                } else {
                    self.compile_classic_loop_clause(scc, rel, clause, &mut loop_rel, &mut version)?;
                }
            }

            let Some(mut body) = loop_rel else { continue };
            if self.config.profile {
                let new = self.variant_name(rel, RelationVariant::New);
                body = RamStatement::LogRelationTimer {
                    body: Box::new(body),
                    message: log_statement::t_recursive_relation(&rel.name, &Default::default()),
                    relation: new,
                };
            }
            loop_seq.push(body);
        }

        // --- exit condition ---
        let mut exit_cond: Option<RamCondition> = None;
        for &rel in &members {
            if incremental {
                let plus = self.variant_name(rel, RelationVariant::NewDiffPlus);
                let minus = self.variant_name(rel, RelationVariant::NewDiffMinus);
                exit_cond = Some(RamCondition::conjoin(
                    exit_cond,
                    RamCondition::EmptinessCheck { relation: plus },
                ));
                exit_cond = Some(RamCondition::conjoin(
                    exit_cond,
                    RamCondition::EmptinessCheck { relation: minus },
                ));
            } else {
                let new = self.variant_name(rel, RelationVariant::New);
                exit_cond = Some(RamCondition::conjoin(
                    exit_cond,
                    RamCondition::EmptinessCheck { relation: new },
                ));
            }
        }
        if incremental {
            let subroutine = format!("scc_{}_exit", scc);
            let body = self.make_incremental_exit_cond_subroutine(&max_iter_name);
            self.ram.add_subroutine(subroutine.clone(), body);
            exit_cond = Some(RamCondition::conjoin(
                exit_cond,
                RamCondition::SubroutineCondition {
                    name: subroutine,
                    arguments: vec![RamExpression::IterationNumber],
                },
            ));
        }

        // --- assemble ---
        let mut result: Option<RamStatement> = None;
        if let Some(preamble) = preamble {
            RamStatement::append(&mut result, preamble);
        }
        if let Some(exit_cond) = exit_cond {
            if !loop_seq.is_empty() {
                RamStatement::append(
                    &mut result,
                    RamStatement::Loop(vec![
                        RamStatement::Parallel(loop_seq),
                        RamStatement::Sequence(clear_table),
                        RamStatement::Exit {
                            condition: exit_cond,
                            exitable: true,
                        },
                        RamStatement::Sequence(update_table),
                    ]),
                );
            }
        }
        if let Some(postamble) = postamble {
            RamStatement::append(&mut result, postamble);
        }
        Ok(result)
    }

    /// Per-iteration clears of the delta variants, run before the exit
    /// check.
    fn iteration_clear_block(&mut self, rel: &Relation) -> RamStatement {
        let variants = [
            RelationVariant::Delta,
            RelationVariant::DeltaDiffApplied,
            RelationVariant::TempDeltaDiffApplied,
            RelationVariant::DeltaDiffMinusApplied,
            RelationVariant::DeltaDiffMinusCount,
            RelationVariant::DeltaDiffPlusCount,
        ];
        RamStatement::Sequence(
            variants
                .iter()
                .map(|&variant| RamStatement::Clear {
                    relation: self.variant_name(rel, variant),
                })
                .collect(),
        )
    }

    /// The iteration-boundary merge schedule. Moves this iteration's
    /// new-diff rows into the stable diffs, the applied views, the count
    /// variants, and reseeds the delta variants for the next iteration.
    fn iteration_update_block(&mut self, rel: &Relation) -> RamStatement {
        use super::naming::RelationVariant as V;
        let name = |t: &mut Self, v: V| t.variant_name(rel, v);

        let delta = name(self, V::Delta);
        let previous_indexed = name(self, V::PreviousIndexed);
        let diff_minus = name(self, V::DiffMinus);
        let diff_plus = name(self, V::DiffPlus);
        let new_diff_minus = name(self, V::NewDiffMinus);
        let new_diff_plus = name(self, V::NewDiffPlus);
        let diff_minus_applied = name(self, V::DiffMinusApplied);
        let diff_plus_applied = name(self, V::DiffPlusApplied);
        let diff_applied = name(self, V::DiffApplied);
        let diff_minus_count = name(self, V::DiffMinusCount);
        let diff_plus_count = name(self, V::DiffPlusCount);
        let delta_diff_applied = name(self, V::DeltaDiffApplied);
        let delta_diff_minus_applied = name(self, V::DeltaDiffMinusApplied);
        let delta_diff_minus_count = name(self, V::DeltaDiffMinusCount);
        let delta_diff_plus_count = name(self, V::DeltaDiffPlusCount);

        let merge = |target: &str, source: &str| RamStatement::Merge {
            target: target.to_string(),
            source: source.to_string(),
        };
        let semi = |target: &str, source: &str, restriction: Option<&str>| RamStatement::SemiMerge {
            target: target.to_string(),
            source: source.to_string(),
            restriction: restriction.map(str::to_string),
        };

        RamStatement::Sequence(vec![
            RamStatement::PositiveMerge {
                target: delta.clone(),
                source: previous_indexed,
            },
            merge(&diff_minus, &new_diff_minus),
            merge(&diff_plus, &new_diff_plus),
            merge(&diff_minus_applied, &new_diff_minus),
            merge(&diff_plus_applied, &new_diff_plus),
            merge(&diff_applied, &new_diff_minus),
            merge(&diff_applied, &new_diff_plus),
            merge(&diff_plus_count, &new_diff_plus),
            semi(&diff_plus_count, &delta, Some(&new_diff_plus)),
            merge(&diff_plus_count, &new_diff_minus),
            merge(&diff_minus_count, &new_diff_minus),
            semi(&diff_minus_count, &delta, Some(&new_diff_minus)),
            merge(&diff_minus_count, &new_diff_plus),
            semi(&delta_diff_applied, &delta, Some(&diff_applied)),
            merge(&delta_diff_applied, &new_diff_minus),
            merge(&delta_diff_applied, &new_diff_plus),
            merge(&delta_diff_minus_applied, &delta),
            merge(&delta_diff_minus_applied, &new_diff_minus),
            merge(&delta_diff_plus_count, &new_diff_plus),
            semi(&delta_diff_plus_count, &diff_minus_applied, None),
            merge(&delta_diff_minus_count, &new_diff_minus),
            semi(&delta_diff_minus_count, &diff_plus_applied, None),
            RamStatement::Clear {
                relation: new_diff_minus,
            },
            RamStatement::Clear {
                relation: new_diff_plus,
            },
        ])
    }

    /// Preamble seeding of one member's variants from the epoch's diffs.
    fn incremental_preamble_block(&mut self, rel: &Relation) -> Vec<RamStatement> {
        use super::naming::RelationVariant as V;
        let name = |t: &mut Self, v: V| t.variant_name(rel, v);

        let base = name(self, V::Base);
        let delta = name(self, V::Delta);
        let previous_indexed = name(self, V::PreviousIndexed);
        let diff_minus = name(self, V::DiffMinus);
        let diff_plus = name(self, V::DiffPlus);
        let diff_minus_applied = name(self, V::DiffMinusApplied);
        let diff_plus_applied = name(self, V::DiffPlusApplied);
        let diff_applied = name(self, V::DiffApplied);
        let diff_minus_count = name(self, V::DiffMinusCount);
        let diff_plus_count = name(self, V::DiffPlusCount);
        let delta_diff_applied = name(self, V::DeltaDiffApplied);
        let delta_diff_minus_applied = name(self, V::DeltaDiffMinusApplied);
        let delta_diff_minus_count = name(self, V::DeltaDiffMinusCount);
        let delta_diff_plus_count = name(self, V::DeltaDiffPlusCount);

        let merge = |target: &str, source: &str| RamStatement::Merge {
            target: target.to_string(),
            source: source.to_string(),
        };
        let semi = |target: &str, source: &str| RamStatement::SemiMerge {
            target: target.to_string(),
            source: source.to_string(),
            restriction: None,
        };

        vec![
            // Freeze the previous epoch into an indexable copy, then seed
            // the delta with its live rows.
            merge(&previous_indexed, &base),
            RamStatement::PositiveMerge {
                target: delta.clone(),
                source: previous_indexed,
            },
            merge(&delta_diff_minus_applied, &delta),
            merge(&delta_diff_minus_applied, &diff_minus),
            merge(&diff_applied, &base),
            merge(&diff_applied, &diff_minus),
            merge(&diff_applied, &diff_plus),
            merge(&diff_minus_applied, &base),
            merge(&diff_minus_applied, &diff_minus),
            merge(&diff_plus_applied, &base),
            merge(&diff_plus_applied, &diff_plus),
            merge(&delta_diff_applied, &diff_applied),
            merge(&diff_plus_count, &diff_plus),
            semi(&diff_plus_count, &diff_minus_applied),
            merge(&diff_minus_count, &diff_minus),
            semi(&diff_minus_count, &diff_plus_applied),
            merge(&delta_diff_plus_count, &diff_plus),
            semi(&delta_diff_plus_count, &diff_minus_applied),
            merge(&delta_diff_minus_count, &diff_minus),
            semi(&delta_diff_minus_count, &diff_plus_applied),
        ]
    }

    /// Populate the max-iteration singleton: an outer MAX over per-relation
    /// MAX aggregates of the iteration column.
    fn max_iteration_query(&mut self, members: &[&Relation], max_iter_name: &str) -> RamStatement {
        let per_member: Vec<RamExpression> = (0..members.len())
            .map(|ident| RamExpression::TupleElement {
                level: ident,
                column: 0,
            })
            .collect();
        let combined = RamExpression::IntrinsicOp {
            op: FunctorOp::Max,
            arguments: per_member,
        };

        let mut op = RamOperation::Project {
            relation: max_iter_name.to_string(),
            values: vec![combined],
        };
        for (ident, &rel) in members.iter().enumerate() {
            let base = self.variant_name(rel, RelationVariant::Base);
            op = RamOperation::Aggregate {
                body: Box::new(op),
                function: AggregateFunction::Max,
                relation: base,
                expression: RamExpression::TupleElement {
                    level: ident,
                    column: rel.arity() - 3,
                },
                condition: RamCondition::True,
                level: ident,
            };
        }
        RamStatement::Query(op)
    }

    // ------------------------------------------------------------------
    // Loop-body rules
    // ------------------------------------------------------------------

    fn compile_incremental_loop_clause(
        &mut self,
        scc: usize,
        rel: &Relation,
        clause: &Clause,
        loop_rel: &mut Option<RamStatement>,
        version: &mut usize,
    ) -> Result<()> {
        let Some(category) = UpdateCategory::of(clause, rel.arity()) else {
            warn!(
                "count annotations are not initialized, skipping rule: {}",
                clause
            );
            return Ok(());
        };

        let mut clause = clause.clone();
        name_unnamed_variables(&mut clause);
        let atoms: Vec<Atom> = clause.atoms().into_iter().cloned().collect();
        let negations: Vec<Atom> = clause.negations().into_iter().cloned().collect();

        match category {
            UpdateCategory::Rederivation => {
                let rdiff = self.build_rederivation_rule(rel, &clause, &atoms, &negations)?;
                self.emit_delta_versions(
                    scc,
                    rel,
                    &rdiff,
                    &atoms,
                    DeltaChoice::Uniform(RelationVariant::DeltaDiffApplied),
                    true,
                    loop_rel,
                    version,
                )?;
            }
            UpdateCategory::Insertion => {
                for i in 0..atoms.len() {
                    let rdiff =
                        self.build_insertion_rule(rel, &clause, &atoms, &negations, i, true)?;
                    self.emit_delta_versions(
                        scc,
                        rel,
                        &rdiff,
                        &atoms,
                        DeltaChoice::Insertion { pivot: i },
                        false,
                        loop_rel,
                        version,
                    )?;
                }
                for i in 0..negations.len() {
                    let rdiff = self.build_insertion_negation_mirror(
                        rel, &clause, &atoms, &negations, i, true,
                    )?;
                    self.emit_delta_versions(
                        scc,
                        rel,
                        &rdiff,
                        &atoms,
                        DeltaChoice::Uniform(RelationVariant::DeltaDiffApplied),
                        false,
                        loop_rel,
                        version,
                    )?;
                }
            }
            UpdateCategory::Deletion => {
                for i in 0..atoms.len() {
                    let rdiff =
                        self.build_deletion_rule(rel, &clause, &atoms, &negations, i, true)?;
                    self.emit_delta_versions(
                        scc,
                        rel,
                        &rdiff,
                        &atoms,
                        DeltaChoice::Deletion { pivot: i },
                        false,
                        loop_rel,
                        version,
                    )?;
                }
                for i in 0..negations.len() {
                    let rdiff = self.build_deletion_negation_mirror(
                        rel, &clause, &atoms, &negations, i, true,
                    )?;
                    self.emit_delta_versions(
                        scc,
                        rel,
                        &rdiff,
                        &atoms,
                        DeltaChoice::Uniform(RelationVariant::Delta),
                        false,
                        loop_rel,
                        version,
                    )?;
                }
            }
        }
        Ok(())
    }

    /// Re-derivation: the head tuple was just deleted but an alternative
    /// derivation from the previous epoch still supports it.
    fn build_rederivation_rule(
        &mut self,
        rel: &Relation,
        clause: &Clause,
        atoms: &[Atom],
        negations: &[Atom],
    ) -> Result<Clause> {
        let mut rdiff = clause.clone();
        rdiff.head.name = self.variant_name(rel, RelationVariant::NewDiffPlus);

        for j in 0..atoms.len() {
            self.set_atom_variant(&mut rdiff, j, RelationVariant::DiffApplied);
        }

        // Every body tuple must have existed in the previous epoch.
        for atom in atoms {
            let mut existed = atom.clone();
            existed.name = self.atom_variant_name(atom, RelationVariant::Base);
            set_annotation_args(
                &mut existed,
                None,
                Some(Argument::UnnamedVariable),
                Some(Argument::NumberConstant(1)),
            );
            rdiff.add_to_body(Literal::ExistenceCheck(existed));
        }

        // Do not re-derive tuples this epoch already discovered.
        let mut applied_head = clause.head.clone();
        applied_head.name = self.variant_name(rel, RelationVariant::DiffApplied);
        rdiff.add_to_body(Literal::SubsumptionNegation {
            atom: applied_head,
            subsumption_fields: 1,
        });

        // Fire only for heads that were just deleted.
        let mut deleted = clause.head.clone();
        deleted.name = self.variant_name(rel, RelationVariant::DiffMinusCount);
        set_annotation_args(
            &mut deleted,
            Some(Argument::UnnamedVariable),
            Some(Argument::UnnamedVariable),
            Some(Argument::Variable("@deleted_count".to_string())),
        );
        rdiff.add_to_body(Literal::Atom(deleted));
        rdiff.add_to_body(Literal::BinaryConstraint {
            op: BinaryConstraintOp::Le,
            lhs: Argument::Variable("@deleted_count".to_string()),
            rhs: Argument::NumberConstant(0),
        });

        let mut not_deleted_checks = Vec::new();
        for negation in negations {
            let mut negated = negation.clone();
            negated.name = self.atom_variant_name(negation, RelationVariant::DiffApplied);
            rdiff.add_to_body(Literal::PositiveNegation(negated));

            // Negations newly deleted are the insertion mirrors' business.
            let mut not_deleted = negation.clone();
            not_deleted.name = self.atom_variant_name(negation, RelationVariant::DiffMinusCount);
            set_annotation_args(
                &mut not_deleted,
                Some(Argument::UnnamedVariable),
                Some(Argument::UnnamedVariable),
                Some(Argument::NumberConstant(0)),
            );
            not_deleted_checks.push(Literal::Negation(not_deleted));
        }
        rdiff.clear_negations();
        for check in not_deleted_checks {
            rdiff.add_to_body(check);
        }
        Ok(rdiff)
    }

    /// Clone an update rule once per same-SCC delta pivot, rewriting the
    /// pivot atom to its delta variant and bounding later same-SCC atoms to
    /// past iterations.
    #[allow(clippy::too_many_arguments)]
    fn emit_delta_versions(
        &mut self,
        scc: usize,
        rel: &Relation,
        rdiff: &Clause,
        atoms: &[Atom],
        choice: DeltaChoice,
        probe_first: bool,
        loop_rel: &mut Option<RamStatement>,
        version: &mut usize,
    ) -> Result<()> {
        let scc_graph = self.scc_graph;
        for j in 0..atoms.len() {
            if !scc_graph.is_internal(scc, &atoms[j].name) {
                continue;
            }

            let mut r1 = rdiff.clone();
            self.set_atom_variant(&mut r1, j, choice.variant_for(j));

            // Later same-SCC atoms must not be in the delta; the iteration
            // bound simulates the delta without another variant.
            for (k, atom) in atoms.iter().enumerate().skip(j + 1) {
                if scc_graph.is_internal(scc, &atom.name) {
                    let n = atom.arity();
                    r1.add_to_body(Literal::BinaryConstraint {
                        op: BinaryConstraintOp::Lt,
                        lhs: atom.arguments[n - 3].clone(),
                        rhs: previous_iteration(),
                    });
                }
            }

            if probe_first {
                // Evaluate the deleted-tuple probe (appended after the
                // original atoms) before the body joins.
                let mut order = vec![atoms.len()];
                order.extend(0..atoms.len());
                r1.reorder_atoms(&order);
            }

            debug!("recursive: {}", r1);

            let rule = ClauseTranslator::new(self).translate_clause(&r1, &r1, 0)?;
            let new = self.variant_name(rel, RelationVariant::New);
            let text = r1.to_string();
            let rule = wrap_rule(
                self.config,
                rule,
                log_statement::t_recursive_rule(&rel.name, *version, &r1.src_loc, &text),
                &new,
                &text,
                &r1.src_loc,
            );
            RamStatement::append(loop_rel, rule);
        }
        *version += 1;
        Ok(())
    }

    /// Classic (non-incremental) semi-naive clause versions: one per
    /// same-SCC body atom, pivoting that atom to the delta relation.
    fn compile_classic_loop_clause(
        &mut self,
        scc: usize,
        rel: &Relation,
        clause: &Clause,
        loop_rel: &mut Option<RamStatement>,
        version: &mut usize,
    ) -> Result<()> {
        let scc_graph = self.scc_graph;
        let atoms: Vec<Atom> = clause.atoms().into_iter().cloned().collect();

        for j in 0..atoms.len() {
            if !scc_graph.is_internal(scc, &atoms[j].name) {
                continue;
            }

            let mut r1 = clause.clone();
            r1.head.name = self.variant_name(rel, RelationVariant::New);
            self.set_atom_variant(&mut r1, j, RelationVariant::Delta);

            if self.config.provenance.is_enabled() {
                r1.add_to_body(Literal::SubsumptionNegation {
                    atom: clause.head.clone(),
                    subsumption_fields: 1 + rel.height_parameters,
                });
            } else if r1.head.arity() > 0 {
                r1.add_to_body(Literal::Negation(clause.head.clone()));
            }

            // Wildcards in recursive atoms become named variables, keeping
            // index width down across the versions.
            name_unnamed_variables(&mut r1);

            for k in j + 1..atoms.len() {
                if scc_graph.is_internal(scc, &atoms[k].name) {
                    let mut delta_atom = r1.atoms()[k].clone();
                    delta_atom.name = self.atom_variant_name(&delta_atom, RelationVariant::Delta);
                    r1.add_to_body(Literal::Negation(delta_atom));
                }
            }

            let rule = ClauseTranslator::new(self).translate_clause(&r1, clause, *version)?;
            let new = self.variant_name(rel, RelationVariant::New);
            let text = clause.to_string();
            let rule = wrap_rule(
                self.config,
                rule,
                log_statement::t_recursive_rule(&rel.name, *version, &clause.src_loc, &text),
                &new,
                &text,
                &clause.src_loc,
            );
            RamStatement::append(loop_rel, rule);
            *version += 1;
        }
        Ok(())
    }
}
