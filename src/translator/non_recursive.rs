//! Non-recursive relation compilation.
//!
//! In classic mode each clause compiles directly. In incremental mode each
//! update clause expands into a family of rules, one per pivot body atom:
//! the pivot joins the count variant carrying this epoch's change, atoms
//! before it join the applied variant under a not-also-changed guard (so a
//! tuple change is attributed to exactly one pivot), and atoms after it
//! join the applied variant. Negated atoms get mirror rules pivoting on the
//! negation flipping truth value.

use super::clause::ClauseTranslator;
use super::naming::RelationVariant;
use super::{log_statement, name_unnamed_variables, wrap_rule, AstTranslator};
use crate::error::Result;
use crate::ram::{RamRelation, RamStatement};
use datalog_ast::{Argument, Atom, BinaryConstraintOp, Clause, Literal, Relation};
use log::{debug, warn};

/// Update category of an annotated clause, read off the constant
/// `(prev_count, current_count)` pair on its head.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UpdateCategory {
    Insertion,
    Deletion,
    Rederivation,
}

impl UpdateCategory {
    /// `None` when the count annotations are missing; such rules are
    /// skipped with a warning.
    pub(crate) fn of(clause: &Clause, relation_arity: usize) -> Option<UpdateCategory> {
        let args = &clause.head.arguments;
        let prev = args.get(relation_arity.checked_sub(2)?)?.as_number()?;
        let cur = args.get(relation_arity - 1)?.as_number()?;
        match (prev, cur) {
            (1, 1) => Some(UpdateCategory::Rederivation),
            (_, 1) => Some(UpdateCategory::Insertion),
            (_, -1) => Some(UpdateCategory::Deletion),
            _ => None,
        }
    }
}

/// Set the trailing annotation arguments of a cloned guard atom.
/// `None` leaves a position untouched.
pub(crate) fn set_annotation_args(
    atom: &mut Atom,
    iteration: Option<Argument>,
    prev_count: Option<Argument>,
    current_count: Option<Argument>,
) {
    let n = atom.arity();
    if let Some(arg) = current_count {
        atom.set_argument(n - 1, arg);
    }
    if let Some(arg) = prev_count {
        atom.set_argument(n - 2, arg);
    }
    if let Some(arg) = iteration {
        atom.set_argument(n - 3, arg);
    }
}

/// Guard constraint on a pivot atom's annotation variable:
/// `atom_arg <op> bound`.
pub(crate) fn count_guard(atom: &Atom, offset_from_end: usize, op: BinaryConstraintOp) -> Literal {
    let n = atom.arity();
    Literal::BinaryConstraint {
        op,
        lhs: atom.arguments[n - offset_from_end].clone(),
        rhs: Argument::NumberConstant(0),
    }
}

impl<'p> AstTranslator<'p> {
    /// Variant name for an atom's relation, registering the schema. The
    /// atom may already carry a mangled name; the variant applies to its
    /// base.
    pub(crate) fn atom_variant_name(&mut self, atom: &Atom, variant: RelationVariant) -> String {
        let base = super::naming::base_name(&atom.name).to_string();
        let program = self.program;
        match program.relation(&base) {
            Some(relation) => self.translate_relation(relation, variant),
            None => {
                let name = super::naming::mangled_name(&base, variant);
                self.ram
                    .add_relation(RamRelation::new(name.clone(), atom.arity()));
                name
            }
        }
    }

    /// Rewrite positive atom `index` of `clause` to a variant of its
    /// relation.
    pub(crate) fn set_atom_variant(
        &mut self,
        clause: &mut Clause,
        index: usize,
        variant: RelationVariant,
    ) {
        let atom = clause.atoms()[index].clone();
        let name = self.atom_variant_name(&atom, variant);
        clause.atoms_mut()[index].name = name;
    }

    /// "No previous" probe: the given atom, in `variant`, with
    /// `(prev, cur) = (0, 1)`. Wrapped by callers in a positive negation
    /// (to require absence) or an existence check (to require presence).
    fn no_previous_probe(&mut self, atom: &Atom, variant: RelationVariant) -> Atom {
        let mut probe = atom.clone();
        probe.name = self.atom_variant_name(atom, variant);
        set_annotation_args(
            &mut probe,
            None,
            Some(Argument::NumberConstant(0)),
            Some(Argument::NumberConstant(1)),
        );
        probe
    }

    /// Guard for atoms before the pivot: the tuple's change is not already
    /// attributed to this earlier atom, or the tuple existed before.
    /// `count_variant` carries the count probe; `prev_variant` the
    /// existence probe.
    fn earlier_pivot_guard(
        &mut self,
        atom: &Atom,
        count_variant: RelationVariant,
        count_prev: Argument,
        prev_variant: RelationVariant,
    ) -> Literal {
        let mut changed = atom.clone();
        changed.name = self.atom_variant_name(atom, count_variant);
        set_annotation_args(
            &mut changed,
            None,
            Some(count_prev),
            Some(Argument::UnnamedVariable),
        );

        let existed = self.no_previous_probe(atom, prev_variant);

        Literal::Disjunction(
            Box::new(Literal::PositiveNegation(changed)),
            Box::new(Literal::ExistenceCheck(existed)),
        )
    }

    /// Compile the non-recursive clauses of one relation. Returns `None`
    /// when the relation has no non-recursive clauses (and profiling is
    /// off).
    pub(crate) fn translate_non_recursive_relation(
        &mut self,
        relation: &Relation,
    ) -> Result<Option<RamStatement>> {
        let mut result: Option<RamStatement> = None;
        let base = self.translate_relation(relation, RelationVariant::Base);

        for clause in &relation.clauses {
            if self.recursive_clauses.recursive(clause) {
                continue;
            }

            if self.config.incremental {
                self.compile_incremental_non_recursive(relation, clause, &base, &mut result)?;
            } else {
                let rule = ClauseTranslator::new(self).translate_clause(clause, clause, 0)?;
                let text = clause.to_string();
                let rule = wrap_rule(
                    self.config,
                    rule,
                    log_statement::t_nonrecursive_rule(&relation.name, &clause.src_loc, &text),
                    &base,
                    &text,
                    &clause.src_loc,
                );
                RamStatement::append(&mut result, rule);
            }
        }

        if self.config.profile {
            match result.take() {
                Some(body) => {
                    result = Some(RamStatement::LogRelationTimer {
                        body: Box::new(body),
                        message: log_statement::t_nonrecursive_relation(
                            &relation.name,
                            &Default::default(),
                        ),
                        relation: base,
                    });
                }
                None => {
                    RamStatement::append(
                        &mut result,
                        RamStatement::LogSize {
                            relation: base,
                            message: log_statement::n_nonrecursive_relation(
                                &relation.name,
                                &Default::default(),
                            ),
                        },
                    );
                }
            }
        }

        Ok(result)
    }

    fn compile_incremental_non_recursive(
        &mut self,
        relation: &Relation,
        clause: &Clause,
        base: &str,
        result: &mut Option<RamStatement>,
    ) -> Result<()> {
        let Some(category) = UpdateCategory::of(clause, relation.arity()) else {
            warn!(
                "count annotations are not initialized, skipping rule: {}",
                clause
            );
            return Ok(());
        };

        // Re-derivation only happens inside SCC fixpoints; a deleted tuple
        // of a non-recursive relation has no alternative epoch to recover
        // from here.
        if category == UpdateCategory::Rederivation {
            return Ok(());
        }

        let mut clause = clause.clone();
        name_unnamed_variables(&mut clause);
        let atoms: Vec<Atom> = clause.atoms().into_iter().cloned().collect();
        let negations: Vec<Atom> = clause.negations().into_iter().cloned().collect();

        match category {
            UpdateCategory::Insertion => {
                for i in 0..atoms.len() {
                    let cl =
                        self.build_insertion_rule(relation, &clause, &atoms, &negations, i, false)?;
                    self.emit_non_recursive_rule(relation, base, cl, result)?;
                }
                for i in 0..negations.len() {
                    let cl = self.build_insertion_negation_mirror(
                        relation, &clause, &atoms, &negations, i, false,
                    )?;
                    self.emit_non_recursive_rule(relation, base, cl, result)?;
                }
            }
            UpdateCategory::Deletion => {
                for i in 0..atoms.len() {
                    let cl =
                        self.build_deletion_rule(relation, &clause, &atoms, &negations, i, false)?;
                    self.emit_non_recursive_rule(relation, base, cl, result)?;
                }
                for i in 0..negations.len() {
                    let cl = self.build_deletion_negation_mirror(
                        relation, &clause, &atoms, &negations, i, false,
                    )?;
                    self.emit_non_recursive_rule(relation, base, cl, result)?;
                }
            }
            UpdateCategory::Rederivation => unreachable!("filtered above"),
        }
        Ok(())
    }

    fn emit_non_recursive_rule(
        &mut self,
        relation: &Relation,
        base: &str,
        cl: Clause,
        result: &mut Option<RamStatement>,
    ) -> Result<()> {
        debug!("non-recursive: {}", cl);
        let rule = ClauseTranslator::new(self).translate_clause(&cl, &cl, 0)?;
        let text = cl.to_string();
        let rule = wrap_rule(
            self.config,
            rule,
            log_statement::t_nonrecursive_rule(&relation.name, &cl.src_loc, &text),
            base,
            &text,
            &cl.src_loc,
        );
        RamStatement::append(result, rule);
        Ok(())
    }

    /// Insertion rule pivoting on positive atom `i`:
    ///
    /// ```text
    /// diff_plus_R :- diff_applied_R_1, ..., diff_plus_count_R_i,
    ///                diff_applied_R_i+1, ..., guards
    /// ```
    ///
    /// Shared by C6 and the SCC loop (`recursive` selects the head target
    /// later).
    pub(crate) fn build_insertion_rule(
        &mut self,
        relation: &Relation,
        clause: &Clause,
        atoms: &[Atom],
        negations: &[Atom],
        i: usize,
        recursive: bool,
    ) -> Result<Clause> {
        let mut cl = clause.clone();
        cl.head.name = self.variant_name(relation, RelationVariant::DiffPlus);

        // The pivot tuple must not have existed before this epoch.
        let no_previous = self.no_previous_probe(&atoms[i], RelationVariant::Base);
        cl.add_to_body(Literal::PositiveNegation(no_previous));

        self.set_atom_variant(&mut cl, i, RelationVariant::DiffPlusCount);
        cl.add_to_body(count_guard(&atoms[i], 2, BinaryConstraintOp::Le));
        cl.add_to_body(count_guard(&atoms[i], 1, BinaryConstraintOp::Gt));

        for j in 0..i {
            self.set_atom_variant(&mut cl, j, RelationVariant::DiffApplied);
            let guard = self.earlier_pivot_guard(
                &atoms[j],
                RelationVariant::DiffPlusCount,
                Argument::NumberConstant(0),
                RelationVariant::Base,
            );
            cl.add_to_body(guard);
        }
        for j in i + 1..atoms.len() {
            self.set_atom_variant(&mut cl, j, RelationVariant::DiffApplied);
        }

        // A negation holds when its tuple is absent from the effective
        // base of this epoch.
        for negation in negations {
            let mut negated = negation.clone();
            negated.name = self.atom_variant_name(negation, RelationVariant::DiffApplied);
            cl.add_to_body(Literal::PositiveNegation(negated));
        }
        cl.clear_negations();

        if recursive {
            self.retarget_to_new_diff(&mut cl, relation, RelationVariant::NewDiffPlus, clause);
        }
        Ok(cl)
    }

    /// Insertion mirror rule pivoting on negation `i` becoming true (its
    /// atom was just deleted).
    pub(crate) fn build_insertion_negation_mirror(
        &mut self,
        relation: &Relation,
        clause: &Clause,
        atoms: &[Atom],
        negations: &[Atom],
        i: usize,
        recursive: bool,
    ) -> Result<Clause> {
        let mut cl = clause.clone();
        cl.head.name = self.variant_name(relation, RelationVariant::DiffPlus);

        // The negated tuple was deleted this epoch: positive probe on
        // diff_minus_count with a zero current count. The iteration column
        // is wildcarded here (and only here; the deletion mirror keeps it).
        let mut negated = negations[i].clone();
        negated.name = self.atom_variant_name(&negations[i], RelationVariant::DiffMinusCount);
        set_annotation_args(
            &mut negated,
            Some(Argument::UnnamedVariable),
            None,
            Some(Argument::NumberConstant(0)),
        );
        cl.add_to_body(Literal::Atom(negated));

        // Prevent double insertions across epochs.
        let no_previous = self.no_previous_probe(&negations[i], RelationVariant::DiffApplied);
        cl.add_to_body(Literal::PositiveNegation(no_previous));

        for j in 0..i {
            let guard = self.earlier_pivot_guard(
                &negations[j],
                RelationVariant::DiffMinusCount,
                Argument::NumberConstant(-1),
                RelationVariant::DiffApplied,
            );
            cl.add_to_body(guard);
        }

        for negation in negations {
            let mut negated = negation.clone();
            negated.name = self.atom_variant_name(negation, RelationVariant::DiffApplied);
            cl.add_to_body(Literal::PositiveNegation(negated));
        }

        // The effective base for the positive body is this epoch's applied
        // relation.
        for j in 0..atoms.len() {
            self.set_atom_variant(&mut cl, j, RelationVariant::DiffApplied);
        }
        cl.clear_negations();

        if recursive {
            self.retarget_to_new_diff(&mut cl, relation, RelationVariant::NewDiffPlus, clause);
        }
        Ok(cl)
    }

    /// Deletion rule pivoting on positive atom `i`.
    pub(crate) fn build_deletion_rule(
        &mut self,
        relation: &Relation,
        clause: &Clause,
        atoms: &[Atom],
        negations: &[Atom],
        i: usize,
        recursive: bool,
    ) -> Result<Clause> {
        let mut cl = clause.clone();
        cl.head.name = self.variant_name(relation, RelationVariant::DiffMinus);

        let no_previous = self.no_previous_probe(&atoms[i], RelationVariant::DiffApplied);
        cl.add_to_body(Literal::PositiveNegation(no_previous));

        self.set_atom_variant(&mut cl, i, RelationVariant::DiffMinusCount);
        cl.add_to_body(count_guard(&atoms[i], 2, BinaryConstraintOp::Gt));
        cl.add_to_body(count_guard(&atoms[i], 1, BinaryConstraintOp::Le));

        for j in 0..i {
            // Atoms before the pivot keep the base relation; only the
            // attribution guard is added.
            let guard = self.earlier_pivot_guard(
                &atoms[j],
                RelationVariant::DiffMinusCount,
                Argument::NumberConstant(-1),
                RelationVariant::DiffApplied,
            );
            cl.add_to_body(guard);
        }
        for j in i + 1..atoms.len() {
            self.set_atom_variant(&mut cl, j, RelationVariant::DiffMinusApplied);
        }

        // Negations are evaluated against the previous epoch.
        for negation in negations {
            cl.add_to_body(Literal::PositiveNegation(negation.clone()));
        }
        cl.clear_negations();

        if recursive {
            self.retarget_to_new_diff(&mut cl, relation, RelationVariant::NewDiffMinus, clause);
        }
        Ok(cl)
    }

    /// Deletion mirror rule pivoting on negation `i` becoming false (its
    /// atom was just inserted).
    pub(crate) fn build_deletion_negation_mirror(
        &mut self,
        relation: &Relation,
        clause: &Clause,
        _atoms: &[Atom],
        negations: &[Atom],
        i: usize,
        recursive: bool,
    ) -> Result<Clause> {
        let mut cl = clause.clone();
        cl.head.name = self.variant_name(relation, RelationVariant::DiffMinus);

        // The negated tuple was inserted this epoch.
        let mut negated = negations[i].clone();
        negated.name = self.atom_variant_name(&negations[i], RelationVariant::DiffPlusCount);
        set_annotation_args(
            &mut negated,
            Some(Argument::UnnamedVariable),
            Some(Argument::NumberConstant(0)),
            Some(Argument::UnnamedVariable),
        );
        cl.add_to_body(Literal::Atom(negated));

        let no_previous = self.no_previous_probe(&negations[i], RelationVariant::Base);
        cl.add_to_body(Literal::PositiveNegation(no_previous));

        for j in 0..i {
            let guard = self.earlier_pivot_guard(
                &negations[j],
                RelationVariant::DiffPlusCount,
                Argument::NumberConstant(0),
                RelationVariant::Base,
            );
            cl.add_to_body(guard);
        }

        for negation in negations {
            cl.add_to_body(Literal::PositiveNegation(negation.clone()));
        }
        // Positive atoms stay on the base relation: the rule deletes
        // derivations the previous epoch supported.
        cl.clear_negations();

        if recursive {
            self.retarget_to_new_diff(&mut cl, relation, RelationVariant::NewDiffMinus, clause);
        }
        Ok(cl)
    }

    /// SCC-loop adjustment shared by all categories: send the head to the
    /// per-iteration new-diff variant and suppress tuples the epoch has
    /// already discovered via a subsumption negation on the applied head.
    fn retarget_to_new_diff(
        &mut self,
        cl: &mut Clause,
        relation: &Relation,
        target: RelationVariant,
        original: &Clause,
    ) {
        let mut applied_head = original.head.clone();
        applied_head.name = self.variant_name(relation, RelationVariant::DiffApplied);
        cl.head.name = self.variant_name(relation, target);
        cl.add_to_body(Literal::SubsumptionNegation {
            atom: applied_head,
            subsumption_fields: 1,
        });
    }
}
