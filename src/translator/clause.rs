//! Clause translation.
//!
//! Compiles one clause into a `Query` holding a nest of relational-algebra
//! operators. Two phases:
//!
//! 1. **Index pass** — walk body atoms in order, allocating one nesting
//!    level per atom, a further level per nested record unpack, and (after
//!    all atoms) one level per distinct aggregator. Every variable
//!    occurrence is recorded in the value index at its `(level, column)`.
//! 2. **Operator construction** — build outward from the innermost
//!    projection: repeated-variable equalities, body-literal conditions,
//!    aggregator bindings, aggregate layers (reverse index order), then the
//!    scan/unpack layers with their constant filters and emptiness
//!    early-outs.

use super::value_index::{Location, ValueIndex};
use super::values::make_tuple_element;
use super::AstTranslator;
use crate::error::{Result, TranslatorError};
use crate::ram::{AggregateFunction, RamCondition, RamExpression, RamOperation, RamStatement};
use datalog_ast::{
    AggregateOp, Aggregator, Argument, Atom, BinaryConstraintOp, Clause, Literal, RecordInit,
};

/// One entry of the operator-nesting stack built by the index pass. The
/// entry at stack position `k` owns nesting level `k`.
enum NestingEntry {
    Atom(Atom),
    Record(RecordInit),
}

pub(crate) struct ClauseTranslator<'a, 't> {
    translator: &'a mut AstTranslator<'t>,
    value_index: ValueIndex,
    op_nesting: Vec<NestingEntry>,
    aggregators: Vec<Aggregator>,
    level: usize,
}

fn eq(lhs: RamExpression, rhs: RamExpression) -> RamCondition {
    RamCondition::Constraint {
        op: BinaryConstraintOp::Eq,
        lhs,
        rhs,
    }
}

fn filter(condition: RamCondition, body: RamOperation) -> RamOperation {
    RamOperation::Filter {
        condition,
        body: Box::new(body),
    }
}

/// Collect aggregators depth-first post-order: nested aggregators come
/// before the aggregators containing them.
fn collect_aggregators(clause: &Clause, out: &mut Vec<Aggregator>) {
    fn from_argument(argument: &Argument, out: &mut Vec<Aggregator>) {
        match argument {
            Argument::Record(record) => {
                for arg in &record.arguments {
                    from_argument(arg, out);
                }
            }
            Argument::IntrinsicFunctor { arguments, .. }
            | Argument::UserDefinedFunctor { arguments, .. } => {
                for arg in arguments {
                    from_argument(arg, out);
                }
            }
            Argument::Aggregator(aggregator) => {
                if let Some(target) = &aggregator.target {
                    from_argument(target, out);
                }
                for literal in &aggregator.body {
                    from_literal(literal, out);
                }
                out.push(aggregator.clone());
            }
            _ => {}
        }
    }

    fn from_literal(literal: &Literal, out: &mut Vec<Aggregator>) {
        match literal {
            Literal::Atom(atom)
            | Literal::Negation(atom)
            | Literal::PositiveNegation(atom)
            | Literal::SubsumptionNegation { atom, .. }
            | Literal::ExistenceCheck(atom) => {
                for arg in &atom.arguments {
                    from_argument(arg, out);
                }
            }
            Literal::BinaryConstraint { lhs, rhs, .. } => {
                from_argument(lhs, out);
                from_argument(rhs, out);
            }
            Literal::Conjunction(lhs, rhs) | Literal::Disjunction(lhs, rhs) => {
                from_literal(lhs, out);
                from_literal(rhs, out);
            }
        }
    }

    for arg in &clause.head.arguments {
        from_argument(arg, out);
    }
    for literal in &clause.body {
        from_literal(literal, out);
    }
}

fn contains_counter(argument: &Argument) -> bool {
    match argument {
        Argument::Counter => true,
        Argument::Record(record) => record.arguments.iter().any(contains_counter),
        Argument::IntrinsicFunctor { arguments, .. }
        | Argument::UserDefinedFunctor { arguments, .. } => {
            arguments.iter().any(contains_counter)
        }
        _ => false,
    }
}

impl<'a, 't> ClauseTranslator<'a, 't> {
    pub(crate) fn new(translator: &'a mut AstTranslator<'t>) -> Self {
        ClauseTranslator {
            translator,
            value_index: ValueIndex::new(),
            op_nesting: Vec::new(),
            aggregators: Vec::new(),
            level: 0,
        }
    }

    /// A copy of the clause with its fixed execution plan applied, when one
    /// exists for `version`. The copy has its plan consumed, so plan
    /// handling is not re-entered on recursion.
    fn reordered_clause(clause: &Clause, version: usize) -> Option<Clause> {
        if clause.fixed_plan {
            return None;
        }
        let plan = clause.plan.as_ref()?;
        let order = plan.order_for(version)?;

        let mut reordered = clause.clone();
        // Plan orders are 1-based in source syntax.
        let zero_based: Vec<usize> = order.iter().map(|&i| i - 1).collect();
        reordered.reorder_atoms(&zero_based);
        reordered.plan = None;
        reordered.fixed_plan = true;
        Some(reordered)
    }

    /// Generate RAM for one clause. `original` is the pre-rewrite clause
    /// the rule was derived from; its head drives nullary-head handling.
    pub(crate) fn translate_clause(
        mut self,
        clause: &Clause,
        original: &Clause,
        version: usize,
    ) -> Result<RamStatement> {
        if let Some(reordered) = Self::reordered_clause(clause, version) {
            return ClauseTranslator::new(self.translator).translate_clause(
                &reordered,
                original,
                version,
            );
        }

        if clause.is_fact() {
            let empty = ValueIndex::new();
            let values = clause
                .head
                .arguments
                .iter()
                .map(|arg| self.translator.translate_value(arg, &empty, &clause.src_loc))
                .collect::<Result<Vec<_>>>()?;
            let relation = self.translator.translate_atom_relation(&clause.head);
            return Ok(RamStatement::Fact { relation, values });
        }

        self.create_value_index(clause)?;

        let mut op = self.create_operation(clause)?;

        // Equality constraints imposed by repeated variables. Aggregator
        // levels are skipped: the aggregate wires its own bindings.
        for references in self.value_index.variable_references().values() {
            let first = &references[0];
            for location in references {
                if !location.same_point(first)
                    && !self.value_index.is_aggregator_level(location.level)
                {
                    op = filter(
                        eq(make_tuple_element(first), make_tuple_element(location)),
                        op,
                    );
                }
            }
        }

        // Conditions from negations and constraints.
        for literal in &clause.body {
            if let Some(condition) =
                self.translator
                    .translate_constraint(literal, &self.value_index, &clause.src_loc)?
            {
                op = filter(condition, op);
            }
        }

        // Bind aggregator results appearing as atom arguments.
        for (entry_level, entry) in self.op_nesting.iter().enumerate().rev() {
            if let NestingEntry::Atom(atom) = entry {
                for (pos, arg) in atom.arguments.iter().enumerate() {
                    if let Argument::Aggregator(aggregator) = arg {
                        let location = self
                            .value_index
                            .aggregator_location(aggregator)
                            .expect("aggregator indexed in phase A");
                        op = filter(
                            eq(
                                RamExpression::TupleElement {
                                    level: entry_level,
                                    column: pos,
                                },
                                make_tuple_element(location),
                            ),
                            op,
                        );
                    }
                }
            }
        }

        op = self.apply_aggregates(clause, op)?;
        op = self.apply_scan_levels(clause, original, version, op)?;

        // Nullary heads must not re-derive the empty fact.
        if original.head.arity() == 0 {
            let relation = self.translator.translate_atom_relation(&original.head);
            op = filter(RamCondition::EmptinessCheck { relation }, op);
        }
        Ok(RamStatement::Query(op))
    }

    // ------------------------------------------------------------------
    // Phase A: index pass
    // ------------------------------------------------------------------

    fn create_value_index(&mut self, clause: &Clause) -> Result<()> {
        for atom in clause.atoms() {
            let atom_level = self.level;
            self.level += 1;
            self.op_nesting.push(NestingEntry::Atom(atom.clone()));
            let relation = self.translator.translate_atom_relation(atom);
            self.index_arguments(&atom.arguments, atom_level, &relation);
        }

        let mut aggregators = Vec::new();
        collect_aggregators(clause, &mut aggregators);
        for aggregator in aggregators {
            if self.value_index.has_aggregator(&aggregator) {
                continue;
            }
            let agg_level = self.level;
            self.level += 1;
            self.value_index
                .set_aggregator_location(aggregator.clone(), Location::new(agg_level, 0));

            if let Some(atom) = aggregator.atom() {
                let relation = self.translator.translate_atom_relation(atom);
                for (pos, arg) in atom.arguments.iter().enumerate() {
                    if let Argument::Variable(name) = arg {
                        self.value_index.add_var_reference(
                            name,
                            Location::with_relation(agg_level, pos, relation.clone()),
                        );
                    }
                }
            }
            self.aggregators.push(aggregator);
        }
        Ok(())
    }

    fn index_arguments(&mut self, arguments: &[Argument], level: usize, relation: &str) {
        for (pos, arg) in arguments.iter().enumerate() {
            match arg {
                Argument::Variable(name) => {
                    self.value_index.add_var_reference(
                        name,
                        Location::with_relation(level, pos, relation.to_string()),
                    );
                }
                Argument::Record(record) => {
                    let unpack_level = self.level;
                    self.level += 1;
                    self.value_index
                        .set_record_definition(unpack_level, Location::new(level, pos));
                    self.op_nesting.push(NestingEntry::Record(record.clone()));
                    self.index_arguments(&record.arguments, unpack_level, relation);
                }
                _ => {}
            }
        }
    }

    // ------------------------------------------------------------------
    // Phase B: operator construction
    // ------------------------------------------------------------------

    /// Innermost operation: the head projection, plus duplicate-suppression
    /// wrappers for nullary heads and provenance mode.
    fn create_operation(&mut self, clause: &Clause) -> Result<RamOperation> {
        let head = &clause.head;
        let head_relation = self.translator.translate_atom_relation(head);

        let values = head
            .arguments
            .iter()
            .map(|arg| {
                self.translator
                    .translate_value(arg, &self.value_index, &clause.src_loc)
            })
            .collect::<Result<Vec<_>>>()?;
        let mut op = RamOperation::Project {
            relation: head_relation.clone(),
            values,
        };

        if head.arity() == 0 {
            op = filter(
                RamCondition::EmptinessCheck {
                    relation: head_relation.clone(),
                },
                op,
            );
        }

        // In provenance interpreter mode, suppress duplicate provenance
        // rows for the same original tuple. Heads drawing a counter value
        // are volatile and keep every row.
        if self.translator.config.provenance.is_enabled() && self.translator.config.interpreted() {
            let heights = self.translator.number_of_heights(head);
            let arity = head.arity() - 1 - heights;

            let mut values = Vec::with_capacity(head.arity());
            let mut is_volatile = true;
            for arg in &head.arguments[..arity] {
                if contains_counter(arg) {
                    is_volatile = false;
                }
                values.push(self.translator.translate_value(
                    arg,
                    &self.value_index,
                    &clause.src_loc,
                )?);
            }
            values.push(RamExpression::Undef);
            for _ in 0..heights {
                values.push(RamExpression::Undef);
            }

            if is_volatile {
                return Ok(filter(
                    RamCondition::ExistenceCheck {
                        relation: head_relation,
                        values,
                    }
                    .negate(),
                    op,
                ));
            }
        }

        Ok(op)
    }

    /// Wrap `op` in aggregate layers, innermost-first over the aggregators
    /// in reverse allocation order.
    fn apply_aggregates(&mut self, clause: &Clause, mut op: RamOperation) -> Result<RamOperation> {
        let mut level = self.level;
        for index in (0..self.aggregators.len()).rev() {
            level -= 1;
            let aggregator = self.aggregators[index].clone();

            let function = match aggregator.op {
                AggregateOp::Min => AggregateFunction::Min,
                AggregateOp::Max => AggregateFunction::Max,
                AggregateOp::Count => AggregateFunction::Count,
                AggregateOp::Sum => AggregateFunction::Sum,
            };

            let mut condition: Option<RamCondition> = None;
            for literal in &aggregator.body {
                if let Some(translated) = self.translator.translate_constraint(
                    literal,
                    &self.value_index,
                    &clause.src_loc,
                )? {
                    condition = Some(RamCondition::conjoin(condition, translated));
                }
            }

            // At most one atom is permitted in an aggregate body.
            let mut body_atom: Option<&Atom> = None;
            for literal in &aggregator.body {
                if let Literal::Atom(atom) = literal {
                    if body_atom.is_some() {
                        return Err(TranslatorError::AggregateBodyMalformed {
                            location: clause.src_loc.clone(),
                        });
                    }
                    body_atom = Some(atom);
                }
            }
            let body_atom = body_atom.ok_or_else(|| TranslatorError::AggregateBodyMalformed {
                location: clause.src_loc.clone(),
            })?;

            // Wire the atom's arguments into the aggregate condition.
            // Variable bindings reference an occurrence elsewhere to avoid
            // self-referential constraints.
            for (pos, arg) in body_atom.arguments.iter().enumerate() {
                if let Argument::Variable(name) = arg {
                    for location in self.value_index.references_of(name) {
                        if location.level != level || location.column != pos {
                            condition = Some(RamCondition::conjoin(
                                condition,
                                eq(
                                    make_tuple_element(location),
                                    RamExpression::TupleElement { level, column: pos },
                                ),
                            ));
                            break;
                        }
                    }
                } else if !arg.is_unnamed() {
                    let value = self.translator.translate_value(
                        arg,
                        &self.value_index,
                        &clause.src_loc,
                    )?;
                    if !value.is_undef() {
                        condition = Some(RamCondition::conjoin(
                            condition,
                            eq(RamExpression::TupleElement { level, column: pos }, value),
                        ));
                    }
                }
            }

            let expression = match &aggregator.target {
                Some(target) => {
                    self.translator
                        .translate_value(target, &self.value_index, &clause.src_loc)?
                }
                None => RamExpression::Undef,
            };

            let relation = self.translator.translate_atom_relation(body_atom);
            op = RamOperation::Aggregate {
                body: Box::new(op),
                function,
                relation,
                expression,
                condition: condition.unwrap_or(RamCondition::True),
                level,
            };
        }
        Ok(op)
    }

    /// Pop the nesting stack, wrapping `op` in scan/unpack layers from the
    /// innermost atom outward.
    fn apply_scan_levels(
        &mut self,
        clause: &Clause,
        original: &Clause,
        version: usize,
        mut op: RamOperation,
    ) -> Result<RamOperation> {
        while let Some(entry) = self.op_nesting.pop() {
            let level = self.op_nesting.len();
            match entry {
                NestingEntry::Atom(atom) => {
                    op = self.constant_filters(&atom.arguments, level, clause, op)?;

                    let relation = self.translator.translate_atom_relation(&atom);
                    op = filter(
                        RamCondition::EmptinessCheck {
                            relation: relation.clone(),
                        }
                        .negate(),
                        op,
                    );

                    if atom.arity() != 0 && !atom.all_arguments_unnamed() {
                        if clause.head.arity() == 0 {
                            let head_relation =
                                self.translator.translate_atom_relation(&clause.head);
                            op = RamOperation::Break {
                                condition: RamCondition::EmptinessCheck {
                                    relation: head_relation,
                                }
                                .negate(),
                                body: Box::new(op),
                            };
                        }
                        let profile_text = self.translator.config.profile.then(|| {
                            format!(
                                "@frequency-atom;{};{};{};{};{};{};",
                                original.head.name, version, clause, atom, original, level
                            )
                        });
                        op = RamOperation::Scan {
                            relation,
                            level,
                            body: Box::new(op),
                            profile_text,
                        };
                    }
                }
                NestingEntry::Record(record) => {
                    op = self.constant_filters(&record.arguments, level, clause, op)?;
                    let definition = self
                        .value_index
                        .record_definition(level)
                        .expect("record definition registered in phase A")
                        .clone();
                    op = RamOperation::UnpackRecord {
                        body: Box::new(op),
                        level,
                        reference: make_tuple_element(&definition),
                        arity: record.arity(),
                    };
                }
            }
        }
        Ok(op)
    }

    /// Equality filters binding constant and functor arguments of a popped
    /// nesting entry.
    fn constant_filters(
        &mut self,
        arguments: &[Argument],
        level: usize,
        clause: &Clause,
        mut op: RamOperation,
    ) -> Result<RamOperation> {
        for (pos, arg) in arguments.iter().enumerate() {
            let element = RamExpression::TupleElement { level, column: pos };
            match arg {
                Argument::NumberConstant(value) => {
                    op = filter(eq(element, RamExpression::Number(*value)), op);
                }
                Argument::StringConstant(symbol) => {
                    op = filter(eq(element, RamExpression::Number(*symbol as i64)), op);
                }
                Argument::IntrinsicFunctor { .. } | Argument::UserDefinedFunctor { .. } => {
                    let value =
                        self.translator
                            .translate_value(arg, &self.value_index, &clause.src_loc)?;
                    op = filter(eq(element, value), op);
                }
                _ => {}
            }
        }
        Ok(op)
    }
}
