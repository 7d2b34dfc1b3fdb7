//! Value and constraint translation.
//!
//! Structural recursion from AST arguments to IR expressions and from body
//! literals to IR conditions, consulting the clause's value index for every
//! variable and aggregator reference.

use super::value_index::{Location, ValueIndex};
use super::AstTranslator;
use crate::error::{Result, TranslatorError};
use crate::ram::{RamCondition, RamExpression};
use datalog_ast::{Argument, Atom, Literal, SrcLocation};

pub(crate) fn make_tuple_element(location: &Location) -> RamExpression {
    RamExpression::TupleElement {
        level: location.level,
        column: location.column,
    }
}

impl AstTranslator<'_> {
    /// Translate an argument into an IR expression.
    pub(crate) fn translate_value(
        &mut self,
        argument: &Argument,
        index: &ValueIndex,
        src_loc: &SrcLocation,
    ) -> Result<RamExpression> {
        match argument {
            Argument::Variable(name) => {
                if !index.is_defined(name) {
                    return Err(TranslatorError::UngroundedVariable {
                        variable: name.clone(),
                        location: src_loc.clone(),
                    });
                }
                let location = index
                    .definition_point(name)
                    .expect("defined variable has a definition point");
                Ok(make_tuple_element(location))
            }
            Argument::UnnamedVariable => Ok(RamExpression::Undef),
            Argument::NumberConstant(value) => Ok(RamExpression::Number(*value)),
            Argument::StringConstant(symbol) => Ok(RamExpression::Number(*symbol as i64)),
            Argument::IntrinsicFunctor { op, arguments } => {
                let arguments = self.translate_values(arguments, index, src_loc)?;
                Ok(RamExpression::IntrinsicOp { op: *op, arguments })
            }
            Argument::UserDefinedFunctor { name, arguments } => {
                let declaration = self.program.functor_declaration(name).ok_or_else(|| {
                    TranslatorError::UnknownFunctor {
                        name: name.clone(),
                        location: src_loc.clone(),
                    }
                })?;
                let type_signature = declaration.type_signature.clone();
                let arguments = self.translate_values(arguments, index, src_loc)?;
                Ok(RamExpression::UserDefinedOp {
                    name: name.clone(),
                    type_signature,
                    arguments,
                })
            }
            Argument::Counter => Ok(RamExpression::AutoIncrement),
            Argument::IterationNumber => Ok(RamExpression::IterationNumber),
            Argument::Record(record) => {
                let arguments = self.translate_values(&record.arguments, index, src_loc)?;
                Ok(RamExpression::PackRecord(arguments))
            }
            Argument::Aggregator(aggregator) => {
                let location = index.aggregator_location(aggregator).ok_or_else(|| {
                    TranslatorError::UngroundedVariable {
                        variable: argument.to_string(),
                        location: src_loc.clone(),
                    }
                })?;
                Ok(make_tuple_element(location))
            }
            Argument::SubroutineArgument(number) => {
                Ok(RamExpression::SubroutineArgument(*number))
            }
        }
    }

    fn translate_values(
        &mut self,
        arguments: &[Argument],
        index: &ValueIndex,
        src_loc: &SrcLocation,
    ) -> Result<Vec<RamExpression>> {
        arguments
            .iter()
            .map(|arg| self.translate_value(arg, index, src_loc))
            .collect()
    }

    /// Translate the argument tuple of an atom for an existence-style
    /// check, taking the first `count` positions.
    fn translate_atom_values(
        &mut self,
        atom: &Atom,
        count: usize,
        index: &ValueIndex,
        src_loc: &SrcLocation,
    ) -> Result<Vec<RamExpression>> {
        atom.arguments[..count]
            .iter()
            .map(|arg| self.translate_value(arg, index, src_loc))
            .collect()
    }

    /// Translate a body literal into a condition. Positive atoms are
    /// covered by the scan nesting and yield no condition here.
    pub(crate) fn translate_constraint(
        &mut self,
        literal: &Literal,
        index: &ValueIndex,
        src_loc: &SrcLocation,
    ) -> Result<Option<RamCondition>> {
        match literal {
            Literal::Atom(_) => Ok(None),
            Literal::BinaryConstraint { op, lhs, rhs } => {
                let lhs = self.translate_value(lhs, index, src_loc)?;
                let rhs = self.translate_value(rhs, index, src_loc)?;
                Ok(Some(RamCondition::Constraint { op: *op, lhs, rhs }))
            }
            Literal::Conjunction(lhs, rhs) => {
                let lhs = self.translate_constraint(lhs, index, src_loc)?;
                let rhs = self.translate_constraint(rhs, index, src_loc)?;
                Ok(combine(lhs, rhs, RamCondition::Conjunction))
            }
            Literal::Disjunction(lhs, rhs) => {
                let lhs = self.translate_constraint(lhs, index, src_loc)?;
                let rhs = self.translate_constraint(rhs, index, src_loc)?;
                Ok(combine(lhs, rhs, RamCondition::Disjunction))
            }
            Literal::Negation(atom) => {
                let mut arity = atom.arity();
                let heights = self.number_of_heights(atom);
                // Provenance columns never participate in the check.
                if self.config.provenance.is_enabled() {
                    arity -= 1 + heights;
                }

                let mut values = self.translate_atom_values(atom, arity, index, src_loc)?;
                if self.config.provenance.is_enabled() {
                    values.push(RamExpression::Undef);
                    for _ in 0..heights {
                        values.push(RamExpression::Undef);
                    }
                }

                let relation = self.translate_atom_relation(atom);
                if arity > 0 {
                    Ok(Some(
                        RamCondition::ExistenceCheck { relation, values }.negate(),
                    ))
                } else {
                    Ok(Some(RamCondition::EmptinessCheck { relation }))
                }
            }
            Literal::PositiveNegation(atom) => {
                let values =
                    self.translate_atom_values(atom, atom.arity(), index, src_loc)?;
                let relation = self.translate_atom_relation(atom);
                Ok(Some(
                    RamCondition::PositiveExistenceCheck { relation, values }.negate(),
                ))
            }
            Literal::SubsumptionNegation { atom, .. } => {
                let values =
                    self.translate_atom_values(atom, atom.arity(), index, src_loc)?;
                let relation = self.translate_atom_relation(atom);
                Ok(Some(
                    RamCondition::SubsumptionExistenceCheck { relation, values }.negate(),
                ))
            }
            Literal::ExistenceCheck(atom) => {
                let values =
                    self.translate_atom_values(atom, atom.arity(), index, src_loc)?;
                let relation = self.translate_atom_relation(atom);
                Ok(Some(RamCondition::PositiveExistenceCheck {
                    relation,
                    values,
                }))
            }
        }
    }
}

fn combine(
    lhs: Option<RamCondition>,
    rhs: Option<RamCondition>,
    make: fn(Box<RamCondition>, Box<RamCondition>) -> RamCondition,
) -> Option<RamCondition> {
    match (lhs, rhs) {
        (Some(lhs), Some(rhs)) => Some(make(Box::new(lhs), Box::new(rhs))),
        (Some(one), None) | (None, Some(one)) => Some(one),
        (None, None) => None,
    }
}
