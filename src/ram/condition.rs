//! IR conditions.

use super::RamExpression;
use datalog_ast::BinaryConstraintOp;
use std::fmt;

/// A boolean condition attached to `Filter`, `Break`, `Aggregate`, and
/// `Exit` nodes.
///
/// The three existence-check flavors differ only in how the evaluator
/// interprets the annotation columns: `ExistenceCheck` matches any stored
/// tuple, `PositiveExistenceCheck` matches tuples currently alive (positive
/// count), and `SubsumptionExistenceCheck` ignores trailing columns when
/// matching.
#[derive(Debug, Clone, PartialEq)]
pub enum RamCondition {
    True,
    Constraint {
        op: BinaryConstraintOp,
        lhs: RamExpression,
        rhs: RamExpression,
    },
    Conjunction(Box<RamCondition>, Box<RamCondition>),
    Disjunction(Box<RamCondition>, Box<RamCondition>),
    Negation(Box<RamCondition>),
    EmptinessCheck {
        relation: String,
    },
    ExistenceCheck {
        relation: String,
        values: Vec<RamExpression>,
    },
    PositiveExistenceCheck {
        relation: String,
        values: Vec<RamExpression>,
    },
    SubsumptionExistenceCheck {
        relation: String,
        values: Vec<RamExpression>,
    },
    /// Invokes a named subroutine; true iff it returns a non-zero value.
    SubroutineCondition {
        name: String,
        arguments: Vec<RamExpression>,
    },
}

impl RamCondition {
    /// AND two optional conditions together.
    pub fn conjoin(lhs: Option<RamCondition>, rhs: RamCondition) -> RamCondition {
        match lhs {
            Some(lhs) => RamCondition::Conjunction(Box::new(lhs), Box::new(rhs)),
            None => rhs,
        }
    }

    pub fn negate(self) -> RamCondition {
        RamCondition::Negation(Box::new(self))
    }
}

fn fmt_values(f: &mut fmt::Formatter<'_>, values: &[RamExpression]) -> fmt::Result {
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", value)?;
    }
    Ok(())
}

impl fmt::Display for RamCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RamCondition::True => write!(f, "true"),
            RamCondition::Constraint { op, lhs, rhs } => {
                write!(f, "{} {} {}", lhs, op.as_str(), rhs)
            }
            RamCondition::Conjunction(lhs, rhs) => write!(f, "({} and {})", lhs, rhs),
            RamCondition::Disjunction(lhs, rhs) => write!(f, "({} or {})", lhs, rhs),
            RamCondition::Negation(inner) => write!(f, "(not {})", inner),
            RamCondition::EmptinessCheck { relation } => write!(f, "(empty {})", relation),
            RamCondition::ExistenceCheck { relation, values } => {
                write!(f, "({}(", relation)?;
                fmt_values(f, values)?;
                write!(f, ") in {})", relation)
            }
            RamCondition::PositiveExistenceCheck { relation, values } => {
                write!(f, "({}(", relation)?;
                fmt_values(f, values)?;
                write!(f, ") pos-in {})", relation)
            }
            RamCondition::SubsumptionExistenceCheck { relation, values } => {
                write!(f, "({}(", relation)?;
                fmt_values(f, values)?;
                write!(f, ") subsumed-by {})", relation)
            }
            RamCondition::SubroutineCondition { name, arguments } => {
                write!(f, "call {}(", name)?;
                fmt_values(f, arguments)?;
                write!(f, ")")
            }
        }
    }
}
