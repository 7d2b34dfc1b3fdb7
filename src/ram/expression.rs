//! IR value expressions.

use datalog_ast::FunctorOp;
use std::fmt;

/// A value expression evaluated against the enclosing operation's tuple
/// environment. `TupleElement { level, column }` reads column `column` of
/// the tuple bound at nesting level `level`.
#[derive(Debug, Clone, PartialEq)]
pub enum RamExpression {
    TupleElement {
        level: usize,
        column: usize,
    },
    Number(i64),
    IntrinsicOp {
        op: FunctorOp,
        arguments: Vec<RamExpression>,
    },
    UserDefinedOp {
        name: String,
        type_signature: String,
        arguments: Vec<RamExpression>,
    },
    /// The `$` counter: yields a fresh value on every evaluation.
    AutoIncrement,
    /// The current fixpoint iteration number.
    IterationNumber,
    PackRecord(Vec<RamExpression>),
    SubroutineArgument(usize),
    /// An unconstrained value, used to pad existence checks.
    Undef,
}

impl RamExpression {
    pub fn is_undef(&self) -> bool {
        matches!(self, RamExpression::Undef)
    }
}

fn fmt_args(f: &mut fmt::Formatter<'_>, args: &[RamExpression]) -> fmt::Result {
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", arg)?;
    }
    Ok(())
}

impl fmt::Display for RamExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RamExpression::TupleElement { level, column } => write!(f, "t{}.{}", level, column),
            RamExpression::Number(value) => write!(f, "number({})", value),
            RamExpression::IntrinsicOp { op, arguments } => {
                write!(f, "({}", op.as_str())?;
                for arg in arguments {
                    write!(f, " {}", arg)?;
                }
                write!(f, ")")
            }
            RamExpression::UserDefinedOp {
                name, arguments, ..
            } => {
                write!(f, "@{}(", name)?;
                fmt_args(f, arguments)?;
                write!(f, ")")
            }
            RamExpression::AutoIncrement => write!(f, "autoinc()"),
            RamExpression::IterationNumber => write!(f, "iteration()"),
            RamExpression::PackRecord(arguments) => {
                write!(f, "pack(")?;
                fmt_args(f, arguments)?;
                write!(f, ")")
            }
            RamExpression::SubroutineArgument(index) => write!(f, "arg({})", index),
            RamExpression::Undef => write!(f, "_"),
        }
    }
}
