//! IR statements.

use super::{RamCondition, RamExpression, RamOperation};
use crate::translator::io::IoDirectives;
use std::fmt;

/// A control-flow statement of the IR program.
///
/// Whole-relation operators (`Merge`, `SemiMerge`, `PositiveMerge`,
/// `ExistingMerge`, `Swap`, `Clear`, `Drop`) name relations by mangled name;
/// their count-combining semantics are defined by the evaluator, the
/// translator only fixes their read/write sets and ordering.
#[derive(Debug, Clone, PartialEq)]
pub enum RamStatement {
    Sequence(Vec<RamStatement>),
    /// Children may run concurrently; each child observes relations only
    /// through its declared scans and projections, with a global
    /// synchronization at the end.
    Parallel(Vec<RamStatement>),
    Stratum {
        index: usize,
        body: Box<RamStatement>,
    },
    /// Fixpoint loop; iterates its body until an inner `Exit` fires.
    Loop(Vec<RamStatement>),
    /// Exit the enclosing loop when the condition holds. With `exitable`
    /// false the condition is evaluated purely for its side effect
    /// (subroutine invocation) and never exits.
    Exit {
        condition: RamCondition,
        exitable: bool,
    },
    Create {
        relation: String,
    },
    Load {
        relation: String,
        directives: Vec<IoDirectives>,
    },
    Store {
        relation: String,
        directives: Vec<IoDirectives>,
    },
    /// target += source (row-count semantics are the evaluator's).
    Merge {
        target: String,
        source: String,
    },
    /// Merge only rows with a strictly positive current count.
    PositiveMerge {
        target: String,
        source: String,
    },
    /// Merge rows of `source` whose key already appears in `restriction`
    /// (or in `target` itself when no restriction is given).
    SemiMerge {
        target: String,
        source: String,
        restriction: Option<String>,
    },
    /// Merge rows of `source` that already exist in `reference`.
    ExistingMerge {
        target: String,
        source: String,
        reference: String,
    },
    Swap {
        first: String,
        second: String,
    },
    Clear {
        relation: String,
    },
    Drop {
        relation: String,
    },
    Query(RamOperation),
    Fact {
        relation: String,
        values: Vec<RamExpression>,
    },
    DebugInfo {
        body: Box<RamStatement>,
        message: String,
    },
    LogRelationTimer {
        body: Box<RamStatement>,
        message: String,
        relation: String,
    },
    LogSize {
        relation: String,
        message: String,
    },
    LogTimer {
        body: Box<RamStatement>,
        message: String,
    },
}

impl RamStatement {
    /// Append `stmt` to `list`, flattening into an existing `Sequence` the
    /// way the translator accumulates statement lists.
    pub fn append(list: &mut Option<RamStatement>, stmt: RamStatement) {
        match list.take() {
            None => *list = Some(stmt),
            Some(RamStatement::Sequence(mut stmts)) => {
                stmts.push(stmt);
                *list = Some(RamStatement::Sequence(stmts));
            }
            Some(existing) => {
                *list = Some(RamStatement::Sequence(vec![existing, stmt]));
            }
        }
    }

    /// The sequence of child statements for `Sequence`; a singleton slice
    /// view otherwise. Convenience for tests.
    pub fn children(&self) -> Vec<&RamStatement> {
        match self {
            RamStatement::Sequence(stmts) | RamStatement::Parallel(stmts) => stmts.iter().collect(),
            RamStatement::Loop(stmts) => stmts.iter().collect(),
            RamStatement::Stratum { body, .. }
            | RamStatement::DebugInfo { body, .. }
            | RamStatement::LogRelationTimer { body, .. }
            | RamStatement::LogTimer { body, .. } => vec![body.as_ref()],
            _ => Vec::new(),
        }
    }

    fn fmt_indented(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let pad = "  ".repeat(depth);
        match self {
            RamStatement::Sequence(stmts) => {
                for stmt in stmts {
                    stmt.fmt_indented(f, depth)?;
                }
                Ok(())
            }
            RamStatement::Parallel(stmts) => {
                writeln!(f, "{}parallel:", pad)?;
                for stmt in stmts {
                    stmt.fmt_indented(f, depth + 1)?;
                }
                Ok(())
            }
            RamStatement::Stratum { index, body } => {
                writeln!(f, "{}stratum {}:", pad, index)?;
                body.fmt_indented(f, depth + 1)
            }
            RamStatement::Loop(stmts) => {
                writeln!(f, "{}loop:", pad)?;
                for stmt in stmts {
                    stmt.fmt_indented(f, depth + 1)?;
                }
                Ok(())
            }
            RamStatement::Exit { condition, exitable } => {
                if *exitable {
                    writeln!(f, "{}exit if {}", pad, condition)
                } else {
                    writeln!(f, "{}evaluate {}", pad, condition)
                }
            }
            RamStatement::Create { relation } => writeln!(f, "{}create {}", pad, relation),
            RamStatement::Load { relation, .. } => writeln!(f, "{}load {}", pad, relation),
            RamStatement::Store { relation, .. } => writeln!(f, "{}store {}", pad, relation),
            RamStatement::Merge { target, source } => {
                writeln!(f, "{}merge {} <- {}", pad, target, source)
            }
            RamStatement::PositiveMerge { target, source } => {
                writeln!(f, "{}merge+ {} <- {}", pad, target, source)
            }
            RamStatement::SemiMerge {
                target,
                source,
                restriction,
            } => match restriction {
                Some(restriction) => writeln!(
                    f,
                    "{}semimerge {} <- {} keyed {}",
                    pad, target, source, restriction
                ),
                None => writeln!(f, "{}semimerge {} <- {}", pad, target, source),
            },
            RamStatement::ExistingMerge {
                target,
                source,
                reference,
            } => writeln!(
                f,
                "{}merge? {} <- {} existing-in {}",
                pad, target, source, reference
            ),
            RamStatement::Swap { first, second } => {
                writeln!(f, "{}swap {} {}", pad, first, second)
            }
            RamStatement::Clear { relation } => writeln!(f, "{}clear {}", pad, relation),
            RamStatement::Drop { relation } => writeln!(f, "{}drop {}", pad, relation),
            RamStatement::Query(op) => {
                writeln!(f, "{}query:", pad)?;
                write!(f, "{}", IndentedOperation(op, depth + 1))
            }
            RamStatement::Fact { relation, values } => {
                write!(f, "{}fact {}(", pad, relation)?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", value)?;
                }
                writeln!(f, ")")
            }
            RamStatement::DebugInfo { body, message } => {
                writeln!(f, "{}-- {}", pad, message.replace('\n', " "))?;
                body.fmt_indented(f, depth)
            }
            RamStatement::LogRelationTimer { body, message, .. } => {
                writeln!(f, "{}timer {}:", pad, message)?;
                body.fmt_indented(f, depth + 1)
            }
            RamStatement::LogSize { relation, .. } => writeln!(f, "{}logsize {}", pad, relation),
            RamStatement::LogTimer { body, message } => {
                writeln!(f, "{}timer {}:", pad, message)?;
                body.fmt_indented(f, depth + 1)
            }
        }
    }
}

/// Helper wrapper rendering an operation at a given indentation.
struct IndentedOperation<'a>(&'a RamOperation, usize);

impl fmt::Display for IndentedOperation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Re-render the operation, shifting every line right.
        let rendered = self.0.to_string();
        let pad = "  ".repeat(self.1);
        for line in rendered.lines() {
            writeln!(f, "{}{}", pad, line)?;
        }
        Ok(())
    }
}

impl fmt::Display for RamStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_indented(f, 0)
    }
}
